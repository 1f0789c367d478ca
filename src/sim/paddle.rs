//! The player's paddle

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::ball::{Ball, BallId};
use super::collision::{Aabb, Contact, sweep_circle_aabb};
use crate::consts::*;
use crate::tuning::Tuning;

bitflags! {
    /// Combinable paddle modifiers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PaddleTypes: u32 {
        /// Balls stick on contact until released
        const STICKY       = 1 << 0;
        /// Fires laser bullets
        const LASER_BULLET = 1 << 1;
        /// Fires a continuous laser beam
        const LASER_BEAM   = 1 << 2;
        /// A rocket sits on the paddle waiting to be fired
        const ROCKET       = 1 << 3;
        /// Shield absorbs bounces; balls leave straight along the contact normal
        const SHIELD       = 1 << 4;
        /// Slowed movement
        const POISON       = 1 << 5;
        /// Left and right are swapped
        const REVERSED     = 1 << 6;
    }
}

/// Smoothing rate for [`Paddle::average_velocity`] (per second)
const AVG_VELOCITY_RATE: f32 = 10.0;

/// The player paddle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paddle {
    pub center: Vec2,
    /// Half-width at size step zero
    base_half_width: f32,
    half_height: f32,
    size_step: f32,
    max_size_steps: i32,
    /// Grow (+) / shrink (-) steps from the default size
    size_steps: i32,
    pub types: PaddleTypes,
    /// Horizontal velocity over the last tick
    velocity_x: f32,
    avg_velocity_x: f32,
    /// Requested movement in [-1, 1]
    move_input: f32,
    speed: f32,
    poison_factor: f32,
    /// Travel limits for the paddle centre
    min_x: f32,
    max_x: f32,
    /// At most one ball may be stuck to the paddle, with its offset from centre
    attached: Option<(BallId, Vec2)>,
    time_since_last_shot: f32,
    /// Set while a laser beam is attached to this paddle
    pub beam_attached: bool,
}

impl Paddle {
    pub fn new(center: Vec2, min_x: f32, max_x: f32, tuning: &Tuning) -> Self {
        Self {
            center,
            base_half_width: tuning.paddle_half_width,
            half_height: tuning.paddle_half_height,
            size_step: tuning.paddle_size_step,
            max_size_steps: tuning.paddle_max_size_steps,
            size_steps: 0,
            types: PaddleTypes::empty(),
            velocity_x: 0.0,
            avg_velocity_x: 0.0,
            move_input: 0.0,
            speed: tuning.paddle_speed,
            poison_factor: tuning.poison_speed_factor,
            min_x,
            max_x,
            attached: None,
            time_since_last_shot: f32::MAX,
            beam_attached: false,
        }
    }

    #[inline]
    pub fn half_width(&self) -> f32 {
        (self.base_half_width + self.size_steps as f32 * self.size_step).max(self.size_step * 0.5)
    }

    #[inline]
    pub fn half_height(&self) -> f32 {
        self.half_height
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.center, Vec2::new(self.half_width(), self.half_height))
    }

    #[inline]
    pub fn top_y(&self) -> f32 {
        self.center.y + self.half_height
    }

    /// Velocity over the last tick
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        Vec2::new(self.velocity_x, 0.0)
    }

    /// Smoothed velocity, used for release angles and ball kicks
    #[inline]
    pub fn average_velocity(&self) -> Vec2 {
        Vec2::new(self.avg_velocity_x, 0.0)
    }

    pub fn has_type(&self, t: PaddleTypes) -> bool {
        self.types.contains(t)
    }

    pub fn add_type(&mut self, t: PaddleTypes) {
        self.types.insert(t);
    }

    pub fn remove_type(&mut self, t: PaddleTypes) {
        self.types.remove(t);
    }

    pub fn set_travel_limits(&mut self, min_x: f32, max_x: f32) {
        debug_assert!(min_x <= max_x);
        self.min_x = min_x;
        self.max_x = max_x;
        self.clamp_to_limits();
    }

    pub fn travel_limits(&self) -> (f32, f32) {
        (self.min_x, self.max_x)
    }

    /// Request movement; `direction` is -1 (left), 0 or 1 (right)
    pub fn move_paddle(&mut self, direction: f32, magnitude: f32) {
        let mut input = direction.signum() * magnitude.clamp(0.0, 1.0);
        if direction == 0.0 {
            input = 0.0;
        }
        if self.has_type(PaddleTypes::REVERSED) {
            input = -input;
        }
        self.move_input = input;
    }

    pub fn current_speed(&self) -> f32 {
        if self.has_type(PaddleTypes::POISON) {
            self.speed * self.poison_factor
        } else {
            self.speed
        }
    }

    /// Integrate movement for this tick
    pub fn tick(&mut self, dt: f32) {
        self.time_since_last_shot = (self.time_since_last_shot + dt).min(f32::MAX);
        if dt <= 0.0 {
            return;
        }
        let prev_x = self.center.x;
        self.center.x += self.move_input * self.current_speed() * dt;
        self.clamp_to_limits();
        self.velocity_x = (self.center.x - prev_x) / dt;
        let blend = 1.0 - (-AVG_VELOCITY_RATE * dt).exp();
        self.avg_velocity_x += (self.velocity_x - self.avg_velocity_x) * blend;
    }

    /// Stop dead, e.g. while paused or dying
    pub fn halt(&mut self) {
        self.move_input = 0.0;
        self.velocity_x = 0.0;
        self.avg_velocity_x = 0.0;
    }

    fn clamp_to_limits(&mut self) {
        let hw = self.half_width();
        let lo = self.min_x + hw;
        let hi = (self.max_x - hw).max(lo);
        self.center.x = self.center.x.clamp(lo, hi);
    }

    /// Push the paddle sideways by `dx`, respecting travel limits
    pub fn shunt(&mut self, dx: f32) {
        self.center.x += dx;
        self.clamp_to_limits();
    }

    /// Grow one size step; returns false when already at max
    pub fn grow(&mut self) -> bool {
        if self.size_steps >= self.max_size_steps {
            return false;
        }
        self.size_steps += 1;
        self.clamp_to_limits();
        true
    }

    /// Shrink one size step; returns false when already at min
    pub fn shrink(&mut self) -> bool {
        if self.size_steps <= -self.max_size_steps {
            return false;
        }
        self.size_steps -= 1;
        true
    }

    pub fn reset_size(&mut self) {
        self.size_steps = 0;
        self.clamp_to_limits();
    }

    pub fn size_steps(&self) -> i32 {
        self.size_steps
    }

    /// Where a ball resting on the paddle top centre sits
    pub fn ball_rest_position(&self, radius: f32) -> Vec2 {
        Vec2::new(self.center.x, self.top_y() + radius + EPSILON)
    }

    pub fn attach_ball(&mut self, ball: &Ball) -> bool {
        if self.attached.is_some() {
            return false;
        }
        let offset = Vec2::new(
            (ball.center.x - self.center.x).clamp(-self.half_width(), self.half_width()),
            self.half_height + ball.radius + EPSILON,
        );
        self.attached = Some((ball.id, offset));
        true
    }

    pub fn attached_ball(&self) -> Option<BallId> {
        self.attached.map(|(id, _)| id)
    }

    /// Position the attached ball should be at
    pub fn attached_ball_position(&self) -> Option<Vec2> {
        self.attached.map(|(_, offset)| self.center + offset)
    }

    pub fn detach_ball(&mut self) -> Option<BallId> {
        self.attached.take().map(|(id, _)| id)
    }

    /// Swept test of a ball against the paddle, in the paddle's frame of reference
    pub fn collision_check(&self, ball: &Ball, dt: f32) -> Option<Contact> {
        let relative = ball.velocity() - self.velocity();
        sweep_circle_aabb(ball.center, ball.radius, relative, dt, &self.bounds())
    }

    /// Fire-rate gate for laser bullets held down continuously
    pub fn ready_to_shoot(&self, delay: f32) -> bool {
        self.time_since_last_shot >= delay
    }

    pub fn shot_fired(&mut self) {
        self.time_since_last_shot = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paddle() -> Paddle {
        Paddle::new(Vec2::new(10.0, 1.0), 0.0, 20.0, &Tuning::default())
    }

    #[test]
    fn test_movement_clamped_to_limits() {
        let mut p = paddle();
        p.move_paddle(1.0, 1.0);
        for _ in 0..600 {
            p.tick(SIM_DT);
        }
        assert!((p.center.x - (20.0 - p.half_width())).abs() < 1e-4);
        assert_eq!(p.velocity().x, 0.0);
    }

    #[test]
    fn test_reversed_and_poison() {
        let mut p = paddle();
        p.add_type(PaddleTypes::REVERSED | PaddleTypes::POISON);
        p.move_paddle(1.0, 1.0);
        p.tick(0.1);
        let t = Tuning::default();
        let expected = -t.paddle_speed * t.poison_speed_factor * 0.1;
        assert!((p.center.x - (10.0 + expected)).abs() < 1e-4);
    }

    #[test]
    fn test_average_velocity_smooths() {
        let mut p = paddle();
        p.move_paddle(1.0, 1.0);
        p.tick(SIM_DT);
        assert!(p.average_velocity().x > 0.0);
        assert!(p.average_velocity().x < p.velocity().x);
    }

    #[test]
    fn test_size_steps_are_bounded() {
        let mut p = paddle();
        let base = p.half_width();
        assert!(p.grow());
        assert!(p.grow());
        assert!(!p.grow());
        assert!(p.half_width() > base);
        p.reset_size();
        assert!(p.shrink());
        assert!(p.shrink());
        assert!(!p.shrink());
        assert!(p.half_width() > 0.0);
    }

    #[test]
    fn test_sticky_holds_one_ball() {
        let mut p = paddle();
        let a = Ball::new(BallId(1), Vec2::new(11.0, 2.0), 10.0);
        let b = Ball::new(BallId(2), Vec2::new(9.0, 2.0), 10.0);
        assert!(p.attach_ball(&a));
        assert!(!p.attach_ball(&b));
        p.center.x += 2.0;
        let pos = p.attached_ball_position().unwrap();
        assert!((pos.x - 13.0).abs() < 1e-5);
        assert_eq!(p.detach_ball(), Some(BallId(1)));
        assert_eq!(p.attached_ball(), None);
    }

    #[test]
    fn test_collision_from_above() {
        let p = paddle();
        let mut ball = Ball::new(BallId(1), Vec2::new(10.0, 3.0), 10.0);
        ball.set_direction(Vec2::NEG_Y);
        let contact = p.collision_check(&ball, 0.2).unwrap();
        assert!((contact.normal - Vec2::Y).length() < 1e-5);
        // top at 1.5, ball bottom at 2.5: one unit at 10 u/s
        assert!((contact.time_until_collision - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_shot_delay() {
        let mut p = paddle();
        assert!(p.ready_to_shoot(0.25));
        p.shot_fired();
        assert!(!p.ready_to_shoot(0.25));
        p.tick(0.3);
        assert!(p.ready_to_shoot(0.25));
    }
}
