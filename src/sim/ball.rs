//! The game ball
//!
//! Position, speed and direction are kept separately: direction is always a
//! unit vector and speed is one of the tuned speed tiers, so collision
//! responses can rotate the direction without ever drifting the speed.

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::{Aabb, Contact, sweep_circle_circle};
use super::level::PieceId;
use crate::consts::*;
use crate::tuning::Tuning;

/// Stable handle for a ball; balls are looked up by id, never by reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BallId(pub u32);

bitflags! {
    /// Combinable ball modifiers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct BallTypes: u32 {
        /// Blasts through breakable pieces without bouncing
        const UBER      = 1 << 0;
        /// Rendered invisible
        const INVISIBLE = 1 << 1;
        /// Randomly phases through pieces
        const GHOST     = 1 << 2;
        /// Pulled downward; bounces lean toward the surface normal
        const GRAVITY   = 1 << 3;
        /// Direction wobbles randomly
        const CRAZY     = 1 << 4;
        /// Sets pieces on fire
        const FIRE      = 1 << 5;
        /// Freezes pieces
        const ICE       = 1 << 6;
        /// Held at a slower speed tier
        const SLOW      = 1 << 7;
        /// Held at a faster speed tier
        const FAST      = 1 << 8;
    }
}

/// Anything a ball can remember bouncing off last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collidable {
    Paddle,
    Ball(BallId),
    Piece(PieceId),
    SafetyNet { top: bool },
    TeslaArc(PieceId, PieceId),
    BossPart(usize),
}

/// A ball entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: BallId,
    pub center: Vec2,
    pub radius: f32,
    /// Unit direction of travel
    direction: Vec2,
    /// Scalar speed in units/sec
    speed: f32,
    pub types: BallTypes,
    /// Non-owning memory of the last thing bounced off, cleared when that thing goes away
    pub last_thing_collided_with: Option<Collidable>,
    /// Extra speed added on top of `speed`, decays at `impulse_decel` units/sec²
    impulse_amount: f32,
    impulse_decel: f32,
    pub alpha: f32,
    /// Seconds since the last collision response
    pub time_since_last_collision: f32,
    /// Ball-ball collisions are off while positive
    ball_collisions_disabled_timer: f32,
    /// Blocks and bosses are ignored while set
    pub block_collisions_disabled: bool,
    /// Downward acceleration (units/sec²) applied while carrying [`BallTypes::GRAVITY`]
    gravity_accel: f32,
}

impl Ball {
    pub fn new(id: BallId, center: Vec2, speed: f32) -> Self {
        Self {
            id,
            center,
            radius: BALL_RADIUS,
            direction: Vec2::Y,
            speed,
            types: BallTypes::empty(),
            last_thing_collided_with: None,
            impulse_amount: 0.0,
            impulse_decel: 0.0,
            alpha: 1.0,
            time_since_last_collision: 0.0,
            ball_collisions_disabled_timer: 0.0,
            block_collisions_disabled: false,
            gravity_accel: 0.0,
        }
    }

    /// Copy of this ball under a new id, used when splitting for multiball
    pub fn split(&self, id: BallId, direction: Vec2) -> Self {
        let mut copy = self.clone();
        copy.id = id;
        copy.set_velocity(self.speed, direction);
        copy.last_thing_collided_with = None;
        copy
    }

    #[inline]
    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Speed including any live impulse
    #[inline]
    pub fn effective_speed(&self) -> f32 {
        self.speed + self.impulse_amount
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.direction * self.effective_speed()
    }

    pub fn set_velocity(&mut self, speed: f32, direction: Vec2) {
        self.speed = speed;
        self.direction = direction.normalize_or(self.direction);
    }

    pub fn set_direction(&mut self, direction: Vec2) {
        self.direction = direction.normalize_or(self.direction);
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn has_type(&self, t: BallTypes) -> bool {
        self.types.contains(t)
    }

    pub fn add_type(&mut self, t: BallTypes) {
        self.types.insert(t);
    }

    pub fn remove_type(&mut self, t: BallTypes) {
        self.types.remove(t);
    }

    pub fn remove_all_types(&mut self) {
        self.types = BallTypes::empty();
        self.gravity_accel = 0.0;
    }

    pub fn set_gravity(&mut self, accel: f32) {
        self.gravity_accel = accel;
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.center, Vec2::splat(self.radius))
    }

    /// Step up one speed tier (no-op at the fastest)
    pub fn increase_speed(&mut self, tuning: &Tuning) {
        self.speed = tuning.next_faster_speed(self.speed);
    }

    /// Step down one speed tier (no-op at the slowest)
    pub fn decrease_speed(&mut self, tuning: &Tuning) {
        self.speed = tuning.next_slower_speed(self.speed);
    }

    pub fn apply_impulse(&mut self, amount: f32, decel: f32) {
        debug_assert!(amount >= 0.0 && decel > 0.0);
        self.impulse_amount += amount;
        self.impulse_decel = decel;
    }

    pub fn impulse(&self) -> f32 {
        self.impulse_amount
    }

    /// Reset the collision clock after a collision response
    pub fn ball_collided(&mut self) {
        self.time_since_last_collision = 0.0;
    }

    pub fn set_ball_collisions_disabled(&mut self, seconds: f32) {
        debug_assert!(seconds > 0.0);
        self.ball_collisions_disabled_timer = seconds;
    }

    pub fn set_ball_collisions_enabled(&mut self) {
        self.ball_collisions_disabled_timer = 0.0;
    }

    pub fn can_collide_with_other_balls(&self) -> bool {
        self.ball_collisions_disabled_timer <= 0.0
    }

    /// Swept circle test against another ball over the next `dt`, skipped
    /// while either ball has ball-ball collisions disabled
    pub fn collision_check(&self, other: &Ball, dt: f32) -> Option<Contact> {
        if !self.can_collide_with_other_balls() || !other.can_collide_with_other_balls() {
            return None;
        }
        sweep_circle_circle(
            self.center,
            self.radius,
            self.velocity(),
            other.center,
            other.radius,
            other.velocity(),
            dt,
        )
    }

    /// Advance timers and, when `apply_movement` is set, integrate position.
    ///
    /// `apply_movement` is false for a ball whose position was already placed by
    /// a collision response this tick.
    pub fn tick(&mut self, dt: f32, apply_movement: bool) {
        self.time_since_last_collision += dt;
        if self.ball_collisions_disabled_timer > 0.0 {
            self.ball_collisions_disabled_timer = (self.ball_collisions_disabled_timer - dt).max(0.0);
        }

        if self.has_type(BallTypes::GRAVITY) && self.gravity_accel > 0.0 {
            let v = self.direction * self.speed + Vec2::NEG_Y * self.gravity_accel * dt;
            self.direction = v.normalize_or(self.direction);
        }

        if apply_movement {
            self.center += self.velocity() * dt;
        }

        if self.impulse_amount > 0.0 {
            self.impulse_amount = (self.impulse_amount - self.impulse_decel * dt).max(0.0);
        }
    }
}
