//! Ball boost and bullet time
//!
//! Boost charges build up while balls are in play. Holding a boost direction
//! slows the world down so the player can aim; letting go fires every ball
//! along that direction and spends a charge.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::anim::AnimationLerp;
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulletTimeState {
    NotInBulletTime,
    /// Easing the time scale down
    FadingIn,
    InBulletTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallBoostModel {
    charges: u32,
    max_charges: u32,
    charge_time: f32,
    charge_timer: f32,
    state: BulletTimeState,
    held_time: f32,
    max_hold: f32,
    direction: Vec2,
    #[serde(skip)]
    time_scale: AnimationLerp<f32>,
    bullet_time_scale: f32,
    fade_in: f32,
}

impl BallBoostModel {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            charges: 0,
            max_charges: tuning.boost_max_charges,
            charge_time: tuning.boost_charge_time,
            charge_timer: 0.0,
            state: BulletTimeState::NotInBulletTime,
            held_time: 0.0,
            max_hold: tuning.bullet_time_max_duration,
            direction: Vec2::ZERO,
            time_scale: AnimationLerp::new(1.0),
            bullet_time_scale: tuning.bullet_time_scale,
            fade_in: tuning.bullet_time_fade_in,
        }
    }

    pub fn charges(&self) -> u32 {
        self.charges
    }

    pub fn state(&self) -> BulletTimeState {
        self.state
    }

    pub fn is_in_bullet_time(&self) -> bool {
        self.state != BulletTimeState::NotInBulletTime
    }

    /// Multiplier to apply to simulation dt
    pub fn time_scale(&self) -> f32 {
        if self.is_in_bullet_time() { self.time_scale.value() } else { 1.0 }
    }

    /// Advance by real (unscaled) time; returns a boost direction if bullet time ran out while held
    pub fn tick(&mut self, dt: f32) -> Option<Vec2> {
        match self.state {
            BulletTimeState::NotInBulletTime => {
                if self.charges < self.max_charges {
                    self.charge_timer += dt;
                    if self.charge_timer >= self.charge_time {
                        self.charge_timer -= self.charge_time;
                        self.charges += 1;
                    }
                }
                None
            }
            BulletTimeState::FadingIn | BulletTimeState::InBulletTime => {
                if self.time_scale.tick(dt) {
                    self.state = BulletTimeState::InBulletTime;
                }
                self.held_time += dt;
                if self.held_time >= self.max_hold {
                    return self.boost_direction_released();
                }
                None
            }
        }
    }

    /// Start aiming; false if no charge is available
    pub fn boost_direction_pressed(&mut self, direction: Vec2) -> bool {
        if direction.length_squared() == 0.0 {
            return false;
        }
        self.direction = direction.normalize();
        if self.is_in_bullet_time() {
            return true;
        }
        if self.charges == 0 {
            return false;
        }
        self.state = BulletTimeState::FadingIn;
        self.held_time = 0.0;
        self.time_scale.set_lerp(0.0, self.fade_in, 1.0, self.bullet_time_scale);
        true
    }

    /// Fire; returns the boost direction when a charge was spent
    pub fn boost_direction_released(&mut self) -> Option<Vec2> {
        if !self.is_in_bullet_time() {
            return None;
        }
        self.state = BulletTimeState::NotInBulletTime;
        self.time_scale.clear_lerp();
        self.time_scale.set_value(1.0);
        self.charges -= 1;
        Some(self.direction)
    }

    /// Drop out of bullet time without boosting (e.g. the ball died)
    pub fn cancel(&mut self) {
        self.state = BulletTimeState::NotInBulletTime;
        self.time_scale.clear_lerp();
        self.time_scale.set_value(1.0);
    }

    pub fn reset(&mut self) {
        self.cancel();
        self.charges = 0;
        self.charge_timer = 0.0;
    }
}
