//! Game balance knobs
//!
//! Loaded from JSON on native builds; every field has a default so partial
//! files are fine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Data-driven tuning injected into [`crate::sim::GameModel`] at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Lives ===
    pub initial_lives: u32,
    pub max_lives: u32,

    // === Scoring ===
    /// Interim blocks destroyed needed for the ×2, ×3 and ×4 multipliers
    pub multiplier_thresholds: [u32; 3],
    /// Points per destroyed block before the multiplier
    pub points_per_block: u64,

    // === Ghost ball ===
    /// Seconds a ghost ball keeps ignoring pieces once it starts phasing
    pub ghost_mode_length: f32,
    /// Per-hit chance (before dividing by ball count) that a ghost ball phases through
    pub ghost_block_miss_probability: f32,

    // === Bounce angles ===
    pub min_ball_angle_degs: f32,
    pub max_grazing_angle_degs: f32,

    // === Ball speed tiers (units/sec, ascending) ===
    pub slowest_speed: f32,
    pub slow_speed: f32,
    pub normal_speed: f32,
    pub fast_speed: f32,
    pub fastest_speed: f32,
    /// Downward pull on gravity balls (units/sec²)
    pub gravity_accel: f32,
    /// Max random wobble per second for crazy balls (degrees)
    pub crazy_ball_wobble_degs: f32,

    // === Paddle ===
    pub paddle_speed: f32,
    pub paddle_half_width: f32,
    pub paddle_half_height: f32,
    /// Half-width change per grow/shrink step
    pub paddle_size_step: f32,
    /// Number of grow (or shrink) steps allowed from the default size
    pub paddle_max_size_steps: i32,
    /// Random release spread when the paddle is still (degrees)
    pub paddle_release_rand_degs_still: f32,
    /// Random release spread when the paddle is moving (degrees)
    pub paddle_release_rand_degs_moving: f32,
    /// Seconds between laser bullets while the shoot button is held
    pub laser_bullet_delay: f32,
    /// Fraction of paddle speed kept while poisoned
    pub poison_speed_factor: f32,
    /// How fast a kick from a moving paddle or boss wears off (units/sec²)
    pub collision_impulse_decel: f32,

    // === Items ===
    pub item_timer_length: f32,
    pub item_fall_speed: f32,
    /// Chance a plain breakable piece drops an item when destroyed
    pub item_drop_probability: f32,
    /// Seconds ball-ball collisions stay off after a multiball split
    pub multiball_no_collision_time: f32,

    // === Projectiles / beams ===
    pub laser_bullet_speed: f32,
    pub rocket_speed: f32,
    /// Damage dealt per second by a paddle laser beam
    pub beam_damage_per_second: f32,
    /// Seconds a fired laser beam lasts
    pub beam_duration: f32,
    pub boss_part_hit_points: f32,

    // === Ball death ===
    pub death_spiral_time: f32,
    pub death_explosion_time: f32,
    /// Seconds spent in the dead phase before the next state
    pub death_dead_time: f32,

    // === Wormhole ===
    pub wormhole_travel_time: f32,

    // === Level flow ===
    /// Seconds shown on level/world complete before moving on
    pub level_complete_time: f32,

    // === Boost / bullet time ===
    pub boost_charge_time: f32,
    pub boost_max_charges: u32,
    pub bullet_time_scale: f32,
    /// Seconds to lerp into bullet time
    pub bullet_time_fade_in: f32,
    /// Longest bullet time can be held before it releases on its own
    pub bullet_time_max_duration: f32,
    pub boost_impulse: f32,
    pub boost_impulse_decel: f32,

    // === Piece status ===
    /// Seconds a burning piece lasts before it is destroyed
    pub fire_burn_time: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            initial_lives: 3,
            max_lives: 7,

            multiplier_thresholds: [3, 6, 9],
            points_per_block: 100,

            ghost_mode_length: 0.75,
            ghost_block_miss_probability: 0.5,

            min_ball_angle_degs: MIN_BALL_ANGLE_IN_DEGS,
            max_grazing_angle_degs: MAX_GRACING_ANGLE_ON_HIT_IN_DEGS,

            slowest_speed: 7.0,
            slow_speed: 12.0,
            normal_speed: 17.0,
            fast_speed: 22.0,
            fastest_speed: 27.0,
            gravity_accel: 6.0,
            crazy_ball_wobble_degs: 90.0,

            paddle_speed: 30.0,
            paddle_half_width: 2.5,
            paddle_half_height: 0.5,
            paddle_size_step: 1.0,
            paddle_max_size_steps: 2,
            paddle_release_rand_degs_still: 20.0,
            paddle_release_rand_degs_moving: 10.0,
            laser_bullet_delay: 0.25,
            poison_speed_factor: 0.5,
            collision_impulse_decel: 15.0,

            item_timer_length: 20.0,
            item_fall_speed: 5.0,
            item_drop_probability: 0.1,
            multiball_no_collision_time: 0.5,

            laser_bullet_speed: 25.0,
            rocket_speed: 12.0,
            beam_damage_per_second: 2.0,
            beam_duration: 2.5,
            boss_part_hit_points: 3.0,

            death_spiral_time: 1.25,
            death_explosion_time: 0.75,
            death_dead_time: 0.5,

            wormhole_travel_time: 1.0,

            level_complete_time: 1.5,

            boost_charge_time: 8.0,
            boost_max_charges: 3,
            bullet_time_scale: 0.1,
            bullet_time_fade_in: 0.25,
            bullet_time_max_duration: 2.0,
            boost_impulse: 20.0,
            boost_impulse_decel: 20.0,

            fire_burn_time: 2.0,
        }
    }
}

impl Tuning {
    /// Parse tuning from a JSON document (missing fields take defaults)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Read tuning from a file, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("Could not read tuning {}: {err}; using defaults", path.display());
                return Self::default();
            }
        };
        match Self::from_json(&json) {
            Ok(tuning) => {
                log::info!("Loaded tuning from {}", path.display());
                tuning
            }
            Err(err) => {
                log::warn!("Malformed tuning {}: {err}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Ball speed tiers from slowest to fastest
    pub fn speed_tiers(&self) -> [f32; 5] {
        [
            self.slowest_speed,
            self.slow_speed,
            self.normal_speed,
            self.fast_speed,
            self.fastest_speed,
        ]
    }

    /// The tier above `speed`, or the fastest tier
    pub fn next_faster_speed(&self, speed: f32) -> f32 {
        self.speed_tiers()
            .into_iter()
            .find(|&tier| tier > speed + EPSILON)
            .unwrap_or(self.fastest_speed)
    }

    /// The tier below `speed`, or the slowest tier
    pub fn next_slower_speed(&self, speed: f32) -> f32 {
        self.speed_tiers()
            .into_iter()
            .rev()
            .find(|&tier| tier < speed - EPSILON)
            .unwrap_or(self.slowest_speed)
    }

    /// Score multiplier for a run of blocks destroyed since the last paddle hit
    pub fn multiplier_for(&self, interim_blocks: u32) -> u32 {
        let [x2, x3, x4] = self.multiplier_thresholds;
        if interim_blocks >= x4 {
            4
        } else if interim_blocks >= x3 {
            3
        } else if interim_blocks >= x2 {
            2
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let tuning = Tuning::from_json(r#"{ "initial_lives": 5 }"#).unwrap();
        assert_eq!(tuning.initial_lives, 5);
        assert_eq!(tuning.max_lives, Tuning::default().max_lives);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(Tuning::from_json("{ initial_lives: }").is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let tuning = Tuning::default();
        let json = tuning.to_json().unwrap();
        assert_eq!(Tuning::from_json(&json).unwrap(), tuning);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let tuning = Tuning::load_or_default("/definitely/not/here.json");
        assert_eq!(tuning, Tuning::default());
    }

    #[test]
    fn test_speed_tiers_step_and_clamp() {
        let t = Tuning::default();
        assert_eq!(t.next_faster_speed(t.normal_speed), t.fast_speed);
        assert_eq!(t.next_faster_speed(t.fastest_speed), t.fastest_speed);
        assert_eq!(t.next_slower_speed(t.normal_speed), t.slow_speed);
        assert_eq!(t.next_slower_speed(t.slowest_speed), t.slowest_speed);
    }

    #[test]
    fn test_multiplier_steps() {
        let t = Tuning::default();
        let [x2, x3, x4] = t.multiplier_thresholds;
        assert_eq!(t.multiplier_for(0), 1);
        assert_eq!(t.multiplier_for(x2 - 1), 1);
        assert_eq!(t.multiplier_for(x2), 2);
        assert_eq!(t.multiplier_for(x3), 3);
        assert_eq!(t.multiplier_for(x4), 4);
        assert_eq!(t.multiplier_for(x4 + 100), 4);
    }
}
