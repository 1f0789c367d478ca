//! Blammo - ball-in-play physics and game flow for a breakout-style arcade game
//!
//! Core modules:
//! - `anim`: Keyframed linear-interpolation timelines
//! - `sim`: Deterministic simulation (collisions, entities, model, state machine)
//! - `tuning`: Data-driven game balance
//!
//! Rendering, audio, menus and input devices live outside this crate; they read
//! snapshots from [`sim::GameModel`] and drain its [`sim::GameEvent`] queue.

pub mod anim;
pub mod sim;
pub mod tuning;

pub use anim::{AnimationLerp, AnimationMultiLerp, Interpolant, Lerp};
pub use tuning::Tuning;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz for smooth physics)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Tolerance used for time brackets and near-zero vectors
    pub const EPSILON: f32 = 1e-5;

    /// Bounces off level geometry never leave closer than this to the surface normal's perpendicular
    pub const MIN_BALL_ANGLE_IN_DEGS: f32 = 20.0;
    /// Bounces off level geometry never leave further than this from the surface normal
    pub const MAX_GRACING_ANGLE_ON_HIT_IN_DEGS: f32 = 75.0;

    /// Fraction of the ball's speed a moving collidable must exceed before it adds an impulse
    pub const LINE_VELOCITY_IMPULSE_FRACTION: f32 = 0.66;

    /// Units per level grid cell
    pub const PIECE_WIDTH: f32 = 2.5;
    pub const PIECE_HEIGHT: f32 = 1.0;
    /// Extra space around the level before things count as out of bounds
    pub const OUT_OF_BOUNDS_BUFFER_SPACE: f32 = 10.0;
    /// Anything below this is lost
    pub const Y_COORD_OF_DEATH: f32 = -1.0;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 0.5;
    pub const ZERO_SPEED: f32 = 0.0;
}

/// Rotate a vector counter-clockwise by the given angle in degrees
#[inline]
pub fn rotate_degs(v: Vec2, degs: f32) -> Vec2 {
    Vec2::from_angle(degs.to_radians()).rotate(v)
}

/// Unsigned angle between two unit vectors in degrees, in [0, 180]
#[inline]
pub fn angle_between_degs(a: Vec2, b: Vec2) -> f32 {
    a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Mirror `v` about the plane with unit normal `n`
#[inline]
pub fn reflect(v: Vec2, n: Vec2) -> Vec2 {
    v - 2.0 * v.dot(n) * n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_degs_quarter_turn() {
        let v = rotate_degs(Vec2::X, 90.0);
        assert!(v.x.abs() < 1e-5);
        assert!((v.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_angle_between() {
        assert!((angle_between_degs(Vec2::X, Vec2::Y) - 90.0).abs() < 1e-3);
        assert!(angle_between_degs(Vec2::X, Vec2::X).abs() < 1e-2);
        assert!((angle_between_degs(Vec2::X, -Vec2::X) - 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_reflect() {
        let r = reflect(Vec2::new(1.0, -1.0), Vec2::Y);
        assert!((r - Vec2::new(1.0, 1.0)).length() < 1e-6);
    }
}
