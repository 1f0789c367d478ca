//! Paddle laser beam

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::level::{GameLevel, PieceId};
use crate::consts::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BeamId(pub u32);

/// A vertical laser from the paddle top to the first piece above it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beam {
    pub id: BeamId,
    pub origin: Vec2,
    pub end: Vec2,
    /// Piece currently absorbing the beam
    pub target: Option<PieceId>,
    time_left: f32,
    /// Damage dealt to `target` not yet converted into a hit
    damage: f32,
}

impl Beam {
    pub fn new(id: BeamId, origin: Vec2, duration: f32) -> Self {
        debug_assert!(duration > 0.0);
        Self { id, origin, end: origin, target: None, time_left: duration, damage: 0.0 }
    }

    pub fn time_left(&self) -> f32 {
        self.time_left
    }

    /// Re-aim from `origin` straight up until something stops the beam
    pub fn trace(&mut self, origin: Vec2, level: &GameLevel) {
        self.origin = origin;
        let col = (origin.x / PIECE_WIDTH).floor();
        let mut target = None;
        if col >= 0.0 && (col as usize) < level.width() {
            let start_row = (origin.y / PIECE_HEIGHT).floor().max(0.0) as usize;
            target = (start_row..level.height())
                .filter_map(|row| level.piece_at(row, col as usize))
                .find(|p| p.ball_bounces_off_when_hit() && p.bounds().min.y >= origin.y - EPSILON)
                .map(|p| p.id);
        }
        if target != self.target {
            self.damage = 0.0;
        }
        self.target = target;
        self.end = match target {
            Some(id) => Vec2::new(origin.x, level.piece(id).bounds().min.y),
            None => Vec2::new(origin.x, level.unit_height() + OUT_OF_BOUNDS_BUFFER_SPACE),
        };
    }

    /// Advance; returns the number of whole hits to deal to `target` and whether the beam has run out
    pub fn tick(&mut self, dt: f32, damage_per_second: f32) -> (u32, bool) {
        self.time_left -= dt;
        let mut hits = 0;
        if self.target.is_some() {
            self.damage += damage_per_second * dt;
            while self.damage >= 1.0 {
                self.damage -= 1.0;
                hits += 1;
            }
        }
        (hits, self.time_left <= 0.0)
    }
}
