//! Falling power-ups and the timers that keep their effects alive

use std::collections::BTreeSet;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ball::BallId;
use super::collision::Aabb;

/// Whether an item helps or hurts the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemDisposition {
    Good,
    Bad,
    Neutral,
}

/// Items that replace one another: at most one timer per category is live
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimerCategory {
    BallSpeed,
    BallUber,
    BallGhost,
    BallInvisible,
    BallGravity,
    BallCrazy,
    /// Fire and ice cancel each other out
    BallElement,
    PaddleSticky,
    PaddleLaserBullet,
    PaddleLaserBeam,
    PaddleShield,
    PaddlePoison,
    PaddleReversed,
}

/// Every item a piece can drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    BallSlow,
    BallFast,
    UberBall,
    GhostBall,
    InvisiBall,
    GravityBall,
    CrazyBall,
    FireBall,
    IceBall,
    MultiBall3,
    MultiBall5,
    PaddleGrow,
    PaddleShrink,
    StickyPaddle,
    LaserBulletPaddle,
    LaserBeamPaddle,
    ShieldPaddle,
    PoisonPaddle,
    OneUp,
    BallSafetyNet,
    UpsideDownPaddle,
    RocketPaddle,
}

impl ItemKind {
    pub const ALL: [ItemKind; 22] = [
        ItemKind::BallSlow,
        ItemKind::BallFast,
        ItemKind::UberBall,
        ItemKind::GhostBall,
        ItemKind::InvisiBall,
        ItemKind::GravityBall,
        ItemKind::CrazyBall,
        ItemKind::FireBall,
        ItemKind::IceBall,
        ItemKind::MultiBall3,
        ItemKind::MultiBall5,
        ItemKind::PaddleGrow,
        ItemKind::PaddleShrink,
        ItemKind::StickyPaddle,
        ItemKind::LaserBulletPaddle,
        ItemKind::LaserBeamPaddle,
        ItemKind::ShieldPaddle,
        ItemKind::PoisonPaddle,
        ItemKind::OneUp,
        ItemKind::BallSafetyNet,
        ItemKind::UpsideDownPaddle,
        ItemKind::RocketPaddle,
    ];

    pub fn disposition(&self) -> ItemDisposition {
        use ItemKind::*;
        match self {
            BallSlow | UberBall | MultiBall3 | MultiBall5 | PaddleGrow | StickyPaddle
            | LaserBulletPaddle | LaserBeamPaddle | ShieldPaddle | OneUp | BallSafetyNet
            | FireBall | IceBall | RocketPaddle => ItemDisposition::Good,
            BallFast | InvisiBall | PaddleShrink | PoisonPaddle | UpsideDownPaddle | CrazyBall => {
                ItemDisposition::Bad
            }
            GhostBall | GravityBall => ItemDisposition::Neutral,
        }
    }

    /// Timer category, or `None` for one-shot items
    pub fn timer_category(&self) -> Option<TimerCategory> {
        use ItemKind::*;
        Some(match self {
            BallSlow | BallFast => TimerCategory::BallSpeed,
            UberBall => TimerCategory::BallUber,
            GhostBall => TimerCategory::BallGhost,
            InvisiBall => TimerCategory::BallInvisible,
            GravityBall => TimerCategory::BallGravity,
            CrazyBall => TimerCategory::BallCrazy,
            FireBall | IceBall => TimerCategory::BallElement,
            StickyPaddle => TimerCategory::PaddleSticky,
            LaserBulletPaddle => TimerCategory::PaddleLaserBullet,
            LaserBeamPaddle => TimerCategory::PaddleLaserBeam,
            ShieldPaddle => TimerCategory::PaddleShield,
            PoisonPaddle => TimerCategory::PaddlePoison,
            UpsideDownPaddle => TimerCategory::PaddleReversed,
            MultiBall3 | MultiBall5 | PaddleGrow | PaddleShrink | OneUp | BallSafetyNet | RocketPaddle => {
                return None;
            }
        })
    }

    /// Effect length in seconds given the default timer length (0 = instant)
    pub fn duration(&self, timer_length: f32) -> f32 {
        if self.timer_category().is_some() { timer_length } else { 0.0 }
    }

    /// Effects tied to particular balls end early when all of those balls die
    pub fn is_ball_scoped(&self) -> bool {
        matches!(self.timer_category(), Some(c) if c <= TimerCategory::BallElement)
    }

    /// Uniform pick across the catalogue
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Half extents of a falling item
pub const ITEM_HALF_EXTENTS: Vec2 = Vec2::new(1.0, 0.5);

/// A falling item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub center: Vec2,
    pub fall_speed: f32,
}

impl GameItem {
    pub fn new(id: ItemId, kind: ItemKind, center: Vec2, fall_speed: f32) -> Self {
        Self { id, kind, center, fall_speed }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.center, ITEM_HALF_EXTENTS)
    }

    pub fn tick(&mut self, dt: f32) {
        self.center.y -= self.fall_speed * dt;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u32);

/// An activated item counting down to deactivation; owns its item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameItemTimer {
    pub id: TimerId,
    item: GameItem,
    length: f32,
    elapsed: f32,
    /// Balls this effect applies to (ball-scoped items only)
    associated_balls: BTreeSet<BallId>,
}

impl GameItemTimer {
    pub fn new(id: TimerId, item: GameItem, length: f32, balls: impl IntoIterator<Item = BallId>) -> Self {
        debug_assert!(length > 0.0);
        Self { id, item, length, elapsed: 0.0, associated_balls: balls.into_iter().collect() }
    }

    pub fn item(&self) -> &GameItem {
        &self.item
    }

    pub fn kind(&self) -> ItemKind {
        self.item.kind
    }

    pub fn category(&self) -> Option<TimerCategory> {
        self.item.kind.timer_category()
    }

    pub fn time_left(&self) -> f32 {
        (self.length - self.elapsed).max(0.0)
    }

    pub fn associated_balls(&self) -> &BTreeSet<BallId> {
        &self.associated_balls
    }

    pub fn is_associated_with(&self, ball: BallId) -> bool {
        self.associated_balls.contains(&ball)
    }

    pub fn associate_ball(&mut self, ball: BallId) {
        self.associated_balls.insert(ball);
    }

    /// Drop a ball from the association set; true when that empties a ball-scoped timer
    pub fn remove_ball(&mut self, ball: BallId) -> bool {
        self.associated_balls.remove(&ball)
            && self.item.kind.is_ball_scoped()
            && self.associated_balls.is_empty()
    }

    /// Advance; returns true once expired
    pub fn tick(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.length
    }
}
