//! Notifications raised by the simulation
//!
//! Each visible state change pushes exactly one event after the change is
//! committed. Views and audio drain the queue once per frame.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::ball::BallId;
use super::beam::BeamId;
use super::item::{ItemId, ItemKind, TimerId};
use super::level::PieceId;
use super::projectile::{ProjectileId, ProjectileKind};
use super::state::GameStateKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    StateChanged { from: Option<GameStateKind>, to: GameStateKind },

    // === Balls ===
    BallSpawned { ball: BallId },
    BallLaunched { ball: BallId },
    BallDied { ball: BallId },
    /// The last ball went out; its death sequence starts
    LastBallAboutToDie { ball: BallId },
    LastBallExploded { ball: BallId },
    BallPaddleCollision { ball: BallId },
    BallBallCollision { a: BallId, b: BallId },
    BallPieceCollision { ball: BallId, piece: PieceId },
    BallSafetyNetCollision { ball: BallId, top: bool },
    BallTeslaArcCollision { ball: BallId },
    BallBossCollision { ball: BallId, part: usize },
    BallPortalTeleport { ball: BallId, from: PieceId, to: PieceId },
    BallBoosted { direction: Vec2 },
    BulletTimeStarted,

    // === Level ===
    PieceDestroyed { piece: PieceId },
    PieceStatusAdded { piece: PieceId, status: u32 },
    PieceStatusRemoved { piece: PieceId, status: u32 },
    TeslaToggled { piece: PieceId, active: bool },
    BossPartDestroyed { part: usize },
    BossDefeated,
    SafetyNetCreated { top: bool },
    SafetyNetDestroyed { top: bool },
    PaddleHitByBoss,

    // === Score ===
    ScoreChanged { score: u64 },
    ScoreMultiplierChanged { multiplier: u32 },
    LivesChanged { from: u32, to: u32 },

    // === Items ===
    ItemSpawned { item: ItemId, kind: ItemKind },
    ItemRemoved { item: ItemId },
    ItemPaddleCollision { item: ItemId, kind: ItemKind },
    ItemActivated { kind: ItemKind },
    ItemDeactivated { kind: ItemKind },
    ItemTimerStarted { timer: TimerId, kind: ItemKind },
    ItemTimerStopped { timer: TimerId, kind: ItemKind },

    // === Projectiles / beams ===
    ProjectileSpawned { projectile: ProjectileId, kind: ProjectileKind },
    ProjectileRemoved { projectile: ProjectileId, kind: ProjectileKind },
    BeamSpawned { beam: BeamId },
    BeamRemoved { beam: BeamId },

    // === Progress ===
    LevelStarted { world: usize, level: usize },
    LevelCompleted { world: usize, level: usize },
    WorldStarted { world: usize },
    WorldCompleted { world: usize },
    GameCompleted,
    GameOver,
}
