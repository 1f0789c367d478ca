//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (grid order for pieces, spawn order for balls)
//! - No rendering or platform dependencies

pub mod ball;
pub mod beam;
pub mod boost;
pub mod boss;
pub mod collision;
pub mod events;
pub mod item;
pub mod level;
pub mod model;
pub mod paddle;
pub mod projectile;
pub mod resolve;
pub mod safety_net;
pub mod state;

pub use ball::{Ball, BallId, BallTypes, Collidable};
pub use beam::{Beam, BeamId};
pub use boost::{BallBoostModel, BulletTimeState};
pub use boss::{Boss, BossBodyPart};
pub use collision::{Aabb, Contact, sweep_circle_aabb, sweep_circle_circle, sweep_circle_segment};
pub use events::GameEvent;
pub use item::{GameItem, GameItemTimer, ItemDisposition, ItemId, ItemKind, TimerCategory, TimerId};
pub use level::{GameLevel, GameWorld, LevelParseError, LevelPiece, PieceId, PieceKind, PieceStatus, TeslaArc};
pub use model::{GameModel, PauseFlags, PieceHitOutcome};
pub use paddle::{Paddle, PaddleTypes};
pub use projectile::{Projectile, ProjectileId, ProjectileKind};
pub use resolve::{BounceLimits, do_ball_ball_collision, do_ball_collision, do_ball_paddle_collision};
pub use safety_net::SafetyNet;
pub use state::{GameState, GameStateKind, StateTransition};
