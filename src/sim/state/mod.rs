//! Game state machine
//!
//! Exactly one [`GameState`] is current. A state never replaces itself: it
//! stages a [`StateTransition`] on the model, and the model swaps states at
//! the start of its next tick.

mod death;
mod in_play;
mod level_flow;
mod on_paddle;
mod wormhole;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::ball::BallId;
use super::level::PieceId;
use super::model::{GameModel, PauseFlags};

pub use death::{BallDeathState, DeathPhase};
pub use in_play::BallInPlayState;
pub use level_flow::{LevelCompleteState, LevelStartState, WorldCompleteState};
pub use on_paddle::BallOnPaddleState;
pub use wormhole::BallWormholeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStateKind {
    LevelStart,
    BallOnPaddle,
    BallInPlay,
    BallDeath,
    BallWormhole,
    LevelComplete,
    WorldComplete,
    GameComplete,
    GameOver,
}

/// A staged state change, carrying whatever the next state needs to start
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateTransition {
    LevelStart,
    BallOnPaddle,
    BallInPlay,
    /// The last ball left play
    BallDeath { ball: BallId },
    /// The only ball fell into a portal
    BallWormhole { ball: BallId, from: PieceId, to: PieceId },
    LevelComplete,
    WorldComplete,
    GameComplete,
    GameOver,
}

impl StateTransition {
    pub fn kind(&self) -> GameStateKind {
        match self {
            StateTransition::LevelStart => GameStateKind::LevelStart,
            StateTransition::BallOnPaddle => GameStateKind::BallOnPaddle,
            StateTransition::BallInPlay => GameStateKind::BallInPlay,
            StateTransition::BallDeath { .. } => GameStateKind::BallDeath,
            StateTransition::BallWormhole { .. } => GameStateKind::BallWormhole,
            StateTransition::LevelComplete => GameStateKind::LevelComplete,
            StateTransition::WorldComplete => GameStateKind::WorldComplete,
            StateTransition::GameComplete => GameStateKind::GameComplete,
            StateTransition::GameOver => GameStateKind::GameOver,
        }
    }
}

#[derive(Debug, Clone)]
pub enum GameState {
    LevelStart(LevelStartState),
    BallOnPaddle(BallOnPaddleState),
    BallInPlay(BallInPlayState),
    BallDeath(BallDeathState),
    BallWormhole(BallWormholeState),
    LevelComplete(LevelCompleteState),
    WorldComplete(WorldCompleteState),
    GameComplete,
    GameOver,
}

impl GameState {
    /// Build the state a transition asks for and run its entry actions
    pub(crate) fn enter(transition: StateTransition, model: &mut GameModel) -> Self {
        match transition {
            StateTransition::LevelStart => GameState::LevelStart(LevelStartState::enter(model)),
            StateTransition::BallOnPaddle => GameState::BallOnPaddle(BallOnPaddleState::enter(model)),
            StateTransition::BallInPlay => GameState::BallInPlay(BallInPlayState::enter(model)),
            StateTransition::BallDeath { ball } => GameState::BallDeath(BallDeathState::enter(model, ball)),
            StateTransition::BallWormhole { ball, from, to } => {
                GameState::BallWormhole(BallWormholeState::enter(model, ball, from, to))
            }
            StateTransition::LevelComplete => GameState::LevelComplete(LevelCompleteState::enter(model)),
            StateTransition::WorldComplete => GameState::WorldComplete(WorldCompleteState::enter(model)),
            StateTransition::GameComplete => {
                log::info!("Game complete, final score {}", model.score());
                model.push_event(super::events::GameEvent::GameCompleted);
                GameState::GameComplete
            }
            StateTransition::GameOver => {
                log::info!("Game over, final score {}", model.score());
                model.push_event(super::events::GameEvent::GameOver);
                GameState::GameOver
            }
        }
    }

    /// Exit actions, run just before the next state is entered
    pub(crate) fn exit(&mut self, model: &mut GameModel) {
        if let GameState::BallDeath(state) = self {
            state.exit(model);
        }
    }

    pub fn kind(&self) -> GameStateKind {
        match self {
            GameState::LevelStart(_) => GameStateKind::LevelStart,
            GameState::BallOnPaddle(_) => GameStateKind::BallOnPaddle,
            GameState::BallInPlay(_) => GameStateKind::BallInPlay,
            GameState::BallDeath(_) => GameStateKind::BallDeath,
            GameState::BallWormhole(_) => GameStateKind::BallWormhole,
            GameState::LevelComplete(_) => GameStateKind::LevelComplete,
            GameState::WorldComplete(_) => GameStateKind::WorldComplete,
            GameState::GameComplete => GameStateKind::GameComplete,
            GameState::GameOver => GameStateKind::GameOver,
        }
    }

    pub(crate) fn tick(&mut self, model: &mut GameModel, dt: f32) {
        match self {
            GameState::LevelStart(state) => state.tick(model, dt),
            GameState::BallOnPaddle(state) => state.tick(model, dt),
            GameState::BallInPlay(state) => state.tick(model, dt),
            GameState::BallDeath(state) => state.tick(model, dt),
            GameState::BallWormhole(state) => state.tick(model, dt),
            GameState::LevelComplete(state) => state.tick(model, dt),
            GameState::WorldComplete(state) => state.tick(model, dt),
            GameState::GameComplete | GameState::GameOver => {}
        }
    }

    // === Input hooks ===

    pub(crate) fn shoot_action_release_use(&mut self, model: &mut GameModel) {
        match self {
            GameState::BallOnPaddle(state) => state.shoot_action_release_use(model),
            GameState::BallInPlay(state) => state.shoot_action_release_use(model),
            _ => {}
        }
    }

    pub(crate) fn shoot_action_continuous_use(&mut self, model: &mut GameModel, dt: f32, magnitude: f32) {
        if let GameState::BallInPlay(state) = self {
            state.shoot_action_continuous_use(model, dt, magnitude);
        }
    }

    pub(crate) fn move_key_pressed_for_paddle(&mut self, model: &mut GameModel, direction: f32, magnitude: f32) {
        match self {
            GameState::BallOnPaddle(_) | GameState::BallInPlay(_) => {
                if !model.is_paused(PauseFlags::PADDLE) {
                    model.paddle_mut().move_paddle(direction, magnitude);
                }
            }
            _ => {}
        }
    }

    pub(crate) fn move_key_pressed_for_other(&mut self, model: &mut GameModel, direction: f32, magnitude: f32) {
        if let GameState::BallInPlay(_) = self {
            model.steer_remote_rocket(direction, magnitude);
        }
    }

    pub(crate) fn ball_boost_direction_pressed(&mut self, model: &mut GameModel, direction: Vec2) {
        if let GameState::BallInPlay(_) = self {
            model.boost_pressed(direction);
        }
    }

    pub(crate) fn ball_boost_direction_released(&mut self, model: &mut GameModel) {
        if let GameState::BallInPlay(_) = self {
            model.boost_released();
        }
    }

    pub(crate) fn skip_action(&mut self, model: &mut GameModel) {
        if let GameState::BallDeath(state) = self {
            state.skip(model);
        }
    }
}
