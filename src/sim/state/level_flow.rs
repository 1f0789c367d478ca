//! Level and world bookends

use crate::sim::events::GameEvent;
use crate::sim::model::GameModel;

use super::StateTransition;

#[derive(Debug, Clone, Default)]
pub struct LevelStartState {
    staged: bool,
}

impl LevelStartState {
    pub(crate) fn enter(model: &mut GameModel) -> Self {
        let (world, level) = (model.world_index(), model.level_index());
        log::info!("Starting level {} of world {}", level, world);
        model.push_event(GameEvent::LevelStarted { world, level });
        Self { staged: false }
    }

    pub(crate) fn tick(&mut self, model: &mut GameModel, _dt: f32) {
        if !self.staged {
            self.staged = true;
            model.set_next_state(StateTransition::BallOnPaddle);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LevelCompleteState {
    elapsed: f32,
    staged: bool,
}

impl LevelCompleteState {
    pub(crate) fn enter(model: &mut GameModel) -> Self {
        let (world, level) = (model.world_index(), model.level_index());
        log::info!("Level {} of world {} complete, score {}", level, world, model.score());
        model.clear_balls();
        model.clear_live_items();
        model.clear_active_timers();
        model.clear_projectiles();
        model.clear_beams();
        model.cancel_boost();
        model.push_event(GameEvent::LevelCompleted { world, level });
        Self::default()
    }

    pub(crate) fn tick(&mut self, model: &mut GameModel, dt: f32) {
        if self.staged {
            return;
        }
        self.elapsed += dt;
        if self.elapsed < model.tuning().level_complete_time {
            return;
        }
        self.staged = true;
        if model.is_last_level_in_world() {
            model.set_next_state(StateTransition::WorldComplete);
        } else {
            model.increment_level();
            let (world, level) = (model.world_index(), model.level_index());
            model.push_event(GameEvent::LevelStarted { world, level });
            model.set_next_state(StateTransition::BallOnPaddle);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorldCompleteState {
    elapsed: f32,
    staged: bool,
}

impl WorldCompleteState {
    pub(crate) fn enter(model: &mut GameModel) -> Self {
        let world = model.world_index();
        log::info!("World {} complete", world);
        model.push_event(GameEvent::WorldCompleted { world });
        Self::default()
    }

    pub(crate) fn tick(&mut self, model: &mut GameModel, dt: f32) {
        if self.staged {
            return;
        }
        self.elapsed += dt;
        if self.elapsed < model.tuning().level_complete_time {
            return;
        }
        self.staged = true;
        if model.is_last_world() {
            model.set_next_state(StateTransition::GameComplete);
        } else {
            model.increment_world();
            model.set_next_state(StateTransition::LevelStart);
        }
    }
}
