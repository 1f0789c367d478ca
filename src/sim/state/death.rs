//! Last ball lost: spiral, explode, then lose a life

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::anim::AnimationLerp;
use crate::sim::ball::BallId;
use crate::sim::events::GameEvent;
use crate::sim::model::{GameModel, PauseFlags};
use crate::sim::paddle::PaddleTypes;

/// Spiral radius at the start and end of the death spiral
const SPIRAL_RADIUS_START: f32 = 0.5;
const SPIRAL_RADIUS_END: f32 = 3.0;
/// Share of the ball's speed it keeps drifting along while spiralling
const SPIRAL_DRIFT: f32 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathPhase {
    SpiralingToDeath,
    Exploding,
    Dead,
}

#[derive(Debug, Clone)]
pub struct BallDeathState {
    ball: BallId,
    phase: DeathPhase,
    /// Seconds spent in the current phase
    elapsed: f32,
    spiral_radius: AnimationLerp<f32>,
    start_position: Vec2,
    start_direction: Vec2,
    start_speed: f32,
    done: bool,
}

impl BallDeathState {
    pub(crate) fn enter(model: &mut GameModel, ball: BallId) -> Self {
        model.push_event(GameEvent::LastBallAboutToDie { ball });
        let spiral_time = model.tuning().death_spiral_time;

        let (start_position, start_direction, start_speed) = match model.ball_mut(ball) {
            Some(b) => {
                b.remove_all_types();
                b.alpha = 1.0;
                (b.center, b.direction(), b.speed())
            }
            None => (Vec2::ZERO, Vec2::NEG_Y, 0.0),
        };
        debug_assert!(model.ball(ball).is_some(), "dying ball {ball:?} is gone");

        model.pause(PauseFlags::PADDLE);
        model.clear_live_items();
        model.cancel_boost();

        let mut spiral_radius = AnimationLerp::new(SPIRAL_RADIUS_START);
        spiral_radius.set_lerp(0.0, spiral_time, SPIRAL_RADIUS_START, SPIRAL_RADIUS_END);

        Self {
            ball,
            phase: DeathPhase::SpiralingToDeath,
            elapsed: 0.0,
            spiral_radius,
            start_position,
            start_direction,
            start_speed,
            done: false,
        }
    }

    pub(crate) fn exit(&mut self, model: &mut GameModel) {
        model.clear_beams();
        model.clear_active_timers();
        model.paddle_mut().remove_type(PaddleTypes::ROCKET);
        if model.lives_left() == 0 {
            model.clear_projectiles();
        }
        model.unpause(PauseFlags::PADDLE);
    }

    pub fn phase(&self) -> DeathPhase {
        self.phase
    }

    pub(crate) fn tick(&mut self, model: &mut GameModel, dt: f32) {
        match self.phase {
            DeathPhase::SpiralingToDeath => self.tick_spiral(model, dt),
            DeathPhase::Exploding => {
                self.elapsed += dt;
                if self.elapsed >= model.tuning().death_explosion_time {
                    self.elapsed = 0.0;
                    self.phase = DeathPhase::Dead;
                }
            }
            DeathPhase::Dead => {
                self.elapsed += dt;
                if !self.done && self.elapsed >= model.tuning().death_dead_time {
                    self.done = true;
                    model.remove_ball(self.ball);
                    model.ball_died();
                }
            }
        }
    }

    /// Parametric spiral drifting along the ball's last heading
    fn tick_spiral(&mut self, model: &mut GameModel, dt: f32) {
        let radius = self.spiral_radius.value();
        let travelled = self.start_speed * self.elapsed;
        let side = if self.start_direction.x < 0.0 { 1.0 } else { -1.0 };
        let offset = Vec2::new(
            side * radius * travelled.cos() - side * radius,
            -radius * travelled.sin(),
        );
        let position = self.start_position
            + offset
            + SPIRAL_DRIFT * self.start_speed * self.elapsed * self.start_direction;
        if let Some(ball) = model.ball_mut(self.ball) {
            ball.center = position;
        }

        if self.spiral_radius.tick(dt) {
            self.explode(model);
        } else {
            self.elapsed += dt;
        }
    }

    fn explode(&mut self, model: &mut GameModel) {
        self.elapsed = 0.0;
        self.phase = DeathPhase::Exploding;
        let slowest = model.tuning().slowest_speed;
        if let Some(ball) = model.ball_mut(self.ball) {
            ball.alpha = 0.0;
            ball.set_speed(slowest);
        }
        model.push_event(GameEvent::LastBallExploded { ball: self.ball });
    }

    /// Jump straight to the end of the animation, unless this is the last life
    pub(crate) fn skip(&mut self, model: &mut GameModel) {
        if model.lives_left() <= 1 || self.phase == DeathPhase::Dead {
            return;
        }
        if self.phase == DeathPhase::SpiralingToDeath {
            self.explode(model);
        }
        self.elapsed = 0.0;
        self.phase = DeathPhase::Dead;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::{GameState, GameStateKind};
    use super::*;
    use crate::consts::*;

    fn dying() -> GameModel {
        let mut m = launched();
        m.balls_mut()[0].center = Vec2::new(10.0, -2.0);
        m.tick(SIM_DT);
        m.tick(SIM_DT);
        assert_eq!(m.state_kind(), Some(GameStateKind::BallDeath));
        m
    }

    fn phase(m: &GameModel) -> Option<DeathPhase> {
        match m.state() {
            Some(GameState::BallDeath(s)) => Some(s.phase()),
            _ => None,
        }
    }

    fn run_for(m: &mut GameModel, seconds: f32) {
        let steps = (seconds / SIM_DT).ceil() as usize + 4;
        for _ in 0..steps {
            m.tick(SIM_DT);
        }
    }

    #[test]
    fn test_death_pauses_paddle_and_loses_a_life() {
        let mut m = dying();
        let lives = m.lives_left();
        assert!(m.is_paused(PauseFlags::PADDLE));

        let t = m.tuning().clone();
        run_for(&mut m, t.death_spiral_time);
        assert_eq!(phase(&m), Some(DeathPhase::Exploding));
        assert_eq!(m.balls()[0].alpha, 0.0);
        run_for(&mut m, t.death_explosion_time + t.death_dead_time);

        assert_eq!(m.state_kind(), Some(GameStateKind::BallOnPaddle));
        assert_eq!(m.lives_left(), lives - 1);
        assert!(!m.is_paused(PauseFlags::PADDLE));
        // a fresh ball waits on the paddle
        assert_eq!(m.balls().len(), 1);
        let events = m.drain_events();
        assert_eq!(events.iter().filter(|e| matches!(e, GameEvent::BallDied { .. })).count(), 1);
    }

    #[test]
    fn test_skip_goes_straight_to_dead() {
        let mut m = dying();
        m.skip_action();
        assert_eq!(phase(&m), Some(DeathPhase::Dead));
        let dead_time = m.tuning().death_dead_time;
        run_for(&mut m, dead_time);
        assert_eq!(m.state_kind(), Some(GameStateKind::BallOnPaddle));
    }

    #[test]
    fn test_last_life_cannot_skip_and_ends_game() {
        let mut m = dying();
        m.set_lives_left(1);
        m.skip_action();
        assert_eq!(phase(&m), Some(DeathPhase::SpiralingToDeath));
        let t = m.tuning().clone();
        run_for(&mut m, t.death_spiral_time + t.death_explosion_time + t.death_dead_time);
        assert_eq!(m.state_kind(), Some(GameStateKind::GameOver));
        assert_eq!(m.lives_left(), 0);
    }

    #[test]
    fn test_death_clears_rocket_and_items() {
        let mut m = launched();
        m.paddle_mut().add_type(PaddleTypes::ROCKET);
        m.spawn_item(crate::sim::item::ItemKind::OneUp, Vec2::new(10.0, 15.0));
        m.balls_mut()[0].center = Vec2::new(10.0, -2.0);
        m.tick(SIM_DT);
        m.tick(SIM_DT);
        assert!(m.items().is_empty());
        m.skip_action();
        let dead_time = m.tuning().death_dead_time;
        run_for(&mut m, dead_time);
        assert!(!m.paddle().has_type(PaddleTypes::ROCKET));
    }
}
