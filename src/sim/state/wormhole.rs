//! Lone ball travelling between a pair of portals

use glam::Vec2;

use crate::anim::AnimationMultiLerp;
use crate::sim::ball::{BallId, Collidable};
use crate::sim::events::GameEvent;
use crate::sim::level::PieceId;
use crate::sim::model::GameModel;

use super::StateTransition;
use super::in_play::portal_exit;

#[derive(Debug, Clone)]
pub struct BallWormholeState {
    ball: BallId,
    to: PieceId,
    /// Heading the ball had when it fell in; it leaves the same way
    direction: Vec2,
    path: AnimationMultiLerp<Vec2>,
    arrived: bool,
}

impl BallWormholeState {
    pub(crate) fn enter(model: &mut GameModel, ball: BallId, from: PieceId, to: PieceId) -> Self {
        let start = model.level().piece(from).center();
        let end = model.level().piece(to).center();
        let travel_time = model.tuning().wormhole_travel_time;

        let direction = match model.ball_mut(ball) {
            Some(b) => {
                b.center = start;
                b.direction()
            }
            None => Vec2::Y,
        };
        debug_assert!(model.ball(ball).is_some(), "wormhole ball {ball:?} is gone");

        let mut path = AnimationMultiLerp::new(start);
        path.set_lerp(&[0.0, travel_time], &[start, end]);
        log::debug!("Ball {ball:?} entering wormhole {from:?} -> {to:?}");
        model.push_event(GameEvent::BallPortalTeleport { ball, from, to });

        Self { ball, to, direction, path, arrived: false }
    }

    pub(crate) fn tick(&mut self, model: &mut GameModel, dt: f32) {
        if self.arrived {
            return;
        }
        let finished = self.path.tick(dt);
        let position = self.path.value();
        if let Some(ball) = model.ball_mut(self.ball) {
            ball.center = position;
        }
        if !finished {
            return;
        }

        self.arrived = true;
        let exit = portal_exit(model, self.to, self.direction);
        if let Some(ball) = model.ball_mut(self.ball) {
            ball.center = exit;
            ball.last_thing_collided_with = Some(Collidable::Piece(self.to));
        }
        model.set_next_state(StateTransition::BallInPlay);
    }
}
