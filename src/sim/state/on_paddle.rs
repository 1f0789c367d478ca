//! Ball resting on the paddle, waiting to be launched

use crate::sim::events::GameEvent;
use crate::sim::model::GameModel;

use super::StateTransition;

#[derive(Debug, Clone, Default)]
pub struct BallOnPaddleState {
    launched: bool,
}

impl BallOnPaddleState {
    pub(crate) fn enter(model: &mut GameModel) -> Self {
        if model.balls().is_empty() {
            model.spawn_ball_on_paddle();
        }
        model.set_num_interim_blocks_destroyed(0);
        Self::sync_ball(model);
        Self { launched: false }
    }

    /// Keep the front ball sitting on the paddle
    fn sync_ball(model: &mut GameModel) {
        let rest = model.paddle().ball_rest_position(crate::consts::BALL_RADIUS);
        if let Some(ball) = model.balls_mut().first_mut() {
            ball.center = rest;
        }
    }

    pub(crate) fn tick(&mut self, model: &mut GameModel, dt: f32) {
        model.tick_paddle(dt);
        model.update_paddle_limits();
        Self::sync_ball(model);
        model.tick_items(dt);
        model.do_item_collisions();
    }

    /// Fire the ball off the paddle
    pub(crate) fn shoot_action_release_use(&mut self, model: &mut GameModel) {
        if self.launched {
            return;
        }
        let direction = model.random_release_direction();
        let speed = model.tuning().normal_speed;
        let Some(ball) = model.balls_mut().first_mut() else {
            return;
        };
        ball.set_velocity(speed, direction);
        let id = ball.id;
        self.launched = true;
        log::debug!("Launched ball {id:?} along {direction}");
        model.push_event(GameEvent::BallLaunched { ball: id });
        model.set_next_state(StateTransition::BallInPlay);
    }
}
