//! Balls in play
//!
//! The one running state. Each tick first detects and resolves collisions for
//! every ball, recording what happened in a [`BallCollisionChange`], and only
//! then integrates motion, so a ball placed by a collision response is never
//! moved a second time in the same tick.

use std::ops::ControlFlow;

use glam::Vec2;
use rand::Rng;

use crate::consts::*;
use crate::rotate_degs;
use crate::sim::ball::{BallTypes, Collidable};
use crate::sim::collision::Contact;
use crate::sim::events::GameEvent;
use crate::sim::level::PieceId;
use crate::sim::model::{GameModel, PauseFlags, PieceHitOutcome};
use crate::sim::paddle::PaddleTypes;
use crate::sim::resolve::{BounceLimits, do_ball_ball_collision, do_ball_collision, do_ball_paddle_collision};

use super::StateTransition;

/// What the collision pass did to one ball
#[derive(Debug, Clone, Copy, Default)]
struct BallCollisionChange {
    /// Position already set by a collision response
    moved: bool,
    /// The paddle changed the ball's direction
    paddle_redirected: bool,
    /// Kick from a moving collidable, applied after integration
    impulse: f32,
    shielded: bool,
}

#[derive(Debug, Clone)]
pub struct BallInPlayState {
    /// Seconds since a ghost ball last started phasing through pieces
    time_since_ghost: f32,
}

impl BallInPlayState {
    pub(crate) fn enter(model: &mut GameModel) -> Self {
        log::debug!("{} ball(s) in play", model.balls().len());
        Self { time_since_ghost: f32::MAX }
    }

    pub(crate) fn tick(&mut self, model: &mut GameModel, dt: f32) {
        let ghost_length = model.tuning().ghost_mode_length;
        if self.time_since_ghost < ghost_length {
            self.time_since_ghost += dt;
        }

        model.do_item_collisions();
        model.do_projectile_collisions(dt);
        if model.staged_transition().is_some() {
            return;
        }

        model.tick_timers(dt);
        model.tick_items(dt);
        model.tick_projectiles(dt);
        model.tick_beams(dt);
        model.tick_paddle(dt);

        model.do_boss_paddle_collision();

        if !model.is_paused(PauseFlags::BALL) {
            if Self::remove_dead_balls(model) {
                return;
            }
            let Some(changes) = self.do_ball_collisions(model, dt) else {
                return;
            };
            Self::integrate_balls(model, dt, &changes);
        }

        model.do_paddle_safety_net_collision();
        model.update_paddle_limits();
        model.tick_piece_status(dt);
        model.tick_boost();
        model.tick_boss_ai(dt);
    }

    /// Drop balls that left the level. Returns true if the last ball went and death was staged.
    fn remove_dead_balls(model: &mut GameModel) -> bool {
        let dead: Vec<_> = model
            .balls()
            .iter()
            .filter(|b| model.level().is_out_of_bounds(b.center))
            .map(|b| b.id)
            .collect();
        for id in dead {
            if model.balls().len() == 1 {
                model.set_next_state(StateTransition::BallDeath { ball: id });
                return true;
            }
            model.remove_ball(id);
        }
        false
    }

    // ------------------------------------------------------------------
    // Collision pass
    // ------------------------------------------------------------------

    /// Detect and resolve collisions for every ball. `None` means a state change was staged.
    fn do_ball_collisions(&mut self, model: &mut GameModel, dt: f32) -> Option<Vec<BallCollisionChange>> {
        let limits = BounceLimits {
            min_angle_degs: model.tuning().min_ball_angle_degs,
            max_angle_degs: model.tuning().max_grazing_angle_degs,
        };
        let mut changes = vec![BallCollisionChange::default(); model.balls().len()];
        for i in 0..changes.len() {
            // one collision response per ball per tick
            if changes[i].moved {
                continue;
            }
            if self.collide_ball(model, i, dt, limits, &mut changes).is_break() {
                return None;
            }
        }
        Some(changes)
    }

    fn collide_ball(
        &mut self,
        model: &mut GameModel,
        i: usize,
        dt: f32,
        limits: BounceLimits,
        changes: &mut [BallCollisionChange],
    ) -> ControlFlow<()> {
        let attached = model.paddle().attached_ball() == Some(model.balls()[i].id);
        if !attached {
            // A ball gets one bounce per tick. Once the paddle has placed it for
            // the rest of the step, a later ball, net or arc test would start
            // from a position the ball never held at that time, so those wait
            // for the next tick.
            if Self::collide_with_paddle(model, i, dt, &mut changes[i])
                || Self::collide_with_balls(model, i, dt, changes)
                || Self::collide_with_nets(model, i, dt, limits, &mut changes[i])
                || Self::collide_with_tesla(model, i, dt, limits, &mut changes[i])
            {
                return ControlFlow::Continue(());
            }
        }
        if model.balls()[i].block_collisions_disabled {
            return ControlFlow::Continue(());
        }
        if !attached && Self::collide_with_boss(model, i, dt, limits, &mut changes[i]) {
            return self.check_for_transition(model);
        }
        self.collide_with_pieces(model, i, dt, attached, limits, &mut changes[i])
    }

    fn check_for_transition(&self, model: &GameModel) -> ControlFlow<()> {
        if model.staged_transition().is_some() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn collide_with_paddle(model: &mut GameModel, i: usize, dt: f32, change: &mut BallCollisionChange) -> bool {
        let Some(contact) = model.paddle().collision_check(&model.balls()[i], dt) else {
            return false;
        };
        let paddle = model.paddle();
        let catch = paddle.has_type(PaddleTypes::STICKY)
            && paddle.attached_ball().is_none()
            && contact.normal.y > 0.0;
        let shield = paddle.has_type(PaddleTypes::SHIELD);
        let paddle_velocity = paddle.average_velocity();
        let min_angle = model.tuning().min_ball_angle_degs;
        let toi = contact.time_until_collision.clamp(0.0, dt);

        let ball = &mut model.balls_mut()[i];
        let id = ball.id;
        if catch {
            ball.center += ball.velocity() * toi;
            ball.ball_collided();
            let ball = ball.clone();
            model.paddle_mut().attach_ball(&ball);
            if let Some(pos) = model.paddle().attached_ball_position() {
                model.balls_mut()[i].center = pos;
            }
        } else if shield {
            ball.center += ball.velocity() * toi;
            ball.set_direction(contact.normal);
            ball.center += ball.velocity() * (dt - toi);
            ball.ball_collided();
            change.shielded = true;
            change.paddle_redirected = true;
        } else {
            let impulse = do_ball_paddle_collision(ball, contact.normal, dt, toi, min_angle, paddle_velocity);
            change.impulse = change.impulse.max(impulse);
            change.paddle_redirected = true;
        }
        change.moved = true;
        model.balls_mut()[i].last_thing_collided_with = Some(Collidable::Paddle);
        model.ball_paddle_collision_occurred(id);
        true
    }

    /// Pairwise test against every later ball
    fn collide_with_balls(model: &mut GameModel, i: usize, dt: f32, changes: &mut [BallCollisionChange]) -> bool {
        let attached = model.paddle().attached_ball();
        for j in i + 1..changes.len() {
            if changes[j].moved {
                continue;
            }
            let (a, b) = (&model.balls()[i], &model.balls()[j]);
            if Some(b.id) == attached {
                continue;
            }
            let Some(contact) = a.collision_check(b, dt) else {
                continue;
            };
            let (a_id, b_id) = (a.id, b.id);
            let (left, right) = model.balls_mut().split_at_mut(j);
            let (a, b) = (&mut left[i], &mut right[0]);
            do_ball_ball_collision(a, b, dt, contact.time_until_collision);
            a.last_thing_collided_with = Some(Collidable::Ball(b_id));
            b.last_thing_collided_with = Some(Collidable::Ball(a_id));
            changes[i].moved = true;
            changes[j].moved = true;
            model.push_event(GameEvent::BallBallCollision { a: a_id, b: b_id });
            return true;
        }
        false
    }

    fn collide_with_nets(
        model: &mut GameModel,
        i: usize,
        dt: f32,
        limits: BounceLimits,
        change: &mut BallCollisionChange,
    ) -> bool {
        for top in [false, true] {
            let contact = model
                .safety_net(top)
                .and_then(|net| net.collision_check(&model.balls()[i], dt));
            let Some(contact) = contact else {
                continue;
            };
            let ball = &mut model.balls_mut()[i];
            do_ball_collision(ball, contact.normal, dt, contact.time_until_collision, limits, Vec2::ZERO);
            ball.last_thing_collided_with = Some(Collidable::SafetyNet { top });
            let id = ball.id;
            change.moved = true;
            model.ball_safety_net_collision_occurred(id, top);
            return true;
        }
        false
    }

    fn collide_with_tesla(
        model: &mut GameModel,
        i: usize,
        dt: f32,
        limits: BounceLimits,
        change: &mut BallCollisionChange,
    ) -> bool {
        let ball = &model.balls()[i];
        let mut best: Option<(Collidable, Contact)> = None;
        for arc in model.level().tesla_arcs() {
            let Some(contact) = arc.collision_check(ball, dt) else {
                continue;
            };
            if best.is_none_or(|(_, b)| contact.time_until_collision < b.time_until_collision) {
                best = Some((Collidable::TeslaArc(arc.a, arc.b), contact));
            }
        }
        let Some((arc, contact)) = best else {
            return false;
        };
        let ball = &mut model.balls_mut()[i];
        do_ball_collision(ball, contact.normal, dt, contact.time_until_collision, limits, Vec2::ZERO);
        ball.last_thing_collided_with = Some(arc);
        let id = ball.id;
        change.moved = true;
        model.push_event(GameEvent::BallTeslaArcCollision { ball: id });
        true
    }

    fn collide_with_boss(
        model: &mut GameModel,
        i: usize,
        dt: f32,
        limits: BounceLimits,
        change: &mut BallCollisionChange,
    ) -> bool {
        let Some(boss) = model.level().boss.as_ref() else {
            return false;
        };
        let Some((part, contact)) = boss.collision_check(&model.balls()[i], dt) else {
            return false;
        };
        let line_velocity = boss.line_velocity();
        let ball = &mut model.balls_mut()[i];
        let impulse = do_ball_collision(
            ball,
            contact.normal,
            dt,
            contact.time_until_collision,
            limits,
            line_velocity,
        );
        ball.last_thing_collided_with = Some(Collidable::BossPart(part));
        let id = ball.id;
        change.impulse = change.impulse.max(impulse);
        change.moved = true;
        model.ball_boss_collision_occurred(id, part);
        true
    }

    /// Earliest piece along the ball's path wins; later candidates wait for the next tick
    fn collide_with_pieces(
        &mut self,
        model: &mut GameModel,
        i: usize,
        dt: f32,
        attached: bool,
        limits: BounceLimits,
        change: &mut BallCollisionChange,
    ) -> ControlFlow<()> {
        let ball = &model.balls()[i];
        let level = model.level();
        let mut best: Option<(PieceId, Contact)> = None;
        for id in level.ball_collision_candidates(ball, dt) {
            let Some(contact) = level.piece(id).collision_check(ball, dt) else {
                continue;
            };
            if best.is_none_or(|(_, b)| contact.time_until_collision < b.time_until_collision) {
                best = Some((id, contact));
            }
        }
        let Some((piece_id, contact)) = best else {
            return ControlFlow::Continue(());
        };

        let piece = level.piece(piece_id);
        let ghosting = ball.has_type(BallTypes::GHOST) && piece.ghostball_passes_through();
        let bounces = piece.ball_bounces_off_when_hit() && !piece.ball_blasts_through(ball) && !attached;
        if !bounces && ball.last_thing_collided_with == Some(Collidable::Piece(piece_id)) {
            return ControlFlow::Continue(());
        }

        if ghosting {
            if self.time_since_ghost < model.tuning().ghost_mode_length {
                return ControlFlow::Continue(());
            }
            let miss = model.tuning().ghost_block_miss_probability / model.balls().len() as f32;
            if model.rng().random::<f32>() <= miss {
                log::debug!("Ghost ball phasing through {piece_id:?}");
                self.time_since_ghost = 0.0;
                return ControlFlow::Continue(());
            }
        }

        if bounces {
            let ball = &mut model.balls_mut()[i];
            do_ball_collision(ball, contact.normal, dt, contact.time_until_collision, limits, Vec2::ZERO);
            change.moved = true;
        }
        if let PieceHitOutcome::Teleport { to } = model.ball_piece_collision_occurred(i, piece_id) {
            Self::teleport(model, i, piece_id, to, change);
        }
        self.check_for_transition(model)
    }

    /// Send a ball out of the sibling portal; a lone ball gets the wormhole ride instead
    fn teleport(model: &mut GameModel, i: usize, from: PieceId, to: PieceId, change: &mut BallCollisionChange) {
        let id = model.balls()[i].id;
        if model.balls().len() == 1 {
            model.set_next_state(StateTransition::BallWormhole { ball: id, from, to });
            return;
        }
        let exit = portal_exit(model, to, model.balls()[i].direction());
        let ball = &mut model.balls_mut()[i];
        ball.center = exit;
        ball.last_thing_collided_with = Some(Collidable::Piece(to));
        change.moved = true;
        model.push_event(GameEvent::BallPortalTeleport { ball: id, from, to });
    }

    // ------------------------------------------------------------------
    // Integration pass
    // ------------------------------------------------------------------

    fn integrate_balls(model: &mut GameModel, dt: f32, changes: &[BallCollisionChange]) {
        let wobble = model.tuning().crazy_ball_wobble_degs;
        let min_angle = model.tuning().min_ball_angle_degs;
        let impulse_decel = model.tuning().collision_impulse_decel;
        let attached = model.paddle().attached_ball();
        let attached_pos = model.paddle().attached_ball_position();

        let mut wobbles = Vec::with_capacity(changes.len());
        for i in 0..changes.len() {
            let crazy = model.balls()[i].has_type(BallTypes::CRAZY);
            wobbles.push(if crazy && wobble > 0.0 {
                model.rng().random_range(-wobble..=wobble) * dt
            } else {
                0.0
            });
        }

        let mut last_paddle_hit = None;
        for (i, change) in changes.iter().enumerate() {
            let ball = &mut model.balls_mut()[i];
            if Some(ball.id) == attached {
                ball.tick(dt, false);
                if let Some(pos) = attached_pos {
                    ball.center = pos;
                }
                continue;
            }

            ball.tick(dt, !change.moved);
            if wobbles[i] != 0.0 {
                ball.set_direction(rotate_degs(ball.direction(), wobbles[i]));
            }

            let mut corrected = false;
            if change.paddle_redirected {
                last_paddle_hit = Some(ball.id);
                if !change.shielded {
                    corrected = keep_off_downward(ball, min_angle);
                }
            }
            if !corrected && change.impulse > 0.0 {
                ball.apply_impulse(change.impulse, impulse_decel);
            }
        }

        if let Some(id) = last_paddle_hit {
            model.promote_ball_to_front(id);
        }
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Release a stuck ball, else fire the beam or a rocket
    pub(crate) fn shoot_action_release_use(&mut self, model: &mut GameModel) {
        if let Some(id) = model.paddle_mut().detach_ball() {
            let direction = model.random_release_direction();
            if let Some(ball) = model.ball_mut(id) {
                ball.set_direction(direction);
            }
            model.push_event(GameEvent::BallLaunched { ball: id });
            return;
        }
        if model.fire_laser_beam() {
            return;
        }
        model.fire_paddle_rocket();
    }

    /// Laser bullets fire while the button is held, rate-limited by the paddle
    pub(crate) fn shoot_action_continuous_use(&mut self, model: &mut GameModel, _dt: f32, magnitude: f32) {
        if magnitude <= 0.0 || !model.paddle().has_type(PaddleTypes::LASER_BULLET) {
            return;
        }
        if model.paddle().ready_to_shoot(model.tuning().laser_bullet_delay) {
            model.fire_laser_bullets();
        }
    }
}

/// Where a ball travelling along `direction` comes out of portal `to`
pub(crate) fn portal_exit(model: &GameModel, to: PieceId, direction: Vec2) -> Vec2 {
    let half_diagonal = Vec2::new(PIECE_WIDTH, PIECE_HEIGHT).length() * 0.5;
    model.level().piece(to).center() + direction * (half_diagonal + BALL_RADIUS + EPSILON)
}

/// A ball leaving the paddle must head up at least `min_angle` off the horizontal
fn keep_off_downward(ball: &mut crate::sim::ball::Ball, min_angle: f32) -> bool {
    let dir = ball.direction();
    let floor = min_angle.to_radians().sin();
    if dir.y >= floor {
        return false;
    }
    let side = if dir.x < 0.0 { -1.0 } else { 1.0 };
    let (sin, cos) = min_angle.to_radians().sin_cos();
    ball.set_direction(Vec2::new(side * cos, sin));
    true
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::GameStateKind;
    use super::*;
    use crate::sim::boss::{Boss, BossBodyPart};
    use crate::sim::level::{GameLevel, GameWorld, PieceKind};
    use crate::tuning::Tuning;

    /// Two pieces diagonally apart, one a row above the other
    const TIE_LAYOUT: &str = "
        SSSSSSSS
        S......S
        S..1...S
        S.1....S
        S......S
        S......S
        S......S
        S......S
        S......S
        S......S
        S......S
        S......S
    ";

    /// Two active tesla pieces on one row, arc between them
    const TESLA_LAYOUT: &str = "
        SSSSSSSS
        S111111S
        S......S
        ST....TS
        S......S
        S......S
        S......S
        S......S
        S......S
        S......S
    ";

    fn in_play(layout: &str) -> GameModel {
        in_play_level(GameLevel::from_layout("test", layout).unwrap(), Tuning::default())
    }

    fn in_play_level(level: GameLevel, tuning: Tuning) -> GameModel {
        let mut m = GameModel::new(tuning, vec![GameWorld::new("w", vec![level])], 3);
        m.tick(SIM_DT);
        m.tick(SIM_DT);
        m.shoot_action_release_use();
        m.tick(SIM_DT);
        assert_eq!(m.state_kind(), Some(GameStateKind::BallInPlay));
        m
    }

    fn piece_hits(events: &[GameEvent]) -> Vec<PieceId> {
        events
            .iter()
            .filter_map(|e| match e {
                GameEvent::BallPieceCollision { piece, .. } => Some(*piece),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_earliest_piece_wins() {
        let mut m = in_play(TIE_LAYOUT);
        let near = m.level().piece_at(8, 2).unwrap().id;
        let far = m.level().piece_at(9, 3).unwrap().id;
        let ball = &mut m.balls_mut()[0];
        ball.center = Vec2::new(7.25, 5.5);
        ball.set_velocity(25.0, Vec2::Y);
        m.drain_events();

        // near piece at 0.08s, far piece at ~0.12s
        m.tick(0.15);
        let events = m.drain_events();
        assert_eq!(piece_hits(&events), vec![near]);
        assert_eq!(m.level().piece(near).kind, PieceKind::Empty);
        assert_eq!(m.level().piece(far).kind, PieceKind::Breakable { hp: 1 });
        assert!(m.balls()[0].direction().y < 0.0);
    }

    #[test]
    fn test_last_ball_out_stages_death_and_stops() {
        let mut m = launched();
        let id = m.balls()[0].id;
        let dead_pos = Vec2::new(10.0, Y_COORD_OF_DEATH);
        m.balls_mut()[0].center = dead_pos;
        m.drain_events();

        m.tick(SIM_DT);
        assert_eq!(m.staged_transition(), Some(&StateTransition::BallDeath { ball: id }));
        assert_eq!(m.balls().len(), 1);
        // no integration happened after the death check
        assert_eq!(m.balls()[0].center, dead_pos);
        assert!(!m.drain_events().iter().any(|e| matches!(e, GameEvent::BallDied { .. })));

        m.tick(SIM_DT);
        assert_eq!(m.state_kind(), Some(GameStateKind::BallDeath));
    }

    #[test]
    fn test_one_of_three_balls_out() {
        let mut m = launched();
        m.split_front_ball(3);
        assert_eq!(m.balls().len(), 3);
        let lost = m.balls()[1].id;
        m.balls_mut()[1].center = Vec2::new(10.0, -2.0);
        m.drain_events();

        m.tick(SIM_DT);
        assert_eq!(m.balls().len(), 2);
        assert!(m.ball(lost).is_none());
        let died: Vec<_> = m
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::BallDied { .. }))
            .collect();
        assert_eq!(died, vec![GameEvent::BallDied { ball: lost }]);
        assert_eq!(m.staged_transition(), None);
    }

    #[test]
    fn test_paddle_bounce_resets_multiplier() {
        let mut m = launched();
        m.set_num_interim_blocks_destroyed(6);
        assert_eq!(m.score_multiplier(), 3);
        let top = m.paddle().top_y();
        let x = m.paddle().center.x + 1.0;
        let ball = &mut m.balls_mut()[0];
        ball.center = Vec2::new(x, top + BALL_RADIUS + 0.05);
        ball.set_direction(Vec2::NEG_Y);

        m.tick(SIM_DT);
        assert!(m.balls()[0].direction().y > 0.0);
        assert_eq!(m.score_multiplier(), 1);
        assert_eq!(m.balls()[0].last_thing_collided_with, Some(Collidable::Paddle));
    }

    #[test]
    fn test_sticky_paddle_catches_and_releases() {
        let mut m = launched();
        m.paddle_mut().add_type(PaddleTypes::STICKY);
        let id = m.balls()[0].id;
        let top = m.paddle().top_y();
        let x = m.paddle().center.x;
        let ball = &mut m.balls_mut()[0];
        ball.center = Vec2::new(x, top + BALL_RADIUS + 0.05);
        ball.set_direction(Vec2::NEG_Y);

        m.tick(SIM_DT);
        assert_eq!(m.paddle().attached_ball(), Some(id));

        m.move_paddle(1.0, 1.0);
        for _ in 0..10 {
            m.tick(SIM_DT);
        }
        let held = m.paddle().attached_ball_position().unwrap();
        assert_eq!(m.balls()[0].center, held);

        m.move_paddle(0.0, 0.0);
        m.shoot_action_release_use();
        assert_eq!(m.paddle().attached_ball(), None);
        assert!(m.balls()[0].direction().y > 0.0);
    }

    #[test]
    fn test_uber_ball_keeps_course() {
        let mut m = in_play(OPEN_LAYOUT);
        let target = m.level().piece_at(8, 2).unwrap().id;
        let ball = &mut m.balls_mut()[0];
        ball.add_type(BallTypes::UBER);
        ball.center = Vec2::new(6.25, 7.4);
        ball.set_direction(Vec2::Y);

        m.tick(SIM_DT);
        assert_eq!(m.level().piece(target).kind, PieceKind::Empty);
        assert_eq!(m.balls()[0].direction(), Vec2::Y);
    }

    /// Ghost ball sitting just under the piece at row 8, column 3
    fn ghost_under_piece(miss_probability: f32) -> (GameModel, PieceId) {
        let tuning = Tuning { ghost_block_miss_probability: miss_probability, ..Tuning::default() };
        let mut m = in_play_level(GameLevel::from_layout("ghost", OPEN_LAYOUT).unwrap(), tuning);
        let piece = m.level().piece_at(8, 3).unwrap().id;
        let ball = &mut m.balls_mut()[0];
        ball.add_type(BallTypes::GHOST);
        ball.center = Vec2::new(8.75, 7.4);
        ball.set_direction(Vec2::Y);
        (m, piece)
    }

    fn limits() -> BounceLimits {
        BounceLimits::default()
    }

    #[test]
    fn test_ghost_ball_phases_through_and_starts_window() {
        let (mut m, piece) = ghost_under_piece(1.0);
        let mut state = BallInPlayState { time_since_ghost: f32::MAX };
        let mut change = BallCollisionChange::default();

        let flow = state.collide_with_pieces(&mut m, 0, SIM_DT, false, limits(), &mut change);
        assert!(flow.is_continue());
        assert!(!change.moved);
        assert_eq!(state.time_since_ghost, 0.0);
        assert_eq!(m.level().piece(piece).kind, PieceKind::Breakable { hp: 1 });
        assert_eq!(m.balls()[0].direction(), Vec2::Y);
    }

    #[test]
    fn test_ghost_window_ignores_pieces_until_it_runs_out() {
        // the roll never lets the ball through, so only the window can
        let (mut m, piece) = ghost_under_piece(0.0);
        let ghost_length = m.tuning().ghost_mode_length;
        let mut state = BallInPlayState { time_since_ghost: 0.0 };
        let mut change = BallCollisionChange::default();

        assert!(state.collide_with_pieces(&mut m, 0, SIM_DT, false, limits(), &mut change).is_continue());
        assert!(!change.moved);
        assert_eq!(m.level().piece(piece).kind, PieceKind::Breakable { hp: 1 });

        state.time_since_ghost = ghost_length;
        assert!(state.collide_with_pieces(&mut m, 0, SIM_DT, false, limits(), &mut change).is_continue());
        assert!(change.moved);
        assert_eq!(m.level().piece(piece).kind, PieceKind::Empty);
        assert!(m.balls()[0].direction().y < 0.0);
        // a real hit leaves the window closed
        assert_eq!(state.time_since_ghost, ghost_length);
    }

    #[test]
    fn test_ghost_chance_shrinks_with_more_balls() {
        // 0.9 per hit alone, 0.3 each with three balls in play
        let passes = |balls: usize| {
            (0..200u64)
                .filter(|&seed| {
                    let tuning = Tuning { ghost_block_miss_probability: 0.9, ..Tuning::default() };
                    let level = GameLevel::from_layout("ghost", OPEN_LAYOUT).unwrap();
                    let mut m = GameModel::new(tuning, vec![GameWorld::new("w", vec![level])], seed);
                    m.spawn_ball_on_paddle();
                    for _ in 1..balls {
                        m.spawn_ball_on_paddle();
                    }
                    let ball = &mut m.balls_mut()[0];
                    ball.add_type(BallTypes::GHOST);
                    ball.center = Vec2::new(8.75, 7.4);
                    ball.set_direction(Vec2::Y);
                    let mut state = BallInPlayState { time_since_ghost: f32::MAX };
                    let mut change = BallCollisionChange::default();
                    assert!(state.collide_with_pieces(&mut m, 0, SIM_DT, false, limits(), &mut change).is_continue());
                    !change.moved
                })
                .count()
        };
        let alone = passes(1);
        let crowded = passes(3);
        assert!(alone > 150, "{alone}");
        assert!(crowded < 100, "{crowded}");
    }

    #[test]
    fn test_paddle_struck_ball_moves_to_front() {
        let mut m = launched();
        m.split_front_ball(3);
        let struck = m.balls()[2].id;
        let top = m.paddle().top_y();
        let x = m.paddle().center.x + 1.0;
        for (i, pos) in [Vec2::new(3.0, 5.0), Vec2::new(17.0, 5.0), Vec2::new(x, top + BALL_RADIUS + 0.05)]
            .into_iter()
            .enumerate()
        {
            let ball = &mut m.balls_mut()[i];
            ball.center = pos;
            ball.set_direction(if i == 2 { Vec2::NEG_Y } else { Vec2::Y });
        }

        m.tick(SIM_DT);
        assert_eq!(m.balls()[0].id, struck);
        assert_eq!(m.balls()[0].last_thing_collided_with, Some(Collidable::Paddle));
        assert_eq!(m.balls().len(), 3);
    }

    #[test]
    fn test_downward_correction_cancels_impulse() {
        let mut m = launched();
        let change = BallCollisionChange { moved: true, paddle_redirected: true, impulse: 5.0, shielded: false };

        m.balls_mut()[0].set_direction(Vec2::new(1.0, -0.2));
        BallInPlayState::integrate_balls(&mut m, SIM_DT, &[change]);
        let ball = &m.balls()[0];
        assert!((ball.direction() - rotate_degs(Vec2::X, m.tuning().min_ball_angle_degs)).length() < 1e-4);
        assert_eq!(ball.impulse(), 0.0);

        // heading up already: nothing to correct, so the kick lands
        m.balls_mut()[0].set_direction(Vec2::new(1.0, 1.0));
        BallInPlayState::integrate_balls(&mut m, SIM_DT, &[change]);
        let ball = &m.balls()[0];
        assert!((ball.direction() - Vec2::new(1.0, 1.0).normalize()).length() < 1e-5);
        assert_eq!(ball.impulse(), 5.0);
    }

    #[test]
    fn test_shield_skips_downward_correction() {
        let mut m = launched();
        let change = BallCollisionChange { moved: true, paddle_redirected: true, impulse: 0.0, shielded: true };
        let down = Vec2::new(1.0, -0.2).normalize();
        m.balls_mut()[0].set_direction(down);
        BallInPlayState::integrate_balls(&mut m, SIM_DT, &[change]);
        assert!((m.balls()[0].direction() - down).length() < 1e-5);
    }

    #[test]
    fn test_safety_net_bounce_destroys_net() {
        let mut m = launched();
        assert!(m.create_safety_net(false));
        let ball = &mut m.balls_mut()[0];
        ball.center = Vec2::new(3.0, 0.95);
        ball.set_direction(Vec2::NEG_Y);
        m.drain_events();

        m.tick(SIM_DT);
        assert!(m.safety_net(false).is_none());
        let ball = &m.balls()[0];
        assert!(ball.direction().y > 0.0);
        assert_eq!(ball.last_thing_collided_with, Some(Collidable::SafetyNet { top: false }));
        let id = ball.id;
        let events = m.drain_events();
        assert!(events.contains(&GameEvent::BallSafetyNetCollision { ball: id, top: false }));
        assert!(events.contains(&GameEvent::SafetyNetDestroyed { top: false }));
    }

    #[test]
    fn test_ball_bounces_off_tesla_arc() {
        let mut m = in_play(TESLA_LAYOUT);
        let a = m.level().piece_at(6, 1).unwrap().id;
        let b = m.level().piece_at(6, 6).unwrap().id;
        assert_eq!(m.level().tesla_arcs().len(), 1);
        let ball = &mut m.balls_mut()[0];
        ball.center = Vec2::new(10.0, 5.9);
        ball.set_direction(Vec2::Y);
        m.drain_events();

        m.tick(SIM_DT);
        let ball = &m.balls()[0];
        assert!(ball.direction().y < 0.0);
        assert!(ball.center.y < 6.5 - BALL_RADIUS);
        assert_eq!(ball.last_thing_collided_with, Some(Collidable::TeslaArc(a, b)));
        let id = ball.id;
        assert!(m.drain_events().contains(&GameEvent::BallTeslaArcCollision { ball: id }));
    }

    #[test]
    fn test_moving_boss_kicks_ball() {
        // one part sliding right at 24 units/sec
        let boss = Boss::new(
            "slider",
            vec![BossBodyPart::new(Vec2::ZERO, Vec2::new(2.0, 0.5), 10.0)],
            &[Vec2::new(4.0, 6.0), Vec2::new(16.0, 6.0)],
            0.5,
        );
        let level = GameLevel::from_layout("boss", OPEN_LAYOUT).unwrap().with_boss(boss);
        let mut m = in_play_level(level, Tuning::default());
        m.tick_boss_ai(SIM_DT);
        let boss = m.level().boss.as_ref().unwrap();
        let (at, velocity) = (boss.position(), boss.line_velocity());
        assert!((velocity.x - 24.0).abs() < 0.1);

        let speed = m.tuning().normal_speed;
        let ball = &mut m.balls_mut()[0];
        ball.center = Vec2::new(at.x, at.y - 0.5 - BALL_RADIUS - 0.05);
        ball.set_velocity(speed, Vec2::Y);
        m.drain_events();

        m.tick(SIM_DT);
        let ball = &m.balls()[0];
        assert_eq!(ball.last_thing_collided_with, Some(Collidable::BossPart(0)));
        assert!(ball.direction().y < 0.0);
        assert!(ball.direction().x > 0.0);
        let expected = velocity.length() - LINE_VELOCITY_IMPULSE_FRACTION * speed;
        assert!((ball.impulse() - expected).abs() < 0.05, "impulse {}", ball.impulse());
        assert_eq!(ball.speed(), speed);
        let id = ball.id;
        assert!(m.drain_events().contains(&GameEvent::BallBossCollision { ball: id, part: 0 }));
    }

    #[test]
    fn test_downward_paddle_exit_is_corrected() {
        let mut ball = crate::sim::ball::Ball::new(crate::sim::ball::BallId(1), Vec2::ZERO, 10.0);
        ball.set_direction(Vec2::new(1.0, -0.2));
        assert!(keep_off_downward(&mut ball, 20.0));
        let expected = rotate_degs(Vec2::X, 20.0);
        assert!((ball.direction() - expected).length() < 1e-5);

        ball.set_direction(Vec2::Y);
        assert!(!keep_off_downward(&mut ball, 20.0));
    }

    #[test]
    fn test_same_seed_same_game() {
        let run = || {
            let mut m = model();
            let mut trace = Vec::new();
            for step in 0..1200 {
                if m.state_kind() == Some(GameStateKind::BallOnPaddle) {
                    m.shoot_action_release_use();
                }
                let dir = if step % 200 < 100 { 1.0 } else { -1.0 };
                m.move_paddle(dir, 1.0);
                m.tick(SIM_DT);
                trace.push((m.balls().iter().map(|b| b.center).collect::<Vec<_>>(), m.score()));
            }
            trace
        };
        assert_eq!(run(), run());
    }
}
