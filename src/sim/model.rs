//! The game model
//!
//! Owns every live entity, the current and staged game state, scoring and
//! item bookkeeping. States drive the model through the methods here; the
//! model never reaches back into a state except to tick it or forward input.

use std::collections::{BTreeMap, BTreeSet};

use bitflags::bitflags;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::ball::{Ball, BallId, BallTypes, Collidable};
use super::beam::{Beam, BeamId};
use super::boost::BallBoostModel;
use super::events::GameEvent;
use super::item::{GameItem, GameItemTimer, ItemId, ItemKind, TimerCategory, TimerId};
use super::level::{GameLevel, GameWorld, PieceId, PieceKind, PieceStatus};
use super::paddle::{Paddle, PaddleTypes};
use super::projectile::{Projectile, ProjectileId, ProjectileKind};
use super::safety_net::SafetyNet;
use super::state::{GameState, GameStateKind, StateTransition};
use crate::consts::*;
use crate::rotate_degs;
use crate::tuning::Tuning;

bitflags! {
    /// Independent pause switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PauseFlags: u32 {
        /// The current state's tick is skipped
        const STATE  = 1 << 0;
        /// Paddle ignores movement
        const PADDLE = 1 << 1;
        /// Ball movement and collisions are frozen
        const BALL   = 1 << 2;
        /// Bosses stop thinking
        const AI     = 1 << 3;
        /// Nothing ticks at all
        const GAME   = 1 << 4;
    }
}

/// What hitting a piece asks the caller to do with the ball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceHitOutcome {
    Nothing,
    /// Move the ball out of the sibling portal
    Teleport { to: PieceId },
}

/// Bullets travel straight up from the paddle edges
const LASER_BULLET_INSET: f32 = 0.25;
/// Points for destroying a boss part, as a multiple of a block
const BOSS_PART_POINTS_FACTOR: u64 = 5;
/// Paddle speed below which a launch counts as from a still paddle
const STILL_PADDLE_SPEED: f32 = 0.5;

pub struct GameModel {
    tuning: Tuning,
    seed: u64,
    rng: Pcg32,

    worlds: Vec<GameWorld>,
    world_index: usize,
    level_index: usize,
    /// Working copy of the current level
    level: GameLevel,

    paddle: Paddle,
    /// Live balls; the front ball is the one most recently struck by the paddle
    balls: Vec<Ball>,
    items: Vec<GameItem>,
    timers: Vec<GameItemTimer>,
    projectiles: BTreeMap<ProjectileKind, Vec<Projectile>>,
    /// Rocket in flight that the other movement input steers
    remote_rocket: Option<ProjectileId>,
    beams: Vec<Beam>,
    /// Bottom net at index 0, top net at index 1
    safety_nets: [Option<SafetyNet>; 2],

    /// Active status effects per piece; entries never hold an empty set
    piece_status: BTreeMap<PieceId, PieceStatus>,
    burn_times: BTreeMap<PieceId, f32>,
    doing_piece_status_list_iteration: bool,
    deferred_status_removals: Vec<(PieceId, PieceStatus)>,

    score: u64,
    num_interim_blocks_destroyed: u32,
    multiplier: u32,
    lives_left: u32,
    pause: PauseFlags,
    boost: BallBoostModel,

    state: Option<GameState>,
    state_kind: Option<GameStateKind>,
    next_state: Option<StateTransition>,

    events: Vec<GameEvent>,
    next_id: u32,
    /// Unscaled dt of the tick in progress
    real_dt: f32,
    time_ticks: u64,
}

impl GameModel {
    pub fn new(tuning: Tuning, worlds: Vec<GameWorld>, seed: u64) -> Self {
        assert!(!worlds.is_empty(), "no worlds to play");
        let level = worlds[0].levels[0].clone();
        let paddle = Paddle::new(
            level.paddle_start(tuning.paddle_half_height),
            0.0,
            level.unit_width(),
            &tuning,
        );
        let boost = BallBoostModel::new(&tuning);
        let lives_left = tuning.initial_lives.min(tuning.max_lives);

        let mut model = Self {
            tuning,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            worlds,
            world_index: 0,
            level_index: 0,
            level,
            paddle,
            balls: Vec::new(),
            items: Vec::new(),
            timers: Vec::new(),
            projectiles: BTreeMap::new(),
            remote_rocket: None,
            beams: Vec::new(),
            safety_nets: [None, None],
            piece_status: BTreeMap::new(),
            burn_times: BTreeMap::new(),
            doing_piece_status_list_iteration: false,
            deferred_status_removals: Vec::new(),
            score: 0,
            num_interim_blocks_destroyed: 0,
            multiplier: 1,
            lives_left,
            pause: PauseFlags::empty(),
            boost,
            state: None,
            state_kind: None,
            next_state: None,
            events: Vec::new(),
            next_id: 1,
            real_dt: 0.0,
            time_ticks: 0,
        };
        model.update_paddle_limits();
        model.set_next_state(StateTransition::LevelStart);
        model.update_state();
        model
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut Pcg32 {
        &mut self.rng
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub(crate) fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Take every event raised since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    pub fn state_kind(&self) -> Option<GameStateKind> {
        self.state_kind
    }

    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    /// Transition waiting for the next [`Self::update_state`]
    pub fn staged_transition(&self) -> Option<&StateTransition> {
        self.next_state.as_ref()
    }

    /// Stage a transition; it replaces the current state at the start of the next tick
    pub fn set_next_state(&mut self, transition: StateTransition) {
        if let Some(prev) = &self.next_state {
            log::debug!("Replacing staged transition {prev:?} with {transition:?}");
        }
        self.next_state = Some(transition);
    }

    /// Swap in the staged state, if any. Returns true when the state changed.
    pub fn update_state(&mut self) -> bool {
        let Some(transition) = self.next_state.take() else {
            return false;
        };
        let from = self.state_kind;
        if let Some(mut old) = self.state.take() {
            old.exit(self);
        }
        let to = transition.kind();
        log::info!("State {from:?} -> {to:?}");
        self.state_kind = Some(to);
        self.push_event(GameEvent::StateChanged { from, to });
        let state = GameState::enter(transition, self);
        self.state = Some(state);
        true
    }

    /// Run `f` against the current state with the model borrowed mutably alongside it
    fn with_state<R>(&mut self, f: impl FnOnce(&mut GameState, &mut GameModel) -> R) -> Option<R> {
        let mut state = self.state.take()?;
        let result = f(&mut state, self);
        self.state = Some(state);
        Some(result)
    }

    /// Advance the simulation by `dt` seconds of real time
    pub fn tick(&mut self, dt: f32) {
        self.update_state();
        if self.is_paused(PauseFlags::GAME) {
            return;
        }
        self.real_dt = dt;
        self.time_ticks += 1;
        if self.is_paused(PauseFlags::STATE) {
            return;
        }
        let scaled = dt * self.boost.time_scale();
        self.with_state(|state, model| state.tick(model, scaled));
    }

    // ------------------------------------------------------------------
    // Input hooks (forwarded to the current state)
    // ------------------------------------------------------------------

    pub fn shoot_action_release_use(&mut self) {
        self.with_state(|state, model| state.shoot_action_release_use(model));
    }

    pub fn shoot_action_continuous_use(&mut self, dt: f32, magnitude: f32) {
        self.with_state(|state, model| state.shoot_action_continuous_use(model, dt, magnitude));
    }

    /// Paddle movement; `direction` is -1, 0 or 1
    pub fn move_paddle(&mut self, direction: f32, magnitude: f32) {
        self.with_state(|state, model| state.move_key_pressed_for_paddle(model, direction, magnitude));
    }

    pub fn move_key_pressed_for_other(&mut self, direction: f32, magnitude: f32) {
        self.with_state(|state, model| state.move_key_pressed_for_other(model, direction, magnitude));
    }

    pub fn ball_boost_direction_pressed(&mut self, direction: Vec2) {
        self.with_state(|state, model| state.ball_boost_direction_pressed(model, direction));
    }

    pub fn ball_boost_direction_released(&mut self) {
        self.with_state(|state, model| state.ball_boost_direction_released(model));
    }

    /// Fast-forward skippable animations
    pub fn skip_action(&mut self) {
        self.with_state(|state, model| state.skip_action(model));
    }

    // ------------------------------------------------------------------
    // Pause
    // ------------------------------------------------------------------

    pub fn pause(&mut self, flags: PauseFlags) {
        self.pause.insert(flags);
        if flags.contains(PauseFlags::PADDLE) {
            self.paddle.halt();
        }
    }

    pub fn unpause(&mut self, flags: PauseFlags) {
        self.pause.remove(flags);
    }

    pub fn is_paused(&self, flags: PauseFlags) -> bool {
        self.pause.intersects(flags)
    }

    pub fn pause_flags(&self) -> PauseFlags {
        self.pause
    }

    // ------------------------------------------------------------------
    // Worlds and levels
    // ------------------------------------------------------------------

    pub fn level(&self) -> &GameLevel {
        &self.level
    }

    pub fn level_mut(&mut self) -> &mut GameLevel {
        &mut self.level
    }

    pub fn world_index(&self) -> usize {
        self.world_index
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn worlds(&self) -> &[GameWorld] {
        &self.worlds
    }

    pub fn is_last_level_in_world(&self) -> bool {
        self.level_index + 1 >= self.worlds[self.world_index].levels.len()
    }

    pub fn is_last_world(&self) -> bool {
        self.world_index + 1 >= self.worlds.len()
    }

    /// Load a fresh copy of a level and reset everything that lives inside one
    pub fn load_level(&mut self, world: usize, level: usize) {
        assert!(world < self.worlds.len() && level < self.worlds[world].levels.len());
        self.world_index = world;
        self.level_index = level;
        self.level = self.worlds[world].levels[level].clone();
        log::info!("Loaded level {} ({}/{})", self.level.name, world, level);

        self.clear_balls();
        self.clear_live_items();
        self.clear_active_timers();
        self.clear_projectiles();
        self.clear_beams();
        for top in [false, true] {
            self.destroy_safety_net(top);
        }
        self.piece_status.clear();
        self.burn_times.clear();
        self.deferred_status_removals.clear();
        self.set_num_interim_blocks_destroyed(0);
        self.boost.reset();

        self.paddle.types = PaddleTypes::empty();
        self.paddle.reset_size();
        self.paddle.halt();
        self.paddle.center = self.level.paddle_start(self.paddle.half_height());
        self.paddle.set_travel_limits(0.0, self.level.unit_width());
        self.update_paddle_limits();
    }

    /// Move on to the next level of the current world
    pub fn increment_level(&mut self) {
        assert!(!self.is_last_level_in_world(), "no level after the last one");
        self.load_level(self.world_index, self.level_index + 1);
    }

    /// Move on to the first level of the next world
    pub fn increment_world(&mut self) {
        assert!(!self.is_last_world(), "no world after the last one");
        self.load_level(self.world_index + 1, 0);
        self.push_event(GameEvent::WorldStarted { world: self.world_index });
    }

    /// Stage LevelComplete once the level is finished during play
    pub fn check_level_completion(&mut self) -> bool {
        let done = self.level.is_level_complete();
        if done
            && self.state_kind == Some(GameStateKind::BallInPlay)
            && !matches!(self.next_state, Some(StateTransition::LevelComplete))
        {
            self.set_next_state(StateTransition::LevelComplete);
        }
        done
    }

    // ------------------------------------------------------------------
    // Score and lives
    // ------------------------------------------------------------------

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn score_multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn num_interim_blocks_destroyed(&self) -> u32 {
        self.num_interim_blocks_destroyed
    }

    pub fn set_num_interim_blocks_destroyed(&mut self, count: u32) {
        self.num_interim_blocks_destroyed = count;
        let multiplier = self.tuning.multiplier_for(count);
        if multiplier != self.multiplier {
            self.multiplier = multiplier;
            self.push_event(GameEvent::ScoreMultiplierChanged { multiplier });
        }
    }

    fn add_points(&mut self, base: u64) {
        self.score += base * self.multiplier as u64;
        self.push_event(GameEvent::ScoreChanged { score: self.score });
    }

    pub fn lives_left(&self) -> u32 {
        self.lives_left
    }

    /// Set remaining lives, clamped to the configured maximum
    pub fn set_lives_left(&mut self, lives: u32) {
        let lives = lives.min(self.tuning.max_lives);
        if lives != self.lives_left {
            let from = self.lives_left;
            self.lives_left = lives;
            self.push_event(GameEvent::LivesChanged { from, to: lives });
        }
    }

    /// The last ball is gone for good: lose a life and pick the next state
    pub fn ball_died(&mut self) {
        let lives = self.lives_left.saturating_sub(1);
        self.set_lives_left(lives);
        if lives == 0 {
            self.set_next_state(StateTransition::GameOver);
        } else {
            self.set_next_state(StateTransition::BallOnPaddle);
        }
    }

    // ------------------------------------------------------------------
    // Paddle
    // ------------------------------------------------------------------

    pub fn paddle(&self) -> &Paddle {
        &self.paddle
    }

    pub fn paddle_mut(&mut self) -> &mut Paddle {
        &mut self.paddle
    }

    pub fn tick_paddle(&mut self, dt: f32) {
        if self.is_paused(PauseFlags::PADDLE) {
            self.paddle.halt();
            self.paddle.tick(0.0);
            return;
        }
        self.paddle.tick(dt);
    }

    /// Recompute how far the paddle can travel given the pieces beside it
    pub fn update_paddle_limits(&mut self) {
        let (lo, hi) = self.level.paddle_limits(&self.paddle.bounds());
        self.paddle.set_travel_limits(lo, hi);
    }

    /// Bosses never overlap the paddle: shove it out the nearer side
    pub fn do_boss_paddle_collision(&mut self) {
        let Some(boss) = self.level.boss.as_ref() else {
            return;
        };
        let pb = self.paddle.bounds();
        let Some(part) = boss.overlapping_part(&pb) else {
            return;
        };
        let bb = boss.part_bounds(part);
        let push_left = bb.min.x - pb.max.x - EPSILON;
        let push_right = bb.max.x - pb.min.x + EPSILON;
        let dx = if push_right.abs() < push_left.abs() { push_right } else { push_left };
        self.paddle.shunt(dx);
        self.push_event(GameEvent::PaddleHitByBoss);
    }

    /// Launch direction off the paddle: straight up with some randomness, leaning with paddle motion
    pub fn random_release_direction(&mut self) -> Vec2 {
        let still = self.tuning.paddle_release_rand_degs_still;
        let moving = self.tuning.paddle_release_rand_degs_moving;
        let vx = self.paddle.average_velocity().x;
        let degs = if vx.abs() < STILL_PADDLE_SPEED {
            self.rng.random_range(-still..=still)
        } else {
            -vx.signum() * still + self.rng.random_range(-moving..=moving)
        };
        rotate_degs(Vec2::Y, degs)
    }

    // ------------------------------------------------------------------
    // Balls
    // ------------------------------------------------------------------

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn balls_mut(&mut self) -> &mut Vec<Ball> {
        &mut self.balls
    }

    pub fn ball_index(&self, id: BallId) -> Option<usize> {
        self.balls.iter().position(|b| b.id == id)
    }

    pub fn ball(&self, id: BallId) -> Option<&Ball> {
        self.balls.iter().find(|b| b.id == id)
    }

    pub fn ball_mut(&mut self, id: BallId) -> Option<&mut Ball> {
        self.balls.iter_mut().find(|b| b.id == id)
    }

    /// Put a fresh ball on the paddle
    pub fn spawn_ball_on_paddle(&mut self) -> BallId {
        let id = BallId(self.next_entity_id());
        let pos = self.paddle.ball_rest_position(BALL_RADIUS);
        self.balls.push(Ball::new(id, pos, self.tuning.normal_speed));
        self.push_event(GameEvent::BallSpawned { ball: id });
        id
    }

    /// Remove one ball from play (not the last one; that goes through the death state)
    pub fn remove_ball(&mut self, id: BallId) -> Option<Ball> {
        let index = self.ball_index(id)?;
        let ball = self.balls.remove(index);
        if self.paddle.attached_ball() == Some(id) {
            self.paddle.detach_ball();
        }
        for other in &mut self.balls {
            if other.last_thing_collided_with == Some(Collidable::Ball(id)) {
                other.last_thing_collided_with = None;
            }
        }
        self.remove_active_game_items_for_this_ball_only(id);
        self.push_event(GameEvent::BallDied { ball: id });
        Some(ball)
    }

    /// Drop every ball without death notifications (level changes)
    pub fn clear_balls(&mut self) {
        self.paddle.detach_ball();
        let ids: Vec<BallId> = self.balls.drain(..).map(|b| b.id).collect();
        for id in ids {
            self.remove_active_game_items_for_this_ball_only(id);
        }
    }

    /// Move a ball to the front of the list
    pub fn promote_ball_to_front(&mut self, id: BallId) {
        if let Some(index) = self.ball_index(id)
            && index > 0
        {
            let ball = self.balls.remove(index);
            self.balls.insert(0, ball);
        }
    }

    /// Split the front ball into `count` balls spread evenly around it
    pub fn split_front_ball(&mut self, count: usize) {
        assert!(count >= 2, "a split needs at least two balls");
        let Some(front) = self.balls.first().cloned() else {
            return;
        };
        let no_collide = self.tuning.multiball_no_collision_time;
        let spacing = 360.0 / count as f32;
        self.balls[0].set_ball_collisions_disabled(no_collide);
        for k in 1..count {
            let id = BallId(self.next_entity_id());
            let mut ball = front.split(id, rotate_degs(front.direction(), spacing * k as f32));
            ball.set_ball_collisions_disabled(no_collide);
            for timer in &mut self.timers {
                if timer.is_associated_with(front.id) {
                    timer.associate_ball(id);
                }
            }
            self.balls.push(ball);
            self.push_event(GameEvent::BallSpawned { ball: id });
        }
    }

    pub fn ball_paddle_collision_occurred(&mut self, ball: BallId) {
        self.set_num_interim_blocks_destroyed(0);
        self.push_event(GameEvent::BallPaddleCollision { ball });
    }

    // ------------------------------------------------------------------
    // Level pieces
    // ------------------------------------------------------------------

    /// Apply a ball hit to a piece
    pub fn ball_piece_collision_occurred(&mut self, ball_index: usize, id: PieceId) -> PieceHitOutcome {
        let ball = &mut self.balls[ball_index];
        ball.last_thing_collided_with = Some(Collidable::Piece(id));
        let ball_id = ball.id;
        let types = ball.types;
        self.push_event(GameEvent::BallPieceCollision { ball: ball_id, piece: id });

        let piece = self.level.piece(id);
        let (kind, frozen) = (piece.kind, piece.status.contains(PieceStatus::FROZEN));
        match kind {
            PieceKind::Empty | PieceKind::Solid => PieceHitOutcome::Nothing,
            PieceKind::Portal { sibling } => PieceHitOutcome::Teleport { to: sibling },
            PieceKind::Tesla { .. } => {
                self.toggle_tesla(id);
                PieceHitOutcome::Nothing
            }
            PieceKind::Breakable { .. } | PieceKind::Bomb | PieceKind::ItemDrop | PieceKind::Ink => {
                if frozen {
                    self.destroy_piece(id);
                } else if types.contains(BallTypes::FIRE) {
                    self.add_status_update_level_piece(id, PieceStatus::ON_FIRE);
                } else if types.contains(BallTypes::ICE) {
                    self.remove_status_for_level_piece(id, PieceStatus::ON_FIRE);
                    self.add_status_update_level_piece(id, PieceStatus::FROZEN);
                } else if types.contains(BallTypes::UBER) {
                    self.destroy_piece(id);
                } else {
                    self.damage_piece(id);
                }
                PieceHitOutcome::Nothing
            }
        }
    }

    /// One plain hit (bullets, beams, ordinary balls)
    pub fn damage_piece(&mut self, id: PieceId) {
        let piece = self.level.piece(id);
        let (kind, frozen) = (piece.kind, piece.status.contains(PieceStatus::FROZEN));
        match kind {
            PieceKind::Breakable { hp } if hp > 1 && !frozen => {
                self.level.piece_mut(id).kind = PieceKind::Breakable { hp: hp - 1 };
            }
            PieceKind::Breakable { .. } | PieceKind::Bomb | PieceKind::ItemDrop | PieceKind::Ink => {
                self.destroy_piece(id);
            }
            PieceKind::Tesla { .. } => self.toggle_tesla(id),
            PieceKind::Empty | PieceKind::Solid | PieceKind::Portal { .. } => {}
        }
    }

    fn toggle_tesla(&mut self, id: PieceId) {
        if let Some(active) = self.level.toggle_tesla(id) {
            self.push_event(GameEvent::TeslaToggled { piece: id, active });
        }
    }

    /// Destroy a piece, scoring it and setting off anything it triggers
    pub fn destroy_piece(&mut self, id: PieceId) -> bool {
        let center = self.level.piece(id).center();
        let Some(prev) = self.level.remove_piece(id) else {
            return false;
        };
        self.remove_status_for_level_piece(id, PieceStatus::all());
        for ball in &mut self.balls {
            if ball.last_thing_collided_with == Some(Collidable::Piece(id)) {
                ball.last_thing_collided_with = None;
            }
        }
        self.push_event(GameEvent::PieceDestroyed { piece: id });
        self.add_points(self.tuning.points_per_block);
        self.set_num_interim_blocks_destroyed(self.num_interim_blocks_destroyed + 1);
        self.maybe_drop_item(prev, center);

        if prev == PieceKind::Bomb {
            for neighbour in self.level.neighbours(id) {
                self.destroy_piece(neighbour);
            }
        }
        self.check_level_completion();
        true
    }

    fn maybe_drop_item(&mut self, kind: PieceKind, center: Vec2) {
        let drops = match kind {
            PieceKind::ItemDrop => true,
            PieceKind::Breakable { .. } => self.rng.random::<f32>() < self.tuning.item_drop_probability,
            _ => false,
        };
        if drops {
            let kind = ItemKind::random(&mut self.rng);
            self.spawn_item(kind, center);
        }
    }

    // ------------------------------------------------------------------
    // Piece status effects
    // ------------------------------------------------------------------

    pub fn piece_status(&self, id: PieceId) -> PieceStatus {
        self.piece_status.get(&id).copied().unwrap_or_default()
    }

    pub fn num_pieces_with_status(&self) -> usize {
        self.piece_status.len()
    }

    /// Add a status to a live piece; false if it already had it or can't take it
    pub fn add_status_update_level_piece(&mut self, id: PieceId, status: PieceStatus) -> bool {
        let piece = self.level.piece_mut(id);
        if !piece.must_be_destroyed() || piece.status.contains(status) {
            return false;
        }
        piece.status.insert(status);
        self.piece_status.entry(id).or_default().insert(status);
        if status.contains(PieceStatus::ON_FIRE) {
            self.burn_times.insert(id, 0.0);
        }
        self.push_event(GameEvent::PieceStatusAdded { piece: id, status: status.bits() });
        true
    }

    /// Remove statuses from a piece; deferred while the status list is being walked
    pub fn remove_status_for_level_piece(&mut self, id: PieceId, status: PieceStatus) {
        if self.doing_piece_status_list_iteration {
            self.deferred_status_removals.push((id, status));
            return;
        }
        self.remove_status_now(id, status);
    }

    fn remove_status_now(&mut self, id: PieceId, status: PieceStatus) {
        let Some(current) = self.piece_status.get_mut(&id) else {
            return;
        };
        let removed = *current & status;
        if removed.is_empty() {
            return;
        }
        current.remove(status);
        if current.is_empty() {
            self.piece_status.remove(&id);
        }
        self.level.piece_mut(id).status.remove(status);
        if removed.contains(PieceStatus::ON_FIRE) {
            self.burn_times.remove(&id);
        }
        self.push_event(GameEvent::PieceStatusRemoved { piece: id, status: removed.bits() });
    }

    /// Burn down pieces that are on fire
    pub fn tick_piece_status(&mut self, dt: f32) {
        self.doing_piece_status_list_iteration = true;
        let burn_time = self.tuning.fire_burn_time;
        let burning: Vec<PieceId> = self.burn_times.keys().copied().collect();
        for id in burning {
            let Some(elapsed) = self.burn_times.get_mut(&id) else {
                continue;
            };
            *elapsed += dt;
            if *elapsed >= burn_time {
                self.destroy_piece(id);
            }
        }
        self.doing_piece_status_list_iteration = false;
        for (id, status) in std::mem::take(&mut self.deferred_status_removals) {
            self.remove_status_now(id, status);
        }
    }

    // ------------------------------------------------------------------
    // Items and timers
    // ------------------------------------------------------------------

    pub fn items(&self) -> &[GameItem] {
        &self.items
    }

    pub fn timers(&self) -> &[GameItemTimer] {
        &self.timers
    }

    pub fn active_timer(&self, category: TimerCategory) -> Option<&GameItemTimer> {
        self.timers.iter().find(|t| t.category() == Some(category))
    }

    pub fn spawn_item(&mut self, kind: ItemKind, center: Vec2) -> ItemId {
        let id = ItemId(self.next_entity_id());
        self.items.push(GameItem::new(id, kind, center, self.tuning.item_fall_speed));
        self.push_event(GameEvent::ItemSpawned { item: id, kind });
        id
    }

    /// Let items fall; ones that leave the level are dropped
    pub fn tick_items(&mut self, dt: f32) {
        let mut i = 0;
        while i < self.items.len() {
            self.items[i].tick(dt);
            if self.level.is_out_of_bounds(self.items[i].center) {
                let item = self.items.remove(i);
                self.push_event(GameEvent::ItemRemoved { item: item.id });
            } else {
                i += 1;
            }
        }
    }

    /// Collect items touching the paddle
    pub fn do_item_collisions(&mut self) {
        let paddle_bounds = self.paddle.bounds();
        let mut i = 0;
        while i < self.items.len() {
            if self.items[i].bounds().overlaps(&paddle_bounds) {
                let item = self.items.remove(i);
                self.push_event(GameEvent::ItemPaddleCollision { item: item.id, kind: item.kind });
                self.push_event(GameEvent::ItemRemoved { item: item.id });
                self.activate_item(item);
            } else {
                i += 1;
            }
        }
    }

    pub fn clear_live_items(&mut self) {
        for item in std::mem::take(&mut self.items) {
            self.push_event(GameEvent::ItemRemoved { item: item.id });
        }
    }

    /// Apply an item, replacing any live timer of the same category
    pub fn activate_item(&mut self, item: GameItem) {
        let kind = item.kind;
        if let Some(category) = kind.timer_category()
            && let Some(index) = self.timers.iter().position(|t| t.category() == Some(category))
        {
            let old = self.timers.remove(index);
            self.deactivate_timer(old);
        }

        let affected = self.activate_item_effect(kind);
        log::debug!("Activated {kind:?}");
        self.push_event(GameEvent::ItemActivated { kind });

        let duration = kind.duration(self.tuning.item_timer_length);
        if kind.is_ball_scoped() && affected.is_empty() {
            // No ball took the effect, so there is nothing to expire
            log::debug!("{kind:?} caught with no balls in play, no timer started");
            return;
        }
        if duration > 0.0 {
            let id = TimerId(self.next_entity_id());
            self.timers.push(GameItemTimer::new(id, item, duration, affected));
            self.push_event(GameEvent::ItemTimerStarted { timer: id, kind });
        }
    }

    /// Turn an item's effect on; returns the balls it was applied to
    fn activate_item_effect(&mut self, kind: ItemKind) -> Vec<BallId> {
        let ids: Vec<BallId> = self.balls.iter().map(|b| b.id).collect();
        let t = &self.tuning;
        match kind {
            ItemKind::BallSlow => self.balls.iter_mut().for_each(|b| {
                b.decrease_speed(t);
                b.add_type(BallTypes::SLOW);
            }),
            ItemKind::BallFast => self.balls.iter_mut().for_each(|b| {
                b.increase_speed(t);
                b.add_type(BallTypes::FAST);
            }),
            ItemKind::UberBall => self.balls.iter_mut().for_each(|b| b.add_type(BallTypes::UBER)),
            ItemKind::GhostBall => self.balls.iter_mut().for_each(|b| b.add_type(BallTypes::GHOST)),
            ItemKind::InvisiBall => self.balls.iter_mut().for_each(|b| b.add_type(BallTypes::INVISIBLE)),
            ItemKind::CrazyBall => self.balls.iter_mut().for_each(|b| b.add_type(BallTypes::CRAZY)),
            ItemKind::GravityBall => self.balls.iter_mut().for_each(|b| {
                b.add_type(BallTypes::GRAVITY);
                b.set_gravity(t.gravity_accel);
            }),
            ItemKind::FireBall => self.balls.iter_mut().for_each(|b| {
                b.remove_type(BallTypes::ICE);
                b.add_type(BallTypes::FIRE);
            }),
            ItemKind::IceBall => self.balls.iter_mut().for_each(|b| {
                b.remove_type(BallTypes::FIRE);
                b.add_type(BallTypes::ICE);
            }),
            ItemKind::MultiBall3 => self.split_front_ball(3),
            ItemKind::MultiBall5 => self.split_front_ball(5),
            ItemKind::PaddleGrow => {
                self.paddle.grow();
            }
            ItemKind::PaddleShrink => {
                self.paddle.shrink();
            }
            ItemKind::StickyPaddle => self.paddle.add_type(PaddleTypes::STICKY),
            ItemKind::LaserBulletPaddle => self.paddle.add_type(PaddleTypes::LASER_BULLET),
            ItemKind::LaserBeamPaddle => self.paddle.add_type(PaddleTypes::LASER_BEAM),
            ItemKind::ShieldPaddle => self.paddle.add_type(PaddleTypes::SHIELD),
            ItemKind::PoisonPaddle => self.paddle.add_type(PaddleTypes::POISON),
            ItemKind::UpsideDownPaddle => self.paddle.add_type(PaddleTypes::REVERSED),
            ItemKind::RocketPaddle => self.paddle.add_type(PaddleTypes::ROCKET),
            ItemKind::OneUp => self.set_lives_left(self.lives_left + 1),
            ItemKind::BallSafetyNet => {
                self.create_safety_net(false);
            }
        }
        if kind.is_ball_scoped() { ids } else { Vec::new() }
    }

    fn deactivate_item_effect(&mut self, kind: ItemKind, balls: &BTreeSet<BallId>) {
        match kind {
            ItemKind::BallSlow => self.undo_speed_step(balls, BallTypes::SLOW),
            ItemKind::BallFast => self.undo_speed_step(balls, BallTypes::FAST),
            ItemKind::UberBall => self.for_balls(balls, |b| b.remove_type(BallTypes::UBER)),
            ItemKind::GhostBall => self.for_balls(balls, |b| b.remove_type(BallTypes::GHOST)),
            ItemKind::InvisiBall => self.for_balls(balls, |b| b.remove_type(BallTypes::INVISIBLE)),
            ItemKind::CrazyBall => self.for_balls(balls, |b| b.remove_type(BallTypes::CRAZY)),
            ItemKind::GravityBall => self.for_balls(balls, |b| {
                b.remove_type(BallTypes::GRAVITY);
                b.set_gravity(0.0);
            }),
            ItemKind::FireBall => self.for_balls(balls, |b| b.remove_type(BallTypes::FIRE)),
            ItemKind::IceBall => self.for_balls(balls, |b| b.remove_type(BallTypes::ICE)),
            ItemKind::StickyPaddle => self.paddle.remove_type(PaddleTypes::STICKY),
            ItemKind::LaserBulletPaddle => self.paddle.remove_type(PaddleTypes::LASER_BULLET),
            ItemKind::LaserBeamPaddle => {
                self.paddle.remove_type(PaddleTypes::LASER_BEAM);
                self.clear_beams();
            }
            ItemKind::ShieldPaddle => self.paddle.remove_type(PaddleTypes::SHIELD),
            ItemKind::PoisonPaddle => self.paddle.remove_type(PaddleTypes::POISON),
            ItemKind::UpsideDownPaddle => self.paddle.remove_type(PaddleTypes::REVERSED),
            ItemKind::MultiBall3
            | ItemKind::MultiBall5
            | ItemKind::PaddleGrow
            | ItemKind::PaddleShrink
            | ItemKind::RocketPaddle
            | ItemKind::OneUp
            | ItemKind::BallSafetyNet => {}
        }
    }

    /// Step back the tier a Slow/Fast item moved; balls that lost the flag
    /// meanwhile (death resets types) are left alone
    fn undo_speed_step(&mut self, ids: &BTreeSet<BallId>, flag: BallTypes) {
        let tuning = &self.tuning;
        for ball in self.balls.iter_mut().filter(|b| ids.contains(&b.id) && b.has_type(flag)) {
            ball.remove_type(flag);
            if flag == BallTypes::SLOW {
                ball.increase_speed(tuning);
            } else {
                ball.decrease_speed(tuning);
            }
        }
    }

    fn for_balls(&mut self, ids: &BTreeSet<BallId>, f: impl FnMut(&mut Ball)) {
        self.balls.iter_mut().filter(|b| ids.contains(&b.id)).for_each(f);
    }

    fn deactivate_timer(&mut self, timer: GameItemTimer) {
        let kind = timer.kind();
        self.deactivate_item_effect(kind, timer.associated_balls());
        self.push_event(GameEvent::ItemTimerStopped { timer: timer.id, kind });
        self.push_event(GameEvent::ItemDeactivated { kind });
    }

    pub fn tick_timers(&mut self, dt: f32) {
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].tick(dt) {
                let timer = self.timers.remove(i);
                self.deactivate_timer(timer);
            } else {
                i += 1;
            }
        }
    }

    pub fn clear_active_timers(&mut self) {
        for timer in std::mem::take(&mut self.timers) {
            self.deactivate_timer(timer);
        }
    }

    /// Forget a dead ball in every timer; timers left with no balls end now
    pub fn remove_active_game_items_for_this_ball_only(&mut self, ball: BallId) {
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].remove_ball(ball) {
                let timer = self.timers.remove(i);
                self.deactivate_timer(timer);
            } else {
                i += 1;
            }
        }
    }

    // ------------------------------------------------------------------
    // Safety nets
    // ------------------------------------------------------------------

    pub fn safety_net(&self, top: bool) -> Option<&SafetyNet> {
        self.safety_nets[top as usize].as_ref()
    }

    pub fn create_safety_net(&mut self, top: bool) -> bool {
        if self.safety_nets[top as usize].is_some() {
            return false;
        }
        let y = if top {
            self.level.unit_height() + PIECE_HEIGHT * 0.25
        } else {
            PIECE_HEIGHT * 0.25
        };
        self.safety_nets[top as usize] = Some(SafetyNet::new(top, self.level.unit_width(), y));
        self.push_event(GameEvent::SafetyNetCreated { top });
        true
    }

    pub fn destroy_safety_net(&mut self, top: bool) -> bool {
        if self.safety_nets[top as usize].take().is_none() {
            return false;
        }
        self.push_event(GameEvent::SafetyNetDestroyed { top });
        true
    }

    pub fn ball_safety_net_collision_occurred(&mut self, ball: BallId, top: bool) {
        self.push_event(GameEvent::BallSafetyNetCollision { ball, top });
        self.destroy_safety_net(top);
    }

    /// The paddle wrecks any net it touches
    pub fn do_paddle_safety_net_collision(&mut self) {
        let bounds = self.paddle.bounds();
        for top in [false, true] {
            if self
                .safety_net(top)
                .is_some_and(|net| net.paddle_collision_check(&bounds))
            {
                self.destroy_safety_net(top);
            }
        }
    }

    // ------------------------------------------------------------------
    // Bosses
    // ------------------------------------------------------------------

    pub fn ball_boss_collision_occurred(&mut self, ball: BallId, part: usize) {
        self.push_event(GameEvent::BallBossCollision { ball, part });
        self.damage_boss_part(part, 1.0);
    }

    pub fn damage_boss_part(&mut self, part: usize, amount: f32) {
        let Some(boss) = self.level.boss.as_mut() else {
            return;
        };
        if !boss.damage_part(part, amount) {
            return;
        }
        let dead = boss.is_dead();
        self.push_event(GameEvent::BossPartDestroyed { part });
        self.add_points(self.tuning.points_per_block * BOSS_PART_POINTS_FACTOR);
        if dead {
            log::info!("Boss defeated");
            self.push_event(GameEvent::BossDefeated);
            self.check_level_completion();
        }
    }

    pub fn tick_boss_ai(&mut self, dt: f32) {
        if self.is_paused(PauseFlags::AI) {
            return;
        }
        if let Some(boss) = self.level.boss.as_mut() {
            boss.tick_ai(dt);
        }
    }

    // ------------------------------------------------------------------
    // Projectiles
    // ------------------------------------------------------------------

    pub fn projectiles(&self, kind: ProjectileKind) -> &[Projectile] {
        self.projectiles.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_projectiles(&self) -> usize {
        self.projectiles.values().map(Vec::len).sum()
    }

    pub fn add_projectile(&mut self, kind: ProjectileKind, center: Vec2, velocity: Vec2) -> ProjectileId {
        let id = ProjectileId(self.next_entity_id());
        self.projectiles
            .entry(kind)
            .or_default()
            .push(Projectile::new(id, kind, center, velocity));
        self.push_event(GameEvent::ProjectileSpawned { projectile: id, kind });
        id
    }

    pub fn remote_rocket(&self) -> Option<ProjectileId> {
        self.remote_rocket
    }

    fn remove_projectile(&mut self, kind: ProjectileKind, index: usize) {
        let Some(bucket) = self.projectiles.get_mut(&kind) else {
            return;
        };
        let projectile = bucket.remove(index);
        self.teardown_projectile(projectile);
    }

    /// Unlink a removed projectile and announce it
    fn teardown_projectile(&mut self, projectile: Projectile) {
        projectile.teardown(&mut self.remote_rocket);
        self.push_event(GameEvent::ProjectileRemoved { projectile: projectile.id, kind: projectile.kind });
    }

    pub fn clear_projectiles(&mut self) {
        for bucket in std::mem::take(&mut self.projectiles).into_values() {
            for projectile in bucket {
                self.teardown_projectile(projectile);
            }
        }
        debug_assert!(self.remote_rocket.is_none());
    }

    pub fn tick_projectiles(&mut self, dt: f32) {
        for bucket in self.projectiles.values_mut() {
            for p in bucket.iter_mut() {
                p.tick(dt);
            }
        }
    }

    /// Fire laser bullets from both ends of the paddle
    pub fn fire_laser_bullets(&mut self) {
        let hw = self.paddle.half_width() - LASER_BULLET_INSET;
        let y = self.paddle.top_y() + ProjectileKind::LaserBullet.half_extents().y;
        let v = Vec2::new(0.0, self.tuning.laser_bullet_speed);
        for x in [self.paddle.center.x - hw, self.paddle.center.x + hw] {
            self.add_projectile(ProjectileKind::LaserBullet, Vec2::new(x, y), v);
        }
        self.paddle.shot_fired();
    }

    /// Launch the paddle's rocket if it has one; it becomes the steerable rocket
    pub fn fire_paddle_rocket(&mut self) -> bool {
        if !self.paddle.has_type(PaddleTypes::ROCKET) {
            return false;
        }
        self.paddle.remove_type(PaddleTypes::ROCKET);
        let pos = Vec2::new(
            self.paddle.center.x,
            self.paddle.top_y() + ProjectileKind::PaddleRocket.half_extents().y,
        );
        let id = self.add_projectile(ProjectileKind::PaddleRocket, pos, Vec2::new(0.0, self.tuning.rocket_speed));
        self.remote_rocket = Some(id);
        true
    }

    /// Steer the rocket in flight sideways; no-op without one
    pub fn steer_remote_rocket(&mut self, direction: f32, magnitude: f32) {
        let Some(id) = self.remote_rocket else {
            return;
        };
        let vx = direction.signum() * magnitude.clamp(0.0, 1.0) * self.tuning.rocket_speed * 0.5;
        let rocket = self
            .projectiles
            .get_mut(&ProjectileKind::PaddleRocket)
            .and_then(|rockets| rockets.iter_mut().find(|p| p.id == id));
        debug_assert!(rocket.is_some(), "remote rocket {id:?} outlived its projectile");
        if let Some(rocket) = rocket {
            rocket.velocity.x = if direction == 0.0 { 0.0 } else { vx };
        }
    }

    /// Resolve projectiles against the boss and pieces; lost ones are removed
    pub fn do_projectile_collisions(&mut self, dt: f32) {
        for kind in [ProjectileKind::LaserBullet, ProjectileKind::PaddleRocket] {
            let mut i = 0;
            while i < self.projectiles(kind).len() {
                let projectile = &self.projectiles(kind)[i];
                let swept = projectile.swept_bounds(dt);
                let center = projectile.center;

                let boss_part = self.level.boss.as_ref().and_then(|b| b.overlapping_part(&swept));
                let piece = self
                    .level
                    .collision_candidates(&swept)
                    .into_iter()
                    .find(|&id| {
                        let piece = self.level.piece(id);
                        piece.ball_bounces_off_when_hit() && piece.bounds().overlaps(&swept)
                    });

                if let Some(part) = boss_part {
                    self.remove_projectile(kind, i);
                    let damage = match kind {
                        ProjectileKind::LaserBullet => 1.0,
                        ProjectileKind::PaddleRocket => self.tuning.boss_part_hit_points,
                    };
                    self.damage_boss_part(part, damage);
                } else if let Some(id) = piece {
                    self.remove_projectile(kind, i);
                    match kind {
                        ProjectileKind::LaserBullet => self.damage_piece(id),
                        ProjectileKind::PaddleRocket => {
                            if self.level.piece(id).must_be_destroyed() {
                                self.destroy_piece(id);
                            } else {
                                self.damage_piece(id);
                            }
                            for neighbour in self.level.neighbours(id) {
                                self.destroy_piece(neighbour);
                            }
                        }
                    }
                } else if self.level.is_out_of_bounds(center) {
                    self.remove_projectile(kind, i);
                } else {
                    i += 1;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Beams
    // ------------------------------------------------------------------

    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    fn beam_origin(&self) -> Vec2 {
        Vec2::new(self.paddle.center.x, self.paddle.top_y())
    }

    /// Fire the paddle laser beam; only one may exist
    pub fn fire_laser_beam(&mut self) -> bool {
        assert!(self.beams.len() <= 1, "more than one paddle laser beam");
        if !self.beams.is_empty() || !self.paddle.has_type(PaddleTypes::LASER_BEAM) {
            return false;
        }
        let id = BeamId(self.next_entity_id());
        let origin = self.beam_origin();
        let mut beam = Beam::new(id, origin, self.tuning.beam_duration);
        beam.trace(origin, &self.level);
        self.beams.push(beam);
        self.paddle.beam_attached = true;
        self.push_event(GameEvent::BeamSpawned { beam: id });
        true
    }

    pub fn tick_beams(&mut self, dt: f32) {
        assert!(self.beams.len() <= 1, "more than one paddle laser beam");
        let Some(mut beam) = self.beams.pop() else {
            return;
        };
        beam.trace(self.beam_origin(), &self.level);
        let (hits, done) = beam.tick(dt, self.tuning.beam_damage_per_second);
        let target = beam.target;
        if done {
            self.teardown_beam(beam);
        } else {
            self.beams.push(beam);
        }
        if let Some(id) = target {
            for _ in 0..hits {
                self.damage_piece(id);
            }
        }
    }

    /// Detach a removed beam from the paddle and announce it
    fn teardown_beam(&mut self, beam: Beam) {
        self.paddle.beam_attached = false;
        self.push_event(GameEvent::BeamRemoved { beam: beam.id });
    }

    pub fn clear_beams(&mut self) {
        for beam in std::mem::take(&mut self.beams) {
            self.teardown_beam(beam);
        }
    }

    // ------------------------------------------------------------------
    // Boost
    // ------------------------------------------------------------------

    pub fn boost(&self) -> &BallBoostModel {
        &self.boost
    }

    pub fn boost_pressed(&mut self, direction: Vec2) {
        let was = self.boost.is_in_bullet_time();
        if self.boost.boost_direction_pressed(direction) && !was {
            self.push_event(GameEvent::BulletTimeStarted);
        }
    }

    pub fn boost_released(&mut self) {
        if let Some(direction) = self.boost.boost_direction_released() {
            self.apply_boost(direction);
        }
    }

    pub fn cancel_boost(&mut self) {
        self.boost.cancel();
    }

    /// Charge or auto-release the boost using real time
    pub fn tick_boost(&mut self) {
        if let Some(direction) = self.boost.tick(self.real_dt) {
            self.apply_boost(direction);
        }
    }

    /// Fire every free ball along `direction`
    fn apply_boost(&mut self, direction: Vec2) {
        let attached = self.paddle.attached_ball();
        let (amount, decel) = (self.tuning.boost_impulse, self.tuning.boost_impulse_decel);
        for ball in self.balls.iter_mut().filter(|b| Some(b.id) != attached) {
            ball.set_direction(direction);
            ball.apply_impulse(amount, decel);
        }
        self.push_event(GameEvent::BallBoosted { direction });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::item::ItemId;

    const LAYOUT: &str = "
        SSSSSS
        S1111S
        S2X11S
        S....S
        S....S
        S....S
    ";

    fn model() -> GameModel {
        let level = GameLevel::from_layout("test", LAYOUT).unwrap();
        GameModel::new(Tuning::default(), vec![GameWorld::new("w", vec![level])], 42)
    }

    fn item(model: &mut GameModel, kind: ItemKind) -> GameItem {
        let id = ItemId(model.next_entity_id());
        GameItem::new(id, kind, Vec2::ZERO, 1.0)
    }

    #[test]
    fn test_new_model_enters_level_start() {
        let m = model();
        assert_eq!(m.state_kind(), Some(GameStateKind::LevelStart));
        assert_eq!(m.lives_left(), Tuning::default().initial_lives);
    }

    #[test]
    fn test_multiplier_follows_interim_blocks() {
        let mut m = model();
        let [x2, x3, x4] = m.tuning().multiplier_thresholds;
        for (count, expected) in [(0, 1), (x2 - 1, 1), (x2, 2), (x3, 3), (x4, 4)] {
            m.set_num_interim_blocks_destroyed(count);
            assert_eq!(m.score_multiplier(), expected, "count {count}");
        }
        m.ball_paddle_collision_occurred(BallId(99));
        assert_eq!(m.num_interim_blocks_destroyed(), 0);
        assert_eq!(m.score_multiplier(), 1);
    }

    #[test]
    fn test_same_category_timer_replaces_old() {
        let mut m = model();
        m.spawn_ball_on_paddle();
        let slow = item(&mut m, ItemKind::BallSlow);
        m.activate_item(slow);
        let first = m.active_timer(TimerCategory::BallSpeed).unwrap().id;
        let slow_again = item(&mut m, ItemKind::BallSlow);
        m.activate_item(slow_again);
        let speed_timers = m
            .timers()
            .iter()
            .filter(|t| t.category() == Some(TimerCategory::BallSpeed))
            .count();
        assert_eq!(speed_timers, 1);
        assert_ne!(m.active_timer(TimerCategory::BallSpeed).unwrap().id, first);

        let fast = item(&mut m, ItemKind::BallFast);
        m.activate_item(fast);
        assert_eq!(m.timers().len(), 1);
        assert_eq!(m.balls()[0].speed(), m.tuning().fast_speed);
    }

    #[test]
    fn test_speed_items_step_one_tier_and_back() {
        let mut m = model();
        m.spawn_ball_on_paddle();
        let t = m.tuning().clone();

        let slow = item(&mut m, ItemKind::BallSlow);
        m.activate_item(slow);
        assert_eq!(m.balls()[0].speed(), t.slow_speed);
        assert!(m.balls()[0].has_type(BallTypes::SLOW));

        m.tick_timers(t.item_timer_length);
        assert!(m.timers().is_empty());
        assert_eq!(m.balls()[0].speed(), t.normal_speed);
        assert!(!m.balls()[0].has_type(BallTypes::SLOW));

        let fast = item(&mut m, ItemKind::BallFast);
        m.activate_item(fast);
        assert_eq!(m.balls()[0].speed(), t.fast_speed);
        assert!(m.balls()[0].has_type(BallTypes::FAST));
        m.clear_active_timers();
        assert_eq!(m.balls()[0].speed(), t.normal_speed);
        assert!(m.balls()[0].types.is_empty());
    }

    #[test]
    fn test_ball_item_with_no_balls_starts_no_timer() {
        let mut m = model();
        assert!(m.balls().is_empty());
        m.drain_events();
        let ghost = item(&mut m, ItemKind::GhostBall);
        m.activate_item(ghost);
        assert!(m.timers().is_empty());
        let events = m.drain_events();
        assert!(events.contains(&GameEvent::ItemActivated { kind: ItemKind::GhostBall }));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::ItemTimerStarted { .. })));

        // a later ball is untouched
        m.spawn_ball_on_paddle();
        assert!(!m.balls()[0].has_type(BallTypes::GHOST));
    }

    #[test]
    fn test_scoped_timer_ends_with_its_last_ball() {
        let mut m = model();
        let a = m.spawn_ball_on_paddle();
        let b = m.spawn_ball_on_paddle();
        let uber = item(&mut m, ItemKind::UberBall);
        m.activate_item(uber);
        m.drain_events();

        m.remove_ball(a);
        let timer = m.active_timer(TimerCategory::BallUber).unwrap();
        assert_eq!(timer.associated_balls().iter().copied().collect::<Vec<_>>(), vec![b]);

        m.remove_ball(b);
        assert!(m.active_timer(TimerCategory::BallUber).is_none());
        let events = m.drain_events();
        assert!(events.contains(&GameEvent::ItemDeactivated { kind: ItemKind::UberBall }));
    }

    #[test]
    fn test_paddle_timer_survives_ball_death() {
        let mut m = model();
        let a = m.spawn_ball_on_paddle();
        let sticky = item(&mut m, ItemKind::StickyPaddle);
        m.activate_item(sticky);
        m.remove_ball(a);
        assert!(m.active_timer(TimerCategory::PaddleSticky).is_some());
    }

    #[test]
    fn test_multiball_copies_timer_associations() {
        let mut m = model();
        m.spawn_ball_on_paddle();
        m.balls_mut()[0].set_direction(Vec2::Y);
        let ghost = item(&mut m, ItemKind::GhostBall);
        m.activate_item(ghost);
        let split = item(&mut m, ItemKind::MultiBall3);
        m.activate_item(split);
        assert_eq!(m.balls().len(), 3);
        let timer = m.active_timer(TimerCategory::BallGhost).unwrap();
        assert_eq!(timer.associated_balls().len(), 3);
        assert!(m.balls().iter().all(|b| !b.can_collide_with_other_balls()));
        assert!(m.balls().iter().all(|b| b.has_type(BallTypes::GHOST)));
    }

    #[test]
    fn test_status_map_drops_normal_pieces() {
        let mut m = model();
        let id = m.level().piece_at(4, 1).unwrap().id;
        assert!(m.add_status_update_level_piece(id, PieceStatus::FROZEN));
        assert!(!m.add_status_update_level_piece(id, PieceStatus::FROZEN));
        assert_eq!(m.num_pieces_with_status(), 1);
        m.remove_status_for_level_piece(id, PieceStatus::FROZEN);
        assert_eq!(m.num_pieces_with_status(), 0);
        assert_eq!(m.piece_status(id), PieceStatus::empty());
    }

    #[test]
    fn test_fire_burns_piece_down() {
        let mut m = model();
        let id = m.level().piece_at(4, 1).unwrap().id;
        m.add_status_update_level_piece(id, PieceStatus::ON_FIRE);
        let remaining = m.level().pieces_remaining();
        m.tick_piece_status(m.tuning().fire_burn_time);
        assert_eq!(m.level().piece(id).kind, PieceKind::Empty);
        assert_eq!(m.level().pieces_remaining(), remaining - 1);
        assert_eq!(m.num_pieces_with_status(), 0);
    }

    #[test]
    fn test_bomb_takes_out_neighbours() {
        let mut m = model();
        let bomb = m.level().piece_at(3, 2).unwrap().id;
        let before = m.level().pieces_remaining();
        m.destroy_piece(bomb);
        // bomb plus its breakable neighbours; walls survive
        assert_eq!(m.level().pieces_remaining(), before - 6);
        assert_eq!(m.level().piece_at(5, 2).unwrap().kind, PieceKind::Solid);
    }

    #[test]
    fn test_destroy_scores_with_multiplier() {
        let mut m = model();
        let per = m.tuning().points_per_block;
        let x2 = m.tuning().multiplier_thresholds[0];
        m.set_num_interim_blocks_destroyed(x2);
        let id = m.level().piece_at(4, 1).unwrap().id;
        m.destroy_piece(id);
        assert_eq!(m.score(), per * 2);
        assert_eq!(m.num_interim_blocks_destroyed(), x2 + 1);
    }

    #[test]
    fn test_lives_clamp() {
        let mut m = model();
        m.set_lives_left(100);
        assert_eq!(m.lives_left(), m.tuning().max_lives);
        m.drain_events();
        let one_up = item(&mut m, ItemKind::OneUp);
        m.activate_item(one_up);
        assert_eq!(m.lives_left(), m.tuning().max_lives);
        assert!(!m.drain_events().iter().any(|e| matches!(e, GameEvent::LivesChanged { .. })));
    }

    #[test]
    fn test_single_laser_beam() {
        let mut m = model();
        let beam = item(&mut m, ItemKind::LaserBeamPaddle);
        m.activate_item(beam);
        assert!(m.fire_laser_beam());
        assert!(!m.fire_laser_beam());
        assert_eq!(m.beams().len(), 1);
        assert!(m.paddle().beam_attached);
        m.clear_beams();
        assert!(!m.paddle().beam_attached);
    }

    #[test]
    fn test_laser_bullets_hit_pieces() {
        let mut m = model();
        let x = m.level().piece_at(3, 1).unwrap().center().x;
        m.add_projectile(ProjectileKind::LaserBullet, Vec2::new(x, 3.2), Vec2::new(0.0, 25.0));
        let before = m.level().pieces_remaining();
        m.do_projectile_collisions(SIM_DT);
        assert_eq!(m.num_projectiles(), 0);
        // the 2-hit piece took one hit
        assert_eq!(m.level().pieces_remaining(), before);
        assert_eq!(m.level().piece_at(3, 1).unwrap().kind, PieceKind::Breakable { hp: 1 });
    }

    #[test]
    fn test_removed_rocket_drops_remote_link() {
        let mut m = model();
        m.paddle_mut().add_type(PaddleTypes::ROCKET);
        assert!(m.fire_paddle_rocket());
        assert!(!m.paddle().has_type(PaddleTypes::ROCKET));
        let rocket = m.remote_rocket().unwrap();

        m.steer_remote_rocket(1.0, 1.0);
        let vx = m.projectiles(ProjectileKind::PaddleRocket)[0].velocity.x;
        assert!((vx - m.tuning().rocket_speed * 0.5).abs() < 1e-4);

        m.drain_events();
        for _ in 0..1000 {
            if m.num_projectiles() == 0 {
                break;
            }
            m.do_projectile_collisions(SIM_DT);
            m.tick_projectiles(SIM_DT);
        }
        assert_eq!(m.num_projectiles(), 0);
        assert_eq!(m.remote_rocket(), None);
        let removed = GameEvent::ProjectileRemoved { projectile: rocket, kind: ProjectileKind::PaddleRocket };
        assert_eq!(m.drain_events().iter().filter(|e| **e == removed).count(), 1);
        // nothing left to steer
        m.steer_remote_rocket(-1.0, 1.0);
    }

    #[test]
    fn test_clearing_projectiles_tears_down_rocket() {
        let mut m = model();
        m.paddle_mut().add_type(PaddleTypes::ROCKET);
        m.fire_paddle_rocket();
        m.fire_laser_bullets();
        assert_eq!(m.num_projectiles(), 3);
        m.drain_events();

        m.clear_projectiles();
        assert_eq!(m.remote_rocket(), None);
        let removed = m
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::ProjectileRemoved { .. }))
            .count();
        assert_eq!(removed, 3);
    }

    #[test]
    fn test_item_collected_by_paddle() {
        let mut m = model();
        let at = m.paddle().center;
        m.spawn_item(ItemKind::StickyPaddle, at);
        m.do_item_collisions();
        assert!(m.items().is_empty());
        assert!(m.paddle().has_type(PaddleTypes::STICKY));
    }

    #[test]
    fn test_safety_net_destroyed_by_paddle() {
        let mut m = model();
        assert!(m.create_safety_net(false));
        assert!(!m.create_safety_net(false));
        m.do_paddle_safety_net_collision();
        assert!(m.safety_net(false).is_some());
        m.paddle_mut().center.y = 0.3;
        m.do_paddle_safety_net_collision();
        assert!(m.safety_net(false).is_none());
    }
}
