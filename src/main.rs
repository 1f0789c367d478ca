//! Blammo headless demo
//!
//! Plays a short demo world with an autopilot paddle and logs what happened.
//!
//! Usage: `blammo [tuning.json] [seed]`

#[cfg(not(target_arch = "wasm32"))]
use blammo::{
    Tuning,
    consts::*,
    sim::{GameEvent, GameLevel, GameModel, GameStateKind, GameWorld, ItemDisposition, PaddleTypes},
};

/// How long the demo runs, in simulated seconds
#[cfg(not(target_arch = "wasm32"))]
const DEMO_SECONDS: f32 = 300.0;
/// Rendering frame length the demo pretends to run at
#[cfg(not(target_arch = "wasm32"))]
const FRAME_DT: f32 = 1.0 / 60.0;
#[cfg(not(target_arch = "wasm32"))]
const DEFAULT_SEED: u64 = 0xB1A3_3000;

#[cfg(not(target_arch = "wasm32"))]
const DEMO_LEVELS: [&str; 2] = [
    "
    SSSSSSSSSS
    S22222222S
    S1I1X11I1S
    S11111111S
    S........S
    S........S
    S........S
    S........S
    S........S
    S........S
    S........S
    S........S
    S........S
    S........S
    ",
    "
    SSSSSSSSSS
    S3T1111T3S
    S1K1XX1K1S
    Sa.1II1.aS
    S..S..S..S
    S........S
    S........S
    S........S
    S........S
    S........S
    S........S
    S........S
    S........S
    S........S
    ",
];

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
struct DemoStats {
    pieces_destroyed: u32,
    balls_lost: u32,
    items_caught: u32,
    levels_completed: u32,
}

#[cfg(not(target_arch = "wasm32"))]
impl DemoStats {
    fn record(&mut self, event: &GameEvent) {
        match event {
            GameEvent::PieceDestroyed { .. } => self.pieces_destroyed += 1,
            GameEvent::BallDied { .. } => self.balls_lost += 1,
            GameEvent::ItemPaddleCollision { .. } => self.items_caught += 1,
            GameEvent::LevelCompleted { world, level } => {
                self.levels_completed += 1;
                log::info!("Cleared level {level} of world {world}");
            }
            GameEvent::StateChanged { from, to } => log::debug!("State {from:?} -> {to:?}"),
            GameEvent::LivesChanged { from, to } => log::info!("Lives {from} -> {to}"),
            _ => {}
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn demo_world() -> Option<GameWorld> {
    let mut levels = Vec::with_capacity(DEMO_LEVELS.len());
    for (i, layout) in DEMO_LEVELS.iter().enumerate() {
        match GameLevel::from_layout(&format!("demo {}", i + 1), layout) {
            Ok(level) => levels.push(level),
            Err(err) => {
                log::error!("Demo level {} is broken: {err}", i + 1);
                return None;
            }
        }
    }
    Some(GameWorld::new("demo", levels))
}

/// Idle-mode paddle: serve immediately, track the most dangerous ball,
/// and go for good items while nothing is coming down.
#[cfg(not(target_arch = "wasm32"))]
fn autopilot(model: &mut GameModel) {
    match model.state_kind() {
        Some(GameStateKind::BallOnPaddle) => {
            model.shoot_action_release_use();
        }
        Some(GameStateKind::BallDeath) => {
            model.skip_action();
            return;
        }
        Some(GameStateKind::BallInPlay) => {}
        _ => return,
    }

    let paddle = model.paddle();
    let paddle_x = paddle.center.x;

    // Lowest ball heading down is the one to save
    let threat = model
        .balls()
        .iter()
        .filter(|b| b.velocity().y < 0.0)
        .min_by(|a, b| a.center.y.total_cmp(&b.center.y))
        .map(|b| b.center.x);

    let safe = model
        .balls()
        .iter()
        .all(|b| b.velocity().y > 0.0 || b.center.y > model.level().unit_height() * 0.5);
    let pickup = if safe {
        model
            .items()
            .iter()
            .filter(|i| i.kind.disposition() != ItemDisposition::Bad)
            .min_by(|a, b| a.center.y.total_cmp(&b.center.y))
            .map(|i| i.center.x)
    } else {
        None
    };

    let target = pickup
        .or(threat)
        .or_else(|| model.balls().first().map(|b| b.center.x));

    let reversed = paddle.has_type(PaddleTypes::REVERSED);
    let sticky_hold = paddle.attached_ball().is_some();
    let shooter = paddle.has_type(PaddleTypes::LASER_BULLET);

    if let Some(target_x) = target {
        // Aim slightly off-centre so the ball doesn't loop straight up and down
        let offset = (model.time_ticks() as f32 * SIM_DT).sin() * paddle.half_width() * 0.4;
        let dx = target_x + offset - paddle_x;
        if dx.abs() > 0.1 {
            let direction = if reversed { -dx.signum() } else { dx.signum() };
            model.move_paddle(direction, (dx.abs() / 2.0).min(1.0));
        } else {
            model.move_paddle(0.0, 0.0);
        }
    }

    if sticky_hold {
        model.shoot_action_release_use();
    }
    if shooter {
        model.shoot_action_continuous_use(SIM_DT, 1.0);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Blammo headless demo starting...");

    let mut args = std::env::args().skip(1);
    let tuning = match args.next() {
        Some(path) => Tuning::load_or_default(path),
        None => Tuning::default(),
    };
    let seed = match args.next().map(|s| s.parse::<u64>()) {
        Some(Ok(seed)) => seed,
        Some(Err(err)) => {
            log::warn!("Ignoring bad seed: {err}");
            DEFAULT_SEED
        }
        None => DEFAULT_SEED,
    };

    let Some(world) = demo_world() else {
        std::process::exit(1);
    };
    let mut model = GameModel::new(tuning, vec![world], seed);
    log::info!("Game initialized with seed: {seed}");

    let mut stats = DemoStats::default();
    let mut accumulator = 0.0_f32;
    let frames = (DEMO_SECONDS / FRAME_DT) as u32;

    'frames: for _ in 0..frames {
        accumulator += FRAME_DT;
        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            autopilot(&mut model);
            model.tick(SIM_DT);
            accumulator -= SIM_DT;
            substeps += 1;
        }
        for event in model.drain_events() {
            stats.record(&event);
        }
        if matches!(model.state_kind(), Some(GameStateKind::GameOver | GameStateKind::GameComplete)) {
            break 'frames;
        }
    }

    log::info!(
        "Demo finished in {:?} after {:.1}s: score {}, lives {}, level {}/{}",
        model.state_kind(),
        model.time_ticks() as f32 * SIM_DT,
        model.score(),
        model.lives_left(),
        model.world_index(),
        model.level_index(),
    );
    log::info!(
        "{} pieces destroyed, {} balls lost, {} items caught, {} levels cleared",
        stats.pieces_destroyed,
        stats.balls_lost,
        stats.items_caught,
        stats.levels_completed,
    );
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Headless demo is native-only
}
