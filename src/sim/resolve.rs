//! Collision response for balls
//!
//! These routines take a ball that the narrow phase says will touch something
//! `time_until_collision` seconds into a `dt` step, and leave it with its
//! post-bounce direction at the position it would reach by the end of the step.
//! Scalar speed is never changed here; a moving collidable hands back an
//! impulse for the caller to apply later.

use glam::Vec2;

use super::ball::{Ball, BallTypes};
use crate::consts::*;
use crate::{angle_between_degs, reflect, rotate_degs};

/// Limits on how a ball may leave a surface, measured from the surface normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BounceLimits {
    pub min_angle_degs: f32,
    pub max_angle_degs: f32,
}

impl Default for BounceLimits {
    fn default() -> Self {
        Self {
            min_angle_degs: MIN_BALL_ANGLE_IN_DEGS,
            max_angle_degs: MAX_GRACING_ANGLE_ON_HIT_IN_DEGS,
        }
    }
}

/// Which side of `n` the vector `v` lies on (+1 counter-clockwise, -1 clockwise)
#[inline]
fn side_of(n: Vec2, v: Vec2) -> f32 {
    if n.perp_dot(v) < 0.0 { -1.0 } else { 1.0 }
}

/// Clamp the angle between `dir` and `n` into `[min, max]`, staying on the same side of `n`
fn clamp_angle_to_normal(dir: Vec2, n: Vec2, limits: BounceLimits) -> Vec2 {
    let angle = angle_between_degs(n, dir);
    let side = side_of(n, dir);
    if angle < limits.min_angle_degs {
        rotate_degs(n, side * limits.min_angle_degs)
    } else if angle > limits.max_angle_degs {
        rotate_degs(n, side * limits.max_angle_degs)
    } else {
        dir
    }
}

/// Keep `dir` at least `min_degs` away from the horizontal axis
fn clamp_off_horizontal(dir: Vec2, n: Vec2, min_degs: f32) -> Vec2 {
    let off_horizontal = dir.y.abs().clamp(0.0, 1.0).asin().to_degrees();
    if off_horizontal >= min_degs {
        return dir;
    }
    let x_sign = if dir.x < 0.0 { -1.0 } else { 1.0 };
    let y_sign = if dir.y < 0.0 || (dir.y == 0.0 && n.y < 0.0) { -1.0 } else { 1.0 };
    let rad = min_degs.to_radians();
    Vec2::new(x_sign * rad.cos(), y_sign * rad.sin())
}

/// Reflection of the ball's direction off `n`, or the current direction if it already points away
fn raw_reflection(ball: &Ball, n: Vec2) -> Vec2 {
    let dir = ball.direction();
    if dir.dot(n) >= 0.0 {
        dir
    } else {
        reflect(dir, n).normalize_or(n)
    }
}

/// Gravity balls leave a surface leaning toward its normal
fn gravity_blend(ball: &Ball, refl: Vec2, n: Vec2) -> Vec2 {
    if ball.has_type(BallTypes::GRAVITY) {
        (0.5 * refl + 0.5 * n).normalize_or(n)
    } else {
        refl
    }
}

/// Shared tail of the geometry and paddle variants: line-velocity coupling
/// then re-advance for whatever is left of the step.
///
/// `settle` is applied to the coupled direction so a variant's exit limit
/// still holds after a moving collidable has pushed the ball around.
fn finish_bounce(
    ball: &mut Ball,
    dir: Vec2,
    remaining: f32,
    line_velocity: Vec2,
    settle: impl Fn(Vec2) -> Vec2,
) -> f32 {
    let speed = ball.speed();
    let mut dir = dir;
    let mut extra = Vec2::ZERO;
    let mut impulse = 0.0;

    if line_velocity.length_squared() > EPSILON * EPSILON {
        let coupled = settle((dir * speed + line_velocity).normalize_or(dir));
        if coupled.dot(line_velocity) > 0.0 {
            extra = line_velocity;
            impulse = (line_velocity.length() - LINE_VELOCITY_IMPULSE_FRACTION * speed).max(0.0);
        }
        dir = coupled;
    }

    ball.set_direction(dir);
    ball.center += (ball.velocity() + extra) * remaining;
    ball.ball_collided();
    impulse
}

/// Bounce a ball off static or moving level geometry.
///
/// `n` is the unit surface normal pointing toward the ball. Returns the impulse
/// a moving collidable (nonzero `line_velocity`) imparts, zero otherwise.
pub fn do_ball_collision(
    ball: &mut Ball,
    n: Vec2,
    dt: f32,
    time_until_collision: f32,
    limits: BounceLimits,
    line_velocity: Vec2,
) -> f32 {
    assert!(ball.speed() != ZERO_SPEED, "in-play ball with zero speed");
    let toi = time_until_collision.clamp(0.0, dt);
    ball.center += ball.velocity() * toi;

    let refl = gravity_blend(ball, raw_reflection(ball, n), n);
    let refl = clamp_angle_to_normal(refl, n, limits);

    finish_bounce(ball, refl, dt - toi, line_velocity, |d| d)
}

/// Bounce a ball off the paddle.
///
/// Same as [`do_ball_collision`] except that, in place of the limits around
/// the normal, the result is only kept away from the horizontal, whichever
/// side of the paddle was struck. The paddle's sideways motion can't flatten
/// the exit either.
pub fn do_ball_paddle_collision(
    ball: &mut Ball,
    n: Vec2,
    dt: f32,
    time_until_collision: f32,
    min_angle_degs: f32,
    paddle_velocity: Vec2,
) -> f32 {
    assert!(ball.speed() != ZERO_SPEED, "in-play ball with zero speed");
    let toi = time_until_collision.clamp(0.0, dt);
    ball.center += ball.velocity() * toi;

    let refl = gravity_blend(ball, raw_reflection(ball, n), n);
    let refl = clamp_off_horizontal(refl, n, min_angle_degs);

    finish_bounce(ball, refl, dt - toi, paddle_velocity, |d| {
        clamp_off_horizontal(d, n, min_angle_degs)
    })
}

/// Resolve two balls touching `time_until_collision` into the step.
///
/// Velocity components along the line of centres are swapped, then each ball
/// is renormalised to its own speed.
pub fn do_ball_ball_collision(a: &mut Ball, b: &mut Ball, dt: f32, time_until_collision: f32) {
    assert!(a.speed() != ZERO_SPEED && b.speed() != ZERO_SPEED, "in-play ball with zero speed");
    let toi = time_until_collision.clamp(0.0, dt);
    let va = a.velocity();
    let vb = b.velocity();
    a.center += va * toi;
    b.center += vb * toi;

    let n = (a.center - b.center).normalize_or(Vec2::X);
    let va_n = va.dot(n);
    let vb_n = vb.dot(n);
    let new_a = va - va_n * n + vb_n * n;
    let new_b = vb - vb_n * n + va_n * n;

    // Degenerate exchange (e.g. no relative motion): mirror off the contact line
    let dir_a = new_a.normalize_or(reflect(a.direction(), n));
    let dir_b = new_b.normalize_or(reflect(b.direction(), -n));
    a.set_direction(dir_a);
    b.set_direction(dir_b);

    let remaining = dt - toi;
    a.center += a.velocity() * remaining;
    b.center += b.velocity() * remaining;
    a.ball_collided();
    b.ball_collided();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ball::BallId;
    use proptest::prelude::*;

    fn ball_heading(dir: Vec2, speed: f32) -> Ball {
        let mut ball = Ball::new(BallId(1), Vec2::ZERO, speed);
        ball.set_direction(dir);
        ball
    }

    #[test]
    fn test_straight_down_bounce_gets_min_angle() {
        let mut ball = ball_heading(Vec2::NEG_Y, 10.0);
        do_ball_collision(&mut ball, Vec2::Y, 0.0, 0.0, BounceLimits::default(), Vec2::ZERO);
        let angle = angle_between_degs(Vec2::Y, ball.direction());
        assert!((angle - MIN_BALL_ANGLE_IN_DEGS).abs() < 1e-2);
        assert!(ball.direction().y > 0.0);
    }

    #[test]
    fn test_normal_45_degree_bounce_unchanged() {
        let mut ball = ball_heading(Vec2::new(1.0, -1.0), 10.0);
        do_ball_collision(&mut ball, Vec2::Y, 0.0, 0.0, BounceLimits::default(), Vec2::ZERO);
        let d = ball.direction();
        assert!((d - Vec2::new(1.0, 1.0).normalize()).length() < 1e-4);
    }

    #[test]
    fn test_grazing_bounce_pulled_toward_normal() {
        let mut ball = ball_heading(Vec2::new(1.0, -0.05), 10.0);
        do_ball_collision(&mut ball, Vec2::Y, 0.0, 0.0, BounceLimits::default(), Vec2::ZERO);
        let angle = angle_between_degs(Vec2::Y, ball.direction());
        assert!((angle - MAX_GRACING_ANGLE_ON_HIT_IN_DEGS).abs() < 1e-2);
        assert!(ball.direction().x > 0.0);
    }

    #[test]
    fn test_already_leaving_is_not_reflected_into_surface() {
        let mut ball = ball_heading(Vec2::new(1.0, 1.0), 10.0);
        do_ball_collision(&mut ball, Vec2::Y, 0.0, 0.0, BounceLimits::default(), Vec2::ZERO);
        assert!(ball.direction().y > 0.0);
        assert!((ball.direction() - Vec2::new(1.0, 1.0).normalize()).length() < 1e-4);
    }

    #[test]
    fn test_positions_at_impact_then_rest_of_step() {
        let mut ball = ball_heading(Vec2::new(1.0, -1.0), 2.0_f32.sqrt());
        // velocity (1, -1): hit at 0.25 of a 1.0 step, then travel (1, 1) for 0.75
        do_ball_collision(&mut ball, Vec2::Y, 1.0, 0.25, BounceLimits::default(), Vec2::ZERO);
        assert!((ball.center - Vec2::new(1.0, 0.5)).length() < 1e-4);
        assert_eq!(ball.time_since_last_collision, 0.0);
    }

    #[test]
    fn test_gravity_ball_leans_toward_normal() {
        let mut plain = ball_heading(Vec2::new(1.0, -1.0), 10.0);
        let mut heavy = plain.clone();
        heavy.add_type(BallTypes::GRAVITY);
        do_ball_collision(&mut plain, Vec2::Y, 0.0, 0.0, BounceLimits::default(), Vec2::ZERO);
        do_ball_collision(&mut heavy, Vec2::Y, 0.0, 0.0, BounceLimits::default(), Vec2::ZERO);
        assert!(
            angle_between_degs(Vec2::Y, heavy.direction()) < angle_between_degs(Vec2::Y, plain.direction())
        );
    }

    #[test]
    fn test_fast_moving_surface_returns_impulse() {
        let mut ball = ball_heading(Vec2::new(0.5, -1.0), 10.0);
        let impulse = do_ball_collision(
            &mut ball,
            Vec2::Y,
            0.0,
            0.0,
            BounceLimits::default(),
            Vec2::new(20.0, 0.0),
        );
        assert!((impulse - (20.0 - LINE_VELOCITY_IMPULSE_FRACTION * 10.0)).abs() < 1e-4);
        assert_eq!(ball.speed(), 10.0);
    }

    #[test]
    fn test_slow_moving_surface_no_impulse() {
        let mut ball = ball_heading(Vec2::new(0.5, -1.0), 10.0);
        let impulse = do_ball_collision(
            &mut ball,
            Vec2::Y,
            0.0,
            0.0,
            BounceLimits::default(),
            Vec2::new(2.0, 0.0),
        );
        assert_eq!(impulse, 0.0);
    }

    #[test]
    #[should_panic]
    fn test_zero_speed_panics() {
        let mut ball = ball_heading(Vec2::NEG_Y, ZERO_SPEED);
        do_ball_collision(&mut ball, Vec2::Y, 0.0, 0.0, BounceLimits::default(), Vec2::ZERO);
    }

    #[test]
    fn test_paddle_never_leaves_horizontal() {
        // Glancing hit on the paddle's right side while the paddle moves right
        let mut ball = ball_heading(Vec2::new(-1.0, -0.1), 10.0);
        do_ball_paddle_collision(&mut ball, Vec2::X, 0.0, 0.0, 20.0, Vec2::new(15.0, 0.0));
        let d = ball.direction();
        let off = d.y.abs().asin().to_degrees();
        assert!(off >= 20.0 - 1e-3);
        assert!(d.x > 0.0);
    }

    #[test]
    fn test_gravity_ball_leans_toward_paddle_normal() {
        let mut ball = ball_heading(Vec2::new(1.0, -1.0), 10.0);
        ball.add_type(BallTypes::GRAVITY);
        let mut wall = ball.clone();
        do_ball_paddle_collision(&mut ball, Vec2::Y, 0.0, 0.0, 20.0, Vec2::ZERO);
        do_ball_collision(&mut wall, Vec2::Y, 0.0, 0.0, BounceLimits::default(), Vec2::ZERO);
        // halfway between the mirror (1, 1) and the normal
        let expected = rotate_degs(Vec2::Y, -22.5);
        assert!((ball.direction() - expected).length() < 1e-4, "{}", ball.direction());
        assert!((ball.direction() - wall.direction()).length() < 1e-4);
    }

    #[test]
    fn test_moving_paddle_carries_ball() {
        let dt = 0.1;
        let mut still = ball_heading(Vec2::NEG_Y, 10.0);
        let mut moving = still.clone();
        do_ball_paddle_collision(&mut still, Vec2::Y, dt, 0.0, 20.0, Vec2::ZERO);
        let impulse = do_ball_paddle_collision(&mut moving, Vec2::Y, dt, 0.0, 20.0, Vec2::new(20.0, 0.0));

        assert_eq!(still.center.x, 0.0);
        // own motion plus the paddle's for the rest of the step
        let expected = (moving.direction() * 10.0 + Vec2::new(20.0, 0.0)) * dt;
        assert!((moving.center - expected).length() < 1e-4, "{}", moving.center);
        assert!(moving.center.x > 2.0);
        assert!((impulse - (20.0 - LINE_VELOCITY_IMPULSE_FRACTION * 10.0)).abs() < 1e-4);
        assert_eq!(moving.speed(), 10.0);
    }

    #[test]
    fn test_ball_ball_head_on_swaps_directions() {
        let mut a = ball_heading(Vec2::X, 5.0);
        let mut b = ball_heading(Vec2::NEG_X, 10.0);
        a.center = Vec2::new(-1.0, 0.0);
        b.center = Vec2::new(1.0, 0.0);
        do_ball_ball_collision(&mut a, &mut b, 0.0, 0.0);
        assert!((a.direction() - Vec2::NEG_X).length() < 1e-5);
        assert!((b.direction() - Vec2::X).length() < 1e-5);
        // each ball keeps its own speed
        assert_eq!(a.speed(), 5.0);
        assert_eq!(b.speed(), 10.0);
    }

    #[test]
    fn test_ball_ball_glancing_keeps_tangent() {
        let mut a = ball_heading(Vec2::new(1.0, 1.0), 10.0);
        let mut b = ball_heading(Vec2::new(-1.0, 1.0), 10.0);
        a.center = Vec2::new(-0.5, 0.0);
        b.center = Vec2::new(0.5, 0.0);
        do_ball_ball_collision(&mut a, &mut b, 0.0, 0.0);
        assert!(a.direction().x < 0.0 && a.direction().y > 0.0);
        assert!(b.direction().x > 0.0 && b.direction().y > 0.0);
    }

    proptest! {
        #[test]
        fn prop_geometry_bounce_respects_floor_and_ceiling(
            dir_degs in 0.0f32..360.0,
            normal_degs in 0.0f32..360.0,
            gravity in any::<bool>(),
        ) {
            let n = rotate_degs(Vec2::X, normal_degs);
            let mut ball = ball_heading(rotate_degs(Vec2::X, dir_degs), 17.0);
            if gravity {
                ball.add_type(BallTypes::GRAVITY);
            }
            let limits = BounceLimits::default();
            do_ball_collision(&mut ball, n, 0.0, 0.0, limits, Vec2::ZERO);
            let angle = angle_between_degs(n, ball.direction());
            prop_assert!(angle >= limits.min_angle_degs - 1e-2, "angle {angle}");
            prop_assert!(angle <= limits.max_angle_degs + 1e-2, "angle {angle}");
        }

        #[test]
        fn prop_bounce_preserves_speed(
            dir_degs in 0.0f32..360.0,
            normal_degs in 0.0f32..360.0,
            speed in 1.0f32..30.0,
            dt in 0.0f32..0.05,
        ) {
            let n = rotate_degs(Vec2::X, normal_degs);
            let mut ball = ball_heading(rotate_degs(Vec2::X, dir_degs), speed);
            do_ball_collision(&mut ball, n, dt, dt * 0.5, BounceLimits::default(), Vec2::ZERO);
            prop_assert_eq!(ball.speed(), speed);
            prop_assert!((ball.direction().length() - 1.0).abs() < 1e-4);
            prop_assert!((ball.velocity().length() - speed).abs() < 1e-3);
        }

        #[test]
        fn prop_paddle_bounce_respects_floor(
            dir_degs in 180.0f32..360.0,
            paddle_vx in -40.0f32..40.0,
        ) {
            let mut ball = ball_heading(rotate_degs(Vec2::X, dir_degs), 17.0);
            do_ball_paddle_collision(&mut ball, Vec2::Y, 0.0, 0.0, 20.0, Vec2::new(paddle_vx, 0.0));
            let d = ball.direction();
            let off_horizontal = d.y.abs().min(1.0).asin().to_degrees();
            prop_assert!(off_horizontal >= 20.0 - 1e-2);
            prop_assert_eq!(ball.speed(), 17.0);
        }
    }
}
