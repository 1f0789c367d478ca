//! Ball safety net
//!
//! A thin barrier across the bottom (or top) of the level. It bounces the
//! first ball that reaches it and is destroyed by that bounce, or by the
//! paddle touching it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::ball::Ball;
use super::collision::{Aabb, Contact, sweep_circle_aabb};

const NET_HALF_HEIGHT: f32 = 0.125;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyNet {
    pub top: bool,
    bounds: Aabb,
}

impl SafetyNet {
    /// Net spanning `width` at height `y`
    pub fn new(top: bool, width: f32, y: f32) -> Self {
        Self {
            top,
            bounds: Aabb::new(Vec2::new(0.0, y - NET_HALF_HEIGHT), Vec2::new(width, y + NET_HALF_HEIGHT)),
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Only the face toward the playfield counts; balls crossing from behind pass
    pub fn collision_check(&self, ball: &Ball, dt: f32) -> Option<Contact> {
        let contact = sweep_circle_aabb(ball.center, ball.radius, ball.velocity(), dt, &self.bounds)?;
        let facing = if self.top { Vec2::NEG_Y } else { Vec2::Y };
        (contact.normal.dot(facing) > 0.5).then_some(Contact { normal: facing, ..contact })
    }

    pub fn paddle_collision_check(&self, paddle_bounds: &Aabb) -> bool {
        self.bounds.overlaps(paddle_bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ball::BallId;

    #[test]
    fn test_bottom_net_catches_falling_ball() {
        let net = SafetyNet::new(false, 20.0, 0.25);
        let mut ball = Ball::new(BallId(1), Vec2::new(5.0, 1.5), 10.0);
        ball.set_direction(Vec2::NEG_Y);
        let contact = net.collision_check(&ball, 0.2).unwrap();
        assert_eq!(contact.normal, Vec2::Y);
    }

    #[test]
    fn test_net_ignores_ball_from_behind() {
        let net = SafetyNet::new(true, 20.0, 20.0);
        let mut ball = Ball::new(BallId(1), Vec2::new(5.0, 21.5), 10.0);
        ball.set_direction(Vec2::NEG_Y);
        assert!(net.collision_check(&ball, 0.2).is_none());
    }

    #[test]
    fn test_paddle_touch() {
        let net = SafetyNet::new(false, 20.0, 0.25);
        assert!(net.paddle_collision_check(&Aabb::from_center(Vec2::new(5.0, 0.5), Vec2::new(2.0, 0.3))));
        assert!(!net.paddle_collision_check(&Aabb::from_center(Vec2::new(5.0, 1.5), Vec2::new(2.0, 0.3))));
    }
}
