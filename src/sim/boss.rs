//! Bosses: rigid groups of body parts that move along a keyframed path
//!
//! Parts carry their own hit points. A part's line velocity (the boss's
//! frame-to-frame motion) feeds into ball bounces so a moving boss can kick
//! the ball.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::ball::Ball;
use super::collision::{Aabb, Contact, sweep_circle_aabb};
use crate::anim::AnimationMultiLerp;

/// One rectangular section of a boss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossBodyPart {
    /// Offset from the boss origin
    pub offset: Vec2,
    pub half_extents: Vec2,
    pub hit_points: f32,
    /// Armour parts bounce balls but can't be damaged
    pub invulnerable: bool,
}

impl BossBodyPart {
    pub fn new(offset: Vec2, half_extents: Vec2, hit_points: f32) -> Self {
        Self { offset, half_extents, hit_points, invulnerable: false }
    }

    pub fn armour(offset: Vec2, half_extents: Vec2) -> Self {
        Self { offset, half_extents, hit_points: 0.0, invulnerable: true }
    }

    pub fn is_destroyed(&self) -> bool {
        !self.invulnerable && self.hit_points <= 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boss {
    pub name: String,
    position: Vec2,
    velocity: Vec2,
    parts: Vec<BossBodyPart>,
    #[serde(skip)]
    path: AnimationMultiLerp<Vec2>,
}

impl Boss {
    /// A boss patrolling `waypoints` (looping) over `period` seconds
    pub fn new(name: &str, parts: Vec<BossBodyPart>, waypoints: &[Vec2], period: f32) -> Self {
        assert!(!parts.is_empty(), "boss {name} has no body parts");
        assert!(waypoints.len() >= 2, "boss path needs at least two waypoints");
        let last = (waypoints.len() - 1) as f32;
        let times: Vec<f32> = (0..waypoints.len()).map(|i| period * i as f32 / last).collect();
        let mut path = AnimationMultiLerp::new(waypoints[0]);
        path.set_lerp(&times, waypoints);
        path.set_repeat(true);
        Self {
            name: name.to_string(),
            position: waypoints[0],
            velocity: Vec2::ZERO,
            parts,
            path,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Velocity over the last AI tick; applies to every part
    pub fn line_velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn parts(&self) -> &[BossBodyPart] {
        &self.parts
    }

    pub fn part_bounds(&self, index: usize) -> Aabb {
        let part = &self.parts[index];
        Aabb::from_center(self.position + part.offset, part.half_extents)
    }

    /// Parts still taking part in collisions
    pub fn live_parts(&self) -> impl Iterator<Item = usize> + '_ {
        self.parts.iter().enumerate().filter(|(_, p)| !p.is_destroyed()).map(|(i, _)| i)
    }

    pub fn is_dead(&self) -> bool {
        self.parts.iter().all(|p| p.invulnerable || p.is_destroyed())
    }

    /// Move along the patrol path
    pub fn tick_ai(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let prev = self.position;
        self.path.tick(dt);
        self.position = self.path.value();
        self.velocity = (self.position - prev) / dt;
    }

    /// Earliest part a ball would hit this step
    pub fn collision_check(&self, ball: &Ball, dt: f32) -> Option<(usize, Contact)> {
        let relative = ball.velocity() - self.velocity;
        let mut best: Option<(usize, Contact)> = None;
        for index in self.live_parts() {
            let bounds = self.part_bounds(index);
            let Some(contact) = sweep_circle_aabb(ball.center, ball.radius, relative, dt, &bounds) else {
                continue;
            };
            if best.is_none_or(|(_, b)| contact.time_until_collision < b.time_until_collision) {
                best = Some((index, contact));
            }
        }
        best
    }

    /// First live part overlapping `area`
    pub fn overlapping_part(&self, area: &Aabb) -> Option<usize> {
        self.live_parts().find(|&i| self.part_bounds(i).overlaps(area))
    }

    /// Damage a part; returns true if that destroyed it
    pub fn damage_part(&mut self, index: usize, amount: f32) -> bool {
        let part = &mut self.parts[index];
        if part.invulnerable || part.is_destroyed() {
            return false;
        }
        part.hit_points -= amount;
        part.is_destroyed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ball::BallId;

    fn boss() -> Boss {
        Boss::new(
            "test",
            vec![
                BossBodyPart::new(Vec2::ZERO, Vec2::new(1.0, 1.0), 2.0),
                BossBodyPart::armour(Vec2::new(0.0, 2.0), Vec2::new(1.0, 1.0)),
            ],
            &[Vec2::new(0.0, 10.0), Vec2::new(10.0, 10.0), Vec2::new(0.0, 10.0)],
            4.0,
        )
    }

    #[test]
    fn test_ai_moves_along_path() {
        let mut b = boss();
        b.tick_ai(1.0);
        assert!((b.position() - Vec2::new(5.0, 10.0)).length() < 1e-4);
        assert!((b.line_velocity() - Vec2::new(5.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_ball_hits_lower_part_first() {
        let b = boss();
        let mut ball = Ball::new(BallId(1), Vec2::new(0.0, 5.0), 10.0);
        ball.set_direction(Vec2::Y);
        let (part, contact) = b.collision_check(&ball, 1.0).unwrap();
        assert_eq!(part, 0);
        assert!((contact.normal - Vec2::NEG_Y).length() < 1e-5);
    }

    #[test]
    fn test_damage_kills_boss() {
        let mut b = boss();
        assert!(!b.damage_part(0, 1.0));
        assert!(!b.is_dead());
        assert!(b.damage_part(0, 1.0));
        assert!(b.is_dead());
        assert!(!b.damage_part(1, 5.0));
        assert_eq!(b.live_parts().count(), 1);
    }
}
