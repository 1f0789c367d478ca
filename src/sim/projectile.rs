//! Paddle projectiles

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::Aabb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProjectileKind {
    /// Damages the first piece it hits
    LaserBullet,
    /// Destroys the piece it hits and everything around it
    PaddleRocket,
}

impl ProjectileKind {
    pub fn half_extents(&self) -> Vec2 {
        match self {
            ProjectileKind::LaserBullet => Vec2::new(0.1, 0.4),
            ProjectileKind::PaddleRocket => Vec2::new(0.4, 0.8),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectileId(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: ProjectileId,
    pub kind: ProjectileKind,
    pub center: Vec2,
    pub velocity: Vec2,
    /// Seconds in flight
    pub age: f32,
}

impl Projectile {
    pub fn new(id: ProjectileId, kind: ProjectileKind, center: Vec2, velocity: Vec2) -> Self {
        Self { id, kind, center, velocity, age: 0.0 }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.center, self.kind.half_extents())
    }

    /// Bounds swept over the next `dt`, for the broad phase
    pub fn swept_bounds(&self, dt: f32) -> Aabb {
        let end = Aabb::from_center(self.center + self.velocity * dt, self.kind.half_extents());
        self.bounds().union(&end)
    }

    pub fn tick(&mut self, dt: f32) {
        self.center += self.velocity * dt;
        self.age += dt;
    }

    /// Drop whatever the model still points at this projectile through.
    /// Runs on every removal path, before the projectile is gone.
    pub fn teardown(&self, remote_rocket: &mut Option<ProjectileId>) {
        if *remote_rocket == Some(self.id) {
            *remote_rocket = None;
        }
    }
}
