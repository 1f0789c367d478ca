//! Narrow-phase collision detection
//!
//! Swept tests between a moving circle (the ball) and the static or moving
//! shapes of the level: axis-aligned boxes (blocks, paddle, boss parts,
//! safety nets), line segments (Tesla lightning arcs) and other circles.
//! Each test reports the earliest time of impact within the tick so the
//! caller can pick the first surface the ball would touch.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::EPSILON;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y);
        Self { min, max }
    }

    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    pub fn expanded(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(amount),
            max: self.max + Vec2::splat(amount),
        }
    }

    /// Smallest box holding both
    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    #[inline]
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }

    /// Normal of the face nearest to a point that lies inside the box
    fn nearest_face_normal(&self, p: Vec2) -> Vec2 {
        let to_min = p - self.min;
        let to_max = self.max - p;
        let candidates = [
            (to_min.x, Vec2::NEG_X),
            (to_max.x, Vec2::X),
            (to_min.y, Vec2::NEG_Y),
            (to_max.y, Vec2::Y),
        ];
        candidates
            .iter()
            .fold((f32::MAX, Vec2::Y), |best, &(d, n)| if d < best.0 { (d, n) } else { best })
            .1
    }
}

/// A swept hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Unit surface normal at impact, pointing toward the ball center
    pub normal: Vec2,
    /// Seconds into the tick at which the ball first touches the surface
    pub time_until_collision: f32,
    /// Point on the surface that is touched
    pub point: Vec2,
}

/// Fraction of `disp` at which a circle of `radius` starting at `center` touches `point`
fn sweep_circle_point(center: Vec2, radius: f32, disp: Vec2, point: Vec2) -> Option<f32> {
    let a = disp.length_squared();
    if a < EPSILON * EPSILON {
        return None;
    }
    let m = center - point;
    let b = m.dot(disp);
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 {
        // Already touching: only a hit if closing in
        return (b < 0.0).then_some(0.0);
    }
    if b >= 0.0 {
        return None;
    }
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / a;
    (0.0..=1.0).contains(&t).then_some(t)
}

/// Sweep a circle moving at `velocity` for `dt` seconds against a box
pub fn sweep_circle_aabb(center: Vec2, radius: f32, velocity: Vec2, dt: f32, aabb: &Aabb) -> Option<Contact> {
    // Overlapping at the start of the tick
    let closest = aabb.closest_point(center);
    let offset = center - closest;
    let dist_sq = offset.length_squared();
    if dist_sq < radius * radius {
        let normal = if dist_sq > EPSILON * EPSILON {
            offset / dist_sq.sqrt()
        } else {
            aabb.nearest_face_normal(center)
        };
        if velocity.dot(normal) >= 0.0 {
            return None;
        }
        return Some(Contact {
            normal,
            time_until_collision: 0.0,
            point: closest,
        });
    }

    let disp = velocity * dt;
    if disp.length_squared() < EPSILON * EPSILON {
        return None;
    }

    // Ray from the center against the box grown by the radius
    let grown = aabb.expanded(radius);
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut entry_normal = Vec2::ZERO;
    for axis in 0..2 {
        let (c, d) = (center[axis], disp[axis]);
        let (lo, hi) = (grown.min[axis], grown.max[axis]);
        if d.abs() < EPSILON {
            if c < lo || c > hi {
                return None;
            }
            continue;
        }
        let (mut t1, mut t2) = ((lo - c) / d, (hi - c) / d);
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_enter {
            t_enter = t1;
            entry_normal = Vec2::ZERO;
            entry_normal[axis] = -d.signum();
        }
        t_exit = t_exit.min(t2);
    }
    if t_enter > t_exit || t_enter > 1.0 || t_exit < 0.0 {
        return None;
    }

    let t_enter = t_enter.max(0.0);
    let hit = center + disp * t_enter;
    let outside_x = hit.x < aabb.min.x || hit.x > aabb.max.x;
    let outside_y = hit.y < aabb.min.y || hit.y > aabb.max.y;

    if outside_x && outside_y {
        // Rounded corner of the grown box
        let corner = Vec2::new(
            if hit.x < aabb.min.x { aabb.min.x } else { aabb.max.x },
            if hit.y < aabb.min.y { aabb.min.y } else { aabb.max.y },
        );
        let t = sweep_circle_point(center, radius, disp, corner)?;
        let at = center + disp * t;
        return Some(Contact {
            normal: (at - corner).normalize_or(entry_normal),
            time_until_collision: t * dt,
            point: corner,
        });
    }

    if entry_normal == Vec2::ZERO {
        return None;
    }
    Some(Contact {
        normal: entry_normal,
        time_until_collision: t_enter * dt,
        point: aabb.closest_point(hit),
    })
}

/// Sweep a circle against the line segment `a`-`b`
pub fn sweep_circle_segment(center: Vec2, radius: f32, velocity: Vec2, dt: f32, a: Vec2, b: Vec2) -> Option<Contact> {
    let seg = b - a;
    let seg_len_sq = seg.length_squared();
    if seg_len_sq < EPSILON * EPSILON {
        return None;
    }

    let disp = velocity * dt;
    let s0 = ((center - a).dot(seg) / seg_len_sq).clamp(0.0, 1.0);
    let closest = a + seg * s0;
    let offset = center - closest;
    if offset.length_squared() < radius * radius {
        let normal = offset.normalize_or(seg.perp().normalize());
        if velocity.dot(normal) >= 0.0 {
            return None;
        }
        return Some(Contact {
            normal,
            time_until_collision: 0.0,
            point: closest,
        });
    }

    let mut best: Option<(f32, Vec2, Vec2)> = None;

    // Flat side of the capsule
    let mut n = seg.perp().normalize();
    if n.dot(center - a) < 0.0 {
        n = -n;
    }
    let dist0 = n.dot(center - a);
    let approach = -n.dot(disp);
    if approach > EPSILON {
        let t = (dist0 - radius) / approach;
        if (0.0..=1.0).contains(&t) {
            let at = center + disp * t;
            let s = (at - a).dot(seg) / seg_len_sq;
            if (0.0..=1.0).contains(&s) {
                best = Some((t, n, a + seg * s));
            }
        }
    }

    // End caps
    for endpoint in [a, b] {
        if let Some(t) = sweep_circle_point(center, radius, disp, endpoint) {
            if best.is_none_or(|(bt, _, _)| t < bt) {
                let at = center + disp * t;
                best = Some((t, (at - endpoint).normalize_or(n), endpoint));
            }
        }
    }

    best.map(|(t, normal, point)| Contact {
        normal,
        time_until_collision: t * dt,
        point,
    })
}

/// Sweep two moving circles against each other. The contact normal points toward the first circle.
pub fn sweep_circle_circle(
    center: Vec2,
    radius: f32,
    velocity: Vec2,
    other_center: Vec2,
    other_radius: f32,
    other_velocity: Vec2,
    dt: f32,
) -> Option<Contact> {
    let rel_disp = (velocity - other_velocity) * dt;
    let sum = radius + other_radius;
    let t = if (center - other_center).length_squared() < sum * sum {
        // Overlapping: only collide if still closing in
        if (center - other_center).dot(velocity - other_velocity) >= 0.0 {
            return None;
        }
        0.0
    } else {
        sweep_circle_point(center, sum, rel_disp, other_center)?
    };

    let at = center + velocity * dt * t;
    let other_at = other_center + other_velocity * dt * t;
    let normal = (at - other_at).normalize_or(Vec2::Y);
    Some(Contact {
        normal,
        time_until_collision: t * dt,
        point: other_at + normal * other_radius,
    })
}
