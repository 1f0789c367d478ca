//! Level geometry: a grid of pieces plus the worlds that group levels
//!
//! Layouts are plain text, one line per row with the top row first:
//!
//! | char      | piece                            |
//! |-----------|----------------------------------|
//! | `.`       | empty                            |
//! | `1`-`3`   | breakable with that many hits    |
//! | `S`       | solid (indestructible)           |
//! | `X`       | bomb                             |
//! | `I`       | item drop (always drops)         |
//! | `K`       | ink                              |
//! | `T` / `Z` | tesla, active / inactive         |
//! | `a`-`z`   | portal, paired with the same letter |

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::ball::{Ball, BallTypes};
use super::boss::Boss;
use super::collision::{Aabb, Contact, sweep_circle_aabb, sweep_circle_segment};
use crate::consts::*;

/// Grid index of a piece (`row * width + col`, row 0 at the bottom)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PieceId(pub usize);

/// Closed set of piece kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PieceKind {
    Empty,
    Breakable { hp: u8 },
    Solid,
    Bomb,
    ItemDrop,
    Ink,
    Tesla { active: bool },
    Portal { sibling: PieceId },
}

bitflags! {
    /// Ongoing status effects on a piece
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PieceStatus: u32 {
        const ON_FIRE = 1 << 0;
        const FROZEN  = 1 << 1;
    }
}

/// One cell of the level grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelPiece {
    pub id: PieceId,
    pub row: usize,
    pub col: usize,
    pub kind: PieceKind,
    pub status: PieceStatus,
}

impl LevelPiece {
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.col as f32 + 0.5) * PIECE_WIDTH,
            (self.row as f32 + 0.5) * PIECE_HEIGHT,
        )
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.center(), Vec2::new(PIECE_WIDTH * 0.5, PIECE_HEIGHT * 0.5))
    }

    /// Whether this piece has collision bounds at all
    pub fn has_bounds(&self) -> bool {
        !matches!(self.kind, PieceKind::Empty)
    }

    /// Pieces that must be destroyed to finish the level
    pub fn must_be_destroyed(&self) -> bool {
        matches!(
            self.kind,
            PieceKind::Breakable { .. } | PieceKind::Bomb | PieceKind::ItemDrop | PieceKind::Ink
        )
    }

    pub fn ball_bounces_off_when_hit(&self) -> bool {
        !matches!(self.kind, PieceKind::Empty | PieceKind::Portal { .. })
    }

    /// An uber ball destroys this piece and keeps going
    pub fn ball_blasts_through(&self, ball: &Ball) -> bool {
        match self.kind {
            PieceKind::Empty | PieceKind::Portal { .. } => true,
            PieceKind::Breakable { .. } | PieceKind::Bomb | PieceKind::ItemDrop | PieceKind::Ink => {
                ball.has_type(BallTypes::UBER) && !self.status.contains(PieceStatus::FROZEN)
            }
            PieceKind::Solid | PieceKind::Tesla { .. } => false,
        }
    }

    pub fn ghostball_passes_through(&self) -> bool {
        !matches!(self.kind, PieceKind::Tesla { .. } | PieceKind::Portal { .. } | PieceKind::Empty)
    }

    pub fn can_catch_fire(&self) -> bool {
        self.must_be_destroyed() && !self.status.contains(PieceStatus::ON_FIRE)
    }

    pub fn can_be_frozen(&self) -> bool {
        self.must_be_destroyed() && !self.status.contains(PieceStatus::FROZEN)
    }

    /// Swept test of a ball against this piece
    pub fn collision_check(&self, ball: &Ball, dt: f32) -> Option<Contact> {
        if !self.has_bounds() {
            return None;
        }
        sweep_circle_aabb(ball.center, ball.radius, ball.velocity(), dt, &self.bounds())
    }
}

/// A lightning arc between two active tesla pieces
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeslaArc {
    pub a: PieceId,
    pub b: PieceId,
    pub start: Vec2,
    pub end: Vec2,
}

impl TeslaArc {
    pub fn collision_check(&self, ball: &Ball, dt: f32) -> Option<Contact> {
        sweep_circle_segment(ball.center, ball.radius, ball.velocity(), dt, self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelParseError {
    Empty,
    Ragged { row: usize, expected: usize, found: usize },
    UnknownPiece { row: usize, col: usize, ch: char },
    UnpairedPortal(char),
}

impl fmt::Display for LevelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "level layout has no rows"),
            Self::Ragged { row, expected, found } => {
                write!(f, "row {row} has {found} columns, expected {expected}")
            }
            Self::UnknownPiece { row, col, ch } => {
                write!(f, "unknown piece '{ch}' at row {row}, column {col}")
            }
            Self::UnpairedPortal(ch) => write!(f, "portal '{ch}' needs exactly two ends"),
        }
    }
}

impl std::error::Error for LevelParseError {}

/// A playable level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameLevel {
    pub name: String,
    width: usize,
    height: usize,
    pieces: Vec<LevelPiece>,
    /// Pieces left that must be destroyed
    pieces_remaining: usize,
    /// A boss that must also be beaten to finish the level
    pub boss: Option<Boss>,
}

impl GameLevel {
    pub fn from_layout(name: &str, layout: &str) -> Result<Self, LevelParseError> {
        let rows: Vec<&str> = layout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let height = rows.len();
        let Some(width) = rows.first().map(|r| r.chars().count()) else {
            return Err(LevelParseError::Empty);
        };

        let mut pieces = Vec::with_capacity(width * height);
        let mut portal_ends: BTreeMap<char, Vec<PieceId>> = BTreeMap::new();

        // Text is top-first; grid is bottom-first
        for row in 0..height {
            let line = rows[height - 1 - row];
            let found = line.chars().count();
            if found != width {
                return Err(LevelParseError::Ragged { row, expected: width, found });
            }
            for (col, ch) in line.chars().enumerate() {
                let id = PieceId(row * width + col);
                let kind = match ch {
                    '.' => PieceKind::Empty,
                    '1'..='3' => PieceKind::Breakable { hp: ch as u8 - b'0' },
                    'S' => PieceKind::Solid,
                    'X' => PieceKind::Bomb,
                    'I' => PieceKind::ItemDrop,
                    'K' => PieceKind::Ink,
                    'T' => PieceKind::Tesla { active: true },
                    'Z' => PieceKind::Tesla { active: false },
                    'a'..='z' => {
                        portal_ends.entry(ch).or_default().push(id);
                        // sibling patched below
                        PieceKind::Portal { sibling: id }
                    }
                    _ => return Err(LevelParseError::UnknownPiece { row, col, ch }),
                };
                pieces.push(LevelPiece { id, row, col, kind, status: PieceStatus::empty() });
            }
        }

        for (ch, ends) in portal_ends {
            let &[a, b] = ends.as_slice() else {
                return Err(LevelParseError::UnpairedPortal(ch));
            };
            pieces[a.0].kind = PieceKind::Portal { sibling: b };
            pieces[b.0].kind = PieceKind::Portal { sibling: a };
        }

        let pieces_remaining = pieces.iter().filter(|p| p.must_be_destroyed()).count();
        Ok(Self { name: name.to_string(), width, height, pieces, pieces_remaining, boss: None })
    }

    pub fn with_boss(mut self, boss: Boss) -> Self {
        self.boss = Some(boss);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn unit_width(&self) -> f32 {
        self.width as f32 * PIECE_WIDTH
    }

    pub fn unit_height(&self) -> f32 {
        self.height as f32 * PIECE_HEIGHT
    }

    pub fn piece(&self, id: PieceId) -> &LevelPiece {
        &self.pieces[id.0]
    }

    pub fn piece_mut(&mut self, id: PieceId) -> &mut LevelPiece {
        &mut self.pieces[id.0]
    }

    pub fn piece_at(&self, row: usize, col: usize) -> Option<&LevelPiece> {
        (row < self.height && col < self.width).then(|| &self.pieces[row * self.width + col])
    }

    pub fn pieces(&self) -> impl Iterator<Item = &LevelPiece> {
        self.pieces.iter()
    }

    pub fn pieces_remaining(&self) -> usize {
        self.pieces_remaining
    }

    pub fn is_level_complete(&self) -> bool {
        self.pieces_remaining == 0 && self.boss.as_ref().is_none_or(Boss::is_dead)
    }

    /// Turn a piece into empty space; returns its previous kind.
    ///
    /// Only pieces that count toward completion can be removed.
    pub fn remove_piece(&mut self, id: PieceId) -> Option<PieceKind> {
        let piece = &mut self.pieces[id.0];
        if !piece.must_be_destroyed() {
            return None;
        }
        let prev = piece.kind;
        piece.kind = PieceKind::Empty;
        piece.status = PieceStatus::empty();
        self.pieces_remaining -= 1;
        Some(prev)
    }

    /// Non-empty pieces whose cells overlap `area`, in row-major order (bottom row first)
    pub fn collision_candidates(&self, area: &Aabb) -> Vec<PieceId> {
        if self.width == 0 || self.height == 0 {
            return Vec::new();
        }
        let col_range = |x: f32| (x / PIECE_WIDTH).floor().clamp(0.0, (self.width - 1) as f32) as usize;
        let row_range = |y: f32| (y / PIECE_HEIGHT).floor().clamp(0.0, (self.height - 1) as f32) as usize;
        if area.max.x < 0.0 || area.max.y < 0.0 || area.min.x > self.unit_width() || area.min.y > self.unit_height() {
            return Vec::new();
        }
        let (c0, c1) = (col_range(area.min.x), col_range(area.max.x));
        let (r0, r1) = (row_range(area.min.y), row_range(area.max.y));

        let mut out = Vec::new();
        for row in r0..=r1 {
            for col in c0..=c1 {
                let piece = &self.pieces[row * self.width + col];
                if piece.has_bounds() {
                    out.push(piece.id);
                }
            }
        }
        out
    }

    /// Broad phase for a ball over one step: its bounds swept along its velocity
    pub fn ball_collision_candidates(&self, ball: &Ball, dt: f32) -> Vec<PieceId> {
        let start = ball.bounds();
        let end = Aabb::from_center(ball.center + ball.velocity() * dt, Vec2::splat(ball.radius));
        self.collision_candidates(&start.union(&end))
    }

    /// The up-to-eight pieces around `id`
    pub fn neighbours(&self, id: PieceId) -> Vec<PieceId> {
        let piece = &self.pieces[id.0];
        let mut out = Vec::with_capacity(8);
        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let row = piece.row as i64 + dr;
                let col = piece.col as i64 + dc;
                if row < 0 || col < 0 {
                    continue;
                }
                if let Some(n) = self.piece_at(row as usize, col as usize) {
                    out.push(n.id);
                }
            }
        }
        out
    }

    /// Arcs between every pair of active tesla pieces that share a row or column
    pub fn tesla_arcs(&self) -> Vec<TeslaArc> {
        let active: Vec<&LevelPiece> = self
            .pieces
            .iter()
            .filter(|p| matches!(p.kind, PieceKind::Tesla { active: true }))
            .collect();
        let mut arcs = Vec::new();
        for (i, a) in active.iter().enumerate() {
            for b in &active[i + 1..] {
                if a.row == b.row || a.col == b.col {
                    arcs.push(TeslaArc { a: a.id, b: b.id, start: a.center(), end: b.center() });
                }
            }
        }
        arcs
    }

    /// Flip a tesla piece on or off; returns the new state
    pub fn toggle_tesla(&mut self, id: PieceId) -> Option<bool> {
        match &mut self.pieces[id.0].kind {
            PieceKind::Tesla { active } => {
                *active = !*active;
                Some(*active)
            }
            _ => None,
        }
    }

    /// Balls, items and projectiles beyond this are lost
    pub fn is_out_of_bounds(&self, pos: Vec2) -> bool {
        pos.y <= Y_COORD_OF_DEATH
            || pos.y >= self.unit_height() + OUT_OF_BOUNDS_BUFFER_SPACE
            || pos.x <= -OUT_OF_BOUNDS_BUFFER_SPACE
            || pos.x >= self.unit_width() + OUT_OF_BOUNDS_BUFFER_SPACE
    }

    /// Centre of the paddle at the start of a life
    pub fn paddle_start(&self, half_height: f32) -> Vec2 {
        Vec2::new(self.unit_width() * 0.5, half_height + PIECE_HEIGHT * 0.5)
    }

    /// Horizontal travel range for a paddle at height `y`: walls or solid pieces beside it
    pub fn paddle_limits(&self, paddle_bounds: &Aabb) -> (f32, f32) {
        let mut min_x = 0.0_f32;
        let mut max_x = self.unit_width();
        let centre = paddle_bounds.center().x;
        let band = Aabb::new(
            Vec2::new(0.0, paddle_bounds.min.y),
            Vec2::new(self.unit_width(), paddle_bounds.max.y),
        );
        for id in self.collision_candidates(&band) {
            let b = self.pieces[id.0].bounds();
            if b.max.y <= paddle_bounds.min.y || b.min.y >= paddle_bounds.max.y {
                continue;
            }
            if b.center().x < centre {
                min_x = min_x.max(b.max.x);
            } else {
                max_x = max_x.min(b.min.x);
            }
        }
        (min_x, max_x)
    }
}

/// An ordered run of levels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameWorld {
    pub name: String,
    pub levels: Vec<GameLevel>,
}

impl GameWorld {
    pub fn new(name: &str, levels: Vec<GameLevel>) -> Self {
        assert!(!levels.is_empty(), "world {name} has no levels");
        Self { name: name.to_string(), levels }
    }
}
