//! Keyframed linear interpolation over time
//!
//! Two timelines drive almost every transient value in the simulation (death
//! spirals, boss paths, bullet-time scaling, wormhole travel):
//! - [`AnimationLerp`]: a single `(x0, y0) -> (x1, y1)` segment
//! - [`AnimationMultiLerp`]: an ordered sequence of `(time, value)` keyframes
//!
//! Both advance their cursor *before* evaluating, so the tick whose cumulative
//! `dt` reaches the final keyframe writes the final value and reports completion.

use std::cell::Cell;
use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};
use std::rc::Rc;

use crate::consts::EPSILON;

/// Anything that can be linearly interpolated: scalars, vectors, colours
pub trait Lerp:
    Copy + Debug + Default + Add<Output = Self> + Sub<Output = Self> + Mul<f32, Output = Self>
{
}

impl<T> Lerp for T where
    T: Copy + Debug + Default + Add<Output = T> + Sub<Output = T> + Mul<f32, Output = T>
{
}

/// Where an animation writes its current value.
///
/// `Owned` values are deep-copied when the animation is cloned; `Bound` targets
/// are shared, so a clone writes into the same external cell.
#[derive(Debug, Clone)]
pub enum Interpolant<T: Copy> {
    Owned(T),
    Bound(Rc<Cell<T>>),
}

impl<T: Copy> Interpolant<T> {
    #[inline]
    pub fn get(&self) -> T {
        match self {
            Interpolant::Owned(v) => *v,
            Interpolant::Bound(cell) => cell.get(),
        }
    }

    #[inline]
    pub fn set(&mut self, value: T) {
        match self {
            Interpolant::Owned(v) => *v = value,
            Interpolant::Bound(cell) => cell.set(value),
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Interpolant::Owned(_))
    }
}

/// Single-segment linear animation
#[derive(Debug, Clone)]
pub struct AnimationLerp<T: Lerp> {
    interpolant: Interpolant<T>,
    repeat: bool,
    y0: T,
    y1: T,
    x0: f32,
    x1: f32,
    /// Cursor time
    x: f32,
}

impl<T: Lerp> Default for AnimationLerp<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Lerp> AnimationLerp<T> {
    /// Animation owning its own value
    pub fn new(value: T) -> Self {
        Self {
            interpolant: Interpolant::Owned(value),
            repeat: false,
            y0: value,
            y1: value,
            x0: 0.0,
            x1: 1.0,
            x: 0.0,
        }
    }

    /// Animation writing through to an externally owned cell
    pub fn bound(target: Rc<Cell<T>>) -> Self {
        let value = target.get();
        Self {
            interpolant: Interpolant::Bound(target),
            repeat: false,
            y0: value,
            y1: value,
            x0: 0.0,
            x1: 1.0,
            x: 0.0,
        }
    }

    pub fn reset_to_start(&mut self) {
        self.x = 0.0;
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn value(&self) -> T {
        self.interpolant.get()
    }

    pub fn set_value(&mut self, value: T) {
        self.interpolant.set(value);
    }

    pub fn target_value(&self) -> T {
        self.y1
    }

    pub fn final_time(&self) -> f32 {
        self.x1
    }

    pub fn current_time(&self) -> f32 {
        self.x
    }

    /// Replace the segment and rewind the cursor to zero
    pub fn set_lerp(&mut self, initial_time: f32, final_time: f32, initial_value: T, final_value: T) {
        assert!(final_time >= initial_time, "lerp segment runs backwards");
        self.x = 0.0;
        self.x0 = initial_time;
        self.x1 = final_time;
        self.y0 = initial_value;
        self.y1 = final_value;
        if initial_time <= 0.0 {
            self.interpolant.set(initial_value);
        }
    }

    /// Animate from the current value to `final_value` over `final_time` seconds
    pub fn set_lerp_to(&mut self, final_time: f32, final_value: T) {
        let current = self.interpolant.get();
        self.set_lerp(0.0, final_time, current, final_value);
    }

    /// Hold the current value; the next tick completes immediately
    pub fn clear_lerp(&mut self) {
        let current = self.interpolant.get();
        self.x = 0.0;
        self.x0 = 0.0;
        self.x1 = 0.0;
        self.y0 = current;
        self.y1 = current;
    }

    pub fn scale_play_speed(&mut self, scale: f32) {
        assert!(scale > 0.0);
        self.x0 *= scale;
        self.x1 *= scale;
        self.x *= scale;
    }

    /// Advance by `dt`. Returns true once the segment is finished (never while repeating).
    pub fn tick(&mut self, dt: f32) -> bool {
        let span = self.x1 - self.x0;
        if span.abs() < EPSILON {
            self.interpolant.set(self.y1);
            return true;
        }

        if self.x >= self.x1 {
            if !self.repeat {
                self.interpolant.set(self.y1);
                return true;
            }
            self.reset_to_start();
        }

        self.x += dt;
        if self.x < self.x0 {
            return false;
        }

        if self.x >= self.x1 {
            if !self.repeat {
                self.x = self.x1;
                self.interpolant.set(self.y1);
                return true;
            }
            self.x = self.x0 + (self.x - self.x0) % span;
        }

        let t = (self.x - self.x0) / span;
        self.interpolant.set(self.y0 + (self.y1 - self.y0) * t);
        false
    }

    /// Rate of change of the value over the segment
    pub fn dx_dt(&self) -> T {
        let span = self.x1 - self.x0;
        if span <= 0.0 {
            return T::default();
        }
        (self.y1 - self.y0) * (1.0 / span)
    }
}

/// Multi-keyframe linear animation
#[derive(Debug, Clone)]
pub struct AnimationMultiLerp<T: Lerp> {
    interpolant: Interpolant<T>,
    repeat: bool,
    values: Vec<T>,
    times: Vec<f32>,
    /// Cursor time
    x: f32,
    /// Index of the keyframe starting the active bracket
    tracker: usize,
}

impl<T: Lerp> Default for AnimationMultiLerp<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Lerp> AnimationMultiLerp<T> {
    pub fn new(value: T) -> Self {
        Self {
            interpolant: Interpolant::Owned(value),
            repeat: false,
            values: Vec::new(),
            times: Vec::new(),
            x: 0.0,
            tracker: 0,
        }
    }

    pub fn bound(target: Rc<Cell<T>>) -> Self {
        Self {
            interpolant: Interpolant::Bound(target),
            repeat: false,
            values: Vec::new(),
            times: Vec::new(),
            x: 0.0,
            tracker: 0,
        }
    }

    pub fn interpolant(&self) -> &Interpolant<T> {
        &self.interpolant
    }

    pub fn value(&self) -> T {
        self.interpolant.get()
    }

    pub fn set_value(&mut self, value: T) {
        self.interpolant.set(value);
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn current_time(&self) -> f32 {
        self.x
    }

    pub fn has_interpolation_set(&self) -> bool {
        !self.values.is_empty()
    }

    pub fn final_value(&self) -> T {
        assert!(!self.values.is_empty());
        self.values[self.values.len() - 1]
    }

    pub fn final_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn set_initial_value(&mut self, value: T) {
        assert!(!self.values.is_empty());
        self.values[0] = value;
    }

    pub fn set_final_value(&mut self, value: T) {
        assert!(!self.values.is_empty());
        let last = self.values.len() - 1;
        self.values[last] = value;
    }

    pub fn set_value_at(&mut self, idx: usize, value: T) {
        assert!(idx < self.values.len());
        self.values[idx] = value;
    }

    pub fn is_finished(&self) -> bool {
        self.times.len() < 2 || (!self.repeat && self.tracker == self.times.len() - 1)
    }

    pub fn reset_to_start(&mut self) {
        assert!(!self.values.is_empty());
        self.x = 0.0;
        self.tracker = 0;
        self.interpolant.set(self.values[0]);
    }

    /// Replace the keyframes and rewind the cursor.
    ///
    /// Panics if the slices differ in length, hold fewer than two keyframes, or
    /// the times decrease.
    pub fn set_lerp(&mut self, times: &[f32], values: &[T]) {
        assert!(times.len() >= 2, "a timeline needs at least two keyframes");
        assert_eq!(times.len(), values.len(), "one value per keyframe time");
        assert!(
            times.windows(2).all(|w| w[1] >= w[0]),
            "keyframe times must be non-decreasing"
        );

        self.x = 0.0;
        self.tracker = 0;
        self.times = times.to_vec();
        self.values = values.to_vec();
        if times[0] <= 0.0 {
            self.interpolant.set(values[0]);
        }
    }

    /// Two-keyframe animation from the current value to `final_value`
    pub fn set_lerp_to(&mut self, final_time: f32, final_value: T) {
        let current = self.interpolant.get();
        self.set_lerp(&[0.0, final_time], &[current, final_value]);
    }

    /// Append keyframes; `times` are relative to the current final keyframe
    pub fn append_lerp(&mut self, times: &[f32], values: &[T]) {
        assert_eq!(times.len(), values.len(), "one value per keyframe time");
        if self.times.is_empty() {
            self.set_lerp(times, values);
            return;
        }

        let end = self.final_time();
        self.times.extend(times.iter().map(|t| end + t));
        self.values.extend_from_slice(values);
    }

    pub fn append_lerp_to(&mut self, duration: f32, final_value: T) {
        if self.times.is_empty() {
            self.set_lerp_to(duration, final_value);
            return;
        }
        let end = self.final_time();
        self.times.push(end + duration);
        self.values.push(final_value);
    }

    /// Drop all keyframes; ticking does nothing until a new lerp is set
    pub fn clear_lerp(&mut self) {
        self.x = 0.0;
        self.tracker = 0;
        self.times.clear();
        self.values.clear();
    }

    pub fn scale_play_speed(&mut self, scale: f32) {
        assert!(scale > 0.0);
        for t in &mut self.times {
            *t *= scale;
        }
        self.x *= scale;
    }

    /// Advance by `dt`. Returns true once the final keyframe is reached (never while repeating).
    pub fn tick(&mut self, dt: f32) -> bool {
        debug_assert_eq!(self.times.len(), self.values.len());
        if self.times.len() < 2 {
            return true;
        }

        let last = self.times.len() - 1;
        if self.tracker == last {
            if !self.repeat {
                return true;
            }
            self.reset_to_start();
        }

        self.x += dt;
        if self.x < self.times[0] {
            debug_assert_eq!(self.tracker, 0);
            return false;
        }

        self.advance_tracker();
        if self.tracker == last {
            if !self.repeat {
                self.x = self.times[last];
                self.interpolant.set(self.values[last]);
                return true;
            }
            self.wrap();
        }

        self.interpolate();
        false
    }

    /// Rate of change of the value over the active bracket
    pub fn dx_dt(&self) -> T {
        if self.times.len() < 2 || self.x < self.times[0] || self.tracker >= self.times.len() - 1 {
            return T::default();
        }

        let span = self.times[self.tracker + 1] - self.times[self.tracker];
        if span <= 0.0 {
            return T::default();
        }
        (self.values[self.tracker + 1] - self.values[self.tracker]) * (1.0 / span)
    }

    fn advance_tracker(&mut self) {
        let last = self.times.len() - 1;
        while self.tracker < last && self.x >= self.times[self.tracker + 1] {
            self.tracker += 1;
        }
    }

    fn wrap(&mut self) {
        let start = self.times[0];
        let span = self.final_time() - start;
        self.tracker = 0;
        if span < EPSILON {
            self.x = start;
        } else {
            self.x = start + (self.x - start) % span;
            self.advance_tracker();
        }
    }

    fn interpolate(&mut self) {
        let (t0, t1) = (self.times[self.tracker], self.times[self.tracker + 1]);
        let (v0, v1) = (self.values[self.tracker], self.values[self.tracker + 1]);

        if (t1 - t0).abs() < EPSILON {
            self.interpolant.set(v1);
            return;
        }
        self.interpolant.set(v0 + (v1 - v0) * ((self.x - t0) / (t1 - t0)));
    }
}
