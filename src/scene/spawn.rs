//! Seeded randomness for particle spawning and motion noise.
//!
//! Every random draw in a scene goes through one [`SpawnContext`], seeded
//! from the snapshot's seed, so headless runs are reproducible.

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Seeded random source with helpers for common spawn patterns.
///
/// ```ignore
/// let mut ctx = SpawnContext::new(42);
/// let p = ctx.random_in_rect(Vec2::ZERO, Vec2::new(600.0, 400.0));
/// let v = ctx.random_direction() * 40.0;
/// ```
#[derive(Debug, Clone)]
pub struct SpawnContext {
    seed: u64,
    rng: SmallRng,
}

impl SpawnContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Seed this context was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    // ========== Random primitives ==========

    /// Random f32 between 0.0 and 1.0.
    #[inline]
    pub fn random(&mut self) -> f32 {
        self.rng.gen()
    }

    /// Random f32 in `[min, max)`. Returns `min` for an empty range.
    #[inline]
    pub fn random_range(&mut self, min: f32, max: f32) -> f32 {
        if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        }
    }

    /// Random f32 in `[-1, 1)`.
    #[inline]
    pub fn random_signed(&mut self) -> f32 {
        self.random_range(-1.0, 1.0)
    }

    /// Random index in `0..len`. `len` must be non-zero.
    #[inline]
    pub fn random_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    // ========== Position helpers ==========

    /// Random point inside an axis-aligned rectangle.
    pub fn random_in_rect(&mut self, min: Vec2, max: Vec2) -> Vec2 {
        Vec2::new(self.random_range(min.x, max.x), self.random_range(min.y, max.y))
    }

    /// Random point inside a disk, uniform over area.
    pub fn random_in_disk(&mut self, center: Vec2, radius: f32) -> Vec2 {
        let theta = self.random_range(0.0, TAU);
        let r = radius.max(0.0) * self.random().sqrt(); // sqrt for uniform disk
        center + Vec2::new(r * theta.cos(), r * theta.sin())
    }

    /// Random point on a circle.
    pub fn random_on_ring(&mut self, center: Vec2, radius: f32) -> Vec2 {
        let theta = self.random_range(0.0, TAU);
        center + Vec2::new(radius * theta.cos(), radius * theta.sin())
    }

    // ========== Direction/velocity helpers ==========

    /// Random unit vector.
    pub fn random_direction(&mut self) -> Vec2 {
        let theta = self.random_range(0.0, TAU);
        Vec2::new(theta.cos(), theta.sin())
    }

    /// Random velocity with the given speed.
    pub fn random_velocity(&mut self, speed: f32) -> Vec2 {
        self.random_direction() * speed
    }

    /// Pick `k` distinct indices from `0..len` (partial Fisher-Yates).
    pub fn sample_indices(&mut self, len: usize, k: usize) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..len).collect();
        let k = k.min(len);
        for i in 0..k {
            let j = self.rng.gen_range(i..len);
            idx.swap(i, j);
        }
        idx.truncate(k);
        idx
    }
}

/// Convert HSV to RGB.
///
/// - `h` - Hue in range 0.0-1.0 (wraps around)
/// - `s` - Saturation in range 0.0-1.0
/// - `v` - Value/brightness in range 0.0-1.0
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> crate::visuals::Color {
    let h = h.rem_euclid(1.0) * 6.0;
    let c = v * s;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    crate::visuals::Color::rgb(r + m, g + m, b + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SpawnContext::new(7);
        let mut b = SpawnContext::new(7);
        for _ in 0..16 {
            assert_eq!(a.random(), b.random());
        }
    }

    #[test]
    fn test_random_in_rect_bounds() {
        let mut ctx = SpawnContext::new(1);
        for _ in 0..200 {
            let p = ctx.random_in_rect(Vec2::new(10.0, 20.0), Vec2::new(30.0, 25.0));
            assert!(p.x >= 10.0 && p.x < 30.0);
            assert!(p.y >= 20.0 && p.y < 25.0);
        }
    }

    #[test]
    fn test_random_in_disk_bounds() {
        let mut ctx = SpawnContext::new(2);
        for _ in 0..200 {
            let p = ctx.random_in_disk(Vec2::new(5.0, 5.0), 2.0);
            assert!(p.distance(Vec2::new(5.0, 5.0)) <= 2.0 + 1e-5);
        }
    }

    #[test]
    fn test_sample_indices_distinct() {
        let mut ctx = SpawnContext::new(3);
        let mut picked = ctx.sample_indices(10, 4);
        assert_eq!(picked.len(), 4);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 4);
        assert_eq!(ctx.sample_indices(3, 10).len(), 3);
    }

    #[test]
    fn test_hsv_primaries() {
        let red = hsv_to_rgb(0.0, 1.0, 1.0);
        assert!((red.r - 1.0).abs() < 1e-6 && red.g.abs() < 1e-6);
    }
}
