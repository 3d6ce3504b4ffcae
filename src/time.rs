//! Frame clock driven by host timestamps.
//!
//! The host's frame callback hands the driver a monotonic timestamp in
//! seconds. [`FrameClock`] turns consecutive timestamps into a clamped real
//! `dt`, so a backgrounded tab that resumes after minutes does not fling the
//! simulation forward.
//!
//! # Example
//!
//! ```ignore
//! use rtviz::time::FrameClock;
//!
//! let mut clock = FrameClock::new(0.1);
//!
//! // In the host's frame callback:
//! let dt = clock.update(timestamp_secs);
//!
//! println!("Delta: {:.4}s", dt);
//! println!("Frame: {}", clock.frame());
//! println!("FPS: {:.1}", clock.fps());
//! ```

/// Real-time bookkeeping for the animation driver.
#[derive(Debug, Clone)]
pub struct FrameClock {
    /// Timestamp of the previous running frame.
    last_timestamp: Option<f64>,
    /// Real seconds accumulated while running.
    elapsed_secs: f64,
    /// Clamped delta of the latest frame.
    delta_secs: f64,
    /// Frames counted while running.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f64,
    fps_frame_count: u64,
    fps_update_time: Option<f64>,
    fps_update_interval: f64,
    /// Whether time is paused.
    paused: bool,
    /// Upper clamp for one frame's delta.
    max_frame_gap: f64,
    /// Whether the latest delta hit the clamp.
    clamped: bool,
    /// Fixed delta for deterministic stepping (optional).
    fixed_delta: Option<f64>,
    /// Playback speed multiplier (1.0 = normal speed).
    time_scale: f64,
}

impl FrameClock {
    /// Create a clock that clamps deltas to `max_frame_gap` seconds.
    pub fn new(max_frame_gap: f64) -> Self {
        Self {
            last_timestamp: None,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: None,
            fps_update_interval: 0.5,
            paused: false,
            max_frame_gap: max_frame_gap.max(0.0),
            clamped: false,
            fixed_delta: None,
            time_scale: 1.0,
        }
    }

    /// Feed a host timestamp in seconds. Call once per frame.
    ///
    /// Returns the clamped, scaled delta. The first frame after creation,
    /// reset or resume has a delta of zero.
    pub fn update(&mut self, now: f64) -> f64 {
        if self.paused {
            self.delta_secs = 0.0;
            self.clamped = false;
            return 0.0;
        }

        let raw = match self.last_timestamp {
            Some(last) if now.is_finite() => now - last,
            _ => 0.0,
        };
        self.clamped = raw > self.max_frame_gap;
        if self.clamped {
            tracing::trace!(raw, max = self.max_frame_gap, "frame gap clamped");
        }
        let real = raw.clamp(0.0, self.max_frame_gap);
        if now.is_finite() {
            self.last_timestamp = Some(now);
        }

        self.delta_secs = self.fixed_delta.unwrap_or(real) * self.time_scale;
        self.elapsed_secs += self.delta_secs;
        self.frame_count += 1;

        // Update FPS periodically
        match self.fps_update_time {
            None => {
                self.fps_update_time = Some(now);
                self.fps_frame_count = self.frame_count;
            }
            Some(since) if now - since >= self.fps_update_interval => {
                let frames = self.frame_count - self.fps_frame_count;
                self.fps = frames as f64 / (now - since);
                self.fps_frame_count = self.frame_count;
                self.fps_update_time = Some(now);
            }
            Some(_) => {}
        }

        self.delta_secs
    }

    /// Real seconds accumulated while running.
    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.elapsed_secs
    }

    /// Delta of the latest frame.
    #[inline]
    pub fn delta(&self) -> f64 {
        self.delta_secs
    }

    /// Frames counted while running.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Calculated frames per second.
    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Whether the latest delta was clamped.
    #[inline]
    pub fn was_clamped(&self) -> bool {
        self.clamped
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    #[inline]
    pub fn max_frame_gap(&self) -> f64 {
        self.max_frame_gap
    }

    /// Pause time progression. While paused, `update` returns 0.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume after pausing. The next frame has a zero delta.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.last_timestamp = None;
            self.fps_update_time = None;
            self.fps_frame_count = self.frame_count;
        }
    }

    /// Toggle pause state.
    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Use a fixed delta instead of host timestamps. `None` restores real
    /// timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f64>) {
        self.fixed_delta = delta.map(|d| d.max(0.0));
    }

    /// Set playback speed.
    ///
    /// - `1.0` = normal speed
    /// - `0.5` = half speed (slow motion)
    /// - `2.0` = double speed
    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = if scale.is_finite() { scale.max(0.0) } else { 1.0 };
    }

    /// Forget the last timestamp so the next frame starts fresh.
    pub fn reset(&mut self) {
        self.last_timestamp = None;
        self.elapsed_secs = 0.0;
        self.delta_secs = 0.0;
        self.frame_count = 0;
        self.fps = 0.0;
        self.fps_frame_count = 0;
        self.fps_update_time = None;
        self.paused = false;
        self.clamped = false;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::default();
        assert_eq!(clock.frame(), 0);
        assert!(!clock.is_paused());
        assert_eq!(clock.time_scale(), 1.0);
    }

    #[test]
    fn test_first_frame_zero_delta() {
        let mut clock = FrameClock::new(0.1);
        assert_eq!(clock.update(12.0), 0.0);
        let dt = clock.update(12.016);
        assert!((dt - 0.016).abs() < 1e-12);
        assert_eq!(clock.frame(), 2);
    }

    #[test]
    fn test_gap_clamped() {
        let mut clock = FrameClock::new(0.1);
        clock.update(0.0);
        assert_eq!(clock.update(300.0), 0.1);
        assert!(clock.was_clamped());
        // Backwards timestamps never produce negative time
        assert_eq!(clock.update(299.0), 0.0);
    }

    #[test]
    fn test_clock_pause() {
        let mut clock = FrameClock::new(0.1);
        clock.update(0.0);
        clock.update(0.05);
        clock.pause();
        let elapsed = clock.elapsed();
        assert_eq!(clock.update(0.1), 0.0);
        assert_eq!(clock.elapsed(), elapsed);

        clock.resume();
        assert_eq!(clock.update(5.0), 0.0);
        assert!((clock.update(5.02) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_time_scale() {
        let mut clock = FrameClock::new(0.1);
        clock.set_time_scale(2.0);
        assert_eq!(clock.time_scale(), 2.0);

        // Negative scale should clamp to 0
        clock.set_time_scale(-1.0);
        assert_eq!(clock.time_scale(), 0.0);
    }

    #[test]
    fn test_fixed_delta() {
        let mut clock = FrameClock::new(0.1);
        clock.set_fixed_delta(Some(1.0 / 60.0));
        clock.update(0.0);
        let dt = clock.update(0.5);
        assert!((dt - 1.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_fps_statistic() {
        let mut clock = FrameClock::new(0.1);
        for i in 0..16 {
            clock.update(i as f64 / 32.0);
        }
        assert_eq!(clock.fps(), 0.0);
        clock.update(0.5);
        assert!((clock.fps() - 32.0).abs() < 1e-9);
    }
}
