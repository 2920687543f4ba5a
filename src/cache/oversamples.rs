//! Frame-to-tick conversion.
//!
//! Continuous frame numbers map onto integer "ticks", the sample indices
//! that name physical cache files. The conversion is governed by a frame
//! rate, an oversampling count (samples per frame), and a tick resolution
//! (ticks per second); with the defaults of 24 fps, 1 sample per frame and
//! 6000 ticks per second, consecutive frames are 250 ticks apart.

/// Converts continuous frame numbers to bracketing sample ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OversamplesCalculator {
    frame_rate: f64,
    samples_per_frame: u32,
    ticks_per_second: u32,
}

impl Default for OversamplesCalculator {
    fn default() -> Self {
        Self {
            frame_rate: 24.0,
            samples_per_frame: 1,
            ticks_per_second: 6000,
        }
    }
}

impl OversamplesCalculator {
    /// Create a calculator; non-positive settings are clamped to their
    /// minimum useful values.
    pub fn new(frame_rate: f64, samples_per_frame: u32, ticks_per_second: u32) -> Self {
        Self {
            frame_rate: if frame_rate > 0.0 { frame_rate } else { 24.0 },
            samples_per_frame: samples_per_frame.max(1),
            ticks_per_second: ticks_per_second.max(1),
        }
    }

    /// Frames per second.
    #[inline]
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Samples per frame (oversampling count).
    #[inline]
    pub fn samples_per_frame(&self) -> u32 {
        self.samples_per_frame
    }

    /// Tick resolution per second.
    #[inline]
    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    /// Tick distance between consecutive samples.
    pub fn tick_step(&self) -> i64 {
        let step = self.ticks_per_second as f64 / (self.samples_per_frame as f64 * self.frame_rate);
        (step.round() as i64).max(1)
    }

    /// Nearest integer tick to a frame.
    pub fn frame_to_ticks(&self, frame: f64) -> i64 {
        (frame * self.ticks_per_second as f64 / self.frame_rate).round() as i64
    }

    /// Frame corresponding to a tick.
    pub fn ticks_to_frame(&self, tick: i64) -> f64 {
        tick as f64 * self.frame_rate / self.ticks_per_second as f64
    }

    /// Bracket a frame between two sample ticks, returning
    /// `(low, high, x)` where `x` in `[0, 1)` is the fractional position
    /// of the frame between them. Frames that land on a sample return
    /// `x == 0`.
    pub fn tick_interval(&self, frame: f64) -> (i64, i64, f64) {
        let step = self.tick_step() as f64;
        let mut t = frame * self.ticks_per_second as f64 / self.frame_rate;
        // Snap float noise so on-sample frames bracket exactly.
        let nearest = (t / step).round() * step;
        if (t - nearest).abs() < step * 1e-9 {
            t = nearest;
        }
        let low = (t / step).floor() * step;
        let x = (t - low) / step;
        (low as i64, (low + step) as i64, x)
    }

    /// Round a tick to the nearest sample tick.
    pub fn nearest_tick(&self, tick: i64) -> i64 {
        let step = self.tick_step();
        (tick as f64 / step as f64).round() as i64 * step
    }
}
