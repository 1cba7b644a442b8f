//! Frame counting and FPS sampling for the window title.
//!
//! # Example
//!
//! ```ignore
//! use attractor::time::FrameStats;
//!
//! let mut stats = FrameStats::new();
//!
//! // Once per presented frame:
//! if stats.record_frame() {
//!     window.set_title(&stats.title("Lorenz"));
//! }
//! ```

use std::time::{Duration, Instant};

/// Frame counter with a periodically sampled FPS value.
#[derive(Debug)]
pub struct FrameStats {
    /// Total frames recorded.
    frame_count: u64,
    /// Last sampled FPS.
    fps: f32,
    /// Frame count at the last sample.
    fps_frame_count: u64,
    /// Time of the last sample.
    fps_update_time: Instant,
    /// How often FPS is resampled.
    fps_update_interval: Duration,
}

impl FrameStats {
    /// Start counting from now, sampling every 500 ms.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
        }
    }

    /// Record one frame. Returns `true` when the FPS value was resampled.
    pub fn record_frame(&mut self) -> bool {
        self.record_frame_at(Instant::now())
    }

    pub fn record_frame_at(&mut self, now: Instant) -> bool {
        self.frame_count += 1;

        let elapsed = now.duration_since(self.fps_update_time);
        if elapsed < self.fps_update_interval {
            return false;
        }

        let frames_since = self.frame_count - self.fps_frame_count;
        self.fps = frames_since as f32 / elapsed.as_secs_f32();
        self.fps_frame_count = self.frame_count;
        self.fps_update_time = now;
        true
    }

    /// Total frames recorded.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Last sampled frames per second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Window title with the FPS appended.
    pub fn title(&self, base: &str) -> String {
        format!("{} | {:.0} fps", base, self.fps)
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}
