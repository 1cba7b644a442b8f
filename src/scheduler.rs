//! Per-frame driver: snapshot, camera, update, render.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SessionError;
use crate::params::{ParameterSource, SurfaceSize};
use crate::session::Session;
use crate::time::FrameStats;

/// Cloneable request to stop the frame loop.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was drawn; request the next one.
    Continue,
    /// Stop was requested; nothing was drawn.
    Stopped,
}

/// Runs one frame per display refresh.
pub struct FrameScheduler<P: ParameterSource> {
    source: P,
    stop: StopHandle,
    stats: FrameStats,
    fps_sampled: bool,
}

impl<P: ParameterSource> FrameScheduler<P> {
    pub fn new(source: P) -> Self {
        Self::with_stop_handle(source, StopHandle::new())
    }

    /// Scheduler that stops when `stop` is triggered.
    pub fn with_stop_handle(source: P, stop: StopHandle) -> Self {
        Self {
            source,
            stop,
            stats: FrameStats::new(),
            fps_sampled: false,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut P {
        &mut self.source
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// FPS value, if it was resampled since the last call.
    pub fn take_fps_sample(&mut self) -> Option<f32> {
        std::mem::replace(&mut self.fps_sampled, false).then(|| self.stats.fps())
    }

    /// Draw one frame into `target`.
    ///
    /// Reads the parameter snapshot, computes the camera for `size`, runs
    /// Update and then Render. The caller requests the next redraw on
    /// [`TickOutcome::Continue`].
    pub fn tick(
        &mut self,
        session: &mut Session,
        target: &wgpu::TextureView,
        size: SurfaceSize,
    ) -> Result<TickOutcome, SessionError> {
        if self.stop.is_stopped() {
            return Ok(TickOutcome::Stopped);
        }

        let params = self.source.snapshot();
        let matrices = session.camera().matrices(size.aspect());

        session.update(&params)?;
        session.render(target, size, &matrices)?;

        self.fps_sampled |= self.stats.record_frame();
        Ok(TickOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSnapshot;

    #[test]
    fn test_stop_handle_is_shared() {
        let scheduler = FrameScheduler::new(ParameterSnapshot::default());
        let handle = scheduler.stop_handle();
        let other = handle.clone();
        assert!(!handle.is_stopped());
        other.stop();
        assert!(handle.is_stopped());
        assert!(scheduler.stop_handle().is_stopped());
    }

    #[test]
    fn test_source_is_mutable() {
        let mut scheduler = FrameScheduler::new(ParameterSnapshot::default());
        scheduler.source_mut().rho = 14.0;
        assert_eq!(scheduler.source().rho, 14.0);
        assert_eq!(scheduler.stats().frame(), 0);
        assert_eq!(scheduler.take_fps_sample(), None);
    }
}
