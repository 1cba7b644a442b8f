//! Per-frame inputs supplied by the host.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Parameters sampled once per frame.
///
/// `trail_size` is the number of history slots per particle (state texture
/// width) and `vertex_size` the number of particles (state texture height).
/// The four floats drive the Lorenz integration and are accepted as-is; a
/// diverging trajectory is a valid outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSnapshot {
    pub trail_size: u32,
    pub vertex_size: u32,
    /// Multiplier applied to `delta_time` to form the integration step.
    pub delta: f32,
    pub delta_time: f32,
    pub rho: f32,
    pub beta: f32,
}

impl ParameterSnapshot {
    pub const DEFAULT_TRAIL_SIZE: u32 = 256;
    pub const DEFAULT_VERTEX_SIZE: u32 = 4096;

    /// Integration step used by the update pass.
    pub fn step(&self) -> f32 {
        self.delta * self.delta_time
    }

    /// State texture dimensions requested by this snapshot.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.trail_size, self.vertex_size)
    }
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self {
            trail_size: Self::DEFAULT_TRAIL_SIZE,
            vertex_size: Self::DEFAULT_VERTEX_SIZE,
            delta: 1.0,
            delta_time: 0.005,
            rho: 28.0,
            beta: 8.0 / 3.0,
        }
    }
}

/// Validated state texture dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDimensions {
    trail_size: u32,
    vertex_size: u32,
}

impl StateDimensions {
    /// Check both sizes are in `1..=max_dimension`.
    pub fn new(trail_size: u32, vertex_size: u32, max_dimension: u32) -> Result<Self, SessionError> {
        let valid = |v: u32| v > 0 && v <= max_dimension;
        if !valid(trail_size) || !valid(vertex_size) {
            return Err(SessionError::InvalidDimensions {
                trail_size,
                vertex_size,
                max: max_dimension,
            });
        }
        Ok(Self {
            trail_size,
            vertex_size,
        })
    }

    /// History slots per particle.
    pub fn trail_size(&self) -> u32 {
        self.trail_size
    }

    /// Number of particles.
    pub fn vertex_size(&self) -> u32 {
        self.vertex_size
    }

    /// Texture extent: width is the history axis, height the particle axis.
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.trail_size,
            height: self.vertex_size,
            depth_or_array_layers: 1,
        }
    }

    pub fn texel_count(&self) -> usize {
        self.trail_size as usize * self.vertex_size as usize
    }

    /// Index of texel `(slot, particle)` in a tightly packed readback.
    pub fn texel_index(&self, slot: u32, particle: u32) -> usize {
        particle as usize * self.trail_size as usize + slot as usize
    }

    /// Draw counts for the instanced line-strip render.
    pub fn draw_counts(&self) -> DrawCounts {
        DrawCounts {
            vertices_per_instance: self.trail_size,
            instances: self.vertex_size,
        }
    }
}

/// Vertex and instance counts of the trail draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCounts {
    /// One vertex per history slot.
    pub vertices_per_instance: u32,
    /// One line strip per particle.
    pub instances: u32,
}

/// Size of the drawable surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height, or 1.0 for a degenerate surface.
    pub fn aspect(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for SurfaceSize {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// Supplies one parameter snapshot per frame.
pub trait ParameterSource {
    fn snapshot(&mut self) -> ParameterSnapshot;
}

/// A fixed snapshot, returned unchanged every frame.
impl ParameterSource for ParameterSnapshot {
    fn snapshot(&mut self) -> ParameterSnapshot {
        *self
    }
}
