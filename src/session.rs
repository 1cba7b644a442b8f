//! A running simulation bound to one GPU device.

use crate::error::SessionError;
use crate::gpu::pipeline::{AttractorPipeline, Phase};
use crate::gpu::state::StateSnapshot;
use crate::gpu::{DeviceHealth, GpuContext};
use crate::math::{Camera, CameraMatrices};
use crate::params::{ParameterSnapshot, StateDimensions, SurfaceSize};
use crate::shader::ShaderLibrary;

/// Owns the pipeline and its state for as long as the simulation runs.
///
/// Dropping the session releases both state textures and every program.
pub struct Session {
    pipeline: AttractorPipeline,
    camera: Camera,
    health: DeviceHealth,
    max_dimension: u32,
}

impl Session {
    /// Check capabilities, build every program and seed the state.
    pub fn new(
        context: &GpuContext,
        shaders: &ShaderLibrary,
        target_format: wgpu::TextureFormat,
        params: &ParameterSnapshot,
        camera: Camera,
    ) -> Result<Self, SessionError> {
        context.check_capabilities()?;

        let max_dimension = context.max_texture_dimension();
        let dims = StateDimensions::new(params.trail_size, params.vertex_size, max_dimension)?;

        let mut pipeline = AttractorPipeline::new(&context.device, &context.queue, shaders, target_format, dims)?;
        pipeline.initialize()?;

        Ok(Self {
            pipeline,
            camera,
            health: context.health(),
            max_dimension,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn phase(&self) -> Phase {
        self.pipeline.phase()
    }

    pub fn dimensions(&self) -> StateDimensions {
        self.pipeline.dimensions()
    }

    pub fn pipeline(&self) -> &AttractorPipeline {
        &self.pipeline
    }

    /// Advance one step with `params`.
    ///
    /// A change of `trail_size` or `vertex_size` rebuilds and reseeds the
    /// state before stepping.
    pub fn update(&mut self, params: &ParameterSnapshot) -> Result<(), SessionError> {
        self.health.check()?;

        let dims = StateDimensions::new(params.trail_size, params.vertex_size, self.max_dimension)?;
        if dims != self.pipeline.dimensions() {
            self.pipeline.resize_state(dims)?;
            self.pipeline.initialize()?;
        }

        self.pipeline.update(params)?;
        self.health.check()
    }

    /// Draw the current state into `target`.
    pub fn render(
        &mut self,
        target: &wgpu::TextureView,
        size: SurfaceSize,
        matrices: &CameraMatrices,
    ) -> Result<(), SessionError> {
        self.health.check()?;
        self.pipeline.render(target, size, matrices.view_projection)?;
        self.health.check()
    }

    /// Update then render, with camera matrices for `size`.
    pub fn frame(
        &mut self,
        params: &ParameterSnapshot,
        target: &wgpu::TextureView,
        size: SurfaceSize,
    ) -> Result<(), SessionError> {
        let matrices = self.camera.matrices(size.aspect());
        self.update(params)?;
        self.render(target, size, &matrices)
    }

    /// Copy the current state to the CPU.
    pub fn read_state(&self) -> Result<StateSnapshot, SessionError> {
        self.pipeline.read_state()
    }
}
