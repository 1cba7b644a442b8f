//! Initialize, Update and Render passes over the state pair.

use std::ops::Range;

use glam::Mat4;

use crate::error::SessionError;
use crate::gpu::state::{StatePair, StateSnapshot};
use crate::gpu::STATE_FORMAT;
use crate::params::{ParameterSnapshot, StateDimensions, SurfaceSize};
use crate::program::{self, Program, ProgramTarget, UniformHandle, UniformSlot, UniformTable};
use crate::shader::{ShaderLibrary, ShaderName};

/// A pass of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Initialize,
    Update,
    Render,
}

/// Where the pipeline is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// State textures exist but hold nothing meaningful.
    Uninitialized,
    /// Initialize has run; no step taken yet.
    Seeded,
    /// At least one Update has run.
    Updated,
}

impl Phase {
    pub fn allows(self, pass: Pass) -> bool {
        matches!(
            (self, pass),
            (Phase::Uninitialized, Pass::Initialize)
                | (Phase::Seeded, Pass::Update)
                | (Phase::Updated, Pass::Update)
                | (Phase::Updated, Pass::Render)
        )
    }

    /// Phase after `pass` completes.
    pub fn after(self, pass: Pass) -> Phase {
        match pass {
            Pass::Initialize => Phase::Seeded,
            Pass::Update => Phase::Updated,
            Pass::Render => self,
        }
    }
}

/// Inputs of the update program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateUniform {
    PositionTexture,
    Delta,
    DeltaTime,
    Rho,
    Beta,
}

impl UniformSlot for UpdateUniform {
    const ALL: &'static [Self] = &[
        UpdateUniform::PositionTexture,
        UpdateUniform::Delta,
        UpdateUniform::DeltaTime,
        UpdateUniform::Rho,
        UpdateUniform::Beta,
    ];

    fn name(self) -> &'static str {
        match self {
            UpdateUniform::PositionTexture => "position_texture",
            UpdateUniform::Delta => "delta",
            UpdateUniform::DeltaTime => "delta_time",
            UpdateUniform::Rho => "rho",
            UpdateUniform::Beta => "beta",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Inputs of the render program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderUniform {
    PositionTexture,
    ViewProj,
}

impl UniformSlot for RenderUniform {
    const ALL: &'static [Self] = &[RenderUniform::PositionTexture, RenderUniform::ViewProj];

    fn name(self) -> &'static str {
        match self {
            RenderUniform::PositionTexture => "position_texture",
            RenderUniform::ViewProj => "view_proj",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Additive blending used for the trails.
pub fn additive_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

/// A program plus its resolved slots and one bind group set per state buffer.
struct Stage<S: UniformSlot> {
    program: Program,
    uniforms: UniformTable<S>,
    /// `bindings[i]` samples state buffer `i`.
    bindings: [Vec<wgpu::BindGroup>; 2],
}

impl<S: UniformSlot> Stage<S> {
    fn build(
        device: &wgpu::Device,
        shaders: &ShaderLibrary,
        label: &str,
        vertex: ShaderName,
        fragment: ShaderName,
        target: &ProgramTarget,
        state: &StatePair,
    ) -> Result<Self, SessionError> {
        let (vs, fs) = shaders.pair(vertex, fragment)?;
        let program = program::compile(device, label, vs, fs, target)?;
        let uniforms = UniformTable::<S>::resolve(program.interface());

        let absent = uniforms.absent();
        if !absent.is_empty() {
            log::debug!("'{}' does not use {:?}", label, absent);
        }

        let bindings = bind_state(device, &program, state)?;
        Ok(Self {
            program,
            uniforms,
            bindings,
        })
    }

    fn set(&mut self, slot: S, value: impl Into<program::UniformValue>) {
        let handle = self.uniforms.get(slot);
        self.program.set_uniform(handle, value);
    }
}

fn bind_state(
    device: &wgpu::Device,
    program: &Program,
    state: &StatePair,
) -> Result<[Vec<wgpu::BindGroup>; 2], SessionError> {
    Ok([
        program.create_bind_groups(device, Some(state.get(0).view()))?,
        program.create_bind_groups(device, Some(state.get(1).view()))?,
    ])
}

/// Encode and submit one render pass drawing `program` into `target`.
#[allow(clippy::too_many_arguments)]
fn submit_pass(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    program: &Program,
    bind_groups: &[wgpu::BindGroup],
    target: &wgpu::TextureView,
    viewport: Option<SurfaceSize>,
    vertices: Range<u32>,
    instances: Range<u32>,
) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some(label),
    });

    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Some(size) = viewport {
            pass.set_viewport(0.0, 0.0, size.width as f32, size.height as f32, 0.0, 1.0);
        }
        pass.set_pipeline(program.pipeline());
        for (index, group) in bind_groups.iter().enumerate() {
            pass.set_bind_group(index as u32, group, &[]);
        }
        pass.draw(vertices, instances);
    }

    queue.submit(Some(encoder.finish()));
}

const QUAD_VERTICES: Range<u32> = 0..6;

/// The three programs and the state pair they run over.
pub struct AttractorPipeline {
    device: wgpu::Device,
    queue: wgpu::Queue,
    state: StatePair,
    init: Program,
    init_bindings: Vec<wgpu::BindGroup>,
    update: Stage<UpdateUniform>,
    render: Stage<RenderUniform>,
    phase: Phase,
}

impl AttractorPipeline {
    /// Build all programs and allocate the state pair. Nothing is drawn yet.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shaders: &ShaderLibrary,
        surface_format: wgpu::TextureFormat,
        dims: StateDimensions,
    ) -> Result<Self, SessionError> {
        let state = StatePair::create(device, dims);

        let state_target = ProgramTarget {
            format: STATE_FORMAT,
            blend: None,
            topology: wgpu::PrimitiveTopology::TriangleList,
        };
        let trail_target = ProgramTarget {
            format: surface_format,
            blend: Some(additive_blend()),
            topology: wgpu::PrimitiveTopology::LineStrip,
        };

        let (vs, fs) = shaders.pair(ShaderName::InitVertex, ShaderName::InitFragment)?;
        let init = program::compile(device, "Init", vs, fs, &state_target)?;
        let init_bindings = init.create_bind_groups(device, None)?;

        let update = Stage::build(
            device,
            shaders,
            "Update",
            ShaderName::UpdateVertex,
            ShaderName::UpdateFragment,
            &state_target,
            &state,
        )?;
        let render = Stage::build(
            device,
            shaders,
            "Render",
            ShaderName::RenderVertex,
            ShaderName::RenderFragment,
            &trail_target,
            &state,
        )?;

        log::info!(
            "Pipeline ready: {} particles x {} trail slots",
            dims.vertex_size(),
            dims.trail_size()
        );

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            state,
            init,
            init_bindings,
            update,
            render,
            phase: Phase::Uninitialized,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn dimensions(&self) -> StateDimensions {
        self.state.dimensions()
    }

    pub fn state(&self) -> &StatePair {
        &self.state
    }

    fn begin(&self, pass: Pass) -> Result<(), SessionError> {
        if self.phase.allows(pass) {
            Ok(())
        } else {
            Err(SessionError::PassOutOfOrder {
                pass,
                phase: self.phase,
            })
        }
    }

    /// Reallocate the state pair for new dimensions. The pipeline must be
    /// initialized again afterwards.
    pub fn resize_state(&mut self, dims: StateDimensions) -> Result<(), SessionError> {
        if dims == self.state.dimensions() {
            return Ok(());
        }
        self.state.recreate(&self.device, dims);
        self.update.bindings = bind_state(&self.device, &self.update.program, &self.state)?;
        self.render.bindings = bind_state(&self.device, &self.render.program, &self.state)?;
        self.phase = Phase::Uninitialized;
        log::info!(
            "State resized to {} particles x {} trail slots",
            dims.vertex_size(),
            dims.trail_size()
        );
        Ok(())
    }

    /// Seed every particle into the Write texture, then swap.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        self.begin(Pass::Initialize)?;

        submit_pass(
            &self.device,
            &self.queue,
            "Initialize Pass",
            &self.init,
            &self.init_bindings,
            self.state.write().view(),
            None,
            QUAD_VERTICES,
            0..1,
        );

        self.state.swap();
        self.phase = self.phase.after(Pass::Initialize);
        Ok(())
    }

    /// Advance the simulation one step from Read into Write, then swap.
    pub fn update(&mut self, params: &ParameterSnapshot) -> Result<(), SessionError> {
        self.begin(Pass::Update)?;

        self.update.set(UpdateUniform::Delta, params.delta);
        self.update.set(UpdateUniform::DeltaTime, params.delta_time);
        self.update.set(UpdateUniform::Rho, params.rho);
        self.update.set(UpdateUniform::Beta, params.beta);
        self.update.program.flush(&self.queue);

        submit_pass(
            &self.device,
            &self.queue,
            "Update Pass",
            &self.update.program,
            &self.update.bindings[self.state.read_index()],
            self.state.write().view(),
            None,
            QUAD_VERTICES,
            0..1,
        );

        self.state.swap();
        self.phase = self.phase.after(Pass::Update);
        Ok(())
    }

    /// Draw the trails stored in the Read texture into `target`.
    pub fn render(&mut self, target: &wgpu::TextureView, size: SurfaceSize, view_proj: Mat4) -> Result<(), SessionError> {
        self.begin(Pass::Render)?;

        self.render.set(RenderUniform::ViewProj, view_proj);
        self.render.program.flush(&self.queue);

        let counts = self.state.dimensions().draw_counts();
        let viewport = (!size.is_empty()).then_some(size);

        submit_pass(
            &self.device,
            &self.queue,
            "Render Pass",
            &self.render.program,
            &self.render.bindings[self.state.read_index()],
            target,
            viewport,
            0..counts.vertices_per_instance,
            0..counts.instances,
        );

        Ok(())
    }

    /// Handle through which the render pass reads state.
    pub fn render_handle(&self, slot: RenderUniform) -> UniformHandle {
        self.render.uniforms.get(slot)
    }

    /// Handle through which the update pass reads state and parameters.
    pub fn update_handle(&self, slot: UpdateUniform) -> UniformHandle {
        self.update.uniforms.get(slot)
    }

    /// Copy the current (Read) state to the CPU.
    pub fn read_state(&self) -> Result<StateSnapshot, SessionError> {
        Ok(self.state.read_back(&self.device, &self.queue)?)
    }
}
