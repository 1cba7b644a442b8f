//! Program manager: turns a vertex + fragment WGSL pair into a render
//! pipeline and exposes its uniform inputs as typed handles.
//!
//! Linking happens in two steps. [`link`] parses and validates both stages
//! with naga, checks that every fragment input is fed by a vertex output and
//! reflects the resources the entry points actually use. [`compile`] then
//! builds the wgpu pipeline from that interface with an explicit bind group
//! layout, catching any remaining validation failure as a link error.
//!
//! Uniform lookup is permissive: a name the program does not declare resolves
//! to [`UniformHandle::Absent`], and setting an absent handle does nothing.

use std::collections::HashMap;
use std::marker::PhantomData;

use glam::{Mat4, Vec4};
use naga::front::wgsl;
use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};
use naga::TypeInner;
use wgpu::util::DeviceExt;

use crate::error::ShaderError;
use crate::shader::StageKind;

/// Type of a settable value inside a uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    F32,
    U32,
    Vec4,
    Mat4,
}

impl UniformKind {
    /// Byte size of the value in the block.
    pub fn byte_size(self) -> usize {
        match self {
            UniformKind::F32 | UniformKind::U32 => 4,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
        }
    }
}

/// A value that can be written through a [`UniformHandle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    F32(f32),
    U32(u32),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::F32(_) => UniformKind::F32,
            UniformValue::U32(_) => UniformKind::U32,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn write_into(&self, dst: &mut [u8]) {
        match self {
            UniformValue::F32(v) => dst.copy_from_slice(&v.to_le_bytes()),
            UniformValue::U32(v) => dst.copy_from_slice(&v.to_le_bytes()),
            UniformValue::Vec4(v) => dst.copy_from_slice(bytemuck::bytes_of(&v.to_array())),
            UniformValue::Mat4(m) => dst.copy_from_slice(bytemuck::bytes_of(&m.to_cols_array())),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::F32(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::U32(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Opaque reference to a named program input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformHandle {
    /// The program does not declare (or never uses) this name.
    Absent,
    /// A member of the program's uniform block.
    Value { offset: u32, kind: UniformKind },
    /// A sampled texture binding.
    Texture { group: u32, binding: u32 },
}

impl UniformHandle {
    pub fn is_absent(&self) -> bool {
        matches!(self, UniformHandle::Absent)
    }
}

/// A settable member of a uniform block.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub kind: UniformKind,
}

/// What a resource binding holds.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceKind {
    /// `var<uniform>` struct; `size` is the struct span in bytes.
    UniformBlock { size: u32, members: Vec<UniformMember> },
    /// `texture_2d<f32>` read with `textureLoad`.
    Texture,
}

/// A resource bound at `@group(group) @binding(binding)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: ResourceKind,
    pub visibility: wgpu::ShaderStages,
}

/// Reflected interface of a linked vertex + fragment pair.
#[derive(Debug, Clone)]
pub struct ProgramInterface {
    label: String,
    vertex_entry: String,
    fragment_entry: String,
    resources: Vec<ResourceBinding>,
}

impl ProgramInterface {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn vertex_entry(&self) -> &str {
        &self.vertex_entry
    }

    pub fn fragment_entry(&self) -> &str {
        &self.fragment_entry
    }

    /// Resources used by either stage, sorted by group then binding.
    pub fn resources(&self) -> &[ResourceBinding] {
        &self.resources
    }

    /// Number of bind groups the pipeline layout needs.
    pub fn group_count(&self) -> u32 {
        self.resources.iter().map(|r| r.group + 1).max().unwrap_or(0)
    }

    fn uniform_block(&self) -> Option<(&ResourceBinding, u32)> {
        self.resources.iter().find_map(|r| match r.kind {
            ResourceKind::UniformBlock { size, .. } => Some((r, size)),
            ResourceKind::Texture => None,
        })
    }

    /// Look up one input by name.
    pub fn resolve(&self, name: &str) -> UniformHandle {
        for res in &self.resources {
            match &res.kind {
                ResourceKind::UniformBlock { members, .. } => {
                    if let Some(m) = members.iter().find(|m| m.name == name) {
                        return UniformHandle::Value {
                            offset: m.offset,
                            kind: m.kind,
                        };
                    }
                }
                ResourceKind::Texture => {
                    if res.name == name {
                        return UniformHandle::Texture {
                            group: res.group,
                            binding: res.binding,
                        };
                    }
                }
            }
        }
        UniformHandle::Absent
    }

    /// Look up a set of names. Unknown names map to [`UniformHandle::Absent`].
    pub fn resolve_uniforms(&self, names: &[&str]) -> HashMap<String, UniformHandle> {
        names
            .iter()
            .map(|name| (name.to_string(), self.resolve(name)))
            .collect()
    }
}

/// A closed set of uniform names a pass sets every frame.
///
/// Implemented by small enums so the per-frame path indexes a table instead of
/// looking up strings.
pub trait UniformSlot: Copy + 'static {
    /// Every slot, in `index()` order.
    const ALL: &'static [Self];

    /// Name of the input in shader source.
    fn name(self) -> &'static str;

    /// Position of the slot in `ALL`.
    fn index(self) -> usize;
}

/// Handles for every slot of `S`, resolved once when the program is built.
#[derive(Debug, Clone)]
pub struct UniformTable<S: UniformSlot> {
    handles: Vec<UniformHandle>,
    _slot: PhantomData<S>,
}

impl<S: UniformSlot> UniformTable<S> {
    pub fn resolve(interface: &ProgramInterface) -> Self {
        let handles = S::ALL.iter().map(|slot| interface.resolve(slot.name())).collect();
        Self {
            handles,
            _slot: PhantomData,
        }
    }

    pub fn get(&self, slot: S) -> UniformHandle {
        self.handles
            .get(slot.index())
            .copied()
            .unwrap_or(UniformHandle::Absent)
    }

    /// Slots the program does not declare.
    pub fn absent(&self) -> Vec<&'static str> {
        S::ALL
            .iter()
            .filter(|slot| self.get(**slot).is_absent())
            .map(|slot| slot.name())
            .collect()
    }
}

/// Render target description for a program's pipeline.
#[derive(Debug, Clone)]
pub struct ProgramTarget {
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
    pub topology: wgpu::PrimitiveTopology,
}

struct CompiledStage {
    module: naga::Module,
    info: ModuleInfo,
    entry: usize,
}

impl CompiledStage {
    fn entry_name(&self) -> String {
        self.module.entry_points[self.entry].name.clone()
    }
}

fn compile_stage(program: &str, stage: StageKind, source: &str) -> Result<CompiledStage, ShaderError> {
    let module = wgsl::parse_str(source).map_err(|err| ShaderError::Compile {
        program: program.to_string(),
        stage,
        log: err.emit_to_string(source),
    })?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    let info = validator.validate(&module).map_err(|err| ShaderError::Compile {
        program: program.to_string(),
        stage,
        log: err.emit_to_string(source),
    })?;

    let naga_stage = match stage {
        StageKind::Vertex => naga::ShaderStage::Vertex,
        StageKind::Fragment => naga::ShaderStage::Fragment,
    };
    let entry = module
        .entry_points
        .iter()
        .position(|ep| ep.stage == naga_stage)
        .ok_or_else(|| ShaderError::Link {
            program: program.to_string(),
            log: format!("{} source has no @{} entry point", stage, stage),
        })?;

    Ok(CompiledStage { module, info, entry })
}

/// Collect `@location` bindings reachable from one argument or result.
fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<(u32, TypeInner)>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.push((*location, module.types[ty].inner.clone()));
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn check_varyings(program: &str, vertex: &CompiledStage, fragment: &CompiledStage) -> Result<(), ShaderError> {
    let mut outputs = Vec::new();
    let vs = &vertex.module.entry_points[vertex.entry].function;
    if let Some(result) = &vs.result {
        collect_locations(&vertex.module, result.ty, result.binding.as_ref(), &mut outputs);
    }

    let mut inputs = Vec::new();
    let fs = &fragment.module.entry_points[fragment.entry].function;
    for arg in &fs.arguments {
        collect_locations(&fragment.module, arg.ty, arg.binding.as_ref(), &mut inputs);
    }

    for (location, ty) in &inputs {
        match outputs.iter().find(|(l, _)| l == location) {
            None => {
                return Err(ShaderError::Link {
                    program: program.to_string(),
                    log: format!("fragment input @location({}) has no matching vertex output", location),
                })
            }
            Some((_, out_ty)) if out_ty != ty => {
                return Err(ShaderError::Link {
                    program: program.to_string(),
                    log: format!(
                        "@location({}) is {:?} in the vertex stage but {:?} in the fragment stage",
                        location, out_ty, ty
                    ),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    match *inner {
        TypeInner::Scalar(s) if s == naga::Scalar::F32 => Some(UniformKind::F32),
        TypeInner::Scalar(s) if s == naga::Scalar::U32 => Some(UniformKind::U32),
        TypeInner::Vector {
            size: naga::VectorSize::Quad,
            scalar,
        } if scalar == naga::Scalar::F32 => Some(UniformKind::Vec4),
        TypeInner::Matrix {
            columns: naga::VectorSize::Quad,
            rows: naga::VectorSize::Quad,
            scalar,
        } if scalar == naga::Scalar::F32 => Some(UniformKind::Mat4),
        _ => None,
    }
}

fn reflect_members(module: &naga::Module, members: &[naga::StructMember]) -> Vec<UniformMember> {
    members
        .iter()
        .filter_map(|m| {
            let name = m.name.clone()?;
            let kind = uniform_kind(&module.types[m.ty].inner)?;
            Some(UniformMember {
                name,
                offset: m.offset,
                kind,
            })
        })
        .collect()
}

/// Resources statically used by the stage's entry point.
fn reflect_resources(
    program: &str,
    stage: &CompiledStage,
    visibility: wgpu::ShaderStages,
) -> Result<Vec<ResourceBinding>, ShaderError> {
    let ep_info = stage.info.get_entry_point(stage.entry);
    let mut resources = Vec::new();

    for (handle, var) in stage.module.global_variables.iter() {
        if ep_info[handle].is_empty() {
            continue;
        }
        let Some(binding) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();

        let kind = match (var.space, &stage.module.types[var.ty].inner) {
            (naga::AddressSpace::Uniform, TypeInner::Struct { members, span }) => ResourceKind::UniformBlock {
                size: *span,
                members: reflect_members(&stage.module, members),
            },
            (
                naga::AddressSpace::Handle,
                TypeInner::Image {
                    dim: naga::ImageDimension::D2,
                    arrayed: false,
                    class:
                        naga::ImageClass::Sampled {
                            kind: naga::ScalarKind::Float,
                            multi: false,
                        },
                },
            ) => ResourceKind::Texture,
            _ => {
                return Err(ShaderError::Link {
                    program: program.to_string(),
                    log: format!(
                        "'{}' at @group({}) @binding({}) must be a uniform struct or a texture_2d<f32>",
                        name, binding.group, binding.binding
                    ),
                })
            }
        };

        resources.push(ResourceBinding {
            name,
            group: binding.group,
            binding: binding.binding,
            kind,
            visibility,
        });
    }

    Ok(resources)
}

fn merge_resources(
    program: &str,
    mut merged: Vec<ResourceBinding>,
    fragment: Vec<ResourceBinding>,
) -> Result<Vec<ResourceBinding>, ShaderError> {
    for res in fragment {
        match merged
            .iter_mut()
            .find(|r| r.group == res.group && r.binding == res.binding)
        {
            Some(existing) if existing.kind != res.kind => {
                return Err(ShaderError::Link {
                    program: program.to_string(),
                    log: format!(
                        "stages disagree on @group({}) @binding({}) ('{}' vs '{}')",
                        res.group, res.binding, existing.name, res.name
                    ),
                })
            }
            Some(existing) => existing.visibility |= res.visibility,
            None => merged.push(res),
        }
    }

    let blocks = merged
        .iter()
        .filter(|r| matches!(r.kind, ResourceKind::UniformBlock { .. }))
        .count();
    if blocks > 1 {
        return Err(ShaderError::Link {
            program: program.to_string(),
            log: format!("{} uniform blocks declared, at most one is supported", blocks),
        });
    }

    merged.sort_by_key(|r| (r.group, r.binding));
    Ok(merged)
}

/// Compile both stages and link their interfaces, without touching the GPU.
pub fn link(label: &str, vertex_source: &str, fragment_source: &str) -> Result<ProgramInterface, ShaderError> {
    let vertex = compile_stage(label, StageKind::Vertex, vertex_source)?;
    let fragment = compile_stage(label, StageKind::Fragment, fragment_source)?;

    check_varyings(label, &vertex, &fragment)?;

    let vertex_resources = reflect_resources(label, &vertex, wgpu::ShaderStages::VERTEX)?;
    let fragment_resources = reflect_resources(label, &fragment, wgpu::ShaderStages::FRAGMENT)?;
    let resources = merge_resources(label, vertex_resources, fragment_resources)?;

    Ok(ProgramInterface {
        label: label.to_string(),
        vertex_entry: vertex.entry_name(),
        fragment_entry: fragment.entry_name(),
        resources,
    })
}

/// CPU copy of a uniform block, written through handles and flushed once
/// per pass.
#[derive(Debug, Clone)]
pub struct UniformData {
    bytes: Vec<u8>,
    dirty: bool,
}

impl UniformData {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
            dirty: true,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write `value` at `offset`. Returns `false` if it does not fit.
    pub fn write(&mut self, offset: u32, value: UniformValue) -> bool {
        let start = offset as usize;
        let end = start + value.kind().byte_size();
        match self.bytes.get_mut(start..end) {
            Some(dst) => {
                value.write_into(dst);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

struct UniformBlock {
    group: u32,
    binding: u32,
    data: UniformData,
    buffer: wgpu::Buffer,
}

impl Drop for UniformBlock {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

/// A linked program: pipeline, layouts and uniform storage.
pub struct Program {
    interface: ProgramInterface,
    pipeline: wgpu::RenderPipeline,
    bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    uniforms: Option<UniformBlock>,
}

impl Program {
    pub fn label(&self) -> &str {
        self.interface.label()
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn resolve(&self, name: &str) -> UniformHandle {
        self.interface.resolve(name)
    }

    /// Map each name to its handle, absent names included.
    pub fn resolve_uniforms(&self, names: &[&str]) -> HashMap<String, UniformHandle> {
        self.interface.resolve_uniforms(names)
    }

    /// Stage a uniform value. Absent handles are ignored.
    pub fn set_uniform(&mut self, handle: UniformHandle, value: impl Into<UniformValue>) {
        let value = value.into();
        match handle {
            UniformHandle::Absent => {}
            UniformHandle::Texture { group, binding } => {
                log::warn!(
                    "'{}': @group({}) @binding({}) is a texture and cannot take {:?}",
                    self.label(),
                    group,
                    binding,
                    value
                );
            }
            UniformHandle::Value { offset, kind } => {
                if kind != value.kind() {
                    log::warn!(
                        "'{}': uniform at offset {} is {:?}, got {:?}",
                        self.label(),
                        offset,
                        kind,
                        value.kind()
                    );
                    return;
                }
                if let Some(block) = &mut self.uniforms {
                    block.data.write(offset, value);
                }
            }
        }
    }

    /// Upload staged uniform values if any changed.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        if let Some(block) = &mut self.uniforms {
            if block.data.take_dirty() {
                queue.write_buffer(&block.buffer, 0, block.data.bytes());
            }
        }
    }

    /// Bind groups for every group of the layout, with `texture` bound at
    /// each texture slot.
    pub fn create_bind_groups(
        &self,
        device: &wgpu::Device,
        texture: Option<&wgpu::TextureView>,
    ) -> Result<Vec<wgpu::BindGroup>, ShaderError> {
        let mut groups = Vec::with_capacity(self.bind_group_layouts.len());

        for (group, layout) in self.bind_group_layouts.iter().enumerate() {
            let mut entries = Vec::new();
            for res in self.interface.resources.iter().filter(|r| r.group == group as u32) {
                let resource = match res.kind {
                    ResourceKind::UniformBlock { .. } => match &self.uniforms {
                        Some(block) if block.group == res.group && block.binding == res.binding => {
                            block.buffer.as_entire_binding()
                        }
                        _ => {
                            return Err(ShaderError::Link {
                                program: self.label().to_string(),
                                log: format!("no uniform storage for '{}'", res.name),
                            })
                        }
                    },
                    ResourceKind::Texture => match texture {
                        Some(view) => wgpu::BindingResource::TextureView(view),
                        None => {
                            return Err(ShaderError::Link {
                                program: self.label().to_string(),
                                log: format!("texture '{}' has nothing bound", res.name),
                            })
                        }
                    },
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: res.binding,
                    resource,
                });
            }

            groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{} Bind Group {}", self.label(), group)),
                layout,
                entries: &entries,
            }));
        }

        Ok(groups)
    }
}

fn layout_entry(res: &ResourceBinding) -> wgpu::BindGroupLayoutEntry {
    let ty = match res.kind {
        ResourceKind::UniformBlock { size, .. } => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size as u64),
        },
        // Float state textures are not filterable; they are only read with textureLoad
        ResourceKind::Texture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
    };
    wgpu::BindGroupLayoutEntry {
        binding: res.binding,
        visibility: res.visibility,
        ty,
        count: None,
    }
}

/// Hand one stage to the device. Sources naga accepts can still use
/// features the device lacks; those come back as compile errors.
fn create_module(
    device: &wgpu::Device,
    program: &str,
    stage: StageKind,
    source: &str,
) -> Result<wgpu::ShaderModule, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{} {} Shader", program, stage)),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(ShaderError::Compile {
            program: program.to_string(),
            stage,
            log: err.to_string(),
        }),
        None => Ok(module),
    }
}

/// Compile, link and build the GPU pipeline for one program.
pub fn compile(
    device: &wgpu::Device,
    label: &str,
    vertex_source: &str,
    fragment_source: &str,
    target: &ProgramTarget,
) -> Result<Program, ShaderError> {
    let interface = link(label, vertex_source, fragment_source)?;
    let vertex_module = create_module(device, label, StageKind::Vertex, vertex_source)?;
    let fragment_module = create_module(device, label, StageKind::Fragment, fragment_source)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let bind_group_layouts: Vec<wgpu::BindGroupLayout> = (0..interface.group_count())
        .map(|group| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = interface
                .resources
                .iter()
                .filter(|r| r.group == group)
                .map(layout_entry)
                .collect();
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{} Bind Group Layout {}", label, group)),
                entries: &entries,
            })
        })
        .collect();
    let layout_refs: Vec<&wgpu::BindGroupLayout> = bind_group_layouts.iter().collect();


    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{} Pipeline Layout", label)),
        bind_group_layouts: &layout_refs,
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{} Pipeline", label)),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some(interface.vertex_entry()),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some(interface.fragment_entry()),
            targets: &[Some(wgpu::ColorTargetState {
                format: target.format,
                blend: target.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: target.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(ShaderError::Link {
            program: label.to_string(),
            log: err.to_string(),
        });
    }

    let uniforms = interface.uniform_block().map(|(res, size)| {
        let data = UniformData::new(size as usize);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Uniform Buffer", label)),
            contents: data.bytes(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        UniformBlock {
            group: res.group,
            binding: res.binding,
            data,
            buffer,
        }
    });

    log::debug!(
        "linked '{}' ({} resources, {} bind groups)",
        label,
        interface.resources.len(),
        bind_group_layouts.len()
    );

    Ok(Program {
        interface,
        pipeline,
        bind_group_layouts,
        uniforms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{FULLSCREEN_VERTEX, INIT_FRAGMENT, RENDER_FRAGMENT, RENDER_VERTEX, UPDATE_FRAGMENT};

    #[test]
    fn test_builtin_programs_link() {
        assert!(link("init", FULLSCREEN_VERTEX, INIT_FRAGMENT).is_ok());
        assert!(link("update", FULLSCREEN_VERTEX, UPDATE_FRAGMENT).is_ok());
        assert!(link("render", RENDER_VERTEX, RENDER_FRAGMENT).is_ok());
    }

    #[test]
    fn test_init_program_reads_no_texture() {
        let iface = link("init", FULLSCREEN_VERTEX, INIT_FRAGMENT).unwrap();
        assert!(iface.resources().is_empty());
        assert_eq!(iface.group_count(), 0);
    }

    #[test]
    fn test_update_uniforms_resolve_to_block_offsets() {
        let iface = link("update", FULLSCREEN_VERTEX, UPDATE_FRAGMENT).unwrap();
        let map = iface.resolve_uniforms(&["delta", "delta_time", "rho", "beta", "position_texture"]);

        assert_eq!(map["delta"], UniformHandle::Value { offset: 0, kind: UniformKind::F32 });
        assert_eq!(map["delta_time"], UniformHandle::Value { offset: 4, kind: UniformKind::F32 });
        assert_eq!(map["rho"], UniformHandle::Value { offset: 8, kind: UniformKind::F32 });
        assert_eq!(map["beta"], UniformHandle::Value { offset: 12, kind: UniformKind::F32 });
        assert_eq!(map["position_texture"], UniformHandle::Texture { group: 0, binding: 0 });
    }

    #[test]
    fn test_render_uniforms_and_visibility() {
        let iface = link("render", RENDER_VERTEX, RENDER_FRAGMENT).unwrap();
        assert_eq!(
            iface.resolve("view_proj"),
            UniformHandle::Value { offset: 0, kind: UniformKind::Mat4 }
        );
        for res in iface.resources() {
            assert_eq!(res.visibility, wgpu::ShaderStages::VERTEX);
        }
    }

    #[test]
    fn test_unknown_name_is_absent() {
        let iface = link("render", RENDER_VERTEX, RENDER_FRAGMENT).unwrap();
        assert!(iface.resolve("uPositiontexture").is_absent());
        let map = iface.resolve_uniforms(&["missing"]);
        assert_eq!(map["missing"], UniformHandle::Absent);
    }

    #[test]
    fn test_malformed_source_is_compile_error() {
        let broken = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0 }";
        match link("broken", FULLSCREEN_VERTEX, broken) {
            Err(ShaderError::Compile { stage, log, .. }) => {
                assert_eq!(stage, StageKind::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_type_error_is_compile_error() {
        let bad = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    let x: f32 = 1u;
    return vec4<f32>(x);
}
"#;
        assert!(matches!(
            link("typed", FULLSCREEN_VERTEX, bad),
            Err(ShaderError::Compile { stage: StageKind::Fragment, .. })
        ));
    }

    #[test]
    fn test_unfed_fragment_input_is_link_error() {
        let fragment = r#"
@fragment
fn fs_main(@location(3) color: vec4<f32>) -> @location(0) vec4<f32> {
    return color;
}
"#;
        assert!(matches!(
            link("unfed", FULLSCREEN_VERTEX, fragment),
            Err(ShaderError::Link { .. })
        ));
    }

    #[test]
    fn test_varying_type_mismatch_is_link_error() {
        let fragment = r#"
@fragment
fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(color, 1.0);
}
"#;
        assert!(matches!(
            link("mismatch", RENDER_VERTEX, fragment),
            Err(ShaderError::Link { .. })
        ));
    }

    #[test]
    fn test_missing_entry_point_is_link_error() {
        let no_fragment = "fn helper() -> f32 { return 1.0; }";
        assert!(matches!(
            link("no_entry", FULLSCREEN_VERTEX, no_fragment),
            Err(ShaderError::Link { .. })
        ));
    }

    #[test]
    fn test_unused_bindings_are_not_reflected() {
        let fragment = r#"
struct Params { gain: f32 };
@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;
        let iface = link("unused", FULLSCREEN_VERTEX, fragment).unwrap();
        assert!(iface.resources().is_empty());
        assert!(iface.resolve("gain").is_absent());
    }

    #[test]
    fn test_uniform_data_writes_and_bounds() {
        let mut data = UniformData::new(16);
        assert!(data.write(8, UniformValue::F32(28.0)));
        assert_eq!(&data.bytes()[8..12], &28.0f32.to_le_bytes());
        assert!(!data.write(12, UniformValue::Vec4(Vec4::ONE)));
        assert!(data.take_dirty());
        assert!(!data.is_dirty());
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Probe {
        Rho,
        Missing,
    }

    impl UniformSlot for Probe {
        const ALL: &'static [Self] = &[Probe::Rho, Probe::Missing];

        fn name(self) -> &'static str {
            match self {
                Probe::Rho => "rho",
                Probe::Missing => "sigma",
            }
        }

        fn index(self) -> usize {
            self as usize
        }
    }

    #[test]
    fn test_uniform_table_resolves_slots_once() {
        let iface = link("update", FULLSCREEN_VERTEX, UPDATE_FRAGMENT).unwrap();
        let table = UniformTable::<Probe>::resolve(&iface);
        assert_eq!(table.get(Probe::Rho), UniformHandle::Value { offset: 8, kind: UniformKind::F32 });
        assert!(table.get(Probe::Missing).is_absent());
        assert_eq!(table.absent(), vec!["sigma"]);
    }
}
