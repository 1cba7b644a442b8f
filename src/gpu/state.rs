//! Double-buffered particle state.
//!
//! Two same-sized float textures alternate between the Read role (sampled by
//! the running pass) and the Write role (its render target). [`PingPong`]
//! holds the role bookkeeping and is independent of wgpu.

use crate::error::GpuError;
use crate::gpu::STATE_FORMAT;
use crate::params::StateDimensions;

/// Two slots, one readable and one writable, swapped by relabeling.
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    slots: [T; 2],
    read: usize,
}

impl<T> PingPong<T> {
    /// `first` starts in the Read role.
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
            read: 0,
        }
    }

    /// Exchange roles. O(1), no data moves.
    pub fn swap(&mut self) {
        self.read ^= 1;
    }

    pub fn read(&self) -> &T {
        &self.slots[self.read]
    }

    pub fn write(&self) -> &T {
        &self.slots[self.write_index()]
    }

    pub fn read_index(&self) -> usize {
        self.read
    }

    pub fn write_index(&self) -> usize {
        self.read ^ 1
    }

    /// Slot by absolute index (0 or 1), regardless of role.
    pub fn get(&self, index: usize) -> &T {
        &self.slots[index & 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }
}

/// One state texture and its view.
pub struct StateBuffer {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl StateBuffer {
    fn new(device: &wgpu::Device, dims: StateDimensions, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: dims.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STATE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

impl Drop for StateBuffer {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

/// CPU copy of a state texture, one `[x, y, z, w]` per texel.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    dims: StateDimensions,
    texels: Vec<[f32; 4]>,
}

impl StateSnapshot {
    pub fn dimensions(&self) -> StateDimensions {
        self.dims
    }

    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    /// Position stored at history `slot` of `particle`, or `None` outside
    /// the state dimensions.
    pub fn texel(&self, slot: u32, particle: u32) -> Option<[f32; 4]> {
        if slot >= self.dims.trail_size() || particle >= self.dims.vertex_size() {
            return None;
        }
        self.texels.get(self.dims.texel_index(slot, particle)).copied()
    }

    /// Newest position of every particle.
    pub fn heads(&self) -> impl Iterator<Item = [f32; 4]> + '_ {
        (0..self.dims.vertex_size()).filter_map(move |p| self.texel(0, p))
    }
}

/// The Read/Write pair of state textures.
pub struct StatePair {
    buffers: PingPong<StateBuffer>,
    dims: StateDimensions,
}

impl StatePair {
    pub fn create(device: &wgpu::Device, dims: StateDimensions) -> Self {
        Self {
            buffers: Self::allocate(device, dims),
            dims,
        }
    }

    fn allocate(device: &wgpu::Device, dims: StateDimensions) -> PingPong<StateBuffer> {
        PingPong::new(
            StateBuffer::new(device, dims, "State Texture A"),
            StateBuffer::new(device, dims, "State Texture B"),
        )
    }

    /// Replace both textures with new ones of `dims`. The old textures are
    /// destroyed before the new ones are allocated.
    pub fn recreate(&mut self, device: &wgpu::Device, dims: StateDimensions) {
        for buffer in self.buffers.iter() {
            buffer.texture.destroy();
        }
        self.buffers = Self::allocate(device, dims);
        self.dims = dims;
    }

    pub fn dimensions(&self) -> StateDimensions {
        self.dims
    }

    pub fn swap(&mut self) {
        self.buffers.swap();
    }

    pub fn read(&self) -> &StateBuffer {
        self.buffers.read()
    }

    pub fn write(&self) -> &StateBuffer {
        self.buffers.write()
    }

    pub fn read_index(&self) -> usize {
        self.buffers.read_index()
    }

    pub fn get(&self, index: usize) -> &StateBuffer {
        self.buffers.get(index)
    }

    /// Copy the Read texture back to the CPU. Blocks until the copy is done.
    pub fn read_back(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<StateSnapshot, GpuError> {
        let width = self.dims.trail_size();
        let height = self.dims.vertex_size();
        let unpadded = width * 16;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("State Readback Buffer"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("State Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: self.read().texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            self.dims.extent(),
        );
        queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let mut texels = Vec::with_capacity(self.dims.texel_count());
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize) {
                texels.extend(
                    row[..unpadded as usize]
                        .chunks_exact(16)
                        .map(bytemuck::pod_read_unaligned::<[f32; 4]>),
                );
            }
        }
        staging.unmap();
        staging.destroy();

        Ok(StateSnapshot {
            dims: self.dims,
            texels,
        })
    }
}
