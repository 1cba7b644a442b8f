//! GPU device setup shared by the windowed and headless paths.

pub mod pipeline;
pub mod state;

use std::sync::{Arc, Mutex};

use winit::window::Window;

use crate::error::{GpuError, SessionError};
use crate::params::SurfaceSize;

/// Format of the particle state textures.
pub const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Shared fault record for one device.
///
/// Holds the first uncaptured error or loss notification. Once set, every
/// [`check`](Self::check) fails with `ContextLost`.
#[derive(Debug, Clone, Default)]
pub struct DeviceHealth {
    fault: Arc<Mutex<Option<String>>>,
}

impl DeviceHealth {
    /// Record a fault. Later faults do not replace the first.
    pub fn mark_lost(&self, reason: impl Into<String>) {
        if let Ok(mut fault) = self.fault.lock() {
            if fault.is_none() {
                *fault = Some(reason.into());
            }
        }
    }

    pub fn is_lost(&self) -> bool {
        self.fault.lock().map(|fault| fault.is_some()).unwrap_or(true)
    }

    /// `ContextLost` once any fault has been recorded.
    pub fn check(&self) -> Result<(), SessionError> {
        match self.fault.lock() {
            Ok(fault) => match fault.as_ref() {
                Some(reason) => Err(SessionError::ContextLost(reason.clone())),
                None => Ok(()),
            },
            Err(_) => Err(SessionError::ContextLost("device health lock poisoned".to_string())),
        }
    }

    /// Handler for errors raised outside any error scope. Every error is
    /// fatal to the session, not only out-of-memory.
    pub fn uncaptured_error_handler(&self) -> impl Fn(wgpu::Error) + Send + 'static {
        let health = self.clone();
        move |err| {
            log::error!("Uncaptured GPU error: {}", err);
            health.mark_lost(err.to_string());
        }
    }
}

/// Instance, adapter, device and queue for one session.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    health: DeviceHealth,
}

impl GpuContext {
    /// Context without a surface, for offscreen rendering and tests.
    pub async fn headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        Self::from_adapter(instance, adapter).await
    }

    /// Context presenting to `window`.
    pub async fn with_window(window: Arc<Window>) -> Result<(Self, SurfaceTarget), GpuError> {
        let size = SurfaceSize::from(window.inner_size());

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let context = Self::from_adapter(instance, adapter).await?;
        let target = SurfaceTarget::new(&context, surface, size)?;
        Ok((context, target))
    }

    async fn from_adapter(instance: wgpu::Instance, adapter: wgpu::Adapter) -> Result<Self, GpuError> {
        let info = adapter.get_info();
        log::info!("Using adapter '{}' ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Attractor Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let health = DeviceHealth::default();

        let lost = health.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("GPU device lost ({:?}): {}", reason, message);
            lost.mark_lost(format!("GPU device lost ({:?}): {}", reason, message));
        });
        device.on_uncaptured_error(Box::new(health.uncaptured_error_handler()));

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            health,
        })
    }

    pub fn health(&self) -> DeviceHealth {
        self.health.clone()
    }

    /// Largest allowed state texture side.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Fail unless the state format can be both rendered to and sampled.
    pub fn check_capabilities(&self) -> Result<(), SessionError> {
        let features = self.adapter.get_texture_format_features(STATE_FORMAT);
        let required = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        if !features.allowed_usages.contains(required) {
            return Err(SessionError::UnsupportedPlatform(format!(
                "{:?} must be usable as a render attachment and a texture binding (adapter allows {:?})",
                STATE_FORMAT, features.allowed_usages
            )));
        }
        Ok(())
    }
}

/// A configured window surface.
pub struct SurfaceTarget {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl SurfaceTarget {
    fn new(context: &GpuContext, surface: wgpu::Surface<'static>, size: SurfaceSize) -> Result<Self, GpuError> {
        let caps = surface.get_capabilities(&context.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or(GpuError::NoAdapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &config);

        Ok(Self { surface, config })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.config.width, self.config.height)
    }

    /// Reconfigure for a new size. Zero-sized (minimized) windows are ignored.
    pub fn resize(&mut self, device: &wgpu::Device, size: SurfaceSize) {
        if size.is_empty() {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(device, &self.config);
    }

    /// Next frame to draw into.
    ///
    /// `Ok(None)` means the frame should be skipped: the surface was lost or
    /// outdated (and has been reconfigured) or acquisition timed out.
    pub fn acquire(&mut self, device: &wgpu::Device) -> Result<Option<wgpu::SurfaceTexture>, SessionError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                self.surface.configure(device, &self.config);
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring surface texture");
                Ok(None)
            }
            Err(err) => Err(SessionError::ContextLost(err.to_string())),
        }
    }
}
