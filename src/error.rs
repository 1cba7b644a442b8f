//! Error types for the attractor simulation.
//!
//! Setup errors (shader compilation, linking, missing GPU capabilities) abort
//! session construction. Runtime errors abort the frame loop; nothing here is
//! retried internally.

use std::fmt;

use crate::controls::ParseFieldError;
use crate::gpu::pipeline::{Pass, Phase};
use crate::shader::{ShaderName, StageKind};

/// Errors raised while turning shader source into a linked program.
#[derive(Debug, Clone)]
pub enum ShaderError {
    /// No source was registered under the requested logical name.
    MissingSource(ShaderName),
    /// A single stage failed to parse or validate.
    Compile {
        /// Program being built.
        program: String,
        /// Stage that failed.
        stage: StageKind,
        /// Compiler diagnostic, verbatim.
        log: String,
    },
    /// The two stages compiled but cannot be combined into one program.
    Link {
        /// Program being built.
        program: String,
        /// Linker diagnostic.
        log: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::MissingSource(name) => {
                write!(f, "No shader source registered for '{}'", name.key())
            }
            ShaderError::Compile { program, stage, log } => {
                write!(f, "Failed to compile {} stage of '{}':\n{}", stage, program, log)
            }
            ShaderError::Link { program, log } => {
                write!(f, "Failed to link program '{}': {}", program, log)
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// Errors that can occur during GPU initialization.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// Failed to map buffer for reading.
    BufferMapping(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors raised by a simulation session, during setup or per frame.
#[derive(Debug)]
pub enum SessionError {
    /// A required GPU capability is missing. Reported before any setup.
    UnsupportedPlatform(String),
    /// The GPU device or its memory went away while the loop was running.
    ContextLost(String),
    /// State texture dimensions are zero or exceed the device limit.
    InvalidDimensions {
        trail_size: u32,
        vertex_size: u32,
        max: u32,
    },
    /// A pipeline pass was requested in a phase that does not allow it.
    PassOutOfOrder { pass: Pass, phase: Phase },
    /// Program construction failed.
    Shader(ShaderError),
    /// Device-level failure.
    Gpu(GpuError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnsupportedPlatform(msg) => write!(f, "Unsupported platform: {}", msg),
            SessionError::ContextLost(msg) => write!(f, "GPU context lost: {}", msg),
            SessionError::InvalidDimensions { trail_size, vertex_size, max } => write!(
                f,
                "Invalid state dimensions {}x{} (each must be in 1..={})",
                trail_size, vertex_size, max
            ),
            SessionError::PassOutOfOrder { pass, phase } => {
                write!(f, "{:?} pass cannot run while the pipeline is {:?}", pass, phase)
            }
            SessionError::Shader(e) => write!(f, "Shader error: {}", e),
            SessionError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Shader(e) => Some(e),
            SessionError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShaderError> for SessionError {
    fn from(e: ShaderError) -> Self {
        SessionError::Shader(e)
    }
}

impl From<GpuError> for SessionError {
    fn from(e: GpuError) -> Self {
        SessionError::Gpu(e)
    }
}

/// Errors that can occur when loading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the file from disk.
    Io(std::io::Error),
    /// The file is not valid configuration JSON.
    Parse(serde_json::Error),
    /// A shader override names no known shader.
    UnknownShader(String),
    /// A `name=value` setting names no known parameter.
    UnknownSetting(String),
    /// A setting's value does not parse as its parameter's type.
    Setting(ParseFieldError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::UnknownShader(key) => write!(f, "Unknown shader name '{}'", key),
            ConfigError::UnknownSetting(name) => write!(f, "Unknown parameter '{}'", name),
            ConfigError::Setting(e) => write!(f, "Invalid setting: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::UnknownShader(_) | ConfigError::UnknownSetting(_) => None,
            ConfigError::Setting(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<ParseFieldError> for ConfigError {
    fn from(e: ParseFieldError) -> Self {
        ConfigError::Setting(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Errors that can occur when running a simulation.
#[derive(Debug)]
pub enum SimulationError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// Session setup or the frame loop failed.
    Session(SessionError),
    /// The configuration could not be applied.
    Config(ConfigError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            SimulationError::Window(e) => write!(f, "Failed to create window: {}", e),
            SimulationError::Session(e) => write!(f, "{}", e),
            SimulationError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::EventLoop(e) => Some(e),
            SimulationError::Window(e) => Some(e),
            SimulationError::Session(e) => Some(e),
            SimulationError::Config(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for SimulationError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SimulationError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for SimulationError {
    fn from(e: winit::error::OsError) -> Self {
        SimulationError::Window(e)
    }
}

impl From<SessionError> for SimulationError {
    fn from(e: SessionError) -> Self {
        SimulationError::Session(e)
    }
}

impl From<GpuError> for SimulationError {
    fn from(e: GpuError) -> Self {
        SimulationError::Session(SessionError::Gpu(e))
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        SimulationError::Config(e)
    }
}
