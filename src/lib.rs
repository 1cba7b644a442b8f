//! # Attractor - GPU Strange-Attractor Trails
//!
//! Simulates a Lorenz attractor entirely on the GPU and draws each particle's
//! recent history as a fading, additively blended line trail.
//!
//! ## Quick Start
//!
//! ```ignore
//! use attractor::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     Simulation::new()
//!         .with_vertex_size(4096)
//!         .with_trail_size(256)
//!         .with_rho(28.0)
//!         .with_beta(8.0 / 3.0)
//!         .run()
//! }
//! ```
//!
//! ## How It Works
//!
//! Particle state lives in two `Rgba32Float` textures, `trail_size` texels
//! wide and `vertex_size` texels tall. Column 0 holds each particle's newest
//! position, column `k` its position `k` steps ago. The textures take turns
//! being read and written (ping-pong), so a pass never samples its own target.
//!
//! Every frame runs two passes:
//!
//! | Pass | Reads | Writes | Work |
//! |------|-------|--------|------|
//! | Update | current state | next state | Euler step for column 0, shift the rest |
//! | Render | current state | surface | one line strip per particle |
//!
//! A third pass, Initialize, seeds the state once per session from a
//! deterministic hash of the particle index.
//!
//! ## Headless Use
//!
//! [`Session`] runs the same pipeline against any texture view, which is how
//! the integration tests drive it:
//!
//! ```ignore
//! let context = pollster::block_on(GpuContext::headless())?;
//! let mut session = Session::new(&context, &ShaderLibrary::builtin(), format, &params, Camera::new())?;
//! session.frame(&params, &view, SurfaceSize::new(800, 600))?;
//! let state = session.read_state()?;
//! ```
//!
//! ## Controls
//!
//! See [`controls`] for the keyboard bindings. Escape or closing the window
//! ends the run.

pub mod config;
pub mod controls;
pub mod error;
pub mod gpu;
pub mod math;
pub mod params;
pub mod program;
pub mod scheduler;
pub mod session;
pub mod shader;
mod simulation;
pub mod time;
mod window;

pub use glam::{Mat4, Vec3, Vec4};

pub use config::AttractorConfig;
pub use error::{ConfigError, GpuError, SessionError, ShaderError, SimulationError};
pub use gpu::GpuContext;
pub use math::Camera;
pub use params::{ParameterSnapshot, ParameterSource, StateDimensions, SurfaceSize};
pub use scheduler::{FrameScheduler, StopHandle, TickOutcome};
pub use session::Session;
pub use shader::{ShaderLibrary, ShaderName};
pub use simulation::Simulation;

/// Common imports for running a simulation.
///
/// This imports:
/// - [`Simulation`] - the viewer builder
/// - [`Camera`] and [`ParameterSnapshot`] - its main inputs
/// - [`ShaderLibrary`] and [`ShaderName`] - shader overrides
/// - the error types returned by `run` and session setup
pub mod prelude {
    pub use crate::config::AttractorConfig;
    pub use crate::error::{ConfigError, SessionError, ShaderError, SimulationError};
    pub use crate::gpu::GpuContext;
    pub use crate::math::Camera;
    pub use crate::params::{ParameterSnapshot, ParameterSource, SurfaceSize};
    pub use crate::scheduler::{FrameScheduler, StopHandle, TickOutcome};
    pub use crate::session::Session;
    pub use crate::shader::{ShaderLibrary, ShaderName};
    pub use crate::simulation::Simulation;
    pub use crate::{Mat4, Vec3, Vec4};
}
