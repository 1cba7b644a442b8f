//! Simulation builder and runner

use winit::event_loop::{ControlFlow, EventLoop};

use crate::config::AttractorConfig;
use crate::controls::{ControlField, ControlPanel};
use crate::error::{ConfigError, SimulationError};
use crate::math::Camera;
use crate::params::ParameterSnapshot;
use crate::scheduler::StopHandle;
use crate::shader::{ShaderLibrary, ShaderName};
use crate::window::App;

/// An attractor viewer builder.
///
/// Use method chaining to configure, then call `.run()` to open the window.
pub struct Simulation {
    config: AttractorConfig,
    shaders: ShaderLibrary,
    stop: StopHandle,
}

impl Simulation {
    /// Create a new simulation with default settings.
    pub fn new() -> Self {
        Self {
            config: AttractorConfig::default(),
            shaders: ShaderLibrary::builtin(),
            stop: StopHandle::new(),
        }
    }

    /// Start from a loaded configuration, shader overrides included.
    pub fn from_config(config: AttractorConfig) -> Result<Self, ConfigError> {
        let shaders = config.shader_library()?;
        Ok(Self {
            config,
            shaders,
            stop: StopHandle::new(),
        })
    }

    /// Set the number of history slots drawn per particle.
    pub fn with_trail_size(mut self, trail_size: u32) -> Self {
        self.config.parameters.trail_size = trail_size;
        self
    }

    /// Set the number of particles.
    pub fn with_vertex_size(mut self, vertex_size: u32) -> Self {
        self.config.parameters.vertex_size = vertex_size;
        self
    }

    pub fn with_rho(mut self, rho: f32) -> Self {
        self.config.parameters.rho = rho;
        self
    }

    pub fn with_beta(mut self, beta: f32) -> Self {
        self.config.parameters.beta = beta;
        self
    }

    /// Set the step multiplier applied to `delta_time`.
    pub fn with_delta(mut self, delta: f32) -> Self {
        self.config.parameters.delta = delta;
        self
    }

    pub fn with_delta_time(mut self, delta_time: f32) -> Self {
        self.config.parameters.delta_time = delta_time;
        self
    }

    /// Replace all parameters at once.
    pub fn with_parameters(mut self, parameters: ParameterSnapshot) -> Self {
        self.config.parameters = parameters;
        self
    }

    /// Set one parameter from text, e.g. `with_setting("rho", "99.96")`.
    ///
    /// Parameters are unchanged when the name or value is rejected.
    pub fn with_setting(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let field = ControlField::from_name(name).ok_or_else(|| ConfigError::UnknownSetting(name.to_string()))?;
        let mut panel = ControlPanel::new(self.config.parameters);
        panel.parse_field(field, value)?;
        self.config.parameters = *panel.params();
        Ok(self)
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.config.camera = camera.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.window.title = title.into();
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.config.window.width = width;
        self.config.window.height = height;
        self
    }

    /// Replace one of the built-in shaders.
    pub fn with_shader(mut self, name: ShaderName, source: impl Into<String>) -> Self {
        self.shaders.insert(name, source);
        self
    }

    pub fn parameters(&self) -> &ParameterSnapshot {
        &self.config.parameters
    }

    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    /// Handle that ends `run` from elsewhere, for example another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run the simulation. This blocks until the window is closed, Escape is
    /// pressed or the stop handle is triggered.
    pub fn run(self) -> Result<(), SimulationError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let camera = self.config.camera();
        let controls = ControlPanel::new(self.config.parameters);
        let mut app = App::new(self.config.window, self.shaders, camera, controls, self.stop);

        event_loop.run_app(&mut app)?;
        app.into_result()
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
