//! JSON configuration for the viewer binary.
//!
//! Every section is optional; missing fields fall back to defaults.
//!
//! ```json
//! {
//!   "parameters": { "vertex_size": 2048, "rho": 28.0 },
//!   "camera": { "eye": [0.0, 0.0, 90.0] },
//!   "window": { "title": "Lorenz", "width": 1920, "height": 1080 },
//!   "shaders": { "render_fragment": "..." }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::math::Camera;
use crate::params::ParameterSnapshot;
use crate::shader::{ShaderLibrary, ShaderName};

/// Camera placement, in plain arrays for JSON.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    pub up: [f32; 3],
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Camera::default().into()
    }
}

impl From<Camera> for CameraConfig {
    fn from(c: Camera) -> Self {
        Self {
            eye: c.eye.to_array(),
            target: c.target.to_array(),
            up: c.up.to_array(),
            fov_degrees: c.fov_degrees,
            near: c.near,
            far: c.far,
        }
    }
}

impl From<&CameraConfig> for Camera {
    fn from(c: &CameraConfig) -> Self {
        Camera {
            eye: Vec3::from_array(c.eye),
            target: Vec3::from_array(c.target),
            up: Vec3::from_array(c.up),
            fov_degrees: c.fov_degrees,
            near: c.near,
            far: c.far,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Lorenz Attractor".into(),
            width: 1280,
            height: 720,
        }
    }
}

/// Complete viewer configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AttractorConfig {
    pub parameters: ParameterSnapshot,
    pub camera: CameraConfig,
    pub window: WindowConfig,
    /// WGSL overrides keyed by shader name (`init_fragment`, `render_vertex`, ...).
    pub shaders: HashMap<String, String>,
}

impl AttractorConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn camera(&self) -> Camera {
        Camera::from(&self.camera)
    }

    /// Built-in shaders with this config's overrides applied.
    pub fn shader_library(&self) -> Result<ShaderLibrary, ConfigError> {
        let mut library = ShaderLibrary::builtin();
        for (key, source) in &self.shaders {
            let name = ShaderName::from_key(key).ok_or_else(|| ConfigError::UnknownShader(key.clone()))?;
            library.insert(name, source.clone());
        }
        Ok(library)
    }
}
