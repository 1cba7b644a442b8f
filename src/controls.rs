//! Keyboard controls for the simulation parameters.
//!
//! | Keys      | Parameter    | Step            |
//! |-----------|--------------|-----------------|
//! | `Q` / `A` | `rho`        | ±1.0            |
//! | `W` / `S` | `beta`       | ±0.1            |
//! | `E` / `D` | `delta`      | ±0.1, min 0     |
//! | `R` / `F` | `delta_time` | ±0.001, min 0   |
//! | `Space`   | all          | reset           |
//!
//! Text entered for a field is parsed here, so the simulation only ever sees
//! typed values.

use std::fmt;

use winit::keyboard::KeyCode;

use crate::params::{ParameterSnapshot, ParameterSource};

/// A user-editable field of the parameter snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlField {
    Rho,
    Beta,
    Delta,
    DeltaTime,
    TrailSize,
    VertexSize,
}

impl ControlField {
    pub const ALL: [ControlField; 6] = [
        ControlField::Rho,
        ControlField::Beta,
        ControlField::Delta,
        ControlField::DeltaTime,
        ControlField::TrailSize,
        ControlField::VertexSize,
    ];

    /// Field called `name`, as written in settings such as `rho=28`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlField::Rho => "rho",
            ControlField::Beta => "beta",
            ControlField::Delta => "delta",
            ControlField::DeltaTime => "delta_time",
            ControlField::TrailSize => "trail_size",
            ControlField::VertexSize => "vertex_size",
        }
    }
}

/// Text that does not parse as the field's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFieldError {
    pub field: ControlField,
    pub text: String,
}

impl fmt::Display for ParseFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid value for {}", self.text, self.field.name())
    }
}

impl std::error::Error for ParseFieldError {}

/// Current parameters plus the defaults they reset to.
#[derive(Debug, Clone)]
pub struct ControlPanel {
    params: ParameterSnapshot,
    defaults: ParameterSnapshot,
}

impl ControlPanel {
    pub fn new(defaults: ParameterSnapshot) -> Self {
        Self {
            params: defaults,
            defaults,
        }
    }

    pub fn params(&self) -> &ParameterSnapshot {
        &self.params
    }

    pub fn reset(&mut self) {
        self.params = self.defaults;
    }

    /// Apply a key press. Returns `true` if a parameter changed.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        let p = &mut self.params;
        match key {
            KeyCode::KeyQ => p.rho += 1.0,
            KeyCode::KeyA => p.rho -= 1.0,
            KeyCode::KeyW => p.beta += 0.1,
            KeyCode::KeyS => p.beta -= 0.1,
            KeyCode::KeyE => p.delta += 0.1,
            KeyCode::KeyD => p.delta = (p.delta - 0.1).max(0.0),
            KeyCode::KeyR => p.delta_time += 0.001,
            KeyCode::KeyF => p.delta_time = (p.delta_time - 0.001).max(0.0),
            KeyCode::Space => *p = self.defaults,
            _ => return false,
        }
        log::info!("{}", self.describe());
        true
    }

    /// Parse `text` and store it in `field`. The panel is unchanged on error.
    pub fn parse_field(&mut self, field: ControlField, text: &str) -> Result<(), ParseFieldError> {
        let text = text.trim();
        let err = || ParseFieldError {
            field,
            text: text.to_string(),
        };

        match field {
            ControlField::TrailSize | ControlField::VertexSize => {
                let value: u32 = text.parse().map_err(|_| err())?;
                if field == ControlField::TrailSize {
                    self.params.trail_size = value;
                } else {
                    self.params.vertex_size = value;
                }
            }
            _ => {
                let value: f32 = text.parse().map_err(|_| err())?;
                if !value.is_finite() {
                    return Err(err());
                }
                match field {
                    ControlField::Rho => self.params.rho = value,
                    ControlField::Beta => self.params.beta = value,
                    ControlField::Delta => self.params.delta = value,
                    _ => self.params.delta_time = value,
                }
            }
        }
        Ok(())
    }

    /// One-line read-out of the current values.
    pub fn describe(&self) -> String {
        let p = &self.params;
        format!(
            "rho {:.2}  beta {:.3}  delta {:.2}  delta_time {:.4}",
            p.rho, p.beta, p.delta, p.delta_time
        )
    }
}

impl ParameterSource for ControlPanel {
    fn snapshot(&mut self) -> ParameterSnapshot {
        self.params
    }
}
