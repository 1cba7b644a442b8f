//! Camera matrices for viewing the attractor.
//!
//! All matrices are column-major `glam::Mat4` with a `[0, 1]` clip depth
//! range, which is what the render pass uploads as `view_proj`.

use glam::{Mat4, Vec3};

/// Build a right-handed view matrix looking from `eye` towards `target`.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, target, up)
}

/// Build a right-handed perspective projection.
///
/// `fov_degrees` is the vertical field of view.
pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_degrees.to_radians(), aspect, near, far)
}

/// Compose two transforms. `multiply(projection, view)` applies `view` first.
pub fn multiply(a: Mat4, b: Mat4) -> Mat4 {
    a * b
}

/// Matrices for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    /// `projection × view`.
    pub view_projection: Mat4,
}

/// Fixed-position camera.
///
/// Holds only the inputs; matrices are rebuilt on every call since the aspect
/// ratio follows the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World position of the eye.
    pub eye: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    /// Up direction.
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Near clip plane.
    pub near: f32,
    /// Far clip plane.
    pub far: f32,
}

impl Camera {
    /// Create a camera with the default framing for a Lorenz attractor.
    pub fn new() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 75.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_degrees: 100.0,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Calculate the view matrix for rendering.
    pub fn view_matrix(&self) -> Mat4 {
        look_at(self.eye, self.target, self.up)
    }

    /// Calculate the projection matrix for the given aspect ratio.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        perspective(self.fov_degrees, aspect, self.near, self.far)
    }

    /// Calculate all frame matrices for the given aspect ratio.
    pub fn matrices(&self, aspect: f32) -> CameraMatrices {
        let view = self.view_matrix();
        let projection = self.projection_matrix(aspect);
        CameraMatrices {
            view,
            projection,
            view_projection: multiply(projection, view),
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
