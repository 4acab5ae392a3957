// Fixed look-at camera
//
// Camera model:
//   - An eye position, a target point it looks at, and an up vector
//   - Right-handed view, perspective projection with depth in [0, 1]
//   - Never moves during play; the playfield is framed by config

use glam::{Mat4, Vec3};

use super::config::CameraConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            position,
            target,
            up,
            fov: 45.0_f32.to_radians(),
            near: 1.0,
            far: 200.0,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            position: Vec3::from_array(config.position),
            target: Vec3::from_array(config.target),
            up: Vec3::from_array(config.up),
            fov: config.fov_degrees.to_radians(),
            near: config.near,
            far: config.far,
        }
    }

    /// View matrix: looks from `position` toward `target`.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Perspective projection matrix.
    /// A degenerate (zero-height) viewport falls back to a square aspect.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(camera: &Camera, world: Vec3, aspect: f32) -> glam::Vec4 {
        camera.projection_matrix(aspect) * camera.view_matrix() * world.extend(1.0)
    }

    #[test]
    fn target_lands_at_screen_center() {
        let camera = Camera::default();
        let pos = clip(&camera, camera.target, 4.0 / 3.0);
        assert!(pos.w > 0.0);
        let ndc = pos.truncate() / pos.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn points_behind_eye_have_negative_w() {
        let camera = Camera::new(Vec3::ZERO, Vec3::Z, Vec3::Y);
        assert!(clip(&camera, Vec3::new(0.0, 0.0, -5.0), 1.0).w < 0.0);
    }

    #[test]
    fn degenerate_aspect_falls_back() {
        let camera = Camera::default();
        assert_eq!(camera.projection_matrix(0.0), camera.projection_matrix(1.0));
        assert_eq!(camera.projection_matrix(f32::NAN), camera.projection_matrix(1.0));
    }

    #[test]
    fn config_angles_are_degrees() {
        let camera = Camera::default();
        assert!((camera.fov - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
        assert_eq!(camera.up, Vec3::Z);
    }
}
