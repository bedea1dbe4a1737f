use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

const MAX_PITCH_DEGREES: f32 = 89.0;

/// Orbit camera tuning read from the startup configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub target: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub sensitivity: f32,
    pub zoom_enabled: bool,
    pub zoom_near: f32,
    pub zoom_far: f32,
    pub zoom_speed: f32,
    pub initial_distance: f32,
    pub initial_yaw: f32,
    pub initial_pitch: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            sensitivity: 0.1,
            zoom_enabled: true,
            zoom_near: 8.0,
            zoom_far: 18.0,
            zoom_speed: 0.8,
            initial_distance: 12.0,
            initial_yaw: 0.0,
            initial_pitch: 15.0,
        }
    }
}

/// Matrices and eye position captured once per tick.
///
/// Every draw of a tick reads from the same snapshot, so a camera update
/// arriving mid-tick can never mix two states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub projection: Mat4,
    pub view: Mat4,
    pub projection_view: Mat4,
    pub position: Vec3,
}

impl CameraFrame {
    /// Projection times the rotation-only part of the view, for the skybox.
    pub fn sky_projection_view(&self) -> Mat4 {
        self.projection * Mat4::from_mat3(Mat3::from_mat4(self.view))
    }
}

/// Camera interface consumed by the frame orchestrator and input router.
pub trait CameraRig {
    fn view_matrix(&self) -> Mat4;
    fn projection_matrix(&self) -> Mat4;
    fn position(&self) -> Vec3;
    /// Applies a pointer delta in pixels (positive `dy` is upward).
    fn rotate(&mut self, dx: f32, dy: f32);
    /// Applies a scroll offset (positive moves closer).
    fn zoom(&mut self, offset: f32);

    fn capture(&self) -> CameraFrame {
        let projection = self.projection_matrix();
        let view = self.view_matrix();
        CameraFrame {
            projection,
            view,
            projection_view: projection * view,
            position: self.position(),
        }
    }
}

/// Object-viewer camera circling a fixed target point.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    settings: CameraSettings,
    aspect: f32,
    yaw: f32,
    pitch: f32,
    distance: f32,
}

impl OrbitCamera {
    /// Creates a camera whose aspect ratio stays fixed for its lifetime.
    pub fn new(settings: CameraSettings, aspect: f32) -> Self {
        let mut camera = Self {
            settings,
            aspect: if aspect.is_finite() && aspect > 0.0 {
                aspect
            } else {
                1.0
            },
            yaw: settings.initial_yaw,
            pitch: 0.0,
            distance: settings.initial_distance,
        };
        camera.set_pitch(settings.initial_pitch);
        camera.distance = camera.clamp_distance(settings.initial_distance);
        camera
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(-MAX_PITCH_DEGREES, MAX_PITCH_DEGREES);
    }

    fn clamp_distance(&self, distance: f32) -> f32 {
        let near = self.settings.zoom_near.min(self.settings.zoom_far);
        let far = self.settings.zoom_near.max(self.settings.zoom_far);
        distance.clamp(near, far)
    }

    fn offset(&self) -> Vec3 {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        Vec3::new(
            pitch.cos() * yaw.sin(),
            pitch.sin(),
            pitch.cos() * yaw.cos(),
        ) * self.distance
    }
}

impl CameraRig for OrbitCamera {
    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.settings.target, Vec3::Y)
    }

    fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.settings.fov_degrees.to_radians(),
            self.aspect,
            self.settings.near,
            self.settings.far,
        )
    }

    fn position(&self) -> Vec3 {
        self.settings.target + self.offset()
    }

    fn rotate(&mut self, dx: f32, dy: f32) {
        // Dragging right swings the eye left around the target.
        self.yaw = (self.yaw - dx * self.settings.sensitivity) % 360.0;
        self.set_pitch(self.pitch - dy * self.settings.sensitivity);
    }

    fn zoom(&mut self, offset: f32) {
        if !self.settings.zoom_enabled || !offset.is_finite() {
            return;
        }
        self.distance = self.clamp_distance(self.distance - offset * self.settings.zoom_speed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> OrbitCamera {
        OrbitCamera::new(CameraSettings::default(), 1920.0 / 1080.0)
    }

    #[test]
    fn eye_stays_at_distance_from_target() {
        let mut camera = camera();
        camera.rotate(120.0, -40.0);
        let distance = camera.position().distance(camera.settings().target);
        assert!((distance - camera.distance()).abs() < 1e-4);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = camera();
        for _ in 0..100 {
            camera.zoom(1.0);
        }
        assert_eq!(camera.distance(), 8.0);
        for _ in 0..100 {
            camera.zoom(-1.0);
        }
        assert_eq!(camera.distance(), 18.0);
    }

    #[test]
    fn zoom_can_be_disabled() {
        let settings = CameraSettings {
            zoom_enabled: false,
            ..CameraSettings::default()
        };
        let mut camera = OrbitCamera::new(settings, 1.0);
        let before = camera.distance();
        camera.zoom(3.0);
        assert_eq!(camera.distance(), before);
    }

    #[test]
    fn pitch_never_flips_over_the_pole() {
        let mut camera = camera();
        camera.rotate(0.0, -100_000.0);
        assert_eq!(camera.pitch(), MAX_PITCH_DEGREES);
        camera.rotate(0.0, 100_000.0);
        assert_eq!(camera.pitch(), -MAX_PITCH_DEGREES);
    }

    #[test]
    fn capture_combines_projection_and_view() {
        let camera = camera();
        let frame = camera.capture();
        assert_eq!(
            frame.projection_view,
            camera.projection_matrix() * camera.view_matrix()
        );
        assert_eq!(frame.position, camera.position());
    }

    #[test]
    fn sky_matrix_ignores_zoom() {
        let mut camera = camera();
        let before = camera.capture().sky_projection_view();
        camera.zoom(2.0);
        let after = camera.capture().sky_projection_view();
        assert!(before.abs_diff_eq(after, 1e-5));
    }

    #[test]
    fn invalid_aspect_falls_back() {
        assert_eq!(OrbitCamera::new(CameraSettings::default(), 0.0).aspect(), 1.0);
    }
}
