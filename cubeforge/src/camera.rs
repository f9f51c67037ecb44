//! First-person camera.

use glam::{Mat4, Quat, Vec3};

use crate::config::RenderConfig;
use crate::render::SceneView;
use crate::world::ChunkCoord;

/// Pitch stays just short of straight up or down so the view basis is
/// always well defined.
const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    /// Radians around +Y. Zero looks down -Z.
    pub yaw: f32,
    /// Radians above the horizon.
    pub pitch: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            fov_y: 90f32.to_radians(),
            near: 0.05,
            far: 1000.0,
        }
    }

    /// Camera at `position` using the configured projection.
    pub fn from_config(position: Vec3, config: &RenderConfig) -> Self {
        Self {
            fov_y: config.fov_y_degrees.to_radians(),
            near: config.near_plane,
            far: config.far_plane,
            ..Self::new(position)
        }
    }

    /// Unit look direction.
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(-sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(f32::EPSILON), self.near, self.far)
    }

    /// Turn by the given angles in radians. Positive yaw turns left.
    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        self.yaw = (self.yaw + yaw).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + pitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Move along the camera's horizontal basis: `x` strafes right, `y` is
    /// world up and `z` moves backward.
    pub fn move_relative(&mut self, delta: Vec3) {
        let horizontal = Quat::from_rotation_y(self.yaw) * Vec3::new(delta.x, 0.0, delta.z);
        self.position += horizontal + Vec3::Y * delta.y;
    }

    /// Chunk column the camera stands in.
    pub fn chunk(&self) -> ChunkCoord {
        ChunkCoord::containing(self.position.x.floor() as i32, self.position.z.floor() as i32)
    }

    pub fn scene_view(&self, aspect: f32) -> SceneView {
        SceneView {
            proj: self.projection(aspect),
            view: self.view(),
            eye: self.position,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn default_looks_down_negative_z() {
        let camera = Camera::default();
        assert!(close(camera.forward(), Vec3::NEG_Z));
        let ahead = camera.view().transform_point3(Vec3::new(0.0, 0.0, -5.0));
        assert!(close(ahead, Vec3::new(0.0, 0.0, -5.0)));
    }

    #[test]
    fn yaw_turns_left() {
        let mut camera = Camera::default();
        camera.rotate(std::f32::consts::FRAC_PI_2, 0.0);
        assert!(close(camera.forward(), Vec3::NEG_X));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.rotate(0.0, 10.0);
        assert!((camera.pitch - MAX_PITCH).abs() < 1e-6);
        camera.rotate(0.0, -20.0);
        assert!((camera.pitch + MAX_PITCH).abs() < 1e-6);
    }

    #[test]
    fn movement_follows_yaw() {
        let mut camera = Camera::default();
        camera.move_relative(Vec3::new(0.0, 0.0, -1.0));
        assert!(close(camera.position, Vec3::NEG_Z));

        camera.rotate(std::f32::consts::FRAC_PI_2, 0.0);
        camera.move_relative(Vec3::new(0.0, 2.0, -1.0));
        assert!(close(camera.position, Vec3::new(-1.0, 2.0, -1.0)));
    }

    #[test]
    fn chunk_uses_floor_division() {
        let camera = Camera::new(Vec3::new(-0.5, 30.0, 17.0));
        assert_eq!(camera.chunk(), ChunkCoord::new(-1, 1));
    }

    #[test]
    fn scene_view_carries_eye() {
        let camera = Camera::from_config(Vec3::new(1.0, 2.0, 3.0), &RenderConfig::default());
        let scene = camera.scene_view(16.0 / 9.0);
        assert_eq!(scene.eye, camera.position);
        assert_eq!(scene.camera_chunk(), camera.chunk());
        assert!((camera.fov_y - 90f32.to_radians()).abs() < 1e-6);
    }
}
