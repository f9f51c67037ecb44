//! Chunk-granularity view frustum culling.

use glam::{Mat4, Vec3, Vec4};

/// Six clip planes (`xyz` normal pointing inward, `w` distance).
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract planes from a view-projection matrix with a `0..1` depth
    /// range.
    pub fn from_view_projection(m: Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(normalize_plane);
        Self { planes }
    }

    /// Whether an axis-aligned box is at least partly inside.
    ///
    /// Conservative: boxes straddling a frustum corner may pass.
    pub fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            // Corner furthest along the plane normal.
            let p = Vec3::select(normal.cmpge(Vec3::ZERO), max, min);
            normal.dot(p) + plane.w >= 0.0
        })
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let len = plane.truncate().length();
    if len > 0.0 {
        plane / len
    } else {
        plane
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_negative_z() -> Frustum {
        let proj = Mat4::perspective_rh(90f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        Frustum::from_view_projection(proj * view)
    }

    #[test]
    fn box_in_front_is_visible() {
        let frustum = looking_down_negative_z();
        assert!(frustum.intersects_aabb(Vec3::new(-1.0, -1.0, -11.0), Vec3::new(1.0, 1.0, -9.0)));
    }

    #[test]
    fn box_behind_is_culled() {
        let frustum = looking_down_negative_z();
        assert!(!frustum.intersects_aabb(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 8.0)));
    }

    #[test]
    fn box_beyond_far_plane_is_culled() {
        let frustum = looking_down_negative_z();
        assert!(!frustum.intersects_aabb(Vec3::new(-1.0, -1.0, -300.0), Vec3::new(1.0, 1.0, -200.0)));
    }

    #[test]
    fn box_containing_the_eye_is_visible() {
        let frustum = looking_down_negative_z();
        assert!(frustum.intersects_aabb(Vec3::splat(-8.0), Vec3::splat(8.0)));
    }

    #[test]
    fn box_far_to_the_side_is_culled() {
        let frustum = looking_down_negative_z();
        // 90 degree fov: at z = -10 the view spans x in [-10, 10].
        assert!(!frustum.intersects_aabb(Vec3::new(30.0, -1.0, -11.0), Vec3::new(32.0, 1.0, -9.0)));
    }
}
