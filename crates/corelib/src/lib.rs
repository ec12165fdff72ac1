//! Core types: math re-exports, Transform, Camera, bounds.

pub use glam::{EulerRot, Mat4, Quat, Vec3, vec3};

pub mod bounds;
pub mod camera;
pub mod transform;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_is_identity_matrix() {
        let t = transform::Transform::identity();
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn translate_then_scale_matrix() {
        let t = transform::Transform::from_trs(
            vec3(1.0, 2.0, 3.0),
            vec3(0.0, 0.0, 0.0),
            vec3(2.0, 2.0, 2.0),
        );
        let m = t.matrix().to_cols_array();
        assert!((m[12] - 1.0).abs() < 1e-6);
        assert!((m[13] - 2.0).abs() < 1e-6);
        assert!((m[14] - 3.0).abs() < 1e-6);
        assert!((m[0] - 2.0).abs() < 1e-6);
        assert!((m[5] - 2.0).abs() < 1e-6);
        assert!((m[10] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn spin_keeps_pivot_fixed() {
        let pivot = vec3(1.0, 2.0, 3.0);
        let m = transform::Transform::spin_about(pivot, vec3(0.3, 1.1, 0.0));
        let moved = m.transform_point3(pivot);
        assert!((moved - pivot).length() < 1e-5);
    }

    #[test]
    fn aabb_encloses_points() {
        let b = bounds::Aabb::from_points([
            vec3(-1.0, 0.0, 2.0),
            vec3(3.0, -2.0, 0.0),
            vec3(0.0, 4.0, 1.0),
        ])
        .unwrap();
        assert_eq!(b.min, vec3(-1.0, -2.0, 0.0));
        assert_eq!(b.max, vec3(3.0, 4.0, 2.0));
        assert_eq!(b.center(), vec3(1.0, 1.0, 1.0));
        assert!(bounds::Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn framing_camera_sees_whole_box() {
        let b = bounds::Aabb::from_points([vec3(-1.0, -1.0, -1.0), vec3(1.0, 1.0, 1.0)]).unwrap();
        let cam = camera::Camera::framing(&b, 60f32.to_radians(), 16.0 / 9.0);
        assert_eq!(cam.target, Vec3::ZERO);
        assert!(cam.eye.z > b.radius());
        assert!(cam.z_near < cam.eye.z - b.radius() + 1e-4);
        assert!(cam.z_far > cam.eye.z + b.radius());
        let a = cam.proj_view().to_cols_array();
        assert!(a.iter().all(|f| f.is_finite()));
    }
}
