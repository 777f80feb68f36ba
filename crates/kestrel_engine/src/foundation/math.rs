//! Math types and helpers built on nalgebra

use nalgebra::{Matrix4, Orthographic3, Perspective3, Vector3};

/// 3-component vector of f32
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix of f32
pub type Mat4 = Matrix4<f32>;

/// Position, rotation (Euler angles, radians) and scale of an object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// World-space position
    pub pos: Vec3,
    /// Euler rotation in radians (x, y, z order)
    pub rotation: Vec3,
    /// Per-axis scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            pos: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Build the model matrix for this transform (scale, then rotate, then translate)
    pub fn to_matrix(&self) -> Mat4 {
        let translation = Mat4::new_translation(&self.pos);
        let rotation = Mat4::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z);
        let scale = Mat4::new_nonuniform_scaling(&self.scale);
        translation * rotation * scale
    }
}

/// Perspective projection with Vulkan clip-space conventions (depth 0..1, y down)
pub fn perspective_vk(aspect: f32, fovy: f32, near: f32, far: f32) -> Mat4 {
    let mut proj = Perspective3::new(aspect, fovy, near, far).to_homogeneous();
    // Vulkan's framebuffer y axis points down
    proj[(1, 1)] *= -1.0;
    proj
}

/// Pixel-space orthographic projection for 2D rendering (origin top-left)
pub fn ortho_pixel_space(width: f32, height: f32) -> Mat4 {
    Orthographic3::new(0.0, width, height, 0.0, -1.0, 1.0).to_homogeneous()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_transform_is_identity() {
        let matrix = Transform::default().to_matrix();
        assert_relative_eq!(matrix, Mat4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn transform_applies_translation_last() {
        let transform = Transform {
            pos: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::new(2.0, 2.0, 2.0),
            ..Default::default()
        };
        let point = transform.to_matrix().transform_point(&nalgebra::Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(point.x, 3.0, epsilon = 1e-6);
        assert_relative_eq!(point.y, 2.0, epsilon = 1e-6);
        assert_relative_eq!(point.z, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn perspective_flips_y_for_vulkan() {
        let proj = perspective_vk(1.0, std::f32::consts::FRAC_PI_2, 0.1, 100.0);
        assert!(proj[(1, 1)] < 0.0);
    }
}
