//! Camera snapshot used by scene passes.

use umbra_core::math::{self, Mat4, Vec3};

/// View and projection state a pass renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// View matrix (world to view space).
    pub view: Mat4,
    pub projection: Mat4,
    /// Eye position in world space.
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            view: Mat4::identity(),
            projection: Mat4::identity(),
            position: Vec3::zeros(),
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    /// Perspective camera looking from `eye` at `target` with +Y up.
    pub fn perspective(eye: Vec3, target: Vec3, yfov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            view: math::look_at_rh(&eye, &target, &Vec3::y()),
            projection: math::perspective_rh(yfov, aspect, near, far),
            position: eye,
            near,
            far,
        }
    }

    /// Orthographic camera, the usual choice for directional shadow maps.
    pub fn orthographic(
        eye: Vec3,
        target: Vec3,
        half_width: f32,
        half_height: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let up = if (target - eye).cross(&Vec3::y()).norm_squared() < 1e-6 {
            Vec3::z()
        } else {
            Vec3::y()
        };
        Self {
            view: math::look_at_rh(&eye, &target, &up),
            projection: math::orthographic_rh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                near,
                far,
            ),
            position: eye,
            near,
            far,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Viewing direction in world space.
    pub fn forward(&self) -> Vec3 {
        // third row of the view rotation is the camera's +Z axis
        -Vec3::new(self.view[(2, 0)], self.view[(2, 1)], self.view[(2, 2)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_points_at_target() {
        let camera = Camera::perspective(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::zeros(),
            1.0,
            1.0,
            0.1,
            10.0,
        );
        assert!((camera.forward() - Vec3::new(0.0, 0.0, -1.0)).norm() < 1e-5);
    }

    #[test]
    fn test_orthographic_straight_down() {
        let camera = Camera::orthographic(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::zeros(),
            5.0,
            5.0,
            0.1,
            20.0,
        );
        assert!((camera.forward() - Vec3::new(0.0, -1.0, 0.0)).norm() < 1e-5);
        assert!(camera.view_projection().iter().all(|v| v.is_finite()));
    }
}
