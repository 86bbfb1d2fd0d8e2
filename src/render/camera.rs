use std::f64::consts::PI;

use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Vector3};

use crate::config::RenderConfig;
use crate::geometry::Aabb;

#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Point3<f64>,
    pub target: Point3<f64>,
    pub up: Vector3<f64>,
    /// Vertical field of view in radians.
    pub fov_y: f64,
    pub near: f64,
    pub far: f64,
}

impl Camera {
    fn looking_at(eye: Point3<f64>, target: Point3<f64>, bounds: &Aabb, fov_y: f64) -> Self {
        let distance = (eye - target).norm();
        let reach = bounds.extent().norm().max(f64::EPSILON);
        Self {
            eye,
            target,
            up: Vector3::y(),
            fov_y,
            near: (distance * 0.01).max(1e-6),
            far: distance + 2.0 * reach + 1.0,
        }
    }

    /// The fixed still-image view: azimuth and elevation come from the
    /// config, distance from zoom and the bounding-box diagonal.
    pub fn oblique(bounds: &Aabb, config: &RenderConfig) -> Self {
        let fov_y = config.fov_degrees.to_radians();
        let diagonal = match bounds.extent().norm() {
            d if d > 0.0 => d,
            _ => 1.0,
        };
        let distance = config.zoom * diagonal / (fov_y * 0.5).tan();
        let azimuth = config.azimuth_degrees.to_radians();
        let elevation = config.elevation_degrees.to_radians();
        let direction = Vector3::new(
            elevation.cos() * azimuth.sin(),
            elevation.sin(),
            elevation.cos() * azimuth.cos(),
        );
        let target = bounds.center();
        Self::looking_at(target + direction * distance, target, bounds, fov_y)
    }

    /// Camera `frame` of `frames` on a horizontal orbit around the bounding
    /// box centre. The eye stays at the centre's height.
    pub fn orbit(
        bounds: &Aabb,
        config: &RenderConfig,
        radius_factor: f64,
        frame: u32,
        frames: u32,
    ) -> Self {
        let fov_y = config.fov_degrees.to_radians();
        let radius = match bounds.extent().norm() * radius_factor {
            r if r > 0.0 => r,
            _ => 1.0,
        };
        let angle = frame as f64 / frames.max(1) as f64 * 2.0 * PI;
        let target = bounds.center();
        let eye = target + Vector3::new(radius * angle.cos(), 0.0, radius * angle.sin());
        Self::looking_at(eye, target, bounds, fov_y)
    }

    pub fn view_projection(&self, aspect: f64) -> Matrix4<f64> {
        let view = Isometry3::look_at_rh(&self.eye, &self.target, &self.up);
        let projection = Perspective3::new(aspect, self.fov_y, self.near, self.far);
        projection.as_matrix() * view.to_homogeneous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn unit_bounds() -> Aabb {
        Aabb {
            min: Vector3::zeros(),
            max: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    #[test]
    fn orbit_keeps_radius_and_height() {
        let bounds = unit_bounds();
        let config = RenderConfig::default();
        let expected = 1.5 * 3f64.sqrt();
        for frame in [0, 10, 36, 71] {
            let camera = Camera::orbit(&bounds, &config, 1.5, frame, 72);
            assert!(approx_eq!(f64, (camera.eye - camera.target).norm(), expected, epsilon = 1e-9));
            assert!(approx_eq!(f64, camera.eye.y, 0.5, epsilon = 1e-12));
            assert_eq!(camera.target, Point3::new(0.5, 0.5, 0.5));
        }
    }

    #[test]
    fn orbit_completes_one_turn() {
        let bounds = unit_bounds();
        let config = RenderConfig::default();
        let first = Camera::orbit(&bounds, &config, 1.5, 0, 4);
        let half = Camera::orbit(&bounds, &config, 1.5, 2, 4);
        assert!(approx_eq!(f64, first.eye.x - 0.5, -(half.eye.x - 0.5), epsilon = 1e-9));
    }

    #[test]
    fn target_projects_to_screen_centre() {
        let bounds = unit_bounds();
        let camera = Camera::oblique(&bounds, &RenderConfig::default());
        let clip = camera.view_projection(4.0 / 3.0) * camera.target.to_homogeneous();
        assert!(clip.w > 0.0);
        assert!(approx_eq!(f64, clip.x / clip.w, 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, clip.y / clip.w, 0.0, epsilon = 1e-9));
    }
}
