//! Core geometry containers shared by the loaders, the transforms and the
//! renderer.

use float_cmp::approx_eq;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Serialize, Debug, Clone, Default)]
pub struct TriangleMesh {
    pub positions: Vec<Vector3<f64>>,
    pub triangles: Vec<[usize; 3]>,
    /// Per-vertex normals. Either empty or the same length as `positions`.
    pub normals: Vec<Vector3<f64>>,
}

impl TriangleMesh {
    pub fn new(positions: Vec<Vector3<f64>>, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            positions,
            triangles,
            normals: Vec::new(),
        }
    }

    /// A mesh counts as empty when it has no vertices. Triangles without
    /// vertices cannot exist after loading, since loaders validate indices.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.positions.len()
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions.iter())
    }

    pub fn triangle_normal(&self, triangle: &[usize; 3]) -> Vector3<f64> {
        let [a, b, c] = triangle.map(|ix| self.positions[ix]);
        (b - a).cross(&(c - a))
    }

    pub fn triangle_area(&self, triangle: &[usize; 3]) -> f64 {
        self.triangle_normal(triangle).norm() * 0.5
    }

    pub fn surface_area(&self) -> f64 {
        self.triangles
            .par_iter()
            .map(|triangle| self.triangle_area(triangle))
            .sum()
    }

    /// Recompute area-weighted vertex normals from the triangle list.
    /// Vertices that belong to no triangle get a zero normal.
    pub fn compute_vertex_normals(&mut self) {
        let face_normals: Vec<Vector3<f64>> = self
            .triangles
            .par_iter()
            .map(|triangle| self.triangle_normal(triangle))
            .collect();

        let mut normals = vec![Vector3::zeros(); self.positions.len()];
        for (triangle, normal) in self.triangles.iter().zip(&face_normals) {
            for &ix in triangle {
                normals[ix] += normal;
            }
        }
        normals.par_iter_mut().for_each(|normal| {
            let length = normal.norm();
            if !approx_eq!(f64, length, 0.0, ulps = 4) {
                *normal /= length;
            }
        });
        self.normals = normals;
    }
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct PointCloud {
    pub points: Vec<Vector3<f64>>,
    /// Either empty or the same length as `points`.
    pub normals: Vec<Vector3<f64>>,
}

impl PointCloud {
    pub fn new(points: Vec<Vector3<f64>>, normals: Vec<Vector3<f64>>) -> Self {
        Self { points, normals }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.points.len()
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.points.iter())
    }
}

/// Output of a transform, handed to one of the renderers.
#[derive(Debug, Clone)]
pub enum Geometry {
    Mesh(TriangleMesh),
    Points(PointCloud),
}

impl Geometry {
    pub fn bounding_box(&self) -> Option<Aabb> {
        match self {
            Geometry::Mesh(mesh) => mesh.bounding_box(),
            Geometry::Points(cloud) => cloud.bounding_box(),
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Aabb {
    pub fn from_points<'a>(mut points: impl Iterator<Item = &'a Vector3<f64>>) -> Option<Self> {
        let first = points.next()?;
        let (min, max) = points.fold((*first, *first), |(min, max), p| {
            (min.inf(p), max.sup(p))
        });
        Some(Self { min, max })
    }

    pub fn center(&self) -> Point3<f64> {
        Point3::from((self.min + self.max) * 0.5)
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn max_extent(&self) -> f64 {
        self.extent().max()
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub distance: f64,
}

impl Plane {
    pub fn new(normal: Vector3<f64>, distance: f64) -> Self {
        Self { normal, distance }
    }

    /// Plane through a closed polygon. Uses Newell's method so that concave
    /// polygons are correctly computed. The normal follows the right-hand
    /// rule, so counter-clockwise polygons face the viewer. Returns `None`
    /// for polygons with no area.
    pub fn from_polygon(points: &[Vector3<f64>]) -> Option<Self> {
        let mut normal = Vector3::zeros();
        let mut point_a = points.last()?;
        for point_b in points {
            normal.x += (point_a.y - point_b.y) * (point_a.z + point_b.z);
            normal.y += (point_a.z - point_b.z) * (point_a.x + point_b.x);
            normal.z += (point_a.x - point_b.x) * (point_a.y + point_b.y);
            point_a = point_b;
        }
        let normal = normal.try_normalize(f64::EPSILON)?;
        let distance = normal.dot(&points[0]);
        Some(Plane::new(normal, distance))
    }
}

/// Two orthonormal axes spanning a plane, used to flatten coplanar points
/// into 2D.
#[derive(Serialize, Debug, Clone)]
pub struct OrthonormalBasis2D {
    pub u: Vector3<f64>,
    pub v: Vector3<f64>,
}

impl OrthonormalBasis2D {
    pub fn from_plane(plane: &Plane) -> Self {
        // Pick the world axis least aligned with the normal as a seed.
        let n = plane.normal;
        let seed = if n.x.abs() <= n.y.abs() && n.x.abs() <= n.z.abs() {
            Vector3::x()
        } else if n.y.abs() <= n.z.abs() {
            Vector3::y()
        } else {
            Vector3::z()
        };
        let u = n.cross(&seed).normalize();
        let v = n.cross(&u);
        Self { u, v }
    }

    pub fn transform(&self, position: &Vector3<f64>) -> [f64; 2] {
        [position.dot(&self.u), position.dot(&self.v)]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Unit cube, 8 vertices and 12 outward-facing triangles.
    pub(crate) fn unit_cube() -> TriangleMesh {
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 1.0, 1.0),
        ];
        let triangles = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 6, 2],
            [3, 7, 6],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        TriangleMesh::new(positions, triangles)
    }

    /// Latitude/longitude sphere, dense enough to exercise simplification.
    pub(crate) fn uv_sphere(rings: usize, segments: usize) -> TriangleMesh {
        use std::f64::consts::PI;
        let mut positions = vec![Vector3::new(0.0, 1.0, 0.0)];
        for ring in 1..rings {
            let phi = PI * ring as f64 / rings as f64;
            for segment in 0..segments {
                let theta = 2.0 * PI * segment as f64 / segments as f64;
                positions.push(Vector3::new(
                    phi.sin() * theta.cos(),
                    phi.cos(),
                    phi.sin() * theta.sin(),
                ));
            }
        }
        positions.push(Vector3::new(0.0, -1.0, 0.0));
        let bottom = positions.len() - 1;
        let ring_start = |ring: usize| 1 + (ring - 1) * segments;

        let mut triangles = Vec::new();
        for segment in 0..segments {
            let next = (segment + 1) % segments;
            triangles.push([0, ring_start(1) + next, ring_start(1) + segment]);
            triangles.push([
                bottom,
                ring_start(rings - 1) + segment,
                ring_start(rings - 1) + next,
            ]);
        }
        for ring in 1..rings - 1 {
            for segment in 0..segments {
                let next = (segment + 1) % segments;
                let a = ring_start(ring) + segment;
                let b = ring_start(ring) + next;
                let c = ring_start(ring + 1) + segment;
                let d = ring_start(ring + 1) + next;
                triangles.push([a, b, d]);
                triangles.push([a, d, c]);
            }
        }
        TriangleMesh::new(positions, triangles)
    }

    #[test]
    fn cube_bounds_and_area() {
        let cube = unit_cube();
        let bounds = cube.bounding_box().unwrap();
        assert_eq!(bounds.min, Vector3::zeros());
        assert_eq!(bounds.max, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(bounds.center(), Point3::new(0.5, 0.5, 0.5));
        assert!(approx_eq!(f64, cube.surface_area(), 6.0, epsilon = 1e-9));
    }

    #[test]
    fn vertex_normals_point_outwards() {
        let mut cube = unit_cube();
        cube.compute_vertex_normals();
        assert!(cube.has_normals());
        let center = Vector3::new(0.5, 0.5, 0.5);
        for (position, normal) in cube.positions.iter().zip(&cube.normals) {
            assert!(approx_eq!(f64, normal.norm(), 1.0, epsilon = 1e-9));
            assert!(normal.dot(&(position - center)) > 0.0);
        }
    }

    #[test]
    fn newell_plane_of_concave_polygon() {
        let polygon = [
            Vector3::new(0.0, 0.0, 2.0),
            Vector3::new(2.0, 0.0, 2.0),
            Vector3::new(1.0, 0.5, 2.0),
            Vector3::new(2.0, 2.0, 2.0),
            Vector3::new(0.0, 2.0, 2.0),
        ];
        let plane = Plane::from_polygon(&polygon).unwrap();
        assert!(approx_eq!(f64, plane.normal.z, 1.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, plane.distance, 2.0, epsilon = 1e-9));

        let degenerate = [Vector3::zeros(), Vector3::x(), Vector3::x() * 2.0];
        assert!(Plane::from_polygon(&degenerate).is_none());
    }

    #[test]
    fn basis_is_orthonormal() {
        let plane = Plane::new(Vector3::new(1.0, 2.0, 3.0).normalize(), 0.0);
        let basis = OrthonormalBasis2D::from_plane(&plane);
        assert!(approx_eq!(f64, basis.u.norm(), 1.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, basis.v.norm(), 1.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, basis.u.dot(&basis.v), 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, basis.u.dot(&plane.normal), 0.0, epsilon = 1e-9));
    }
}
