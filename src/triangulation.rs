//! This module triangulates polygonal faces read from mesh files into index
//! triangles.

use earcutr::earcut;
use nalgebra::Vector3;

use crate::geometry::{OrthonormalBasis2D, Plane};

/// Triangulate one polygonal face. `face` holds indices into `positions`;
/// the returned triangles keep the winding of the input polygon.
pub fn triangulate_face(positions: &[Vector3<f64>], face: &[usize]) -> Vec<[usize; 3]> {
    match face.len() {
        0..=2 => Vec::new(),
        3 => vec![[face[0], face[1], face[2]]],
        _ => {
            let points: Vec<_> = face.iter().map(|&ix| positions[ix]).collect();
            let plane = match Plane::from_polygon(&points) {
                Some(plane) => plane,
                None => return fan(face),
            };
            let basis = OrthonormalBasis2D::from_plane(&plane);
            let polygon2d: Vec<f64> = points
                .iter()
                .map(|x| basis.transform(x))
                .flatten()
                .collect();
            let indices = earcut(&polygon2d, &vec![], 2);
            if indices.len() < 3 {
                return fan(face);
            }
            indices
                .chunks_exact(3)
                .map(|tri| orient([face[tri[0]], face[tri[1]], face[tri[2]]], positions, &plane))
                .collect()
        }
    }
}

/// Earcut emits triangles in whatever orientation it likes; flip those
/// that disagree with the polygon's own normal.
fn orient(triangle: [usize; 3], positions: &[Vector3<f64>], plane: &Plane) -> [usize; 3] {
    let [a, b, c] = triangle.map(|ix| positions[ix]);
    if (b - a).cross(&(c - a)).dot(&plane.normal) < 0.0 {
        [triangle[0], triangle[2], triangle[1]]
    } else {
        triangle
    }
}

fn fan(face: &[usize]) -> Vec<[usize; 3]> {
    (1..face.len() - 1)
        .map(|i| [face[0], face[i], face[i + 1]])
        .collect()
}
