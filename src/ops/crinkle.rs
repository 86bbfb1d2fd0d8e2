use nalgebra::Vector3;
use rand::Rng;

use crate::geometry::TriangleMesh;

/// Noise, one smoothing pass, fresh normals. Topology is untouched.
pub fn crinkle<R: Rng>(mut mesh: TriangleMesh, noise: f64, rng: &mut R) -> TriangleMesh {
    add_uniform_noise(&mut mesh, noise, rng);
    let mut smoothed = smooth_simple(&mesh, 1);
    smoothed.compute_vertex_normals();
    smoothed
}

/// Offset every coordinate of every vertex by an independent sample from
/// `[0, noise)`.
pub fn add_uniform_noise<R: Rng>(mesh: &mut TriangleMesh, noise: f64, rng: &mut R) {
    if noise <= 0.0 {
        return;
    }
    for position in mesh.positions.iter_mut() {
        *position += Vector3::new(
            rng.random::<f64>() * noise,
            rng.random::<f64>() * noise,
            rng.random::<f64>() * noise,
        );
    }
}

/// Simple Laplacian smoothing: each vertex moves to the average of itself
/// and its edge neighbours. Isolated vertices stay where they are.
pub fn smooth_simple(mesh: &TriangleMesh, iterations: usize) -> TriangleMesh {
    let adjacency = adjacency_list(mesh);
    let mut positions = mesh.positions.clone();
    for _ in 0..iterations {
        positions = adjacency
            .iter()
            .enumerate()
            .map(|(ix, neighbours)| {
                let sum = neighbours
                    .iter()
                    .fold(positions[ix], |sum, &n| sum + positions[n]);
                sum / (neighbours.len() + 1) as f64
            })
            .collect();
    }
    TriangleMesh::new(positions, mesh.triangles.clone())
}

fn adjacency_list(mesh: &TriangleMesh) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); mesh.positions.len()];
    for &[a, b, c] in &mesh.triangles {
        for (from, to) in [(a, b), (b, c), (c, a)] {
            adjacency[from].push(to);
            adjacency[to].push(from);
        }
    }
    for neighbours in adjacency.iter_mut() {
        neighbours.sort_unstable();
        neighbours.dedup();
    }
    adjacency
}
