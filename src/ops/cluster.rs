//! This module reduces a mesh's vertices by clustering them on a voxel grid.

use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use itertools::Itertools;
use nalgebra::Vector3;

use crate::geometry::TriangleMesh;

/// Simplify with a voxel size of the mesh's largest bounding-box extent
/// divided by `factor`. Larger factors mean smaller voxels and therefore a
/// finer result.
pub fn simplify(mesh: &TriangleMesh, factor: u32) -> Result<TriangleMesh> {
    let bounds = match mesh.bounding_box() {
        Some(bounds) => bounds,
        None => bail!("cannot simplify an empty mesh"),
    };
    if factor == 0 {
        bail!("simplification factor must be positive");
    }
    let voxel_size = bounds.max_extent() / factor as f64;
    log::debug!("voxel_size = {:e}", voxel_size);
    simplify_vertex_clustering(mesh, voxel_size)
}

/// Replace all vertices falling into the same voxel with their average,
/// then rebuild the triangle list, dropping triangles that collapsed or
/// became duplicates.
pub fn simplify_vertex_clustering(mesh: &TriangleMesh, voxel_size: f64) -> Result<TriangleMesh> {
    if !(voxel_size > 0.0) {
        bail!("voxel size must be positive, got {}", voxel_size);
    }
    let bounds = match mesh.bounding_box() {
        Some(bounds) => bounds,
        None => bail!("cannot simplify an empty mesh"),
    };
    let grid_origin = bounds.min - Vector3::repeat(voxel_size * 0.5);

    let mut clusters = VoxelClusterMap::new();
    let vertex_to_cluster: Vec<usize> = mesh
        .positions
        .iter()
        .map(|&position| {
            let key = VoxelKey::new(&position, &grid_origin, voxel_size);
            clusters.add(key, position)
        })
        .collect();

    let mut seen = HashSet::new();
    let mut triangles = Vec::new();
    for triangle in &mesh.triangles {
        let remapped = triangle.map(|ix| vertex_to_cluster[ix]);
        let [a, b, c] = remapped;
        if a == b || b == c || c == a {
            continue;
        }
        if seen.insert(canonical_rotation(remapped)) {
            triangles.push(remapped);
        }
    }

    let mut simplified = TriangleMesh::new(clusters.into_positions(), triangles);
    simplified.compute_vertex_normals();
    log::debug!(
        "Simplified mesh has {} vertices and {} triangles",
        simplified.positions.len(),
        simplified.triangles.len()
    );
    Ok(simplified)
}

/// Rotate so the smallest index comes first, preserving winding. Two
/// triangles with the same corners and orientation compare equal.
fn canonical_rotation(triangle: [usize; 3]) -> [usize; 3] {
    let start = triangle.iter().position_min().unwrap_or(0);
    [
        triangle[start],
        triangle[(start + 1) % 3],
        triangle[(start + 2) % 3],
    ]
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
struct VoxelKey(i64, i64, i64);

impl VoxelKey {
    fn new(position: &Vector3<f64>, origin: &Vector3<f64>, voxel_size: f64) -> Self {
        let cell = (position - origin) / voxel_size;
        VoxelKey(
            cell.x.floor() as i64,
            cell.y.floor() as i64,
            cell.z.floor() as i64,
        )
    }
}

struct VoxelClusterMap {
    map: HashMap<VoxelKey, usize>,
    sums: Vec<(Vector3<f64>, usize)>,
}

impl VoxelClusterMap {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            sums: Vec::new(),
        }
    }

    fn add(&mut self, key: VoxelKey, position: Vector3<f64>) -> usize {
        match self.map.entry(key) {
            Occupied(e) => {
                let ix = *e.get();
                let (sum, count) = &mut self.sums[ix];
                *sum += position;
                *count += 1;
                ix
            }
            Vacant(e) => {
                let result = self.sums.len();
                e.insert(result);
                self.sums.push((position, 1));
                result
            }
        }
    }

    fn into_positions(self) -> Vec<Vector3<f64>> {
        self.sums
            .into_iter()
            .map(|(sum, count)| sum / count as f64)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::{unit_cube, uv_sphere};

    #[test]
    fn cube_survives_coarse_grid() {
        let cube = unit_cube();
        let simplified = simplify(&cube, 4).unwrap();
        assert!(simplified.positions.len() <= 8);
        assert_eq!(simplified.positions.len(), 8);
        assert_eq!(simplified.triangles.len(), 12);
    }

    #[test]
    fn counts_never_grow() {
        let sphere = uv_sphere(24, 32);
        for factor in [4, 8, 16, 50, 100] {
            let simplified = simplify(&sphere, factor).unwrap();
            assert!(simplified.positions.len() <= sphere.positions.len());
            assert!(simplified.triangles.len() <= sphere.triangles.len());
        }
    }

    #[test]
    fn coarser_grid_gives_fewer_vertices() {
        let sphere = uv_sphere(24, 32);
        let coarse = simplify(&sphere, 4).unwrap();
        let fine = simplify(&sphere, 100).unwrap();
        assert!(coarse.positions.len() < fine.positions.len());
        assert!(coarse.triangles.len() < fine.triangles.len());
    }

    #[test]
    fn one_voxel_collapses_everything() {
        let simplified = simplify_vertex_clustering(&unit_cube(), 10.0).unwrap();
        assert_eq!(simplified.positions.len(), 1);
        assert!(simplified.triangles.is_empty());
        assert_eq!(simplified.positions[0], Vector3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn duplicate_triangles_are_merged() {
        let mesh = TriangleMesh::new(
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.01, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 2, 3], [1, 2, 3]],
        );
        let simplified = simplify_vertex_clustering(&mesh, 0.25).unwrap();
        assert_eq!(simplified.positions.len(), 3);
        assert_eq!(simplified.triangles.len(), 1);
    }

    #[test]
    fn rejects_non_positive_voxels() {
        assert!(simplify_vertex_clustering(&unit_cube(), 0.0).is_err());
        assert!(simplify_vertex_clustering(&unit_cube(), f64::NAN).is_err());
        assert!(simplify(&unit_cube(), 0).is_err());
    }
}
