//! Surface sampling. Uniform sampling picks triangles proportionally to
//! their area; Poisson-disk sampling over-samples uniformly and then thins
//! the set with weighted sample elimination (Yuksel 2015) until exactly the
//! requested number of points remains.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use anyhow::{bail, Result};
use nalgebra::Vector3;
use rand::Rng;
use rayon::prelude::*;

use crate::geometry::{PointCloud, TriangleMesh};

const ELIMINATION_ALPHA: f64 = 8.0;
const ELIMINATION_BETA: f64 = 0.65;
const ELIMINATION_GAMMA: f64 = 1.5;

pub fn sample_points_uniformly<R: Rng>(
    mesh: &TriangleMesh,
    count: usize,
    rng: &mut R,
) -> Result<PointCloud> {
    let areas: Vec<f64> = mesh
        .triangles
        .par_iter()
        .map(|triangle| mesh.triangle_area(triangle))
        .collect();
    let cumulative: Vec<f64> = areas
        .iter()
        .scan(0.0, |total, area| {
            *total += area;
            Some(*total)
        })
        .collect();
    let total = match cumulative.last() {
        Some(&total) if total > 0.0 => total,
        _ => bail!("mesh has no surface area to sample"),
    };

    let mut points = Vec::with_capacity(count);
    let mut normals = Vec::with_capacity(count);
    for _ in 0..count {
        let target = rng.random::<f64>() * total;
        let triangle_ix = cumulative
            .partition_point(|&sum| sum <= target)
            .min(cumulative.len() - 1);
        let triangle = &mesh.triangles[triangle_ix];

        let r1 = rng.random::<f64>().sqrt();
        let r2 = rng.random::<f64>();
        let weights = [1.0 - r1, r1 * (1.0 - r2), r1 * r2];

        let [a, b, c] = triangle.map(|ix| mesh.positions[ix]);
        points.push(a * weights[0] + b * weights[1] + c * weights[2]);

        let normal = if mesh.has_normals() {
            let [na, nb, nc] = triangle.map(|ix| mesh.normals[ix]);
            na * weights[0] + nb * weights[1] + nc * weights[2]
        } else {
            mesh.triangle_normal(triangle)
        };
        normals.push(normal.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros));
    }

    Ok(PointCloud::new(points, normals))
}

/// Blue-noise sampling. `init_factor` controls the size of the uniform
/// candidate set relative to `count`; a factor of 1 leaves nothing to
/// eliminate and degrades to plain uniform sampling.
pub fn sample_points_poisson_disk<R: Rng>(
    mesh: &TriangleMesh,
    count: usize,
    init_factor: usize,
    rng: &mut R,
) -> Result<PointCloud> {
    if count == 0 {
        bail!("cannot sample zero points");
    }
    let candidates = sample_points_uniformly(mesh, count * init_factor.max(1), rng)?;
    Ok(eliminate_samples(candidates, count, mesh.surface_area()))
}

#[derive(PartialEq)]
struct Candidate {
    weight: f64,
    ix: usize,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then(self.ix.cmp(&other.ix))
    }
}

/// Repeatedly drop the sample with the most crowded neighbourhood until
/// `target` samples remain.
fn eliminate_samples(cloud: PointCloud, target: usize, surface_area: f64) -> PointCloud {
    let n = cloud.len();
    if n <= target {
        return cloud;
    }

    let ratio = target as f64 / n as f64;
    let r_max = 2.0 * ((surface_area / target as f64) / (2.0 * 3f64.sqrt())).sqrt();
    let r_min = r_max * ELIMINATION_BETA * (1.0 - ratio.powf(ELIMINATION_GAMMA));
    let weight = |distance: f64| (1.0 - distance.max(r_min) / r_max).powf(ELIMINATION_ALPHA);

    let grid = SpatialGrid::new(&cloud.points, r_max);
    let neighbours: Vec<Vec<(usize, f64)>> = (0..n)
        .into_par_iter()
        .map(|ix| {
            grid.neighbours(&cloud.points, ix, r_max)
                .into_iter()
                .map(|(other, distance)| (other, weight(distance)))
                .collect()
        })
        .collect();

    let mut weights: Vec<f64> = neighbours
        .iter()
        .map(|list| list.iter().map(|(_, w)| w).sum())
        .collect();
    let mut heap: BinaryHeap<Candidate> = weights
        .iter()
        .enumerate()
        .map(|(ix, &weight)| Candidate { weight, ix })
        .collect();
    let mut removed = vec![false; n];
    let mut remaining = n;

    while remaining > target {
        let Candidate { weight, ix } = match heap.pop() {
            Some(candidate) => candidate,
            None => break,
        };
        // Entries are pushed again whenever a weight drops; skip stale ones.
        if removed[ix] || weight.to_bits() != weights[ix].to_bits() {
            continue;
        }
        removed[ix] = true;
        remaining -= 1;
        for &(other, w) in &neighbours[ix] {
            if !removed[other] {
                weights[other] -= w;
                heap.push(Candidate {
                    weight: weights[other],
                    ix: other,
                });
            }
        }
    }

    let keep = |ix: &usize| !removed[*ix];
    let points = (0..n).filter(keep).map(|ix| cloud.points[ix]).collect();
    let normals = if cloud.has_normals() {
        (0..n).filter(keep).map(|ix| cloud.normals[ix]).collect()
    } else {
        Vec::new()
    };
    PointCloud::new(points, normals)
}

/// Uniform hash grid for fixed-radius neighbour queries.
struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    fn new(points: &[Vector3<f64>], cell_size: f64) -> Self {
        let mut cells: HashMap<_, Vec<usize>> = HashMap::new();
        for (ix, point) in points.iter().enumerate() {
            cells.entry(Self::key(point, cell_size)).or_default().push(ix);
        }
        Self { cell_size, cells }
    }

    fn key(point: &Vector3<f64>, cell_size: f64) -> (i64, i64, i64) {
        (
            (point.x / cell_size).floor() as i64,
            (point.y / cell_size).floor() as i64,
            (point.z / cell_size).floor() as i64,
        )
    }

    /// Indices and distances of every other point closer than `radius`,
    /// which must not exceed the cell size.
    fn neighbours(&self, points: &[Vector3<f64>], ix: usize, radius: f64) -> Vec<(usize, f64)> {
        let (cx, cy, cz) = Self::key(&points[ix], self.cell_size);
        let mut found = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(cell) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &other in cell {
                        if other == ix {
                            continue;
                        }
                        let distance = (points[other] - points[ix]).norm();
                        if distance < radius {
                            found.push((other, distance));
                        }
                    }
                }
            }
        }
        found
    }
}
