//! The three mesh transforms behind `/crinkle`, `/dot` and `/poly`.

mod cluster;
mod crinkle;
mod sample;

pub use cluster::{simplify, simplify_vertex_clustering};
pub use crinkle::{add_uniform_noise, crinkle, smooth_simple};
pub use sample::{sample_points_poisson_disk, sample_points_uniformly};
