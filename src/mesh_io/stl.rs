use std::io::{Read, Seek};

use anyhow::Result;
use nalgebra::Vector3;

use super::check_indices;
use crate::geometry::TriangleMesh;

/// Read an ASCII or binary STL. `stl_io` already merges the duplicated
/// corners of the triangle soup into an indexed mesh.
pub(super) fn read<R: Read + Seek>(input: &mut R) -> Result<TriangleMesh> {
    let stl = stl_io::read_stl(input)?;

    let positions = stl
        .vertices
        .iter()
        .map(|vertex| Vector3::new(vertex[0] as f64, vertex[1] as f64, vertex[2] as f64))
        .collect();

    let triangles = stl.faces.iter().map(|face| face.vertices).collect();

    let mesh = TriangleMesh::new(positions, triangles);
    check_indices(&mesh)?;
    Ok(mesh)
}
