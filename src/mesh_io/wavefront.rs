use std::io::{BufRead, Write};

use anyhow::Result;
use nalgebra::Vector3;
use obj::raw::object::Polygon;
use obj::raw::parse_obj;

use super::check_indices;
use crate::geometry::TriangleMesh;
use crate::triangulation::triangulate_face;

pub(super) fn read(input: impl BufRead) -> Result<TriangleMesh> {
    let obj = parse_obj(input)?;

    // Only positions matter; texture coordinates and normals are dropped and
    // normals are recomputed by whoever needs them.
    let positions: Vec<_> = obj
        .positions
        .iter()
        .map(|x| Vector3::new(x.0 as f64, x.1 as f64, x.2 as f64))
        .collect();

    let mut triangles = Vec::with_capacity(obj.polygons.len());
    for polygon in &obj.polygons {
        let face: Vec<usize> = match polygon {
            Polygon::P(ref vec) => vec.clone(),
            Polygon::PT(ref vec) => vec.iter().map(|&(pi, _)| pi).collect(),
            Polygon::PN(ref vec) => vec.iter().map(|&(pi, _)| pi).collect(),
            Polygon::PTN(ref vec) => vec.iter().map(|&(pi, _, _)| pi).collect(),
        };
        if face.iter().any(|&ix| ix >= positions.len()) {
            anyhow::bail!("polygon {:?} refers to a missing vertex", face);
        }
        triangles.extend(triangulate_face(&positions, &face));
    }

    let mesh = TriangleMesh::new(positions, triangles);
    check_indices(&mesh)?;
    Ok(mesh)
}

pub(super) fn write(mesh: &TriangleMesh, out: &mut impl Write) -> Result<()> {
    writeln!(out, "# meshbot")?;
    writeln!(
        out,
        "# {} vertices, {} triangles",
        mesh.positions.len(),
        mesh.triangles.len()
    )?;
    for p in &mesh.positions {
        writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
    }
    if mesh.has_normals() {
        for n in &mesh.normals {
            writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
        }
        for [a, b, c] in &mesh.triangles {
            writeln!(out, "f {0}//{0} {1}//{1} {2}//{2}", a + 1, b + 1, c + 1)?;
        }
    } else {
        for [a, b, c] in &mesh.triangles {
            writeln!(out, "f {} {} {}", a + 1, b + 1, c + 1)?;
        }
    }
    out.flush()?;
    Ok(())
}
