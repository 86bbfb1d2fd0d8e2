use std::io::{BufRead, Write};

use anyhow::{anyhow, Result};
use nalgebra::Vector3;
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use super::check_indices;
use crate::geometry::{PointCloud, TriangleMesh};
use crate::triangulation::triangulate_face;

pub(super) fn read(input: &mut impl BufRead) -> Result<TriangleMesh> {
    let parser = Parser::<DefaultElement>::new();
    let ply = parser.read_ply(input)?;

    let mut positions = Vec::new();
    if let Some(vertices) = ply.payload.get("vertex") {
        positions.reserve(vertices.len());
        for vertex in vertices {
            positions.push(Vector3::new(
                scalar(vertex, "x")?,
                scalar(vertex, "y")?,
                scalar(vertex, "z")?,
            ));
        }
    }

    let mut triangles = Vec::new();
    if let Some(faces) = ply.payload.get("face") {
        for face in faces {
            let indices = face
                .get("vertex_indices")
                .or_else(|| face.get("vertex_index"))
                .ok_or_else(|| anyhow!("face element without vertex_indices"))?;
            let indices = index_list(indices)?;
            if indices.iter().any(|&ix| ix >= positions.len()) {
                anyhow::bail!("face {:?} refers to a missing vertex", indices);
            }
            triangles.extend(triangulate_face(&positions, &indices));
        }
    }

    let mesh = TriangleMesh::new(positions, triangles);
    check_indices(&mesh)?;
    Ok(mesh)
}

fn scalar(element: &DefaultElement, key: &str) -> Result<f64> {
    match element.get(key) {
        Some(Property::Float(value)) => Ok(*value as f64),
        Some(Property::Double(value)) => Ok(*value),
        Some(Property::Int(value)) => Ok(*value as f64),
        Some(Property::UInt(value)) => Ok(*value as f64),
        Some(Property::Short(value)) => Ok(*value as f64),
        Some(Property::UShort(value)) => Ok(*value as f64),
        Some(_) => Err(anyhow!("unexpected type for vertex property `{}`", key)),
        None => Err(anyhow!("vertex without property `{}`", key)),
    }
}

fn index_list(property: &Property) -> Result<Vec<usize>> {
    fn convert<T: TryInto<usize> + Copy>(values: &[T]) -> Result<Vec<usize>> {
        values
            .iter()
            .map(|&value| {
                value
                    .try_into()
                    .map_err(|_| anyhow!("negative vertex index in face"))
            })
            .collect()
    }
    match property {
        Property::ListInt(values) => convert(values),
        Property::ListUInt(values) => convert(values),
        Property::ListShort(values) => convert(values),
        Property::ListUShort(values) => convert(values),
        Property::ListChar(values) => convert(values),
        Property::ListUChar(values) => convert(values),
        _ => Err(anyhow!("face vertex indices must be an integer list")),
    }
}

pub(super) fn write_points(cloud: &PointCloud, out: &mut impl Write) -> Result<()> {
    let with_normals = cloud.has_normals();
    writeln!(out, "ply")?;
    writeln!(out, "format ascii 1.0")?;
    writeln!(out, "comment meshbot point cloud")?;
    writeln!(out, "element vertex {}", cloud.len())?;
    for axis in ["x", "y", "z"] {
        writeln!(out, "property double {}", axis)?;
    }
    if with_normals {
        for axis in ["nx", "ny", "nz"] {
            writeln!(out, "property double {}", axis)?;
        }
    }
    writeln!(out, "end_header")?;
    for (ix, p) in cloud.points.iter().enumerate() {
        if with_normals {
            let n = cloud.normals[ix];
            writeln!(out, "{} {} {} {} {} {}", p.x, p.y, p.z, n.x, n.y, n.z)?;
        } else {
            writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_quad_mesh() {
        let source = "\
ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
1 1 0
0 1 0
4 0 1 2 3
";
        let mesh = read(&mut source.as_bytes()).unwrap();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.triangles.len(), 2);
    }

    #[test]
    fn written_cloud_reparses() {
        let cloud = PointCloud::new(
            vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(-1.0, 0.5, 0.0)],
            vec![Vector3::z(), Vector3::x()],
        );
        let mut out = Vec::new();
        write_points(&cloud, &mut out).unwrap();

        let parser = Parser::<DefaultElement>::new();
        let ply = parser.read_ply(&mut out.as_slice()).unwrap();
        let vertices = &ply.payload["vertex"];
        assert_eq!(vertices.len(), 2);
        assert_eq!(scalar(&vertices[0], "z").unwrap(), 3.0);
        assert_eq!(scalar(&vertices[1], "nx").unwrap(), 1.0);
    }
}
