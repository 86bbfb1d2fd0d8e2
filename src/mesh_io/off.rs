//! Object File Format: a header line, element counts, then one vertex per
//! line followed by one polygon per line.

use std::io::BufRead;

use anyhow::{anyhow, Context, Result};
use nalgebra::Vector3;

use super::check_indices;
use crate::geometry::TriangleMesh;
use crate::triangulation::triangulate_face;

pub(super) fn read(input: impl BufRead) -> Result<TriangleMesh> {
    let mut lines = input
        .lines()
        .map(|line| line.map(strip_comment))
        .filter(|line| !matches!(line, Ok(line) if line.is_empty()));

    let mut next_line = || -> Result<String> {
        lines
            .next()
            .ok_or_else(|| anyhow!("unexpected end of file"))?
            .map_err(Into::into)
    };

    let header = next_line()?;
    let counts_line = match header.strip_prefix("OFF") {
        Some(rest) if !rest.trim().is_empty() => rest.trim().to_string(),
        Some(_) => next_line()?,
        None => return Err(anyhow!("missing OFF header")),
    };
    let counts = parse_numbers::<usize>(&counts_line).context("reading element counts")?;
    let (vertex_count, face_count) = match counts.as_slice() {
        [vertices, faces, ..] => (*vertices, *faces),
        _ => return Err(anyhow!("expected vertex and face counts")),
    };

    let mut positions = Vec::with_capacity(vertex_count);
    for ix in 0..vertex_count {
        let values = parse_numbers::<f64>(&next_line()?)
            .with_context(|| format!("reading vertex {}", ix))?;
        match values.as_slice() {
            [x, y, z, ..] => positions.push(Vector3::new(*x, *y, *z)),
            _ => return Err(anyhow!("vertex {} has fewer than 3 coordinates", ix)),
        }
    }

    let mut triangles = Vec::with_capacity(face_count);
    for ix in 0..face_count {
        // Per-face colour values may trail the index list; ignore them.
        let line = next_line()?;
        let mut fields = line.split_whitespace();
        let arity: usize = fields
            .next()
            .ok_or_else(|| anyhow!("face {} is empty", ix))?
            .parse()
            .with_context(|| format!("reading face {}", ix))?;
        let face = fields
            .take(arity)
            .map(|field| field.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("reading face {}", ix))?;
        if face.len() != arity {
            return Err(anyhow!("face {} lists fewer than {} indices", ix, arity));
        }
        if face.iter().any(|&v| v >= positions.len()) {
            return Err(anyhow!("face {} refers to a missing vertex", ix));
        }
        triangles.extend(triangulate_face(&positions, &face));
    }

    let mesh = TriangleMesh::new(positions, triangles);
    check_indices(&mesh)?;
    Ok(mesh)
}

fn strip_comment(line: String) -> String {
    match line.find('#') {
        Some(ix) => line[..ix].trim().to_string(),
        None => line.trim().to_string(),
    }
}

fn parse_numbers<T: std::str::FromStr>(line: &str) -> Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    line.split_whitespace()
        .map(|field| field.parse::<T>().map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tetrahedron_with_comments() {
        let source = "\
OFF
# a tetrahedron
4 4 6
0 0 0
1 0 0
0 1 0
0 0 1
3 0 2 1
3 0 1 3
3 0 3 2
3 1 2 3 255 0 0
";
        let mesh = read(source.as_bytes()).unwrap();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.triangles.len(), 4);
        assert_eq!(mesh.triangles[3], [1, 2, 3]);
    }

    #[test]
    fn truncated_file() {
        let source = "OFF\n3 1 0\n0 0 0\n1 0 0\n";
        assert!(read(source.as_bytes()).is_err());
    }

    #[test]
    fn missing_header() {
        assert!(read("3 1 0\n".as_bytes()).is_err());
    }
}
