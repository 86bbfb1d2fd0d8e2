//! Reading triangle meshes from disk and writing transformed geometry back
//! out.

mod off;
mod ply;
mod stl;
mod wavefront;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::MeshLoadError;
use crate::geometry::{PointCloud, TriangleMesh};

/// Extensions `load_triangle_mesh` knows how to read, lowercase with the dot.
pub const READABLE_EXTENSIONS: &[&str] = &[".obj", ".ply", ".stl", ".off"];

/// Lowercased extension including the leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Load `path` as a triangle mesh, choosing the reader by extension.
/// Empty results are an error, so a returned mesh always has vertices.
pub fn load_triangle_mesh(path: &Path) -> Result<TriangleMesh, MeshLoadError> {
    if !path.exists() {
        return Err(MeshLoadError::Missing(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| MeshLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let parse_error = |reason: String| MeshLoadError::Parse {
        path: path.to_path_buf(),
        reason,
    };
    let extension = extension_of(path);
    let mesh = match extension.as_str() {
        ".obj" => wavefront::read(&mut reader).map_err(|e| parse_error(format!("{:#}", e)))?,
        ".stl" => stl::read(&mut reader).map_err(|e| parse_error(format!("{:#}", e)))?,
        ".ply" => ply::read(&mut reader).map_err(|e| parse_error(format!("{:#}", e)))?,
        ".off" => off::read(&mut reader).map_err(|e| parse_error(format!("{:#}", e)))?,
        _ => return Err(MeshLoadError::UnsupportedFormat(extension)),
    };

    if mesh.is_empty() || mesh.triangles.is_empty() {
        return Err(MeshLoadError::Empty(path.to_path_buf()));
    }
    Ok(mesh)
}

/// Ensure every face index refers to an existing vertex.
fn check_indices(mesh: &TriangleMesh) -> Result<()> {
    let count = mesh.positions.len();
    if let Some(triangle) = mesh
        .triangles
        .iter()
        .find(|triangle| triangle.iter().any(|&ix| ix >= count))
    {
        anyhow::bail!(
            "face {:?} refers to a vertex past the end of {} vertices",
            triangle,
            count
        );
    }
    Ok(())
}

/// Write `mesh` as a Wavefront OBJ with positions, normals (when present)
/// and triangle faces.
pub fn write_obj(mesh: &TriangleMesh, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    wavefront::write(mesh, &mut BufWriter::new(file))
        .with_context(|| format!("writing {}", path.display()))
}

/// Write `cloud` as an ASCII PLY point cloud.
pub fn write_point_cloud_ply(cloud: &PointCloud, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    ply::write_points(cloud, &mut BufWriter::new(file))
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::unit_cube;
    use std::fs;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("meshbot-io-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of(Path::new("a/b/Bunny.OBJ")), ".obj");
        assert_eq!(extension_of(Path::new("noext")), "");
    }

    #[test]
    fn missing_file() {
        let path = scratch("absent.obj");
        assert!(matches!(
            load_triangle_mesh(&path),
            Err(MeshLoadError::Missing(_))
        ));
    }

    #[test]
    fn unsupported_format() {
        let path = scratch("cloud.xyz");
        fs::write(&path, "0 0 0\n1 1 1\n").unwrap();
        assert!(matches!(
            load_triangle_mesh(&path),
            Err(MeshLoadError::UnsupportedFormat(ext)) if ext == ".xyz"
        ));
    }

    #[test]
    fn empty_obj_is_rejected() {
        let path = scratch("empty.obj");
        fs::write(&path, "# nothing here\n").unwrap();
        assert!(matches!(
            load_triangle_mesh(&path),
            Err(MeshLoadError::Empty(_))
        ));
    }

    #[test]
    fn obj_written_then_read() {
        let path = scratch("cube.obj");
        let mut cube = unit_cube();
        cube.compute_vertex_normals();
        write_obj(&cube, &path).unwrap();

        let loaded = load_triangle_mesh(&path).unwrap();
        assert_eq!(loaded.positions.len(), 8);
        assert_eq!(loaded.triangles, cube.triangles);
    }

    #[test]
    fn out_of_range_index_is_a_parse_error() {
        let path = scratch("broken.off");
        fs::write(&path, "OFF\n3 1 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 7\n").unwrap();
        assert!(matches!(
            load_triangle_mesh(&path),
            Err(MeshLoadError::Parse { .. })
        ));
    }
}
