//! The single current mesh every operation works from.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::MeshLoadError;
use crate::geometry::TriangleMesh;
use crate::mesh_io;

/// A parsed, non-empty mesh together with the file it came from. Never
/// mutated after construction; operations re-read `source_path` to get a
/// copy of their own.
#[derive(Debug)]
pub struct LoadedMesh {
    pub mesh: TriangleMesh,
    pub source_path: PathBuf,
}

impl LoadedMesh {
    pub fn stats(&self) -> MeshStats {
        MeshStats {
            name: self
                .source_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            vertices: self.mesh.positions.len(),
            triangles: self.mesh.triangles.len(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MeshStats {
    pub name: String,
    pub vertices: usize,
    pub triangles: usize,
}

impl fmt::Display for MeshStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} vertices, {} triangles)",
            self.name, self.vertices, self.triangles
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Loaded(MeshStats),
    Empty,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Loaded(stats) => stats.fmt(f),
            SessionStatus::Empty => f.write_str("No mesh loaded"),
        }
    }
}

/// Holds at most one mesh. The slot is swapped as a whole, so readers see
/// either the previous mesh and its path or the new pair.
#[derive(Debug, Default)]
pub struct MeshSession {
    current: RwLock<Option<Arc<LoadedMesh>>>,
}

impl MeshSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_mesh(&self) -> bool {
        self.current
            .read()
            .as_ref()
            .map_or(false, |loaded| !loaded.mesh.is_empty())
    }

    /// Parse `path` and make it the current mesh. Parsing happens before the
    /// lock is taken; on failure the previous mesh stays in place.
    pub fn set_mesh(&self, path: &Path) -> Result<MeshStats, MeshLoadError> {
        let mesh = mesh_io::load_triangle_mesh(path)?;
        let loaded = Arc::new(LoadedMesh {
            mesh,
            source_path: path.to_path_buf(),
        });
        let stats = loaded.stats();
        *self.current.write() = Some(loaded);
        log::info!("Loaded mesh {}", stats);
        Ok(stats)
    }

    pub fn describe(&self) -> SessionStatus {
        match self.snapshot() {
            Some(loaded) => SessionStatus::Loaded(loaded.stats()),
            None => SessionStatus::Empty,
        }
    }

    /// The current mesh as of now. Later uploads do not affect the returned
    /// handle.
    pub fn snapshot(&self) -> Option<Arc<LoadedMesh>> {
        self.current.read().clone()
    }
}
