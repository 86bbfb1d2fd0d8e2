//! Transient output files. Everything a request produces lives in the work
//! directory under a uuid name and is deleted once the guard owning it is
//! dropped, whether or not delivery succeeded.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    MeshFile,
    PointCloudFile,
    Video,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Image => "image",
            ArtifactKind::MeshFile => "mesh file",
            ArtifactKind::PointCloudFile => "point cloud file",
            ArtifactKind::Video => "video",
        };
        f.write_str(name)
    }
}

/// A generated file waiting to be delivered.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    kind: ArtifactKind,
    file_name: String,
}

impl Artifact {
    /// Reserve `<dir>/<stem>_<uuid>.<extension>`. Nothing is created on disk
    /// until a renderer writes to `path()`. `file_name` is what the
    /// recipient sees, `<stem>.<extension>`.
    pub fn reserve(dir: &Path, stem: &str, extension: &str, kind: ArtifactKind) -> Self {
        let path = dir.join(format!("{}_{}.{}", stem, Uuid::new_v4().simple(), extension));
        Self {
            path,
            kind,
            file_name: format!("{}.{}", stem, extension),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        remove_quietly(&self.path);
    }
}

/// A scratch directory removed with everything inside it on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(parent: &Path, prefix: &str) -> io::Result<Self> {
        let path = parent.join(format!("{}_{}", prefix, Uuid::new_v4().simple()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            log::debug!("could not remove {}: {}", self.path.display(), e);
        }
    }
}

/// Best-effort delete. A file that is already gone is not worth a log line.
pub fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::debug!("could not remove {}: {}", path.display(), e),
    }
}
