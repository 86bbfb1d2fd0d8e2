use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A request that cannot be started. Detected before any work begins and
/// never retried; the caller has to resubmit.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("No mesh loaded! Please upload a mesh first using `/upload`")]
    NoMesh,
    #[error("{parameter} must be between {min} and {max}")]
    OutOfRange {
        parameter: &'static str,
        min: &'static str,
        max: &'static str,
    },
    #[error("Output type must be either {}", quoted(.allowed))]
    UnsupportedOutput {
        requested: String,
        allowed: &'static [&'static str],
    },
    #[error("File too large! Please upload a file smaller than {}MB.", .max / (1024 * 1024))]
    FileTooLarge { size: u64, max: u64 },
    #[error("Unsupported file format! Please upload one of: {}", .allowed.join(", "))]
    UnsupportedExtension { extension: String, allowed: Vec<String> },
    #[error("Command not found! Try `/info`, `/upload`, `/crinkle`, `/dot` or `/poly`")]
    UnknownCommand(String),
    #[error("Invalid value for `{argument}`: {reason}")]
    BadArgument { argument: String, reason: String },
}

fn quoted(values: &[&str]) -> String {
    let quoted: Vec<String> = values.iter().map(|value| format!("'{}'", value)).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{}, or {}", rest.join(", "), last),
        _ => quoted.concat(),
    }
}

/// The backing file of a mesh could not be turned into a usable mesh.
#[derive(Debug, Error)]
pub enum MeshLoadError {
    #[error("mesh file {0} does not exist")]
    Missing(PathBuf),
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("{0} contains no geometry")]
    Empty(PathBuf),
    #[error("no mesh reader for extension `{0}`")]
    UnsupportedFormat(String),
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    MeshLoad(#[from] MeshLoadError),
    /// Anything that failed after validation passed: transform, render or
    /// encode. Carries the formatted error chain.
    #[error("{0}")]
    Processing(String),
}

impl BotError {
    pub fn processing(error: anyhow::Error) -> Self {
        BotError::Processing(format!("{:#}", error))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, BotError::Validation(_))
    }
}
