//! Runtime configuration, read from YAML. Every field has a default so an
//! empty or partial file is valid.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct BotConfig {
    /// Where uploads, artifacts and video frames go. Defaults to a
    /// `meshbot` directory under the system temp dir.
    pub work_dir: Option<PathBuf>,
    pub upload: UploadConfig,
    pub render: RenderConfig,
    pub video: VideoConfig,
    pub sampling: SamplingConfig,
    pub defaults: CommandDefaults,
    pub liveness: LivenessConfig,
}

impl BotConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        // serde_yaml rejects a completely empty document.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("meshbot"))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: u64,
    /// Lowercase, with the leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 25 * 1024 * 1024,
            allowed_extensions: crate::mesh_io::READABLE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Linear RGB in `[0, 1]`.
    pub background: [f32; 3],
    pub mesh_color: [f32; 3],
    pub point_color: [f32; 3],
    /// Side of the square drawn per point, in pixels.
    pub point_size: f32,
    pub fov_degrees: f64,
    /// Camera distance as a multiple of the bounding-box diagonal over
    /// `tan(fov / 2)`. Below 1 moves the camera closer.
    pub zoom: f64,
    /// Still-image camera, measured from the +Z axis around +Y.
    pub azimuth_degrees: f64,
    pub elevation_degrees: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            background: [0.2, 0.2, 0.2],
            mesh_color: [0.75, 0.75, 0.78],
            point_color: [0.35, 0.6, 1.0],
            point_size: 4.0,
            fov_degrees: 60.0,
            zoom: 0.7,
            azimuth_degrees: 51.6,
            elevation_degrees: 34.4,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    /// Animated GIF, encoded in-process.
    Gif,
    /// H.264 MP4 through an external `ffmpeg` binary.
    Ffmpeg,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct VideoConfig {
    pub frames: u32,
    pub min_fps: u32,
    /// Orbit radius as a multiple of the bounding-box diagonal.
    pub radius_factor: f64,
    pub encoder: EncoderKind,
    pub ffmpeg_program: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frames: 72,
            min_fps: 20,
            radius_factor: 1.5,
            encoder: EncoderKind::Gif,
            ffmpeg_program: "ffmpeg".into(),
        }
    }
}

impl VideoConfig {
    pub fn fps(&self) -> u32 {
        self.min_fps.max(self.frames / 3)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SamplingConfig {
    /// Uniform candidates drawn per requested point before Poisson-disk
    /// elimination. 1 disables the refinement.
    pub poisson_init_factor: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            poisson_init_factor: 5,
        }
    }
}

/// Values used when a command omits an argument.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CommandDefaults {
    pub noise: f64,
    pub points: i64,
    pub simplify: i64,
    pub output: String,
}

impl Default for CommandDefaults {
    fn default() -> Self {
        Self {
            noise: 0.2,
            points: 1000,
            simplify: 16,
            output: "image".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LivenessConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = BotConfig::from_yaml("").unwrap();
        assert_eq!(config.video.frames, 72);
        assert_eq!(config.upload.max_bytes, 25 * 1024 * 1024);
        assert_eq!(config.liveness.port, 8080);
    }

    #[test]
    fn partial_override() {
        let config = BotConfig::from_yaml(
            "
video:
  frames: 12
  encoder: ffmpeg
liveness:
  port: 9000
",
        )
        .unwrap();
        assert_eq!(config.video.frames, 12);
        assert_eq!(config.video.encoder, EncoderKind::Ffmpeg);
        assert_eq!(config.video.radius_factor, 1.5);
        assert_eq!(config.liveness.port, 9000);
        assert_eq!(config.liveness.host, "0.0.0.0");
    }

    #[test]
    fn fps_has_a_floor() {
        let mut video = VideoConfig::default();
        assert_eq!(video.fps(), 24);
        video.frames = 30;
        assert_eq!(video.fps(), 20);
    }

    #[test]
    fn dump_reparses() {
        let config = BotConfig::default();
        let yaml = config.to_yaml().unwrap();
        let reparsed = BotConfig::from_yaml(&yaml).unwrap();
        assert_eq!(reparsed.render.width, 800);
        assert_eq!(reparsed.defaults.output, "image");
    }
}
