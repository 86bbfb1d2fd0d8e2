//! 360° turntable videos: render an orbit of frames to a scratch directory,
//! then hand the ordered sequence to a `FrameEncoder`.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};
use rayon::prelude::*;

use super::{render, save_png, Camera};
use crate::artifact::ScratchDir;
use crate::config::{EncoderKind, RenderConfig, VideoConfig};
use crate::geometry::Geometry;

/// Turns an ordered sequence of frame images into one video file.
pub trait FrameEncoder: Send + Sync {
    /// File extension of the produced video, without the dot.
    fn extension(&self) -> &'static str;

    /// `frames` are `frame_0000.png`, `frame_0001.png`, ... inside `dir`.
    fn encode(&self, dir: &Path, frames: &[PathBuf], fps: u32, output: &Path) -> Result<()>;
}

pub fn encoder_for(config: &VideoConfig) -> Box<dyn FrameEncoder> {
    match config.encoder {
        EncoderKind::Gif => Box::new(GifFrameEncoder::default()),
        EncoderKind::Ffmpeg => Box::new(FfmpegEncoder {
            program: config.ffmpeg_program.clone(),
        }),
    }
}

pub struct GifFrameEncoder {
    /// NeuQuant sampling speed, 1 (best) to 30 (fastest).
    pub speed: i32,
}

impl Default for GifFrameEncoder {
    fn default() -> Self {
        Self { speed: 10 }
    }
}

impl FrameEncoder for GifFrameEncoder {
    fn extension(&self) -> &'static str {
        "gif"
    }

    fn encode(&self, _dir: &Path, frames: &[PathBuf], fps: u32, output: &Path) -> Result<()> {
        let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
        let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), self.speed);
        encoder.set_repeat(Repeat::Infinite)?;
        let delay = Delay::from_numer_denom_ms(1000, fps.max(1));
        for path in frames {
            let image = image::open(path)
                .with_context(|| format!("reading frame {}", path.display()))?
                .to_rgba8();
            encoder.encode_frame(Frame::from_parts(image, 0, 0, delay))?;
        }
        Ok(())
    }
}

/// H.264 MP4 through an external ffmpeg process.
pub struct FfmpegEncoder {
    pub program: String,
}

impl FrameEncoder for FfmpegEncoder {
    fn extension(&self) -> &'static str {
        "mp4"
    }

    fn encode(&self, dir: &Path, frames: &[PathBuf], fps: u32, output: &Path) -> Result<()> {
        if frames.is_empty() {
            bail!("no frames to encode");
        }
        let pattern = dir.join("frame_%04d.png");
        let result = Command::new(&self.program)
            .arg("-y")
            .args(["-loglevel", "error"])
            .args(["-framerate", &fps.to_string()])
            .arg("-i")
            .arg(&pattern)
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .arg(output)
            .output()
            .with_context(|| format!("running {}", self.program))?;
        if !result.status.success() {
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            ));
        }
        Ok(())
    }
}

/// Render the orbit and encode it into `output`. Frames are rendered in
/// parallel; the scratch directory holding them is removed before this
/// returns, including when encoding fails.
pub fn render_orbit_video(
    geometry: &Geometry,
    render_config: &RenderConfig,
    video_config: &VideoConfig,
    encoder: &dyn FrameEncoder,
    scratch_parent: &Path,
    output: &Path,
) -> Result<()> {
    let bounds = geometry
        .bounding_box()
        .ok_or_else(|| anyhow!("nothing to render"))?;
    let frames = video_config.frames.max(1);
    log::info!("Creating 360° video with {} frames...", frames);

    let scratch = ScratchDir::create(scratch_parent, "video_frames")
        .context("creating frame directory")?;
    let frame_paths = (0..frames)
        .into_par_iter()
        .map(|frame| {
            let camera = Camera::orbit(
                &bounds,
                render_config,
                video_config.radius_factor,
                frame,
                frames,
            );
            let path = scratch.path().join(format!("frame_{:04}.png", frame));
            save_png(&render(geometry, &camera, render_config), &path)?;
            Ok(path)
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!("Combining frames into video...");
    encoder
        .encode(scratch.path(), &frame_paths, video_config.fps(), output)
        .context("encoding video")
}
