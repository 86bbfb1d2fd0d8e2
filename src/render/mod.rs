//! Offscreen rendering of meshes and point clouds into still images and
//! orbiting frame sequences.

mod camera;
mod raster;
pub mod video;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use nalgebra::{Matrix4, Point3, Vector3};

pub use camera::Camera;
pub use raster::{Framebuffer, ScreenVertex};

use crate::config::RenderConfig;
use crate::geometry::{Geometry, PointCloud, TriangleMesh};

const AMBIENT: f32 = 0.25;
const DIFFUSE: f32 = 0.75;

/// Render `geometry` from the fixed oblique camera.
pub fn render_still(geometry: &Geometry, config: &RenderConfig) -> Result<RgbImage> {
    let bounds = geometry
        .bounding_box()
        .ok_or_else(|| anyhow!("nothing to render"))?;
    Ok(render(geometry, &Camera::oblique(&bounds, config), config))
}

pub fn render(geometry: &Geometry, camera: &Camera, config: &RenderConfig) -> RgbImage {
    let mut framebuffer = Framebuffer::new(config.width, config.height, config.background);
    let projector = Projector::new(camera, config.width, config.height);
    match geometry {
        Geometry::Mesh(mesh) => draw_mesh(&mut framebuffer, &projector, mesh, config),
        Geometry::Points(cloud) => draw_points(&mut framebuffer, &projector, cloud, config),
    }
    framebuffer.into_image()
}

pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("saving {}", path.display()))
}

struct Projector {
    view_projection: Matrix4<f64>,
    eye: Point3<f64>,
    width: f64,
    height: f64,
}

impl Projector {
    fn new(camera: &Camera, width: u32, height: u32) -> Self {
        let aspect = width as f64 / height.max(1) as f64;
        Self {
            view_projection: camera.view_projection(aspect),
            eye: camera.eye,
            width: width as f64,
            height: height as f64,
        }
    }

    /// `None` when the point lies outside the near/far range.
    fn project(&self, position: &Vector3<f64>) -> Option<ScreenVertex> {
        let clip = self.view_projection * Point3::from(*position).to_homogeneous();
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }
        Some(ScreenVertex {
            x: (ndc.x + 1.0) * 0.5 * self.width,
            y: (1.0 - ndc.y) * 0.5 * self.height,
            depth: ndc.z,
        })
    }

    /// Headlight shading: light comes from the eye, and both sides of a
    /// surface are lit.
    fn shade(&self, position: &Vector3<f64>, normal: &Vector3<f64>, base: [f32; 3]) -> [f32; 3] {
        let to_eye = (self.eye.coords - position)
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::z);
        let lambert = normal.dot(&to_eye).abs() as f32;
        let intensity = AMBIENT + DIFFUSE * lambert;
        base.map(|channel| channel * intensity)
    }
}

fn draw_mesh(
    framebuffer: &mut Framebuffer,
    projector: &Projector,
    mesh: &TriangleMesh,
    config: &RenderConfig,
) {
    let projected: Vec<Option<ScreenVertex>> =
        mesh.positions.iter().map(|p| projector.project(p)).collect();

    for triangle in &mesh.triangles {
        let [a, b, c] = triangle.map(|ix| projected[ix]);
        let (a, b, c) = match (a, b, c) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => continue,
        };
        let colors = if mesh.has_normals() {
            triangle.map(|ix| projector.shade(&mesh.positions[ix], &mesh.normals[ix], config.mesh_color))
        } else {
            let normal = mesh
                .triangle_normal(triangle)
                .try_normalize(f64::EPSILON)
                .unwrap_or_else(Vector3::zeros);
            triangle.map(|ix| projector.shade(&mesh.positions[ix], &normal, config.mesh_color))
        };
        framebuffer.draw_triangle([a, b, c], colors);
    }
}

fn draw_points(
    framebuffer: &mut Framebuffer,
    projector: &Projector,
    cloud: &PointCloud,
    config: &RenderConfig,
) {
    for (ix, point) in cloud.points.iter().enumerate() {
        let vertex = match projector.project(point) {
            Some(vertex) => vertex,
            None => continue,
        };
        let color = if cloud.has_normals() {
            projector.shade(point, &cloud.normals[ix], config.point_color)
        } else {
            config.point_color
        };
        framebuffer.draw_point(vertex, config.point_size, color);
    }
}
