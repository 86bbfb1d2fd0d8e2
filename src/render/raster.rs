//! A small z-buffered rasterizer writing into an in-memory framebuffer.

use image::{Rgb, RgbImage};

/// A vertex after projection: pixel coordinates plus NDC depth.
#[derive(Debug, Clone, Copy)]
pub struct ScreenVertex {
    pub x: f64,
    pub y: f64,
    pub depth: f64,
}

pub struct Framebuffer {
    width: u32,
    height: u32,
    color: Vec<[f32; 3]>,
    depth: Vec<f64>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32, background: [f32; 3]) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![background; len],
            depth: vec![f64::INFINITY; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn plot(&mut self, x: u32, y: u32, depth: f64, color: [f32; 3]) {
        let ix = y as usize * self.width as usize + x as usize;
        if depth < self.depth[ix] {
            self.depth[ix] = depth;
            self.color[ix] = color;
        }
    }

    /// Fill a triangle with Gouraud-interpolated colours. Both windings are
    /// drawn, so back faces stay visible.
    pub fn draw_triangle(&mut self, vertices: [ScreenVertex; 3], colors: [[f32; 3]; 3]) {
        let [v0, v1, v2] = vertices;
        let area = edge(&v0, &v1, v2.x, v2.y);
        if area.abs() < 1e-12 {
            return;
        }

        let min_x = v0.x.min(v1.x).min(v2.x).floor().max(0.0) as u32;
        let min_y = v0.y.min(v1.y).min(v2.y).floor().max(0.0) as u32;
        let max_x = (v0.x.max(v1.x).max(v2.x).ceil().max(0.0) as u32).min(self.width);
        let max_y = (v0.y.max(v1.y).max(v2.y).ceil().max(0.0) as u32).min(self.height);

        for y in min_y..max_y {
            for x in min_x..max_x {
                let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
                let w0 = edge(&v1, &v2, px, py) / area;
                let w1 = edge(&v2, &v0, px, py) / area;
                let w2 = edge(&v0, &v1, px, py) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let depth = w0 * v0.depth + w1 * v1.depth + w2 * v2.depth;
                let mut color = [0.0; 3];
                for (channel, value) in color.iter_mut().enumerate() {
                    *value = w0 as f32 * colors[0][channel]
                        + w1 as f32 * colors[1][channel]
                        + w2 as f32 * colors[2][channel];
                }
                self.plot(x, y, depth, color);
            }
        }
    }

    /// Draw a screen-aligned square of side `size` centred on `vertex`.
    pub fn draw_point(&mut self, vertex: ScreenVertex, size: f32, color: [f32; 3]) {
        let half = (size.max(1.0) as f64) * 0.5;
        let min_x = (vertex.x - half).round().max(0.0) as u32;
        let min_y = (vertex.y - half).round().max(0.0) as u32;
        let max_x = ((vertex.x + half).round().max(0.0) as u32).min(self.width);
        let max_y = ((vertex.y + half).round().max(0.0) as u32).min(self.height);
        for y in min_y..max_y {
            for x in min_x..max_x {
                self.plot(x, y, vertex.depth, color);
            }
        }
    }

    pub fn into_image(self) -> RgbImage {
        let width = self.width;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b] = self.color[y as usize * width as usize + x as usize];
            Rgb([to_byte(r), to_byte(g), to_byte(b)])
        })
    }
}

/// Twice the signed area of the triangle (a, b, p).
fn edge(a: &ScreenVertex, b: &ScreenVertex, px: f64, py: f64) -> f64 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
