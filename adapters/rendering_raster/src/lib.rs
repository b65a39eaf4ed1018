#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Software rasteriser used to export the mandala as an image.
//!
//! [`RasterCanvas`] implements the shared [`Canvas`] contract on top of an RGBA
//! buffer with anti-aliased coverage, so exports go through the same
//! [`draw_mandala`] routine as the interactive window.

use std::io::Cursor;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use glam::Vec2;
use image::{ImageFormat, Rgba, RgbaImage};
use swarasync_rendering::{draw_mandala, Canvas, Color, MandalaFrame, RenderingError, Viewport};

/// Side length used when no export resolution is requested.
pub const DEFAULT_EXPORT_RESOLUTION: u32 = 1024;

/// Prefix of exported data URLs.
pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Inclusive-exclusive pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl PixelRect {
    fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// RGBA drawing surface with anti-aliased strokes and fills.
#[derive(Clone, Debug)]
pub struct RasterCanvas {
    image: RgbaImage,
    coverage: Vec<f32>,
    dirty: Option<PixelRect>,
}

impl RasterCanvas {
    /// Creates a transparent surface.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let area = width as usize * height as usize;
        Self {
            image: RgbaImage::new(width, height),
            coverage: vec![0.0; area],
            dirty: None,
        }
    }

    /// Rendered pixels.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consumes the canvas and returns its pixels.
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn bounds(&self, min: Vec2, max: Vec2) -> Option<PixelRect> {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 || max.x < 0.0 || max.y < 0.0 {
            return None;
        }
        let x0 = min.x.floor().max(0.0) as u32;
        let y0 = min.y.floor().max(0.0) as u32;
        let x1 = (max.x.ceil().max(0.0) as u32).saturating_add(1).min(width);
        let y1 = (max.y.ceil().max(0.0) as u32).saturating_add(1).min(height);
        (x0 < x1 && y0 < y1).then_some(PixelRect { x0, y0, x1, y1 })
    }

    fn blend(&mut self, x: u32, y: u32, color: Color, coverage: f32) {
        let source_alpha = (color.alpha * coverage).clamp(0.0, 1.0);
        if source_alpha <= 0.0 {
            return;
        }
        let pixel = self.image.get_pixel_mut(x, y);
        let [red, green, blue, alpha] = pixel.0;
        let dest_alpha = f32::from(alpha) / 255.0;
        let out_alpha = source_alpha + dest_alpha * (1.0 - source_alpha);
        if out_alpha <= 0.0 {
            *pixel = Rgba([0, 0, 0, 0]);
            return;
        }
        let mix = |source: f32, dest: u8| {
            let dest = f32::from(dest) / 255.0;
            let value =
                (source * source_alpha + dest * dest_alpha * (1.0 - source_alpha)) / out_alpha;
            to_byte(value)
        };
        *pixel = Rgba([
            mix(color.red, red),
            mix(color.green, green),
            mix(color.blue, blue),
            to_byte(out_alpha),
        ]);
    }

    fn accumulate_segment(&mut self, from: Vec2, to: Vec2, half_width: f32) {
        let reach = Vec2::splat(half_width + 1.0);
        let Some(rect) = self.bounds(from.min(to) - reach, from.max(to) + reach) else {
            return;
        };
        let width = self.image.width() as usize;
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                let sample = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let coverage = (half_width + 0.5 - segment_distance(sample, from, to)).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    let slot = &mut self.coverage[y as usize * width + x as usize];
                    *slot = slot.max(coverage);
                }
            }
        }
        self.dirty = Some(self.dirty.map_or(rect, |dirty| dirty.union(rect)));
    }

    fn composite(&mut self, color: Color) {
        let Some(rect) = self.dirty.take() else {
            return;
        };
        let width = self.image.width() as usize;
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                let index = y as usize * width + x as usize;
                let coverage = std::mem::take(&mut self.coverage[index]);
                if coverage > 0.0 {
                    self.blend(x, y, color, coverage);
                }
            }
        }
    }
}

impl Canvas for RasterCanvas {
    fn size(&self) -> Vec2 {
        let (width, height) = self.image.dimensions();
        Vec2::new(width as f32, height as f32)
    }

    fn begin(&mut self) -> Result<(), RenderingError> {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderingError::SurfaceUnavailable { width, height });
        }
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        Ok(())
    }

    fn fill_radial_gradient(&mut self, center: Vec2, radius: f32, inner: Color, outer: Color) {
        let (width, height) = self.image.dimensions();
        for y in 0..height {
            for x in 0..width {
                let sample = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let t = if radius > 0.0 {
                    sample.distance(center) / radius
                } else {
                    1.0
                };
                self.blend(x, y, inner.lerp(outer, t), 1.0);
            }
        }
    }

    fn draw_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        self.stroke_polyline(&[from, to], width, color);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        if radius <= 0.0 {
            return;
        }
        let reach = Vec2::splat(radius + 1.0);
        let Some(rect) = self.bounds(center - reach, center + reach) else {
            return;
        };
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                let sample = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let coverage = (radius + 0.5 - sample.distance(center)).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(x, y, color, coverage);
                }
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[Vec2], width: f32, color: Color) {
        let half_width = (width / 2.0).max(0.25);
        match points {
            [] => return,
            [only] => self.accumulate_segment(*only, *only, half_width),
            _ => {
                for pair in points.windows(2) {
                    self.accumulate_segment(pair[0], pair[1], half_width);
                }
            }
        }
        self.composite(color);
    }
}

fn segment_distance(point: Vec2, from: Vec2, to: Vec2) -> f32 {
    let span = to - from;
    let length_squared = span.length_squared();
    if length_squared <= f32::EPSILON {
        return point.distance(from);
    }
    let t = ((point - from).dot(span) / length_squared).clamp(0.0, 1.0);
    point.distance(from + span * t)
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Renders the mandala into a square image of `resolution` pixels per side.
pub fn render_mandala(
    frame: &MandalaFrame<'_>,
    resolution: u32,
) -> Result<RgbaImage, RenderingError> {
    let mut canvas = RasterCanvas::new(resolution, resolution);
    canvas.begin()?;
    let viewport = Viewport::fit(canvas.size());
    draw_mandala(&mut canvas, &viewport, frame);
    Ok(canvas.into_image())
}

/// Renders the mandala and encodes it as PNG.
pub fn export_png(frame: &MandalaFrame<'_>, resolution: u32) -> Result<Vec<u8>> {
    let image = render_mandala(frame, resolution)
        .with_context(|| format!("failed to render {resolution}px mandala"))?;
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .context("failed to encode mandala as PNG")?;
    Ok(out.into_inner())
}

/// Renders the mandala and returns it as a `data:image/png;base64,...` URL.
pub fn export_data_url(frame: &MandalaFrame<'_>, resolution: u32) -> Result<String> {
    let png = export_png(frame, resolution)?;
    Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);

    #[test]
    fn zero_sized_surface_is_unavailable() {
        let mut canvas = RasterCanvas::new(0, 16);
        assert_eq!(
            canvas.begin(),
            Err(RenderingError::SurfaceUnavailable {
                width: 0,
                height: 16
            })
        );
    }

    #[test]
    fn opaque_circle_covers_its_centre() {
        let mut canvas = RasterCanvas::new(16, 16);
        canvas.fill_circle(Vec2::new(8.0, 8.0), 4.0, RED);
        assert_eq!(canvas.image().get_pixel(8, 8).0, [255, 0, 0, 255]);
        assert_eq!(canvas.image().get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn overlapping_segments_blend_once() {
        let mut canvas = RasterCanvas::new(32, 32);
        let translucent = RED.with_alpha(0.5);
        canvas.stroke_polyline(
            &[
                Vec2::new(4.0, 16.0),
                Vec2::new(16.0, 16.0),
                Vec2::new(28.0, 16.0),
            ],
            4.0,
            translucent,
        );
        let joint = canvas.image().get_pixel(16, 16).0;
        let span = canvas.image().get_pixel(10, 16).0;
        assert_eq!(joint, span);
        assert_eq!(joint[3], 128);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let from = Vec2::new(0.0, 0.0);
        let to = Vec2::new(10.0, 0.0);
        assert!((segment_distance(Vec2::new(5.0, 3.0), from, to) - 3.0).abs() < 1e-6);
        assert!((segment_distance(Vec2::new(13.0, 4.0), from, to) - 5.0).abs() < 1e-6);
        assert!((segment_distance(Vec2::new(1.0, 1.0), from, from) - 2f32.sqrt()).abs() < 1e-6);
    }
}
