use glam::Vec2;
use macroquad::shapes::{draw_circle, draw_line, draw_rectangle};
use swarasync_rendering::{Canvas, Color, RenderingError};

use crate::to_macroquad_color;

/// Rings used to approximate the radial background gradient.
const GRADIENT_STEPS: usize = 48;

/// Canvas that forwards primitives to macroquad's immediate-mode shapes.
///
/// Draws into the screen region `[0, size)`; anything right of it belongs to
/// the control panel.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MacroquadCanvas {
    size: Vec2,
}

impl MacroquadCanvas {
    pub(crate) fn new(size: Vec2) -> Self {
        Self { size }
    }
}

impl Canvas for MacroquadCanvas {
    fn size(&self) -> Vec2 {
        self.size
    }

    fn begin(&mut self) -> Result<(), RenderingError> {
        if self.size.x < 1.0 || self.size.y < 1.0 {
            return Err(RenderingError::SurfaceUnavailable {
                width: self.size.x.max(0.0) as u32,
                height: self.size.y.max(0.0) as u32,
            });
        }
        Ok(())
    }

    fn fill_radial_gradient(&mut self, center: Vec2, radius: f32, inner: Color, outer: Color) {
        draw_rectangle(0.0, 0.0, self.size.x, self.size.y, to_macroquad_color(outer));
        if radius <= 0.0 {
            return;
        }
        for step in (1..=GRADIENT_STEPS).rev() {
            let t = step as f32 / GRADIENT_STEPS as f32;
            draw_circle(
                center.x,
                center.y,
                radius * t,
                to_macroquad_color(inner.lerp(outer, t)),
            );
        }
    }

    fn draw_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        draw_line(from.x, from.y, to.x, to.y, width, to_macroquad_color(color));
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        if radius > 0.0 {
            draw_circle(center.x, center.y, radius, to_macroquad_color(color));
        }
    }

    fn stroke_polyline(&mut self, points: &[Vec2], width: f32, color: Color) {
        let tint = to_macroquad_color(color);
        for pair in points.windows(2) {
            draw_line(pair[0].x, pair[0].y, pair[1].x, pair[1].y, width, tint);
        }
        // Joints are only filled for opaque strokes, translucent ones would double up.
        if color.alpha >= 1.0 && points.len() > 2 {
            for joint in &points[1..points.len() - 1] {
                draw_circle(joint.x, joint.y, width / 2.0, tint);
            }
        }
    }
}
