use std::f32::consts::TAU;

use glam::Vec2;

use crate::{Color, RenderingError};

const QUAD_SEGMENTS: usize = 8;
const ARC_SEGMENT_LENGTH: f32 = 4.0;
const MIN_ARC_SEGMENTS: usize = 16;

/// Single drawing instruction of a [`Path`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    /// Starts a new sub-path at the point.
    MoveTo(Vec2),
    /// Straight segment to the point.
    LineTo(Vec2),
    /// Quadratic Bézier segment.
    QuadTo {
        /// Control point.
        control: Vec2,
        /// End point.
        to: Vec2,
    },
}

/// Vector path built from move, line and quadratic commands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    commands: Vec<PathCommand>,
}

impl Path {
    /// Creates an empty path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new sub-path.
    pub fn move_to(&mut self, to: Vec2) {
        self.commands.push(PathCommand::MoveTo(to));
    }

    /// Appends a straight segment.
    pub fn line_to(&mut self, to: Vec2) {
        self.commands.push(PathCommand::LineTo(to));
    }

    /// Appends a quadratic segment.
    pub fn quad_to(&mut self, control: Vec2, to: Vec2) {
        self.commands.push(PathCommand::QuadTo { control, to });
    }

    /// Commands in insertion order.
    #[must_use]
    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    /// Approximates the path with polylines, one per sub-path.
    ///
    /// Segments issued before any `MoveTo` start at the origin.
    #[must_use]
    pub fn flatten(&self) -> Vec<Vec<Vec2>> {
        let mut polylines = Vec::new();
        let mut current: Vec<Vec2> = Vec::new();
        let mut cursor = Vec2::ZERO;

        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(to) => {
                    if current.len() > 1 {
                        polylines.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    current.push(to);
                    cursor = to;
                }
                PathCommand::LineTo(to) => {
                    if current.is_empty() {
                        current.push(cursor);
                    }
                    current.push(to);
                    cursor = to;
                }
                PathCommand::QuadTo { control, to } => {
                    if current.is_empty() {
                        current.push(cursor);
                    }
                    for step in 1..=QUAD_SEGMENTS {
                        let t = step as f32 / QUAD_SEGMENTS as f32;
                        let inverse = 1.0 - t;
                        current.push(
                            cursor * (inverse * inverse)
                                + control * (2.0 * inverse * t)
                                + to * (t * t),
                        );
                    }
                    cursor = to;
                }
            }
        }

        if current.len() > 1 {
            polylines.push(current);
        }
        polylines
    }
}

/// Dash pattern for circle strokes, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dash {
    /// Length of each drawn segment.
    pub on: f32,
    /// Length of each gap.
    pub off: f32,
}

/// Points along a circular arc.
///
/// `start` and `sweep` are in radians; angle zero points along +x and positive
/// sweeps turn toward +y.
#[must_use]
pub fn arc_points(center: Vec2, radius: f32, start: f32, sweep: f32) -> Vec<Vec2> {
    let length = (sweep.abs() * radius).max(0.0);
    let segments = ((length / ARC_SEGMENT_LENGTH).ceil() as usize).max(MIN_ARC_SEGMENTS);
    (0..=segments)
        .map(|step| {
            let angle = start + sweep * step as f32 / segments as f32;
            center + Vec2::from_angle(angle) * radius
        })
        .collect()
}

/// Drawing surface targeted by the shared draw routines.
///
/// Implementors provide a handful of primitives; strokes of paths, arcs and
/// circles have default implementations built on [`Canvas::stroke_polyline`].
pub trait Canvas {
    /// Surface size in pixels.
    fn size(&self) -> Vec2;

    /// Prepares the surface for a new frame.
    fn begin(&mut self) -> Result<(), RenderingError>;

    /// Fills the whole surface with a radial gradient from `inner` at `center`
    /// to `outer` at `radius` and beyond.
    fn fill_radial_gradient(&mut self, center: Vec2, radius: f32, inner: Color, outer: Color);

    /// Draws a straight segment with round caps.
    fn draw_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color);

    /// Fills a circle.
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color);

    /// Strokes connected segments with a uniform colour.
    fn stroke_polyline(&mut self, points: &[Vec2], width: f32, color: Color) {
        for pair in points.windows(2) {
            self.draw_line(pair[0], pair[1], width, color);
        }
    }

    /// Strokes every sub-path of `path`.
    fn stroke_path(&mut self, path: &Path, width: f32, color: Color) {
        for polyline in path.flatten() {
            self.stroke_polyline(&polyline, width, color);
        }
    }

    /// Strokes an arc; see [`arc_points`] for the angle convention.
    fn stroke_arc(
        &mut self,
        center: Vec2,
        radius: f32,
        start: f32,
        sweep: f32,
        width: f32,
        color: Color,
    ) {
        let points = arc_points(center, radius, start, sweep);
        self.stroke_polyline(&points, width, color);
    }

    /// Strokes a full circle, optionally dashed.
    fn stroke_circle(
        &mut self,
        center: Vec2,
        radius: f32,
        width: f32,
        color: Color,
        dash: Option<Dash>,
    ) {
        let Some(dash) = dash.filter(|dash| dash.on > 0.0 && radius > 0.0) else {
            self.stroke_arc(center, radius, 0.0, TAU, width, color);
            return;
        };

        let circumference = TAU * radius;
        let mut travelled = 0.0;
        while travelled < circumference {
            let end = (travelled + dash.on).min(circumference);
            let start_angle = travelled / radius;
            let sweep = (end - travelled) / radius;
            let points = arc_points(center, radius, start_angle, sweep);
            self.stroke_polyline(&points, width, color);
            travelled += dash.on + dash.off.max(0.0);
        }
    }
}
