use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec2;
use swarasync_core::{MandalaPoint, Phase};

use crate::{BreathPath, Canvas, Color, Dash, NodeState, Path, Scene, Viewport};

const BACKGROUND_INNER: Color = Color::new(15.0 / 255.0, 23.0 / 255.0, 42.0 / 255.0, 0.95);
const BACKGROUND_OUTER: Color = Color::new(30.0 / 255.0, 41.0 / 255.0, 59.0 / 255.0, 0.85);
const BACKGROUND_EXTENT: f32 = 1.2;
const CURVE_TENSION: f32 = 0.1;
const GUIDE_RINGS: [f32; 3] = [0.7, 0.85, 1.0];
const GUIDE_DASH: Dash = Dash { on: 5.0, off: 10.0 };
const BREATH_RING_FRACTION: f32 = 0.625;
const BREATH_RING_GROWTH: f32 = 0.3;
const BREATH_RING_WIDTH: f32 = 4.0;
const NODE_RING_FRACTION: f32 = 0.875;
const NODE_SIZE: f32 = 24.0;
const NODE_HIT: Color = Color::from_rgb_u8(0xf5, 0x9e, 0x0b);
const NODE_ACTIVE: Color = Color::from_rgb_u8(0x06, 0xd6, 0xa0);
const NODE_WAITING: Color = Color::new(1.0, 1.0, 1.0, 0.5);
const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

/// Everything the mandala routine needs for one frame.
#[derive(Clone, Copy, Debug)]
pub struct MandalaFrame<'a> {
    /// Accumulated points, oldest first.
    pub points: &'a [MandalaPoint],
    /// Rotational symmetry order.
    pub petals: u32,
    /// Phase that drives the bindu and ring emphasis.
    pub phase: Phase,
    /// Clock used to age glows, in milliseconds.
    pub now_ms: u64,
    /// Lifetime of the glow around fresh points.
    pub glow_ms: u64,
}

/// Paints the mandala: background, point strokes, central geometry and guide rings.
///
/// This is the only mandala routine; interactive frames and exports differ
/// solely in the [`Viewport`] they pass.
pub fn draw_mandala<C>(canvas: &mut C, viewport: &Viewport, frame: &MandalaFrame<'_>)
where
    C: Canvas + ?Sized,
{
    canvas.fill_radial_gradient(
        viewport.center,
        viewport.radius * BACKGROUND_EXTENT,
        BACKGROUND_INNER,
        BACKGROUND_OUTER,
    );
    draw_points(canvas, viewport, frame);
    draw_central_geometry(canvas, viewport, frame.petals, frame.phase);
    draw_guide_rings(canvas, viewport);
}

fn draw_points<C>(canvas: &mut C, viewport: &Viewport, frame: &MandalaFrame<'_>)
where
    C: Canvas + ?Sized,
{
    if frame.points.is_empty() || frame.petals == 0 {
        return;
    }

    let mut slots: Vec<Vec<&MandalaPoint>> = vec![Vec::new(); frame.petals as usize];
    for point in frame.points {
        if let Some(slot) = slots.get_mut(point.slot as usize) {
            slot.push(point);
        }
    }

    for slot in &slots {
        let Some(last) = slot.last() else {
            continue;
        };
        if slot.len() >= 2 {
            let path = slot_path(slot.iter().map(|point| viewport.to_screen(point.position)));
            canvas.stroke_path(
                &path,
                viewport.scaled(last.thickness),
                Color::from_hsla(last.hue, 0.7, 0.6, last.alpha),
            );
        }

        for point in slot {
            let age = frame.now_ms.saturating_sub(point.created_at_ms);
            if frame.glow_ms == 0 || age >= frame.glow_ms {
                continue;
            }
            let fade = 1.0 - age as f32 / frame.glow_ms as f32;
            let center = viewport.to_screen(point.position);
            let color = Color::from_hsla(point.hue, 0.7, 0.6, point.alpha * fade);
            canvas.fill_circle(
                center,
                viewport.scaled(point.thickness),
                color.with_alpha(color.alpha * 0.3),
            );
            canvas.fill_circle(center, viewport.scaled(point.thickness / 2.0), color);
        }
    }
}

/// Smooth path through consecutive points of one symmetry slot.
fn slot_path<I>(positions: I) -> Path
where
    I: IntoIterator<Item = Vec2>,
{
    let positions: Vec<Vec2> = positions.into_iter().collect();
    let mut path = Path::new();
    let Some(first) = positions.first() else {
        return path;
    };
    path.move_to(*first);
    for index in 1..positions.len() {
        let previous = positions[index - 1];
        let current = positions[index];
        match positions.get(index + 1) {
            Some(next) => path.quad_to(current, current + (*next - previous) * CURVE_TENSION),
            None => path.line_to(current),
        }
    }
    path
}

fn draw_central_geometry<C>(canvas: &mut C, viewport: &Viewport, petals: u32, phase: Phase)
where
    C: Canvas + ?Sized,
{
    let (bindu_size, bindu_alpha) = match phase {
        Phase::Inhale => (8.0, 1.0),
        Phase::Exhale => (12.0, 1.0),
        Phase::Idle => (6.0, 0.6),
        Phase::Nodes | Phase::Complete => (6.0, 1.0),
    };
    canvas.fill_circle(
        viewport.center,
        viewport.scaled(bindu_size),
        Color::from_hsla(45.0, 1.0, 0.7, bindu_alpha),
    );

    let alpha = if phase == Phase::Nodes { 0.3 } else { 0.1 };
    for ring in 1..=3u8 {
        let radius = viewport.radius / 4.0 * f32::from(ring);
        canvas.stroke_circle(
            viewport.center,
            radius,
            viewport.scaled(1.0),
            WHITE.with_alpha(alpha),
            None,
        );

        if ring == 2 {
            for petal in 0..petals {
                let direction = Vec2::from_angle(petal as f32 * TAU / petals as f32);
                canvas.draw_line(
                    viewport.center + direction * radius * 0.9,
                    viewport.center + direction * radius * 1.1,
                    viewport.scaled(2.0),
                    WHITE.with_alpha(alpha * 2.0),
                );
            }
        }
    }
}

fn draw_guide_rings<C>(canvas: &mut C, viewport: &Viewport)
where
    C: Canvas + ?Sized,
{
    let dash = Dash {
        on: viewport.scaled(GUIDE_DASH.on),
        off: viewport.scaled(GUIDE_DASH.off),
    };
    for (index, scale) in GUIDE_RINGS.iter().enumerate() {
        canvas.stroke_circle(
            viewport.center,
            viewport.radius * scale,
            viewport.scaled(1.0),
            WHITE.with_alpha(0.1 - index as f32 * 0.02),
            Some(dash),
        );
    }
}

/// Draws the breath ring and its progress arc.
///
/// The ring grows by up to 30% with progress; the arc starts at the top and
/// sweeps clockwise.
pub fn draw_breath_ring<C>(
    canvas: &mut C,
    viewport: &Viewport,
    phase: Phase,
    progress: f32,
    path: BreathPath,
) where
    C: Canvas + ?Sized,
{
    let palette = path.palette();
    let progress = progress.clamp(0.0, 1.0);
    let radius = viewport.radius * BREATH_RING_FRACTION * (1.0 + progress * BREATH_RING_GROWTH);

    if phase == Phase::Inhale {
        canvas.stroke_circle(
            viewport.center,
            radius,
            viewport.scaled(BREATH_RING_WIDTH * 3.0),
            palette.secondary.with_alpha(0.25),
            None,
        );
    }
    canvas.stroke_circle(
        viewport.center,
        radius,
        viewport.scaled(BREATH_RING_WIDTH),
        palette.primary,
        None,
    );

    if progress > 0.0 {
        canvas.stroke_arc(
            viewport.center,
            radius + viewport.scaled(4.0),
            -FRAC_PI_2,
            progress * TAU,
            viewport.scaled(4.0),
            palette.accent,
        );
    }
}

/// Draws rhythm nodes around the breath ring; only visible during the node phase.
pub fn draw_nodes<C>(canvas: &mut C, viewport: &Viewport, scene: &Scene)
where
    C: Canvas + ?Sized,
{
    if scene.phase != Phase::Nodes {
        return;
    }

    let ring = viewport.radius * NODE_RING_FRACTION;
    let size = viewport.scaled(NODE_SIZE);
    let pulse = 1.0 + (scene.now_ms as f32 * 0.01).sin() * 0.3;

    for node in &scene.nodes {
        let center = viewport.center + Vec2::from_angle(node.angle_degrees.to_radians()) * ring;
        match node.state {
            NodeState::Hit => {
                canvas.fill_circle(center, size * 0.8, NODE_HIT.with_alpha(0.3));
                canvas.fill_circle(center, size / 2.0, NODE_HIT);
                canvas.fill_circle(center, size / 4.0, WHITE);
            }
            NodeState::Active => {
                canvas.fill_circle(center, size * 0.7 * pulse, NODE_ACTIVE.with_alpha(0.3));
                canvas.fill_circle(center, size / 2.0, NODE_ACTIVE);
                canvas.fill_circle(center, size / 4.0, WHITE);
            }
            NodeState::Waiting => canvas.fill_circle(center, size / 2.0, NODE_WAITING),
        }
    }
}

/// Draws a complete interactive frame.
pub fn draw_scene<C>(canvas: &mut C, viewport: &Viewport, scene: &Scene)
where
    C: Canvas + ?Sized,
{
    let frame = MandalaFrame {
        points: &scene.mandala.points,
        petals: scene.mandala.petals,
        phase: scene.phase,
        now_ms: scene.now_ms,
        glow_ms: scene.mandala.glow_ms,
    };
    draw_mandala(canvas, viewport, &frame);
    draw_breath_ring(canvas, viewport, scene.phase, scene.breath_progress, scene.path);
    draw_nodes(canvas, viewport, scene);
}

/// Begins a frame and draws `scene`, skipping the pass when the surface is unavailable.
///
/// Returns whether anything was drawn.
pub fn render_frame<C>(canvas: &mut C, scene: &Scene) -> bool
where
    C: Canvas + ?Sized,
{
    if let Err(error) = canvas.begin() {
        tracing::debug!(%error, "skipping render pass");
        return false;
    }
    let viewport = Viewport::fit(canvas.size());
    draw_scene(canvas, &viewport, scene);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderingError;

    #[derive(Default)]
    struct Recorder {
        available: bool,
        gradients: usize,
        lines: usize,
        circles: Vec<(Vec2, f32, Color)>,
    }

    impl Canvas for Recorder {
        fn size(&self) -> Vec2 {
            Vec2::new(400.0, 400.0)
        }

        fn begin(&mut self) -> Result<(), RenderingError> {
            if self.available {
                Ok(())
            } else {
                Err(RenderingError::SurfaceUnavailable {
                    width: 0,
                    height: 0,
                })
            }
        }

        fn fill_radial_gradient(&mut self, _: Vec2, _: f32, _: Color, _: Color) {
            self.gradients += 1;
        }

        fn draw_line(&mut self, _: Vec2, _: Vec2, _: f32, _: Color) {
            self.lines += 1;
        }

        fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
            self.circles.push((center, radius, color));
        }
    }

    #[test]
    fn unavailable_surface_skips_the_frame() {
        let mut canvas = Recorder::default();
        let scene = Scene::new(BreathPath::Central, 12, 1_000);
        assert!(!render_frame(&mut canvas, &scene));
        assert_eq!(canvas.gradients, 0);
        assert_eq!(canvas.lines, 0);
    }

    #[test]
    fn bindu_grows_on_exhale() {
        let mut canvas = Recorder {
            available: true,
            ..Recorder::default()
        };
        let mut scene = Scene::new(BreathPath::Central, 12, 1_000);
        scene.phase = Phase::Exhale;
        assert!(render_frame(&mut canvas, &scene));

        let (center, radius, _) = canvas.circles[0];
        assert_eq!(center, Vec2::new(200.0, 200.0));
        assert!((radius - 12.0).abs() < 1e-4);
        assert_eq!(canvas.gradients, 1);
    }

    #[test]
    fn smooth_path_ends_on_the_last_point() {
        let path = slot_path([
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
        ]);
        assert_eq!(path.commands().len(), 3);
        assert_eq!(
            path.commands().last(),
            Some(&crate::PathCommand::LineTo(Vec2::new(10.0, 10.0)))
        );
    }

    #[test]
    fn fresh_points_glow_and_old_points_do_not() {
        let mut canvas = Recorder {
            available: true,
            ..Recorder::default()
        };
        let point = |created_at_ms| MandalaPoint {
            position: Vec2::new(0.5, 0.0),
            slot: 0,
            thickness: 8.0,
            alpha: 1.0,
            hue: 45.0,
            created_at_ms,
        };
        let points = [point(0), point(4_500)];
        let frame = MandalaFrame {
            points: &points,
            petals: 1,
            phase: Phase::Idle,
            now_ms: 5_000,
            glow_ms: 1_000,
        };
        let viewport = Viewport::fit(canvas.size());
        draw_mandala(&mut canvas, &viewport, &frame);

        let glows = canvas
            .circles
            .iter()
            .filter(|(center, _, _)| *center == Vec2::new(280.0, 200.0))
            .count();
        assert_eq!(glows, 2, "only the fresh point glows (halo + core)");
    }
}
