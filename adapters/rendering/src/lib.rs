#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Swarasync adapters.
//!
//! Backends implement [`Canvas`] for their drawing surface and reuse the single
//! set of draw routines in this crate, so the interactive window and the
//! high-resolution export paint identical mandalas.

mod canvas;
mod draw;

use anyhow::Result as AnyResult;
use glam::Vec2;
use std::{error::Error, fmt, time::Duration};
use swarasync_core::{MandalaPoint, Phase};

pub use canvas::{arc_points, Canvas, Dash, Path, PathCommand};
pub use draw::{
    draw_breath_ring, draw_mandala, draw_nodes, draw_scene, render_frame, MandalaFrame,
};

/// Canvas radius at which stroke widths are authored.
pub const REFERENCE_RADIUS: f32 = 160.0;

/// Share of the smaller surface side covered by the mandala radius.
pub const RADIUS_FRACTION: f32 = 0.4;

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Creates a color from hue in degrees and saturation, lightness and alpha
    /// in `0.0..=1.0`.
    #[must_use]
    pub fn from_hsla(hue: f32, saturation: f32, lightness: f32, alpha: f32) -> Self {
        let hue = hue.rem_euclid(360.0) / 360.0;
        let saturation = saturation.clamp(0.0, 1.0);
        let lightness = lightness.clamp(0.0, 1.0);
        if saturation == 0.0 {
            return Self::new(lightness, lightness, lightness, alpha);
        }

        let q = if lightness < 0.5 {
            lightness * (1.0 + saturation)
        } else {
            lightness + saturation - lightness * saturation
        };
        let p = 2.0 * lightness - q;
        Self::new(
            hue_channel(p, q, hue + 1.0 / 3.0),
            hue_channel(p, q, hue),
            hue_channel(p, q, hue - 1.0 / 3.0),
            alpha,
        )
    }

    /// Returns the same color with a different alpha.
    #[must_use]
    pub const fn with_alpha(self, alpha: f32) -> Self {
        Self { alpha, ..self }
    }

    /// Returns a new color lightened towards white by the provided amount.
    #[must_use]
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);

        Self {
            red: lighten_channel(self.red, amount),
            green: lighten_channel(self.green, amount),
            blue: lighten_channel(self.blue, amount),
            alpha: self.alpha,
        }
    }

    /// Linear interpolation between two colors.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            red: self.red + (other.red - self.red) * t,
            green: self.green + (other.green - self.green) * t,
            blue: self.blue + (other.blue - self.blue) * t,
            alpha: self.alpha + (other.alpha - self.alpha) * t,
        }
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

fn hue_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// Colour scheme of the breath ring and progress arc.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathPalette {
    /// Ring colour.
    pub primary: Color,
    /// Glow colour.
    pub secondary: Color,
    /// Progress arc colour.
    pub accent: Color,
}

/// Breathing style selected by the player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BreathPath {
    /// Cool, left-nostril style.
    Lunar,
    /// Warm, right-nostril style.
    Solar,
    /// Balanced style.
    #[default]
    Central,
}

impl BreathPath {
    /// Every path in display order.
    pub const ALL: [BreathPath; 3] = [BreathPath::Lunar, BreathPath::Solar, BreathPath::Central];

    /// Colours used when drawing this path.
    #[must_use]
    pub const fn palette(self) -> PathPalette {
        match self {
            BreathPath::Lunar => PathPalette {
                primary: Color::from_rgb_u8(0x60, 0xa5, 0xfa),
                secondary: Color::from_rgb_u8(0x93, 0xc5, 0xfd),
                accent: Color::from_rgb_u8(0xf4, 0x72, 0xb6),
            },
            BreathPath::Solar => PathPalette {
                primary: Color::from_rgb_u8(0xfb, 0x92, 0x3c),
                secondary: Color::from_rgb_u8(0xfd, 0xba, 0x74),
                accent: Color::from_rgb_u8(0xfb, 0xbf, 0x24),
            },
            BreathPath::Central => PathPalette {
                primary: Color::from_rgb_u8(0x8b, 0x5c, 0xf6),
                secondary: Color::from_rgb_u8(0xa7, 0x8b, 0xfa),
                accent: Color::from_rgb_u8(0x06, 0xd6, 0xa0),
            },
        }
    }

    /// The path after this one, wrapping around.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            BreathPath::Lunar => BreathPath::Solar,
            BreathPath::Solar => BreathPath::Central,
            BreathPath::Central => BreathPath::Lunar,
        }
    }

    /// Lower-case name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BreathPath::Lunar => "lunar",
            BreathPath::Solar => "solar",
            BreathPath::Central => "central",
        }
    }
}

/// Maps mandala space onto a surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Surface position of the mandala centre.
    pub center: Vec2,
    /// Surface distance of mandala radius `1.0`.
    pub radius: f32,
    /// Multiplier applied to reference stroke widths and sizes.
    pub line_scale: f32,
}

impl Viewport {
    /// Centres the mandala on a surface of the given size.
    #[must_use]
    pub fn fit(size: Vec2) -> Self {
        let radius = size.x.min(size.y).max(0.0) * RADIUS_FRACTION;
        Self {
            center: size * 0.5,
            radius,
            line_scale: radius / REFERENCE_RADIUS,
        }
    }

    /// Converts a mandala-space position to surface coordinates.
    #[must_use]
    pub fn to_screen(&self, position: Vec2) -> Vec2 {
        self.center + position * self.radius
    }

    /// Scales a reference length.
    #[must_use]
    pub fn scaled(&self, length: f32) -> f32 {
        length * self.line_scale
    }
}

/// Visual state of a rhythm node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Waiting outside the activation window.
    Waiting,
    /// Inside the activation window and unhit.
    Active,
    /// Hit.
    Hit,
}

/// Rhythm node as drawn on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodePresentation {
    /// Angle around the centre in degrees.
    pub angle_degrees: f32,
    /// Visual state.
    pub state: NodeState,
}

/// Mandala content of a scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MandalaLayer {
    /// Accumulated points, oldest first.
    pub points: Vec<MandalaPoint>,
    /// Rotational symmetry order.
    pub petals: u32,
    /// Lifetime of the glow around fresh points.
    pub glow_ms: u64,
}

/// Text shown over the scene by interactive backends.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HudPresentation {
    /// One-based number of the round being played.
    pub round: u32,
    /// Rounds in the session.
    pub total_rounds: u32,
    /// Harmony of the last resolved round.
    pub last_harmony: Option<u8>,
    /// Whether the session is paused.
    pub paused: bool,
}

/// Scene description combining the mandala, breath ring and nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Active phase.
    pub phase: Phase,
    /// Breath progress in `0.0..=1.0`.
    pub breath_progress: f32,
    /// Nodes of the in-flight round.
    pub nodes: Vec<NodePresentation>,
    /// Mandala content.
    pub mandala: MandalaLayer,
    /// Session-clock time in milliseconds.
    pub now_ms: u64,
    /// Selected breath path.
    pub path: BreathPath,
    /// Overlay text.
    pub hud: HudPresentation,
}

impl Scene {
    /// Creates an idle scene with an empty mandala.
    #[must_use]
    pub fn new(path: BreathPath, petals: u32, glow_ms: u64) -> Self {
        Self {
            phase: Phase::Idle,
            breath_progress: 0.0,
            nodes: Vec::new(),
            mandala: MandalaLayer {
                points: Vec::new(),
                petals,
                glow_ms,
            },
            now_ms: 0,
            path,
            hud: HudPresentation::default(),
        }
    }

    /// Prompt describing what the player should do.
    #[must_use]
    pub fn prompt(&self) -> &'static str {
        if self.hud.paused {
            return "Paused";
        }
        match self.phase {
            Phase::Idle => "Press to Begin",
            Phase::Inhale => "Breathe In",
            Phase::Exhale => "Breathe Out",
            Phase::Nodes => "Tap the Lights",
            Phase::Complete => "Complete!",
        }
    }
}

/// Input snapshot gathered by adapters before updating the scene.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FrameInput {
    /// Whether the primary button went down this frame.
    pub press_started: bool,
    /// Whether the primary button went up this frame.
    pub press_ended: bool,
    /// Whether a pause toggle was requested this frame.
    pub pause_toggle: bool,
    /// Whether a reset was requested this frame.
    pub reset: bool,
    /// Whether the player asked to cycle the breath path.
    pub cycle_path: bool,
    /// Whether the player asked to export the mandala.
    pub export: bool,
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            scene,
        }
    }
}

/// Rendering backend capable of presenting Swarasync scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the frame delta and the
    /// per-frame input captured by the adapter, and mutates the scene before it
    /// is rendered.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static;
}

/// Errors raised by drawing surfaces.
#[derive(Debug, PartialEq, Eq)]
pub enum RenderingError {
    /// The surface cannot be drawn to this frame.
    SurfaceUnavailable {
        /// Surface width in pixels.
        width: u32,
        /// Surface height in pixels.
        height: u32,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SurfaceUnavailable { width, height } => {
                write!(f, "render surface unavailable ({width}x{height})")
            }
        }
    }
}

impl Error for RenderingError {}
