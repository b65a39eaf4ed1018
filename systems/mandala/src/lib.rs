#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Mandala accumulator that turns node hits into radially symmetric points.
//!
//! Each [`Event::NodeHit`] produces one point at the node's angle plus
//! `petals - 1` rotated copies. Points live in mandala space, where the origin
//! is the centre and `1.0` reaches the outer guide ring. The buffer is bounded:
//! once it exceeds the configured cap it is trimmed to the most recent points.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use swarasync_core::{ConfigError, Event, MandalaConfig, MandalaPoint};

/// Thickest stroke, drawn for a perfectly timed hit.
pub const MAX_THICKNESS: f32 = 8.0;
/// Thinnest stroke, drawn at or beyond the normalisation window.
pub const MIN_THICKNESS: f32 = 2.0;
/// Most transparent point.
pub const MIN_ALPHA: f32 = 0.3;
/// Opacity multiplier applied to rotated copies.
pub const COPY_ALPHA: f32 = 0.8;

/// Categorical timing of a hit, used to colour its points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitTiming {
    /// Within the on-time window.
    OnTime,
    /// Before the target.
    Early,
    /// After the target.
    Late,
}

impl HitTiming {
    /// Classifies a signed tap offset.
    #[must_use]
    pub fn classify(delta_ms: f64, on_time_window_ms: f64) -> Self {
        if delta_ms.abs() <= on_time_window_ms {
            HitTiming::OnTime
        } else if delta_ms < 0.0 {
            HitTiming::Early
        } else {
            HitTiming::Late
        }
    }

    /// Hue in degrees: gold, blue or red.
    #[must_use]
    pub const fn hue(self) -> f32 {
        match self {
            HitTiming::OnTime => 45.0,
            HitTiming::Early => 240.0,
            HitTiming::Late => 0.0,
        }
    }
}

/// Visual attributes derived from a tap offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointStyle {
    /// Stroke thickness in reference pixels.
    pub thickness: f32,
    /// Opacity.
    pub alpha: f32,
    /// Hue in degrees.
    pub hue: f32,
}

/// Derives thickness, opacity and hue for a hit.
///
/// Thickness and opacity fall linearly with `|delta_ms|` and bottom out once the
/// offset reaches the normalisation window.
#[must_use]
pub fn point_style(delta_ms: f64, config: &MandalaConfig) -> PointStyle {
    let normalised = (delta_ms.abs() / config.normalization_window_ms).min(1.0) as f32;
    PointStyle {
        thickness: (MAX_THICKNESS - (MAX_THICKNESS - MIN_THICKNESS) * normalised).max(1.0),
        alpha: (1.0 - (1.0 - MIN_ALPHA) * normalised).max(MIN_ALPHA),
        hue: HitTiming::classify(delta_ms, config.on_time_window_ms).hue(),
    }
}

/// Bounded, append-only store of mandala points.
#[derive(Clone, Debug)]
pub struct MandalaAccumulator {
    config: MandalaConfig,
    points: Vec<MandalaPoint>,
    rng: ChaCha8Rng,
}

impl MandalaAccumulator {
    /// Creates an empty accumulator, rejecting configurations whose trim bounds cannot hold.
    pub fn new(config: MandalaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            points: Vec::new(),
            rng,
        })
    }

    /// Points in insertion order, oldest first.
    #[must_use]
    pub fn points(&self) -> &[MandalaPoint] {
        &self.points
    }

    /// Number of stored points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no points are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Configuration the accumulator was built with.
    #[must_use]
    pub fn config(&self) -> &MandalaConfig {
        &self.config
    }

    /// Removes every point and reseeds the jitter generator.
    pub fn clear(&mut self) {
        self.points.clear();
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
    }

    /// Consumes session events, adding points for hits and clearing on a new session.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::SessionStarted { .. } => self.clear(),
                Event::NodeHit {
                    angle_degrees,
                    timing_delta_ms,
                    at,
                    ..
                } => {
                    let created_at_ms = u64::try_from(at.as_millis()).unwrap_or(u64::MAX);
                    self.add_hit(*angle_degrees, *timing_delta_ms, created_at_ms);
                }
                _ => {}
            }
        }
    }

    /// Adds one hit and its rotated copies, trimming the buffer if it overflows.
    pub fn add_hit(&mut self, angle_degrees: f32, timing_delta_ms: f64, created_at_ms: u64) {
        let style = point_style(timing_delta_ms, &self.config);
        let jitter = if self.config.radius_jitter > 0.0 {
            self.rng
                .gen_range(-self.config.radius_jitter..=self.config.radius_jitter)
        } else {
            0.0
        };
        let radius = self.config.base_radius + jitter;
        let base_angle = angle_degrees.to_radians();
        let spacing = TAU / self.config.petals as f32;

        for slot in 0..self.config.petals {
            let angle = base_angle + spacing * slot as f32;
            let alpha = if slot == 0 {
                style.alpha
            } else {
                style.alpha * COPY_ALPHA
            };
            self.points.push(MandalaPoint {
                position: Vec2::from_angle(angle) * radius,
                slot,
                thickness: style.thickness,
                alpha,
                hue: style.hue,
                created_at_ms,
            });
        }

        if self.points.len() > self.config.point_cap {
            let excess = self.points.len() - self.config.trim_to;
            let _ = self.points.drain(..excess);
        }
    }
}
