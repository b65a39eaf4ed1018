//! Tunable parameters consumed when a session is constructed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Complete configuration surface for a breathing session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Breath phase durations.
    pub timing: TimingConfig,
    /// Adaptive difficulty bounds and thresholds.
    pub difficulty: DifficultyConfig,
    /// Harmony blend weights.
    pub scoring: ScoringWeights,
    /// Node cadence and tap windows.
    pub nodes: NodeConfig,
    /// Number of rounds in a session.
    pub rounds_per_session: u32,
    /// Mandala accumulation parameters.
    pub mandala: MandalaConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            difficulty: DifficultyConfig::default(),
            scoring: ScoringWeights::default(),
            nodes: NodeConfig::default(),
            rounds_per_session: 7,
            mandala: MandalaConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Checks every bound and returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        self.difficulty.validate()?;
        self.scoring.validate()?;
        self.nodes.validate()?;
        self.mandala.validate()?;
        if self.rounds_per_session == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        Ok(())
    }

    /// Number of rounds each session runs.
    #[must_use]
    pub const fn total_rounds(&self) -> u32 {
        self.rounds_per_session
    }
}

/// Breath phase duration ranges, in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Shortest accepted inhale.
    pub inhale_min_seconds: f64,
    /// Longest accepted inhale.
    pub inhale_max_seconds: f64,
    /// Shortest accepted exhale.
    pub exhale_min_seconds: f64,
    /// Longest accepted exhale.
    pub exhale_max_seconds: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            inhale_min_seconds: 4.0,
            inhale_max_seconds: 6.0,
            exhale_min_seconds: 5.0,
            exhale_max_seconds: 7.0,
        }
    }
}

impl TimingConfig {
    /// Inhale duration each round aims for: the midpoint of the range.
    #[must_use]
    pub fn inhale_target(&self) -> Duration {
        midpoint(self.inhale_min_seconds, self.inhale_max_seconds)
    }

    /// Exhale duration each round aims for: the midpoint of the range.
    #[must_use]
    pub fn exhale_target(&self) -> Duration {
        midpoint(self.exhale_min_seconds, self.exhale_max_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive_range(
            "timing.inhale_seconds",
            self.inhale_min_seconds,
            self.inhale_max_seconds,
        )?;
        positive_range(
            "timing.exhale_seconds",
            self.exhale_min_seconds,
            self.exhale_max_seconds,
        )
    }
}

fn midpoint(min: f64, max: f64) -> Duration {
    Duration::from_secs_f64(((min + max) / 2.0).max(0.0))
}

fn positive_range(field: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
    if !min.is_finite() || !max.is_finite() || min <= 0.0 {
        return Err(ConfigError::NonPositiveDuration { field });
    }
    if min > max {
        return Err(ConfigError::InvertedRange { field, min, max });
    }
    Ok(())
}

/// Bounds and thresholds used by the adaptive difficulty controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    /// Tolerance applied to the first round.
    pub initial_tolerance_ms: u32,
    /// Tightest tolerance the controller may reach.
    pub min_tolerance_ms: u32,
    /// Loosest tolerance the controller may reach.
    pub max_tolerance_ms: u32,
    /// Tolerance change applied per adjustment.
    pub tolerance_step_ms: u32,
    /// Node count applied to the first round.
    pub initial_node_count: u32,
    /// Fewest nodes the controller may spawn.
    pub min_node_count: u32,
    /// Most nodes the controller may spawn.
    pub max_node_count: u32,
    /// Streak length required before adjusting.
    pub adapt_rounds: u32,
    /// Smoothing factor of the harmony EWMA.
    pub ewma_alpha: f64,
    /// Harmony at or above which a round counts toward a harder streak.
    pub increase_threshold: u8,
    /// Harmony at or below which a round counts toward an easier streak.
    pub decrease_threshold: u8,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            initial_tolerance_ms: 300,
            min_tolerance_ms: 100,
            max_tolerance_ms: 500,
            tolerance_step_ms: 50,
            initial_node_count: 4,
            min_node_count: 3,
            max_node_count: 8,
            adapt_rounds: 3,
            ewma_alpha: 0.3,
            increase_threshold: 90,
            decrease_threshold: 70,
        }
    }
}

impl DifficultyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        bounded(
            "difficulty.tolerance_ms",
            self.initial_tolerance_ms,
            self.min_tolerance_ms,
            self.max_tolerance_ms,
        )?;
        bounded(
            "difficulty.node_count",
            self.initial_node_count,
            self.min_node_count,
            self.max_node_count,
        )?;
        if self.adapt_rounds == 0 {
            return Err(ConfigError::ZeroAdaptRounds);
        }
        if !(self.ewma_alpha > 0.0 && self.ewma_alpha <= 1.0) {
            return Err(ConfigError::InvalidAlpha(self.ewma_alpha));
        }
        if self.decrease_threshold >= self.increase_threshold || self.increase_threshold > 100 {
            return Err(ConfigError::ThresholdOrder {
                increase: self.increase_threshold,
                decrease: self.decrease_threshold,
            });
        }
        Ok(())
    }
}

fn bounded(field: &'static str, initial: u32, min: u32, max: u32) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::InvertedRange {
            field,
            min: f64::from(min),
            max: f64::from(max),
        });
    }
    if initial < min || initial > max {
        return Err(ConfigError::OutOfBounds {
            field,
            value: initial,
            min,
            max,
        });
    }
    Ok(())
}

/// Weights blending the sub-scores into harmony.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Weight of the breath timing score.
    pub timing: f64,
    /// Weight of the node sequence score.
    pub sequence: f64,
    /// Weight of the consistency score.
    pub consistency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            timing: 0.5,
            sequence: 0.3,
            consistency: 0.2,
        }
    }
}

impl ScoringWeights {
    fn validate(&self) -> Result<(), ConfigError> {
        let weights = [self.timing, self.sequence, self.consistency];
        let valid = weights.iter().all(|w| w.is_finite() && *w >= 0.0);
        let sum: f64 = weights.iter().sum();
        if !valid || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::InvalidWeights {
                timing: self.timing,
                sequence: self.sequence,
                consistency: self.consistency,
            });
        }
        Ok(())
    }
}

/// Node cadence and tap windows, in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Spacing between consecutive node targets.
    pub interval_ms: u64,
    /// Maximum tap offset that still counts as a hit.
    pub hit_window_ms: u64,
    /// Offset within which an unhit node is drawn as active.
    pub activation_window_ms: u64,
    /// Wait after a node's target before it counts as missed.
    pub grace_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            interval_ms: 800,
            hit_window_ms: 200,
            activation_window_ms: 400,
            grace_ms: 500,
        }
    }
}

impl NodeConfig {
    /// Spacing between consecutive node targets.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Maximum tap offset that still counts as a hit.
    #[must_use]
    pub const fn hit_window(&self) -> Duration {
        Duration::from_millis(self.hit_window_ms)
    }

    /// Offset within which an unhit node is drawn as active.
    #[must_use]
    pub const fn activation_window(&self) -> Duration {
        Duration::from_millis(self.activation_window_ms)
    }

    /// Wait after a node's target before it counts as missed.
    #[must_use]
    pub const fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::ZeroNodeInterval);
        }
        if self.hit_window_ms >= self.activation_window_ms {
            return Err(ConfigError::WindowOrder {
                hit_ms: self.hit_window_ms,
                activation_ms: self.activation_window_ms,
            });
        }
        Ok(())
    }
}

/// Mandala accumulation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MandalaConfig {
    /// Rotational symmetry order.
    pub petals: u32,
    /// Buffer length that triggers trimming.
    pub point_cap: usize,
    /// Buffer length retained after trimming.
    pub trim_to: usize,
    /// Radius of new points in mandala space.
    pub base_radius: f32,
    /// Maximum radial jitter added to each point, in mandala space.
    pub radius_jitter: f32,
    /// Offset at which thickness and alpha reach their minimum.
    pub normalization_window_ms: f64,
    /// Offset still considered on time for colouring.
    pub on_time_window_ms: f64,
    /// Lifetime of the glow drawn around fresh points.
    pub glow_ms: u64,
    /// Seed of the jitter generator.
    pub seed: u64,
}

impl Default for MandalaConfig {
    fn default() -> Self {
        Self {
            petals: 12,
            point_cap: 2_000,
            trim_to: 1_500,
            base_radius: 0.625,
            radius_jitter: 0.05,
            normalization_window_ms: 300.0,
            on_time_window_ms: 50.0,
            glow_ms: 1_000,
            seed: 0x5f3a_91c2_7be4_d016,
        }
    }
}

impl MandalaConfig {
    /// Checks the petal count, the trim bounds and the normalisation window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.petals == 0 {
            return Err(ConfigError::ZeroPetals);
        }
        let petals = self.petals as usize;
        if self.trim_to > self.point_cap || self.trim_to < petals {
            return Err(ConfigError::InvalidPointCap {
                cap: self.point_cap,
                trim_to: self.trim_to,
                petals: self.petals,
            });
        }
        if !(self.normalization_window_ms > 0.0) {
            return Err(ConfigError::NonPositiveDuration {
                field: "mandala.normalization_window_ms",
            });
        }
        Ok(())
    }
}

/// Reasons a configuration is rejected at construction.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// A range's minimum exceeds its maximum.
    #[error("{field}: minimum {min} exceeds maximum {max}")]
    InvertedRange {
        /// Name of the offending range.
        field: &'static str,
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
    },
    /// An initial value lies outside its bounds.
    #[error("{field}: initial value {value} is outside {min}..={max}")]
    OutOfBounds {
        /// Name of the offending parameter.
        field: &'static str,
        /// Configured initial value.
        value: u32,
        /// Configured minimum.
        min: u32,
        /// Configured maximum.
        max: u32,
    },
    /// A duration that must be positive is zero, negative or not finite.
    #[error("{field} must be a positive, finite duration")]
    NonPositiveDuration {
        /// Name of the offending parameter.
        field: &'static str,
    },
    /// The EWMA smoothing factor lies outside `(0, 1]`.
    #[error("difficulty.ewma_alpha must lie in (0, 1] (received {0})")]
    InvalidAlpha(f64),
    /// The decrease threshold is not below the increase threshold.
    #[error("difficulty thresholds overlap: decrease {decrease} must be below increase {increase} (max 100)")]
    ThresholdOrder {
        /// Configured increase threshold.
        increase: u8,
        /// Configured decrease threshold.
        decrease: u8,
    },
    /// The adapt streak length is zero.
    #[error("difficulty.adapt_rounds must be positive")]
    ZeroAdaptRounds,
    /// The hit window is not strictly narrower than the activation window.
    #[error("nodes.hit_window_ms ({hit_ms}) must be narrower than nodes.activation_window_ms ({activation_ms})")]
    WindowOrder {
        /// Configured hit window.
        hit_ms: u64,
        /// Configured activation window.
        activation_ms: u64,
    },
    /// Node targets would all coincide.
    #[error("nodes.interval_ms must be positive")]
    ZeroNodeInterval,
    /// Weights are negative, not finite, or do not sum to one.
    #[error("scoring weights must be non-negative and sum to 1 (timing {timing}, sequence {sequence}, consistency {consistency})")]
    InvalidWeights {
        /// Configured timing weight.
        timing: f64,
        /// Configured sequence weight.
        sequence: f64,
        /// Configured consistency weight.
        consistency: f64,
    },
    /// The mandala has no symmetry slots.
    #[error("mandala.petals must be positive")]
    ZeroPetals,
    /// The trim size exceeds the cap or cannot hold one full symmetric batch.
    #[error("mandala.trim_to ({trim_to}) must lie between petals ({petals}) and point_cap ({cap})")]
    InvalidPointCap {
        /// Configured cap.
        cap: usize,
        /// Configured trim size.
        trim_to: usize,
        /// Configured petal count.
        petals: u32,
    },
    /// A session must contain at least one round.
    #[error("rounds_per_session must be positive")]
    ZeroRounds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SessionConfig::default().validate(), Ok(()));
    }

    #[test]
    fn inverted_inhale_range_is_rejected() {
        let mut config = SessionConfig::default();
        config.timing.inhale_min_seconds = 7.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedRange {
                field: "timing.inhale_seconds",
                ..
            })
        ));
    }

    #[test]
    fn initial_tolerance_outside_bounds_is_rejected() {
        let mut config = SessionConfig::default();
        config.difficulty.initial_tolerance_ms = 50;
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutOfBounds {
                field: "difficulty.tolerance_ms",
                value: 50,
                min: 100,
                max: 500,
            })
        );
    }

    #[test]
    fn hit_window_must_be_narrower_than_activation_window() {
        let mut config = SessionConfig::default();
        config.nodes.hit_window_ms = 400;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowOrder { .. })
        ));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut config = SessionConfig::default();
        config.scoring.timing = 0.7;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWeights { .. })
        ));
    }

    #[test]
    fn alpha_outside_unit_interval_is_rejected() {
        let mut config = SessionConfig::default();
        config.difficulty.ewma_alpha = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidAlpha(0.0)));
    }

    #[test]
    fn targets_are_range_midpoints() {
        let timing = TimingConfig::default();
        assert_eq!(timing.inhale_target(), Duration::from_secs(5));
        assert_eq!(timing.exhale_target(), Duration::from_secs(6));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: SessionConfig = toml::from_str(
            r#"
            rounds_per_session = 3

            [difficulty]
            adapt_rounds = 2

            [mandala]
            petals = 8
            "#,
        )
        .expect("partial config parses");

        assert_eq!(config.total_rounds(), 3);
        assert_eq!(config.difficulty.adapt_rounds, 2);
        assert_eq!(config.difficulty.initial_tolerance_ms, 300);
        assert_eq!(config.mandala.petals, 8);
        assert_eq!(config.nodes, NodeConfig::default());
        assert_eq!(config.validate(), Ok(()));
    }
}
