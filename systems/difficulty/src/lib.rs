#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Adaptive difficulty controller driven by per-round harmony.
//!
//! The controller keeps an exponentially weighted harmony average for display
//! and applies hysteresis through an explicit streak state machine: only
//! `adapt_rounds` consecutive rounds on the same side of the thresholds move the
//! tolerance and node count, and a neutral round clears any streak.

use swarasync_core::{DifficultyConfig, DifficultyShift, DifficultyState};

/// Classification of a single harmony value against the thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
    /// At or above the increase threshold.
    High,
    /// Strictly between the thresholds.
    Neutral,
    /// At or below the decrease threshold.
    Low,
}

impl Band {
    /// Classifies `harmony` using the configured thresholds.
    #[must_use]
    pub fn classify(harmony: u8, config: &DifficultyConfig) -> Self {
        if harmony >= config.increase_threshold {
            Band::High
        } else if harmony <= config.decrease_threshold {
            Band::Low
        } else {
            Band::Neutral
        }
    }
}

/// Current hysteresis streak.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Streak {
    /// No rounds counted toward either direction.
    Neutral,
    /// Consecutive high rounds observed.
    High(u32),
    /// Consecutive low rounds observed.
    Low(u32),
}

impl Streak {
    /// Advances the streak with the next round's band.
    ///
    /// Returns the follow-up streak and the shift to apply, if the streak
    /// reached `adapt_rounds`. A completed streak returns to [`Streak::Neutral`].
    #[must_use]
    pub fn advance(self, band: Band, adapt_rounds: u32) -> (Streak, Option<DifficultyShift>) {
        let next = match (self, band) {
            (_, Band::Neutral) => Streak::Neutral,
            (Streak::High(count), Band::High) => Streak::High(count.saturating_add(1)),
            (_, Band::High) => Streak::High(1),
            (Streak::Low(count), Band::Low) => Streak::Low(count.saturating_add(1)),
            (_, Band::Low) => Streak::Low(1),
        };

        match next {
            Streak::High(count) if count >= adapt_rounds => {
                (Streak::Neutral, Some(DifficultyShift::Harder))
            }
            Streak::Low(count) if count >= adapt_rounds => {
                (Streak::Neutral, Some(DifficultyShift::Easier))
            }
            other => (other, None),
        }
    }

    fn from_state(state: &DifficultyState) -> Self {
        if state.consecutive_high > 0 {
            Streak::High(state.consecutive_high)
        } else if state.consecutive_low > 0 {
            Streak::Low(state.consecutive_low)
        } else {
            Streak::Neutral
        }
    }

    const fn counts(self) -> (u32, u32) {
        match self {
            Streak::Neutral => (0, 0),
            Streak::High(count) => (count, 0),
            Streak::Low(count) => (0, count),
        }
    }
}

/// Outcome of a difficulty change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adjustment {
    /// State before the change.
    pub previous: DifficultyState,
    /// State after the change.
    pub current: DifficultyState,
    /// Direction of the change.
    pub shift: DifficultyShift,
}

/// Session-scoped difficulty controller.
#[derive(Clone, Debug)]
pub struct DifficultyController {
    config: DifficultyConfig,
    state: DifficultyState,
    observed_round: bool,
}

impl DifficultyController {
    /// Creates a controller at the configured initial difficulty.
    #[must_use]
    pub fn new(config: DifficultyConfig) -> Self {
        let state = initial_state(&config);
        Self {
            config,
            state,
            observed_round: false,
        }
    }

    /// Current difficulty parameters.
    #[must_use]
    pub fn state(&self) -> DifficultyState {
        self.state
    }

    /// Configuration the controller was built with.
    #[must_use]
    pub fn config(&self) -> &DifficultyConfig {
        &self.config
    }

    /// Returns the controller to its initial difficulty.
    pub fn reset(&mut self) {
        self.state = initial_state(&self.config);
        self.observed_round = false;
    }

    /// Records one resolved round's harmony.
    ///
    /// Returns the adjustment when tolerance or node count changed. A completed
    /// streak that is already pinned at its bounds clears without an adjustment.
    pub fn observe(&mut self, harmony: u8) -> Option<Adjustment> {
        let previous = self.state;
        let sample = f64::from(harmony);
        self.state.ewma_harmony = if self.observed_round {
            self.config.ewma_alpha * sample + (1.0 - self.config.ewma_alpha) * self.state.ewma_harmony
        } else {
            sample
        };
        self.observed_round = true;

        let band = Band::classify(harmony, &self.config);
        let (streak, shift) = Streak::from_state(&self.state).advance(band, self.config.adapt_rounds);
        let (high, low) = streak.counts();
        self.state.consecutive_high = high;
        self.state.consecutive_low = low;

        let shift = shift?;
        self.apply_shift(shift);

        let changed = self.state.tolerance_ms != previous.tolerance_ms
            || self.state.node_count != previous.node_count;
        if !changed {
            tracing::debug!(?shift, "difficulty already at bound");
            return None;
        }

        tracing::info!(
            ?shift,
            tolerance_ms = self.state.tolerance_ms,
            node_count = self.state.node_count,
            "difficulty adjusted"
        );
        Some(Adjustment {
            previous,
            current: self.state,
            shift,
        })
    }

    fn apply_shift(&mut self, shift: DifficultyShift) {
        let config = &self.config;
        let state = &mut self.state;
        match shift {
            DifficultyShift::Harder => {
                state.tolerance_ms = state
                    .tolerance_ms
                    .saturating_sub(config.tolerance_step_ms)
                    .max(config.min_tolerance_ms);
                state.node_count = state
                    .node_count
                    .saturating_add(1)
                    .min(config.max_node_count);
            }
            DifficultyShift::Easier => {
                state.tolerance_ms = state
                    .tolerance_ms
                    .saturating_add(config.tolerance_step_ms)
                    .min(config.max_tolerance_ms);
                state.node_count = state
                    .node_count
                    .saturating_sub(1)
                    .max(config.min_node_count);
            }
        }
    }
}

fn initial_state(config: &DifficultyConfig) -> DifficultyState {
    DifficultyState {
        tolerance_ms: config.initial_tolerance_ms,
        node_count: config.initial_node_count,
        consecutive_high: 0,
        consecutive_low: 0,
        ewma_harmony: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_covers_every_edge() {
        let adapt = 3;
        assert_eq!(
            Streak::Neutral.advance(Band::High, adapt),
            (Streak::High(1), None)
        );
        assert_eq!(
            Streak::High(1).advance(Band::High, adapt),
            (Streak::High(2), None)
        );
        assert_eq!(
            Streak::High(2).advance(Band::High, adapt),
            (Streak::Neutral, Some(DifficultyShift::Harder))
        );
        assert_eq!(
            Streak::High(2).advance(Band::Low, adapt),
            (Streak::Low(1), None)
        );
        assert_eq!(
            Streak::Low(2).advance(Band::Low, adapt),
            (Streak::Neutral, Some(DifficultyShift::Easier))
        );
        assert_eq!(
            Streak::Low(2).advance(Band::Neutral, adapt),
            (Streak::Neutral, None)
        );
    }

    #[test]
    fn single_round_streak_shifts_immediately() {
        assert_eq!(
            Streak::Neutral.advance(Band::Low, 1),
            (Streak::Neutral, Some(DifficultyShift::Easier))
        );
    }

    #[test]
    fn thresholds_are_inclusive() {
        let config = DifficultyConfig::default();
        assert_eq!(Band::classify(90, &config), Band::High);
        assert_eq!(Band::classify(89, &config), Band::Neutral);
        assert_eq!(Band::classify(71, &config), Band::Neutral);
        assert_eq!(Band::classify(70, &config), Band::Low);
    }

    #[test]
    fn first_round_seeds_the_average() {
        let mut controller = DifficultyController::new(DifficultyConfig::default());
        let _ = controller.observe(80);
        assert!((controller.state().ewma_harmony - 80.0).abs() < 1e-9);
        let _ = controller.observe(100);
        assert!((controller.state().ewma_harmony - 86.0).abs() < 1e-9);
    }

    #[test]
    fn zero_harmony_first_round_still_seeds_average() {
        let mut controller = DifficultyController::new(DifficultyConfig::default());
        let _ = controller.observe(0);
        let _ = controller.observe(100);
        assert!((controller.state().ewma_harmony - 30.0).abs() < 1e-9);
    }
}
