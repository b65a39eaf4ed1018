#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure scoring functions that turn a resolved breath round into a [`RoundScore`].
//!
//! Every function here is deterministic and free of side effects. Outputs are
//! integers in `0..=100` produced with round-half-up semantics.

use std::time::Duration;

use swarasync_core::{BreathRound, RoundScore, ScoringWeights, MAX_SCORE};

/// Share of the target duration at which the timing score reaches zero.
pub const TIMING_FALLOFF_RATIO: f64 = 0.5;

/// Largest accuracy bonus the sequence score can award.
pub const SEQUENCE_BONUS_CAP: f64 = 20.0;

/// Milliseconds of mean tap offset that cost one bonus point.
pub const SEQUENCE_BONUS_DIVISOR_MS: f64 = 10.0;

/// Number of previous harmonies considered by the consistency score.
pub const CONSISTENCY_WINDOW: usize = 3;

/// Harmony a round must reach to count as perfect.
pub const PERFECT_HARMONY: u8 = 95;

/// Largest breath deviation a perfect round may carry.
pub const PERFECT_BREATH_DELTA: Duration = Duration::from_millis(200);

/// Rounds half away from zero and clamps into the score range.
#[must_use]
pub fn round_score(value: f64) -> u8 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let rounded = (value + 0.5).floor();
    if rounded >= f64::from(MAX_SCORE) {
        MAX_SCORE
    } else {
        rounded as u8
    }
}

/// Scores how closely a breath phase matched its target, all values in seconds.
///
/// Deviations inside `tolerance` earn full marks. Beyond it the score falls
/// linearly and reaches zero once the deviation equals half the target.
#[must_use]
pub fn timing(target: f64, actual: f64, tolerance: f64) -> u8 {
    let delta = (target - actual).abs();
    if delta <= tolerance {
        return MAX_SCORE;
    }
    let max_delta = target * TIMING_FALLOFF_RATIO;
    if max_delta <= 0.0 {
        return 0;
    }
    round_score(100.0 - delta / max_delta * 100.0)
}

/// Scores the node phase from the hit ratio and the mean absolute tap offset.
///
/// A round without nodes is neutral and scores 100.
#[must_use]
pub fn sequence(hits: usize, total: usize, deltas_ms: &[f64]) -> u8 {
    if total == 0 {
        return MAX_SCORE;
    }
    let base = hits as f64 / total as f64 * 100.0;
    let bonus = if hits > 0 && !deltas_ms.is_empty() {
        let mean = deltas_ms.iter().map(|delta| delta.abs()).sum::<f64>() / deltas_ms.len() as f64;
        (SEQUENCE_BONUS_CAP - mean / SEQUENCE_BONUS_DIVISOR_MS).max(0.0)
    } else {
        0.0
    };
    round_score(base + bonus)
}

/// Scores stability from the spread of recent harmonies and the new timing score.
///
/// Fewer than two previous rounds yield a neutral 100. Otherwise the population
/// standard deviation of the last [`CONSISTENCY_WINDOW`] harmonies plus the new
/// timing score is subtracted twice from 100.
#[must_use]
pub fn consistency(recent_harmonies: &[u8], new_timing: u8) -> u8 {
    if recent_harmonies.len() < 2 {
        return MAX_SCORE;
    }
    let start = recent_harmonies.len().saturating_sub(CONSISTENCY_WINDOW);
    let samples: Vec<f64> = recent_harmonies[start..]
        .iter()
        .chain(std::iter::once(&new_timing))
        .map(|value| f64::from(*value))
        .collect();
    let count = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / count;
    let variance = samples
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / count;
    round_score(100.0 - 2.0 * variance.sqrt())
}

/// Blends the three sub-scores with the configured weights.
#[must_use]
pub fn harmony(weights: &ScoringWeights, timing: u8, sequence: u8, consistency: u8) -> u8 {
    round_score(
        weights.timing * f64::from(timing)
            + weights.sequence * f64::from(sequence)
            + weights.consistency * f64::from(consistency),
    )
}

/// Whether a round qualifies as perfect.
#[must_use]
pub fn is_perfect(harmony: u8, all_hit: bool, inhale_delta: Duration, exhale_delta: Duration) -> bool {
    harmony >= PERFECT_HARMONY
        && all_hit
        && inhale_delta <= PERFECT_BREATH_DELTA
        && exhale_delta <= PERFECT_BREATH_DELTA
}

/// Scores a resolved round.
///
/// `recent_harmonies` holds the harmonies of earlier rounds in play order and
/// `tolerance_ms` is the difficulty tolerance active while the round was played.
/// A missing breath measurement counts as a zero-length phase.
#[must_use]
pub fn score_round(
    round: &BreathRound,
    recent_harmonies: &[u8],
    tolerance_ms: u32,
    weights: &ScoringWeights,
) -> RoundScore {
    let tolerance = f64::from(tolerance_ms) / 1_000.0;
    let inhale_actual = round.inhale_actual.unwrap_or_default();
    let exhale_actual = round.exhale_actual.unwrap_or_default();

    let inhale_score = timing(
        round.inhale_target.as_secs_f64(),
        inhale_actual.as_secs_f64(),
        tolerance,
    );
    let exhale_score = timing(
        round.exhale_target.as_secs_f64(),
        exhale_actual.as_secs_f64(),
        tolerance,
    );
    let timing_score = round_score((f64::from(inhale_score) + f64::from(exhale_score)) / 2.0);

    let deltas = round.hit_deltas_ms();
    let sequence_score = sequence(round.hits(), round.nodes.len(), &deltas);
    let consistency_score = consistency(recent_harmonies, timing_score);
    let harmony_score = harmony(weights, timing_score, sequence_score, consistency_score);

    let perfect = is_perfect(
        harmony_score,
        round.all_hit(),
        abs_diff(round.inhale_target, inhale_actual),
        abs_diff(round.exhale_target, exhale_actual),
    );

    RoundScore {
        timing: timing_score,
        sequence: sequence_score,
        consistency: consistency_score,
        harmony: harmony_score,
        perfect,
    }
}

fn abs_diff(a: Duration, b: Duration) -> Duration {
    if a >= b {
        a - b
    } else {
        b - a
    }
}
