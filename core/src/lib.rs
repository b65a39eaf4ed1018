#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Swarasync breath-rhythm engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative session, and pure systems. Adapters submit [`Command`] values
//! describing user input and elapsed time, the session executes those commands
//! via its `apply` entry point, and then broadcasts [`Event`] values for
//! systems (mandala accumulation, audio/haptic feedback) to react to
//! deterministically. All timestamps are expressed as [`Duration`] values
//! measured on the session clock.

mod config;

use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use config::{
    ConfigError, DifficultyConfig, MandalaConfig, NodeConfig, ScoringWeights, SessionConfig,
    TimingConfig,
};

/// Highest value any score can take.
pub const MAX_SCORE: u8 = 100;

/// Breath phase currently active in the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for the user to press and begin an inhale.
    Idle,
    /// The user is holding to inhale.
    Inhale,
    /// The user released and the exhale countdown is running.
    Exhale,
    /// Rhythm nodes are live and waiting for taps.
    Nodes,
    /// Every round of the session has resolved.
    Complete,
}

impl Phase {
    /// Reports whether the transition `self -> to` is one of the permitted edges.
    ///
    /// Resets back to [`Phase::Idle`] are permitted from every phase.
    #[must_use]
    pub const fn can_transition_to(self, to: Phase) -> bool {
        matches!(
            (self, to),
            (Phase::Idle, Phase::Inhale)
                | (Phase::Inhale, Phase::Exhale)
                | (Phase::Exhale, Phase::Nodes)
                | (Phase::Nodes, Phase::Idle)
                | (Phase::Nodes, Phase::Complete)
                | (_, Phase::Idle)
        )
    }
}

/// Commands that express every permissible session mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Starts a fresh session, clearing history and difficulty.
    StartSession,
    /// The user pressed and is holding.
    Press {
        /// Session-clock time at which the press was captured.
        at: Duration,
    },
    /// The user released a held press.
    Release {
        /// Session-clock time at which the release was captured.
        at: Duration,
    },
    /// The user tapped during the nodes phase.
    Tap {
        /// Node the tap was aimed at, or `None` to match the nearest active node.
        node: Option<NodeId>,
        /// Session-clock time at which the tap was captured.
        at: Duration,
    },
    /// Advances the session clock by the provided delta time.
    Tick {
        /// Duration of elapsed time since the previous tick.
        dt: Duration,
    },
    /// Freezes the session without discarding the in-flight round.
    Pause,
    /// Resumes a paused session.
    Resume,
    /// Discards the in-flight round and returns to idle.
    Reset,
}

/// Events broadcast by the session after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A new session began with the provided difficulty.
    SessionStarted {
        /// Number of rounds the session will run.
        total_rounds: u32,
        /// Difficulty applied to the first round.
        difficulty: DifficultyState,
    },
    /// The session moved between two phases.
    PhaseChanged {
        /// Phase active before the transition.
        from: Phase,
        /// Phase active after the transition.
        to: Phase,
        /// Session-clock time of the transition.
        at: Duration,
    },
    /// A breath phase finished and its duration was recorded.
    BreathRecorded {
        /// Breath phase that finished, either inhale or exhale.
        phase: Phase,
        /// Duration the phase was expected to last.
        target: Duration,
        /// Duration the phase actually lasted.
        actual: Duration,
        /// Whether the inhale ended by reaching its target while still held.
        auto_released: bool,
    },
    /// The node batch for a round was created.
    NodesSpawned {
        /// Zero-based index of the round the nodes belong to.
        round: u32,
        /// Nodes in spawn order.
        nodes: Vec<RhythmNode>,
    },
    /// A node's target time was crossed by the session clock.
    NodeReachedTarget {
        /// Node whose target elapsed.
        node: NodeId,
        /// Session-clock time of the crossing tick.
        at: Duration,
    },
    /// A tap landed inside a node's hit window.
    NodeHit {
        /// Node that was hit.
        node: NodeId,
        /// Angle of the node around the centre, in degrees.
        angle_degrees: f32,
        /// Signed offset from the node target; negative is early.
        timing_delta_ms: f64,
        /// Session-clock time of the tap.
        at: Duration,
    },
    /// A round resolved and was scored.
    RoundCompleted {
        /// Raw round data, including every node.
        round: BreathRound,
        /// Score assigned to the round.
        score: RoundScore,
    },
    /// The difficulty controller changed tolerance or node count.
    DifficultyAdjusted {
        /// Difficulty before the adjustment.
        previous: DifficultyState,
        /// Difficulty after the adjustment.
        current: DifficultyState,
        /// Direction of the change.
        shift: DifficultyShift,
    },
    /// All rounds of the session resolved.
    SessionCompleted {
        /// Scores of every round in play order.
        scores: Vec<RoundScore>,
    },
    /// An in-flight round was discarded by a reset.
    RoundAbandoned {
        /// Index of the discarded round.
        round: u32,
    },
    /// The session was paused.
    Paused,
    /// The session was resumed.
    Resumed,
}

/// Unique identifier assigned to a rhythm node within a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a new node identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Timed radial target the user acknowledges with a tap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RhythmNode {
    /// Identifier unique within the round.
    pub id: NodeId,
    /// Angle around the centre in degrees; -90 is the top.
    pub angle_degrees: f32,
    /// Session-clock time the node should be tapped at.
    pub target: Duration,
    /// Whether a tap landed inside the hit window.
    pub hit: bool,
    /// Signed tap offset in milliseconds, present once hit.
    pub timing_delta_ms: Option<f64>,
}

impl RhythmNode {
    /// Creates an unhit node.
    #[must_use]
    pub const fn new(id: NodeId, angle_degrees: f32, target: Duration) -> Self {
        Self {
            id,
            angle_degrees,
            target,
            hit: false,
            timing_delta_ms: None,
        }
    }

    /// Signed distance from the target to `now` in milliseconds.
    #[must_use]
    pub fn offset_ms(&self, now: Duration) -> f64 {
        signed_millis(now, self.target)
    }

    /// Visual activity flag: unhit and within `window` of the target.
    #[must_use]
    pub fn is_active(&self, now: Duration, window: Duration) -> bool {
        !self.hit && self.offset_ms(now).abs() <= millis_f64(window)
    }

    /// Whether the node can no longer be hit at `now`.
    #[must_use]
    pub fn is_settled(&self, now: Duration, grace: Duration) -> bool {
        self.hit || now >= self.target.saturating_add(grace)
    }

    /// Marks the node hit with the provided offset.
    ///
    /// Returns `false` without touching the node if it was already hit.
    pub fn mark_hit(&mut self, timing_delta_ms: f64) -> bool {
        if self.hit {
            return false;
        }
        self.hit = true;
        self.timing_delta_ms = Some(timing_delta_ms);
        true
    }
}

/// One breath-and-tap cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreathRound {
    /// Zero-based index of the round within the session.
    pub index: u32,
    /// Expected inhale duration.
    pub inhale_target: Duration,
    /// Expected exhale duration.
    pub exhale_target: Duration,
    /// Measured inhale duration, recorded when exhale begins.
    pub inhale_actual: Option<Duration>,
    /// Measured exhale duration, recorded when nodes spawn.
    pub exhale_actual: Option<Duration>,
    /// Node batch spawned when the exhale completed.
    pub nodes: Vec<RhythmNode>,
}

impl BreathRound {
    /// Creates a round with targets but no measurements yet.
    #[must_use]
    pub const fn new(index: u32, inhale_target: Duration, exhale_target: Duration) -> Self {
        Self {
            index,
            inhale_target,
            exhale_target,
            inhale_actual: None,
            exhale_actual: None,
            nodes: Vec::new(),
        }
    }

    /// Number of nodes hit so far.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.nodes.iter().filter(|node| node.hit).count()
    }

    /// Recorded offsets of every hit node, in node order.
    #[must_use]
    pub fn hit_deltas_ms(&self) -> Vec<f64> {
        self.nodes
            .iter()
            .filter_map(|node| node.timing_delta_ms)
            .collect()
    }

    /// Whether every node of the round has been hit.
    #[must_use]
    pub fn all_hit(&self) -> bool {
        self.nodes.iter().all(|node| node.hit)
    }
}

/// Score assigned to a resolved round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundScore {
    /// Breath timing accuracy.
    pub timing: u8,
    /// Node hit ratio plus accuracy bonus.
    pub sequence: u8,
    /// Stability across recent rounds.
    pub consistency: u8,
    /// Weighted blend of the three sub-scores.
    pub harmony: u8,
    /// Whether the round qualifies as perfect.
    pub perfect: bool,
}

/// Session-scoped difficulty parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyState {
    /// Breath timing tolerance in milliseconds.
    pub tolerance_ms: u32,
    /// Number of nodes spawned per round.
    pub node_count: u32,
    /// Consecutive rounds at or above the increase threshold.
    pub consecutive_high: u32,
    /// Consecutive rounds at or below the decrease threshold.
    pub consecutive_low: u32,
    /// Exponentially weighted harmony average.
    pub ewma_harmony: f64,
}

/// Direction of a difficulty adjustment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DifficultyShift {
    /// Tolerance tightened and nodes added.
    Harder,
    /// Tolerance loosened and nodes removed.
    Easier,
}

/// Single visual sample accumulated into the mandala.
///
/// Positions are expressed in mandala space: the centre is the origin and a
/// distance of `1.0` reaches the outer guide ring.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MandalaPoint {
    /// Position relative to the mandala centre.
    pub position: Vec2,
    /// Symmetry slot the point belongs to, in `0..petals`.
    pub slot: u32,
    /// Stroke thickness in reference pixels.
    pub thickness: f32,
    /// Opacity in the range 0.0..=1.0.
    pub alpha: f32,
    /// Hue in degrees.
    pub hue: f32,
    /// Session-clock time the point was created, in milliseconds.
    pub created_at_ms: u64,
}

/// Signed difference `a - b` in milliseconds.
#[must_use]
pub fn signed_millis(a: Duration, b: Duration) -> f64 {
    if a >= b {
        millis_f64(a - b)
    } else {
        -millis_f64(b - a)
    }
}

/// Duration expressed as fractional milliseconds.
#[must_use]
pub fn millis_f64(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_edges_follow_breath_cycle() {
        assert!(Phase::Idle.can_transition_to(Phase::Inhale));
        assert!(Phase::Inhale.can_transition_to(Phase::Exhale));
        assert!(Phase::Exhale.can_transition_to(Phase::Nodes));
        assert!(Phase::Nodes.can_transition_to(Phase::Complete));
        assert!(Phase::Complete.can_transition_to(Phase::Idle));
        assert!(!Phase::Idle.can_transition_to(Phase::Nodes));
        assert!(!Phase::Exhale.can_transition_to(Phase::Inhale));
        assert!(!Phase::Inhale.can_transition_to(Phase::Complete));
    }

    #[test]
    fn node_hit_is_idempotent() {
        let mut node = RhythmNode::new(NodeId::new(0), -90.0, Duration::from_secs(2));
        assert!(node.mark_hit(12.0));
        assert!(!node.mark_hit(-40.0));
        assert_eq!(node.timing_delta_ms, Some(12.0));
    }

    #[test]
    fn node_activity_is_symmetric_around_target() {
        let node = RhythmNode::new(NodeId::new(1), 0.0, Duration::from_millis(1_000));
        let window = Duration::from_millis(400);
        assert!(node.is_active(Duration::from_millis(600), window));
        assert!(node.is_active(Duration::from_millis(1_400), window));
        assert!(!node.is_active(Duration::from_millis(599), window));
        assert!(!node.is_active(Duration::from_millis(1_401), window));
    }

    #[test]
    fn signed_millis_reports_early_taps_as_negative() {
        let early = signed_millis(Duration::from_millis(950), Duration::from_millis(1_000));
        let late = signed_millis(Duration::from_millis(1_030), Duration::from_millis(1_000));
        assert!((early + 50.0).abs() < 1e-9);
        assert!((late - 30.0).abs() < 1e-9);
    }

    #[test]
    fn round_score_history_round_trips_through_bincode() {
        let scores = vec![
            RoundScore {
                timing: 88,
                sequence: 100,
                consistency: 100,
                harmony: 94,
                perfect: false,
            },
            RoundScore {
                timing: 100,
                sequence: 100,
                consistency: 98,
                harmony: 100,
                perfect: true,
            },
        ];
        let bytes = bincode::serialize(&scores).expect("serialize");
        let restored: Vec<RoundScore> = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, scores);
    }
}
