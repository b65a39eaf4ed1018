#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative breath session state for Swarasync.
//!
//! The [`Session`] owns the phase state machine, the in-flight round and the
//! history of resolved rounds. It is mutated exclusively through [`apply`] and
//! [`step`]; adapters and systems observe it through the [`query`] module and
//! the emitted [`Event`] values.

mod input;

use std::time::Duration;

use swarasync_core::{
    millis_f64, BreathRound, Command, ConfigError, Event, NodeId, Phase, RhythmNode, RoundScore,
    SessionConfig,
};
use swarasync_system_difficulty::DifficultyController;
use swarasync_system_scoring::score_round;

pub use input::InputQueue;

/// Resolved round kept in the session history.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundRecord {
    /// Raw round data with every node.
    pub round: BreathRound,
    /// Score the round received.
    pub score: RoundScore,
    /// Tolerance that was active while the round was scored.
    pub tolerance_ms: u32,
}

#[derive(Clone, Debug)]
struct ActiveRound {
    round: BreathRound,
    phase_started: Duration,
}

/// Breath session driven by commands.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    phase: Phase,
    clock: Duration,
    paused: bool,
    active: Option<ActiveRound>,
    history: Vec<RoundRecord>,
    difficulty: DifficultyController,
}

impl Session {
    /// Creates an idle session after validating the configuration.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let difficulty = DifficultyController::new(config.difficulty.clone());
        Ok(Self {
            config,
            phase: Phase::Idle,
            clock: Duration::ZERO,
            paused: false,
            active: None,
            history: Vec::new(),
            difficulty,
        })
    }

    fn transition(&mut self, to: Phase, at: Duration, out_events: &mut Vec<Event>) {
        let from = self.phase;
        debug_assert!(
            from.can_transition_to(to),
            "illegal phase transition {from:?} -> {to:?}"
        );
        self.phase = to;
        tracing::debug!(?from, ?to, at_ms = millis_f64(at), "phase changed");
        out_events.push(Event::PhaseChanged { from, to, at });
    }

    fn start(&mut self, out_events: &mut Vec<Event>) {
        self.abandon(out_events);
        self.history.clear();
        self.difficulty.reset();
        let difficulty = self.difficulty.state();
        tracing::info!(
            total_rounds = self.config.total_rounds(),
            tolerance_ms = difficulty.tolerance_ms,
            node_count = difficulty.node_count,
            "session started"
        );
        out_events.push(Event::SessionStarted {
            total_rounds: self.config.total_rounds(),
            difficulty,
        });
    }

    fn abandon(&mut self, out_events: &mut Vec<Event>) {
        self.paused = false;
        if let Some(active) = self.active.take() {
            tracing::debug!(round = active.round.index, "round abandoned");
            out_events.push(Event::RoundAbandoned {
                round: active.round.index,
            });
        }
        if self.phase != Phase::Idle {
            self.transition(Phase::Idle, self.clock, out_events);
        }
    }

    fn press(&mut self, at: Duration, out_events: &mut Vec<Event>) {
        if self.phase != Phase::Idle {
            return;
        }
        let at = at.min(self.clock);
        let index = u32::try_from(self.history.len()).unwrap_or(u32::MAX);
        let round = BreathRound::new(
            index,
            self.config.timing.inhale_target(),
            self.config.timing.exhale_target(),
        );
        self.active = Some(ActiveRound {
            round,
            phase_started: at,
        });
        self.transition(Phase::Inhale, at, out_events);
    }

    fn release(&mut self, at: Duration, out_events: &mut Vec<Event>) {
        if self.phase != Phase::Inhale {
            return;
        }
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let at = at.min(self.clock).max(active.phase_started);
        let actual = at - active.phase_started;
        self.finish_inhale(at, actual, false, out_events);
    }

    fn finish_inhale(
        &mut self,
        at: Duration,
        actual: Duration,
        auto_released: bool,
        out_events: &mut Vec<Event>,
    ) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.round.inhale_actual = Some(actual);
        active.phase_started = at;
        let target = active.round.inhale_target;
        out_events.push(Event::BreathRecorded {
            phase: Phase::Inhale,
            target,
            actual,
            auto_released,
        });
        self.transition(Phase::Exhale, at, out_events);
    }

    fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let previous = self.clock;
        self.clock = self.clock.saturating_add(dt);

        loop {
            match self.phase {
                Phase::Inhale => {
                    let Some(active) = self.active.as_ref() else {
                        return;
                    };
                    let target = active.round.inhale_target;
                    let deadline = active.phase_started.saturating_add(target);
                    if self.clock < deadline {
                        return;
                    }
                    self.finish_inhale(deadline, target, true, out_events);
                }
                Phase::Exhale => {
                    let Some(active) = self.active.as_mut() else {
                        return;
                    };
                    let elapsed = self.clock.saturating_sub(active.phase_started);
                    let target = active.round.exhale_target;
                    if elapsed < target {
                        return;
                    }
                    active.round.exhale_actual = Some(elapsed);
                    out_events.push(Event::BreathRecorded {
                        phase: Phase::Exhale,
                        target,
                        actual: elapsed,
                        auto_released: false,
                    });
                    self.spawn_nodes(out_events);
                }
                Phase::Nodes => {
                    self.announce_targets(previous, out_events);
                    if self.nodes_settled() {
                        self.resolve(self.clock, out_events);
                    }
                    return;
                }
                Phase::Idle | Phase::Complete => return,
            }
        }
    }

    fn spawn_nodes(&mut self, out_events: &mut Vec<Event>) {
        let count = self.difficulty.state().node_count;
        let interval = self.config.nodes.interval();
        let now = self.clock;
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.phase_started = now;
        active.round.nodes = (0..count)
            .map(|index| {
                let angle = index as f32 / count as f32 * 360.0 - 90.0;
                let target = now.saturating_add(interval.saturating_mul(index + 1));
                RhythmNode::new(NodeId::new(index), angle, target)
            })
            .collect();
        let round = active.round.index;
        let nodes = active.round.nodes.clone();

        self.transition(Phase::Nodes, now, out_events);
        out_events.push(Event::NodesSpawned { round, nodes });
    }

    fn announce_targets(&self, previous: Duration, out_events: &mut Vec<Event>) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        for node in &active.round.nodes {
            if node.target > previous && node.target <= self.clock {
                out_events.push(Event::NodeReachedTarget {
                    node: node.id,
                    at: self.clock,
                });
            }
        }
    }

    fn nodes_settled(&self) -> bool {
        let grace = self.config.nodes.grace();
        self.active.as_ref().map_or(true, |active| {
            active
                .round
                .nodes
                .iter()
                .all(|node| node.is_settled(self.clock, grace))
        })
    }

    fn tap(&mut self, node: Option<NodeId>, at: Duration, out_events: &mut Vec<Event>) {
        if self.phase != Phase::Nodes {
            return;
        }
        let at = at.min(self.clock);
        let activation = self.config.nodes.activation_window();
        let hit_window_ms = millis_f64(self.config.nodes.hit_window());
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let candidate = active
            .round
            .nodes
            .iter_mut()
            .filter(|candidate| node.map_or(true, |id| candidate.id == id))
            .filter(|candidate| candidate.is_active(at, activation))
            .min_by(|a, b| a.offset_ms(at).abs().total_cmp(&b.offset_ms(at).abs()));
        let Some(candidate) = candidate else {
            return;
        };

        let delta = candidate.offset_ms(at);
        if delta.abs() > hit_window_ms || !candidate.mark_hit(delta) {
            return;
        }
        out_events.push(Event::NodeHit {
            node: candidate.id,
            angle_degrees: candidate.angle_degrees,
            timing_delta_ms: delta,
            at,
        });

        if active.round.all_hit() {
            self.resolve(at, out_events);
        }
    }

    fn resolve(&mut self, at: Duration, out_events: &mut Vec<Event>) {
        let Some(active) = self.active.take() else {
            return;
        };
        let round = active.round;
        let tolerance_ms = self.difficulty.state().tolerance_ms;
        let recent: Vec<u8> = self
            .history
            .iter()
            .map(|record| record.score.harmony)
            .collect();
        let score = score_round(&round, &recent, tolerance_ms, &self.config.scoring);

        tracing::info!(
            round = round.index,
            hits = round.hits(),
            nodes = round.nodes.len(),
            timing = score.timing,
            sequence = score.sequence,
            consistency = score.consistency,
            harmony = score.harmony,
            perfect = score.perfect,
            "round completed"
        );
        out_events.push(Event::RoundCompleted {
            round: round.clone(),
            score,
        });
        self.history.push(RoundRecord {
            round,
            score,
            tolerance_ms,
        });

        if let Some(adjustment) = self.difficulty.observe(score.harmony) {
            out_events.push(Event::DifficultyAdjusted {
                previous: adjustment.previous,
                current: adjustment.current,
                shift: adjustment.shift,
            });
        }

        if self.history.len() >= self.config.total_rounds() as usize {
            self.transition(Phase::Complete, at, out_events);
            let scores = query::scores(self);
            tracing::info!(
                rounds = scores.len(),
                average_harmony = query::average_harmony(self, scores.len()),
                "session completed"
            );
            out_events.push(Event::SessionCompleted { scores });
        } else {
            self.transition(Phase::Idle, at, out_events);
        }
    }
}

/// Applies the provided command to the session, mutating state deterministically.
///
/// Inputs that do not fit the current phase are ignored without error. While
/// paused, only `Resume`, `Reset` and `StartSession` have an effect. A `Reset`
/// issued after the session completed starts a fresh session.
pub fn apply(session: &mut Session, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::StartSession => session.start(out_events),
        Command::Reset => {
            if session.phase == Phase::Complete {
                session.start(out_events);
            } else {
                session.abandon(out_events);
            }
        }
        Command::Pause => {
            if !session.paused {
                session.paused = true;
                out_events.push(Event::Paused);
            }
        }
        Command::Resume => {
            if session.paused {
                session.paused = false;
                out_events.push(Event::Resumed);
            }
        }
        _ if session.paused => {}
        Command::Press { at } => session.press(at, out_events),
        Command::Release { at } => session.release(at, out_events),
        Command::Tap { node, at } => session.tap(node, at, out_events),
        Command::Tick { dt } => session.tick(dt, out_events),
    }
}

/// Applies every queued input in capture order, then advances the clock by `dt`.
pub fn step(
    session: &mut Session,
    dt: Duration,
    inputs: &mut InputQueue,
    out_events: &mut Vec<Event>,
) {
    for command in inputs.drain() {
        apply(session, command, out_events);
    }
    apply(session, Command::Tick { dt }, out_events);
}

/// Query functions that provide read-only access to the session state.
pub mod query {
    use std::time::Duration;

    use swarasync_core::{
        BreathRound, DifficultyState, NodeId, Phase, RoundScore, SessionConfig,
    };
    use swarasync_system_scoring::round_score;

    use super::{RoundRecord, Session};

    /// Phase currently active.
    #[must_use]
    pub fn phase(session: &Session) -> Phase {
        session.phase
    }

    /// Current session-clock time.
    #[must_use]
    pub fn clock(session: &Session) -> Duration {
        session.clock
    }

    /// Whether the session is paused.
    #[must_use]
    pub fn is_paused(session: &Session) -> bool {
        session.paused
    }

    /// Configuration the session was built with.
    #[must_use]
    pub fn config(session: &Session) -> &SessionConfig {
        &session.config
    }

    /// Round currently in flight, if any.
    #[must_use]
    pub fn current_round(session: &Session) -> Option<&BreathRound> {
        session.active.as_ref().map(|active| &active.round)
    }

    /// Time spent in the current breath or node phase.
    #[must_use]
    pub fn phase_elapsed(session: &Session) -> Duration {
        session.active.as_ref().map_or(Duration::ZERO, |active| {
            session.clock.saturating_sub(active.phase_started)
        })
    }

    /// Breath ring progress in `0.0..=1.0`.
    ///
    /// Inhale fills from 0 toward 1, exhale drains from 1 toward 0, and every
    /// other phase reports 0.
    #[must_use]
    pub fn breath_progress(session: &Session) -> f32 {
        let Some(active) = session.active.as_ref() else {
            return 0.0;
        };
        let elapsed = phase_elapsed(session).as_secs_f32();
        match session.phase {
            Phase::Inhale => ratio(elapsed, active.round.inhale_target).min(1.0),
            Phase::Exhale => (1.0 - ratio(elapsed, active.round.exhale_target)).max(0.0),
            Phase::Idle | Phase::Nodes | Phase::Complete => 0.0,
        }
    }

    fn ratio(elapsed: f32, target: Duration) -> f32 {
        let target = target.as_secs_f32();
        if target <= 0.0 {
            1.0
        } else {
            elapsed / target
        }
    }

    /// Snapshot of a rhythm node annotated with its activity flag.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct NodeView {
        /// Identifier of the node.
        pub id: NodeId,
        /// Angle around the centre in degrees.
        pub angle_degrees: f32,
        /// Session-clock time the node should be tapped at.
        pub target: Duration,
        /// Whether the node was hit.
        pub hit: bool,
        /// Whether the node is unhit and inside the activation window.
        pub active: bool,
        /// Signed distance from the target to the session clock in milliseconds.
        pub offset_ms: f64,
    }

    /// Nodes of the in-flight round in spawn order.
    #[must_use]
    pub fn nodes(session: &Session) -> Vec<NodeView> {
        let window = session.config.nodes.activation_window();
        current_round(session)
            .map(|round| {
                round
                    .nodes
                    .iter()
                    .map(|node| NodeView {
                        id: node.id,
                        angle_degrees: node.angle_degrees,
                        target: node.target,
                        hit: node.hit,
                        active: node.is_active(session.clock, window),
                        offset_ms: node.offset_ms(session.clock),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current difficulty parameters.
    #[must_use]
    pub fn difficulty(session: &Session) -> DifficultyState {
        session.difficulty.state()
    }

    /// Number of rounds resolved in this session.
    #[must_use]
    pub fn rounds_completed(session: &Session) -> u32 {
        u32::try_from(session.history.len()).unwrap_or(u32::MAX)
    }

    /// Number of rounds the session runs.
    #[must_use]
    pub fn total_rounds(session: &Session) -> u32 {
        session.config.total_rounds()
    }

    /// Resolved rounds in play order.
    #[must_use]
    pub fn history(session: &Session) -> &[RoundRecord] {
        &session.history
    }

    /// Scores of resolved rounds in play order.
    #[must_use]
    pub fn scores(session: &Session) -> Vec<RoundScore> {
        session.history.iter().map(|record| record.score).collect()
    }

    /// Score of the most recently resolved round.
    #[must_use]
    pub fn last_score(session: &Session) -> Option<RoundScore> {
        session.history.last().map(|record| record.score)
    }

    /// Mean harmony of the last `count` rounds, rounded half up; 0 when empty.
    #[must_use]
    pub fn average_harmony(session: &Session, count: usize) -> u8 {
        let start = session.history.len().saturating_sub(count);
        let window = &session.history[start..];
        if window.is_empty() {
            return 0;
        }
        let total: f64 = window
            .iter()
            .map(|record| f64::from(record.score.harmony))
            .sum();
        round_score(total / window.len() as f64)
    }

    /// Aggregate statistics over the resolved rounds.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SessionSummary {
        /// Rounds resolved.
        pub rounds: u32,
        /// Mean harmony over every resolved round.
        pub average_harmony: u8,
        /// Rounds that qualified as perfect.
        pub perfect_rounds: u32,
        /// Highest harmony reached.
        pub best_harmony: u8,
        /// Share of nodes hit across every resolved round, `100` when no nodes were spawned.
        pub sequence_accuracy: u8,
        /// Rounds whose harmony reached [`CONSISTENT_HARMONY`].
        pub consistent_rounds: u32,
    }

    /// Harmony at or above which a round counts as consistent.
    pub const CONSISTENT_HARMONY: u8 = 75;

    /// Summarises the resolved rounds.
    #[must_use]
    pub fn summary(session: &Session) -> SessionSummary {
        let perfect = session
            .history
            .iter()
            .filter(|record| record.score.perfect)
            .count();
        let consistent = session
            .history
            .iter()
            .filter(|record| record.score.harmony >= CONSISTENT_HARMONY)
            .count();
        let (hits, nodes) = session
            .history
            .iter()
            .fold((0_usize, 0_usize), |(hits, nodes), record| {
                (hits + record.round.hits(), nodes + record.round.nodes.len())
            });
        let sequence_accuracy = if nodes == 0 {
            100
        } else {
            round_score(100.0 * hits as f64 / nodes as f64)
        };
        SessionSummary {
            rounds: rounds_completed(session),
            average_harmony: average_harmony(session, session.history.len()),
            perfect_rounds: u32::try_from(perfect).unwrap_or(u32::MAX),
            best_harmony: session
                .history
                .iter()
                .map(|record| record.score.harmony)
                .max()
                .unwrap_or(0),
            sequence_accuracy,
            consistent_rounds: u32::try_from(consistent).unwrap_or(u32::MAX),
        }
    }
}
