use std::time::Duration;

use swarasync_core::{Command, DifficultyShift, Event, NodeId, Phase, SessionConfig};
use swarasync_session::{apply, query, Session};

const TICK: Duration = Duration::from_millis(10);

fn new_session() -> Session {
    Session::new(SessionConfig::default()).expect("default config is valid")
}

fn run_until(session: &mut Session, until: Duration, events: &mut Vec<Event>) {
    while query::clock(session) < until {
        apply(session, Command::Tick { dt: TICK }, events);
    }
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Holds until the inhale auto-releases, waits out the exhale and taps every node on time.
fn play_perfect_round(session: &mut Session, events: &mut Vec<Event>) {
    let start = query::clock(session);
    apply(session, Command::Press { at: start }, events);
    while query::phase(session) != Phase::Nodes {
        apply(session, Command::Tick { dt: TICK }, events);
    }
    for node in query::nodes(session) {
        run_until(session, node.target, events);
        apply(
            session,
            Command::Tap {
                node: None,
                at: node.target,
            },
            events,
        );
    }
}

#[test]
fn manual_round_is_scored_perfect() {
    let mut session = new_session();
    let mut events = Vec::new();

    apply(&mut session, Command::Press { at: ms(0) }, &mut events);
    run_until(&mut session, ms(4_900), &mut events);
    apply(&mut session, Command::Release { at: ms(4_900) }, &mut events);
    assert_eq!(query::phase(&session), Phase::Exhale);

    run_until(&mut session, ms(10_900), &mut events);
    assert_eq!(query::phase(&session), Phase::Nodes);

    let targets: Vec<Duration> = query::nodes(&session)
        .iter()
        .map(|node| node.target)
        .collect();
    assert_eq!(targets, vec![ms(11_700), ms(12_500), ms(13_300), ms(14_100)]);

    for target in targets {
        run_until(&mut session, target, &mut events);
        apply(
            &mut session,
            Command::Tap {
                node: None,
                at: target,
            },
            &mut events,
        );
    }

    assert_eq!(query::phase(&session), Phase::Idle);
    let record = &query::history(&session)[0];
    assert_eq!(record.round.inhale_actual, Some(ms(4_900)));
    assert_eq!(record.round.exhale_actual, Some(ms(6_000)));
    assert_eq!(record.score.harmony, 100);
    assert!(record.score.perfect);
    assert!(events.contains(&Event::BreathRecorded {
        phase: Phase::Inhale,
        target: ms(5_000),
        actual: ms(4_900),
        auto_released: false,
    }));
}

#[test]
fn held_press_auto_releases_at_target() {
    let mut session = new_session();
    let mut events = Vec::new();

    apply(&mut session, Command::Press { at: ms(0) }, &mut events);
    run_until(&mut session, ms(5_000), &mut events);

    assert_eq!(query::phase(&session), Phase::Exhale);
    assert!(events.contains(&Event::BreathRecorded {
        phase: Phase::Inhale,
        target: ms(5_000),
        actual: ms(5_000),
        auto_released: true,
    }));
    assert!(events.contains(&Event::PhaseChanged {
        from: Phase::Inhale,
        to: Phase::Exhale,
        at: ms(5_000),
    }));
}

#[test]
fn exhale_ignores_press_and_release() {
    let mut session = new_session();
    let mut events = Vec::new();

    apply(&mut session, Command::Press { at: ms(0) }, &mut events);
    run_until(&mut session, ms(6_000), &mut events);
    events.clear();

    apply(&mut session, Command::Press { at: ms(6_000) }, &mut events);
    apply(&mut session, Command::Release { at: ms(6_000) }, &mut events);

    assert!(events.is_empty());
    assert_eq!(query::phase(&session), Phase::Exhale);
}

#[test]
fn zero_tap_round_resolves_after_last_grace_period() {
    let mut session = new_session();
    let mut events = Vec::new();

    apply(&mut session, Command::Press { at: ms(0) }, &mut events);
    run_until(&mut session, ms(11_000), &mut events);
    assert_eq!(query::phase(&session), Phase::Nodes);
    let last_target = query::nodes(&session)
        .last()
        .map(|node| node.target)
        .expect("nodes spawned");
    assert_eq!(last_target, ms(14_200));

    run_until(&mut session, ms(14_690), &mut events);
    assert_eq!(query::phase(&session), Phase::Nodes);

    run_until(&mut session, ms(14_700), &mut events);
    assert_eq!(query::phase(&session), Phase::Idle);

    let record = &query::history(&session)[0];
    assert_eq!(record.round.nodes.len(), 4);
    assert!(record.round.nodes.iter().all(|node| !node.hit));
    assert_eq!(record.score.sequence, 0);
    assert_eq!(record.score.harmony, 70);

    let reached = events
        .iter()
        .filter(|event| matches!(event, Event::NodeReachedTarget { .. }))
        .count();
    assert_eq!(reached, 4);
}

#[test]
fn re_tapping_a_hit_node_is_a_no_op() {
    let mut session = new_session();
    let mut events = Vec::new();

    apply(&mut session, Command::Press { at: ms(0) }, &mut events);
    run_until(&mut session, ms(11_800), &mut events);
    apply(
        &mut session,
        Command::Tap {
            node: Some(NodeId::new(0)),
            at: ms(11_830),
        },
        &mut events,
    );
    events.clear();

    apply(
        &mut session,
        Command::Tap {
            node: Some(NodeId::new(0)),
            at: ms(11_800),
        },
        &mut events,
    );

    assert!(events.is_empty());
    let round = query::current_round(&session).expect("round in flight");
    assert!(round.nodes[0].hit);
    assert_eq!(round.nodes[0].timing_delta_ms, Some(0.0));
}

#[test]
fn tap_outside_hit_window_leaves_node_available() {
    let mut session = new_session();
    let mut events = Vec::new();

    apply(&mut session, Command::Press { at: ms(0) }, &mut events);
    run_until(&mut session, ms(11_500), &mut events);
    let active: Vec<bool> = query::nodes(&session).iter().map(|node| node.active).collect();
    assert_eq!(active, vec![true, false, false, false]);

    events.clear();
    apply(
        &mut session,
        Command::Tap {
            node: None,
            at: ms(11_500),
        },
        &mut events,
    );
    assert!(events.is_empty());

    run_until(&mut session, ms(11_650), &mut events);
    apply(
        &mut session,
        Command::Tap {
            node: None,
            at: ms(11_650),
        },
        &mut events,
    );
    assert!(events.contains(&Event::NodeHit {
        node: NodeId::new(0),
        angle_degrees: -90.0,
        timing_delta_ms: -150.0,
        at: ms(11_650),
    }));
}

#[test]
fn tap_matches_nearest_active_node() {
    let mut config = SessionConfig::default();
    config.nodes.interval_ms = 300;
    let mut session = Session::new(config).expect("valid config");
    let mut events = Vec::new();

    apply(&mut session, Command::Press { at: ms(0) }, &mut events);
    run_until(&mut session, ms(11_500), &mut events);
    let active: Vec<bool> = query::nodes(&session).iter().map(|node| node.active).collect();
    assert_eq!(active, vec![true, true, true, false]);
    events.clear();

    apply(
        &mut session,
        Command::Tap {
            node: None,
            at: ms(11_500),
        },
        &mut events,
    );

    assert_eq!(
        events,
        vec![Event::NodeHit {
            node: NodeId::new(1),
            angle_degrees: 0.0,
            timing_delta_ms: -100.0,
            at: ms(11_500),
        }]
    );
    let round = query::current_round(&session).expect("round in flight");
    assert!(!round.nodes[0].hit);
}

#[test]
fn tap_aimed_at_inactive_node_is_ignored() {
    let mut session = new_session();
    let mut events = Vec::new();

    apply(&mut session, Command::Press { at: ms(0) }, &mut events);
    run_until(&mut session, ms(11_800), &mut events);
    events.clear();

    apply(
        &mut session,
        Command::Tap {
            node: Some(NodeId::new(2)),
            at: ms(11_800),
        },
        &mut events,
    );
    assert!(events.is_empty());
}

#[test]
fn pause_freezes_the_round() {
    let mut session = new_session();
    let mut events = Vec::new();

    apply(&mut session, Command::Press { at: ms(0) }, &mut events);
    run_until(&mut session, ms(1_000), &mut events);
    apply(&mut session, Command::Pause, &mut events);

    for _ in 0..1_000 {
        apply(&mut session, Command::Tick { dt: TICK }, &mut events);
    }
    apply(&mut session, Command::Release { at: ms(1_000) }, &mut events);

    assert!(query::is_paused(&session));
    assert_eq!(query::phase(&session), Phase::Inhale);
    assert_eq!(query::clock(&session), ms(1_000));

    apply(&mut session, Command::Resume, &mut events);
    run_until(&mut session, ms(5_000), &mut events);
    assert_eq!(query::phase(&session), Phase::Exhale);
    assert_eq!(
        query::current_round(&session).and_then(|round| round.inhale_actual),
        Some(ms(5_000))
    );
}

#[test]
fn reset_discards_the_in_flight_round() {
    let mut session = new_session();
    let mut events = Vec::new();

    apply(&mut session, Command::Press { at: ms(0) }, &mut events);
    run_until(&mut session, ms(7_000), &mut events);
    events.clear();

    apply(&mut session, Command::Reset, &mut events);

    assert_eq!(
        events,
        vec![
            Event::RoundAbandoned { round: 0 },
            Event::PhaseChanged {
                from: Phase::Exhale,
                to: Phase::Idle,
                at: ms(7_000),
            },
        ]
    );
    assert!(query::current_round(&session).is_none());
    assert!(query::history(&session).is_empty());
    assert_eq!(query::breath_progress(&session), 0.0);
}

#[test]
fn three_strong_rounds_raise_difficulty_for_the_next_round() {
    let mut session = new_session();
    let mut events = Vec::new();

    for _ in 0..3 {
        play_perfect_round(&mut session, &mut events);
    }

    let adjustments: Vec<&Event> = events
        .iter()
        .filter(|event| matches!(event, Event::DifficultyAdjusted { .. }))
        .collect();
    assert_eq!(adjustments.len(), 1);
    if let Event::DifficultyAdjusted { current, shift, .. } = adjustments[0] {
        assert_eq!(*shift, DifficultyShift::Harder);
        assert_eq!(current.tolerance_ms, 250);
        assert_eq!(current.node_count, 5);
    }

    let start = query::clock(&session);
    apply(&mut session, Command::Press { at: start }, &mut events);
    while query::phase(&session) != Phase::Nodes {
        apply(&mut session, Command::Tick { dt: TICK }, &mut events);
    }
    assert_eq!(query::nodes(&session).len(), 5);
}

#[test]
fn session_completes_after_configured_rounds() {
    let mut config = SessionConfig::default();
    config.rounds_per_session = 2;
    let mut session = Session::new(config).expect("valid config");
    let mut events = Vec::new();

    play_perfect_round(&mut session, &mut events);
    assert_eq!(query::phase(&session), Phase::Idle);
    play_perfect_round(&mut session, &mut events);
    assert_eq!(query::phase(&session), Phase::Complete);

    let completed = events
        .iter()
        .find_map(|event| match event {
            Event::SessionCompleted { scores } => Some(scores.clone()),
            _ => None,
        })
        .expect("session completed");
    assert_eq!(completed, query::scores(&session));

    let summary = query::summary(&session);
    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.perfect_rounds, 2);
    assert_eq!(summary.best_harmony, 100);
    assert_eq!(summary.average_harmony, 100);
    assert_eq!(summary.sequence_accuracy, 100);
    assert_eq!(summary.consistent_rounds, 2);

    events.clear();
    let now = query::clock(&session);
    apply(&mut session, Command::Press { at: now }, &mut events);
    assert!(events.is_empty());

    apply(&mut session, Command::Reset, &mut events);
    assert_eq!(query::phase(&session), Phase::Idle);
    assert!(query::history(&session).is_empty());
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::SessionStarted { total_rounds: 2, .. })));
}

#[test]
fn summary_counts_hits_across_rounds() {
    let mut session = new_session();
    let mut events = Vec::new();

    let empty = query::summary(&session);
    assert_eq!(empty.sequence_accuracy, 100);
    assert_eq!(empty.consistent_rounds, 0);

    play_perfect_round(&mut session, &mut events);

    let start = query::clock(&session);
    apply(&mut session, Command::Press { at: start }, &mut events);
    while query::phase(&session) != Phase::Nodes {
        apply(&mut session, Command::Tick { dt: TICK }, &mut events);
    }
    let nodes = query::nodes(&session);
    assert_eq!(nodes.len(), 4);
    for node in nodes.iter().take(2) {
        run_until(&mut session, node.target, &mut events);
        apply(
            &mut session,
            Command::Tap {
                node: None,
                at: node.target,
            },
            &mut events,
        );
    }
    while query::phase(&session) == Phase::Nodes {
        apply(&mut session, Command::Tick { dt: TICK }, &mut events);
    }

    let summary = query::summary(&session);
    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.sequence_accuracy, 75);
    let consistent = query::history(&session)
        .iter()
        .filter(|record| record.score.harmony >= query::CONSISTENT_HARMONY)
        .count();
    assert_eq!(summary.consistent_rounds as usize, consistent);
    assert!(summary.consistent_rounds >= 1);
}
