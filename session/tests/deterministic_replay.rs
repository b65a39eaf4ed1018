use std::time::Duration;

use swarasync_core::{Event, NodeId, Phase, RoundScore, SessionConfig};
use swarasync_session::{query, step, InputQueue, Session};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Clone, Copy, Debug)]
enum Scripted {
    Press,
    Release,
    Tap(Option<NodeId>),
    Pause,
    Resume,
}

#[test]
fn scripted_session_replays_identically() {
    let script = script();
    let first = replay(&script);
    let second = replay(&script);

    assert_eq!(first, second, "session replay diverged");
    assert_eq!(first.scores.len(), 2, "expected two resolved rounds");
    assert_eq!(first.final_phase, Phase::Complete);
    assert!(first
        .events
        .iter()
        .any(|event| matches!(event, Event::Paused)));
}

#[test]
fn inputs_apply_before_the_frame_advances() {
    let mut session = Session::new(SessionConfig::default()).expect("valid config");
    let mut inputs = InputQueue::new();
    let mut events = Vec::new();

    inputs.press(Duration::ZERO);
    assert_eq!(inputs.len(), 1);
    step(&mut session, FRAME, &mut inputs, &mut events);

    assert!(inputs.is_empty());
    assert_eq!(query::phase(&session), Phase::Inhale);
    assert_eq!(query::phase_elapsed(&session), FRAME);
}

#[derive(Debug, PartialEq)]
struct ReplayOutcome {
    events: Vec<Event>,
    scores: Vec<RoundScore>,
    final_phase: Phase,
}

fn replay(script: &[(u32, Scripted)]) -> ReplayOutcome {
    let mut config = SessionConfig::default();
    config.rounds_per_session = 2;
    let mut session = Session::new(config).expect("valid config");
    let mut inputs = InputQueue::new();
    let mut events = Vec::new();

    let last_frame = script.iter().map(|(frame, _)| *frame).max().unwrap_or(0) + 1_200;
    let mut cursor = 0;
    for frame in 0..last_frame {
        while cursor < script.len() && script[cursor].0 == frame {
            let now = query::clock(&session);
            match script[cursor].1 {
                Scripted::Press => inputs.press(now),
                Scripted::Release => inputs.release(now),
                Scripted::Tap(node) => inputs.tap(node, now),
                Scripted::Pause => inputs.pause(),
                Scripted::Resume => inputs.resume(),
            }
            cursor += 1;
        }
        step(&mut session, FRAME, &mut inputs, &mut events);
        if query::phase(&session) == Phase::Complete {
            break;
        }
    }

    ReplayOutcome {
        scores: query::scores(&session),
        final_phase: query::phase(&session),
        events,
    }
}

fn script() -> Vec<(u32, Scripted)> {
    vec![
        (5, Scripted::Press),
        (290, Scripted::Release),
        (400, Scripted::Pause),
        (460, Scripted::Resume),
        (720, Scripted::Tap(None)),
        (770, Scripted::Tap(None)),
        (771, Scripted::Tap(None)),
        (820, Scripted::Tap(Some(NodeId::new(2)))),
        (1_200, Scripted::Press),
        (1_600, Scripted::Tap(None)),
    ]
}
