#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Translates session events into one-way audio and haptic cues.

use std::time::Duration;

use swarasync_core::{millis_f64, Event, Phase};

/// Volume of the reference tick played when a node reaches its target.
pub const REFERENCE_TICK_INTENSITY: f32 = 0.3;

/// Harmony at or above which a completed round rings the bell.
pub const BELL_HARMONY: u8 = 80;

/// Strength of a haptic pulse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HapticStrength {
    /// Short, soft pulse.
    Light,
    /// Noticeable pulse.
    Medium,
    /// Strong pulse.
    Heavy,
}

/// Fire-and-forget request for the audio or haptic collaborator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cue {
    /// Start the sustained breathing drone.
    DroneStart,
    /// Stop the breathing drone.
    DroneStop,
    /// Metronome tick at the provided intensity in `0.0..=1.0`.
    Tick {
        /// Playback intensity.
        intensity: f32,
    },
    /// Bell rung for a strong round.
    Bell,
    /// Bell rung for a perfect round.
    PerfectBell,
    /// Vibration pulse.
    Haptic(HapticStrength),
}

/// Receiver of cues. Implementations must not block.
pub trait CueSink {
    /// Delivers a single cue.
    fn play(&mut self, cue: Cue);
}

impl CueSink for Vec<Cue> {
    fn play(&mut self, cue: Cue) {
        self.push(cue);
    }
}

/// Pure system that maps events to cues.
#[derive(Debug)]
pub struct Feedback {
    hit_window_ms: f64,
    drone_playing: bool,
}

impl Feedback {
    /// Creates a feedback system that scales hit ticks against `hit_window`.
    #[must_use]
    pub fn new(hit_window: Duration) -> Self {
        Self {
            hit_window_ms: millis_f64(hit_window),
            drone_playing: false,
        }
    }

    /// Whether the drone was started and not yet stopped.
    #[must_use]
    pub fn drone_playing(&self) -> bool {
        self.drone_playing
    }

    /// Consumes session events and forwards the resulting cues to `sink`.
    pub fn handle<S>(&mut self, events: &[Event], sink: &mut S)
    where
        S: CueSink + ?Sized,
    {
        for event in events {
            match event {
                Event::PhaseChanged {
                    to: Phase::Inhale, ..
                } => {
                    if !self.drone_playing {
                        self.drone_playing = true;
                        emit(sink, Cue::DroneStart);
                    }
                    emit(sink, Cue::Haptic(HapticStrength::Medium));
                }
                Event::PhaseChanged {
                    to: Phase::Exhale, ..
                } => emit(sink, Cue::Haptic(HapticStrength::Light)),
                Event::NodeReachedTarget { .. } => emit(
                    sink,
                    Cue::Tick {
                        intensity: REFERENCE_TICK_INTENSITY,
                    },
                ),
                Event::NodeHit {
                    timing_delta_ms, ..
                } => {
                    emit(
                        sink,
                        Cue::Tick {
                            intensity: self.hit_intensity(*timing_delta_ms),
                        },
                    );
                    emit(sink, Cue::Haptic(HapticStrength::Light));
                }
                Event::RoundCompleted { score, .. } => {
                    if score.perfect {
                        emit(sink, Cue::PerfectBell);
                        emit(sink, Cue::Haptic(HapticStrength::Heavy));
                    } else if score.harmony >= BELL_HARMONY {
                        emit(sink, Cue::Bell);
                    }
                }
                Event::SessionCompleted { .. } | Event::RoundAbandoned { .. } => {
                    if self.drone_playing {
                        self.drone_playing = false;
                        emit(sink, Cue::DroneStop);
                    }
                }
                _ => {}
            }
        }
    }

    fn hit_intensity(&self, timing_delta_ms: f64) -> f32 {
        if self.hit_window_ms <= 0.0 {
            return 1.0;
        }
        (1.0 - timing_delta_ms.abs() / self.hit_window_ms).clamp(0.0, 1.0) as f32
    }
}

fn emit<S>(sink: &mut S, cue: Cue)
where
    S: CueSink + ?Sized,
{
    tracing::trace!(?cue, "feedback cue");
    sink.play(cue);
}
