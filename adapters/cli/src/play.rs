//! Interactive sessions in a macroquad window.

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Args;
use swarasync_core::{Command, Event, Phase, SessionConfig};
use swarasync_rendering::{
    BreathPath, Color, FrameInput, HudPresentation, MandalaFrame, NodePresentation, NodeState,
    Presentation, RenderingBackend, Scene,
};
use swarasync_rendering_macroquad::MacroquadBackend;
use swarasync_rendering_raster::{export_png, DEFAULT_EXPORT_RESOLUTION};
use swarasync_session::{apply, query, step, InputQueue, Session};
use swarasync_system_feedback::{Cue, CueSink, Feedback};
use swarasync_system_mandala::MandalaAccumulator;

use crate::settings::ConfigArgs;

const CLEAR_COLOR: Color = Color::from_rgb_u8(15, 23, 42);

#[derive(Debug, Clone, Args)]
pub(crate) struct PlayArgs {
    #[command(flatten)]
    pub(crate) config: ConfigArgs,

    /// Render as fast as possible instead of syncing to the display.
    #[arg(long)]
    pub(crate) no_vsync: bool,

    /// Log frame timing once per second.
    #[arg(long)]
    pub(crate) show_fps: bool,

    /// Directory that receives exported mandalas.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub(crate) export_dir: PathBuf,

    /// Side length of exported images in pixels.
    #[arg(long, default_value_t = DEFAULT_EXPORT_RESOLUTION)]
    pub(crate) resolution: u32,
}

/// Cue sink that stands in for audio and haptics by logging each cue.
#[derive(Debug, Default)]
struct LoggingCueSink;

impl CueSink for LoggingCueSink {
    fn play(&mut self, cue: Cue) {
        tracing::debug!(?cue, "feedback cue");
    }
}

/// Everything the frame closure owns between frames.
struct PlayState {
    session: Session,
    mandala: MandalaAccumulator,
    feedback: Feedback,
    cues: LoggingCueSink,
    inputs: InputQueue,
    events: Vec<Event>,
    export_dir: PathBuf,
    resolution: u32,
}

impl PlayState {
    fn new(config: SessionConfig, export_dir: PathBuf, resolution: u32) -> Result<Self> {
        let mandala =
            MandalaAccumulator::new(config.mandala.clone()).context("invalid mandala config")?;
        let feedback = Feedback::new(config.nodes.hit_window());
        let session = Session::new(config).context("failed to create session")?;
        Ok(Self {
            session,
            mandala,
            feedback,
            cues: LoggingCueSink,
            inputs: InputQueue::new(),
            events: Vec::new(),
            export_dir,
            resolution,
        })
    }

    /// Translates frame input into session commands.
    fn queue_input(&mut self, input: &FrameInput) {
        let clock = query::clock(&self.session);
        if input.pause_toggle {
            if query::is_paused(&self.session) {
                self.inputs.resume();
            } else {
                self.inputs.pause();
            }
        }
        if input.reset {
            self.inputs.reset();
        }
        if input.press_started {
            match query::phase(&self.session) {
                Phase::Idle => self.inputs.press(clock),
                Phase::Nodes => self.inputs.tap(None, clock),
                Phase::Complete => self.inputs.start_session(),
                Phase::Inhale | Phase::Exhale => {}
            }
        }
        if input.press_ended {
            self.inputs.release(clock);
        }
    }

    fn update(&mut self, dt: Duration, input: &FrameInput, scene: &mut Scene) {
        // Input is polled at the end of the frame interval, so it is stamped after the clock advances.
        apply(&mut self.session, Command::Tick { dt }, &mut self.events);
        self.queue_input(input);
        step(&mut self.session, Duration::ZERO, &mut self.inputs, &mut self.events);
        self.mandala.handle(&self.events);
        self.feedback.handle(&self.events, &mut self.cues);
        self.events.clear();

        if input.cycle_path {
            scene.path = scene.path.next();
            tracing::info!(path = scene.path.label(), "breath path changed");
        }
        self.populate(scene);

        if input.export {
            if let Err(error) = self.export(scene.now_ms) {
                tracing::warn!(error = %format!("{error:#}"), "mandala export failed");
            }
        }
    }

    fn populate(&self, scene: &mut Scene) {
        let session = &self.session;
        scene.phase = query::phase(session);
        scene.breath_progress = query::breath_progress(session);
        scene.now_ms = u64::try_from(query::clock(session).as_millis()).unwrap_or(u64::MAX);
        scene.nodes = query::nodes(session)
            .into_iter()
            .map(|node| NodePresentation {
                angle_degrees: node.angle_degrees,
                state: if node.hit {
                    NodeState::Hit
                } else if node.active {
                    NodeState::Active
                } else {
                    NodeState::Waiting
                },
            })
            .collect();
        scene.mandala.points.clear();
        scene.mandala.points.extend_from_slice(self.mandala.points());
        scene.hud = HudPresentation {
            round: (query::rounds_completed(session) + 1).min(query::total_rounds(session)),
            total_rounds: query::total_rounds(session),
            last_harmony: query::last_score(session).map(|score| score.harmony),
            paused: query::is_paused(session),
        };
    }

    fn export(&self, now_ms: u64) -> Result<PathBuf> {
        let frame = MandalaFrame {
            points: self.mandala.points(),
            petals: self.mandala.config().petals,
            phase: Phase::Idle,
            now_ms,
            glow_ms: self.mandala.config().glow_ms,
        };
        let png = export_png(&frame, self.resolution)?;
        let path = self.export_dir.join(format!("swarasync-mandala-{now_ms}.png"));
        fs::write(&path, png).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), points = self.mandala.len(), "mandala exported");
        Ok(path)
    }
}

pub(crate) fn run(args: PlayArgs) -> Result<()> {
    let config = args.config.load()?;
    let scene = Scene::new(BreathPath::default(), config.mandala.petals, config.mandala.glow_ms);
    let mut state = PlayState::new(config, args.export_dir, args.resolution)?;

    let backend = MacroquadBackend::new()
        .with_vsync(!args.no_vsync)
        .with_show_fps(args.show_fps);
    let presentation = Presentation::new("Swarasync", CLEAR_COLOR, scene);
    backend.run(presentation, move |dt, input, scene| {
        state.update(dt, &input, scene);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn state() -> PlayState {
        PlayState::new(SessionConfig::default(), std::env::temp_dir(), 64)
            .expect("default config is valid")
    }

    fn frames(state: &mut PlayState, scene: &mut Scene, count: usize) {
        for _ in 0..count {
            state.update(FRAME, &FrameInput::default(), scene);
        }
    }

    #[test]
    fn press_and_hold_drives_the_breath_ring() {
        let mut state = state();
        let mut scene = Scene::new(BreathPath::Central, 12, 1_000);

        let press = FrameInput {
            press_started: true,
            ..FrameInput::default()
        };
        state.update(FRAME, &press, &mut scene);
        frames(&mut state, &mut scene, 60);

        assert_eq!(scene.phase, Phase::Inhale);
        assert!(scene.breath_progress > 0.0);

        let release = FrameInput {
            press_ended: true,
            ..FrameInput::default()
        };
        state.update(FRAME, &release, &mut scene);
        assert_eq!(scene.phase, Phase::Exhale);
    }

    #[test]
    fn pause_toggle_freezes_the_clock() {
        let mut state = state();
        let mut scene = Scene::new(BreathPath::Central, 12, 1_000);
        let toggle = FrameInput {
            pause_toggle: true,
            ..FrameInput::default()
        };

        state.update(FRAME, &toggle, &mut scene);
        let paused_at = scene.now_ms;
        frames(&mut state, &mut scene, 10);

        assert!(scene.hud.paused);
        assert_eq!(scene.now_ms, paused_at);

        state.update(FRAME, &toggle, &mut scene);
        assert!(!scene.hud.paused);
        frames(&mut state, &mut scene, 1);
        assert!(scene.now_ms > paused_at);
    }

    #[test]
    fn one_frame_click_releases_the_inhale() {
        let mut state = state();
        let mut scene = Scene::new(BreathPath::Central, 12, 1_000);
        let click = FrameInput {
            press_started: true,
            press_ended: true,
            ..FrameInput::default()
        };

        state.update(FRAME, &click, &mut scene);
        frames(&mut state, &mut scene, 3);

        assert_eq!(scene.phase, Phase::Exhale);
        let round = query::current_round(&state.session).expect("round in flight");
        assert_eq!(round.inhale_actual, Some(Duration::ZERO));
    }

    #[test]
    fn inputs_are_stamped_at_the_end_of_the_frame() {
        let mut state = state();
        let mut scene = Scene::new(BreathPath::Central, 12, 1_000);
        let press = FrameInput {
            press_started: true,
            ..FrameInput::default()
        };
        let release = FrameInput {
            press_ended: true,
            ..FrameInput::default()
        };

        frames(&mut state, &mut scene, 2);
        state.update(FRAME, &press, &mut scene);
        frames(&mut state, &mut scene, 9);
        state.update(FRAME, &release, &mut scene);

        let round = query::current_round(&state.session).expect("round in flight");
        assert_eq!(round.inhale_actual, Some(FRAME * 10));
    }

    #[test]
    fn cycle_path_rotates_the_palette() {
        let mut state = state();
        let mut scene = Scene::new(BreathPath::Lunar, 12, 1_000);
        let cycle = FrameInput {
            cycle_path: true,
            ..FrameInput::default()
        };
        state.update(FRAME, &cycle, &mut scene);
        assert_eq!(scene.path, BreathPath::Lunar.next());
    }

    #[test]
    fn hud_starts_on_the_first_round() {
        let mut state = state();
        let mut scene = Scene::new(BreathPath::Central, 12, 1_000);
        frames(&mut state, &mut scene, 1);
        assert_eq!(scene.hud.round, 1);
        assert_eq!(scene.hud.total_rounds, 7);
        assert_eq!(scene.hud.last_harmony, None);
    }
}
