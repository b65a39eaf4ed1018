//! Headless sessions driven by a seeded synthetic player.

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Args;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use swarasync_core::{Command, Event, Phase, RoundScore, SessionConfig};
use swarasync_rendering::MandalaFrame;
use swarasync_rendering_raster::{export_png, DEFAULT_EXPORT_RESOLUTION};
use swarasync_session::{apply, query, step, InputQueue, Session};
use swarasync_system_mandala::MandalaAccumulator;

use crate::settings::ConfigArgs;

/// Frame length of the simulated update loop.
const FRAME: Duration = Duration::from_millis(16);
/// Shortest inhale the synthetic player will hold.
const MIN_HOLD: Duration = Duration::from_millis(500);
/// Frames allowed per round before the run is abandoned.
const FRAMES_PER_ROUND_LIMIT: u64 = 10_000;

#[derive(Debug, Clone, Args)]
pub(crate) struct SimulateArgs {
    #[command(flatten)]
    pub(crate) config: ConfigArgs,

    /// Seed for the synthetic player.
    #[arg(long, default_value_t = 7)]
    pub(crate) seed: u64,

    /// Standard deviation of tap timing error in milliseconds.
    #[arg(long, default_value_t = 60.0)]
    pub(crate) tap_jitter: f64,

    /// Standard deviation of breath duration error in milliseconds.
    #[arg(long, default_value_t = 400.0)]
    pub(crate) breath_jitter: f64,

    /// Probability that the player ignores a node.
    #[arg(long, default_value_t = 0.05)]
    pub(crate) miss_chance: f64,

    /// Writes the finished mandala as PNG to this path.
    #[arg(long, value_name = "PATH")]
    pub(crate) export: Option<PathBuf>,

    /// Side length of the exported image in pixels.
    #[arg(long, default_value_t = DEFAULT_EXPORT_RESOLUTION)]
    pub(crate) resolution: u32,
}

/// Behaviour knobs of the synthetic player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlayerProfile {
    pub(crate) seed: u64,
    pub(crate) tap_jitter_ms: f64,
    pub(crate) breath_jitter_ms: f64,
    pub(crate) miss_chance: f64,
}

impl PlayerProfile {
    fn from_args(args: &SimulateArgs) -> Self {
        Self {
            seed: args.seed,
            tap_jitter_ms: args.tap_jitter,
            breath_jitter_ms: args.breath_jitter,
            miss_chance: args.miss_chance,
        }
    }
}

/// Player that presses, releases and taps with normally distributed error.
struct SyntheticPlayer {
    rng: ChaCha8Rng,
    tap_error: Normal<f64>,
    breath_error: Normal<f64>,
    miss_chance: f64,
    release_at: Option<Duration>,
    pending_taps: Option<Vec<Duration>>,
}

impl SyntheticPlayer {
    fn new(profile: PlayerProfile) -> Result<Self> {
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(profile.seed),
            tap_error: Normal::new(0.0, profile.tap_jitter_ms.max(0.0))
                .context("invalid tap jitter")?,
            breath_error: Normal::new(0.0, profile.breath_jitter_ms.max(0.0))
                .context("invalid breath jitter")?,
            miss_chance: profile.miss_chance.clamp(0.0, 1.0),
            release_at: None,
            pending_taps: None,
        })
    }

    /// Queues whatever the player does before the next frame.
    fn plan(&mut self, session: &Session, inputs: &mut InputQueue) {
        let clock = query::clock(session);
        match query::phase(session) {
            Phase::Idle => {
                let target = query::config(session).timing.inhale_target();
                let error = self.breath_error.sample(&mut self.rng);
                let hold = offset_by(target, error).max(MIN_HOLD);
                inputs.press(clock);
                self.release_at = Some(clock + hold);
                self.pending_taps = None;
            }
            Phase::Inhale => {
                if let Some(release_at) = self.release_at.filter(|at| *at <= clock) {
                    inputs.release(release_at);
                    self.release_at = None;
                }
            }
            Phase::Exhale => self.release_at = None,
            Phase::Nodes => {
                if self.pending_taps.is_none() {
                    let mut taps = Vec::new();
                    for node in query::nodes(session) {
                        if self.rng.gen_bool(self.miss_chance) {
                            continue;
                        }
                        let error = self.tap_error.sample(&mut self.rng);
                        taps.push(offset_by(node.target, error));
                    }
                    taps.sort();
                    self.pending_taps = Some(taps);
                }
                if let Some(taps) = self.pending_taps.as_mut() {
                    let due = taps.iter().take_while(|at| **at <= clock).count();
                    for at in taps.drain(..due) {
                        inputs.tap(None, at);
                    }
                }
            }
            Phase::Complete => {}
        }
    }
}

fn offset_by(base: Duration, error_ms: f64) -> Duration {
    let millis = base.as_secs_f64() * 1_000.0 + error_ms;
    Duration::from_secs_f64(millis.max(0.0) / 1_000.0)
}

/// Outcome of a simulated session.
#[derive(Debug)]
pub(crate) struct SimulationReport {
    pub(crate) scores: Vec<RoundScore>,
    pub(crate) tolerances: Vec<u32>,
    pub(crate) summary: query::SessionSummary,
    pub(crate) mandala: MandalaAccumulator,
    pub(crate) elapsed: Duration,
}

/// Plays one full session with the synthetic player.
pub(crate) fn simulate(config: SessionConfig, profile: PlayerProfile) -> Result<SimulationReport> {
    let total_rounds = config.total_rounds();
    let mut mandala =
        MandalaAccumulator::new(config.mandala.clone()).context("invalid mandala config")?;
    let mut session = Session::new(config).context("failed to create session")?;
    let mut player = SyntheticPlayer::new(profile)?;
    let mut inputs = InputQueue::new();
    let mut events = Vec::new();
    let mut tolerances = Vec::new();

    apply(&mut session, Command::StartSession, &mut events);
    let frame_limit = u64::from(total_rounds) * FRAMES_PER_ROUND_LIMIT;
    let mut frames = 0;
    while query::phase(&session) != Phase::Complete {
        anyhow::ensure!(
            frames < frame_limit,
            "session did not complete within {frame_limit} frames"
        );
        frames += 1;

        player.plan(&session, &mut inputs);
        let tolerance = query::difficulty(&session).tolerance_ms;
        step(&mut session, FRAME, &mut inputs, &mut events);
        mandala.handle(&events);
        for event in events.drain(..) {
            if let Event::RoundCompleted { round, score } = event {
                tolerances.push(tolerance);
                tracing::debug!(
                    round = round.index,
                    harmony = score.harmony,
                    "simulated round completed"
                );
            }
        }
    }

    Ok(SimulationReport {
        scores: query::scores(&session),
        tolerances,
        summary: query::summary(&session),
        mandala,
        elapsed: query::clock(&session),
    })
}

pub(crate) fn run(args: SimulateArgs) -> Result<()> {
    let config = args.config.load()?;
    let report = simulate(config, PlayerProfile::from_args(&args))?;

    println!("round  timing  sequence  consistency  harmony  tolerance");
    for (index, (score, tolerance)) in report.scores.iter().zip(&report.tolerances).enumerate() {
        println!(
            "{:>5}  {:>6}  {:>8}  {:>11}  {:>7}{}  {:>7}ms",
            index + 1,
            score.timing,
            score.sequence,
            score.consistency,
            score.harmony,
            if score.perfect { "*" } else { " " },
            tolerance,
        );
    }
    println!(
        "average harmony {} | best {} | perfect rounds {} | consistent rounds {} | sequence accuracy {}% | {:.1}s",
        report.summary.average_harmony,
        report.summary.best_harmony,
        report.summary.perfect_rounds,
        report.summary.consistent_rounds,
        report.summary.sequence_accuracy,
        report.elapsed.as_secs_f64(),
    );

    if let Some(path) = &args.export {
        let frame = MandalaFrame {
            points: report.mandala.points(),
            petals: report.mandala.config().petals,
            phase: Phase::Idle,
            now_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            glow_ms: report.mandala.config().glow_ms,
        };
        let png = export_png(&frame, args.resolution)?;
        fs::write(path, png).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), points = report.mandala.len(), "mandala exported");
    }
    Ok(())
}
