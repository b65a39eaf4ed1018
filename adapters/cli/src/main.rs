#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that boots Swarasync sessions.
//!
//! `play` opens the interactive window; `simulate` runs a headless session with
//! a seeded synthetic player and prints the per-round scores.

mod play;
mod settings;
mod simulate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "swarasync",
    about = "Breath-paced rhythm practice that grows a mandala",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open the interactive window.
    Play(play::PlayArgs),

    /// Run a headless session with a synthetic player.
    Simulate(simulate::SimulateArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Entry point for the Swarasync command-line interface.
fn main() -> Result<()> {
    init_tracing();
    match Cli::parse().command {
        Commands::Play(args) => play::run(args),
        Commands::Simulate(args) => simulate::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn simulate_flags_parse() {
        let cli = Cli::try_parse_from([
            "swarasync",
            "simulate",
            "--seed",
            "42",
            "--rounds",
            "3",
            "--export",
            "mandala.png",
        ])
        .expect("valid arguments");

        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.seed, 42);
        assert_eq!(args.config.rounds, Some(3));
        assert_eq!(args.export.as_deref(), Some(std::path::Path::new("mandala.png")));
    }
}
