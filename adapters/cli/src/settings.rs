use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use swarasync_core::SessionConfig;

/// Named session lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SessionPreset {
    /// Six rounds.
    Quick,
    /// Eight rounds.
    Classic,
    /// Ten rounds.
    Deep,
}

impl SessionPreset {
    pub(crate) const fn rounds(self) -> u32 {
        match self {
            SessionPreset::Quick => 6,
            SessionPreset::Classic => 8,
            SessionPreset::Deep => 10,
        }
    }
}

/// Options shared by every subcommand that builds a session.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct ConfigArgs {
    /// TOML file with session tuning; missing sections keep their defaults.
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Picks a named session length.
    #[arg(long, value_enum, value_name = "PRESET")]
    pub(crate) session: Option<SessionPreset>,

    /// Overrides the number of rounds per session; wins over `--session`.
    #[arg(long, value_name = "COUNT")]
    pub(crate) rounds: Option<u32>,

    /// Overrides the starting hit tolerance in milliseconds.
    #[arg(long, value_name = "MS")]
    pub(crate) tolerance: Option<u32>,

    /// Overrides the mandala's rotational symmetry.
    #[arg(long, value_name = "COUNT")]
    pub(crate) petals: Option<u32>,
}

impl ConfigArgs {
    /// Reads the configured file (if any), applies overrides and validates the result.
    pub(crate) fn load(&self) -> Result<SessionConfig> {
        let base = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                parse_config(&text)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => SessionConfig::default(),
        };
        let config = self.apply_overrides(base);
        config.validate().context("invalid session configuration")?;
        tracing::debug!(?config, "session configuration loaded");
        Ok(config)
    }

    fn apply_overrides(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(preset) = self.session {
            config.rounds_per_session = preset.rounds();
        }
        if let Some(rounds) = self.rounds {
            config.rounds_per_session = rounds;
        }
        if let Some(tolerance) = self.tolerance {
            config.difficulty.initial_tolerance_ms = tolerance;
        }
        if let Some(petals) = self.petals {
            config.mandala.petals = petals;
        }
        config
    }
}

fn parse_config(text: &str) -> Result<SessionConfig> {
    Ok(toml::from_str(text)?)
}
