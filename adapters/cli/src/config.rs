use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use fermata_system_bootstrap::SessionLayout;
use fermata_system_consumer::FRAME_SECONDS;
use serde::Deserialize;

const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// How presentations are reported while a session runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputFormat {
    /// Structured log lines on stderr.
    #[default]
    Log,
    /// One JSON object per presentation on stdout.
    Json,
}

/// Session settings read from TOML. Every field is optional.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SessionConfig {
    pub(crate) version: u32,
    /// Consumer ticks to run.
    pub(crate) frames: u64,
    /// Simulated time between consumer ticks, in seconds.
    pub(crate) tick_seconds: f64,
    pub(crate) seed: Option<u64>,
    /// Tick on which every engine is reset.
    pub(crate) reset_at: Option<u64>,
    pub(crate) master_volume_stage: usize,
    pub(crate) realtime: bool,
    pub(crate) format: OutputFormat,
    pub(crate) layout: SessionLayout,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            frames: 600,
            tick_seconds: FRAME_SECONDS / 2.0,
            seed: None,
            reset_at: None,
            master_volume_stage: 0,
            realtime: false,
            format: OutputFormat::Log,
            layout: SessionLayout::default(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) frames: Option<u64>,
    pub(crate) seed: Option<u64>,
    pub(crate) reset_at: Option<u64>,
    pub(crate) format: Option<OutputFormat>,
    pub(crate) realtime: bool,
}

impl SessionConfig {
    /// Loads the file at `path`, or the defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read session config at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid session config at {}", path.display()))
    }

    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).context("failed to parse session config toml contents")?;
        config.check()?;
        Ok(config)
    }

    pub(crate) fn apply(&mut self, overrides: Overrides) {
        if let Some(frames) = overrides.frames {
            self.frames = frames;
        }
        if let Some(seed) = overrides.seed {
            self.seed = Some(seed);
        }
        if let Some(reset_at) = overrides.reset_at {
            self.reset_at = Some(reset_at);
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        self.realtime |= overrides.realtime;
    }

    fn check(&self) -> Result<()> {
        if self.version != SUPPORTED_CONFIG_VERSION {
            bail!(
                "unsupported session config version {}; expected {}",
                self.version,
                SUPPORTED_CONFIG_VERSION
            );
        }
        if !self.tick_seconds.is_finite() || self.tick_seconds <= 0.0 {
            bail!("tick_seconds must be positive, got {}", self.tick_seconds);
        }
        Ok(())
    }
}
