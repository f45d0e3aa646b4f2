use anyhow::{bail, Context, Result};
use crt_core::{IngestConfig, ScoringConfig, TimingConfig, ValidationConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "CRT_CONFIG_PATH";

/// Settings shared by every subcommand. Each section is optional in the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub validation: ValidationConfig,
    pub timing: Option<TimingConfig>,
    pub ingest: IngestConfig,
    pub scoring: ScoringConfig,
}

impl PipelineConfig {
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_path(cli_path) {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.validation.validate()?;
        if let Some(timing) = &self.timing {
            timing.validate()?;
        }
        self.scoring.validate()?;
        Ok(())
    }

    /// Timing from the command line, falling back to the `[timing]` section.
    pub fn timing_with(&self, stim_time: Option<f64>, isi: Option<f64>) -> Result<TimingConfig> {
        let stim_time = stim_time.or(self.timing.map(|t| t.stim_time));
        let isi = isi.or(self.timing.map(|t| t.isi));
        let (Some(stim_time), Some(isi)) = (stim_time, isi) else {
            bail!("stim_time and isi are required (pass --stim-time/--isi or set [timing])");
        };
        Ok(TimingConfig::new(stim_time, isi)?)
    }
}

fn resolve_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    cli_path
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
}
