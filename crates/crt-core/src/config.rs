use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub const DEFAULT_VALID_RESPONSES: [&str; 4] = ["R", "r", "82", "114"];
pub const DEFAULT_FAR_THRESHOLD: f64 = 0.7;
pub const DEFAULT_VIGILANCE_MISS_THRESHOLD: f64 = 0.7;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite value in [0, 1], got {value}")]
    ThresholdOutOfRange { field: &'static str, value: f64 },
    #[error("{field} must be a finite positive number, got {value}")]
    NonPositiveDuration { field: &'static str, value: f64 },
    #[error("valid_response_codes cannot be empty")]
    NoResponseCodes,
    #[error("{min_field} ({min}) exceeds {max_field} ({max})")]
    InvertedInterval {
        min_field: &'static str,
        min: u32,
        max_field: &'static str,
        max: u32,
    },
}

/// Opt-in structural checks. An absent key skips the check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub target_num: Option<usize>,
    pub filler_num: Option<usize>,
    pub vigilance_num: Option<usize>,
    pub min_repeat_interval: Option<u32>,
    pub max_repeat_interval: Option<u32>,
    pub min_vigilance_interval: Option<u32>,
    pub max_vigilance_interval: Option<u32>,
    pub fixation_img_name: Option<String>,
}

impl ValidationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_interval(
            "min_repeat_interval",
            self.min_repeat_interval,
            "max_repeat_interval",
            self.max_repeat_interval,
        )?;
        check_interval(
            "min_vigilance_interval",
            self.min_vigilance_interval,
            "max_vigilance_interval",
            self.max_vigilance_interval,
        )
    }
}

fn check_interval(
    min_field: &'static str,
    min: Option<u32>,
    max_field: &'static str,
    max: Option<u32>,
) -> Result<(), ConfigError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(ConfigError::InvertedInterval {
            min_field,
            min,
            max_field,
            max,
        }),
        _ => Ok(()),
    }
}

/// Presentation timing used to lay trials out on a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    pub stim_time: f64,
    pub isi: f64,
}

impl TimingConfig {
    pub fn new(stim_time: f64, isi: f64) -> Result<Self, ConfigError> {
        let timing = Self { stim_time, isi };
        timing.validate()?;
        Ok(timing)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("stim_time", self.stim_time)?;
        check_positive("isi", self.isi)
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveDuration { field, value })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub valid_response_codes: BTreeSet<String>,
    /// Credit a press made during the following fixation to the image.
    pub consolidate_fixation: bool,
    pub far_threshold: f64,
    pub vigilance_miss_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            valid_response_codes: DEFAULT_VALID_RESPONSES
                .iter()
                .map(|code| code.to_string())
                .collect(),
            consolidate_fixation: true,
            far_threshold: DEFAULT_FAR_THRESHOLD,
            vigilance_miss_threshold: DEFAULT_VIGILANCE_MISS_THRESHOLD,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.valid_response_codes.is_empty() {
            return Err(ConfigError::NoResponseCodes);
        }
        check_unit("far_threshold", self.far_threshold)?;
        check_unit("vigilance_miss_threshold", self.vigilance_miss_threshold)
    }

    pub fn is_valid_response(&self, code: &str) -> bool {
        self.valid_response_codes.contains(code)
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { field, value })
    }
}

/// Run-specific knobs for reading a survey export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Rows dropped after empty rows are removed (export header rows).
    pub skip_leading_rows: usize,
    pub excluded_participants: BTreeSet<String>,
    pub max_rows: Option<usize>,
    pub image_column: String,
    pub type_column: String,
    pub keypress_column: String,
    pub rt_column: String,
    pub participant_column: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            skip_leading_rows: 2,
            excluded_participants: BTreeSet::new(),
            max_rows: None,
            image_column: "Answer.imseq".to_string(),
            type_column: "Answer.imtypeseq".to_string(),
            keypress_column: "keyPressSequence".to_string(),
            rt_column: "RTSequence".to_string(),
            participant_column: "PROLIFIC_PID".to_string(),
        }
    }
}
