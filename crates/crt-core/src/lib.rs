pub mod config;
pub mod counters;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use config::{ConfigError, IngestConfig, ScoringConfig, TimingConfig, ValidationConfig};
pub use counters::{ImageCounters, ImageLevelCounters, SignalOutcome};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrialTypeError {
    #[error("unknown trial type code {0:?} (expected '0'..'4')")]
    UnknownCode(String),
    #[error("unknown trial type label {0:?}")]
    UnknownLabel(String),
}

/// Role of one slot in the presentation stream.
///
/// `Target` and `Filler` are first presentations; `Repeat` and `Vigilance`
/// are the second presentation of a target and of a filler respectively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrialType {
    Fixation,
    Target,
    Repeat,
    Filler,
    Vigilance,
}

impl TrialType {
    pub const ALL: [TrialType; 5] = [
        TrialType::Fixation,
        TrialType::Target,
        TrialType::Repeat,
        TrialType::Filler,
        TrialType::Vigilance,
    ];

    /// Parse the numeric code used by the web experiment's raw log.
    pub fn from_code(code: &str) -> Result<Self, TrialTypeError> {
        match code.trim() {
            "0" => Ok(TrialType::Fixation),
            "1" => Ok(TrialType::Target),
            "2" => Ok(TrialType::Repeat),
            "3" => Ok(TrialType::Filler),
            "4" => Ok(TrialType::Vigilance),
            other => Err(TrialTypeError::UnknownCode(other.to_string())),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TrialType::Fixation => "0",
            TrialType::Target => "1",
            TrialType::Repeat => "2",
            TrialType::Filler => "3",
            TrialType::Vigilance => "4",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrialType::Fixation => "FIXATION",
            TrialType::Target => "TARGET",
            TrialType::Repeat => "REPEAT",
            TrialType::Filler => "FILLER",
            TrialType::Vigilance => "VIGILANCE",
        }
    }

    pub fn is_fixation(&self) -> bool {
        matches!(self, TrialType::Fixation)
    }
}

impl fmt::Display for TrialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrialType {
    type Err = TrialTypeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_uppercase();
        match normalized.as_str() {
            "FIXATION" => Ok(TrialType::Fixation),
            "TARGET" => Ok(TrialType::Target),
            "REPEAT" => Ok(TrialType::Repeat),
            "FILLER" => Ok(TrialType::Filler),
            "VIGILANCE" => Ok(TrialType::Vigilance),
            _ => Err(TrialTypeError::UnknownLabel(input.trim().to_string())),
        }
    }
}

/// One participant's log as four parallel sequences, image and fixation
/// trials interleaved. Lengths are not guaranteed equal until validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTrialSequence {
    pub image_ids: Vec<String>,
    pub trial_types: Vec<TrialType>,
    pub keypresses: Vec<String>,
    pub response_times: Vec<String>,
}

impl RawTrialSequence {
    pub fn len(&self) -> usize {
        self.image_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_ids.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalTrial {
    pub onset: f64,
    pub duration: f64,
    pub trial_type: TrialType,
    pub response: Option<String>,
    pub response_time: Option<f64>,
    pub stim_file: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantRecord {
    subject_id: String,
    trials: Vec<CanonicalTrial>,
}

impl ParticipantRecord {
    pub fn new(subject_id: impl Into<String>, trials: Vec<CanonicalTrial>) -> Self {
        Self {
            subject_id: subject_id.into(),
            trials,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn trials(&self) -> &[CanonicalTrial] {
        &self.trials
    }
}

/// Where the scorer gets a participant's canonical table from.
pub trait TrialSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load_trials(&self, subject_id: &str) -> Result<Vec<CanonicalTrial>, Self::Error>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no trials recorded for participant {subject_id}")]
pub struct MissingParticipant {
    pub subject_id: String,
}

impl TrialSource for BTreeMap<String, Vec<CanonicalTrial>> {
    type Error = MissingParticipant;

    fn load_trials(&self, subject_id: &str) -> Result<Vec<CanonicalTrial>, Self::Error> {
        self.get(subject_id)
            .cloned()
            .ok_or_else(|| MissingParticipant {
                subject_id: subject_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trial_type_codes_map_to_variants() {
        let parsed = ["0", "1", "2", "3", "4"]
            .iter()
            .map(|code| TrialType::from_code(code).expect("known code"))
            .collect::<Vec<_>>();
        assert_eq!(parsed, TrialType::ALL.to_vec());
        for trial_type in TrialType::ALL {
            assert_eq!(
                TrialType::from_code(trial_type.code()).expect("round trip"),
                trial_type
            );
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(
            TrialType::from_code("5"),
            Err(TrialTypeError::UnknownCode("5".to_string()))
        );
    }

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("repeat".parse::<TrialType>(), Ok(TrialType::Repeat));
        assert_eq!(" VIGILANCE ".parse::<TrialType>(), Ok(TrialType::Vigilance));
        assert!("bogus".parse::<TrialType>().is_err());
        assert_eq!(TrialType::Filler.to_string(), "FILLER");
    }

    #[test]
    fn in_memory_source_reports_missing_participant() {
        let mut source = BTreeMap::new();
        source.insert("0001".to_string(), Vec::new());
        assert!(source.load_trials("0001").expect("present").is_empty());
        let err = source.load_trials("0002").expect_err("missing");
        assert_eq!(err.subject_id, "0002");
    }
}
