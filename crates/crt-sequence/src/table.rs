use crt_core::{CanonicalTrial, ParticipantRecord, RawTrialSequence, TimingConfig};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("{field} has {found} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("response time {value:?} at index {index} is not a number")]
    InvalidResponseTime { index: usize, value: String },
}

/// Lays a checked raw stream out on a timeline.
pub struct TrialTableBuilder {
    timing: TimingConfig,
}

impl TrialTableBuilder {
    pub fn new(timing: TimingConfig) -> Self {
        Self { timing }
    }

    pub fn build(&self, sequence: &RawTrialSequence) -> Result<Vec<CanonicalTrial>, TableError> {
        let expected = sequence.len();
        for (field, found) in [
            ("trial_types", sequence.trial_types.len()),
            ("keypresses", sequence.keypresses.len()),
            ("response_times", sequence.response_times.len()),
        ] {
            if found != expected {
                return Err(TableError::LengthMismatch {
                    field,
                    expected,
                    found,
                });
            }
        }

        let mut onset = 0.0;
        let mut trials = Vec::with_capacity(expected);
        for index in 0..expected {
            let trial_type = sequence.trial_types[index];
            let duration = if trial_type.is_fixation() {
                self.timing.isi
            } else {
                self.timing.stim_time
            };
            trials.push(CanonicalTrial {
                onset,
                duration,
                trial_type,
                response: non_empty(&sequence.keypresses[index]).map(str::to_string),
                response_time: parse_response_time(index, &sequence.response_times[index])?,
                stim_file: sequence.image_ids[index].clone(),
            });
            onset += duration;
        }
        Ok(trials)
    }

    pub fn build_record(
        &self,
        subject_id: &str,
        sequence: &RawTrialSequence,
    ) -> Result<ParticipantRecord, TableError> {
        Ok(ParticipantRecord::new(subject_id, self.build(sequence)?))
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Blank, `NaN` and infinite response times are all recorded as absent.
fn parse_response_time(index: usize, value: &str) -> Result<Option<f64>, TableError> {
    let Some(value) = non_empty(value) else {
        return Ok(None);
    };
    let rt = value
        .parse::<f64>()
        .map_err(|_| TableError::InvalidResponseTime {
            index,
            value: value.to_string(),
        })?;
    Ok(rt.is_finite().then_some(rt))
}

/// Recover the raw parallel sequences from a canonical table. Absent
/// responses come back as empty strings.
pub fn raw_from_trials(trials: &[CanonicalTrial]) -> RawTrialSequence {
    let mut sequence = RawTrialSequence::default();
    for trial in trials {
        sequence.image_ids.push(trial.stim_file.clone());
        sequence.trial_types.push(trial.trial_type);
        sequence
            .keypresses
            .push(trial.response.clone().unwrap_or_default());
        sequence.response_times.push(
            trial
                .response_time
                .map(|rt| rt.to_string())
                .unwrap_or_default(),
        );
    }
    sequence
}
