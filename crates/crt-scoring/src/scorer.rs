use crt_core::{CanonicalTrial, ImageLevelCounters, ScoringConfig, SignalOutcome, TrialType};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoringError {
    #[error("on-image slot {index} has trial type {found}, which has no signal-detection category")]
    UnknownTrialType { index: usize, found: TrialType },
    #[error("trial {index} should be a FIXATION between images, found {found}")]
    FixationNotInterleaved { index: usize, found: TrialType },
    #[error("trial table has odd length {len}; images and fixations must alternate")]
    OddTrialCount { len: usize },
}

impl ScoringError {
    /// Fatal errors point at a bug upstream and must stop the whole run;
    /// the rest only disqualify the participant's table.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoringError::UnknownTrialType { .. })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Valid,
    #[serde(rename = "fail_filler_far")]
    ExcludedFillerFar,
    #[serde(rename = "fail_vigilance_miss")]
    ExcludedVigilanceMiss,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Valid => "valid",
            ParticipantStatus::ExcludedFillerFar => "fail_filler_far",
            ParticipantStatus::ExcludedVigilanceMiss => "fail_vigilance_miss",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ParticipantStatus::Valid)
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialClassification {
    pub image_id: String,
    pub outcome: SignalOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantScore {
    pub status: ParticipantStatus,
    /// `None` when the participant saw no filler trials.
    pub filler_false_alarm_rate: Option<f64>,
    /// `None` when the participant saw no vigilance trials.
    pub vigilance_miss_rate: Option<f64>,
    /// Empty unless the participant is valid.
    pub classifications: Vec<TrialClassification>,
}

impl ParticipantScore {
    pub fn apply_to(&self, counters: &mut ImageLevelCounters) {
        if !self.status.is_valid() {
            return;
        }
        for classification in &self.classifications {
            counters.record(&classification.image_id, classification.outcome);
        }
    }
}

/// Signal-detection cell for one on-image trial. Fixations have none.
pub fn classify(trial_type: TrialType, responded: bool) -> Option<SignalOutcome> {
    let outcome = match (trial_type, responded) {
        (TrialType::Target, true) => SignalOutcome::TargetFalseAlarm,
        (TrialType::Target, false) => SignalOutcome::TargetCorrectRejection,
        (TrialType::Repeat, true) => SignalOutcome::TargetHit,
        (TrialType::Repeat, false) => SignalOutcome::TargetMiss,
        (TrialType::Filler, true) => SignalOutcome::FillerFalseAlarm,
        (TrialType::Filler, false) => SignalOutcome::FillerCorrectRejection,
        (TrialType::Vigilance, true) => SignalOutcome::FillerHit,
        (TrialType::Vigilance, false) => SignalOutcome::FillerMiss,
        (TrialType::Fixation, _) => return None,
    };
    Some(outcome)
}

pub struct ParticipantScorer {
    config: ScoringConfig,
}

impl ParticipantScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score one participant without touching any shared state.
    pub fn score(&self, trials: &[CanonicalTrial]) -> Result<ParticipantScore, ScoringError> {
        let classifications = self.classify_trials(trials)?;

        let mut filler_responses = 0usize;
        let mut filler_trials = 0usize;
        let mut vigilance_misses = 0usize;
        let mut vigilance_trials = 0usize;
        for classification in &classifications {
            match classification.outcome {
                SignalOutcome::FillerFalseAlarm => {
                    filler_responses += 1;
                    filler_trials += 1;
                }
                SignalOutcome::FillerCorrectRejection => filler_trials += 1,
                SignalOutcome::FillerMiss => {
                    vigilance_misses += 1;
                    vigilance_trials += 1;
                }
                SignalOutcome::FillerHit => vigilance_trials += 1,
                _ => {}
            }
        }

        let filler_false_alarm_rate = ratio(filler_responses, filler_trials);
        let vigilance_miss_rate = ratio(vigilance_misses, vigilance_trials);

        let status = if filler_false_alarm_rate.is_some_and(|rate| rate >= self.config.far_threshold)
        {
            ParticipantStatus::ExcludedFillerFar
        } else if vigilance_miss_rate
            .is_some_and(|rate| rate >= self.config.vigilance_miss_threshold)
        {
            ParticipantStatus::ExcludedVigilanceMiss
        } else {
            ParticipantStatus::Valid
        };

        Ok(ParticipantScore {
            status,
            filler_false_alarm_rate,
            vigilance_miss_rate,
            classifications: if status.is_valid() {
                classifications
            } else {
                Vec::new()
            },
        })
    }

    /// Score and, for a valid participant, fold the result into `counters`.
    pub fn score_into(
        &self,
        trials: &[CanonicalTrial],
        counters: &mut ImageLevelCounters,
    ) -> Result<ParticipantStatus, ScoringError> {
        let score = self.score(trials)?;
        score.apply_to(counters);
        Ok(score.status)
    }

    /// Whether a response was made on each image trial, in presentation
    /// order. With `consolidate_fixation`, a press during the following
    /// fixation counts for the image.
    pub fn responses(&self, trials: &[CanonicalTrial]) -> Result<Vec<bool>, ScoringError> {
        check_alternation(trials)?;
        Ok(trials
            .chunks_exact(2)
            .map(|pair| {
                let on_image = self.pressed(&pair[0]);
                let on_fixation = self.config.consolidate_fixation && self.pressed(&pair[1]);
                on_image || on_fixation
            })
            .collect())
    }

    fn pressed(&self, trial: &CanonicalTrial) -> bool {
        trial
            .response
            .as_deref()
            .is_some_and(|code| self.config.is_valid_response(code))
    }

    fn classify_trials(
        &self,
        trials: &[CanonicalTrial],
    ) -> Result<Vec<TrialClassification>, ScoringError> {
        let responses = self.responses(trials)?;
        trials
            .iter()
            .step_by(2)
            .zip(responses)
            .enumerate()
            .map(|(slot, (trial, responded))| {
                classify(trial.trial_type, responded)
                    .map(|outcome| TrialClassification {
                        image_id: trial.stim_file.clone(),
                        outcome,
                    })
                    .ok_or(ScoringError::UnknownTrialType {
                        index: slot * 2,
                        found: trial.trial_type,
                    })
            })
            .collect()
    }
}

fn check_alternation(trials: &[CanonicalTrial]) -> Result<(), ScoringError> {
    if trials.len() % 2 != 0 {
        return Err(ScoringError::OddTrialCount { len: trials.len() });
    }
    for (index, trial) in trials.iter().enumerate().skip(1).step_by(2) {
        if !trial.trial_type.is_fixation() {
            return Err(ScoringError::FixationNotInterleaved {
                index,
                found: trial.trial_type,
            });
        }
    }
    Ok(())
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}
