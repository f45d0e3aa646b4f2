use crate::scorer::{ParticipantScore, ParticipantScorer, ParticipantStatus, ScoringError};
use crt_core::{CanonicalTrial, ImageCounters, ImageLevelCounters, ScoringConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("counters for image {image_id} are inconsistent: {detail}")]
pub struct AggregationInvariantViolation {
    pub image_id: String,
    pub detail: String,
}

/// Final per-image row. Rates are `None` when their denominator is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetrics {
    pub image_name: String,
    pub n_participants_target: u64,
    pub target_crr: Option<f64>,
    pub target_hr: Option<f64>,
    pub target_far: Option<f64>,
    pub target_hit: u64,
    pub target_miss: u64,
    pub target_fa: u64,
    pub target_cr: u64,
    pub n_participants_filler: u64,
    pub filler_hit: u64,
    pub filler_miss: u64,
    pub filler_fa: u64,
    pub filler_cr: u64,
}

impl ImageMetrics {
    pub const COLUMNS: [&'static str; 14] = [
        "image_name",
        "n_participants_target",
        "target_crr",
        "target_hr",
        "target_far",
        "target_hit",
        "target_miss",
        "target_fa",
        "target_cr",
        "n_participants_filler",
        "filler_hit",
        "filler_miss",
        "filler_fa",
        "filler_cr",
    ];

    pub fn from_counters(
        image_name: &str,
        counters: &ImageCounters,
    ) -> Result<Self, AggregationInvariantViolation> {
        check_consistency(image_name, counters)?;
        let target_hr = rate(counters.target_hit, counters.target_hit + counters.target_miss);
        let target_far = rate(counters.target_fa, counters.target_fa + counters.target_cr);
        let target_crr = match (target_hr, target_far) {
            (Some(hr), Some(far)) => Some(hr - far),
            _ => None,
        };
        Ok(Self {
            image_name: image_name.to_string(),
            n_participants_target: counters.n_participants_target,
            target_crr,
            target_hr,
            target_far,
            target_hit: counters.target_hit,
            target_miss: counters.target_miss,
            target_fa: counters.target_fa,
            target_cr: counters.target_cr,
            n_participants_filler: counters.n_participants_filler,
            filler_hit: counters.filler_hit,
            filler_miss: counters.filler_miss,
            filler_fa: counters.filler_fa,
            filler_cr: counters.filler_cr,
        })
    }
}

fn rate(numerator: u64, denominator: u64) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn check_consistency(
    image_id: &str,
    counters: &ImageCounters,
) -> Result<(), AggregationInvariantViolation> {
    let violation = |detail: String| AggregationInvariantViolation {
        image_id: image_id.to_string(),
        detail,
    };
    let first_target = counters.target_fa + counters.target_cr;
    if counters.n_participants_target != first_target {
        return Err(violation(format!(
            "n_participants_target {} != target_fa + target_cr {}",
            counters.n_participants_target, first_target
        )));
    }
    let repeats = counters.target_hit + counters.target_miss;
    if repeats != counters.n_participants_target {
        return Err(violation(format!(
            "target_hit + target_miss {} != n_participants_target {}",
            repeats, counters.n_participants_target
        )));
    }
    let first_filler = counters.filler_fa + counters.filler_cr;
    if counters.n_participants_filler != first_filler {
        return Err(violation(format!(
            "n_participants_filler {} != filler_fa + filler_cr {}",
            counters.n_participants_filler, first_filler
        )));
    }
    Ok(())
}

/// Turn cohort counters into metric rows in ascending image order.
pub fn finalize(
    counters: &ImageLevelCounters,
) -> Result<Vec<ImageMetrics>, AggregationInvariantViolation> {
    counters
        .iter()
        .map(|(image_id, image)| ImageMetrics::from_counters(image_id, image))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedParticipant {
    pub subject_id: String,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub total: usize,
    pub valid: usize,
    pub excluded_filler_far: usize,
    pub excluded_vigilance_miss: usize,
    pub skipped: Vec<SkippedParticipant>,
}

impl CohortSummary {
    pub fn record(&mut self, status: ParticipantStatus) {
        self.total += 1;
        match status {
            ParticipantStatus::Valid => self.valid += 1,
            ParticipantStatus::ExcludedFillerFar => self.excluded_filler_far += 1,
            ParticipantStatus::ExcludedVigilanceMiss => self.excluded_vigilance_miss += 1,
        }
    }

    pub fn record_skip(&mut self, subject_id: &str, reason: impl Into<String>) {
        self.total += 1;
        self.skipped.push(SkippedParticipant {
            subject_id: subject_id.to_string(),
            reason: reason.into(),
        });
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn excluded(&self) -> usize {
        self.excluded_filler_far + self.excluded_vigilance_miss
    }

    pub fn merge(&mut self, other: &CohortSummary) {
        self.total += other.total;
        self.valid += other.valid;
        self.excluded_filler_far += other.excluded_filler_far;
        self.excluded_vigilance_miss += other.excluded_vigilance_miss;
        self.skipped.extend(other.skipped.iter().cloned());
    }
}

/// Accumulates valid participants into image-level counters.
pub struct AggregationEngine {
    scorer: ParticipantScorer,
    counters: ImageLevelCounters,
    summary: CohortSummary,
}

impl AggregationEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            scorer: ParticipantScorer::new(config),
            counters: ImageLevelCounters::new(),
            summary: CohortSummary::default(),
        }
    }

    pub fn counters(&self) -> &ImageLevelCounters {
        &self.counters
    }

    pub fn summary(&self) -> &CohortSummary {
        &self.summary
    }

    /// Score one participant and fold them in if valid. Errors leave both
    /// counters and summary untouched; the caller decides whether to skip.
    pub fn process(
        &mut self,
        subject_id: &str,
        trials: &[CanonicalTrial],
    ) -> Result<ParticipantScore, ScoringError> {
        let score = self.scorer.score(trials)?;
        score.apply_to(&mut self.counters);
        self.summary.record(score.status);
        debug!(
            subject_id,
            status = score.status.as_str(),
            filler_far = ?score.filler_false_alarm_rate,
            vigilance_miss = ?score.vigilance_miss_rate,
            "scored participant"
        );
        Ok(score)
    }

    pub fn record_skip(&mut self, subject_id: &str, reason: impl Into<String>) {
        self.summary.record_skip(subject_id, reason);
    }

    /// Combine a partial aggregation, e.g. from a separate batch.
    pub fn merge(&mut self, other: &AggregationEngine) {
        self.counters.merge(&other.counters);
        self.summary.merge(&other.summary);
    }

    pub fn finalize(&self) -> Result<Vec<ImageMetrics>, AggregationInvariantViolation> {
        finalize(&self.counters)
    }

    pub fn into_parts(self) -> (ImageLevelCounters, CohortSummary) {
        (self.counters, self.summary)
    }
}
