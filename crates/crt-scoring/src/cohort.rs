use crate::aggregation::{AggregationEngine, AggregationInvariantViolation, CohortSummary, ImageMetrics};
use crate::scorer::ScoringError;
use crt_core::{ImageLevelCounters, ScoringConfig, TrialSource};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CohortError {
    #[error("participant {subject_id}: {source}")]
    Fatal {
        subject_id: String,
        #[source]
        source: ScoringError,
    },
    #[error(transparent)]
    Aggregation(#[from] AggregationInvariantViolation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CohortReport {
    pub metrics: Vec<ImageMetrics>,
    pub counters: ImageLevelCounters,
    pub summary: CohortSummary,
}

/// Drives a whole cohort through scoring and aggregation. Participants
/// whose tables cannot be loaded or scored are logged and skipped.
pub struct CohortRunner {
    config: ScoringConfig,
}

impl CohortRunner {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn run<S, I>(&self, source: &S, participant_ids: I) -> Result<CohortReport, CohortError>
    where
        S: TrialSource,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut engine = AggregationEngine::new(self.config.clone());
        for subject_id in participant_ids {
            let subject_id = subject_id.as_ref();
            let trials = match source.load_trials(subject_id) {
                Ok(trials) => trials,
                Err(err) => {
                    warn!(subject_id, error = %err, "skipping participant: trials unavailable");
                    engine.record_skip(subject_id, err.to_string());
                    continue;
                }
            };
            if let Err(err) = engine.process(subject_id, &trials) {
                if err.is_fatal() {
                    return Err(CohortError::Fatal {
                        subject_id: subject_id.to_string(),
                        source: err,
                    });
                }
                warn!(subject_id, error = %err, "skipping participant: malformed trial table");
                engine.record_skip(subject_id, err.to_string());
            }
        }

        let metrics = engine.finalize()?;
        let (counters, summary) = engine.into_parts();
        info!(
            total = summary.total,
            valid = summary.valid,
            excluded_filler_far = summary.excluded_filler_far,
            excluded_vigilance_miss = summary.excluded_vigilance_miss,
            skipped = summary.skipped_count(),
            images = metrics.len(),
            "cohort aggregated"
        );
        Ok(CohortReport {
            metrics,
            counters,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crt_core::{CanonicalTrial, TrialType};
    use std::collections::BTreeMap;

    fn trial(trial_type: TrialType, stim_file: &str, response: Option<&str>) -> CanonicalTrial {
        CanonicalTrial {
            onset: 0.0,
            duration: 1.0,
            trial_type,
            response: response.map(str::to_string),
            response_time: None,
            stim_file: stim_file.to_string(),
        }
    }

    fn fixation() -> CanonicalTrial {
        trial(TrialType::Fixation, "fixation.jpg", None)
    }

    fn participant(hit: bool) -> Vec<CanonicalTrial> {
        vec![
            trial(TrialType::Target, "a.jpg", None),
            fixation(),
            trial(TrialType::Repeat, "a.jpg", hit.then_some("82")),
            fixation(),
        ]
    }

    #[test]
    fn missing_and_malformed_participants_are_skipped() {
        let mut source = BTreeMap::new();
        source.insert("0001".to_string(), participant(true));
        source.insert("0002".to_string(), participant(false));
        let mut broken = participant(true);
        broken.pop();
        source.insert("0003".to_string(), broken);

        let report = CohortRunner::new(ScoringConfig::default())
            .run(&source, ["0001", "0002", "0003", "0004"])
            .expect("run cohort");

        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.valid, 2);
        let skipped = report
            .summary
            .skipped
            .iter()
            .map(|s| s.subject_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(skipped, vec!["0003", "0004"]);
        assert_eq!(report.metrics.len(), 1);
        assert_eq!(report.metrics[0].target_hr, Some(0.5));
    }

    #[test]
    fn fixation_in_an_image_slot_aborts_the_run() {
        let mut source = BTreeMap::new();
        source.insert("0001".to_string(), participant(true));
        source.insert(
            "0002".to_string(),
            vec![trial(TrialType::Fixation, "a.jpg", None), fixation()],
        );

        let err = CohortRunner::new(ScoringConfig::default())
            .run(&source, ["0001", "0002"])
            .expect_err("fatal scoring error");
        match err {
            CohortError::Fatal { subject_id, source } => {
                assert_eq!(subject_id, "0002");
                assert!(source.is_fatal());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
