//! Participant quality gating, signal-detection classification and
//! cohort-wide aggregation into per-image memorability metrics.
//!
//! ```text
//! canonical table ─► ParticipantScorer ─► ParticipantScore
//!                                             │ (valid only)
//!                                             ▼
//!                    AggregationEngine ─► ImageLevelCounters ─► ImageMetrics
//! ```

pub mod aggregation;
pub mod cohort;
pub mod scorer;

pub use aggregation::{
    finalize, AggregationEngine, AggregationInvariantViolation, CohortSummary, ImageMetrics,
    SkippedParticipant,
};
pub use cohort::{CohortError, CohortReport, CohortRunner};
pub use scorer::{
    classify, ParticipantScore, ParticipantScorer, ParticipantStatus, ScoringError,
    TrialClassification,
};
