//! Structural checks on a participant's raw trial stream and conversion of a
//! checked stream into the canonical per-trial table.

pub mod table;
pub mod validator;

pub use table::{raw_from_trials, TableError, TrialTableBuilder};
pub use validator::{validate_sequence, IntervalBound, SequenceValidator, ValidationError};
