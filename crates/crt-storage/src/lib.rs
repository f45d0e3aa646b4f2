//! File-system persistence for the recognition pipeline: survey export
//! ingestion, BIDS-style trial tables and run outputs.

pub mod bids;
pub mod manifest;
pub mod raw_log;
pub mod table;

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use bids::BidsDataset;
pub use manifest::{list_images, write_stimuli_js, StimulusManifest};
pub use raw_log::{parse_sequence, read_survey_export, SurveyRow};
pub use table::{write_delimited, NULL_MARKER};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("{path} has no {column:?} column")]
    MissingColumn { path: PathBuf, column: String },
    #[error("{path}, row {row}: {detail}")]
    MalformedRow {
        path: PathBuf,
        row: usize,
        detail: String,
    },
    #[error("no trial table for participant {subject_id} at {path}")]
    MissingParticipant { subject_id: String, path: PathBuf },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        StorageError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|err| StorageError::io(parent, err))
        }
        _ => Ok(()),
    }
}
