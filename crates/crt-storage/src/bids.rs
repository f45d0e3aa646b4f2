use crate::table::{column, nullable, write_delimited, NULL_MARKER};
use crate::StorageError;
use crt_core::{CanonicalTrial, ParticipantRecord, TrialSource, TrialType};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TASK: &str = "continuous_recognition";
pub const DATA_TYPE: &str = "beh";
pub const SUFFIX: &str = "beh";
pub const PARTICIPANTS_FILE: &str = "participants.tsv";
pub const PARTICIPANT_ID_COLUMN: &str = "participant_id";

pub const TRIAL_COLUMNS: [&str; 6] = [
    "onset",
    "duration",
    "trial_type",
    "response",
    "response_time",
    "stim_file",
];

/// A BIDS-style dataset root holding one trial table per subject.
#[derive(Debug, Clone)]
pub struct BidsDataset {
    root: PathBuf,
}

impl BidsDataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn trial_table_path(&self, subject_id: &str) -> PathBuf {
        self.root
            .join(format!("sub-{subject_id}"))
            .join(DATA_TYPE)
            .join(format!("sub-{subject_id}_task-{TASK}_{SUFFIX}.tsv"))
    }

    pub fn participants_path(&self) -> PathBuf {
        self.root.join(PARTICIPANTS_FILE)
    }

    pub fn write_record(&self, record: &ParticipantRecord) -> Result<PathBuf, StorageError> {
        self.write_trials(record.subject_id(), record.trials())
    }

    pub fn write_trials(
        &self,
        subject_id: &str,
        trials: &[CanonicalTrial],
    ) -> Result<PathBuf, StorageError> {
        let path = self.trial_table_path(subject_id);
        write_delimited(&path, b'\t', &TRIAL_COLUMNS, trials.iter().map(trial_cells))?;
        debug!(subject_id, path = %path.display(), trials = trials.len(), "wrote trial table");
        Ok(path)
    }

    pub fn read_trials(&self, subject_id: &str) -> Result<Vec<CanonicalTrial>, StorageError> {
        let path = self.trial_table_path(subject_id);
        if !path.is_file() {
            return Err(StorageError::MissingParticipant {
                subject_id: subject_id.to_string(),
                path,
            });
        }
        let mut reader = tsv_reader(&path)?;
        let headers = reader
            .headers()
            .map_err(|err| StorageError::csv(&path, err))?
            .clone();
        let onset_col = column(&path, &headers, "onset")?;
        let duration_col = column(&path, &headers, "duration")?;
        let type_col = column(&path, &headers, "trial_type")?;
        let response_col = column(&path, &headers, "response")?;
        let rt_col = column(&path, &headers, "response_time")?;
        let stim_col = column(&path, &headers, "stim_file")?;

        let mut trials = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|err| StorageError::csv(&path, err))?;
            let malformed = |detail: String| StorageError::MalformedRow {
                path: path.clone(),
                row,
                detail,
            };
            let cell = |index: usize| record.get(index).unwrap_or_default();
            let number = |name: &str, index: usize| {
                cell(index)
                    .trim()
                    .parse::<f64>()
                    .map_err(|err| malformed(format!("{name} {:?}: {err}", cell(index))))
            };

            let response_time = match nullable(cell(rt_col)) {
                Some(value) => Some(
                    value
                        .parse::<f64>()
                        .map_err(|err| malformed(format!("response_time {value:?}: {err}")))?,
                ),
                None => None,
            };
            trials.push(CanonicalTrial {
                onset: number("onset", onset_col)?,
                duration: number("duration", duration_col)?,
                trial_type: cell(type_col)
                    .trim()
                    .parse::<TrialType>()
                    .map_err(|err| malformed(err.to_string()))?,
                response: nullable(cell(response_col)).map(str::to_string),
                response_time,
                stim_file: cell(stim_col).to_string(),
            });
        }
        Ok(trials)
    }

    /// Write the cohort manifest listing every stored subject, in order.
    pub fn write_participants<S: AsRef<str>>(
        &self,
        subject_ids: &[S],
    ) -> Result<PathBuf, StorageError> {
        let path = self.participants_path();
        write_delimited(
            &path,
            b'\t',
            &[PARTICIPANT_ID_COLUMN],
            subject_ids.iter().map(|id| [id.as_ref()]),
        )?;
        Ok(path)
    }

    pub fn read_participants(&self) -> Result<Vec<String>, StorageError> {
        let path = self.participants_path();
        let mut reader = tsv_reader(&path)?;
        let headers = reader
            .headers()
            .map_err(|err| StorageError::csv(&path, err))?
            .clone();
        let id = column(&path, &headers, PARTICIPANT_ID_COLUMN)?;
        let mut subject_ids = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| StorageError::csv(&path, err))?;
            if let Some(subject_id) = record.get(id).and_then(nullable) {
                subject_ids.push(subject_id.to_string());
            }
        }
        Ok(subject_ids)
    }
}

impl TrialSource for BidsDataset {
    type Error = StorageError;

    fn load_trials(&self, subject_id: &str) -> Result<Vec<CanonicalTrial>, Self::Error> {
        self.read_trials(subject_id)
    }
}

fn tsv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, StorageError> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|err| StorageError::csv(path, err))
}

fn trial_cells(trial: &CanonicalTrial) -> [String; 6] {
    [
        trial.onset.to_string(),
        trial.duration.to_string(),
        trial.trial_type.as_str().to_string(),
        trial
            .response
            .clone()
            .unwrap_or_else(|| NULL_MARKER.to_string()),
        trial
            .response_time
            .map_or_else(|| NULL_MARKER.to_string(), |rt| rt.to_string()),
        trial.stim_file.clone(),
    ]
}
