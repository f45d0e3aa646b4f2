use crate::table::column;
use crate::StorageError;
use crt_core::{IngestConfig, RawTrialSequence, TrialType, TrialTypeError};
use std::path::Path;
use tracing::{debug, warn};

/// One participant's row from a survey export, fields still comma-joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyRow {
    pub subject_id: String,
    pub participant_label: Option<String>,
    /// Line in the export where the record starts.
    pub line: u64,
    pub image_ids: String,
    pub trial_types: String,
    pub keypresses: String,
    pub response_times: String,
}

impl SurveyRow {
    pub fn sequence(&self) -> Result<RawTrialSequence, TrialTypeError> {
        parse_sequence(
            &self.image_ids,
            &self.trial_types,
            &self.keypresses,
            &self.response_times,
        )
    }
}

/// Split the four comma-joined export fields into a raw trial stream.
pub fn parse_sequence(
    image_ids: &str,
    trial_types: &str,
    keypresses: &str,
    response_times: &str,
) -> Result<RawTrialSequence, TrialTypeError> {
    let trial_types = split(trial_types)
        .map(TrialType::from_code)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawTrialSequence {
        image_ids: split(image_ids).map(str::to_string).collect(),
        trial_types,
        keypresses: split(keypresses).map(str::to_string).collect(),
        response_times: split(response_times).map(str::to_string).collect(),
    })
}

fn split(field: &str) -> impl Iterator<Item = &str> {
    field.split(',').map(str::trim)
}

/// Read a survey export and number the surviving rows as subjects.
///
/// Rows with an empty image sequence are dropped first, then the leading
/// export rows, then excluded participants; `max_rows` caps the rest. Only
/// the configured columns are decoded. A row whose sequence columns are not
/// valid UTF-8 keeps its subject number but is logged and left out.
pub fn read_survey_export(
    path: &Path,
    config: &IngestConfig,
) -> Result<Vec<SurveyRow>, StorageError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|err| StorageError::csv(path, err))?;
    let headers = reader
        .headers()
        .map_err(|err| StorageError::csv(path, err))?
        .clone();

    let sequence_columns = [
        (column(path, &headers, &config.image_column)?, config.image_column.as_str()),
        (column(path, &headers, &config.type_column)?, config.type_column.as_str()),
        (column(path, &headers, &config.keypress_column)?, config.keypress_column.as_str()),
        (column(path, &headers, &config.rt_column)?, config.rt_column.as_str()),
    ];
    let images = sequence_columns[0].0;
    let participant = if config.excluded_participants.is_empty() {
        column(path, &headers, &config.participant_column).ok()
    } else {
        Some(column(path, &headers, &config.participant_column)?)
    };

    let mut candidates = Vec::new();
    let mut read = 0usize;
    for record in reader.byte_records() {
        let record = record.map_err(|err| StorageError::csv(path, err))?;
        read += 1;
        if record
            .get(images)
            .map_or(true, |value| value.iter().all(u8::is_ascii_whitespace))
        {
            continue;
        }
        candidates.push(Candidate {
            line: record.position().map_or(0, |pos| pos.line()),
            label: participant
                .and_then(|index| record.get(index))
                .map(|label| String::from_utf8_lossy(label).trim().to_string())
                .filter(|label| !label.is_empty()),
            fields: decode_fields(&record, &sequence_columns),
        });
    }

    let numbered = candidates
        .into_iter()
        .skip(config.skip_leading_rows)
        .filter(|candidate| {
            candidate
                .label
                .as_deref()
                .map_or(true, |label| !config.excluded_participants.contains(label))
        })
        .take(config.max_rows.unwrap_or(usize::MAX))
        .enumerate();

    let mut rows = Vec::new();
    for (position, candidate) in numbered {
        let subject_id = format!("{:04}", position + 1);
        match candidate.fields {
            Ok([image_ids, trial_types, keypresses, response_times]) => rows.push(SurveyRow {
                subject_id,
                participant_label: candidate.label,
                line: candidate.line,
                image_ids,
                trial_types,
                keypresses,
                response_times,
            }),
            Err(bad_column) => warn!(
                subject_id = %subject_id,
                line = candidate.line,
                column = %bad_column,
                "skipping row: column is not valid UTF-8"
            ),
        }
    }

    debug!(
        path = %path.display(),
        read,
        kept = rows.len(),
        "read survey export"
    );
    Ok(rows)
}

struct Candidate {
    line: u64,
    label: Option<String>,
    /// The four sequence fields, or the name of the column that failed to decode.
    fields: Result<[String; 4], String>,
}

fn decode_fields(
    record: &csv::ByteRecord,
    columns: &[(usize, &str); 4],
) -> Result<[String; 4], String> {
    let mut fields: [String; 4] = Default::default();
    for (slot, (index, name)) in fields.iter_mut().zip(columns) {
        let bytes = record.get(*index).unwrap_or_default();
        *slot = std::str::from_utf8(bytes)
            .map_err(|_| name.to_string())?
            .to_string();
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    const EXPORT: &str = "\
PROLIFIC_PID,Answer.imseq,Answer.imtypeseq,keyPressSequence,RTSequence
Prolific id,Image sequence,Type sequence,Keys,RTs
ImportId pid,ImportId imseq,ImportId types,ImportId keys,ImportId rts
kicked,,,,
p1,\"a.jpg,fix.jpg\",\"1,0\",\",82\",\",640\"
p2,\"b.jpg,fix.jpg\",\"3,0\",\",\",\",\"
p3,\"c.jpg,fix.jpg\",\"1,0\",\"82,\",\"512,\"
";

    fn write_export(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("export.csv");
        std::fs::write(&path, EXPORT).expect("write export");
        path
    }

    #[test]
    fn leading_rows_and_empty_sequences_are_dropped() {
        let dir = tempdir().expect("tempdir");
        let path = write_export(dir.path());

        let rows = read_survey_export(&path, &IngestConfig::default()).expect("read export");
        let labels = rows
            .iter()
            .map(|row| row.participant_label.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec![Some("p1"), Some("p2"), Some("p3")]);
        let ids = rows.iter().map(|row| row.subject_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["0001", "0002", "0003"]);

        let sequence = rows[0].sequence().expect("parse sequence");
        assert_eq!(sequence.image_ids, vec!["a.jpg", "fix.jpg"]);
        assert_eq!(
            sequence.trial_types,
            vec![TrialType::Target, TrialType::Fixation]
        );
        assert_eq!(sequence.keypresses, vec!["", "82"]);
        assert_eq!(sequence.response_times, vec!["", "640"]);
    }

    #[test]
    fn undecodable_rows_are_skipped_without_renumbering() {
        let mut export = b"PROLIFIC_PID,Answer.imseq,Answer.imtypeseq,keyPressSequence,RTSequence,comment\n\
h1,h1,h1,h1,h1,h1\n\
h2,h2,h2,h2,h2,h2\n\
p1,\"a.jpg,fix.jpg\",\"1,0\",\",\",\",\",ok\n"
            .to_vec();
        export.extend_from_slice(b"p2,\"b.jpg,fix.jpg\",\"3,0\",\",\",\",\",caf\xe9\n");
        export.extend_from_slice(b"p3,\"c\xff.jpg,fix.jpg\",\"1,0\",\",\",\",\",ok\n");
        export.extend_from_slice(b"p4,\"d.jpg,fix.jpg\",\"3,0\",\",\",\",\",ok\n");
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("export.csv");
        std::fs::write(&path, export).expect("write export");

        let rows = read_survey_export(&path, &IngestConfig::default()).expect("read export");
        let kept = rows
            .iter()
            .map(|row| (row.subject_id.as_str(), row.participant_label.as_deref()))
            .collect::<Vec<_>>();
        assert_eq!(
            kept,
            vec![("0001", Some("p1")), ("0002", Some("p2")), ("0004", Some("p4"))]
        );
        assert_eq!(rows[1].image_ids, "b.jpg,fix.jpg");
    }

    #[test]
    fn exclusions_and_row_cap_renumber_subjects() {
        let dir = tempdir().expect("tempdir");
        let path = write_export(dir.path());
        let config = IngestConfig {
            excluded_participants: BTreeSet::from(["p1".to_string()]),
            max_rows: Some(1),
            ..IngestConfig::default()
        };

        let rows = read_survey_export(&path, &config).expect("read export");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].subject_id, "0001");
        assert_eq!(rows[0].participant_label.as_deref(), Some("p2"));
    }

    #[test]
    fn missing_sequence_column_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = write_export(dir.path());
        let config = IngestConfig {
            image_column: "imseq".to_string(),
            ..IngestConfig::default()
        };
        assert!(matches!(
            read_survey_export(&path, &config),
            Err(StorageError::MissingColumn { column, .. }) if column == "imseq"
        ));
    }

    #[test]
    fn unknown_type_code_fails_the_row() {
        assert_eq!(
            parse_sequence("a.jpg,fix.jpg", "1,7", ",", ","),
            Err(TrialTypeError::UnknownCode("7".to_string()))
        );
    }
}
