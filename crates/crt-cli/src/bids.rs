use crate::config::PipelineConfig;
use anyhow::{Context, Result};
use clap::Args;
use crt_core::ParticipantRecord;
use crt_sequence::{SequenceValidator, TrialTableBuilder};
use crt_storage::{read_survey_export, BidsDataset, SurveyRow};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Args, Debug)]
pub struct ToBidsArgs {
    /// Survey export (CSV) with one row per participant
    #[arg(long)]
    pub raw_data_path: PathBuf,
    /// Dataset root to write subject tables into
    #[arg(long)]
    pub output_path: PathBuf,
    /// Image presentation time, ms
    #[arg(long)]
    pub stim_time: Option<f64>,
    /// Fixation (inter-stimulus) time, ms
    #[arg(long)]
    pub isi: Option<f64>,
    /// Participant label to drop before numbering; repeatable
    #[arg(long = "exclude-participant")]
    pub exclude_participants: Vec<String>,
    #[arg(long)]
    pub max_rows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub subject_id: String,
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub rows_read: usize,
    pub written: Vec<String>,
    pub skipped: Vec<SkippedRow>,
}

pub fn run(args: ToBidsArgs, config: &PipelineConfig) -> Result<()> {
    let timing = config.timing_with(args.stim_time, args.isi)?;
    let mut ingest = config.ingest.clone();
    ingest.excluded_participants.extend(args.exclude_participants);
    if args.max_rows.is_some() {
        ingest.max_rows = args.max_rows;
    }

    let rows = read_survey_export(&args.raw_data_path, &ingest)
        .with_context(|| format!("failed to read {}", args.raw_data_path.display()))?;
    let validator = SequenceValidator::new(config.validation.clone());
    let builder = TrialTableBuilder::new(timing);
    let dataset = BidsDataset::new(&args.output_path);

    let summary = convert(&rows, &validator, &builder, &dataset)?;
    dataset
        .write_participants(&summary.written)
        .context("failed to write participants.tsv")?;

    info!(
        rows_read = summary.rows_read,
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        root = %dataset.root().display(),
        "survey export converted"
    );
    println!("Rows read: {}", summary.rows_read);
    println!("Subjects written: {}", summary.written.len());
    println!("Rows skipped: {}", summary.skipped.len());
    Ok(())
}

/// Write every row that validates; the rest are logged and skipped.
/// Failing to write a table aborts the conversion.
pub fn convert(
    rows: &[SurveyRow],
    validator: &SequenceValidator,
    builder: &TrialTableBuilder,
    dataset: &BidsDataset,
) -> Result<ConversionSummary> {
    let mut summary = ConversionSummary {
        rows_read: rows.len(),
        ..ConversionSummary::default()
    };
    for row in rows {
        match build_record(row, validator, builder) {
            Ok(record) => {
                let path = dataset.write_record(&record).with_context(|| {
                    format!("failed to write trial table for sub-{}", row.subject_id)
                })?;
                debug!(subject_id = %row.subject_id, path = %path.display(), "subject written");
                summary.written.push(row.subject_id.clone());
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(subject_id = %row.subject_id, line = row.line, %reason, "skipping row");
                summary.skipped.push(SkippedRow {
                    subject_id: row.subject_id.clone(),
                    line: row.line,
                    reason,
                });
            }
        }
    }
    Ok(summary)
}

fn build_record(
    row: &SurveyRow,
    validator: &SequenceValidator,
    builder: &TrialTableBuilder,
) -> Result<ParticipantRecord> {
    let sequence = row.sequence().context("unreadable trial types")?;
    validator
        .validate(&sequence)
        .context("sequence failed validation")?;
    Ok(builder.build_record(&row.subject_id, &sequence)?)
}
