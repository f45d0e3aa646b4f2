use crate::config::PipelineConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use crt_core::ScoringConfig;
use crt_scoring::{CohortRunner, CohortSummary, ImageMetrics};
use crt_storage::{write_delimited, BidsDataset, NULL_MARKER};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct MetricsArgs {
    /// Dataset root containing participants.tsv
    #[arg(long)]
    pub root_path: PathBuf,
    /// Metrics CSV to write
    #[arg(long)]
    pub output_path: PathBuf,
    /// Ignore presses made during the fixation after an image
    #[arg(long, default_value_t = false)]
    pub no_consolidate_fixation: bool,
    #[arg(long)]
    pub far_threshold: Option<f64>,
    #[arg(long)]
    pub vigilance_miss_threshold: Option<f64>,
    /// Also write a JSON run summary here
    #[arg(long)]
    pub summary_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    generated_at: DateTime<Utc>,
    root_path: &'a Path,
    output_path: &'a Path,
    scoring: &'a ScoringConfig,
    images: usize,
    cohort: &'a CohortSummary,
}

pub fn run(args: MetricsArgs, config: &PipelineConfig) -> Result<()> {
    let scoring = scoring_config(&args, &config.scoring)?;
    let dataset = BidsDataset::new(&args.root_path);
    let participants = dataset
        .read_participants()
        .context("failed to read participants.tsv")?;

    let report = CohortRunner::new(scoring.clone()).run(&dataset, &participants)?;
    write_metrics(&args.output_path, &report.metrics)?;
    info!(
        images = report.metrics.len(),
        path = %args.output_path.display(),
        "wrote image metrics"
    );
    print_summary(&report.summary);

    if let Some(path) = &args.summary_path {
        let summary = RunSummary {
            generated_at: Utc::now(),
            root_path: &args.root_path,
            output_path: &args.output_path,
            scoring: &scoring,
            images: report.metrics.len(),
            cohort: &report.summary,
        };
        write_run_summary(path, &summary)?;
    }
    Ok(())
}

fn scoring_config(args: &MetricsArgs, base: &ScoringConfig) -> Result<ScoringConfig> {
    let mut scoring = base.clone();
    if args.no_consolidate_fixation {
        scoring.consolidate_fixation = false;
    }
    if let Some(threshold) = args.far_threshold {
        scoring.far_threshold = threshold;
    }
    if let Some(threshold) = args.vigilance_miss_threshold {
        scoring.vigilance_miss_threshold = threshold;
    }
    scoring.validate()?;
    Ok(scoring)
}

fn print_summary(summary: &CohortSummary) {
    println!("Total participants: {}", summary.total);
    println!("Valid data: {}", summary.valid);
    println!("Excluded: {}", summary.excluded());
    println!(
        "Excluded for having too high far on fillers: {}",
        summary.excluded_filler_far
    );
    println!(
        "Excluded for missing too much vigilance repeat: {}",
        summary.excluded_vigilance_miss
    );
    println!("Skipped (unreadable or malformed): {}", summary.skipped_count());
}

pub fn write_metrics(path: &Path, metrics: &[ImageMetrics]) -> Result<()> {
    write_delimited(path, b',', &ImageMetrics::COLUMNS, metrics.iter().map(metric_cells))
        .with_context(|| format!("failed to write metrics to {}", path.display()))
}

fn metric_cells(metrics: &ImageMetrics) -> [String; 14] {
    [
        metrics.image_name.clone(),
        metrics.n_participants_target.to_string(),
        rate_cell(metrics.target_crr),
        rate_cell(metrics.target_hr),
        rate_cell(metrics.target_far),
        metrics.target_hit.to_string(),
        metrics.target_miss.to_string(),
        metrics.target_fa.to_string(),
        metrics.target_cr.to_string(),
        metrics.n_participants_filler.to_string(),
        metrics.filler_hit.to_string(),
        metrics.filler_miss.to_string(),
        metrics.filler_fa.to_string(),
        metrics.filler_cr.to_string(),
    ]
}

fn rate_cell(rate: Option<f64>) -> String {
    rate.map_or_else(|| NULL_MARKER.to_string(), |rate| rate.to_string())
}

fn write_run_summary(path: &Path, summary: &RunSummary<'_>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(summary)?;
    fs::write(path, contents)
        .with_context(|| format!("failed to write run summary to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crt_core::{ImageLevelCounters, SignalOutcome};
    use tempfile::tempdir;

    fn args(root: &Path) -> MetricsArgs {
        MetricsArgs {
            root_path: root.to_path_buf(),
            output_path: root.join("out/metrics.csv"),
            no_consolidate_fixation: false,
            far_threshold: None,
            vigilance_miss_threshold: None,
            summary_path: None,
        }
    }

    #[test]
    fn metrics_csv_uses_fixed_columns_and_marks_undefined_rates() {
        let mut counters = ImageLevelCounters::new();
        for outcome in [
            SignalOutcome::TargetCorrectRejection,
            SignalOutcome::TargetHit,
            SignalOutcome::TargetFalseAlarm,
            SignalOutcome::TargetHit,
        ] {
            counters.record("a.jpg", outcome);
        }
        counters.record("b.jpg", SignalOutcome::FillerCorrectRejection);
        let metrics = crt_scoring::finalize(&counters).expect("finalize");

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested/metrics.csv");
        write_metrics(&path, &metrics).expect("write metrics");

        let contents = fs::read_to_string(&path).expect("read back");
        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], ImageMetrics::COLUMNS.join(","));
        assert_eq!(lines[1], "a.jpg,2,0.5,1,0.5,2,0,1,1,0,0,0,0,0");
        assert_eq!(lines[2], "b.jpg,0,n/a,n/a,n/a,0,0,0,0,1,0,0,0,1");
    }

    #[test]
    fn command_line_overrides_config_thresholds() {
        let dir = tempdir().expect("tempdir");
        let mut overrides = args(dir.path());
        overrides.no_consolidate_fixation = true;
        overrides.far_threshold = Some(0.4);

        let scoring = scoring_config(&overrides, &ScoringConfig::default()).expect("scoring");
        assert!(!scoring.consolidate_fixation);
        assert_eq!(scoring.far_threshold, 0.4);
        assert_eq!(scoring.vigilance_miss_threshold, 0.7);

        overrides.vigilance_miss_threshold = Some(-0.1);
        assert!(scoring_config(&overrides, &ScoringConfig::default()).is_err());
    }

    #[test]
    fn run_writes_metrics_and_summary() {
        let dir = tempdir().expect("tempdir");
        let dataset = BidsDataset::new(dir.path());
        dataset
            .write_participants(&["0001"])
            .expect("write participants");
        let mut run_args = args(dir.path());
        let summary_path = dir.path().join("out/summary.json");
        run_args.summary_path = Some(summary_path.clone());

        run(run_args, &PipelineConfig::default()).expect("run metrics");

        let csv = fs::read_to_string(dir.path().join("out/metrics.csv")).expect("metrics");
        assert_eq!(csv.lines().count(), 1);
        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(summary_path).expect("summary"))
                .expect("summary json");
        assert_eq!(summary["cohort"]["total"], 1);
        assert_eq!(summary["cohort"]["skipped"][0]["subject_id"], "0001");
        assert!(summary["generated_at"].is_string());
    }
}
