use crt_core::{ScoringConfig, TimingConfig, TrialType, ValidationConfig};
use crt_scoring::{CohortRunner, ParticipantStatus};
use crt_sequence::{raw_from_trials, SequenceValidator, TrialTableBuilder};
use crt_storage::{parse_sequence, BidsDataset};
use tempfile::tempdir;

const IMAGES: &str = "a.jpg,fix.jpg,f.jpg,fix.jpg,b.jpg,fix.jpg,f.jpg,fix.jpg,a.jpg,fix.jpg,b.jpg,fix.jpg";
const TYPES: &str = "1,0,3,0,1,0,4,0,2,0,2,0";

/// Keypresses for the six image slots; a press on the following fixation
/// is used for the second slot of each pair to exercise consolidation.
fn participant(keys: [&str; 6]) -> (String, String) {
    let mut keypresses = Vec::new();
    let mut rts = Vec::new();
    for key in keys {
        keypresses.push(String::new());
        rts.push(String::new());
        keypresses.push(key.to_string());
        rts.push(if key.is_empty() { String::new() } else { "1700".to_string() });
    }
    (keypresses.join(","), rts.join(","))
}

#[test]
fn raw_logs_flow_through_to_image_metrics() {
    let validator = SequenceValidator::new(ValidationConfig {
        target_num: Some(2),
        filler_num: Some(1),
        vigilance_num: Some(1),
        min_vigilance_interval: Some(1),
        max_vigilance_interval: Some(7),
        fixation_img_name: Some("fix.jpg".to_string()),
        ..ValidationConfig::default()
    });
    let builder = TrialTableBuilder::new(TimingConfig::new(1500.0, 500.0).expect("timing"));
    let dir = tempdir().expect("tempdir");
    let dataset = BidsDataset::new(dir.path().join("bids"));

    let cohort = [
        ("0001", participant(["", "", "", "R", "82", ""])),
        ("0002", participant(["", "", "", "r", "", "114"])),
        // Presses on the filler: excluded for false alarms.
        ("0003", participant(["", "82", "", "82", "82", "82"])),
    ];
    let mut written = Vec::new();
    for (subject_id, (keys, rts)) in &cohort {
        let sequence = parse_sequence(IMAGES, TYPES, keys, rts).expect("parse");
        validator.validate(&sequence).expect("valid sequence");
        let record = builder
            .build_record(subject_id, &sequence)
            .expect("build table");
        assert_eq!(raw_from_trials(record.trials()).trial_types, sequence.trial_types);
        dataset.write_record(&record).expect("write record");
        written.push(subject_id.to_string());
    }
    written.push("0004".to_string());
    dataset.write_participants(&written).expect("write participants");

    let participants = dataset.read_participants().expect("read participants");
    let report = CohortRunner::new(ScoringConfig::default())
        .run(&dataset, &participants)
        .expect("run cohort");

    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.valid, 2);
    assert_eq!(report.summary.excluded_filler_far, 1);
    assert_eq!(report.summary.skipped.len(), 1);
    assert_eq!(report.summary.skipped[0].subject_id, "0004");

    let names = report
        .metrics
        .iter()
        .map(|m| m.image_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["a.jpg", "b.jpg", "f.jpg"]);

    let a = &report.metrics[0];
    assert_eq!(a.n_participants_target, 2);
    assert_eq!((a.target_hit, a.target_miss), (1, 1));
    assert_eq!(a.target_hr, Some(0.5));
    assert_eq!(a.target_far, Some(0.0));
    assert_eq!(a.target_crr, Some(0.5));

    let b = &report.metrics[1];
    assert_eq!((b.target_hit, b.target_miss), (1, 1));

    let f = &report.metrics[2];
    assert_eq!(f.n_participants_filler, 2);
    assert_eq!((f.filler_hit, f.filler_cr), (2, 2));
    assert_eq!(f.target_hr, None);

    let loaded = dataset.read_trials("0001").expect("reload");
    assert_eq!(loaded[7].trial_type, TrialType::Fixation);
    assert_eq!(loaded[7].response.as_deref(), Some("R"));
    assert_eq!(
        crt_scoring::ParticipantScorer::new(ScoringConfig::default())
            .score(&loaded)
            .expect("score")
            .status,
        ParticipantStatus::Valid
    );
}
