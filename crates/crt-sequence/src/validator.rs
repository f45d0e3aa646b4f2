use crt_core::{RawTrialSequence, TrialType, ValidationConfig};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalBound {
    ExclusiveMin(u32),
    InclusiveMin(u32),
    InclusiveMax(u32),
}

impl fmt::Display for IntervalBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalBound::ExclusiveMin(min) => write!(f, "> {min}"),
            IntervalBound::InclusiveMin(min) => write!(f, ">= {min}"),
            IntervalBound::InclusiveMax(max) => write!(f, "<= {max}"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error(
        "sequence lengths differ: {images} images, {types} types, {keypresses} keypresses, {response_times} response times"
    )]
    LengthMismatch {
        images: usize,
        types: usize,
        keypresses: usize,
        response_times: usize,
    },
    #[error("expected {expected} {trial_type} trials, found {found}")]
    CountMismatch {
        trial_type: TrialType,
        expected: usize,
        found: usize,
    },
    #[error("expected {expected} trials including fixations, found {found}")]
    TotalTrialMismatch { expected: usize, found: usize },
    #[error("image {image_id} at index {index} is shown as both TARGET and FILLER")]
    TargetFillerOverlap { index: usize, image_id: String },
    #[error("REPEAT at index {index} shows {image_id}, which was not shown earlier as TARGET")]
    RepeatWithoutTarget { index: usize, image_id: String },
    #[error("VIGILANCE at index {index} shows {image_id}, which was not shown earlier as FILLER")]
    VigilanceWithoutFiller { index: usize, image_id: String },
    #[error("{first} image {image_id} recurs at index {index} without a {expected} tag")]
    UntaggedRecurrence {
        index: usize,
        image_id: String,
        first: TrialType,
        expected: TrialType,
    },
    #[error("{trial_type} image {image_id} at index {index} occurs {occurrences} times, expected 2")]
    OccurrenceCount {
        index: usize,
        image_id: String,
        trial_type: TrialType,
        occurrences: usize,
    },
    #[error("{trial_type} image {image_id} at index {index}: interval {interval} violates {bound}")]
    IntervalOutOfRange {
        index: usize,
        image_id: String,
        trial_type: TrialType,
        interval: f64,
        bound: IntervalBound,
    },
    #[error("sequence length {len} is odd; every image trial needs a following fixation")]
    OddLength { len: usize },
    #[error("index {index} must be FIXATION, found {found}")]
    MisplacedFixation { index: usize, found: TrialType },
    #[error("fixation at index {index} shows {found}, expected {expected}")]
    FixationImage {
        index: usize,
        expected: String,
        found: String,
    },
}

pub struct SequenceValidator {
    config: ValidationConfig,
}

impl SequenceValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, sequence: &RawTrialSequence) -> Result<(), ValidationError> {
        validate_sequence(
            &sequence.image_ids,
            &sequence.trial_types,
            &sequence.keypresses,
            &sequence.response_times,
            &self.config,
        )
    }
}

/// Check one participant's raw stream, stopping at the first violated
/// invariant.
pub fn validate_sequence(
    image_ids: &[String],
    trial_types: &[TrialType],
    keypresses: &[String],
    response_times: &[String],
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    let len = image_ids.len();
    if trial_types.len() != len || keypresses.len() != len || response_times.len() != len {
        return Err(ValidationError::LengthMismatch {
            images: len,
            types: trial_types.len(),
            keypresses: keypresses.len(),
            response_times: response_times.len(),
        });
    }

    check_counts(trial_types, config)?;
    check_category_sets(image_ids, trial_types)?;
    check_presentation_order(image_ids, trial_types, config)?;
    check_fixations(image_ids, trial_types, config)
}

fn count_of(trial_types: &[TrialType], wanted: TrialType) -> usize {
    trial_types.iter().filter(|t| **t == wanted).count()
}

fn expect_count(
    trial_types: &[TrialType],
    trial_type: TrialType,
    expected: usize,
) -> Result<(), ValidationError> {
    let found = count_of(trial_types, trial_type);
    if found != expected {
        return Err(ValidationError::CountMismatch {
            trial_type,
            expected,
            found,
        });
    }
    Ok(())
}

fn check_counts(trial_types: &[TrialType], config: &ValidationConfig) -> Result<(), ValidationError> {
    if let Some(target_num) = config.target_num {
        expect_count(trial_types, TrialType::Target, target_num)?;
        expect_count(trial_types, TrialType::Repeat, target_num)?;
    }
    if let Some(filler_num) = config.filler_num {
        expect_count(trial_types, TrialType::Filler, filler_num)?;
    }
    if let Some(vigilance_num) = config.vigilance_num {
        expect_count(trial_types, TrialType::Vigilance, vigilance_num)?;
    }
    if let (Some(target_num), Some(filler_num), Some(vigilance_num)) =
        (config.target_num, config.filler_num, config.vigilance_num)
    {
        // every image trial is followed by a fixation
        let expected = 2 * (2 * target_num + filler_num + vigilance_num);
        if trial_types.len() != expected {
            return Err(ValidationError::TotalTrialMismatch {
                expected,
                found: trial_types.len(),
            });
        }
    }
    Ok(())
}

fn images_of<'a>(
    image_ids: &'a [String],
    trial_types: &[TrialType],
    wanted: TrialType,
) -> BTreeSet<&'a str> {
    image_ids
        .iter()
        .zip(trial_types)
        .filter(|(_, trial_type)| **trial_type == wanted)
        .map(|(image_id, _)| image_id.as_str())
        .collect()
}

fn occurrences(image_ids: &[String]) -> BTreeMap<&str, Vec<usize>> {
    let mut out = BTreeMap::<&str, Vec<usize>>::new();
    for (index, image_id) in image_ids.iter().enumerate() {
        out.entry(image_id.as_str()).or_default().push(index);
    }
    out
}

fn check_category_sets(
    image_ids: &[String],
    trial_types: &[TrialType],
) -> Result<(), ValidationError> {
    let targets = images_of(image_ids, trial_types, TrialType::Target);
    let fillers = images_of(image_ids, trial_types, TrialType::Filler);
    let repeats = images_of(image_ids, trial_types, TrialType::Repeat);
    let vigilance = images_of(image_ids, trial_types, TrialType::Vigilance);

    for (index, (image_id, trial_type)) in image_ids.iter().zip(trial_types).enumerate() {
        match trial_type {
            TrialType::Filler if targets.contains(image_id.as_str()) => {
                return Err(ValidationError::TargetFillerOverlap {
                    index,
                    image_id: image_id.clone(),
                });
            }
            TrialType::Repeat if !targets.contains(image_id.as_str()) => {
                return Err(ValidationError::RepeatWithoutTarget {
                    index,
                    image_id: image_id.clone(),
                });
            }
            TrialType::Vigilance if !fillers.contains(image_id.as_str()) => {
                return Err(ValidationError::VigilanceWithoutFiller {
                    index,
                    image_id: image_id.clone(),
                });
            }
            _ => {}
        }
    }

    // a first presentation that comes back must come back under its repeat tag
    let positions = occurrences(image_ids);
    for (first, expected, first_set, repeat_set) in [
        (TrialType::Target, TrialType::Repeat, &targets, &repeats),
        (TrialType::Filler, TrialType::Vigilance, &fillers, &vigilance),
    ] {
        for image_id in first_set.difference(repeat_set) {
            let Some(seen_at) = positions.get(image_id) else {
                continue;
            };
            if let Some(&index) = seen_at.get(1) {
                return Err(ValidationError::UntaggedRecurrence {
                    index,
                    image_id: image_id.to_string(),
                    first,
                    expected,
                });
            }
        }
    }

    Ok(())
}

fn check_presentation_order(
    image_ids: &[String],
    trial_types: &[TrialType],
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    let positions = occurrences(image_ids);
    let mut shown_as_target = BTreeSet::new();
    let mut shown_as_filler = BTreeSet::new();

    for (index, (image_id, trial_type)) in image_ids.iter().zip(trial_types).enumerate() {
        let (min, max) = match trial_type {
            TrialType::Target => {
                shown_as_target.insert(image_id.as_str());
                continue;
            }
            TrialType::Filler => {
                shown_as_filler.insert(image_id.as_str());
                continue;
            }
            TrialType::Fixation => continue,
            TrialType::Repeat => {
                if !shown_as_target.contains(image_id.as_str()) {
                    return Err(ValidationError::RepeatWithoutTarget {
                        index,
                        image_id: image_id.clone(),
                    });
                }
                (
                    config.min_repeat_interval.map(IntervalBound::ExclusiveMin),
                    config.max_repeat_interval,
                )
            }
            TrialType::Vigilance => {
                if !shown_as_filler.contains(image_id.as_str()) {
                    return Err(ValidationError::VigilanceWithoutFiller {
                        index,
                        image_id: image_id.clone(),
                    });
                }
                (
                    config.min_vigilance_interval.map(IntervalBound::InclusiveMin),
                    config.max_vigilance_interval,
                )
            }
        };

        let seen_at = positions
            .get(image_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        if seen_at.len() != 2 {
            return Err(ValidationError::OccurrenceCount {
                index,
                image_id: image_id.clone(),
                trial_type: *trial_type,
                occurrences: seen_at.len(),
            });
        }

        // halved so that interleaved fixations are not counted
        let interval = (seen_at[1] - seen_at[0]) as f64 / 2.0;
        if let Some(bound) = min {
            let too_short = match bound {
                IntervalBound::ExclusiveMin(min) => interval <= f64::from(min),
                IntervalBound::InclusiveMin(min) => interval < f64::from(min),
                IntervalBound::InclusiveMax(_) => false,
            };
            if too_short {
                return Err(ValidationError::IntervalOutOfRange {
                    index,
                    image_id: image_id.clone(),
                    trial_type: *trial_type,
                    interval,
                    bound,
                });
            }
        }
        if let Some(max) = max {
            if interval > f64::from(max) {
                return Err(ValidationError::IntervalOutOfRange {
                    index,
                    image_id: image_id.clone(),
                    trial_type: *trial_type,
                    interval,
                    bound: IntervalBound::InclusiveMax(max),
                });
            }
        }
    }

    Ok(())
}

fn check_fixations(
    image_ids: &[String],
    trial_types: &[TrialType],
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    if trial_types.len() % 2 != 0 {
        return Err(ValidationError::OddLength {
            len: trial_types.len(),
        });
    }

    for index in (1..trial_types.len()).step_by(2) {
        if !trial_types[index].is_fixation() {
            return Err(ValidationError::MisplacedFixation {
                index,
                found: trial_types[index],
            });
        }
        if let Some(expected) = config.fixation_img_name.as_deref() {
            if image_ids[index] != expected {
                return Err(ValidationError::FixationImage {
                    index,
                    expected: expected.to_string(),
                    found: image_ids[index].clone(),
                });
            }
        }
    }

    Ok(())
}
