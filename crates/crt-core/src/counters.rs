use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Signal-detection cell a single on-image trial falls into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalOutcome {
    TargetHit,
    TargetMiss,
    TargetFalseAlarm,
    TargetCorrectRejection,
    FillerHit,
    FillerMiss,
    FillerFalseAlarm,
    FillerCorrectRejection,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageCounters {
    pub target_hit: u64,
    pub target_miss: u64,
    pub target_fa: u64,
    pub target_cr: u64,
    pub filler_hit: u64,
    pub filler_miss: u64,
    pub filler_fa: u64,
    pub filler_cr: u64,
    pub n_participants_target: u64,
    pub n_participants_filler: u64,
}

impl ImageCounters {
    /// First presentations also count the participant as exposed.
    pub fn record(&mut self, outcome: SignalOutcome) {
        match outcome {
            SignalOutcome::TargetHit => self.target_hit += 1,
            SignalOutcome::TargetMiss => self.target_miss += 1,
            SignalOutcome::TargetFalseAlarm => {
                self.target_fa += 1;
                self.n_participants_target += 1;
            }
            SignalOutcome::TargetCorrectRejection => {
                self.target_cr += 1;
                self.n_participants_target += 1;
            }
            SignalOutcome::FillerHit => self.filler_hit += 1,
            SignalOutcome::FillerMiss => self.filler_miss += 1,
            SignalOutcome::FillerFalseAlarm => {
                self.filler_fa += 1;
                self.n_participants_filler += 1;
            }
            SignalOutcome::FillerCorrectRejection => {
                self.filler_cr += 1;
                self.n_participants_filler += 1;
            }
        }
    }

    pub fn add(&mut self, other: &ImageCounters) {
        self.target_hit += other.target_hit;
        self.target_miss += other.target_miss;
        self.target_fa += other.target_fa;
        self.target_cr += other.target_cr;
        self.filler_hit += other.filler_hit;
        self.filler_miss += other.filler_miss;
        self.filler_fa += other.filler_fa;
        self.filler_cr += other.filler_cr;
        self.n_participants_target += other.n_participants_target;
        self.n_participants_filler += other.n_participants_filler;
    }
}

/// Cohort-wide counters keyed by image id, iterated in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLevelCounters {
    images: BTreeMap<String, ImageCounters>,
}

impl ImageLevelCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, image_id: &str, outcome: SignalOutcome) {
        self.entry(image_id).record(outcome);
    }

    fn entry(&mut self, image_id: &str) -> &mut ImageCounters {
        self.images
            .entry(image_id.to_string())
            .or_insert_with(ImageCounters::default)
    }

    pub fn get(&self, image_id: &str) -> Option<&ImageCounters> {
        self.images.get(image_id)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ImageCounters> {
        self.images.iter()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Additive merge; order of merging never changes the result.
    pub fn merge(&mut self, other: &ImageLevelCounters) {
        for (image_id, counters) in &other.images {
            self.entry(image_id).add(counters);
        }
    }
}

impl<'a> IntoIterator for &'a ImageLevelCounters {
    type Item = (&'a String, &'a ImageCounters);
    type IntoIter = btree_map::Iter<'a, String, ImageCounters>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_presentations_count_exposure() {
        let mut counters = ImageLevelCounters::new();
        counters.record("a.jpg", SignalOutcome::TargetCorrectRejection);
        counters.record("a.jpg", SignalOutcome::TargetHit);
        counters.record("b.jpg", SignalOutcome::FillerFalseAlarm);
        counters.record("b.jpg", SignalOutcome::FillerMiss);

        let a = counters.get("a.jpg").expect("a counted");
        assert_eq!(a.target_cr, 1);
        assert_eq!(a.target_hit, 1);
        assert_eq!(a.n_participants_target, 1);
        assert_eq!(a.n_participants_filler, 0);

        let b = counters.get("b.jpg").expect("b counted");
        assert_eq!(b.filler_fa, 1);
        assert_eq!(b.filler_miss, 1);
        assert_eq!(b.n_participants_filler, 1);
    }

    #[test]
    fn merge_is_order_independent() {
        let mut left = ImageLevelCounters::new();
        left.record("a.jpg", SignalOutcome::TargetFalseAlarm);
        left.record("a.jpg", SignalOutcome::TargetMiss);
        let mut right = ImageLevelCounters::new();
        right.record("a.jpg", SignalOutcome::TargetCorrectRejection);
        right.record("c.jpg", SignalOutcome::FillerCorrectRejection);

        let mut left_then_right = ImageLevelCounters::new();
        left_then_right.merge(&left);
        left_then_right.merge(&right);
        let mut right_then_left = ImageLevelCounters::new();
        right_then_left.merge(&right);
        right_then_left.merge(&left);

        assert_eq!(left_then_right, right_then_left);
        let a = left_then_right.get("a.jpg").expect("a merged");
        assert_eq!(a.n_participants_target, 2);
        assert_eq!(a.target_fa + a.target_cr, 2);
    }

    #[test]
    fn iteration_is_sorted_by_image_id() {
        let mut counters = ImageLevelCounters::new();
        for image_id in ["zebra.jpg", "apple.jpg", "mango.jpg"] {
            counters.record(image_id, SignalOutcome::FillerCorrectRejection);
        }
        let ids = counters.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["apple.jpg", "mango.jpg", "zebra.jpg"]);
    }
}
