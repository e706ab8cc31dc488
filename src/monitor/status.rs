//! Status classification over a bounded window of probe outcomes.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default number of outcomes kept per target.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Default number of outcomes required before a status other than
/// [`Status::Unknown`] is reported.
pub const DEFAULT_MIN_SAMPLES: usize = 1;

/// Liveness status of a monitored target.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Status {
    /// Not enough samples yet.
    #[default]
    Unknown,
    /// Every sample in the window succeeded.
    Up,
    /// Every sample in the window failed.
    Down,
    /// The window holds both successes and failures.
    Flapping,
}

/// Thresholds used to derive a [`Status`] from an [`OutcomeWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyPolicy {
    /// Maximum number of outcomes retained.
    pub window_size: usize,
    /// Minimum number of outcomes before classifying.
    pub min_samples: usize,
}

impl Default for ClassifyPolicy {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Classify a sequence of probe outcomes.
///
/// `true` is a successful probe, `false` a failed one.
pub fn classify<'a>(outcomes: impl IntoIterator<Item = &'a bool>, min_samples: usize) -> Status {
    let (mut total, mut ok) = (0usize, 0usize);
    for &success in outcomes {
        total += 1;
        if success {
            ok += 1;
        }
    }

    if total == 0 || total < min_samples {
        Status::Unknown
    } else if ok == total {
        Status::Up
    } else if ok == 0 {
        Status::Down
    } else {
        Status::Flapping
    }
}

/// Bounded FIFO of probe outcomes, most recent last.
#[derive(Debug, Clone)]
pub struct OutcomeWindow {
    outcomes: VecDeque<bool>,
    capacity: usize,
}

impl OutcomeWindow {
    /// Create an empty window holding at most `capacity` outcomes.
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an outcome, evicting the oldest one when full.
    pub fn push(&mut self, success: bool) {
        while self.outcomes.len() >= self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Outcomes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &bool> {
        self.outcomes.iter()
    }

    /// Copy of the outcomes, oldest first.
    pub fn to_vec(&self) -> Vec<bool> {
        self.outcomes.iter().copied().collect()
    }

    /// Derive the status for the current contents.
    pub fn classify(&self, min_samples: usize) -> Status {
        classify(self.outcomes.iter(), min_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_classify_all_success_is_up() {
        assert_eq!(classify(&[true, true, true], 1), Status::Up);
        assert_eq!(classify(&[true], 1), Status::Up);
    }

    #[test]
    fn test_classify_all_failure_is_down() {
        assert_eq!(classify(&[false, false], 1), Status::Down);
    }

    #[test]
    fn test_classify_mixed_is_flapping() {
        assert_eq!(classify(&[true, false, true], 1), Status::Flapping);
        assert_eq!(classify(&[false, false, true], 3), Status::Flapping);
    }

    #[test]
    fn test_classify_below_min_samples_is_unknown() {
        assert_eq!(classify(&Vec::new(), 1), Status::Unknown);
        assert_eq!(classify(&[true, true], 3), Status::Unknown);
        assert_eq!(classify(&[false, true], 3), Status::Unknown);
        // An empty window never classifies, even with a zero threshold.
        assert_eq!(classify(&Vec::new(), 0), Status::Unknown);
    }

    #[test]
    fn test_window_evicts_oldest_first() {
        let mut window = OutcomeWindow::new(3);
        for outcome in [false, true, true, true] {
            window.push(outcome);
        }

        assert_eq!(window.len(), 3);
        assert_eq!(window.to_vec(), vec![true, true, true]);
        assert_eq!(window.classify(1), Status::Up);
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut window = OutcomeWindow::new(4);
        for i in 0..50 {
            window.push(i % 3 == 0);
            assert!(window.len() <= 4);
        }
        assert_eq!(window.len(), 4);
    }

    #[test]
    fn test_window_zero_capacity_holds_one() {
        let mut window = OutcomeWindow::new(0);
        window.push(false);
        window.push(true);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.to_vec(), vec![true]);
    }

    #[test]
    fn test_flapping_clears_once_failure_leaves_window() {
        let mut window = OutcomeWindow::new(2);
        window.push(true);
        window.push(false);
        assert_eq!(window.classify(1), Status::Flapping);
        window.push(true);
        assert_eq!(window.classify(1), Status::Flapping);
        window.push(true);
        assert_eq!(window.classify(1), Status::Up);
    }

    #[test]
    fn test_status_string_forms() {
        assert_eq!(Status::Flapping.to_string(), "FLAPPING");
        assert_eq!(Status::Up.as_ref(), "UP");
        assert_eq!(Status::from_str("down").unwrap(), Status::Down);
        assert!(Status::from_str("sideways").is_err());
        assert_eq!(
            serde_json::to_string(&Status::Unknown).unwrap(),
            "\"UNKNOWN\""
        );
    }
}
