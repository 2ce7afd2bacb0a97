//! Difficulty ranges and setting-fit scores.
//!
//! Both schemas and service implementations advertise a closed difficulty
//! range `[min, max]`. Candidates are scored by their distance to the
//! requested difficulty, and an implementation that is chosen reports the
//! difficulty it actually achieves (the request clamped to the nearer bound).

use serde::{Deserialize, Serialize};

/// Integer scenario difficulty level.
pub type Difficulty = i32;

/// Closed difficulty range `[min, max]` supported by a schema or implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DifficultyRange {
    /// Lowest supported difficulty (inclusive).
    pub min: Difficulty,
    /// Highest supported difficulty (inclusive).
    pub max: Difficulty,
}

impl DifficultyRange {
    /// Create a range from its bounds.
    pub const fn new(min: Difficulty, max: Difficulty) -> Self {
        Self { min, max }
    }

    /// Whether `target` lies within the range.
    pub const fn contains(self, target: Difficulty) -> bool {
        self.min <= target && target <= self.max
    }

    /// Distance between `target` and the range: zero inside, otherwise the
    /// absolute distance to the nearer bound.
    pub const fn distance(self, target: Difficulty) -> u32 {
        if self.contains(target) {
            return 0;
        }
        let to_min = target.abs_diff(self.min);
        let to_max = target.abs_diff(self.max);
        if to_min < to_max { to_min } else { to_max }
    }

    /// Difficulty actually achieved when `requested` is asked of this range.
    ///
    /// Returns `requested` when it is in range, otherwise the bound with the
    /// smaller absolute distance. Equal distances resolve to `min`.
    pub const fn matched(self, requested: Difficulty) -> Difficulty {
        if self.contains(requested) {
            return requested;
        }
        if requested.abs_diff(self.max) < requested.abs_diff(self.min) {
            self.max
        } else {
            self.min
        }
    }
}

/// How plausible a concrete object is in a given setting.
///
/// Variants are declared in ascending order, so the derived [`Ord`] ranks
/// an expected object above a neutral one above an unexpected one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SettingFit {
    /// The object would be out of place.
    Unexpected,
    /// No particular expectation.
    #[default]
    Neutral,
    /// The object is expected to be found here.
    Expected,
}

impl SettingFit {
    /// The best achievable fit; best-fit searches stop once they reach it.
    pub const BEST: Self = Self::Expected;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_inside_range() {
        let range = DifficultyRange::new(1, 3);
        for d in 1..=3 {
            assert_eq!(range.distance(d), 0);
        }
    }

    #[test]
    fn distance_uses_nearer_bound() {
        let range = DifficultyRange::new(3, 4);
        assert_eq!(range.distance(1), 2);
        assert_eq!(range.distance(7), 3);
        assert_eq!(DifficultyRange::new(1, 2).distance(3), 1);
    }

    #[test]
    fn matched_returns_request_inside_range() {
        assert_eq!(DifficultyRange::new(1, 3).matched(2), 2);
    }

    #[test]
    fn matched_clamps_to_closer_bound() {
        let range = DifficultyRange::new(2, 5);
        assert_eq!(range.matched(0), 2);
        assert_eq!(range.matched(9), 5);
    }

    #[test]
    fn matched_tie_prefers_min() {
        // Degenerate range where both bounds are equally far never happens for
        // min < max outside the range, but a point range must stay stable.
        assert_eq!(DifficultyRange::new(4, 4).matched(1), 4);
        assert_eq!(DifficultyRange::new(4, 4).matched(8), 4);
    }

    #[test]
    fn setting_fit_orders_expected_highest() {
        assert!(SettingFit::Unexpected < SettingFit::Neutral);
        assert!(SettingFit::Neutral < SettingFit::Expected);
        assert_eq!(SettingFit::BEST, SettingFit::Expected);
        assert_eq!(SettingFit::default(), SettingFit::Neutral);
    }
}
