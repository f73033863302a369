//! Descriptive statistics over total scores.

use serde::{Deserialize, Serialize};

use crate::sidecar::{MAX_RATING, rating_for_score};

/// Summary of a set of 0-100 scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Number of scores.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median; the average of the two middle values for even counts.
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Lowest score.
    pub min: u8,
    /// Highest score.
    pub max: u8,
    /// Number of scores per star rating, index 0 to 5.
    pub rating_histogram: [usize; MAX_RATING as usize + 1],
}

impl ScoreSummary {
    /// Compute the summary. Returns `None` for an empty slice.
    #[must_use]
    pub fn compute(scores: &[u8]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let mut sorted = scores.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let mean = sorted.iter().map(|&s| f64::from(s)).sum::<f64>() / count as f64;
        let variance = sorted
            .iter()
            .map(|&s| (f64::from(s) - mean).powi(2))
            .sum::<f64>()
            / count as f64;

        let mid = count / 2;
        let median = if count % 2 == 0 {
            (f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0
        } else {
            f64::from(sorted[mid])
        };

        let mut rating_histogram = [0; MAX_RATING as usize + 1];
        for &score in &sorted {
            rating_histogram[usize::from(rating_for_score(score))] += 1;
        }

        Some(Self {
            count,
            mean,
            median,
            std_dev: variance.sqrt(),
            min: sorted[0],
            max: sorted[count - 1],
            rating_histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert!(ScoreSummary::compute(&[]).is_none());
    }

    #[test]
    fn test_odd_count() {
        let summary = ScoreSummary::compute(&[90, 10, 50]).unwrap();
        assert_eq!(summary.count, 3);
        assert!((summary.mean - 50.0).abs() < 1e-9);
        assert!((summary.median - 50.0).abs() < 1e-9);
        assert_eq!(summary.min, 10);
        assert_eq!(summary.max, 90);
        assert_eq!(summary.rating_histogram, [0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_even_count_median() {
        let summary = ScoreSummary::compute(&[40, 60, 70, 100]).unwrap();
        assert!((summary.median - 65.0).abs() < 1e-9);
        assert!((summary.mean - 67.5).abs() < 1e-9);
    }

    #[test]
    fn test_std_dev() {
        let summary = ScoreSummary::compute(&[20, 40, 40, 40, 50, 50, 70, 90]).unwrap();
        assert!((summary.std_dev - 20.0).abs() < 1e-9);
    }
}
