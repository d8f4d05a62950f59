use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Whether data came from the caller or was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    User,
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Flat,
}

/// Descriptive statistics over a dataset's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
    pub total: f64,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}

/// Relative change between half-means below which a series counts as flat.
const FLAT_TOLERANCE: f64 = 0.05;

impl Statistics {
    pub fn empty() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            median: 0.0,
            std: 0.0,
            total: 0.0,
            count: 0,
            trend: None,
        }
    }

    /// Compute statistics for an ordered series of finite values.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::empty();
        }

        let count = values.len();
        let total: f64 = values.iter().sum();
        let mean = total / count as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

        Self {
            min,
            max,
            mean,
            median,
            std: variance.sqrt(),
            total,
            count,
            trend: trend_of(values),
        }
    }
}

/// Compare the mean of the first half against the mean of the second half.
/// The middle element of an odd-length series belongs to neither half.
fn trend_of(values: &[f64]) -> Option<Trend> {
    if values.len() < 2 {
        return None;
    }
    let half = values.len() / 2;
    let first = &values[..half];
    let second = &values[values.len() - half..];
    let first_mean = first.iter().sum::<f64>() / half as f64;
    let second_mean = second.iter().sum::<f64>() / half as f64;

    let delta = second_mean - first_mean;
    let scale = first_mean.abs().max(f64::EPSILON);
    if (delta / scale).abs() < FLAT_TOLERANCE {
        Some(Trend::Flat)
    } else if delta > 0.0 {
        Some(Trend::Increasing)
    } else {
        Some(Trend::Decreasing)
    }
}

/// One named series: ordered `(label, value)` pairs.
pub type SeriesPoints = Vec<(String, f64)>;

/// The data handed to the renderer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<BTreeMap<String, SeriesPoints>>,
    pub provenance: Provenance,
    pub statistics: Statistics,
}

impl Dataset {
    /// Build a single-series dataset. Callers guarantee equal lengths.
    pub fn new(labels: Vec<String>, values: Vec<f64>, provenance: Provenance) -> Self {
        debug_assert_eq!(labels.len(), values.len());
        let statistics = Statistics::from_values(&values);
        Self {
            labels,
            values,
            series: None,
            provenance,
            statistics,
        }
    }

    pub fn with_series(mut self, series: BTreeMap<String, SeriesPoints>) -> Self {
        self.series = Some(series).filter(|s| !s.is_empty());
        self
    }

    /// Replace labels (e.g. after enhancement), keeping values and statistics.
    pub fn relabeled(mut self, labels: Vec<String>) -> Self {
        if labels.len() == self.labels.len() {
            self.labels = labels;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn series_count(&self) -> usize {
        self.series.as_ref().map_or(0, |s| s.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarterly_statistics() {
        let stats = Statistics::from_values(&[45000.0, 52000.0, 48000.0, 61000.0]);
        assert_eq!(stats.mean, 51500.0);
        assert_eq!(stats.median, 50000.0);
        assert_eq!(stats.min, 45000.0);
        assert_eq!(stats.max, 61000.0);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.total, 206000.0);
        assert_eq!(stats.trend, Some(Trend::Increasing));
    }

    #[test]
    fn population_std() {
        let stats = Statistics::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((stats.std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn odd_length_median_and_trend_skip_middle() {
        let stats = Statistics::from_values(&[10.0, 1.0, 100.0, 9.0, 10.0]);
        assert_eq!(stats.median, 10.0);
        // halves are [10, 1] and [9, 10]
        assert_eq!(stats.trend, Some(Trend::Increasing));
    }

    #[test]
    fn flat_and_decreasing() {
        assert_eq!(Statistics::from_values(&[100.0, 101.0, 100.0, 102.0]).trend, Some(Trend::Flat));
        assert_eq!(Statistics::from_values(&[9.0, 8.0, 3.0, 1.0]).trend, Some(Trend::Decreasing));
        assert_eq!(Statistics::from_values(&[1.0]).trend, None);
    }

    #[test]
    fn empty_values() {
        let stats = Statistics::from_values(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.trend, None);
    }

    #[test]
    fn relabel_ignores_length_mismatch() {
        let ds = Dataset::new(vec!["a".into(), "b".into()], vec![1.0, 2.0], Provenance::Synthetic);
        let ds = ds.relabeled(vec!["x".into()]);
        assert_eq!(ds.labels, vec!["a", "b"]);
    }
}
