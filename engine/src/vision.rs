//! Pen head-count aggregation.
//!
//! Several cameras watch the same pen and each reports its own count. The
//! functions here fold those readings into one number and score how much the
//! readings agree. They are total: empty or short inputs have defined results
//! and nothing panics.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Camera identifier as assigned by the farm's camera registry.
pub type CameraId = u32;

/// How concurrent camera counts are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationRule {
    /// Median of all readings
    #[default]
    Median,
    /// Highest reading; occlusion only ever hides animals
    Max,
    /// The designated primary camera's reading
    Principal,
}

impl AggregationRule {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationRule::Median => "median",
            AggregationRule::Max => "max",
            AggregationRule::Principal => "principal",
        }
    }
}

impl fmt::Display for AggregationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "median" => Ok(AggregationRule::Median),
            "max" => Ok(AggregationRule::Max),
            "principal" => Ok(AggregationRule::Principal),
            _ => Err(Error::UnknownVariant {
                kind: "aggregation rule",
                value: s.to_string(),
            }),
        }
    }
}

/// One camera's momentary count reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraCountSample {
    pub camera_id: CameraId,
    pub count: u32,
    /// Detector confidence in `0..=1`, when the camera reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl CameraCountSample {
    pub fn new(camera_id: CameraId, count: u32) -> Self {
        Self {
            camera_id,
            count,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Combine concurrent camera counts into one herd count.
///
/// Empty input yields 0 for every rule. For `Principal`, an out-of-range or
/// missing `primary_index` falls back to the first reading.
pub fn aggregate_pen_count(
    counts: &[u32],
    rule: AggregationRule,
    primary_index: Option<usize>,
) -> u32 {
    if counts.is_empty() {
        return 0;
    }

    match rule {
        AggregationRule::Median => median(counts),
        AggregationRule::Max => counts.iter().copied().max().unwrap_or(0),
        AggregationRule::Principal => primary_index
            .and_then(|i| counts.get(i))
            .copied()
            .unwrap_or(counts[0]),
    }
}

/// Median with even-length inputs resolved to the rounded mean of the two
/// central values (halves round up).
fn median(counts: &[u32]) -> u32 {
    let mut sorted = counts.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        let sum = u64::from(sorted[mid - 1]) + u64::from(sorted[mid]);
        ((sum + 1) / 2) as u32
    }
}

/// Trailing simple moving average over the last `window_size` readings,
/// rounded to the nearest integer. A window of 0 is treated as 1.
pub fn smooth_count(counts: &[u32], window_size: usize) -> u32 {
    if counts.is_empty() {
        return 0;
    }

    let window = window_size.max(1);
    let tail = &counts[counts.len().saturating_sub(window)..];
    let sum: u64 = tail.iter().map(|&c| u64::from(c)).sum();
    let len = tail.len() as u64;

    ((2 * sum + len) / (2 * len)) as u32
}

/// Agreement score in `[0, 1]`: one minus the coefficient of variation.
///
/// Fewer than two readings, or an all-zero series, score 1.0.
pub fn calculate_confidence(counts: &[u32]) -> f64 {
    if counts.len() < 2 {
        return 1.0;
    }

    let n = counts.len() as f64;
    let mean = counts.iter().map(|&c| f64::from(c)).sum::<f64>() / n;
    let variance = counts
        .iter()
        .map(|&c| (f64::from(c) - mean).powi(2))
        .sum::<f64>()
        / n;

    let relative_std_dev = if mean > 0.0 {
        variance.sqrt() / mean
    } else {
        0.0
    };

    (1.0 - relative_std_dev).clamp(0.0, 1.0)
}

/// Confidence-weighted mean of camera counts.
///
/// Samples without a confidence weigh 1.0; confidences are clamped to
/// `[0, 1]`. If every weight is zero the plain mean is returned.
pub fn weighted_count(samples: &[CameraCountSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let weight = |s: &CameraCountSample| {
        s.confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(1.0)
    };

    let total_weight: f64 = samples.iter().map(weight).sum();
    if total_weight <= 0.0 {
        let sum: f64 = samples.iter().map(|s| f64::from(s.count)).sum();
        return Some(sum / samples.len() as f64);
    }

    let weighted: f64 = samples
        .iter()
        .map(|s| f64::from(s.count) * weight(s))
        .sum();
    Some(weighted / total_weight)
}

/// The trusted count for a pen at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenCountSummary {
    /// Aggregated head count
    pub count: u32,
    /// Rule used to aggregate
    pub rule: AggregationRule,
    /// How well the cameras agree, see [`calculate_confidence`]
    pub agreement: f64,
    /// Mean detector confidence over cameras that reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_confidence: Option<f64>,
    /// Number of readings combined
    pub cameras: usize,
}

/// Aggregate a set of camera samples for one pen.
///
/// `primary_camera` selects the reading used by [`AggregationRule::Principal`].
pub fn summarize_pen(
    samples: &[CameraCountSample],
    rule: AggregationRule,
    primary_camera: Option<CameraId>,
) -> PenCountSummary {
    let counts: Vec<u32> = samples.iter().map(|s| s.count).collect();
    let primary_index =
        primary_camera.and_then(|id| samples.iter().position(|s| s.camera_id == id));

    let reported: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.confidence)
        .filter(|c| c.is_finite())
        .collect();
    let detection_confidence = if reported.is_empty() {
        None
    } else {
        Some(reported.iter().sum::<f64>() / reported.len() as f64)
    };

    PenCountSummary {
        count: aggregate_pen_count(&counts, rule, primary_index),
        rule,
        agreement: calculate_confidence(&counts),
        detection_confidence,
        cameras: samples.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd() {
        assert_eq!(
            aggregate_pen_count(&[45, 48, 42, 50, 47], AggregationRule::Median, None),
            47
        );
        assert_eq!(
            aggregate_pen_count(&[42, 45, 47, 48, 50], AggregationRule::Median, None),
            47
        );
    }

    #[test]
    fn median_even_rounds_mean_of_central_pair() {
        assert_eq!(
            aggregate_pen_count(&[45, 47, 44, 46], AggregationRule::Median, None),
            46
        );
        assert_eq!(
            aggregate_pen_count(&[10, 11], AggregationRule::Median, None),
            11
        );
        assert_eq!(
            aggregate_pen_count(&[45, 47], AggregationRule::Median, None),
            46
        );
    }

    #[test]
    fn max_rule() {
        assert_eq!(
            aggregate_pen_count(&[45, 48, 42, 50, 47], AggregationRule::Max, None),
            50
        );
    }

    #[test]
    fn principal_rule() {
        let counts = [45, 48, 42, 50];
        assert_eq!(
            aggregate_pen_count(&counts, AggregationRule::Principal, Some(2)),
            42
        );
        assert_eq!(
            aggregate_pen_count(&counts, AggregationRule::Principal, Some(9)),
            45
        );
        assert_eq!(
            aggregate_pen_count(&counts, AggregationRule::Principal, None),
            45
        );
    }

    #[test]
    fn empty_input_is_zero_for_every_rule() {
        for rule in [
            AggregationRule::Median,
            AggregationRule::Max,
            AggregationRule::Principal,
        ] {
            assert_eq!(aggregate_pen_count(&[], rule, Some(0)), 0);
        }
    }

    #[test]
    fn smoothing() {
        assert_eq!(smooth_count(&[45, 46, 44, 47, 45, 100], 5), 56);
        assert_eq!(smooth_count(&[40, 41], 5), 41);
        assert_eq!(smooth_count(&[], 5), 0);
        assert_eq!(smooth_count(&[3, 9], 0), 9);
    }

    #[test]
    fn confidence_consistent_vs_noisy() {
        assert!(calculate_confidence(&[45, 45, 46, 45, 44]) > 0.9);
        assert!(calculate_confidence(&[10, 50, 20, 80, 30]) < 0.5);
    }

    #[test]
    fn confidence_edge_cases() {
        assert_eq!(calculate_confidence(&[]), 1.0);
        assert_eq!(calculate_confidence(&[12]), 1.0);
        assert_eq!(calculate_confidence(&[0, 0, 0]), 1.0);
        assert_eq!(calculate_confidence(&[0, 100]), 0.0);
    }

    #[test]
    fn weighted_by_confidence() {
        let samples = [
            CameraCountSample::new(1, 45).with_confidence(0.95),
            CameraCountSample::new(2, 50).with_confidence(0.60),
        ];
        let avg = weighted_count(&samples).unwrap();
        assert!((avg - 46.94).abs() < 0.01);

        assert!(weighted_count(&[]).is_none());

        let zero = [
            CameraCountSample::new(1, 10).with_confidence(0.0),
            CameraCountSample::new(2, 20).with_confidence(0.0),
        ];
        assert_eq!(weighted_count(&zero), Some(15.0));
    }

    #[test]
    fn pen_summary() {
        let samples = [
            CameraCountSample::new(1, 45).with_confidence(0.95),
            CameraCountSample::new(2, 47).with_confidence(0.92),
            CameraCountSample::new(3, 44).with_confidence(0.88),
            CameraCountSample::new(4, 46).with_confidence(0.91),
        ];

        let summary = summarize_pen(&samples, AggregationRule::Median, None);
        assert_eq!(summary.count, 46);
        assert_eq!(summary.cameras, 4);
        assert!(summary.agreement > 0.95);
        assert!((summary.detection_confidence.unwrap() - 0.915).abs() < 1e-9);

        let principal = summarize_pen(&samples, AggregationRule::Principal, Some(3));
        assert_eq!(principal.count, 44);
    }

    #[test]
    fn rule_parsing() {
        assert_eq!(
            "MAX".parse::<AggregationRule>().unwrap(),
            AggregationRule::Max
        );
        assert!("mean".parse::<AggregationRule>().is_err());
        assert_eq!(AggregationRule::default(), AggregationRule::Median);
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_max_is_member(counts in prop::collection::vec(0u32..10_000, 1..50)) {
                let result = aggregate_pen_count(&counts, AggregationRule::Max, None);
                prop_assert_eq!(Some(result), counts.iter().copied().max());
                prop_assert!(counts.contains(&result));
            }

            #[test]
            fn prop_median_within_bounds(counts in prop::collection::vec(0u32..10_000, 1..50)) {
                let result = aggregate_pen_count(&counts, AggregationRule::Median, None);
                let min = *counts.iter().min().unwrap();
                let max = *counts.iter().max().unwrap();
                prop_assert!(result >= min && result <= max);
            }

            #[test]
            fn prop_confidence_in_unit_interval(counts in prop::collection::vec(0u32..10_000, 0..50)) {
                let confidence = calculate_confidence(&counts);
                prop_assert!((0.0..=1.0).contains(&confidence));
            }

            #[test]
            fn prop_smoothing_within_window_bounds(
                counts in prop::collection::vec(0u32..10_000, 1..50),
                window in 1usize..20,
            ) {
                let result = smooth_count(&counts, window);
                let tail = &counts[counts.len().saturating_sub(window)..];
                prop_assert!(result >= *tail.iter().min().unwrap());
                prop_assert!(result <= *tail.iter().max().unwrap());
            }
        }
    }
}
