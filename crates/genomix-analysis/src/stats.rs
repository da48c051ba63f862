//! Descriptive statistics over gene lengths and GC percentages.

use genomix_core::rounding::round2_serialize;
use serde::{Deserialize, Serialize};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Middle value, or the average of the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (N - 1 divisor). Zero for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthStats {
    #[serde(serialize_with = "round2_serialize")]
    pub mean: f64,
    #[serde(serialize_with = "round2_serialize")]
    pub median: f64,
    pub min: usize,
    pub max: usize,
    #[serde(serialize_with = "round2_serialize")]
    pub stdev: f64,
}

impl LengthStats {
    pub fn from_lengths(lengths: &[usize]) -> Option<Self> {
        let values: Vec<f64> = lengths.iter().map(|l| *l as f64).collect();
        Some(Self {
            mean: mean(&values)?,
            median: median(&values)?,
            min: *lengths.iter().min()?,
            max: *lengths.iter().max()?,
            stdev: sample_stdev(&values),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcStats {
    #[serde(serialize_with = "round2_serialize")]
    pub mean: f64,
    #[serde(serialize_with = "round2_serialize")]
    pub median: f64,
    #[serde(serialize_with = "round2_serialize")]
    pub min: f64,
    #[serde(serialize_with = "round2_serialize")]
    pub max: f64,
}

impl GcStats {
    pub fn from_percentages(values: &[f64]) -> Option<Self> {
        let (min, max) = min_max(values)?;
        Some(Self {
            mean: mean(values)?,
            median: median(values)?,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrandDistribution {
    pub forward: usize,
    pub reverse: usize,
    #[serde(serialize_with = "round2_serialize")]
    pub forward_percent: f64,
    #[serde(serialize_with = "round2_serialize")]
    pub reverse_percent: f64,
}

impl StrandDistribution {
    pub fn new(forward: usize, reverse: usize) -> Self {
        let total = forward + reverse;
        let percent = |n: usize| {
            if total == 0 {
                0.0
            } else {
                n as f64 / total as f64 * 100.0
            }
        };
        Self {
            forward,
            reverse,
            forward_percent: percent(forward),
            reverse_percent: percent(reverse),
        }
    }
}

/// Histogram with fixed-width bins starting at zero. `bins[i]` is the lower
/// edge of bin `i`; values past the last edge land in the last bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthDistribution {
    pub bins: Vec<usize>,
    pub counts: Vec<usize>,
    pub bin_size: usize,
}

impl LengthDistribution {
    pub fn from_lengths(lengths: &[usize], bin_size: usize) -> Self {
        let bin_size = bin_size.max(1);
        let max_length = lengths.iter().copied().max().unwrap_or(0);
        let n_bins = (max_length + bin_size).div_ceil(bin_size);

        let bins: Vec<usize> = (0..n_bins).map(|i| i * bin_size).collect();
        let mut counts = vec![0; n_bins];
        for length in lengths {
            let idx = (length / bin_size).min(n_bins - 1);
            counts[idx] += 1;
        }

        Self {
            bins,
            counts,
            bin_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_median() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 6.0]), Some(3.0));
        assert_eq!(median(&[6.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_stdev_single_value_is_zero() {
        assert_eq!(sample_stdev(&[1234.0]), 0.0);
        assert_eq!(sample_stdev(&[]), 0.0);
    }

    #[test]
    fn test_stdev_sample_divisor() {
        // mean 5, squared deviations sum to 32, /7
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_stdev(&values) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_length_stats() {
        let stats = LengthStats::from_lengths(&[300, 900, 600]).unwrap();
        assert_eq!(stats.mean, 600.0);
        assert_eq!(stats.median, 600.0);
        assert_eq!(stats.min, 300);
        assert_eq!(stats.max, 900);
        assert_eq!(stats.stdev, 300.0);
        assert!(LengthStats::from_lengths(&[]).is_none());
    }

    #[test]
    fn test_strand_distribution() {
        let dist = StrandDistribution::new(3, 1);
        assert_eq!(dist.forward_percent, 75.0);
        assert_eq!(dist.reverse_percent, 25.0);
        assert_eq!(StrandDistribution::new(0, 0).forward_percent, 0.0);
    }

    #[test]
    fn test_length_distribution() {
        let dist = LengthDistribution::from_lengths(&[30, 150, 199, 200], 100);
        assert_eq!(dist.bins, vec![0, 100, 200]);
        assert_eq!(dist.counts, vec![1, 2, 1]);

        let empty = LengthDistribution::from_lengths(&[], 100);
        assert_eq!(empty.bins, vec![0]);
        assert_eq!(empty.counts, vec![0]);
    }
}
