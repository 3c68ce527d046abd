//! Descriptive statistics helpers
//!
//! Small numeric building blocks shared by series preparation, pattern
//! detection and model scoring. All functions operate on plain `f64` slices.

use crate::core::error::{Error, Result};

/// Summary statistics for a numeric sample.
#[derive(Debug, Clone)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    /// Standard deviation (unbiased estimator)
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Arithmetic mean; zero for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population variance; zero for an empty slice.
pub fn variance(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|v| (v - m).powi(2)).sum::<f64>() / data.len() as f64
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    variance(data).sqrt()
}

/// Coefficient of variation with a damped denominator, the pattern-strength
/// measure used throughout seasonal detection.
pub fn damped_cv(data: &[f64]) -> f64 {
    std_dev(data) / (mean(data) + 0.1)
}

/// Compute summary statistics for a sample.
pub fn describe(data: &[f64]) -> Result<DescriptiveStats> {
    if data.is_empty() {
        return Err(Error::InsufficientData(
            "describe requires at least one observation".to_string(),
        ));
    }

    let count = data.len();
    let m = mean(data);
    let std = if count > 1 {
        let sum_squared_diff = data.iter().map(|&x| (x - m).powi(2)).sum::<f64>();
        (sum_squared_diff / (count - 1) as f64).sqrt()
    } else {
        0.0
    };

    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Ok(DescriptiveStats {
        count,
        mean: m,
        std,
        min: sorted[0],
        q1: percentile_sorted(&sorted, 0.25),
        median: percentile_sorted(&sorted, 0.5),
        q3: percentile_sorted(&sorted, 0.75),
        max: sorted[count - 1],
    })
}

/// Linear-interpolated percentile of already-sorted data, `p` in [0, 1].
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let idx = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let weight_hi = idx - lo as f64;
    sorted[lo] * (1.0 - weight_hi) + sorted[hi] * weight_hi
}

/// Percentile of unsorted data.
pub fn quantile(data: &[f64], p: f64) -> f64 {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    percentile_sorted(&sorted, p)
}

/// Pearson correlation coefficient between two equally-long samples.
pub fn correlation(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(Error::DimensionMismatch(format!(
            "correlation inputs differ in length: x={}, y={}",
            x.len(),
            y.len()
        )));
    }
    if x.len() <= 1 {
        return Err(Error::InsufficientData(
            "correlation requires at least two observations".to_string(),
        ));
    }

    let mean_x = mean(x);
    let mean_y = mean(y);

    let numerator: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| (xi - mean_x) * (yi - mean_y))
        .sum();
    let sum_sq_x: f64 = x.iter().map(|&xi| (xi - mean_x).powi(2)).sum();
    let sum_sq_y: f64 = y.iter().map(|&yi| (yi - mean_y).powi(2)).sum();

    let denominator = (sum_sq_x * sum_sq_y).sqrt();
    if denominator.abs() < f64::EPSILON {
        return Err(Error::Computation(
            "correlation undefined for zero-variance input".to_string(),
        ));
    }

    Ok(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let stats = describe(&data).unwrap();

        assert_eq!(stats.count, 5);
        assert!((stats.mean - 3.0).abs() < 1e-10);
        assert!((stats.std - 1.5811388300841898).abs() < 1e-10);
        assert!((stats.min - 1.0).abs() < 1e-10);
        assert!((stats.max - 5.0).abs() < 1e-10);
        assert!((stats.median - 3.0).abs() < 1e-10);
        assert!((stats.q1 - 2.0).abs() < 1e-10);
        assert!((stats.q3 - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_describe_empty() {
        let data: Vec<f64> = vec![];
        assert!(describe(&data).is_err());
    }

    #[test]
    fn test_quantile_interpolates() {
        let data = vec![4.0, 1.0, 3.0, 2.0];
        assert!((quantile(&data, 0.5) - 2.5).abs() < 1e-10);
        assert!((quantile(&data, 0.0) - 1.0).abs() < 1e-10);
        assert!((quantile(&data, 1.0) - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_correlation() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let corr = correlation(&x, &y).unwrap();
        assert!((corr - 1.0).abs() < 1e-10);

        let y_neg = vec![5.0, 4.0, 3.0, 2.0, 1.0];
        let corr_neg = correlation(&x, &y_neg).unwrap();
        assert!((corr_neg + 1.0).abs() < 1e-10);

        let y_flat = vec![3.0, 3.0, 3.0, 3.0, 3.0];
        assert!(correlation(&x, &y_flat).is_err());
    }

    #[test]
    fn test_damped_cv_flat_series_is_zero() {
        let data = vec![5.0; 10];
        assert!(damped_cv(&data).abs() < 1e-10);
    }
}
