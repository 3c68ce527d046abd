//! Pattern detection
//!
//! Computes a [`SeasonalProfile`] from a cleaned daily series: per-weekday
//! and per-month statistics, holiday shifts, and trend/seasonality strength
//! via additive decomposition with a centered moving average.

use crate::seasonal::holidays::is_holiday;
use crate::seasonal::profile::{
    BucketStats, HolidayEffects, MonthlyPattern, SeasonalProfile, TrendComponents,
    TrendDirection, WeeklyPattern,
};
use crate::stats;
use crate::time_series::TimeSeries;
use chrono::Datelike;
use std::hash::{Hash, Hasher};

const WEEKLY_STRENGTH_THRESHOLD: f64 = 0.3;
const MONTHLY_STRENGTH_THRESHOLD: f64 = 0.2;
const TREND_STRENGTH_THRESHOLD: f64 = 0.3;

const MIN_POINTS_WEEKLY: usize = 14;
const MIN_POINTS_MONTHLY: usize = 60;
const MIN_POINTS_HOLIDAY: usize = 30;
const MIN_POINTS_TREND: usize = 30;

/// Content hash of a series' shape and date range, used as the cache key
/// for profiles: same length plus same endpoints means same profile.
pub fn series_fingerprint(series: &TimeSeries) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    series.len().hash(&mut hasher);
    if let (Some(start), Some(end)) = (series.start(), series.end()) {
        start.hash(&mut hasher);
        end.hash(&mut hasher);
    }
    hasher.finish()
}

/// Detects seasonal patterns in an agent's cleaned history.
#[derive(Debug, Clone, Default)]
pub struct PatternDetector;

impl PatternDetector {
    pub fn new() -> Self {
        PatternDetector
    }

    /// Analyze `series` and return its seasonal profile. Patterns whose
    /// minimum history requirement is not met are simply absent.
    pub fn detect(&self, series: &TimeSeries) -> SeasonalProfile {
        let profile = SeasonalProfile {
            weekly: self.detect_weekly(series),
            monthly: self.detect_monthly(series),
            holidays: self.detect_holiday_effects(series),
            trend: self.detect_trend(series),
            fingerprint: series_fingerprint(series),
        };

        log::debug!(
            "pattern detection: weekly={} monthly={} holidays={} trend={}",
            profile.weekly.is_some(),
            profile.monthly.is_some(),
            profile.holidays.is_some(),
            profile.trend.is_some()
        );
        profile
    }

    fn detect_weekly(&self, series: &TimeSeries) -> Option<WeeklyPattern> {
        if series.len() < MIN_POINTS_WEEKLY {
            return None;
        }

        let mut per_day: [Vec<f64>; 7] = Default::default();
        for (date, value) in series.dates().iter().zip(series.values()) {
            per_day[date.weekday().num_days_from_monday() as usize].push(*value);
        }

        let weekday_stats = bucket_stats(&per_day);
        let day_means: Vec<f64> = weekday_stats
            .iter()
            .filter(|s| s.count > 0)
            .map(|s| s.mean)
            .collect();
        if day_means.is_empty() {
            return None;
        }
        let pattern_strength = stats::damped_cv(&day_means);

        let peak_day = argmax_mean(&weekday_stats);
        let low_day = argmin_mean(&weekday_stats);

        let weekday_means: Vec<f64> = weekday_stats[..5]
            .iter()
            .filter(|s| s.count > 0)
            .map(|s| s.mean)
            .collect();
        let weekend_means: Vec<f64> = weekday_stats[5..]
            .iter()
            .filter(|s| s.count > 0)
            .map(|s| s.mean)
            .collect();
        let weekday_avg = stats::mean(&weekday_means);
        let weekend_avg = stats::mean(&weekend_means);
        let weekend_effect = (weekend_avg - weekday_avg) / (weekday_avg + 0.1);

        Some(WeeklyPattern {
            weekday_stats,
            pattern_strength,
            peak_day,
            low_day,
            weekend_effect,
            has_strong_pattern: pattern_strength > WEEKLY_STRENGTH_THRESHOLD,
        })
    }

    fn detect_monthly(&self, series: &TimeSeries) -> Option<MonthlyPattern> {
        if series.len() < MIN_POINTS_MONTHLY {
            return None;
        }

        let mut per_month: [Vec<f64>; 12] = Default::default();
        let mut early_month = Vec::new();
        let mut late_month = Vec::new();
        for (date, value) in series.dates().iter().zip(series.values()) {
            per_month[date.month0() as usize].push(*value);
            if date.day() >= 25 {
                late_month.push(*value);
            } else if date.day() <= 10 {
                early_month.push(*value);
            }
        }

        let month_stats = bucket_stats(&per_month);
        let month_means: Vec<f64> = month_stats
            .iter()
            .filter(|s| s.count > 0)
            .map(|s| s.mean)
            .collect();
        if month_means.is_empty() {
            return None;
        }
        let seasonal_strength = stats::damped_cv(&month_means);

        let month_end_effect = if late_month.is_empty() || early_month.is_empty() {
            0.0
        } else {
            let early = stats::mean(&early_month);
            (stats::mean(&late_month) - early) / (early + 0.1)
        };

        let peak_month = argmax_mean(&month_stats) as u32 + 1;
        let low_month = argmin_mean(&month_stats) as u32 + 1;
        Some(MonthlyPattern {
            month_stats,
            seasonal_strength,
            peak_month,
            low_month,
            month_end_effect,
            has_seasonal_pattern: seasonal_strength > MONTHLY_STRENGTH_THRESHOLD,
        })
    }

    fn detect_holiday_effects(&self, series: &TimeSeries) -> Option<HolidayEffects> {
        if series.len() < MIN_POINTS_HOLIDAY {
            return None;
        }

        let mut holiday_values = Vec::new();
        let mut other_values = Vec::new();
        for (date, value) in series.dates().iter().zip(series.values()) {
            if is_holiday(*date) {
                holiday_values.push(*value);
            } else {
                other_values.push(*value);
            }
        }

        // The effect is only meaningful when the history actually contains
        // holiday dates.
        if holiday_values.is_empty() || other_values.is_empty() {
            return None;
        }

        let holiday_mean = stats::mean(&holiday_values);
        let baseline_mean = stats::mean(&other_values);
        Some(HolidayEffects {
            holiday_effect: (holiday_mean - baseline_mean) / (baseline_mean + 0.1),
            holiday_mean,
            baseline_mean,
        })
    }

    fn detect_trend(&self, series: &TimeSeries) -> Option<TrendComponents> {
        if series.len() < MIN_POINTS_TREND {
            return None;
        }

        let values = series.values();
        let period = 7usize.min(values.len() / 2).max(2);
        let trend = centered_moving_average(values, period);

        // Seasonal component: mean of the detrended values per cycle position
        let mut per_position: Vec<Vec<f64>> = vec![Vec::new(); period];
        for (i, value) in values.iter().enumerate() {
            per_position[i % period].push(value - trend[i]);
        }
        let position_means: Vec<f64> = per_position.iter().map(|v| stats::mean(v)).collect();

        let seasonal: Vec<f64> = (0..values.len())
            .map(|i| position_means[i % period])
            .collect();
        let residual: Vec<f64> = (0..values.len())
            .map(|i| values[i] - trend[i] - seasonal[i])
            .collect();

        let trend_plus_resid: Vec<f64> = (0..values.len())
            .map(|i| trend[i] + residual[i])
            .collect();
        let seasonal_plus_resid: Vec<f64> = (0..values.len())
            .map(|i| seasonal[i] + residual[i])
            .collect();

        let resid_var = stats::variance(&residual);
        let trend_strength = strength(resid_var, stats::variance(&trend_plus_resid));
        let seasonal_strength = strength(resid_var, stats::variance(&seasonal_plus_resid));

        let direction = match (trend.last(), trend.first()) {
            (Some(last), Some(first)) if last >= first => TrendDirection::Increasing,
            _ => TrendDirection::Decreasing,
        };

        Some(TrendComponents {
            trend_strength,
            seasonal_strength,
            direction,
            has_strong_trend: trend_strength > TREND_STRENGTH_THRESHOLD,
            has_strong_seasonality: seasonal_strength > TREND_STRENGTH_THRESHOLD,
        })
    }
}

fn strength(resid_var: f64, component_var: f64) -> f64 {
    if component_var <= f64::EPSILON {
        return 0.0;
    }
    (1.0 - resid_var / component_var).max(0.0)
}

/// Centered moving average with edge windows shrunk to what is available.
fn centered_moving_average(values: &[f64], period: usize) -> Vec<f64> {
    let half = period / 2;
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(values.len());
            stats::mean(&values[start..end])
        })
        .collect()
}

fn bucket_stats<const N: usize>(buckets: &[Vec<f64>; N]) -> [BucketStats; N] {
    let mut out: [BucketStats; N] = std::array::from_fn(|_| BucketStats::default());
    for (i, bucket) in buckets.iter().enumerate() {
        out[i] = BucketStats {
            mean: stats::mean(bucket),
            std: stats::std_dev(bucket),
            count: bucket.len(),
        };
    }
    out
}

fn argmax_mean(buckets: &[BucketStats]) -> usize {
    buckets
        .iter()
        .enumerate()
        .filter(|(_, s)| s.count > 0)
        .max_by(|(_, a), (_, b)| {
            a.mean
                .partial_cmp(&b.mean)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn argmin_mean(buckets: &[BucketStats]) -> usize {
    buckets
        .iter()
        .enumerate()
        .filter(|(_, s)| s.count > 0)
        .min_by(|(_, a), (_, b)| {
            a.mean
                .partial_cmp(&b.mean)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}
