//! Seasonal profile of an agent's history
//!
//! A [`SeasonalProfile`] holds the detected weekly/monthly/holiday/trend
//! effects and knows how to apply them: [`SeasonalProfile::adjust`] layers
//! multiplicative bucket factors over forecast values, and
//! [`SeasonalProfile::enhance_order`] sharpens a base model order when the
//! detected patterns warrant it.

use crate::forecasting::ModelOrder;
use crate::seasonal::holidays::is_holiday;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Mean/spread/count of observations falling into one calendar bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

/// Day-of-week effects. Indices run Monday = 0 through Sunday = 6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyPattern {
    pub weekday_stats: [BucketStats; 7],
    /// Coefficient of variation of the per-weekday means
    pub pattern_strength: f64,
    pub peak_day: usize,
    pub low_day: usize,
    /// Relative lift (or drop) of weekend vs weekday activity
    pub weekend_effect: f64,
    pub has_strong_pattern: bool,
}

/// Month-of-year effects. Indices run January = 0 through December = 11.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyPattern {
    pub month_stats: [BucketStats; 12],
    /// Coefficient of variation of the per-month means
    pub seasonal_strength: f64,
    /// 1-based peak month
    pub peak_month: u32,
    /// 1-based low month
    pub low_month: u32,
    /// Relative lift of end-of-month (day >= 25) vs early-month activity
    pub month_end_effect: f64,
    pub has_seasonal_pattern: bool,
}

/// Holiday vs non-holiday activity shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayEffects {
    pub holiday_effect: f64,
    pub holiday_mean: f64,
    pub baseline_mean: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

/// Strength of trend and seasonality from additive decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendComponents {
    pub trend_strength: f64,
    pub seasonal_strength: f64,
    pub direction: TrendDirection,
    pub has_strong_trend: bool,
    pub has_strong_seasonality: bool,
}

/// Everything the pattern detector learned from one agent's history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeasonalProfile {
    pub weekly: Option<WeeklyPattern>,
    pub monthly: Option<MonthlyPattern>,
    pub holidays: Option<HolidayEffects>,
    pub trend: Option<TrendComponents>,
    /// Content hash of the history the profile was computed from
    pub fingerprint: u64,
}

impl SeasonalProfile {
    /// Whether any pattern cleared its strength threshold.
    pub fn has_any_pattern(&self) -> bool {
        self.weekly
            .as_ref()
            .map(|w| w.has_strong_pattern)
            .unwrap_or(false)
            || self
                .monthly
                .as_ref()
                .map(|m| m.has_seasonal_pattern)
                .unwrap_or(false)
            || self.holidays.is_some()
    }

    /// Apply the detected patterns to forecast values.
    ///
    /// Each value is multiplied by its date's bucket factor (bucket mean over
    /// overall mean) for every pattern above threshold, weekly then monthly,
    /// then by the holiday and month-end shifts, and finally clipped to
    /// `[0, ceiling]` so composed multipliers cannot run away. Returns the
    /// adjusted values and the names of the adjustments applied.
    pub fn adjust(
        &self,
        values: &[f64],
        dates: &[NaiveDate],
        ceiling: f64,
    ) -> (Vec<f64>, Vec<String>) {
        let mut adjusted = values.to_vec();
        let mut applied = Vec::new();
        let n = adjusted.len().min(dates.len());

        if let Some(weekly) = &self.weekly {
            if weekly.has_strong_pattern {
                let overall = bucket_overall_mean(&weekly.weekday_stats);
                if overall > 0.0 {
                    for i in 0..n {
                        let stats =
                            &weekly.weekday_stats[dates[i].weekday().num_days_from_monday() as usize];
                        if stats.count > 0 {
                            adjusted[i] *= stats.mean / overall;
                        }
                    }
                    applied.push("weekly_pattern".to_string());
                }
            }
        }

        if let Some(monthly) = &self.monthly {
            if monthly.has_seasonal_pattern {
                let overall = bucket_overall_mean(&monthly.month_stats);
                if overall > 0.0 {
                    for i in 0..n {
                        let stats = &monthly.month_stats[dates[i].month0() as usize];
                        if stats.count > 0 {
                            adjusted[i] *= stats.mean / overall;
                        }
                    }
                    applied.push("monthly_pattern".to_string());
                }
            }
        }

        if let Some(holiday) = &self.holidays {
            let mut touched = false;
            for i in 0..n {
                if is_holiday(dates[i]) {
                    adjusted[i] *= 1.0 + holiday.holiday_effect;
                    touched = true;
                }
            }
            if touched {
                applied.push("holiday_effects".to_string());
            }
        }

        if let Some(monthly) = &self.monthly {
            // Ignore noise-level end-of-month shifts
            if monthly.month_end_effect.abs() > 0.05 {
                let mut touched = false;
                for i in 0..n {
                    if dates[i].day() >= 25 && !is_holiday(dates[i]) {
                        adjusted[i] *= 1.0 + monthly.month_end_effect;
                        touched = true;
                    }
                }
                if touched {
                    applied.push("month_end_effect".to_string());
                }
            }
        }

        for value in adjusted.iter_mut() {
            *value = value.clamp(0.0, ceiling);
        }

        (adjusted, applied)
    }

    /// Sharpen a base model order using the detected patterns: a strong
    /// weekly pattern forces a weekly seasonal component, a strong trend
    /// raises differencing, and strong decomposed seasonality switches
    /// seasonal differencing on.
    pub fn enhance_order(&self, base: ModelOrder) -> ModelOrder {
        let mut order = base;

        if let Some(weekly) = &self.weekly {
            if weekly.has_strong_pattern {
                order.s = 7;
                if order.sp == 0 {
                    order.sp = 1;
                }
                if order.sq == 0 {
                    order.sq = 1;
                }
                if weekly.pattern_strength > 0.5 {
                    order.sd = 1;
                }
            }
        }

        if let Some(trend) = &self.trend {
            if trend.has_strong_trend && trend.trend_strength > 0.7 {
                order.d = (order.d + 1).min(2);
            }
            if trend.seasonal_strength > 0.5 {
                order.sd = 1;
            }
        }

        order
    }
}

fn bucket_overall_mean(buckets: &[BucketStats]) -> f64 {
    let present: Vec<f64> = buckets
        .iter()
        .filter(|b| b.count > 0)
        .map(|b| b.mean)
        .collect();
    crate::stats::mean(&present)
}
