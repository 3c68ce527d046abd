//! Daily-row merge
//!
//! Combines the independent visit and revenue forecasts into one row per
//! future day, deriving the planning fields the business side reads:
//! confidence from interval width, resource recommendations and revenue
//! status from fixed thresholds, and Peak/Low/Normal period types from the
//! horizon-wide visit percentiles.

use crate::core::config::ForecastConfig;
use crate::stats;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Forecast vectors aligned to the prediction window, one slot per day.
#[derive(Debug, Clone)]
pub struct HorizonSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodType {
    Peak,
    Low,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevenueStatus {
    TargetMet,
    BelowTarget,
    Critical,
}

impl RevenueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueStatus::TargetMet => "Target met",
            RevenueStatus::BelowTarget => "Below target",
            RevenueStatus::Critical => "Critical - action required",
        }
    }
}

/// One merged day of the 365-day plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPlanRow {
    pub date: NaiveDate,
    pub weekday: String,
    pub month: u32,
    pub month_name: String,
    pub quarter: u32,
    pub day_of_year: u32,
    pub season: String,
    pub predicted_visits: f64,
    pub visits_lower: f64,
    pub visits_upper: f64,
    pub predicted_revenue: f64,
    pub revenue_lower: f64,
    pub revenue_upper: f64,
    pub confidence_level: ConfidenceLevel,
    pub resource_recommendation: String,
    pub revenue_status: RevenueStatus,
    pub period_type: PeriodType,
}

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES[(month as usize - 1).min(11)]
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn season(month: u32) -> &'static str {
    match month {
        12 | 1 | 2 => "Winter",
        3..=5 => "Spring",
        6..=8 => "Summer",
        _ => "Fall",
    }
}

fn confidence_level(interval_width: f64) -> ConfidenceLevel {
    if interval_width < 2.0 {
        ConfidenceLevel::High
    } else if interval_width < 4.0 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

fn resource_recommendation(visits: f64) -> &'static str {
    if visits > 12.0 {
        "High priority - allocate extra resources"
    } else if visits > 6.0 {
        "Medium priority - standard resources"
    } else if visits > 2.0 {
        "Low priority - minimal resources"
    } else {
        "Consider alternative strategies"
    }
}

fn revenue_status(revenue: f64, floor: f64) -> RevenueStatus {
    if revenue >= floor {
        RevenueStatus::TargetMet
    } else if revenue >= floor * 2.0 / 3.0 {
        RevenueStatus::BelowTarget
    } else {
        RevenueStatus::Critical
    }
}

/// Merge the visit horizon and the (possibly absent) revenue horizon into
/// daily plan rows. A missing revenue forecast is derived from visits times
/// the configured revenue-per-visit estimate.
pub fn merge_rows(
    config: &ForecastConfig,
    visits: &HorizonSeries,
    revenue: Option<&HorizonSeries>,
) -> Vec<DailyPlanRow> {
    let days = visits.dates.len();

    let peak_threshold = stats::quantile(&visits.values, 0.8);
    let low_threshold = stats::quantile(&visits.values, 0.2);

    let mut rows = Vec::with_capacity(days);
    for i in 0..days {
        let date = visits.dates[i];
        let predicted_visits = visits.values[i];

        let (predicted_revenue, revenue_lower, revenue_upper) = match revenue {
            Some(series) if i < series.values.len() => {
                (series.values[i], series.lower[i], series.upper[i])
            }
            _ => (
                predicted_visits * config.revenue_per_visit,
                visits.lower[i] * config.revenue_per_visit,
                visits.upper[i] * config.revenue_per_visit,
            ),
        };

        let period_type = if predicted_visits >= peak_threshold {
            PeriodType::Peak
        } else if predicted_visits <= low_threshold {
            PeriodType::Low
        } else {
            PeriodType::Normal
        };

        rows.push(DailyPlanRow {
            date,
            weekday: weekday_name(date.weekday()).to_string(),
            month: date.month(),
            month_name: month_name(date.month()).to_string(),
            quarter: (date.month0() / 3) + 1,
            day_of_year: date.ordinal(),
            season: season(date.month()).to_string(),
            predicted_visits,
            visits_lower: visits.lower[i],
            visits_upper: visits.upper[i],
            predicted_revenue,
            revenue_lower,
            revenue_upper,
            confidence_level: confidence_level(visits.upper[i] - visits.lower[i]),
            resource_recommendation: resource_recommendation(predicted_visits).to_string(),
            revenue_status: revenue_status(predicted_revenue, config.min_revenue),
            period_type,
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn horizon(start: NaiveDate, values: Vec<f64>, half_width: f64) -> HorizonSeries {
        let dates: Vec<NaiveDate> = (0..values.len() as i64)
            .map(|i| start + Duration::days(i))
            .collect();
        let lower = values.iter().map(|v| (v - half_width).max(0.0)).collect();
        let upper = values.iter().map(|v| v + half_width).collect();
        HorizonSeries {
            dates,
            values,
            lower,
            upper,
        }
    }

    #[test]
    fn test_missing_revenue_derived_from_visits() {
        let config = ForecastConfig::default();
        let visits = horizon(date(2025, 1, 1), vec![4.0, 8.0], 0.5);
        let rows = merge_rows(&config, &visits, None);

        assert_eq!(rows[0].predicted_revenue, 4.0 * config.revenue_per_visit);
        assert_eq!(rows[1].predicted_revenue, 8.0 * config.revenue_per_visit);
    }

    #[test]
    fn test_confidence_from_interval_width() {
        let config = ForecastConfig::default();
        let narrow = merge_rows(&config, &horizon(date(2025, 1, 1), vec![5.0], 0.5), None);
        assert_eq!(narrow[0].confidence_level, ConfidenceLevel::High);

        let medium = merge_rows(&config, &horizon(date(2025, 1, 1), vec![5.0], 1.5), None);
        assert_eq!(medium[0].confidence_level, ConfidenceLevel::Medium);

        let wide = merge_rows(&config, &horizon(date(2025, 1, 1), vec![5.0], 3.0), None);
        assert_eq!(wide[0].confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_resource_recommendation_thresholds() {
        assert_eq!(
            resource_recommendation(14.0),
            "High priority - allocate extra resources"
        );
        assert_eq!(
            resource_recommendation(8.0),
            "Medium priority - standard resources"
        );
        assert_eq!(
            resource_recommendation(3.0),
            "Low priority - minimal resources"
        );
        assert_eq!(resource_recommendation(1.0), "Consider alternative strategies");
    }

    #[test]
    fn test_revenue_status_thresholds() {
        assert_eq!(revenue_status(150.0, 150.0), RevenueStatus::TargetMet);
        assert_eq!(revenue_status(120.0, 150.0), RevenueStatus::BelowTarget);
        assert_eq!(revenue_status(50.0, 150.0), RevenueStatus::Critical);
    }

    #[test]
    fn test_period_type_from_percentiles() {
        let config = ForecastConfig::default();
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let rows = merge_rows(&config, &horizon(date(2025, 1, 1), values, 0.5), None);

        // 80th percentile is 8.2, 20th is 2.8
        assert_eq!(rows[9].period_type, PeriodType::Peak);
        assert_eq!(rows[0].period_type, PeriodType::Low);
        assert_eq!(rows[5].period_type, PeriodType::Normal);
    }

    #[test]
    fn test_calendar_fields() {
        let config = ForecastConfig::default();
        let rows = merge_rows(
            &config,
            &horizon(date(2025, 7, 14), vec![5.0], 0.5),
            None,
        );
        let row = &rows[0];
        assert_eq!(row.weekday, "Monday");
        assert_eq!(row.month_name, "July");
        assert_eq!(row.quarter, 3);
        assert_eq!(row.season, "Summer");
        assert_eq!(row.day_of_year, 195);
    }
}
