//! Business-constrained forecasting
//!
//! Wraps the raw SARIMA output in the guardrails the planning side needs:
//! bounds per prediction kind, a revenue floor, seasonal adjustment from the
//! detected profile, intervals that never collapse, and a 0-100 quality
//! score that summarizes how trustworthy the numbers are.

use crate::core::config::ForecastConfig;
use crate::core::error::Result;
use crate::forecasting::sarima::{FitMetrics, SarimaModel};
use crate::forecasting::ModelOrder;
use crate::seasonal::SeasonalProfile;
use crate::time_series::TimeSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What a forecast counts, which decides the bounds applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionKind {
    Visits,
    Quantity,
    Deliveries,
    Revenue,
}

impl PredictionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionKind::Visits => "visits",
            PredictionKind::Quantity => "quantity",
            PredictionKind::Deliveries => "deliveries",
            PredictionKind::Revenue => "revenue",
        }
    }
}

/// A constrained, optionally seasonally-adjusted forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub kind: PredictionKind,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// 0-100, higher is better
    pub quality_score: f64,
    pub constraints_applied: bool,
    /// Names of the seasonal adjustments that were applied
    pub adjustments: Vec<String>,
    /// In-sample evaluation of the underlying model
    pub fit: FitMetrics,
    /// Index of a day pinned to an exact target value, if any
    pub pinned: Option<usize>,
}

impl Forecast {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        crate::stats::mean(&self.values)
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Override the closest forecast day with an exact target value,
    /// shrinking its interval to a quarter of its previous range. Used when
    /// a delivery is already committed for a date.
    pub fn pin(&mut self, date: NaiveDate, value: f64) {
        let Some(index) = self
            .dates
            .iter()
            .enumerate()
            .min_by_key(|(_, d)| (**d - date).num_days().abs())
            .map(|(i, _)| i)
        else {
            return;
        };

        // Shrink the interval to a quarter of its previous range
        let half_width = (self.upper[index] - self.lower[index]) / 8.0;
        self.values[index] = value;
        self.lower[index] = (value - half_width).max(0.0);
        self.upper[index] = value + half_width;
        self.pinned = Some(index);
    }
}

/// Result of checking a revenue forecast against the configured floor.
///
/// Falling short is a reported business condition, not an error: the check
/// always produces a usable summary with a shortfall and recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueCheck {
    pub meets_constraint: bool,
    /// Unmet amount of average daily revenue versus the floor
    pub shortfall: f64,
    pub days_below_floor: usize,
    pub recommendations: Vec<String>,
}

/// Produces business-usable forecasts from prepared series.
#[derive(Debug, Clone)]
pub struct BusinessForecaster<'a> {
    config: &'a ForecastConfig,
}

impl<'a> BusinessForecaster<'a> {
    pub fn new(config: &'a ForecastConfig) -> Self {
        BusinessForecaster { config }
    }

    /// Fit `order` on `series` and produce a constrained forecast of
    /// `horizon` steps.
    ///
    /// A fit failure of the selected order degrades to a plain AR(1) fit
    /// rather than propagating; the heuristic chain ends at an order that
    /// fits any two-point series.
    pub fn forecast(
        &self,
        series: &TimeSeries,
        order: ModelOrder,
        horizon: usize,
        kind: PredictionKind,
        profile: Option<&SeasonalProfile>,
    ) -> Result<Forecast> {
        let fitted = match SarimaModel::new(order).fit(series) {
            Ok(fitted) => fitted,
            Err(err) => {
                log::warn!(
                    "{} failed to fit ({}); degrading to AR(1)",
                    order,
                    err
                );
                SarimaModel::new(ModelOrder::new(1, 0, 0, 0, 0, 0, order.s)).fit(series)?
            }
        };
        let fit = fitted.fit_metrics(series);
        let raw = fitted.forecast(horizon)?;

        let (min_bound, max_bound) = self.bounds(kind);
        let mut values: Vec<f64> = raw
            .values
            .iter()
            .map(|v| v.clamp(min_bound, max_bound))
            .collect();
        let mut lower: Vec<f64> = raw
            .lower
            .iter()
            .map(|v| v.clamp(min_bound, max_bound))
            .collect();
        let mut upper: Vec<f64> = raw
            .upper
            .iter()
            .map(|v| v.clamp(min_bound, max_bound))
            .collect();

        // Seasonal adjustment applies to count-like forecasts; a revenue
        // series carries its own seasonal shape through the model.
        let mut adjustments = Vec::new();
        if kind != PredictionKind::Revenue {
            if let Some(profile) = profile {
                let (adjusted, applied) =
                    profile.adjust(&values, &raw.dates, self.config.adjustment_ceiling);
                if !applied.is_empty() {
                    log::info!("seasonal adjustments applied: {}", applied.join(", "));
                    values = adjusted
                        .into_iter()
                        .map(|v| v.clamp(min_bound, max_bound))
                        .collect();
                    adjustments = applied;
                }
            }
        }

        // Re-establish intervals: never collapsed below +/- 0.5 around the
        // point value, still inside the kind's bounds.
        for i in 0..values.len() {
            lower[i] = lower[i].min(values[i] - 0.5).max(min_bound);
            upper[i] = upper[i].max(values[i] + 0.5).min(max_bound);
            values[i] = round1(values[i]);
            lower[i] = round1(lower[i].min(values[i]));
            upper[i] = round1(upper[i].max(values[i]));
        }

        let quality_score = self.quality_score(&values, &lower, &upper, kind);
        log::info!(
            "{} forecast: {} steps, quality {:.1}/100",
            kind.as_str(),
            horizon,
            quality_score
        );

        Ok(Forecast {
            kind,
            dates: raw.dates,
            values,
            lower,
            upper,
            quality_score,
            constraints_applied: true,
            adjustments,
            fit,
            pinned: None,
        })
    }

    /// Value bounds per prediction kind. Revenue floors at the configured
    /// minimum and is unbounded above.
    fn bounds(&self, kind: PredictionKind) -> (f64, f64) {
        match kind {
            PredictionKind::Visits => (
                self.config.min_visits_per_day,
                self.config.max_visits_per_day,
            ),
            PredictionKind::Quantity => (
                self.config.min_quantity,
                self.config.max_quantity_per_client,
            ),
            PredictionKind::Deliveries => (0.0, self.config.max_visits_per_day * 1.5),
            PredictionKind::Revenue => (self.config.min_revenue, f64::INFINITY),
        }
    }

    /// Blend interval width, stability, realism and revenue-floor
    /// compliance into one 0-100 score (weights 30/25/25/20).
    fn quality_score(
        &self,
        values: &[f64],
        lower: &[f64],
        upper: &[f64],
        kind: PredictionKind,
    ) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mean = crate::stats::mean(values);

        let widths: Vec<f64> = upper.iter().zip(lower).map(|(u, l)| u - l).collect();
        let relative_width = crate::stats::mean(&widths) / (mean + 0.1);
        let ci_score = (100.0 - relative_width * 50.0).max(0.0);

        let stability_score = if mean > 0.0 {
            let cv = crate::stats::std_dev(values) / mean;
            (100.0 - cv * 100.0).max(0.0)
        } else {
            50.0
        };

        let mut realism_score: f64 = 100.0;
        if values.iter().any(|v| *v < 0.0) {
            realism_score -= 30.0;
        }
        let implausible = match kind {
            PredictionKind::Revenue => f64::INFINITY,
            _ => self.config.adjustment_ceiling,
        };
        if values.iter().any(|v| *v > implausible) {
            realism_score -= 20.0;
        }

        let mut revenue_score: f64 = 100.0;
        if self.config.min_revenue > 0.0 {
            let below_floor = values.iter().any(|v| {
                let daily_revenue = match kind {
                    PredictionKind::Revenue => *v,
                    _ => *v * self.config.revenue_per_visit,
                };
                daily_revenue < self.config.min_revenue
            });
            if below_floor {
                revenue_score -= 25.0;
            }
        }

        (ci_score * 0.30 + stability_score * 0.25 + realism_score * 0.25 + revenue_score * 0.20)
            .clamp(0.0, 100.0)
    }

    /// Check daily revenue values against the configured floor.
    pub fn validate_revenue(&self, daily_revenue: &[f64]) -> RevenueCheck {
        let floor = self.config.min_revenue;
        let average = crate::stats::mean(daily_revenue);
        let days_below_floor = daily_revenue.iter().filter(|v| **v < floor).count();
        let shortfall = (floor - average).max(0.0);
        let meets_constraint = shortfall <= 0.0;

        let mut recommendations = Vec::new();
        if meets_constraint {
            recommendations
                .push("Forecast revenue clears the configured daily floor".to_string());
        } else {
            let additional_visits =
                (shortfall / self.config.revenue_per_visit).ceil() as u64;
            recommendations.push(format!(
                "Average daily revenue {:.2} falls short of the {:.2} floor by {:.2}",
                average, floor, shortfall
            ));
            if days_below_floor > 0 {
                recommendations.push(format!(
                    "{} day(s) fall below the minimum revenue",
                    days_below_floor
                ));
            }
            recommendations.push(format!(
                "Schedule about {} additional visit(s) per day to close the gap",
                additional_visits.max(1)
            ));
            recommendations
                .push("Prioritize high-value clients and premium products".to_string());
            log::warn!(
                "revenue floor not met: average {:.2} vs floor {:.2}",
                average,
                floor
            );
        }

        RevenueCheck {
            meets_constraint,
            shortfall,
            days_below_floor,
            recommendations,
        }
    }
}

fn round1(value: f64) -> f64 {
    if value.is_finite() {
        (value * 10.0).round() / 10.0
    } else {
        value
    }
}
