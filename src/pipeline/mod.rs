//! Dual-horizon orchestration
//!
//! Drives the whole pipeline twice (visits, then revenue) over a 365-day
//! trailing training window and a 365-day forward horizon, then merges both
//! forecasts into one plan with rollups and insights. The run is a strict
//! state machine; the only way it ends without a plan is insufficient
//! training data.

pub mod merge;
pub mod summary;

pub use merge::{ConfidenceLevel, DailyPlanRow, HorizonSeries, PeriodType, RevenueStatus};
pub use summary::{
    eligible_agents, AgentActivity, DayHighlight, Insights, PeriodSummary, SummaryTotals,
};

use crate::core::config::ForecastConfig;
use crate::core::error::{Error, Result};
use crate::data::{HistoricalRecord, Metric};
use crate::forecasting::{
    BusinessForecaster, Forecast, OrderSelector, PredictionKind, RevenueCheck,
};
use crate::seasonal::{ProfileCache, SeasonalProfile};
use crate::time_series::{prepare, Frequency, PreparedSeries};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Days of history used for training and days forecast ahead.
const WINDOW_DAYS: i64 = 365;

/// Minimum daily points before falling back to weekly aggregation.
const MIN_DAILY_POINTS: usize = 14;

/// Minimum weekly points for a usable weekly series.
const MIN_WEEKLY_POINTS: usize = 10;

/// Daily uplift applied when distributing a weekly forecast onto weekdays.
const WEEKDAY_SHARE_MULTIPLIER: f64 = 1.2;
const WEEKEND_SHARE_MULTIPLIER: f64 = 0.6;

/// Stages of one orchestrated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    LoadHistory,
    PrepareVisits,
    ForecastVisits,
    PrepareRevenue,
    ForecastRevenue,
    Merge,
    Summarize,
    Done,
    Failed,
}

/// Model-level diagnostics attached to the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub visits_model_quality: f64,
    pub revenue_optimization_applied: bool,
    pub seasonal_adjustments_applied: bool,
}

/// The full 365-day optimization output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub agent_id: String,
    pub reference_date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_plan: Vec<DailyPlanRow>,
    pub totals: SummaryTotals,
    pub monthly_summary: Vec<PeriodSummary>,
    pub weekly_patterns: Vec<PeriodSummary>,
    pub quarterly_summary: Vec<PeriodSummary>,
    pub insights: Insights,
    pub model_performance: ModelPerformance,
    pub revenue_check: RevenueCheck,
}

/// Drives the prepare/select/forecast/merge pipeline for one agent at a
/// time. Owns the seasonal profile cache across runs.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    config: &'a ForecastConfig,
    cache: ProfileCache,
    stage: PipelineStage,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a ForecastConfig) -> Self {
        Orchestrator {
            config,
            cache: ProfileCache::new(),
            stage: PipelineStage::LoadHistory,
        }
    }

    /// Stage the most recent run reached.
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Run the full dual-horizon optimization for `agent_id` as of
    /// `reference_date`: train on the 365 days before it, forecast the 365
    /// days after it.
    pub fn run(
        &mut self,
        records: &[HistoricalRecord],
        agent_id: &str,
        reference_date: NaiveDate,
    ) -> Result<OptimizationResult> {
        match self.run_stages(records, agent_id, reference_date) {
            Ok(result) => {
                self.stage = PipelineStage::Done;
                Ok(result)
            }
            Err(err) => {
                self.stage = PipelineStage::Failed;
                log::error!("pipeline failed for agent {}: {}", agent_id, err);
                Err(err)
            }
        }
    }

    fn run_stages(
        &mut self,
        records: &[HistoricalRecord],
        agent_id: &str,
        reference_date: NaiveDate,
    ) -> Result<OptimizationResult> {
        self.stage = PipelineStage::LoadHistory;
        let training_start = reference_date - Duration::days(WINDOW_DAYS);
        // Pattern analysis benefits from one extra trailing year
        let extended_start = training_start - Duration::days(WINDOW_DAYS);

        let agent_records: Vec<HistoricalRecord> = records
            .iter()
            .filter(|r| r.agent_id == agent_id && r.date < reference_date)
            .cloned()
            .collect();
        let training: Vec<HistoricalRecord> = agent_records
            .iter()
            .filter(|r| r.date >= training_start)
            .cloned()
            .collect();
        let extended: Vec<HistoricalRecord> = agent_records
            .iter()
            .filter(|r| r.date >= extended_start)
            .cloned()
            .collect();

        if training.is_empty() {
            return Err(Error::InsufficientData(format!(
                "agent {} has no records in the training window {} to {}",
                agent_id, training_start, reference_date
            )));
        }
        log::info!(
            "agent {}: {} training record(s), {} in the extended window",
            agent_id,
            training.len(),
            extended.len()
        );

        // Visits
        self.stage = PipelineStage::PrepareVisits;
        let visits_prepared = self.prepare_visits(&training, &extended)?;

        let profile = self.profile_for(agent_id, &extended, &visits_prepared);

        self.stage = PipelineStage::ForecastVisits;
        let (visits_horizon, visits_forecast) =
            self.forecast_visits(&visits_prepared, profile.as_ref(), reference_date)?;

        // Revenue
        self.stage = PipelineStage::PrepareRevenue;
        let revenue_prepared = self.prepare_revenue(&training, &extended);

        self.stage = PipelineStage::ForecastRevenue;
        let revenue_horizon = match &revenue_prepared {
            Some(prepared) => self.forecast_revenue(prepared, reference_date),
            None => None,
        };
        let revenue_applied = revenue_horizon.is_some();

        self.stage = PipelineStage::Merge;
        let daily_plan = merge::merge_rows(self.config, &visits_horizon, revenue_horizon.as_ref());

        let forecaster = BusinessForecaster::new(self.config);
        let daily_revenue: Vec<f64> = daily_plan.iter().map(|r| r.predicted_revenue).collect();
        let revenue_check = forecaster.validate_revenue(&daily_revenue);

        self.stage = PipelineStage::Summarize;
        let monthly = summary::monthly_summary(&daily_plan);
        let weekdays = summary::weekday_patterns(&daily_plan);
        let quarterly = summary::quarterly_summary(&daily_plan);
        let insights = summary::build_insights(&daily_plan, &monthly, &weekdays);
        let totals = summary::totals(&daily_plan);

        Ok(OptimizationResult {
            agent_id: agent_id.to_string(),
            reference_date,
            start_date: reference_date + Duration::days(1),
            end_date: reference_date + Duration::days(WINDOW_DAYS),
            daily_plan,
            totals,
            monthly_summary: monthly,
            weekly_patterns: weekdays,
            quarterly_summary: quarterly,
            insights,
            model_performance: ModelPerformance {
                visits_model_quality: visits_forecast.quality_score,
                revenue_optimization_applied: revenue_applied,
                seasonal_adjustments_applied: !visits_forecast.adjustments.is_empty(),
            },
            revenue_check,
        })
    }

    /// Daily preparation on the training window, retried at weekly
    /// frequency over the extended window when too few days were actually
    /// observed (imputed slots do not count).
    fn prepare_visits(
        &self,
        training: &[HistoricalRecord],
        extended: &[HistoricalRecord],
    ) -> Result<PreparedSeries> {
        match prepare(training, Metric::Visits, Frequency::Daily) {
            Ok(prepared) if prepared.quality.observed_points >= MIN_DAILY_POINTS => Ok(prepared),
            Ok(_) | Err(Error::InsufficientData(_)) => {
                log::warn!("insufficient daily visit data, retrying at weekly frequency");
                let weekly = prepare(extended, Metric::Visits, Frequency::Weekly)?;
                if weekly.quality.observed_points < MIN_WEEKLY_POINTS {
                    return Err(Error::InsufficientData(format!(
                        "only {} observed weekly point(s) available, {} required",
                        weekly.quality.observed_points, MIN_WEEKLY_POINTS
                    )));
                }
                Ok(weekly)
            }
            Err(err) => Err(err),
        }
    }

    /// Revenue preparation is best-effort: without a usable series the plan
    /// derives revenue from visits instead.
    fn prepare_revenue(
        &self,
        training: &[HistoricalRecord],
        extended: &[HistoricalRecord],
    ) -> Option<PreparedSeries> {
        let candidates = [training, extended];
        for records in candidates {
            if let Ok(prepared) = prepare(records, Metric::Revenue, Frequency::Daily) {
                if prepared.quality.observed_points >= MIN_WEEKLY_POINTS {
                    return Some(prepared);
                }
            }
        }
        log::warn!("insufficient revenue data, deriving revenue from visit forecasts");
        None
    }

    /// Seasonal profile from the extended daily history, falling back to
    /// the prepared training series.
    fn profile_for(
        &mut self,
        agent_id: &str,
        extended: &[HistoricalRecord],
        fallback: &PreparedSeries,
    ) -> Option<SeasonalProfile> {
        let history = prepare(extended, Metric::Visits, Frequency::Daily)
            .map(|p| p.series)
            .unwrap_or_else(|_| fallback.series.clone());
        if history.frequency() != Frequency::Daily {
            return None;
        }
        Some(self.cache.get_or_compute(agent_id, &history))
    }

    fn forecast_visits(
        &self,
        prepared: &PreparedSeries,
        profile: Option<&SeasonalProfile>,
        reference_date: NaiveDate,
    ) -> Result<(HorizonSeries, Forecast)> {
        let frequency = prepared.series.frequency();
        let seasonal_period = frequency.default_seasonal_period();

        let selector = OrderSelector::new(self.config, seasonal_period);
        let outcome = selector.select(&prepared.series);
        let mut order = outcome.order;
        if frequency == Frequency::Daily {
            if let Some(profile) = profile {
                order = profile.enhance_order(order);
                if order != outcome.order {
                    log::info!("order enhanced by seasonal profile: {}", order);
                }
            }
        }

        let horizon = match frequency {
            Frequency::Daily => WINDOW_DAYS as usize,
            Frequency::Weekly => 52,
        };
        let forecaster = BusinessForecaster::new(self.config);
        let forecast = forecaster.forecast(
            &prepared.series,
            order,
            horizon,
            PredictionKind::Visits,
            profile,
        )?;

        let horizon_series = match frequency {
            Frequency::Daily => aligned_horizon(&forecast, reference_date),
            Frequency::Weekly => distribute_weekly(&forecast, reference_date),
        };
        Ok((horizon_series, forecast))
    }

    fn forecast_revenue(
        &self,
        prepared: &PreparedSeries,
        reference_date: NaiveDate,
    ) -> Option<HorizonSeries> {
        let selector =
            OrderSelector::new(self.config, prepared.series.frequency().default_seasonal_period());
        let outcome = selector.select(&prepared.series);

        let forecaster = BusinessForecaster::new(self.config);
        match forecaster.forecast(
            &prepared.series,
            outcome.order,
            WINDOW_DAYS as usize,
            PredictionKind::Revenue,
            None,
        ) {
            Ok(forecast) => Some(aligned_horizon(&forecast, reference_date)),
            Err(err) => {
                log::warn!("revenue forecast failed ({}), deriving from visits", err);
                None
            }
        }
    }
}

/// Map a daily forecast positionally onto the prediction window starting
/// the day after the reference date.
fn aligned_horizon(forecast: &Forecast, reference_date: NaiveDate) -> HorizonSeries {
    let days = forecast.len().min(WINDOW_DAYS as usize);
    let dates: Vec<NaiveDate> = (1..=days as i64)
        .map(|i| reference_date + Duration::days(i))
        .collect();
    HorizonSeries {
        dates,
        values: forecast.values[..days].to_vec(),
        lower: forecast.lower[..days].to_vec(),
        upper: forecast.upper[..days].to_vec(),
    }
}

/// Spread a weekly forecast across the daily prediction window, giving
/// weekdays a larger share of each week's total than weekends.
fn distribute_weekly(forecast: &Forecast, reference_date: NaiveDate) -> HorizonSeries {
    let days = WINDOW_DAYS as usize;
    let mut dates = Vec::with_capacity(days);
    let mut values = Vec::with_capacity(days);
    let mut lower = Vec::with_capacity(days);
    let mut upper = Vec::with_capacity(days);

    for i in 0..days {
        let date = reference_date + Duration::days(i as i64 + 1);
        let week_index = (i / 7).min(forecast.len().saturating_sub(1));
        let multiplier = if date.weekday().num_days_from_monday() < 5 {
            WEEKDAY_SHARE_MULTIPLIER
        } else {
            WEEKEND_SHARE_MULTIPLIER
        };

        dates.push(date);
        values.push((forecast.values[week_index] / 7.0 * multiplier).max(0.0));
        lower.push((forecast.lower[week_index] / 7.0 * multiplier).max(0.0));
        upper.push(forecast.upper[week_index] / 7.0 * multiplier);
    }

    HorizonSeries {
        dates,
        values,
        lower,
        upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// A year of daily activity with a weekday uplift, ending the day
    /// before the reference date.
    fn year_of_records(agent_id: &str, reference: NaiveDate) -> Vec<HistoricalRecord> {
        let mut rng = rand::rng();
        let mut records = Vec::new();
        for i in 1..=365i64 {
            let day = reference - Duration::days(i);
            let weekday = day.weekday().num_days_from_monday();
            let visits = if weekday < 5 { 8.0 } else { 4.0 } + rng.random_range(0.0..1.0);
            records.push(HistoricalRecord {
                date: day,
                agent_id: agent_id.to_string(),
                client_id: format!("C{}", i % 12),
                visit_count: visits,
                revenue_amount: visits * 140.0,
            });
        }
        records
    }

    #[test]
    fn test_full_run_produces_365_day_plan() {
        let config = ForecastConfig::default();
        let reference = date(2025, 1, 1);
        let records = year_of_records("7", reference);

        let mut orchestrator = Orchestrator::new(&config);
        let result = orchestrator.run(&records, "7", reference).unwrap();

        assert_eq!(orchestrator.stage(), PipelineStage::Done);
        assert_eq!(result.daily_plan.len(), 365);
        assert_eq!(result.start_date, date(2025, 1, 2));
        assert_eq!(result.end_date, date(2026, 1, 1));
        assert_eq!(result.monthly_summary.len(), 12);
        assert_eq!(result.weekly_patterns.len(), 7);
        assert_eq!(result.quarterly_summary.len(), 4);
        assert!(result.model_performance.revenue_optimization_applied);

        for row in &result.daily_plan {
            assert!(row.predicted_visits >= config.min_visits_per_day);
            assert!(row.predicted_visits <= config.max_visits_per_day);
            assert!(row.visits_lower <= row.predicted_visits);
            assert!(row.predicted_visits <= row.visits_upper);
        }
    }

    #[test]
    fn test_empty_training_window_fails() {
        let config = ForecastConfig::default();
        let reference = date(2025, 1, 1);
        // All records older than the training window
        let records = year_of_records("7", reference - Duration::days(800));

        let mut orchestrator = Orchestrator::new(&config);
        let result = orchestrator.run(&records, "7", reference);

        assert!(matches!(result, Err(Error::InsufficientData(_))));
        assert_eq!(orchestrator.stage(), PipelineStage::Failed);
    }

    #[test]
    fn test_three_sparse_records_fail_without_a_plan() {
        let config = ForecastConfig::default();
        let reference = date(2025, 1, 1);
        let records: Vec<HistoricalRecord> = (1..=3)
            .map(|i| HistoricalRecord {
                date: reference - Duration::days(i * 30),
                agent_id: "7".to_string(),
                client_id: "C1".to_string(),
                visit_count: 2.0,
                revenue_amount: 250.0,
            })
            .collect();

        let mut orchestrator = Orchestrator::new(&config);
        let result = orchestrator.run(&records, "7", reference);

        assert!(matches!(result, Err(Error::InsufficientData(_))));
        assert_eq!(orchestrator.stage(), PipelineStage::Failed);
    }

    #[test]
    fn test_distribute_weekly_favors_weekdays() {
        let forecast = Forecast {
            kind: PredictionKind::Visits,
            dates: vec![date(2025, 1, 6)],
            values: vec![35.0],
            lower: vec![28.0],
            upper: vec![42.0],
            quality_score: 80.0,
            constraints_applied: true,
            adjustments: vec![],
            fit: Default::default(),
            pinned: None,
        };

        // Reference on a Sunday so the window opens on a Monday
        let horizon = distribute_weekly(&forecast, date(2025, 1, 5));
        assert_eq!(horizon.dates.len(), 365);

        // Monday gets 35/7*1.2 = 6, Sunday 35/7*0.6 = 3
        assert!((horizon.values[0] - 6.0).abs() < 1e-10);
        assert!((horizon.values[6] - 3.0).abs() < 1e-10);
    }
}
