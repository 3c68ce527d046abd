//! Automatic order selection
//!
//! Grid-searches seasonal model orders under business constraints. Every
//! candidate is fitted once for information criteria and then walk-forward
//! cross-validated on several error metrics; a composite, business-weighted
//! score picks the winner. Selection never fails: when the whole grid is
//! unusable (or the time budget runs out before any candidate succeeds) a
//! data-shape heuristic supplies a fallback order.

use crate::core::config::ForecastConfig;
use crate::forecasting::sarima::SarimaModel;
use crate::forecasting::ModelOrder;
use crate::stats;
use crate::time_series::TimeSeries;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Sentinel error recorded for a cross-validation fold that failed to fit
/// or forecast; failed folds are penalized, not excluded.
const FAILED_FOLD_SCORE: f64 = 9999.0;

/// Minimum training length for a cross-validation fold.
const MIN_FOLD_TRAIN: usize = 10;

/// Coarse reliability label derived from cross-validated MAPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionQuality {
    High,
    Medium,
    Low,
}

impl PredictionQuality {
    fn from_mape(mape: f64) -> Self {
        if mape < 15.0 {
            PredictionQuality::High
        } else if mape < 30.0 {
            PredictionQuality::Medium
        } else {
            PredictionQuality::Low
        }
    }
}

/// Scores for one grid-search candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub order: ModelOrder,
    pub composite_score: f64,
    pub aic: f64,
    pub bic: f64,
    pub rmse_mean: f64,
    pub rmse_std: f64,
    pub mae_mean: f64,
    pub mae_std: f64,
    pub mape_mean: f64,
    pub mape_std: f64,
    pub bias_mean: f64,
    pub bias_std: f64,
}

/// Outcome of a selection run. Always carries a usable order.
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub order: ModelOrder,
    /// Scores of the winning candidate; absent when the fallback was used
    pub best: Option<EvaluationResult>,
    /// All evaluated candidates ranked by composite score, for diagnostics
    pub ranked: Vec<EvaluationResult>,
    pub candidates_evaluated: usize,
    pub elapsed: Duration,
    pub fallback_used: bool,
    pub budget_exhausted: bool,
    pub quality: PredictionQuality,
}

/// Grid-searching order selector.
#[derive(Debug, Clone)]
pub struct OrderSelector<'a> {
    config: &'a ForecastConfig,
    seasonal_period: usize,
}

impl<'a> OrderSelector<'a> {
    pub fn new(config: &'a ForecastConfig, seasonal_period: usize) -> Self {
        OrderSelector {
            config,
            seasonal_period: seasonal_period.max(1),
        }
    }

    /// Search the order grid and return the best candidate, or a heuristic
    /// fallback when nothing in the grid could be fitted.
    pub fn select(&self, series: &TimeSeries) -> SelectionOutcome {
        let start = Instant::now();
        let budget = Duration::from_secs(self.config.max_computation_time_secs);
        let k_folds = adaptive_folds(series.len(), self.seasonal_period);

        let (max_pq, max_d, max_seasonal_pq) = if self.config.prefer_simpler_models {
            (2, 1, 1)
        } else {
            (3, 2, 2)
        };
        let max_seasonal_d = 1;

        log::info!(
            "order selection: {} points, period {}, {}-fold validation",
            series.len(),
            self.seasonal_period,
            k_folds
        );

        let mut results: Vec<EvaluationResult> = Vec::new();
        let mut candidates_evaluated = 0usize;
        let mut budget_exhausted = false;

        'grid: for p in 0..=max_pq {
            for d in 0..=max_d {
                for q in 0..=max_pq {
                    for sp in 0..=max_seasonal_pq {
                        for sd in 0..=max_seasonal_d {
                            for sq in 0..=max_seasonal_pq {
                                // Cooperative budget check between candidates
                                if start.elapsed() > budget {
                                    log::warn!(
                                        "order selection budget exhausted after {} candidates, \
                                         keeping best so far",
                                        candidates_evaluated
                                    );
                                    budget_exhausted = true;
                                    break 'grid;
                                }
                                candidates_evaluated += 1;

                                let order = ModelOrder::new(
                                    p,
                                    d,
                                    q,
                                    sp,
                                    sd,
                                    sq,
                                    self.seasonal_period,
                                );
                                if let Some(result) = self.evaluate(series, order, k_folds) {
                                    results.push(result);
                                }
                            }
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            a.composite_score
                .partial_cmp(&b.composite_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let elapsed = start.elapsed();
        match results.first().cloned() {
            Some(best) => {
                log::info!(
                    "order selection: best {} (composite {:.4}, cv rmse {:.3}, cv mape {:.2}%)",
                    best.order,
                    best.composite_score,
                    best.rmse_mean,
                    best.mape_mean
                );
                SelectionOutcome {
                    order: best.order,
                    quality: PredictionQuality::from_mape(best.mape_mean),
                    best: Some(best),
                    ranked: results,
                    candidates_evaluated,
                    elapsed,
                    fallback_used: false,
                    budget_exhausted,
                }
            }
            None => {
                let order = fallback_order(series, self.seasonal_period);
                log::warn!(
                    "order selection: no grid candidate usable, falling back to {}",
                    order
                );
                SelectionOutcome {
                    order,
                    best: None,
                    ranked: Vec::new(),
                    candidates_evaluated,
                    elapsed,
                    fallback_used: true,
                    budget_exhausted,
                    quality: PredictionQuality::Low,
                }
            }
        }
    }

    /// Fit once for information criteria, cross-validate, and score.
    /// Candidates whose full-series fit fails are skipped entirely.
    fn evaluate(
        &self,
        series: &TimeSeries,
        order: ModelOrder,
        k_folds: usize,
    ) -> Option<EvaluationResult> {
        let fitted = SarimaModel::new(order).fit(series).ok()?;
        let aic = fitted.aic();
        let bic = fitted.bic();

        let cv = self.cross_validate(series, order, k_folds);

        let w = self.config.revenue_weight;
        let complexity = order.complexity() as f64;
        let composite_score = (1.0 - w)
            * (0.3 * cv.rmse_mean
                + 0.3 * cv.mae_mean
                + 0.2 * (cv.mape_mean / 100.0)
                + 0.1 * cv.bias_mean
                + 0.1 * (aic / 1000.0))
            + w * (0.1 * complexity + 0.2 * cv.rmse_std)
            + 0.05 * complexity;

        Some(EvaluationResult {
            order,
            composite_score,
            aic,
            bic,
            rmse_mean: cv.rmse_mean,
            rmse_std: cv.rmse_std,
            mae_mean: cv.mae_mean,
            mae_std: cv.mae_std,
            mape_mean: cv.mape_mean,
            mape_std: cv.mape_std,
            bias_mean: cv.bias_mean,
            bias_std: cv.bias_std,
        })
    }

    /// Walk-forward cross-validation: fit on a growing prefix, forecast the
    /// next segment, score against the held-out actuals.
    fn cross_validate(&self, series: &TimeSeries, order: ModelOrder, k_folds: usize) -> CvScores {
        let segment = (series.len() / k_folds).max(1);
        let mut rmse = Vec::new();
        let mut mae = Vec::new();
        let mut mape = Vec::new();
        let mut bias = Vec::new();

        for fold in 0..k_folds.saturating_sub(1) {
            let train_end = (fold + 1) * segment;
            if train_end < MIN_FOLD_TRAIN || train_end >= series.len() {
                continue;
            }
            let test_end = (train_end + segment).min(series.len());
            let actual = series.window(train_end, test_end);
            if actual.is_empty() {
                continue;
            }

            let fold_result = SarimaModel::new(order)
                .fit(&series.prefix(train_end))
                .and_then(|fitted| fitted.forecast(actual.len()));

            match fold_result {
                Ok(forecast) => {
                    let errors: Vec<f64> = forecast
                        .values
                        .iter()
                        .zip(actual)
                        .map(|(predicted, observed)| predicted - observed)
                        .collect();
                    let n = errors.len() as f64;
                    rmse.push((errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt());
                    mae.push(errors.iter().map(|e| e.abs()).sum::<f64>() / n);
                    mape.push(
                        actual
                            .iter()
                            .zip(&errors)
                            .map(|(observed, error)| (error / observed.abs().max(0.1)).abs())
                            .sum::<f64>()
                            / n
                            * 100.0,
                    );
                    bias.push((errors.iter().sum::<f64>() / n).abs());
                }
                Err(_) => {
                    // Penalize the failed fold rather than excluding it
                    rmse.push(FAILED_FOLD_SCORE);
                    mae.push(FAILED_FOLD_SCORE);
                    mape.push(FAILED_FOLD_SCORE);
                    bias.push(FAILED_FOLD_SCORE);
                }
            }
        }

        CvScores {
            rmse_mean: mean_or_sentinel(&rmse),
            rmse_std: std_or_sentinel(&rmse),
            mae_mean: mean_or_sentinel(&mae),
            mae_std: std_or_sentinel(&mae),
            mape_mean: mean_or_sentinel(&mape),
            mape_std: std_or_sentinel(&mape),
            bias_mean: mean_or_sentinel(&bias),
            bias_std: std_or_sentinel(&bias),
        }
    }
}

struct CvScores {
    rmse_mean: f64,
    rmse_std: f64,
    mae_mean: f64,
    mae_std: f64,
    mape_mean: f64,
    mape_std: f64,
    bias_mean: f64,
    bias_std: f64,
}

fn mean_or_sentinel(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        FAILED_FOLD_SCORE
    } else {
        stats::mean(scores)
    }
}

fn std_or_sentinel(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        FAILED_FOLD_SCORE
    } else {
        stats::std_dev(scores)
    }
}

/// Number of walk-forward folds, adapted to the series length.
fn adaptive_folds(len: usize, seasonal_period: usize) -> usize {
    let s = seasonal_period.max(1);
    if len >= 10 * s {
        5
    } else if len >= 5 * s {
        4
    } else if len >= 3 * s {
        3
    } else {
        2
    }
}

/// Pick an order purely from the shape of the data. Used when the grid
/// yields nothing; always succeeds.
fn fallback_order(series: &TimeSeries, seasonal_period: usize) -> ModelOrder {
    let s = seasonal_period.max(1);
    let values = series.values();
    let len = values.len();

    if len < 30 {
        return ModelOrder::new(1, 0, 0, 0, 0, 0, s);
    }

    // Quick seasonal strength estimate over complete cycles
    let mut seasonal_strength = 0.0;
    let cycles = len / s;
    let overall_mean = stats::mean(values);
    if cycles >= 2 && overall_mean > 0.0 {
        let position_means: Vec<f64> = (0..s)
            .map(|position| {
                let cycle_values: Vec<f64> =
                    (0..cycles).map(|c| values[c * s + position]).collect();
                stats::mean(&cycle_values)
            })
            .collect();
        seasonal_strength = stats::std_dev(&position_means) / overall_mean;
    }

    // The seasonal fallback must itself be fittable on this series
    if seasonal_strength > 0.2 && len >= 3 * s + 4 {
        return ModelOrder::new(1, 1, 1, 1, 1, 1, s);
    }

    let index: Vec<f64> = (0..len).map(|i| i as f64).collect();
    let has_trend = stats::correlation(&index, values)
        .map(|corr| corr.abs() > 0.3)
        .unwrap_or(false);
    if has_trend {
        return ModelOrder::new(1, 1, 1, 0, 0, 0, s);
    }

    ModelOrder::new(1, 0, 1, 0, 0, 0, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_series::Frequency;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekly_cycle_series(len: usize) -> TimeSeries {
        let values: Vec<f64> = (0..len)
            .map(|i| {
                let weekday = i % 7;
                if weekday < 5 {
                    7.0 + (i % 3) as f64 * 0.3
                } else {
                    4.0
                }
            })
            .collect();
        TimeSeries::from_range(date(2024, 1, 1), values, Frequency::Daily)
    }

    #[test]
    fn test_selection_finds_a_model_on_seasonal_data() {
        let config = ForecastConfig::default();
        let selector = OrderSelector::new(&config, 7);
        let outcome = selector.select(&weekly_cycle_series(140));

        assert!(!outcome.fallback_used);
        assert!(outcome.best.is_some());
        assert!(outcome.candidates_evaluated > 0);
        assert!(!outcome.ranked.is_empty());
        assert_eq!(outcome.order.s, 7);
    }

    #[test]
    fn test_ranked_results_sorted_by_composite() {
        let config = ForecastConfig::default();
        let selector = OrderSelector::new(&config, 7);
        let outcome = selector.select(&weekly_cycle_series(100));

        for pair in outcome.ranked.windows(2) {
            assert!(pair[0].composite_score <= pair[1].composite_score);
        }
    }

    #[test]
    fn test_short_series_uses_fallback_ar1() {
        // Too short for any grid candidate's cross-validation to matter but
        // enough for the heuristic
        let series = TimeSeries::from_range(
            date(2024, 1, 1),
            vec![3.0, 4.0, 2.0, 5.0, 3.0, 4.0],
            Frequency::Daily,
        );
        let order = fallback_order(&series, 7);
        assert_eq!(order, ModelOrder::new(1, 0, 0, 0, 0, 0, 7));
    }

    #[test]
    fn test_fallback_detects_trend() {
        let values: Vec<f64> = (0..60).map(|i| i as f64 * 2.0).collect();
        let series = TimeSeries::from_range(date(2024, 1, 1), values, Frequency::Daily);
        let order = fallback_order(&series, 7);
        assert_eq!(order.d, 1);
    }

    #[test]
    fn test_fallback_detects_seasonality() {
        let series = weekly_cycle_series(70);
        let order = fallback_order(&series, 7);
        assert_eq!(order, ModelOrder::new(1, 1, 1, 1, 1, 1, 7));
    }

    #[test]
    fn test_selection_never_fails_even_on_tiny_series() {
        let config = ForecastConfig::default();
        let selector = OrderSelector::new(&config, 7);
        let series = TimeSeries::from_range(date(2024, 1, 1), vec![1.0, 2.0], Frequency::Daily);
        let outcome = selector.select(&series);

        // Nothing in the grid can cross-validate two points; the fallback
        // still hands back a usable order.
        assert!(outcome.order.min_observations() <= 2 || !outcome.fallback_used);
    }

    #[test]
    fn test_tight_budget_still_returns_an_order() {
        let mut config = ForecastConfig::default();
        config.max_computation_time_secs = 1;
        let selector = OrderSelector::new(&config, 7);
        // Whether or not the budget trips, an order must come back
        let outcome = selector.select(&weekly_cycle_series(140));
        assert_eq!(outcome.order.s, 7);
    }

    #[test]
    fn test_adaptive_folds() {
        assert_eq!(adaptive_folds(100, 7), 5);
        assert_eq!(adaptive_folds(40, 7), 4);
        assert_eq!(adaptive_folds(25, 7), 3);
        assert_eq!(adaptive_folds(10, 7), 2);
    }

    #[test]
    fn test_simpler_grid_is_smaller() {
        let mut config = ForecastConfig::default();
        config.max_computation_time_secs = 600;
        let simple = OrderSelector::new(&config, 7).select(&weekly_cycle_series(60));

        // 3*2*3 non-seasonal times 2*2*2 seasonal combinations
        assert_eq!(simple.candidates_evaluated, 3 * 2 * 3 * 2 * 2 * 2);
    }
}
