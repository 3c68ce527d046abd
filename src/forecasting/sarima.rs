//! SARIMA model fitting and forecasting
//!
//! Parameter estimation is closed-form and deliberately forgiving: AR
//! coefficients come from the Yule-Walker equations solved with
//! Levinson-Durbin, MA and seasonal coefficients from residual
//! autocorrelations, all clamped to (-0.99, 0.99). Real business series are
//! noisy, sparse and zero-inflated; a fit that a textbook estimator would
//! reject must still produce usable numbers here. Differencing is inverted
//! on forecast, so results are always on the original scale.

use crate::core::error::{Error, Result};
use crate::forecasting::ModelOrder;
use crate::stats;
use crate::time_series::{Frequency, TimeSeries};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

const COEFFICIENT_LIMIT: f64 = 0.99;
const Z_95: f64 = 1.96;

/// An unfitted SARIMA specification.
#[derive(Debug, Clone)]
pub struct SarimaModel {
    order: ModelOrder,
}

/// Point forecasts with a 95% interval, on the original scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawForecast {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// In-sample evaluation metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub smape: f64,
    pub r_squared: f64,
    pub aic: f64,
    pub bic: f64,
}

/// A fitted SARIMA model, ready to forecast.
#[derive(Debug, Clone)]
pub struct FittedSarima {
    order: ModelOrder,
    frequency: Frequency,
    last_date: NaiveDate,
    /// Differencing stages: `stages[0]` is the original series, each later
    /// entry has one more difference applied (non-seasonal first, then
    /// seasonal). The last stage is the working series the coefficients
    /// were estimated on.
    stages: Vec<Vec<f64>>,
    ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ar: Vec<f64>,
    seasonal_ma: Vec<f64>,
    residuals: Vec<f64>,
    residual_std: f64,
    log_likelihood: f64,
}

impl SarimaModel {
    pub fn new(order: ModelOrder) -> Self {
        SarimaModel { order }
    }

    /// Fit the model to `series`.
    pub fn fit(&self, series: &TimeSeries) -> Result<FittedSarima> {
        let order = self.order;
        if series.len() < order.min_observations() {
            return Err(Error::InsufficientData(format!(
                "{} needs at least {} observations, got {}",
                order,
                order.min_observations(),
                series.len()
            )));
        }
        let last_date = series.end().ok_or_else(|| {
            Error::InsufficientData("cannot fit a model on an empty series".to_string())
        })?;

        // Build the differencing stages
        let mut stages = vec![series.values().to_vec()];
        for _ in 0..order.d {
            let prev = &stages[stages.len() - 1];
            if prev.len() <= 1 {
                break;
            }
            let next: Vec<f64> = prev.windows(2).map(|w| w[1] - w[0]).collect();
            stages.push(next);
        }
        if order.s > 1 {
            for _ in 0..order.sd {
                let prev = &stages[stages.len() - 1];
                if prev.len() <= order.s {
                    break;
                }
                let next: Vec<f64> = prev
                    .iter()
                    .skip(order.s)
                    .zip(prev.iter())
                    .map(|(curr, earlier)| curr - earlier)
                    .collect();
                stages.push(next);
            }
        }
        let working = stages[stages.len() - 1].clone();
        if working.len() < 2 {
            return Err(Error::InsufficientData(
                "differenced series too short to estimate parameters".to_string(),
            ));
        }

        let ar = estimate_ar(&working, order.p);

        // Residuals after the AR component, used for MA estimation
        let mut ar_residuals = Vec::with_capacity(working.len());
        for i in 0..working.len() {
            let mut prediction = 0.0;
            for (j, &coefficient) in ar.iter().enumerate() {
                if i > j {
                    prediction += coefficient * working[i - j - 1];
                }
            }
            ar_residuals.push(working[i] - prediction);
        }

        let ma = lagged_autocorrelations(&ar_residuals, order.q, 1);
        let seasonal_ar = lagged_autocorrelations(&working, order.sp, order.s);
        let seasonal_ma = lagged_autocorrelations(&ar_residuals, order.sq, order.s);

        // One pass to compute fitted values and final residuals
        let mut residuals: Vec<f64> = Vec::with_capacity(working.len());
        for i in 0..working.len() {
            let mut prediction = 0.0;
            for (j, &coefficient) in ar.iter().enumerate() {
                if i > j {
                    prediction += coefficient * working[i - j - 1];
                }
            }
            for (j, &coefficient) in ma.iter().enumerate() {
                if i > j && j < residuals.len() {
                    prediction += coefficient * residuals[residuals.len() - j - 1];
                }
            }
            for (j, &coefficient) in seasonal_ar.iter().enumerate() {
                let lag = (j + 1) * order.s;
                if i >= lag {
                    prediction += coefficient * working[i - lag];
                }
            }
            for (j, &coefficient) in seasonal_ma.iter().enumerate() {
                let lag = (j + 1) * order.s;
                if lag <= residuals.len() {
                    prediction += coefficient * residuals[residuals.len() - lag];
                }
            }
            residuals.push(working[i] - prediction);
        }

        let variance =
            (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).max(1e-10);
        let residual_std = variance.sqrt();
        let n = residuals.len() as f64;
        let sum_sq: f64 = residuals.iter().map(|r| r * r).sum();
        let log_likelihood = -0.5 * n * (2.0 * std::f64::consts::PI).ln()
            - 0.5 * n * variance.ln()
            - sum_sq / (2.0 * variance);

        Ok(FittedSarima {
            order,
            frequency: series.frequency(),
            last_date,
            stages,
            ar,
            ma,
            seasonal_ar,
            seasonal_ma,
            residuals,
            residual_std,
            log_likelihood,
        })
    }
}

impl FittedSarima {
    pub fn order(&self) -> ModelOrder {
        self.order
    }

    /// Akaike information criterion.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood + 2.0 * self.order.n_params() as f64
    }

    /// Bayesian information criterion.
    pub fn bic(&self) -> f64 {
        let n_obs = self.working().len().max(1) as f64;
        -2.0 * self.log_likelihood + self.order.n_params() as f64 * n_obs.ln()
    }

    fn working(&self) -> &[f64] {
        &self.stages[self.stages.len() - 1]
    }

    /// Forecast `horizon` steps ahead with a 95% interval that widens with
    /// the horizon. Differencing is inverted, so the returned values are on
    /// the original scale.
    pub fn forecast(&self, horizon: usize) -> Result<RawForecast> {
        if horizon == 0 {
            return Err(Error::InvalidInput(
                "forecast horizon must be positive".to_string(),
            ));
        }

        // Forecast on the working (differenced) scale. Future residuals are
        // zero in expectation.
        let working = self.working();
        let mut extended = working.to_vec();
        let mut extended_residuals = self.residuals.clone();
        let mut working_forecasts = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let n = extended.len();
            let mut forecast = 0.0;
            for (j, &coefficient) in self.ar.iter().enumerate() {
                if n > j {
                    forecast += coefficient * extended[n - j - 1];
                }
            }
            for (j, &coefficient) in self.ma.iter().enumerate() {
                if j < extended_residuals.len() {
                    let idx = extended_residuals.len() - j - 1;
                    if idx < self.residuals.len() {
                        forecast += coefficient * extended_residuals[idx];
                    }
                }
            }
            for (j, &coefficient) in self.seasonal_ar.iter().enumerate() {
                let lag = (j + 1) * self.order.s;
                if n >= lag {
                    forecast += coefficient * extended[n - lag];
                }
            }
            for (j, &coefficient) in self.seasonal_ma.iter().enumerate() {
                let lag = (j + 1) * self.order.s;
                if lag <= extended_residuals.len() {
                    let idx = extended_residuals.len() - lag;
                    if idx < self.residuals.len() {
                        forecast += coefficient * extended_residuals[idx];
                    }
                }
            }
            working_forecasts.push(forecast);
            extended.push(forecast);
            extended_residuals.push(0.0);
        }

        let values = self.invert_differencing(&working_forecasts);

        let step = self.frequency.step_days();
        let dates: Vec<NaiveDate> = (1..=horizon as i64)
            .map(|i| self.last_date + Duration::days(i * step))
            .collect();

        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (h, &value) in values.iter().enumerate() {
            let margin = Z_95 * self.residual_std * ((h + 1) as f64).sqrt();
            lower.push(value - margin);
            upper.push(value + margin);
        }

        Ok(RawForecast {
            dates,
            values,
            lower,
            upper,
        })
    }

    /// Undo the differencing stages, seasonal layers first (they were
    /// applied last), accumulating from each stage's observed tail.
    fn invert_differencing(&self, forecasts: &[f64]) -> Vec<f64> {
        let mut current = forecasts.to_vec();
        let seasonal_stages = self.stages.len().saturating_sub(1 + self.order.d);

        for stage_idx in (1..self.stages.len()).rev() {
            let is_seasonal = stage_idx > self.stages.len() - 1 - seasonal_stages;
            let lag = if is_seasonal { self.order.s } else { 1 };
            let mut tail = self.stages[stage_idx - 1].clone();
            let mut restored = Vec::with_capacity(current.len());
            for &value in &current {
                let base = if tail.len() >= lag {
                    tail[tail.len() - lag]
                } else {
                    0.0
                };
                let next = value + base;
                restored.push(next);
                tail.push(next);
            }
            current = restored;
        }
        current
    }

    /// In-sample evaluation against the observed series the model was fit
    /// on. Residuals on the working scale equal residuals on the original
    /// scale because the differencing transform uses observed lags.
    pub fn fit_metrics(&self, series: &TimeSeries) -> FitMetrics {
        let offset = series.len().saturating_sub(self.residuals.len());
        let actual = &series.values()[offset..];
        let n = actual.len() as f64;
        if n == 0.0 {
            return FitMetrics {
                aic: self.aic(),
                bic: self.bic(),
                ..Default::default()
            };
        }

        let predicted: Vec<f64> = actual
            .iter()
            .zip(&self.residuals)
            .map(|(y, r)| y - r)
            .collect();

        let mae = self.residuals.iter().map(|r| r.abs()).sum::<f64>() / n;
        let rmse = (self.residuals.iter().map(|r| r * r).sum::<f64>() / n).sqrt();
        let mape = actual
            .iter()
            .zip(&self.residuals)
            .map(|(y, r)| (r / y.abs().max(0.1)).abs())
            .sum::<f64>()
            / n
            * 100.0;
        let smape = actual
            .iter()
            .zip(&predicted)
            .map(|(y, p)| 2.0 * (y - p).abs() / (y.abs() + p.abs() + 0.1))
            .sum::<f64>()
            / n
            * 100.0;

        let mean_actual = stats::mean(actual);
        let ss_total: f64 = actual.iter().map(|y| (y - mean_actual).powi(2)).sum();
        let ss_residual: f64 = self.residuals.iter().map(|r| r * r).sum();
        let r_squared = if ss_total > 0.0 {
            1.0 - ss_residual / ss_total
        } else {
            0.0
        };

        FitMetrics {
            mae,
            rmse,
            mape,
            smape,
            r_squared,
            aic: self.aic(),
            bic: self.bic(),
        }
    }
}

/// AR coefficients via Yule-Walker equations solved with Levinson-Durbin,
/// clamped into the stable range.
fn estimate_ar(values: &[f64], order: usize) -> Vec<f64> {
    if order == 0 || values.len() < order + 1 {
        return vec![];
    }

    let n = values.len();
    let mean = stats::mean(values);
    let centered: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let var = centered.iter().map(|v| v * v).sum::<f64>() / n as f64;
    if var.abs() < 1e-10 {
        return vec![0.0; order];
    }

    let mut autocorr = Vec::with_capacity(order + 1);
    for lag in 0..=order {
        let cov: f64 = centered
            .iter()
            .take(n - lag)
            .zip(centered.iter().skip(lag))
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64;
        autocorr.push(cov / var);
    }

    let mut phi = vec![vec![0.0; order]; order];
    let mut partial = vec![0.0; order];

    phi[0][0] = autocorr[1];
    partial[0] = autocorr[1];

    for k in 1..order {
        let mut num = autocorr[k + 1];
        let mut den = 1.0;
        for j in 0..k {
            num -= phi[k - 1][j] * autocorr[k - j];
            den -= phi[k - 1][j] * autocorr[j + 1];
        }
        partial[k] = if den.abs() < 1e-10 { 0.0 } else { num / den };
        phi[k][k] = partial[k];
        for j in 0..k {
            phi[k][j] = phi[k - 1][j] - partial[k] * phi[k - 1][k - 1 - j];
        }
    }

    phi[order - 1]
        .iter()
        .map(|c| c.clamp(-COEFFICIENT_LIMIT, COEFFICIENT_LIMIT))
        .collect()
}

/// Sample autocorrelations at multiples of `stride`, clamped into the
/// stable range. Used for MA coefficients (stride 1) and the seasonal
/// components (stride = seasonal period).
fn lagged_autocorrelations(values: &[f64], order: usize, stride: usize) -> Vec<f64> {
    if order == 0 || stride == 0 || values.len() < order * stride + 1 {
        return vec![];
    }

    let n = values.len();
    let mean = stats::mean(values);
    let centered: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let var = centered.iter().map(|v| v * v).sum::<f64>() / n as f64;
    if var.abs() < 1e-10 {
        return vec![0.0; order];
    }

    (1..=order)
        .map(|k| {
            let lag = k * stride;
            let cov: f64 = centered
                .iter()
                .take(n - lag)
                .zip(centered.iter().skip(lag))
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / n as f64;
            (cov / var).clamp(-COEFFICIENT_LIMIT, COEFFICIENT_LIMIT)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trending_series() -> TimeSeries {
        let values: Vec<f64> = (0..100)
            .map(|i| 10.0 + i as f64 * 0.5 + (i as f64 * 0.1).sin())
            .collect();
        TimeSeries::from_range(date(2024, 1, 1), values, Frequency::Daily)
    }

    fn seasonal_series() -> TimeSeries {
        let values: Vec<f64> = (0..120)
            .map(|i| {
                10.0 + i as f64 * 0.1
                    + 5.0 * (i as f64 * 2.0 * std::f64::consts::PI / 7.0).sin()
            })
            .collect();
        TimeSeries::from_range(date(2024, 1, 1), values, Frequency::Daily)
    }

    #[test]
    fn test_arima_fit_and_forecast() {
        let ts = trending_series();
        let model = SarimaModel::new(ModelOrder::arima(1, 1, 1));
        let fitted = model.fit(&ts).unwrap();
        let forecast = fitted.forecast(10).unwrap();

        assert_eq!(forecast.values.len(), 10);
        assert_eq!(forecast.dates[0], date(2024, 4, 10));
        assert!(fitted.aic().is_finite());
    }

    #[test]
    fn test_seasonal_fit_and_forecast() {
        let ts = seasonal_series();
        let model = SarimaModel::new(ModelOrder::new(1, 1, 1, 1, 0, 1, 7));
        let fitted = model.fit(&ts).unwrap();
        let forecast = fitted.forecast(14).unwrap();
        assert_eq!(forecast.values.len(), 14);
    }

    #[test]
    fn test_forecast_is_on_original_scale() {
        // A strongly trending series: with d=1 the forecasts must continue
        // near the last observed level, not hover near the differenced mean.
        let ts = trending_series();
        let fitted = SarimaModel::new(ModelOrder::arima(1, 1, 0)).fit(&ts).unwrap();
        let forecast = fitted.forecast(5).unwrap();

        let last = *ts.values().last().unwrap();
        for value in &forecast.values {
            assert!((value - last).abs() < 15.0, "forecast {} far from level {}", value, last);
        }
    }

    #[test]
    fn test_confidence_intervals_widen_with_horizon() {
        let ts = trending_series();
        let fitted = SarimaModel::new(ModelOrder::arima(1, 1, 1)).fit(&ts).unwrap();
        let forecast = fitted.forecast(10).unwrap();

        let first_width = forecast.upper[0] - forecast.lower[0];
        let last_width = forecast.upper[9] - forecast.lower[9];
        assert!(last_width > first_width);
    }

    #[test]
    fn test_interval_brackets_point_forecast() {
        let ts = seasonal_series();
        let fitted = SarimaModel::new(ModelOrder::new(1, 0, 1, 1, 0, 0, 7))
            .fit(&ts)
            .unwrap();
        let forecast = fitted.forecast(30).unwrap();
        for i in 0..30 {
            assert!(forecast.lower[i] <= forecast.values[i]);
            assert!(forecast.values[i] <= forecast.upper[i]);
        }
    }

    #[test]
    fn test_too_short_series_is_rejected() {
        let ts = TimeSeries::from_range(date(2024, 1, 1), vec![1.0, 2.0, 3.0], Frequency::Daily);
        let model = SarimaModel::new(ModelOrder::new(1, 1, 1, 1, 1, 1, 7));
        assert!(matches!(
            model.fit(&ts),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_constant_series_still_fits() {
        let ts = TimeSeries::from_range(date(2024, 1, 1), vec![5.0; 60], Frequency::Daily);
        let fitted = SarimaModel::new(ModelOrder::arima(1, 0, 1)).fit(&ts).unwrap();
        let forecast = fitted.forecast(7).unwrap();
        for value in &forecast.values {
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_fit_metrics_reasonable_on_smooth_series() {
        let ts = trending_series();
        let fitted = SarimaModel::new(ModelOrder::arima(1, 1, 1)).fit(&ts).unwrap();
        let metrics = fitted.fit_metrics(&ts);

        assert!(metrics.mae >= 0.0);
        assert!(metrics.rmse >= metrics.mae * 0.99);
        assert!(metrics.aic.is_finite());
        assert!(metrics.bic.is_finite());
    }

    #[test]
    fn test_weekly_frequency_steps_forecast_dates_by_week() {
        let values: Vec<f64> = (0..60).map(|i| 10.0 + (i % 4) as f64).collect();
        let ts = TimeSeries::from_range(date(2024, 1, 1), values, Frequency::Weekly);
        let fitted = SarimaModel::new(ModelOrder::arima(1, 0, 1)).fit(&ts).unwrap();
        let forecast = fitted.forecast(2).unwrap();

        let last = ts.end().unwrap();
        assert_eq!(forecast.dates[0], last + Duration::days(7));
        assert_eq!(forecast.dates[1], last + Duration::days(14));
    }
}
