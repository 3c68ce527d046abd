//! Forecasting
//!
//! This module provides the statistical heart of the crate:
//! - SARIMA fitting and forecasting with relaxed parameter estimation
//!   (`sarima`)
//! - grid search with walk-forward cross-validation and a composite,
//!   business-weighted score (`selection`)
//! - business-constrained forecasts with quality scoring and revenue
//!   validation (`business`)

pub mod business;
pub mod sarima;
pub mod selection;

pub use business::{BusinessForecaster, Forecast, PredictionKind, RevenueCheck};
pub use sarima::{FitMetrics, FittedSarima, RawForecast, SarimaModel};
pub use selection::{EvaluationResult, OrderSelector, PredictionQuality, SelectionOutcome};

use serde::{Deserialize, Serialize};

/// A full seasonal ARIMA order: (p,d,q)(P,D,Q) with seasonal period `s`.
///
/// Immutable value type; candidates are compared through the selector's
/// composite score, never through the order itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOrder {
    /// Non-seasonal AR order
    pub p: usize,
    /// Non-seasonal differencing order
    pub d: usize,
    /// Non-seasonal MA order
    pub q: usize,
    /// Seasonal AR order
    pub sp: usize,
    /// Seasonal differencing order
    pub sd: usize,
    /// Seasonal MA order
    pub sq: usize,
    /// Seasonal period length
    pub s: usize,
}

impl ModelOrder {
    pub fn new(p: usize, d: usize, q: usize, sp: usize, sd: usize, sq: usize, s: usize) -> Self {
        ModelOrder {
            p,
            d,
            q,
            sp,
            sd,
            sq,
            s,
        }
    }

    /// A non-seasonal ARIMA order.
    pub fn arima(p: usize, d: usize, q: usize) -> Self {
        Self::new(p, d, q, 0, 0, 0, 1)
    }

    /// Sum of the six orders, the complexity measure penalized during
    /// selection.
    pub fn complexity(&self) -> usize {
        self.p + self.d + self.q + self.sp + self.sd + self.sq
    }

    /// Number of estimated parameters (plus one for the innovation variance).
    pub fn n_params(&self) -> usize {
        self.p + self.q + self.sp + self.sq + 1
    }

    /// Fewest observations a fit of this order needs.
    pub fn min_observations(&self) -> usize {
        self.p + self.d + self.q + self.s * (self.sp + self.sd + self.sq) + 1
    }
}

impl std::fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SARIMA({},{},{})({},{},{},{})",
            self.p, self.d, self.q, self.sp, self.sd, self.sq, self.s
        )
    }
}
