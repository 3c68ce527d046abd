//! Pipeline configuration
//!
//! All business tunables live in one immutable [`ForecastConfig`] injected at
//! pipeline construction. The struct deserializes from TOML so deployments can
//! override the defaults without recompiling.

use crate::core::error::{Error, Result};
use crate::data::GeoPoint;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Immutable configuration for the forecasting pipeline.
///
/// Defaults mirror the values the planning team runs in production: visit
/// counts capped at 20 per day, a 150 (currency units) daily revenue floor and
/// a flat revenue-per-visit estimate used wherever a revenue series is
/// unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Lower bound for daily visit forecasts
    pub min_visits_per_day: f64,
    /// Upper bound for daily visit forecasts
    pub max_visits_per_day: f64,
    /// Lower bound for per-client quantity forecasts
    pub min_quantity: f64,
    /// Upper bound for per-client quantity forecasts
    pub max_quantity_per_client: f64,
    /// Minimum acceptable daily revenue (the revenue floor)
    pub min_revenue: f64,
    /// Flat revenue estimate per visit, used when no revenue series exists
    pub revenue_per_visit: f64,
    /// Restrict the order grid to simpler models
    pub prefer_simpler_models: bool,
    /// Wall-clock budget for the order grid search, in seconds
    pub max_computation_time_secs: u64,
    /// Blend factor for seasonal effects (0-1)
    pub seasonal_importance: f64,
    /// Blend factor for business-logic terms in the composite score (0-1)
    pub revenue_weight: f64,
    /// Maximum clients routed on a single day
    pub max_clients_per_day: usize,
    /// Origin used when an agent has no known coordinates
    pub default_agent_location: GeoPoint,
    /// Absolute ceiling applied after seasonal adjustment composition
    pub adjustment_ceiling: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            min_visits_per_day: 0.0,
            max_visits_per_day: 20.0,
            min_quantity: 0.0,
            max_quantity_per_client: 100.0,
            min_revenue: 150.0,
            revenue_per_visit: 150.0,
            prefer_simpler_models: true,
            max_computation_time_secs: 120,
            seasonal_importance: 0.8,
            revenue_weight: 0.3,
            max_clients_per_day: 200,
            // Ariana depot coordinates
            default_agent_location: GeoPoint::new(36.862499, 10.195556),
            adjustment_ceiling: 50.0,
        }
    }
}

impl ForecastConfig {
    /// Load a configuration from a TOML string.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ForecastConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check invariants that the rest of the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.seasonal_importance) {
            return Err(Error::Config(format!(
                "seasonal_importance must be within [0, 1], got {}",
                self.seasonal_importance
            )));
        }
        if !(0.0..=1.0).contains(&self.revenue_weight) {
            return Err(Error::Config(format!(
                "revenue_weight must be within [0, 1], got {}",
                self.revenue_weight
            )));
        }
        if self.min_visits_per_day < 0.0 || self.max_visits_per_day < self.min_visits_per_day {
            return Err(Error::Config(
                "visit bounds must satisfy 0 <= min <= max".to_string(),
            ));
        }
        if self.min_quantity < 0.0 || self.max_quantity_per_client < self.min_quantity {
            return Err(Error::Config(
                "quantity bounds must satisfy 0 <= min <= max".to_string(),
            ));
        }
        if self.min_revenue < 0.0 || self.revenue_per_visit <= 0.0 {
            return Err(Error::Config(
                "min_revenue must be >= 0 and revenue_per_visit > 0".to_string(),
            ));
        }
        if self.max_computation_time_secs == 0 {
            return Err(Error::Config(
                "max_computation_time_secs must be positive".to_string(),
            ));
        }
        if self.max_clients_per_day == 0 {
            return Err(Error::Config(
                "max_clients_per_day must be positive".to_string(),
            ));
        }
        if self.adjustment_ceiling <= 0.0 {
            return Err(Error::Config(
                "adjustment_ceiling must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
