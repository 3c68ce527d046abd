//! # fieldcast
//!
//! Seasonal visit and revenue forecasting with daily delivery planning for
//! field agents.
//!
//! The pipeline cleans an agent's raw activity log into gap-free series,
//! detects weekly/monthly/holiday patterns, auto-selects a seasonal ARIMA
//! order under business constraints, produces bounded and floor-aware
//! forecasts over a 365-day horizon, and turns the predicted client activity
//! into routed delivery plans.
//!
//! ```no_run
//! use fieldcast::core::ForecastConfig;
//! use fieldcast::pipeline::Orchestrator;
//!
//! let config = ForecastConfig::default();
//! let records = fieldcast::data::io::read_history_csv("history.csv")?;
//! let reference = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
//!
//! let mut orchestrator = Orchestrator::new(&config);
//! let result = orchestrator.run(&records, "7", reference)?;
//! println!("total predicted visits: {}", result.totals.total_predicted_visits);
//! # Ok::<(), fieldcast::core::Error>(())
//! ```

pub mod core;
pub mod data;
pub mod forecasting;
pub mod pipeline;
pub mod routing;
pub mod seasonal;
pub mod stats;
pub mod time_series;

// Re-export commonly used types
pub use crate::core::{Error, ForecastConfig, Result};
pub use data::{GeoPoint, HistoricalRecord, LocationDirectory, Metric, ProductSale};
pub use forecasting::{
    BusinessForecaster, Forecast, ModelOrder, OrderSelector, PredictionKind, RevenueCheck,
    SelectionOutcome,
};
pub use pipeline::{OptimizationResult, Orchestrator, PipelineStage};
pub use routing::{optimal_route, DeliveryPlan, PlanBuilder};
pub use seasonal::{PatternDetector, ProfileCache, SeasonalProfile};
pub use time_series::{prepare, Frequency, PreparedSeries, TimeSeries};

// Export version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
