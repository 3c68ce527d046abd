//! Input data model
//!
//! The core never queries a store: callers hand it finite in-memory tables of
//! [`HistoricalRecord`] and [`ProductSale`] rows plus a [`LocationDirectory`]
//! for geocoding. A thin CSV adapter for the external feed format lives in
//! [`io`].

pub mod io;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One aggregated day of activity for an agent/client pair.
///
/// Produced by the external data provider; read-only to the core. Dates are
/// calendar days with no time component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    pub agent_id: String,
    pub client_id: String,
    pub visit_count: f64,
    pub revenue_amount: f64,
}

/// One product-level sale row, used for per-client demand prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSale {
    pub date: NaiveDate,
    pub client_id: String,
    pub product_code: String,
    pub quantity: f64,
}

/// Which column of the historical feed a prepared series tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Daily client-visit counts
    Visits,
    /// Daily revenue totals
    Revenue,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Visits => "visits",
            Metric::Revenue => "revenue",
        }
    }

    /// Extract this metric's value from a record.
    pub fn value_of(&self, record: &HistoricalRecord) -> f64 {
        match self {
            Metric::Visits => record.visit_count,
            Metric::Revenue => record.revenue_amount,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A GPS coordinate (latitude, longitude) in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }
}

/// Known coordinates for agents and clients.
///
/// A missing agent falls back to the configured default origin; missing
/// clients are simply excluded from the routed set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationDirectory {
    pub agents: BTreeMap<String, GeoPoint>,
    pub clients: BTreeMap<String, GeoPoint>,
}

impl LocationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(&self, agent_id: &str) -> Option<GeoPoint> {
        self.agents.get(agent_id).copied()
    }

    pub fn client(&self, client_id: &str) -> Option<GeoPoint> {
        self.clients.get(client_id).copied()
    }
}
