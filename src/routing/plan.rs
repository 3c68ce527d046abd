//! Delivery plan assembly
//!
//! Combines the routed client order with per-client product demand
//! predictions into one immutable [`DeliveryPlan`]: ordered stops with leg
//! distances, predicted products priced out, and an aggregated packing
//! list.

use crate::core::config::ForecastConfig;
use crate::data::{GeoPoint, HistoricalRecord, LocationDirectory, ProductSale};
use crate::forecasting::{ModelOrder, SarimaModel};
use crate::routing::{haversine_km, optimal_route, recurring_clients_for_date};
use crate::time_series::{Frequency, TimeSeries};
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum daily observations before a product gets its own model fit.
const MIN_OBSERVATIONS_FOR_MODEL: usize = 12;

/// Products carried per client in a plan.
const MAX_PRODUCTS_PER_CLIENT: usize = 10;

/// Default quantity when a client/product pair has no history at all.
const DEFAULT_QUANTITY: f64 = 5.0;

/// A predicted product line for one client stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPrediction {
    pub quantity: f64,
    pub price: f64,
    pub total_value: f64,
    pub currency: String,
}

/// One stop on the routed delivery plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub client_id: String,
    pub location: GeoPoint,
    /// Distance from the previous stop (or the origin), in km
    pub distance_km: f64,
    pub predicted_products: BTreeMap<String, ProductPrediction>,
}

/// A complete delivery plan for one agent and date. Immutable after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPlan {
    pub agent_id: String,
    pub date: NaiveDate,
    pub origin: GeoPoint,
    pub stops: Vec<RouteStop>,
    /// Total predicted quantity per product code across all stops
    pub packing_list: BTreeMap<String, f64>,
    pub total_distance_km: f64,
}

/// Builds delivery plans from history, sales and locations.
#[derive(Debug, Clone)]
pub struct PlanBuilder<'a> {
    config: &'a ForecastConfig,
    locations: &'a LocationDirectory,
    prices: &'a BTreeMap<String, f64>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(
        config: &'a ForecastConfig,
        locations: &'a LocationDirectory,
        prices: &'a BTreeMap<String, f64>,
    ) -> Self {
        PlanBuilder {
            config,
            locations,
            prices,
        }
    }

    /// Assemble the plan for `agent_id` on `date`.
    ///
    /// A missing agent location falls back to the configured default origin;
    /// clients without coordinates are dropped from the routed set. Both are
    /// logged, and a plan is produced either way.
    pub fn build(
        &self,
        agent_id: &str,
        date: NaiveDate,
        history: &[HistoricalRecord],
        sales: &[ProductSale],
    ) -> DeliveryPlan {
        self.build_filtered(agent_id, date, history, sales, None)
    }

    /// Like [`PlanBuilder::build`], but restricted to the given product
    /// codes. Pairs with no sales history at all get a jittered default
    /// quantity.
    pub fn build_filtered(
        &self,
        agent_id: &str,
        date: NaiveDate,
        history: &[HistoricalRecord],
        sales: &[ProductSale],
        product_filter: Option<&[String]>,
    ) -> DeliveryPlan {
        let origin = match self.locations.agent(agent_id) {
            Some(location) => location,
            None => {
                log::warn!(
                    "agent {} has no known location, using default origin",
                    agent_id
                );
                self.config.default_agent_location
            }
        };

        let candidates =
            recurring_clients_for_date(history, date, self.config.max_clients_per_day);
        let mut client_locations: BTreeMap<String, GeoPoint> = BTreeMap::new();
        for client_id in &candidates {
            match self.locations.client(client_id) {
                Some(location) => {
                    client_locations.insert(client_id.clone(), location);
                }
                None => {
                    log::warn!(
                        "client {} has no known location, dropped from route for {}",
                        client_id,
                        date
                    );
                }
            }
        }

        let route = optimal_route(origin, &client_locations);
        log::info!(
            "plan {} {}: {} candidate client(s), {} routed",
            agent_id,
            date,
            candidates.len(),
            route.len()
        );

        let mut stops = Vec::with_capacity(route.len());
        let mut packing_list: BTreeMap<String, f64> = BTreeMap::new();
        let mut total_distance_km = 0.0;
        let mut position = origin;

        for client_id in route {
            let location = client_locations[&client_id];
            let distance_km = round2(haversine_km(position, location));
            total_distance_km += distance_km;
            position = location;

            let predicted_products =
                self.predict_products(&client_id, date, sales, product_filter);
            for (code, prediction) in &predicted_products {
                *packing_list.entry(code.clone()).or_insert(0.0) += prediction.quantity;
            }

            stops.push(RouteStop {
                client_id,
                location,
                distance_km,
                predicted_products,
            });
        }

        DeliveryPlan {
            agent_id: agent_id.to_string(),
            date,
            origin,
            stops,
            packing_list,
            total_distance_km: round2(total_distance_km),
        }
    }

    /// Predict quantities for the client's known products on the delivery
    /// date and price them out.
    fn predict_products(
        &self,
        client_id: &str,
        date: NaiveDate,
        sales: &[ProductSale],
        product_filter: Option<&[String]>,
    ) -> BTreeMap<String, ProductPrediction> {
        let products: Vec<&str> = match product_filter {
            Some(codes) => codes.iter().map(|c| c.as_str()).collect(),
            None => {
                // Most frequently sold products for this client, id-ascending
                // on ties
                let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
                for sale in sales.iter().filter(|s| s.client_id == client_id) {
                    *frequency.entry(sale.product_code.as_str()).or_insert(0) += 1;
                }
                let mut ranked: Vec<(&str, usize)> = frequency.into_iter().collect();
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
                ranked.truncate(MAX_PRODUCTS_PER_CLIENT);
                ranked.into_iter().map(|(code, _)| code).collect()
            }
        };

        let mut predictions = BTreeMap::new();
        for product_code in products {
            let quantity = self.predict_quantity(client_id, product_code, date, sales);
            let price = self.lookup_price(product_code);
            predictions.insert(
                product_code.to_string(),
                ProductPrediction {
                    quantity,
                    price,
                    total_value: round2(quantity * price),
                    currency: "TND".to_string(),
                },
            );
        }
        predictions
    }

    /// Per-pair demand: enough history gets a short model forecast to the
    /// delivery date, thin history falls back to the historical mean, and a
    /// cold pair gets a jittered default quantity.
    fn predict_quantity(
        &self,
        client_id: &str,
        product_code: &str,
        date: NaiveDate,
        sales: &[ProductSale],
    ) -> f64 {
        let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for sale in sales
            .iter()
            .filter(|s| s.client_id == client_id && s.product_code == product_code)
        {
            *daily.entry(sale.date).or_insert(0.0) += sale.quantity;
        }

        let quantity = if daily.is_empty() {
            let jitter = rand::rng().random_range(0.7..1.5);
            DEFAULT_QUANTITY * jitter
        } else if daily.len() < MIN_OBSERVATIONS_FOR_MODEL {
            let quantities: Vec<f64> = daily.values().copied().collect();
            crate::stats::mean(&quantities)
        } else {
            self.model_quantity(&daily, date)
                .unwrap_or_else(|| {
                    let quantities: Vec<f64> = daily.values().copied().collect();
                    crate::stats::mean(&quantities)
                })
        };

        let min = self.config.min_quantity.max(1.0);
        quantity.round().clamp(min, self.config.max_quantity_per_client)
    }

    /// Fit a short seasonal model on the pair's gap-free daily series and
    /// forecast out to the delivery date.
    fn model_quantity(&self, daily: &BTreeMap<NaiveDate, f64>, date: NaiveDate) -> Option<f64> {
        let first = *daily.keys().next()?;
        let last = *daily.keys().next_back()?;

        let len = (last - first).num_days() as usize + 1;
        let mut values = Vec::with_capacity(len);
        let mut cursor = first;
        while cursor <= last {
            values.push(daily.get(&cursor).copied().unwrap_or(0.0));
            cursor = cursor.succ_opt()?;
        }

        // Order picked from series length, mirroring how thin real-world
        // demand histories behave
        let order = if values.len() < 14 {
            ModelOrder::arima(1, 0, 0)
        } else if values.len() < 30 {
            ModelOrder::arima(1, 0, 1)
        } else {
            ModelOrder::new(1, 1, 1, 1, 1, 1, 7)
        };

        let steps = (date - last).num_days();
        if steps <= 0 {
            return daily.get(&date).copied();
        }

        let series = TimeSeries::from_range(first, values, Frequency::Daily);
        let fitted = SarimaModel::new(order).fit(&series).ok()?;
        let forecast = fitted.forecast(steps as usize).ok()?;
        forecast.values.last().map(|v| v.max(0.0))
    }

    /// Known price, or a deterministic pseudo-price derived from the
    /// product code when the price list has no entry.
    fn lookup_price(&self, product_code: &str) -> f64 {
        if let Some(price) = self.prices.get(product_code) {
            return *price;
        }
        20.0 + (code_hash(product_code) % 50) as f64
    }
}

/// Stable, platform-independent hash of a product code. Prices derived from
/// it must not change between runs.
fn code_hash(code: &str) -> u64 {
    code.bytes()
        .fold(1469598103934665603u64, |acc, byte| {
            (acc ^ byte as u64).wrapping_mul(1099511628211)
        })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(d: NaiveDate, client: &str) -> HistoricalRecord {
        HistoricalRecord {
            date: d,
            agent_id: "7".to_string(),
            client_id: client.to_string(),
            visit_count: 1.0,
            revenue_amount: 150.0,
        }
    }

    /// Three clients visited on June 15 across prior years, with known
    /// coordinates.
    fn fixture() -> (Vec<HistoricalRecord>, LocationDirectory) {
        let mut history = Vec::new();
        for year in [2022, 2023] {
            for client in ["C1", "C2", "C3"] {
                history.push(record(date(year, 6, 15), client));
            }
        }

        let mut locations = LocationDirectory::new();
        locations
            .agents
            .insert("7".to_string(), GeoPoint::new(36.8, 10.18));
        locations
            .clients
            .insert("C1".to_string(), GeoPoint::new(36.81, 10.18));
        locations
            .clients
            .insert("C2".to_string(), GeoPoint::new(36.9, 10.2));
        locations
            .clients
            .insert("C3".to_string(), GeoPoint::new(36.85, 10.19));
        (history, locations)
    }

    #[test]
    fn test_plan_routes_known_clients_in_distance_order() {
        let (history, locations) = fixture();
        let config = ForecastConfig::default();
        let prices = BTreeMap::new();
        let builder = PlanBuilder::new(&config, &locations, &prices);

        let plan = builder.build("7", date(2024, 6, 15), &history, &[]);
        let order: Vec<&str> = plan.stops.iter().map(|s| s.client_id.as_str()).collect();
        assert_eq!(order, vec!["C1", "C3", "C2"]);
        assert!(plan.total_distance_km > 0.0);
    }

    #[test]
    fn test_missing_agent_location_uses_default_origin() {
        let (history, mut locations) = fixture();
        locations.agents.clear();
        let config = ForecastConfig::default();
        let prices = BTreeMap::new();
        let builder = PlanBuilder::new(&config, &locations, &prices);

        let plan = builder.build("7", date(2024, 6, 15), &history, &[]);
        assert_eq!(plan.origin, config.default_agent_location);
        assert_eq!(plan.stops.len(), 3, "route still computed for all clients");
    }

    #[test]
    fn test_missing_client_location_drops_client_only() {
        let (history, mut locations) = fixture();
        locations.clients.remove("C2");
        let config = ForecastConfig::default();
        let prices = BTreeMap::new();
        let builder = PlanBuilder::new(&config, &locations, &prices);

        let plan = builder.build("7", date(2024, 6, 15), &history, &[]);
        let routed: Vec<&str> = plan.stops.iter().map(|s| s.client_id.as_str()).collect();
        assert!(!routed.contains(&"C2"));
        assert_eq!(routed.len(), 2);
    }

    #[test]
    fn test_packing_list_aggregates_quantities_across_stops() {
        let (history, locations) = fixture();
        let config = ForecastConfig::default();
        let prices = BTreeMap::new();
        let builder = PlanBuilder::new(&config, &locations, &prices);

        // Stable demand history for the same product at two clients
        let mut sales = Vec::new();
        for i in 0..10 {
            for client in ["C1", "C2"] {
                sales.push(ProductSale {
                    date: date(2024, 5, 1 + i),
                    client_id: client.to_string(),
                    product_code: "NP01".to_string(),
                    quantity: 4.0,
                });
            }
        }

        let plan = builder.build("7", date(2024, 6, 15), &history, &sales);
        // Mean-based prediction of 4 per client, two clients carry NP01
        assert_eq!(plan.packing_list.get("NP01"), Some(&8.0));
    }

    #[test]
    fn test_quantity_clamped_to_configured_maximum() {
        let (history, locations) = fixture();
        let config = ForecastConfig::default();
        let prices = BTreeMap::new();
        let builder = PlanBuilder::new(&config, &locations, &prices);

        let sales = vec![ProductSale {
            date: date(2024, 5, 1),
            client_id: "C1".to_string(),
            product_code: "NP02".to_string(),
            quantity: 900.0,
        }];
        let plan = builder.build("7", date(2024, 6, 15), &history, &sales);
        let stop = plan
            .stops
            .iter()
            .find(|s| s.client_id == "C1")
            .expect("C1 routed");
        let prediction = stop.predicted_products.get("NP02").expect("NP02 predicted");
        assert_eq!(prediction.quantity, config.max_quantity_per_client);
    }

    #[test]
    fn test_cold_pair_gets_jittered_default_quantity() {
        let (history, locations) = fixture();
        let config = ForecastConfig::default();
        let prices = BTreeMap::new();
        let builder = PlanBuilder::new(&config, &locations, &prices);

        // No sales at all for the filtered product
        let filter = vec!["NP099".to_string()];
        let plan =
            builder.build_filtered("7", date(2024, 6, 15), &history, &[], Some(&filter));
        let stop = plan.stops.first().expect("clients routed");
        let prediction = stop.predicted_products.get("NP099").expect("NP099 predicted");

        // Default of 5 jittered by 0.7-1.5 and rounded
        assert!(prediction.quantity >= 3.0 && prediction.quantity <= 8.0);
    }

    #[test]
    fn test_fallback_price_is_deterministic_and_in_range() {
        let config = ForecastConfig::default();
        let locations = LocationDirectory::new();
        let prices = BTreeMap::new();
        let builder = PlanBuilder::new(&config, &locations, &prices);

        let first = builder.lookup_price("NP0103");
        let second = builder.lookup_price("NP0103");
        assert_eq!(first, second);
        assert!((20.0..70.0).contains(&first));

        let mut with_prices = BTreeMap::new();
        with_prices.insert("NP0103".to_string(), 31.5);
        let priced = PlanBuilder::new(&config, &locations, &with_prices);
        assert_eq!(priced.lookup_price("NP0103"), 31.5);
    }

    #[test]
    fn test_product_values_priced_out() {
        let (history, locations) = fixture();
        let config = ForecastConfig::default();
        let mut prices = BTreeMap::new();
        prices.insert("NP01".to_string(), 10.0);
        let builder = PlanBuilder::new(&config, &locations, &prices);

        let sales: Vec<ProductSale> = (0..8)
            .map(|i| ProductSale {
                date: date(2024, 5, 1 + i),
                client_id: "C1".to_string(),
                product_code: "NP01".to_string(),
                quantity: 3.0,
            })
            .collect();

        let plan = builder.build("7", date(2024, 6, 15), &history, &sales);
        let stop = plan.stops.iter().find(|s| s.client_id == "C1").unwrap();
        let prediction = &stop.predicted_products["NP01"];
        assert_eq!(prediction.quantity, 3.0);
        assert_eq!(prediction.price, 10.0);
        assert_eq!(prediction.total_value, 30.0);
        assert_eq!(prediction.currency, "TND");
    }

    #[test]
    fn test_no_recurring_clients_yields_empty_plan() {
        let (_, locations) = fixture();
        let config = ForecastConfig::default();
        let prices = BTreeMap::new();
        let builder = PlanBuilder::new(&config, &locations, &prices);

        let plan = builder.build("7", date(2024, 6, 15), &[], &[]);
        assert!(plan.stops.is_empty());
        assert!(plan.packing_list.is_empty());
        assert_eq!(plan.total_distance_km, 0.0);
    }
}
