//! Route optimization
//!
//! Orders a day's client stops by greedy nearest-neighbor on great-circle
//! distance. Deliberately simple: at the scale of one agent's daily client
//! set, determinism and correctness beat asymptotic optimality. Client
//! selection for a future date is a seasonal-recurrence heuristic over the
//! same day-of-month and month in prior years.

pub mod plan;

pub use plan::{DeliveryPlan, PlanBuilder, ProductPrediction, RouteStop};

use crate::data::{GeoPoint, HistoricalRecord};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle (haversine) distance between two coordinates, in km.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Visit order by greedy nearest-neighbor from `origin`.
///
/// Deterministic: when two clients tie on distance, the ascending client id
/// wins (the map iterates in id order and only a strictly smaller distance
/// displaces the current pick).
pub fn optimal_route(origin: GeoPoint, clients: &BTreeMap<String, GeoPoint>) -> Vec<String> {
    let mut unvisited = clients.clone();
    let mut route = Vec::with_capacity(unvisited.len());
    let mut position = origin;

    while !unvisited.is_empty() {
        let mut nearest: Option<(String, GeoPoint, f64)> = None;
        for (client_id, location) in &unvisited {
            let distance = haversine_km(position, *location);
            let closer = match &nearest {
                Some((_, _, best)) => distance < *best,
                None => true,
            };
            if closer {
                nearest = Some((client_id.clone(), *location, distance));
            }
        }
        if let Some((client_id, location, _)) = nearest {
            unvisited.remove(&client_id);
            route.push(client_id);
            position = location;
        }
    }
    route
}

/// Rank an agent's historical clients by how often they were visited on the
/// same day-of-month and month in prior years, and keep the top
/// `max_clients`. Ties break toward the ascending client id.
pub fn recurring_clients_for_date(
    records: &[HistoricalRecord],
    target_date: NaiveDate,
    max_clients: usize,
) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        if record.date.day() == target_date.day()
            && record.date.month() == target_date.month()
            && record.date.year() < target_date.year()
        {
            *counts.entry(record.client_id.clone()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(max_clients);
    ranked.into_iter().map(|(client_id, _)| client_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    #[test]
    fn test_haversine_known_distance() {
        // Tunis to Sfax is roughly 230 km
        let tunis = point(36.8065, 10.1815);
        let sfax = point(34.7406, 10.7603);
        let distance = haversine_km(tunis, sfax);
        assert!((distance - 235.0).abs() < 15.0, "got {}", distance);
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = point(36.8, 10.2);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn test_route_visits_nearest_first() {
        let origin = point(36.0, 10.0);
        let mut clients = BTreeMap::new();
        clients.insert("far".to_string(), point(38.0, 10.0));
        clients.insert("near".to_string(), point(36.1, 10.0));
        clients.insert("mid".to_string(), point(37.0, 10.0));

        let route = optimal_route(origin, &clients);
        assert_eq!(route, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_route_is_deterministic() {
        let origin = point(36.0, 10.0);
        let mut clients = BTreeMap::new();
        for i in 0..20 {
            clients.insert(
                format!("C{:03}", i),
                point(36.0 + (i % 5) as f64 * 0.1, 10.0 + (i % 7) as f64 * 0.1),
            );
        }

        let first = optimal_route(origin, &clients);
        let second = optimal_route(origin, &clients);
        assert_eq!(first, second);
        assert_eq!(first.len(), 20);
    }

    #[test]
    fn test_distance_ties_break_by_client_id() {
        let origin = point(36.0, 10.0);
        let mut clients = BTreeMap::new();
        // Same coordinates, so every leg ties
        clients.insert("B".to_string(), point(36.5, 10.0));
        clients.insert("A".to_string(), point(36.5, 10.0));
        clients.insert("C".to_string(), point(36.5, 10.0));

        let route = optimal_route(origin, &clients);
        assert_eq!(route, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_empty_client_set_routes_empty() {
        let route = optimal_route(point(36.0, 10.0), &BTreeMap::new());
        assert!(route.is_empty());
    }

    #[test]
    fn test_recurring_clients_ranked_by_frequency() {
        let mut records = Vec::new();
        let mut add = |year: i32, client: &str| {
            records.push(HistoricalRecord {
                date: NaiveDate::from_ymd_opt(year, 6, 15).unwrap(),
                agent_id: "7".to_string(),
                client_id: client.to_string(),
                visit_count: 1.0,
                revenue_amount: 100.0,
            });
        };
        add(2022, "C1");
        add(2023, "C1");
        add(2023, "C2");
        // Different day, must not count
        records.push(HistoricalRecord {
            date: NaiveDate::from_ymd_opt(2023, 6, 16).unwrap(),
            agent_id: "7".to_string(),
            client_id: "C3".to_string(),
            visit_count: 1.0,
            revenue_amount: 100.0,
        });

        let target = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let clients = recurring_clients_for_date(&records, target, 10);
        assert_eq!(clients, vec!["C1", "C2"]);

        let capped = recurring_clients_for_date(&records, target, 1);
        assert_eq!(capped, vec!["C1"]);
    }

    #[test]
    fn test_recurring_clients_ignores_future_years() {
        let records = vec![HistoricalRecord {
            date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            agent_id: "7".to_string(),
            client_id: "C1".to_string(),
            visit_count: 1.0,
            revenue_amount: 100.0,
        }];
        let target = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert!(recurring_clients_for_date(&records, target, 10).is_empty());
    }
}
