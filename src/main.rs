//! Demo binary: runs the full forecasting and planning pipeline on a
//! synthetic year of field-agent activity and prints the key results.

use chrono::{Datelike, Duration, NaiveDate};
use fieldcast::core::{ForecastConfig, Result};
use fieldcast::data::{GeoPoint, HistoricalRecord, LocationDirectory, ProductSale};
use fieldcast::pipeline::{eligible_agents, Orchestrator};
use fieldcast::routing::PlanBuilder;
use rand::Rng;
use std::collections::BTreeMap;

fn main() -> Result<()> {
    let config = ForecastConfig::default();
    let reference = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let agent_id = "7";

    let records = synthetic_history(agent_id, reference);
    let sales = synthetic_sales(reference);

    println!("=== fieldcast {} demo ===\n", fieldcast::VERSION);
    println!(
        "history: {} records through {}",
        records.len(),
        reference - Duration::days(1)
    );

    let agents = eligible_agents(&records, reference);
    for agent in &agents {
        println!(
            "agent {}: {} training record(s), {} client(s)",
            agent.agent_id, agent.training_period_records, agent.unique_clients
        );
    }

    // 365-day dual-horizon optimization
    let mut orchestrator = Orchestrator::new(&config);
    let result = orchestrator.run(&records, agent_id, reference)?;

    println!("\n--- 365-day plan for agent {} ---", agent_id);
    println!("window: {} to {}", result.start_date, result.end_date);
    println!(
        "total visits {:.0}, total revenue {:.0}",
        result.totals.total_predicted_visits, result.totals.total_predicted_revenue
    );
    println!(
        "daily averages: {:.1} visits, {:.1} revenue",
        result.totals.avg_daily_visits, result.totals.avg_daily_revenue
    );
    println!(
        "peak days {}, low days {}, revenue floor met on {} day(s)",
        result.totals.peak_days,
        result.totals.low_activity_days,
        result.totals.revenue_target_met_days
    );
    println!(
        "best month {}, worst month {}, best weekday {}",
        result.insights.best_month, result.insights.worst_month, result.insights.best_weekday
    );
    println!(
        "visits model quality {:.1}/100, seasonal adjustments applied: {}",
        result.model_performance.visits_model_quality,
        result.model_performance.seasonal_adjustments_applied
    );
    if !result.revenue_check.meets_constraint {
        println!("revenue shortfall {:.2}:", result.revenue_check.shortfall);
        for recommendation in &result.revenue_check.recommendations {
            println!("  - {}", recommendation);
        }
    }

    // Delivery plan for one day of the horizon
    let target_date = reference + Duration::days(165);
    let locations = synthetic_locations(agent_id);
    let prices = BTreeMap::new();
    let builder = PlanBuilder::new(&config, &locations, &prices);
    let plan = builder.build(agent_id, target_date, &records, &sales);

    println!("\n--- delivery plan for {} ---", target_date);
    println!(
        "{} stop(s), {:.2} km total",
        plan.stops.len(),
        plan.total_distance_km
    );
    for stop in &plan.stops {
        println!(
            "  {} ({:.2} km leg, {} product(s))",
            stop.client_id,
            stop.distance_km,
            stop.predicted_products.len()
        );
    }
    println!("packing list:");
    for (code, quantity) in &plan.packing_list {
        println!("  {} x{:.0}", code, quantity);
    }

    Ok(())
}

/// Two years of daily activity with weekday uplift and a summer slowdown.
fn synthetic_history(agent_id: &str, reference: NaiveDate) -> Vec<HistoricalRecord> {
    let mut rng = rand::rng();
    let mut records = Vec::new();
    for offset in 1..=730i64 {
        let date = reference - Duration::days(offset);
        let weekday_factor = if date.weekday().num_days_from_monday() < 5 {
            1.4
        } else {
            0.7
        };
        let season_factor = match date.month() {
            7 | 8 => 0.6,
            3 | 9 => 1.3,
            _ => 1.0,
        };
        let visits = (5.0 * weekday_factor * season_factor + rng.random_range(-0.8f64..0.8)).max(0.0);
        records.push(HistoricalRecord {
            date,
            agent_id: agent_id.to_string(),
            client_id: format!("C{:03}", offset % 14),
            visit_count: visits.round(),
            revenue_amount: visits * rng.random_range(120.0..180.0),
        });
    }
    records
}

/// Product sales for a handful of client/product pairs.
fn synthetic_sales(reference: NaiveDate) -> Vec<ProductSale> {
    let mut rng = rand::rng();
    let mut sales = Vec::new();
    for offset in 1..=120i64 {
        let date = reference - Duration::days(offset * 3);
        for (client, product) in [("C001", "NP0101"), ("C002", "NP0101"), ("C003", "NP0205")] {
            sales.push(ProductSale {
                date,
                client_id: client.to_string(),
                product_code: product.to_string(),
                quantity: rng.random_range(2.0f64..7.0).round(),
            });
        }
    }
    sales
}

fn synthetic_locations(agent_id: &str) -> LocationDirectory {
    let mut locations = LocationDirectory::new();
    locations
        .agents
        .insert(agent_id.to_string(), GeoPoint::new(36.8625, 10.1956));
    for i in 0..14 {
        locations.clients.insert(
            format!("C{:03}", i),
            GeoPoint::new(36.75 + (i % 5) as f64 * 0.05, 10.1 + (i % 7) as f64 * 0.04),
        );
    }
    locations
}
