use chrono::{Datelike, Duration, NaiveDate};
use fieldcast::core::{Error, ForecastConfig};
use fieldcast::data::{GeoPoint, HistoricalRecord, LocationDirectory};
use fieldcast::forecasting::{BusinessForecaster, OrderSelector};
use fieldcast::pipeline::{Orchestrator, PipelineStage};
use fieldcast::routing::{optimal_route, PlanBuilder};
use fieldcast::seasonal::PatternDetector;
use fieldcast::time_series::{prepare, Frequency, TimeSeries};
use fieldcast::Metric;
use std::collections::BTreeMap;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn record(d: NaiveDate, agent: &str, client: &str, visits: f64, revenue: f64) -> HistoricalRecord {
    HistoricalRecord {
        date: d,
        agent_id: agent.to_string(),
        client_id: client.to_string(),
        visit_count: visits,
        revenue_amount: revenue,
    }
}

/// Fourteen months of daily visit history with a clear 1.3-1.6x weekday
/// uplift and quiet weekends.
fn weekday_heavy_history(agent: &str, reference: NaiveDate) -> Vec<HistoricalRecord> {
    const DAY_MULTIPLIERS: [f64; 7] = [1.3, 1.4, 1.5, 1.6, 1.4, 0.6, 0.5];
    let mut records = Vec::new();
    for offset in 1..=425i64 {
        let day = reference - Duration::days(offset);
        let weekday = day.weekday().num_days_from_monday() as usize;
        let visits = 5.0 * DAY_MULTIPLIERS[weekday] + (offset % 3) as f64 * 0.2;
        records.push(record(
            day,
            agent,
            &format!("C{:02}", offset % 9),
            visits,
            visits * 150.0,
        ));
    }
    records
}

#[test]
fn weekly_pattern_scenario_detects_and_raises_weekdays() {
    let reference = date(2025, 3, 1);
    let records = weekday_heavy_history("7", reference);

    let prepared = prepare(&records, Metric::Visits, Frequency::Daily).unwrap();
    let profile = PatternDetector::new().detect(&prepared.series);

    let weekly = profile.weekly.as_ref().expect("weekly pattern computed");
    assert!(
        weekly.has_strong_pattern,
        "weekday uplift must register as a strong pattern (strength {})",
        weekly.pattern_strength
    );

    // A flat prediction over one future week must rise on weekdays and drop
    // on the weekend after adjustment
    let monday = date(2025, 3, 3);
    let week: Vec<NaiveDate> = (0..7).map(|i| monday + Duration::days(i)).collect();
    let (adjusted, applied) = profile.adjust(&[5.0; 7], &week, 50.0);

    assert!(applied.contains(&"weekly_pattern".to_string()));
    for weekday in 0..5 {
        assert!(
            adjusted[weekday] > 5.0,
            "weekday {} should be raised, got {}",
            weekday,
            adjusted[weekday]
        );
    }
    assert!(adjusted[6] < 5.0, "Sunday should drop, got {}", adjusted[6]);
}

#[test]
fn full_pipeline_produces_complete_bounded_plan() {
    let config = ForecastConfig::default();
    let reference = date(2025, 3, 1);
    let records = weekday_heavy_history("7", reference);

    let mut orchestrator = Orchestrator::new(&config);
    let result = orchestrator.run(&records, "7", reference).unwrap();

    // Completeness: exactly one row per calendar day, no gaps
    assert_eq!(result.daily_plan.len(), 365);
    for (i, row) in result.daily_plan.iter().enumerate() {
        assert_eq!(row.date, reference + Duration::days(i as i64 + 1));
    }

    // Bounds and monotone intervals
    for row in &result.daily_plan {
        assert!(row.predicted_visits >= config.min_visits_per_day);
        assert!(row.predicted_visits <= config.max_visits_per_day);
        assert!(row.visits_lower >= 0.0);
        assert!(
            row.visits_lower <= row.predicted_visits && row.predicted_visits <= row.visits_upper
        );
        assert!(row.predicted_revenue >= 0.0);
    }

    assert_eq!(orchestrator.stage(), PipelineStage::Done);
    assert!(result.model_performance.visits_model_quality > 0.0);
    assert_eq!(result.weekly_patterns.len(), 7);
}

#[test]
fn three_row_history_fails_without_a_plan() {
    let config = ForecastConfig::default();
    let reference = date(2025, 3, 1);
    let records = vec![
        record(reference - Duration::days(30), "7", "C1", 2.0, 300.0),
        record(reference - Duration::days(60), "7", "C1", 3.0, 400.0),
        record(reference - Duration::days(90), "7", "C2", 1.0, 100.0),
    ];

    let mut orchestrator = Orchestrator::new(&config);
    let result = orchestrator.run(&records, "7", reference);

    assert!(matches!(result, Err(Error::InsufficientData(_))));
    assert_eq!(orchestrator.stage(), PipelineStage::Failed);
}

#[test]
fn revenue_floor_met_reports_zero_shortfall() {
    let mut config = ForecastConfig::default();
    config.min_revenue = 500.0;
    let forecaster = BusinessForecaster::new(&config);

    let check = forecaster.validate_revenue(&[620.0; 365]);
    assert!(check.meets_constraint);
    assert_eq!(check.shortfall, 0.0);
}

#[test]
fn revenue_floor_violation_reports_shortfall_and_recommendations() {
    let mut config = ForecastConfig::default();
    config.min_revenue = 2000.0;
    let forecaster = BusinessForecaster::new(&config);

    let check = forecaster.validate_revenue(&[800.0; 365]);
    assert!(!check.meets_constraint);
    assert!((check.shortfall - 1200.0).abs() < 1e-10);
    assert!(!check.recommendations.is_empty());
}

#[test]
fn selector_falls_back_when_no_candidate_fits() {
    let config = ForecastConfig::default();
    let selector = OrderSelector::new(&config, 7);

    // A single observation defeats every grid candidate's fit; the
    // data-shape fallback must still return an order
    let series = TimeSeries::from_range(date(2024, 1, 1), vec![4.0], Frequency::Daily);
    let outcome = selector.select(&series);

    assert!(outcome.fallback_used);
    assert_eq!(outcome.order.p, 1);
    assert_eq!(outcome.order.s, 7);
}

#[test]
fn route_is_deterministic_across_calls() {
    let origin = GeoPoint::new(36.8, 10.2);
    let mut clients = BTreeMap::new();
    for i in 0..30 {
        clients.insert(
            format!("C{:03}", i),
            GeoPoint::new(36.5 + (i % 6) as f64 * 0.07, 10.0 + (i % 4) as f64 * 0.09),
        );
    }

    let first = optimal_route(origin, &clients);
    for _ in 0..5 {
        assert_eq!(optimal_route(origin, &clients), first);
    }
}

#[test]
fn missing_agent_location_still_routes_located_clients() {
    let config = ForecastConfig::default();
    let target = date(2025, 6, 15);

    // Three clients visited on the same day/month in prior years
    let mut history = Vec::new();
    for year in [2023, 2024] {
        for client in ["C1", "C2", "C3"] {
            history.push(record(date(year, 6, 15), "7", client, 1.0, 200.0));
        }
    }

    // Clients have coordinates, the agent does not
    let mut locations = LocationDirectory::new();
    locations
        .clients
        .insert("C1".to_string(), GeoPoint::new(36.87, 10.20));
    locations
        .clients
        .insert("C2".to_string(), GeoPoint::new(36.88, 10.21));
    locations
        .clients
        .insert("C3".to_string(), GeoPoint::new(36.86, 10.19));

    let prices = BTreeMap::new();
    let builder = PlanBuilder::new(&config, &locations, &prices);
    let plan = builder.build("7", target, &history, &[]);

    assert_eq!(plan.origin, config.default_agent_location);
    assert_eq!(plan.stops.len(), 3);
    assert!(plan.total_distance_km > 0.0);
}

#[test]
fn preparer_is_idempotent_end_to_end() {
    let reference = date(2025, 3, 1);
    let mut records = weekday_heavy_history("7", reference);
    records[40].visit_count = 180.0; // an outlier to clean
    records[90].visit_count = -3.0; // a negative to clamp

    let first = prepare(&records, Metric::Visits, Frequency::Daily).unwrap();
    let second = prepare(&records, Metric::Visits, Frequency::Daily).unwrap();

    assert_eq!(first.series, second.series);
    assert_eq!(first.quality, second.quality);
    assert_eq!(first.quality.negatives_clamped, 1);
    assert!(first.quality.outliers_adjusted >= 1);
}

#[test]
fn csv_feed_round_trips_into_the_pipeline() {
    use std::io::Write;

    let reference = date(2025, 3, 1);
    let records = weekday_heavy_history("7", reference);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "date,agent_id,client_id,visit_count,revenue_amount").unwrap();
    for r in &records {
        writeln!(
            file,
            "{},{},{},{},{}",
            r.date, r.agent_id, r.client_id, r.visit_count, r.revenue_amount
        )
        .unwrap();
    }

    let loaded = fieldcast::data::io::read_history_csv(file.path()).unwrap();
    assert_eq!(loaded.len(), records.len());

    let agents = fieldcast::pipeline::eligible_agents(&loaded, reference);
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].agent_id, "7");
    assert!(agents[0].training_period_records >= 30);
}
