//! Rollups and insights over the merged daily plan
//!
//! Plain sum/mean aggregations by month, weekday and quarter, simple
//! argmax/argmin insights, and the agent-eligibility listing used to decide
//! who has enough training data for a run.

use crate::data::HistoricalRecord;
use crate::pipeline::merge::{DailyPlanRow, PeriodType, RevenueStatus, MONTH_NAMES};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sum/mean aggregation of one calendar bucket (a month, weekday or
/// quarter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub label: String,
    pub days: usize,
    pub total_visits: f64,
    pub avg_visits: f64,
    pub total_revenue: f64,
    pub avg_revenue: f64,
}

/// Horizon-wide totals of the merged plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryTotals {
    pub total_predicted_visits: f64,
    pub total_predicted_revenue: f64,
    pub avg_daily_visits: f64,
    pub avg_daily_revenue: f64,
    pub peak_days: usize,
    pub low_activity_days: usize,
    pub revenue_target_met_days: usize,
}

/// One notable day surfaced in the insights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayHighlight {
    pub date: NaiveDate,
    pub predicted_visits: f64,
    pub predicted_revenue: f64,
}

/// Best/worst periods across the horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insights {
    pub best_month: String,
    pub worst_month: String,
    pub best_weekday: String,
    pub worst_weekday: String,
    pub peak_periods: Vec<DayHighlight>,
    pub low_periods: Vec<DayHighlight>,
}

const WEEKDAY_LABELS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn aggregate<'a, F>(rows: &'a [DailyPlanRow], labels: &[&str], key: F) -> Vec<PeriodSummary>
where
    F: Fn(&'a DailyPlanRow) -> usize,
{
    let mut grouped: BTreeMap<usize, (usize, f64, f64)> = BTreeMap::new();
    for row in rows {
        let entry = grouped.entry(key(row)).or_insert((0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += row.predicted_visits;
        entry.2 += row.predicted_revenue;
    }

    grouped
        .into_iter()
        .map(|(index, (days, visits, revenue))| PeriodSummary {
            label: labels
                .get(index)
                .map(|l| l.to_string())
                .unwrap_or_else(|| index.to_string()),
            days,
            total_visits: visits,
            avg_visits: visits / days as f64,
            total_revenue: revenue,
            avg_revenue: revenue / days as f64,
        })
        .collect()
}

/// Per-month aggregation, only months present in the horizon.
pub fn monthly_summary(rows: &[DailyPlanRow]) -> Vec<PeriodSummary> {
    aggregate(rows, &MONTH_NAMES, |row| row.month as usize - 1)
}

/// Per-weekday averages, Monday first.
pub fn weekday_patterns(rows: &[DailyPlanRow]) -> Vec<PeriodSummary> {
    aggregate(rows, &WEEKDAY_LABELS, |row| {
        WEEKDAY_LABELS
            .iter()
            .position(|label| *label == row.weekday)
            .unwrap_or(0)
    })
}

/// Per-quarter aggregation.
pub fn quarterly_summary(rows: &[DailyPlanRow]) -> Vec<PeriodSummary> {
    aggregate(rows, &["Q1", "Q2", "Q3", "Q4"], |row| {
        row.quarter as usize - 1
    })
}

/// Horizon totals, counting days against the revenue floor.
pub fn totals(rows: &[DailyPlanRow]) -> SummaryTotals {
    let days = rows.len().max(1) as f64;
    let total_visits: f64 = rows.iter().map(|r| r.predicted_visits).sum();
    let total_revenue: f64 = rows.iter().map(|r| r.predicted_revenue).sum();

    SummaryTotals {
        total_predicted_visits: total_visits,
        total_predicted_revenue: total_revenue,
        avg_daily_visits: total_visits / days,
        avg_daily_revenue: total_revenue / days,
        peak_days: rows
            .iter()
            .filter(|r| r.period_type == PeriodType::Peak)
            .count(),
        low_activity_days: rows
            .iter()
            .filter(|r| r.period_type == PeriodType::Low)
            .count(),
        revenue_target_met_days: rows
            .iter()
            .filter(|r| r.revenue_status == RevenueStatus::TargetMet)
            .count(),
    }
}

/// Argmax/argmin insights over the aggregates plus the ten most and least
/// active days.
pub fn build_insights(
    rows: &[DailyPlanRow],
    monthly: &[PeriodSummary],
    weekdays: &[PeriodSummary],
) -> Insights {
    let best_month = extreme_label(monthly, |s| s.total_visits, true);
    let worst_month = extreme_label(monthly, |s| s.total_visits, false);
    let best_weekday = extreme_label(weekdays, |s| s.avg_visits, true);
    let worst_weekday = extreme_label(weekdays, |s| s.avg_visits, false);

    let mut by_visits: Vec<&DailyPlanRow> = rows.iter().collect();
    by_visits.sort_by(|a, b| {
        b.predicted_visits
            .partial_cmp(&a.predicted_visits)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.date.cmp(&b.date))
    });

    let highlight = |row: &DailyPlanRow| DayHighlight {
        date: row.date,
        predicted_visits: row.predicted_visits,
        predicted_revenue: row.predicted_revenue,
    };
    let peak_periods: Vec<DayHighlight> = by_visits.iter().take(10).map(|r| highlight(r)).collect();
    let low_periods: Vec<DayHighlight> = by_visits
        .iter()
        .rev()
        .take(10)
        .map(|r| highlight(r))
        .collect();

    Insights {
        best_month,
        worst_month,
        best_weekday,
        worst_weekday,
        peak_periods,
        low_periods,
    }
}

fn extreme_label<F>(summaries: &[PeriodSummary], key: F, maximum: bool) -> String
where
    F: Fn(&PeriodSummary) -> f64,
{
    let pick = summaries.iter().reduce(|best, candidate| {
        let better = if maximum {
            key(candidate) > key(best)
        } else {
            key(candidate) < key(best)
        };
        if better {
            candidate
        } else {
            best
        }
    });
    pick.map(|s| s.label.clone()).unwrap_or_default()
}

/// Activity summary for one agent over the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentActivity {
    pub agent_id: String,
    pub total_records: usize,
    pub unique_clients: usize,
    pub first_record: NaiveDate,
    pub last_record: NaiveDate,
    pub training_period_records: usize,
}

/// Agents with enough records in the 365-day training window before
/// `reference_date` to be worth running, most active first.
pub fn eligible_agents(
    records: &[HistoricalRecord],
    reference_date: NaiveDate,
) -> Vec<AgentActivity> {
    const MIN_TRAINING_RECORDS: usize = 30;
    let training_start = reference_date - Duration::days(365);

    let mut per_agent: BTreeMap<&str, Vec<&HistoricalRecord>> = BTreeMap::new();
    for record in records {
        per_agent.entry(record.agent_id.as_str()).or_default().push(record);
    }

    let mut activities: Vec<AgentActivity> = per_agent
        .into_iter()
        .filter_map(|(agent_id, agent_records)| {
            let training_period_records = agent_records
                .iter()
                .filter(|r| r.date >= training_start && r.date < reference_date)
                .count();
            if training_period_records < MIN_TRAINING_RECORDS {
                return None;
            }
            let clients: std::collections::BTreeSet<&str> = agent_records
                .iter()
                .map(|r| r.client_id.as_str())
                .collect();
            let first_record = agent_records.iter().map(|r| r.date).min()?;
            let last_record = agent_records.iter().map(|r| r.date).max()?;
            Some(AgentActivity {
                agent_id: agent_id.to_string(),
                total_records: agent_records.len(),
                unique_clients: clients.len(),
                first_record,
                last_record,
                training_period_records,
            })
        })
        .collect();

    activities.sort_by(|a, b| {
        b.training_period_records
            .cmp(&a.training_period_records)
            .then_with(|| b.total_records.cmp(&a.total_records))
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });
    activities
}
