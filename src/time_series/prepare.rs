//! Series preparation
//!
//! Turns a raw per-agent event log into a clean, fixed-frequency series:
//! duplicates collapse additively, negatives are clamped (counts) or dropped
//! (currency), outliers are tamed with an IQR fence, and the calendar range
//! is made gap-free. The accompanying [`DataQuality`] report records what the
//! cleaning had to do.

use crate::core::error::{Error, Result};
use crate::data::{HistoricalRecord, Metric};
use crate::stats;
use crate::time_series::{Frequency, TimeSeries};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// A cleaned series plus the data-quality findings produced while cleaning.
#[derive(Debug, Clone)]
pub struct PreparedSeries {
    pub series: TimeSeries,
    pub quality: DataQuality,
}

/// What the preparation pass observed and corrected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQuality {
    /// Calendar buckets that had source data (the rest were imputed)
    pub observed_points: usize,
    /// Share of calendar buckets that had source data, in [0, 1]
    pub coverage: f64,
    /// Negative count values clamped to zero
    pub negatives_clamped: usize,
    /// Non-positive currency rows dropped before aggregation
    pub rows_dropped: usize,
    /// Outliers replaced or clipped
    pub outliers_adjusted: usize,
    /// Share of non-zero observations in the final series
    pub non_zero_share: f64,
}

/// Clean and regularize `records` into a gap-free series of `metric` at
/// `frequency`.
///
/// All records must belong to one agent. Fails with
/// [`Error::InsufficientData`] when fewer than two usable observations
/// remain; never returns an empty-but-valid series.
pub fn prepare(
    records: &[HistoricalRecord],
    metric: Metric,
    frequency: Frequency,
) -> Result<PreparedSeries> {
    if records.is_empty() {
        return Err(Error::InsufficientData(
            "no historical records supplied".to_string(),
        ));
    }

    let agent_id = &records[0].agent_id;
    if records.iter().any(|r| &r.agent_id != agent_id) {
        return Err(Error::InvalidInput(
            "records span more than one agent".to_string(),
        ));
    }

    let mut quality = DataQuality::default();

    // Additive aggregation per calendar bucket, with metric-specific
    // handling of bad values: counts clamp to zero, currency rows drop.
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records {
        let raw = metric.value_of(record);
        let value = match metric {
            Metric::Visits => {
                if raw < 0.0 {
                    quality.negatives_clamped += 1;
                    0.0
                } else {
                    raw
                }
            }
            Metric::Revenue => {
                if raw <= 0.0 {
                    quality.rows_dropped += 1;
                    continue;
                }
                raw
            }
        };
        *buckets.entry(frequency.bucket(record.date)).or_insert(0.0) += value;
    }

    if quality.negatives_clamped > 0 {
        log::warn!(
            "agent {}: clamped {} negative {} values to zero",
            agent_id,
            quality.negatives_clamped,
            metric
        );
    }
    if quality.rows_dropped > 0 {
        log::warn!(
            "agent {}: dropped {} non-positive {} rows",
            agent_id,
            quality.rows_dropped,
            metric
        );
    }

    if buckets.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "agent {}: only {} usable {} observation(s) after cleaning",
            agent_id,
            buckets.len(),
            metric
        )));
    }

    // Reindex onto the full calendar range. Interior gaps become explicit
    // missing slots to be filled below.
    let (first, last) = match (buckets.keys().next(), buckets.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(Error::InsufficientData(
                "no usable observations after cleaning".to_string(),
            ))
        }
    };
    let step = frequency.step_days();
    let total = ((last - first).num_days() / step) as usize + 1;

    let mut dates = Vec::with_capacity(total);
    let mut slots: Vec<Option<f64>> = Vec::with_capacity(total);
    let mut cursor = first;
    while cursor <= last {
        dates.push(cursor);
        slots.push(buckets.get(&cursor).copied());
        cursor += Duration::days(step);
    }

    quality.observed_points = buckets.len();
    quality.coverage = buckets.len() as f64 / total as f64;
    let mut values = fill_gaps(&slots, metric, quality.coverage);
    quality.outliers_adjusted = handle_outliers(&mut values);
    if quality.outliers_adjusted > 0 {
        log::info!(
            "agent {}: adjusted {} outlier(s) in the {} series",
            agent_id,
            quality.outliers_adjusted,
            metric
        );
    }

    let non_zero = values.iter().filter(|v| **v > 0.0).count();
    quality.non_zero_share = non_zero as f64 / values.len() as f64;
    if quality.non_zero_share < 0.3 {
        log::warn!(
            "agent {}: sparse {} series, only {}/{} non-zero points",
            agent_id,
            metric,
            non_zero,
            values.len()
        );
    }

    let series = TimeSeries::new(dates, values, frequency)?;
    Ok(PreparedSeries { series, quality })
}

/// Fill missing calendar slots. Counts become zero; currency is smoothed
/// from neighbors when coverage is decent, interpolated otherwise.
fn fill_gaps(slots: &[Option<f64>], metric: Metric, coverage: f64) -> Vec<f64> {
    match metric {
        Metric::Visits => slots.iter().map(|slot| slot.unwrap_or(0.0)).collect(),
        Metric::Revenue => {
            if coverage >= 0.5 {
                neighbor_mean_fill(slots)
            } else {
                linear_fill(slots)
            }
        }
    }
}

/// Replace each missing slot by the mean of its immediate known neighbors,
/// zero when both neighbors are missing too.
fn neighbor_mean_fill(slots: &[Option<f64>]) -> Vec<f64> {
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            if let Some(value) = slot {
                return *value;
            }
            let mut acc = 0.0;
            let mut n = 0usize;
            if i > 0 {
                if let Some(prev) = slots[i - 1] {
                    acc += prev;
                    n += 1;
                }
            }
            if i + 1 < slots.len() {
                if let Some(next) = slots[i + 1] {
                    acc += next;
                    n += 1;
                }
            }
            if n > 0 {
                acc / n as f64
            } else {
                0.0
            }
        })
        .collect()
}

/// Linearly interpolate interior gaps between known observations. The slot
/// range always starts and ends on observed buckets, so no extrapolation is
/// needed.
fn linear_fill(slots: &[Option<f64>]) -> Vec<f64> {
    let mut filled: Vec<f64> = Vec::with_capacity(slots.len());
    let mut prev_known: Option<(usize, f64)> = None;

    for (i, slot) in slots.iter().enumerate() {
        match slot {
            Some(value) => {
                if let Some((start, start_value)) = prev_known {
                    let gap = i - start;
                    if gap > 1 {
                        for j in (start + 1)..i {
                            let t = (j - start) as f64 / gap as f64;
                            filled[j] = start_value + t * (value - start_value);
                        }
                    }
                }
                filled.push(*value);
                prev_known = Some((i, *value));
            }
            None => filled.push(0.0),
        }
    }
    filled
}

/// IQR-based outlier treatment on the filled series: long series replace
/// each outlier with the local median of a two-point window around it,
/// shorter series clip to the fence. Returns the number of adjusted points.
fn handle_outliers(values: &mut [f64]) -> usize {
    if values.len() < 10 {
        return 0;
    }

    let q1 = stats::quantile(values, 0.25);
    let q3 = stats::quantile(values, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;

    let outlier_indices: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < lower || **v > upper)
        .map(|(i, _)| i)
        .collect();
    if outlier_indices.is_empty() {
        return 0;
    }

    if values.len() >= 30 {
        let global_median = stats::quantile(values, 0.5);
        for &idx in &outlier_indices {
            let start = idx.saturating_sub(2);
            let end = (idx + 3).min(values.len());
            let window: Vec<f64> = (start..end)
                .filter(|&j| j != idx)
                .map(|j| values[j])
                .collect();
            values[idx] = if window.is_empty() {
                global_median
            } else {
                stats::quantile(&window, 0.5)
            };
        }
    } else {
        for &idx in &outlier_indices {
            values[idx] = values[idx].clamp(lower, upper);
        }
    }
    outlier_indices.len()
}
