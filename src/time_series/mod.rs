//! Time series core types and preparation
//!
//! A [`TimeSeries`] is an ordered, gap-free sequence of `(date, value)` pairs
//! at a fixed [`Frequency`]. Contiguity is enforced at construction, so every
//! consumer can index by offset without re-checking the calendar. Raw event
//! logs are turned into series by [`prepare::prepare`].

pub mod prepare;

pub use prepare::{prepare, DataQuality, PreparedSeries};

use crate::core::error::{Error, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Sampling frequency of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
}

impl Frequency {
    /// Calendar days between consecutive observations.
    pub fn step_days(&self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
        }
    }

    /// Seasonal period conventionally used at this frequency: one week of
    /// days, or one year of weeks.
    pub fn default_seasonal_period(&self) -> usize {
        match self {
            Frequency::Daily => 7,
            Frequency::Weekly => 52,
        }
    }

    /// Map a calendar date onto its bucket at this frequency. Weekly buckets
    /// start on Monday.
    pub fn bucket(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date,
            Frequency::Weekly => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "D",
            Frequency::Weekly => "W",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ordered, gap-free numeric series over a contiguous calendar range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    frequency: Frequency,
}

impl TimeSeries {
    /// Build a series, validating that dates and values match in length and
    /// that dates advance by exactly one frequency step.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>, frequency: Frequency) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(Error::DimensionMismatch(format!(
                "dates ({}) and values ({}) differ in length",
                dates.len(),
                values.len()
            )));
        }
        let step = Duration::days(frequency.step_days());
        for window in dates.windows(2) {
            if window[1] - window[0] != step {
                return Err(Error::InvalidInput(format!(
                    "series is not contiguous at {}: expected {}, got {}",
                    window[0],
                    window[0] + step,
                    window[1]
                )));
            }
        }
        Ok(TimeSeries {
            dates,
            values,
            frequency,
        })
    }

    /// Build a series from a start date and a run of values.
    pub fn from_range(start: NaiveDate, values: Vec<f64>, frequency: Frequency) -> Self {
        let step = frequency.step_days();
        let dates = (0..values.len() as i64)
            .map(|i| start + Duration::days(i * step))
            .collect();
        TimeSeries {
            dates,
            values,
            frequency,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn mean(&self) -> f64 {
        crate::stats::mean(&self.values)
    }

    /// The first `n` observations as a new series (the whole series when `n`
    /// exceeds its length). Used by walk-forward validation.
    pub fn prefix(&self, n: usize) -> TimeSeries {
        let n = n.min(self.len());
        TimeSeries {
            dates: self.dates[..n].to_vec(),
            values: self.values[..n].to_vec(),
            frequency: self.frequency,
        }
    }

    /// Observations from `start` (inclusive) to `end` (exclusive).
    pub fn window(&self, start: usize, end: usize) -> &[f64] {
        let end = end.min(self.len());
        let start = start.min(end);
        &self.values[start..end]
    }
}
