//! Holiday calendar
//!
//! Fixed-date public holidays plus the mid-July to end-of-August slowdown
//! window during which field activity reliably drops.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;

lazy_static! {
    /// (month, day) pairs of fixed-date holidays
    static ref FIXED_HOLIDAYS: Vec<(u32, u32)> = vec![
        (1, 1),
        (1, 2),
        (5, 1),
        (5, 8),
        (7, 14),
        (8, 15),
        (11, 1),
        (11, 11),
        (12, 24),
        (12, 25),
        (12, 26),
    ];
}

/// Whether `date` falls on a fixed-date holiday.
pub fn is_fixed_holiday(date: NaiveDate) -> bool {
    FIXED_HOLIDAYS
        .iter()
        .any(|&(month, day)| date.month() == month && date.day() == day)
}

/// Whether `date` falls in the July 15 - August 31 summer slowdown window.
pub fn is_summer_slowdown(date: NaiveDate) -> bool {
    match date.month() {
        7 => date.day() >= 15,
        8 => true,
        _ => false,
    }
}

/// Whether `date` is treated as a holiday for pattern analysis.
pub fn is_holiday(date: NaiveDate) -> bool {
    is_fixed_holiday(date) || is_summer_slowdown(date)
}
