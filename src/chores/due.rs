//! Due-date arithmetic and display helpers.
//!
//! Everything here is a pure function of its inputs. Day boundaries are taken
//! in a caller-supplied [`FixedOffset`] so the daily sweep and the listings
//! agree on what "today" means.

use chrono::{DateTime, Datelike, Days, FixedOffset, Months, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::store::IntervalUnit;

/// Hours in the fixed 30-day month used by [`percentage_left`].
const HOURS_PER_MONTH: f64 = 24.0 * 30.0;

/// Compute the next due instant for an interval, counted from `from`.
///
/// One-time and unrecognised units return `from` unchanged ("due now").
/// Months use calendar arithmetic; a day that does not exist in the target
/// month clamps to its last day (Jan 31 + 1 month = Feb 28/29).
#[must_use]
pub fn next_due_date(unit: &IntervalUnit, size: u32, from: DateTime<Utc>) -> DateTime<Utc> {
    let next = match unit {
        IntervalUnit::Day => from.checked_add_days(Days::new(u64::from(size))),
        IntervalUnit::Week => from.checked_add_days(Days::new(u64::from(size) * 7)),
        IntervalUnit::Month => from.checked_add_months(Months::new(size)),
        IntervalUnit::OneTime | IntervalUnit::Other(_) => Some(from),
    };
    next.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whole calendar days between `now` and `due`, both truncated to the local
/// day in `offset`.
///
/// Zero means due today, negative means overdue.
#[must_use]
pub fn days_left(due: DateTime<Utc>, now: DateTime<Utc>, offset: FixedOffset) -> i64 {
    let due_day = due.with_timezone(&offset).date_naive();
    let today = now.with_timezone(&offset).date_naive();
    (due_day - today).num_days()
}

/// Total length of one interval in hours, for display purposes.
///
/// Months count as 30 days here. Unknown units count as one day.
#[must_use]
pub fn total_hours(unit: &IntervalUnit, size: u32) -> f64 {
    let size = f64::from(size);
    match unit {
        IntervalUnit::Day => 24.0 * size,
        IntervalUnit::Week => 24.0 * 7.0 * size,
        IntervalUnit::Month => HOURS_PER_MONTH * size,
        IntervalUnit::OneTime | IntervalUnit::Other(_) => 24.0,
    }
}

/// Fraction of the interval still remaining, floored at zero.
///
/// Display only: whether a task is due is decided by [`days_left`].
#[must_use]
pub fn percentage_left(
    unit: &IntervalUnit,
    size: u32,
    due: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let total = total_hours(unit, size);
    if total <= 0.0 {
        return 0.0;
    }
    let hours_until = (due - now).num_seconds() as f64 / 3600.0;
    (hours_until / total).max(0.0)
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Language used for human-readable due dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateLocale {
    /// Danish: `lørdag, 17. oktober 2026`.
    #[default]
    Da,
    /// English: `Saturday, 17 October 2026`.
    En,
}

/// Local calendar used to interpret and display due dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    pub offset: FixedOffset,
    pub locale: DateLocale,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            offset: utc_offset(),
            locale: DateLocale::default(),
        }
    }
}

impl Calendar {
    /// Build a calendar from a UTC offset in minutes. Out-of-range offsets
    /// fall back to UTC.
    #[must_use]
    pub fn from_offset_minutes(minutes: i32, locale: DateLocale) -> Self {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(utc_offset);
        Self { offset, locale }
    }

    /// Days left until `due` as seen from `now` in this calendar.
    #[must_use]
    pub fn days_left(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        days_left(due, now, self.offset)
    }

    /// Human-readable due date in this calendar's locale.
    #[must_use]
    pub fn format_due_date(&self, due: DateTime<Utc>) -> String {
        format_due_date(due, self.offset, self.locale)
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Format a due date as `weekday, day month year` in `locale`.
#[must_use]
pub fn format_due_date(due: DateTime<Utc>, offset: FixedOffset, locale: DateLocale) -> String {
    let local = due.with_timezone(&offset);
    match locale {
        DateLocale::Da => format!(
            "{}, {}. {} {}",
            danish_weekday(local.weekday()),
            local.day(),
            danish_month(local.month()),
            local.year()
        ),
        DateLocale::En => local.format("%A, %-d %B %Y").to_string(),
    }
}

fn danish_weekday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mandag",
        Weekday::Tue => "tirsdag",
        Weekday::Wed => "onsdag",
        Weekday::Thu => "torsdag",
        Weekday::Fri => "fredag",
        Weekday::Sat => "lørdag",
        Weekday::Sun => "søndag",
    }
}

fn danish_month(month: u32) -> &'static str {
    match month {
        1 => "januar",
        2 => "februar",
        3 => "marts",
        4 => "april",
        5 => "maj",
        6 => "juni",
        7 => "juli",
        8 => "august",
        9 => "september",
        10 => "oktober",
        11 => "november",
        _ => "december",
    }
}
