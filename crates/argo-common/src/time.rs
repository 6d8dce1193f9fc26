//! Resolution of relative time phrases to concrete UTC windows.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A half-open `[start, end)` time window for SQL filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The calendar year `[Jan 1, Jan 1 next year)`.
    pub fn year(year: i32) -> Option<Self> {
        let start = first_of_month(year, 1)?;
        let end = first_of_month(year + 1, 1)?;
        Some(Self { start, end })
    }

    /// One calendar month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = first_of_month(year, month)?;
        let end = if month == 12 {
            first_of_month(year + 1, 1)?
        } else {
            first_of_month(year, month + 1)?
        };
        Some(Self { start, end })
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        ts >= &self.start && ts < &self.end
    }

    /// Resolve a relative time phrase against a reference date.
    ///
    /// Supported: "last 6 months", "this month", "this year",
    /// "<month> <year>" in either order, and a bare "<year>".
    /// Anything else resolves to None (no time filter).
    pub fn from_phrase(phrase: &str, reference: DateTime<Utc>) -> Option<Self> {
        let lowered = phrase.to_lowercase();

        if lowered.contains("last 6 months") || lowered.contains("last six months") {
            return Some(Self::new(reference - Duration::days(180), reference));
        }
        if lowered.contains("this month") {
            let start = first_of_month(reference.year(), reference.month())?;
            return Some(Self::new(start, reference));
        }
        if lowered.contains("this year") {
            let start = first_of_month(reference.year(), 1)?;
            return Some(Self::new(start, reference));
        }

        let year = year_pattern()
            .find(&lowered)
            .and_then(|m| m.as_str().parse::<i32>().ok())?;

        if let Some(caps) = month_pattern().captures(&lowered) {
            let month = month_number(&caps[1])?;
            return Self::month(year, month);
        }

        Self::year(year)
    }
}

fn first_of_month(year: i32, month: u32) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    Utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}

fn year_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(20\d{2})\b").expect("static regex"))
}

fn month_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\w*\b")
            .expect("static regex")
    })
}

fn month_number(prefix: &str) -> Option<u32> {
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
