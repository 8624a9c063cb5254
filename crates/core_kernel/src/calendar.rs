//! Calendar handling for monthly settlement periods
//!
//! Obligations recur on a day-of-month anchor. This module resolves that
//! anchor against real months (including months that are too short for the
//! anchor) and decides what "today" is for a settlement run.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI32, Ordering};
use thiserror::Error;

/// Errors related to calendar operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid due day {0}: must be between 1 and 31")]
    InvalidDueDay(u32),

    #[error("Invalid period {year}-{month}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("Unknown due day policy: {0}")]
    UnknownPolicy(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// Timezone in which settlement dates are evaluated
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl FromStr for Timezone {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| CalendarError::InvalidTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the local calendar date for a UTC instant
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.0).date_naive()
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

/// A validated day-of-month anchor (1-31)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DueDay(u32);

impl DueDay {
    /// Creates a due day, rejecting values outside 1-31
    pub fn new(day: u32) -> Result<Self, CalendarError> {
        if (1..=31).contains(&day) {
            Ok(Self(day))
        } else {
            Err(CalendarError::InvalidDueDay(day))
        }
    }

    /// The due day falling on the same day-of-month as `date`
    pub fn of(date: NaiveDate) -> Self {
        Self(date.day())
    }

    /// Returns the raw day number
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for DueDay {
    type Error = CalendarError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        DueDay::new(value)
    }
}

impl From<DueDay> for u32 {
    fn from(day: DueDay) -> u32 {
        day.0
    }
}

impl fmt::Display for DueDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to do with a due day that does not exist in a month (e.g. 31 in April)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueDayPolicy {
    /// The month has no occurrence; the next one is the following month's matching day
    Skip,
    /// The occurrence moves to the last day of the month
    #[default]
    ClampToMonthEnd,
}

impl DueDayPolicy {
    /// Returns true if an obligation anchored on `due_day` falls due on `date`
    pub fn is_due_on(&self, due_day: DueDay, date: NaiveDate) -> bool {
        BillingPeriod::containing(date).due_date(due_day, *self) == Some(date)
    }

    /// First resolved due date on or after `from`
    ///
    /// A year always contains a 31-day month, so the search is bounded.
    pub fn next_occurrence(&self, due_day: DueDay, from: NaiveDate) -> Option<NaiveDate> {
        let mut period = BillingPeriod::containing(from);
        for _ in 0..13 {
            if let Some(date) = period.due_date(due_day, *self) {
                if date >= from {
                    return Some(date);
                }
            }
            period = period.next();
        }
        None
    }
}

impl FromStr for DueDayPolicy {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(DueDayPolicy::Skip),
            "clamp" | "clamp_to_month_end" => Ok(DueDayPolicy::ClampToMonthEnd),
            other => Err(CalendarError::UnknownPolicy(other.to_string())),
        }
    }
}

/// A calendar month, the unit in which obligations recur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: u32,
}

impl BillingPeriod {
    /// Creates a period, validating the month
    pub fn new(year: i32, month: u32) -> Result<Self, CalendarError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(CalendarError::InvalidPeriod { year, month });
        }
        Ok(Self { year, month })
    }

    /// The period containing the given date
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following month
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// Number of days in this month
    pub fn days_in_month(&self) -> u32 {
        let next = self.next();
        match (
            NaiveDate::from_ymd_opt(self.year, self.month, 1),
            NaiveDate::from_ymd_opt(next.year, next.month, 1),
        ) {
            (Some(first), Some(first_of_next)) => (first_of_next - first).num_days() as u32,
            _ => 30,
        }
    }

    /// Resolves the due date of `due_day` in this month under `policy`
    ///
    /// Returns None when the day does not exist and the policy is `Skip`.
    pub fn due_date(&self, due_day: DueDay, policy: DueDayPolicy) -> Option<NaiveDate> {
        let last = self.days_in_month();
        let day = match policy {
            DueDayPolicy::Skip if due_day.get() > last => return None,
            DueDayPolicy::Skip => due_day.get(),
            DueDayPolicy::ClampToMonthEnd => due_day.get().min(last),
        };
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Source of the current business date
pub trait Clock: Send + Sync {
    /// Today's date in the clock's timezone
    fn today(&self) -> NaiveDate;
}

/// Wall clock evaluated in a configured timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Timezone,
}

impl SystemClock {
    pub fn new(timezone: Timezone) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        self.timezone.today(Utc::now())
    }
}

/// A settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    days_from_ce: AtomicI32,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            days_from_ce: AtomicI32::new(date.num_days_from_ce()),
        }
    }

    /// Moves the clock to `date`
    pub fn set(&self, date: NaiveDate) {
        self.days_from_ce.store(date.num_days_from_ce(), Ordering::SeqCst);
    }

    /// Moves the clock forward by `days`
    pub fn advance_days(&self, days: i32) {
        self.days_from_ce.fetch_add(days, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        let days = self.days_from_ce.load(Ordering::SeqCst);
        NaiveDate::from_num_days_from_ce_opt(days).unwrap_or(NaiveDate::MIN)
    }
}
