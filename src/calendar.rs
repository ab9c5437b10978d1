//! Per-year holiday calendar and blocked periods
use chrono::{Datelike, NaiveDate, Weekday};

use crate::types::{DateRange, cbor_date};

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Holiday {
    #[n(0)]
    #[cbor(with = "cbor_date")]
    pub date: NaiveDate,
    #[n(1)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct BlockedPeriod {
    #[n(0)]
    pub range: DateRange,
    #[n(1)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Calendar {
    #[n(0)]
    pub year: i32,
    #[n(1)]
    pub holidays: Vec<Holiday>,
    #[n(2)]
    pub blocked_periods: Vec<BlockedPeriod>,
}

/// Breakdown of a date range into the days that count towards a leave duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDays {
    pub calendar_days: u32,
    pub weekend_days: u32,
    pub holidays: u32,
    pub blocked_days: u32,
    pub net: u32,
    /// Set when no calendar exists for the year and holidays could not be excluded.
    pub holidays_skipped: bool,
}

impl Calendar {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            ..Default::default()
        }
    }

    pub fn add_holiday(mut self, date: NaiveDate, name: &str) -> Self {
        self.holidays.push(Holiday {
            date,
            name: name.to_string(),
        });
        self
    }

    pub fn add_blocked_period(mut self, from: NaiveDate, to: NaiveDate, reason: &str) -> Self {
        self.blocked_periods.push(BlockedPeriod {
            range: DateRange::new(from, to),
            reason: reason.to_string(),
        });
        self
    }

    pub fn is_holiday(&self, day: NaiveDate) -> bool {
        self.holidays.iter().any(|h| h.date == day)
    }

    pub fn is_blocked(&self, day: NaiveDate) -> bool {
        self.blocked_periods.iter().any(|p| p.range.contains(day))
    }

    /// First blocked period intersecting `range`, if any.
    pub fn blocking(&self, range: &DateRange) -> Option<&BlockedPeriod> {
        self.blocked_periods.iter().find(|p| p.range.overlaps(range))
    }
}

/// Counts the days of `range` that are not weekends, holidays or inside a blocked period.
///
/// Without a calendar only weekends are excluded.
pub fn working_days(
    range: &DateRange,
    calendar: Option<&Calendar>,
    weekend: &[Weekday],
) -> WorkingDays {
    let mut out = WorkingDays {
        calendar_days: 0,
        weekend_days: 0,
        holidays: 0,
        blocked_days: 0,
        net: 0,
        holidays_skipped: calendar.is_none(),
    };

    for day in range.days() {
        out.calendar_days += 1;
        if weekend.contains(&day.weekday()) {
            out.weekend_days += 1;
            continue;
        }
        match calendar {
            Some(cal) if cal.is_holiday(day) => out.holidays += 1,
            Some(cal) if cal.is_blocked(day) => out.blocked_days += 1,
            _ => out.net += 1,
        }
    }
    out
}
