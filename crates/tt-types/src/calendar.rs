//! Calendar arithmetic shared by range expansion and flooring.
//!
//! Everything here works on naive (zone-free) values. Callers that hold
//! zoned instants convert to local time first and re-anchor afterwards.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl TimeUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Quarter => "quarter",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("cannot floor to 0 {unit}s")]
    ZeroStep { unit: TimeUnit },
    #[error("flooring to {step} {unit}s is not supported")]
    UnsupportedStep { step: u32, unit: TimeUnit },
    #[error("flooring {value} leaves the supported calendar range")]
    OutOfRange { value: NaiveDateTime },
}

fn floor_to_step(value: u32, step: u32, origin: u32) -> u32 {
    origin + (value - origin) / step * step
}

fn month_start(year: i32, month: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

/// Floor `value` down to the nearest multiple of `step` `unit`s.
///
/// Steps count within the enclosing unit: `15` minutes floors to minute
/// 0/15/30/45 of the hour, `2` days to day 1/3/5/.. of the month, and
/// `2` years to even years. Weeks start on `week_start` and only a
/// single-week step is accepted.
pub fn floor_naive(
    value: NaiveDateTime,
    step: u32,
    unit: TimeUnit,
    week_start: Weekday,
) -> Result<NaiveDateTime, CalendarError> {
    if step == 0 {
        return Err(CalendarError::ZeroStep { unit });
    }

    let date = value.date();
    let time = value.time();
    let floored = match unit {
        TimeUnit::Second => {
            date.and_hms_opt(time.hour(), time.minute(), floor_to_step(time.second(), step, 0))
        }
        TimeUnit::Minute => date.and_hms_opt(time.hour(), floor_to_step(time.minute(), step, 0), 0),
        TimeUnit::Hour => date.and_hms_opt(floor_to_step(time.hour(), step, 0), 0, 0),
        TimeUnit::Day => date
            .with_day(floor_to_step(date.day(), step, 1))
            .and_then(|day| day.and_hms_opt(0, 0, 0)),
        TimeUnit::Week => {
            if step != 1 {
                return Err(CalendarError::UnsupportedStep { step, unit });
            }
            let back = (7 + date.weekday().num_days_from_monday()
                - week_start.num_days_from_monday())
                % 7;
            date.checked_sub_days(Days::new(u64::from(back)))
                .and_then(|day| day.and_hms_opt(0, 0, 0))
        }
        TimeUnit::Month => month_start(date.year(), floor_to_step(date.month(), step, 1)),
        TimeUnit::Quarter => {
            let months = step
                .checked_mul(3)
                .ok_or(CalendarError::UnsupportedStep { step, unit })?;
            month_start(date.year(), floor_to_step(date.month(), months, 1))
        }
        TimeUnit::Year => {
            let years =
                i32::try_from(step).map_err(|_| CalendarError::UnsupportedStep { step, unit })?;
            let year = date.year();
            month_start(year - year.rem_euclid(years), 1)
        }
    };

    floored.ok_or(CalendarError::OutOfRange { value })
}
