#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tt_types::TimeUnit;

/// A frequency/unit pair such as `2 day` or `1 quarter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodSpec {
    pub frequency: u32,
    pub unit: TimeUnit,
}

impl PeriodSpec {
    #[must_use]
    pub fn new(frequency: u32, unit: TimeUnit) -> Self {
        Self { frequency, unit }
    }
}

impl fmt::Display for PeriodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.frequency, self.unit)
    }
}

impl FromStr for PeriodSpec {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_period(s)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("period string is empty")]
    Empty,
    #[error("unknown period unit {unit:?}")]
    UnknownUnit { unit: String },
    #[error("period frequency {frequency:?} is not a positive integer")]
    InvalidFrequency { frequency: String },
    #[error("period {input:?} must be \"<unit>\" or \"<frequency> <unit>\"")]
    TooManyTokens { input: String },
}

/// Parse `"<unit>"` or `"<frequency> <unit>"`.
///
/// Units match case-insensitively against their aliases, except for the
/// single letters `m` (month) and `M` (minute).
pub fn parse_period(text: &str) -> Result<PeriodSpec, PeriodError> {
    let tokens = text.split_whitespace().collect::<Vec<_>>();
    let (frequency, unit) = match tokens.as_slice() {
        [] => return Err(PeriodError::Empty),
        [unit] => (1, *unit),
        [frequency, unit] => (parse_frequency(frequency)?, *unit),
        _ => {
            return Err(PeriodError::TooManyTokens {
                input: text.trim().to_owned(),
            });
        }
    };

    Ok(PeriodSpec {
        frequency,
        unit: parse_unit(unit)?,
    })
}

fn parse_frequency(token: &str) -> Result<u32, PeriodError> {
    match token.parse::<u32>() {
        Ok(frequency) if frequency > 0 && token.bytes().all(|b| b.is_ascii_digit()) => {
            Ok(frequency)
        }
        _ => Err(PeriodError::InvalidFrequency {
            frequency: token.to_owned(),
        }),
    }
}

fn parse_unit(token: &str) -> Result<TimeUnit, PeriodError> {
    // The only case-sensitive pair.
    match token {
        "m" => return Ok(TimeUnit::Month),
        "M" => return Ok(TimeUnit::Minute),
        _ => {}
    }

    let unit = match token.to_ascii_lowercase().as_str() {
        "y" | "yr" | "yrs" | "year" | "years" | "yearly" | "annually" => TimeUnit::Year,
        "q" | "qtr" | "qtrs" | "quarter" | "quarters" | "quarterly" => TimeUnit::Quarter,
        "mo" | "mon" | "mth" | "month" | "months" | "monthly" => TimeUnit::Month,
        "w" | "wk" | "wks" | "week" | "weeks" | "weekly" => TimeUnit::Week,
        "d" | "dy" | "day" | "days" | "daily" => TimeUnit::Day,
        "h" | "hr" | "hrs" | "hour" | "hours" | "hourly" => TimeUnit::Hour,
        "mi" | "min" | "mins" | "minute" | "minutes" => TimeUnit::Minute,
        "s" | "sec" | "secs" | "second" | "seconds" => TimeUnit::Second,
        _ => {
            return Err(PeriodError::UnknownUnit {
                unit: token.to_owned(),
            });
        }
    };
    Ok(unit)
}
