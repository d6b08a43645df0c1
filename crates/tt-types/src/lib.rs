#![forbid(unsafe_code)]

pub mod calendar;

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use calendar::{CalendarError, TimeUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Null,
    Bool,
    Int64,
    Float64,
    Utf8,
    Date,
    DateTime,
    Time,
    YearMonth,
    YearQuarter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullKind {
    Null,
    NaN,
    NaT,
}

/// A calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, TypeError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or(TypeError::InvalidYearMonth { year, month })
    }

    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// A calendar quarter, stored as the first day of its first month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YearQuarter(NaiveDate);

impl YearQuarter {
    pub fn new(year: i32, quarter: u32) -> Result<Self, TypeError> {
        if !(1..=4).contains(&quarter) {
            return Err(TypeError::InvalidYearQuarter { year, quarter });
        }
        NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)
            .map(Self)
            .ok_or(TypeError::InvalidYearQuarter { year, quarter })
    }

    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        let first_month = (date.month0() / 3) * 3 + 1;
        Self(NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date))
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn quarter(&self) -> u32 {
        self.0.month0() / 3 + 1
    }

    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for YearQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04} Q{}", self.year(), self.quarter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null(NullKind),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Date(NaiveDate),
    /// An absolute instant; the display zone lives on the owning index.
    DateTime(DateTime<Utc>),
    Time(NaiveTime),
    YearMonth(YearMonth),
    YearQuarter(YearQuarter),
}

impl Scalar {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Null(_) => DType::Null,
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
            Self::Date(_) => DType::Date,
            Self::DateTime(_) => DType::DateTime,
            Self::Time(_) => DType::Time,
            Self::YearMonth(_) => DType::YearMonth,
            Self::YearQuarter(_) => DType::YearQuarter,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    #[must_use]
    pub fn missing_for_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Float64 => Self::Null(NullKind::NaN),
            DType::Date
            | DType::DateTime
            | DType::Time
            | DType::YearMonth
            | DType::YearQuarter => Self::Null(NullKind::NaT),
            DType::Null | DType::Bool | DType::Int64 | DType::Utf8 => Self::Null(NullKind::Null),
        }
    }

    /// Orders two temporal scalars of the same kind. Anything else
    /// (mixed kinds, missing values, non-temporal values) is unordered.
    #[must_use]
    pub fn time_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::Time(a), Self::Time(b)) => Some(a.cmp(b)),
            (Self::YearMonth(a), Self::YearMonth(b)) => Some(a.cmp(b)),
            (Self::YearQuarter(a), Self::YearQuarter(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(NullKind::NaT) => f.write_str("NaT"),
            Self::Null(NullKind::NaN) => f.write_str("NaN"),
            Self::Null(NullKind::Null) => f.write_str("<null>"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S UTC")),
            Self::Time(v) => write!(f, "{}", v.format("%H:%M:%S")),
            Self::YearMonth(v) => write!(f, "{v}"),
            Self::YearQuarter(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("dtype coercion from {left:?} to {right:?} has no compatible common type")]
    IncompatibleDtypes { left: DType, right: DType },
    #[error("cannot cast scalar of dtype {from:?} to {to:?}")]
    InvalidCast { from: DType, to: DType },
    #[error("cannot cast float {value} to int64 without loss")]
    LossyFloatToInt { value: f64 },
    #[error("expected 0/1 for bool cast from int64 but found {value}")]
    InvalidBoolInt { value: i64 },
    #[error("{year}-{month} is not a valid year-month")]
    InvalidYearMonth { year: i32, month: u32 },
    #[error("{year} Q{quarter} is not a valid year-quarter")]
    InvalidYearQuarter { year: i32, quarter: u32 },
}

pub fn common_dtype(left: DType, right: DType) -> Result<DType, TypeError> {
    use DType::{Bool, Float64, Int64, Null};

    let out = match (left, right) {
        (a, b) if a == b => a,
        (Null, other) | (other, Null) => other,
        (Bool, Int64) | (Int64, Bool) => Int64,
        (Bool, Float64) | (Float64, Bool) => Float64,
        (Int64, Float64) | (Float64, Int64) => Float64,
        _ => return Err(TypeError::IncompatibleDtypes { left, right }),
    };

    Ok(out)
}

pub fn infer_dtype(values: &[Scalar]) -> Result<DType, TypeError> {
    let mut current = DType::Null;
    for value in values {
        current = common_dtype(current, value.dtype())?;
    }
    Ok(current)
}

pub fn cast_scalar(value: &Scalar, target: DType) -> Result<Scalar, TypeError> {
    cast_scalar_owned(value.clone(), target)
}

/// Owned variant of [`cast_scalar`]; values already of `target` dtype
/// are returned without cloning.
pub fn cast_scalar_owned(value: Scalar, target: DType) -> Result<Scalar, TypeError> {
    let from = value.dtype();
    if let Scalar::Null(_) = value {
        return Ok(Scalar::missing_for_dtype(target));
    }
    if from == target {
        return Ok(value);
    }

    let invalid = TypeError::InvalidCast { from, to: target };
    match (value, target) {
        (_, DType::Null) => Ok(Scalar::Null(NullKind::Null)),
        (Scalar::Int64(v), DType::Bool) => match v {
            0 => Ok(Scalar::Bool(false)),
            1 => Ok(Scalar::Bool(true)),
            _ => Err(TypeError::InvalidBoolInt { value: v }),
        },
        (Scalar::Bool(v), DType::Int64) => Ok(Scalar::Int64(i64::from(v))),
        (Scalar::Float64(v), DType::Int64) => {
            if !v.is_finite()
                || v != v.trunc()
                || v < i64::MIN as f64
                || v > i64::MAX as f64
            {
                return Err(TypeError::LossyFloatToInt { value: v });
            }
            Ok(Scalar::Int64(v as i64))
        }
        (Scalar::Bool(v), DType::Float64) => Ok(Scalar::Float64(if v { 1.0 } else { 0.0 })),
        (Scalar::Int64(v), DType::Float64) => Ok(Scalar::Float64(v as f64)),

        (Scalar::Date(d), DType::DateTime) => Ok(Scalar::DateTime(d.and_time(NaiveTime::MIN).and_utc())),
        (Scalar::Date(d), DType::YearMonth) => Ok(Scalar::YearMonth(YearMonth::from_date(d))),
        (Scalar::Date(d), DType::YearQuarter) => Ok(Scalar::YearQuarter(YearQuarter::from_date(d))),
        (Scalar::DateTime(t), DType::Date) => Ok(Scalar::Date(t.date_naive())),
        (Scalar::DateTime(t), DType::Time) => Ok(Scalar::Time(t.time())),
        (Scalar::DateTime(t), DType::YearMonth) => {
            Ok(Scalar::YearMonth(YearMonth::from_date(t.date_naive())))
        }
        (Scalar::DateTime(t), DType::YearQuarter) => {
            Ok(Scalar::YearQuarter(YearQuarter::from_date(t.date_naive())))
        }
        (Scalar::YearMonth(m), DType::Date) => Ok(Scalar::Date(m.first_day())),
        (Scalar::YearMonth(m), DType::YearQuarter) => {
            Ok(Scalar::YearQuarter(YearQuarter::from_date(m.first_day())))
        }
        (Scalar::YearQuarter(q), DType::Date) => Ok(Scalar::Date(q.first_day())),
        (Scalar::YearQuarter(q), DType::YearMonth) => {
            Ok(Scalar::YearMonth(YearMonth::from_date(q.first_day())))
        }
        _ => Err(invalid),
    }
}
