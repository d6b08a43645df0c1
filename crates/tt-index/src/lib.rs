#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tt_types::{DType, Scalar};

/// The closed set of column types a time index can be built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexClass {
    Date,
    DateTime,
    TimeOfDay,
    YearMonth,
    YearQuarter,
}

impl IndexClass {
    pub fn from_dtype(dtype: DType) -> Result<Self, IndexError> {
        match dtype {
            DType::Date => Ok(Self::Date),
            DType::DateTime => Ok(Self::DateTime),
            DType::Time => Ok(Self::TimeOfDay),
            DType::YearMonth => Ok(Self::YearMonth),
            DType::YearQuarter => Ok(Self::YearQuarter),
            other => Err(IndexError::UnsupportedIndexClass { dtype: other }),
        }
    }

    #[must_use]
    pub fn dtype(self) -> DType {
        match self {
            Self::Date => DType::Date,
            Self::DateTime => DType::DateTime,
            Self::TimeOfDay => DType::Time,
            Self::YearMonth => DType::YearMonth,
            Self::YearQuarter => DType::YearQuarter,
        }
    }

    /// False only for time-of-day indexes, which carry no date part.
    #[must_use]
    pub fn has_calendar(self) -> bool {
        !matches!(self, Self::TimeOfDay)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::TimeOfDay => "time-of-day",
            Self::YearMonth => "year-month",
            Self::YearQuarter => "year-quarter",
        }
    }
}

impl fmt::Display for IndexClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeIndex {
    column: String,
    class: IndexClass,
    time_zone: Tz,
}

impl TimeIndex {
    #[must_use]
    pub fn new(column: impl Into<String>, class: IndexClass, time_zone: Tz) -> Self {
        Self {
            column: column.into(),
            class,
            time_zone,
        }
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[must_use]
    pub fn class(&self) -> IndexClass {
        self.class
    }

    #[must_use]
    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("columns of dtype {dtype:?} cannot back a time index")]
    UnsupportedIndexClass { dtype: DType },
}

/// Smallest and largest non-missing values, or `None` when there are none.
#[must_use]
pub fn index_extremes(values: &[Scalar]) -> Option<(&Scalar, &Scalar)> {
    let mut present = values.iter().filter(|value| !value.is_missing());
    let first = present.next()?;
    Some(present.fold((first, first), |(lo, hi), value| {
        let lo = if value.time_cmp(lo) == Some(Ordering::Less) {
            value
        } else {
            lo
        };
        let hi = if value.time_cmp(hi) == Some(Ordering::Greater) {
            value
        } else {
            hi
        };
        (lo, hi)
    }))
}

/// True when every value is present and no value is smaller than its
/// predecessor.
#[must_use]
pub fn is_monotonic_increasing(values: &[Scalar]) -> bool {
    values.windows(2).all(|pair| {
        matches!(
            pair[0].time_cmp(&pair[1]),
            Some(Ordering::Less | Ordering::Equal)
        )
    }) && values.iter().all(|value| !value.is_missing())
}

/// `from <= value <= to`; missing or mismatched values never match.
#[must_use]
pub fn in_range(value: &Scalar, from: &Scalar, to: &Scalar) -> bool {
    matches!(
        value.time_cmp(from),
        Some(Ordering::Greater | Ordering::Equal)
    ) && matches!(value.time_cmp(to), Some(Ordering::Less | Ordering::Equal))
}

/// Positions of the values inside the inclusive range `[from, to]`, in
/// ascending order.
///
/// Sorted indexes are searched with two binary searches; anything else
/// falls back to a linear scan. Both paths select the same rows.
#[must_use]
pub fn range_positions(values: &[Scalar], from: &Scalar, to: &Scalar) -> Vec<usize> {
    if is_monotonic_increasing(values) {
        let lo = values.partition_point(|value| value.time_cmp(from) == Some(Ordering::Less));
        let hi = values.partition_point(|value| {
            matches!(value.time_cmp(to), Some(Ordering::Less | Ordering::Equal))
        });
        return (lo..hi.max(lo)).collect();
    }

    values
        .iter()
        .enumerate()
        .filter(|(_, value)| in_range(value, from, to))
        .map(|(position, _)| position)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use chrono_tz::Tz;
    use tt_types::{DType, NullKind, Scalar};

    use super::{
        IndexClass, IndexError, TimeIndex, index_extremes, is_monotonic_increasing,
        range_positions,
    };

    fn day(d: u32) -> Scalar {
        Scalar::Date(NaiveDate::from_ymd_opt(2015, 1, d).expect("date"))
    }

    #[test]
    fn class_dispatch_covers_temporal_dtypes_only() {
        assert_eq!(
            IndexClass::from_dtype(DType::Time).expect("time"),
            IndexClass::TimeOfDay
        );
        assert_eq!(
            IndexClass::from_dtype(DType::Utf8),
            Err(IndexError::UnsupportedIndexClass { dtype: DType::Utf8 })
        );
        assert!(!IndexClass::TimeOfDay.has_calendar());
        assert!(IndexClass::YearQuarter.has_calendar());
    }

    #[test]
    fn extremes_skip_missing_values() {
        let values = vec![day(5), Scalar::Null(NullKind::NaT), day(2), day(9)];
        let (lo, hi) = index_extremes(&values).expect("extremes");
        assert_eq!((lo, hi), (&day(2), &day(9)));

        assert!(index_extremes(&[Scalar::Null(NullKind::NaT)]).is_none());
    }

    #[test]
    fn sorted_and_unsorted_searches_agree() {
        let sorted = vec![day(1), day(2), day(2), day(4), day(6)];
        assert!(is_monotonic_increasing(&sorted));
        assert_eq!(range_positions(&sorted, &day(2), &day(4)), vec![1, 2, 3]);

        let shuffled = vec![day(4), day(1), day(6), day(2), day(2)];
        assert!(!is_monotonic_increasing(&shuffled));
        assert_eq!(range_positions(&shuffled, &day(2), &day(4)), vec![0, 3, 4]);
    }

    #[test]
    fn missing_values_force_linear_scan_and_never_match() {
        let values = vec![day(1), Scalar::Null(NullKind::NaT), day(3)];
        assert!(!is_monotonic_increasing(&values));
        assert_eq!(range_positions(&values, &day(1), &day(3)), vec![0, 2]);
    }

    #[test]
    fn time_index_serializes_zone_by_name() {
        let index = TimeIndex::new("date", IndexClass::DateTime, Tz::America__New_York);
        let json = serde_json::to_string(&index).expect("json");
        assert!(json.contains("America/New_York"));
        assert_eq!(index.column(), "date");
    }
}
