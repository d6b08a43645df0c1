#![forbid(unsafe_code)]

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tt_columnar::Column;
use tt_frame::{FrameError, TimeFrame};
use tt_types::{NullKind, Scalar, YearMonth, YearQuarter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupByOptions {
    /// Drop rows whose grouping key has a missing component. Off by
    /// default: missing keys form their own group.
    pub dropna: bool,
}

#[derive(Debug, Error)]
pub enum GroupByError {
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// One group: its key values (one per grouping column) and the row
/// positions belonging to it, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
    pub key: Vec<Scalar>,
    pub positions: Vec<usize>,
}

/// Split `frame` into row groups by its grouping columns.
///
/// Groups come out in first-seen key order. An ungrouped frame yields a
/// single group covering every row, even when the frame is empty.
pub fn group_rows(frame: &TimeFrame, options: GroupByOptions) -> Result<Vec<RowGroup>, GroupByError> {
    if !frame.is_grouped() {
        return Ok(vec![RowGroup {
            key: Vec::new(),
            positions: (0..frame.nrows()).collect(),
        }]);
    }

    let key_columns = frame
        .groups()
        .iter()
        .map(|name| {
            frame
                .column(name)
                .ok_or_else(|| FrameError::UnknownColumn(name.clone()))
        })
        .collect::<Result<Vec<&Column>, _>>()?;

    let mut slots = HashMap::<Vec<GroupKeyRef<'_>>, usize>::new();
    let mut groups = Vec::<RowGroup>::new();

    for row in 0..frame.nrows() {
        let key_values = key_columns
            .iter()
            .filter_map(|column| column.value(row))
            .collect::<Vec<_>>();
        if options.dropna && key_values.iter().any(|value| value.is_missing()) {
            continue;
        }

        let key = key_values
            .iter()
            .map(|value| GroupKeyRef::from_scalar(*value))
            .collect::<Vec<_>>();
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push(RowGroup {
                key: key_values.iter().map(|value| (*value).clone()).collect(),
                positions: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].positions.push(row);
    }

    Ok(groups)
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum GroupKeyRef<'a> {
    Bool(bool),
    Int64(i64),
    FloatBits(u64),
    Utf8(&'a str),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Time(NaiveTime),
    YearMonth(YearMonth),
    YearQuarter(YearQuarter),
    Null(NullKind),
}

impl<'a> GroupKeyRef<'a> {
    fn from_scalar(key: &'a Scalar) -> Self {
        match key {
            Scalar::Bool(v) => Self::Bool(*v),
            Scalar::Int64(v) => Self::Int64(*v),
            // A NaN float is the same missing key as the column's NaN marker.
            Scalar::Float64(v) if v.is_nan() => Self::Null(NullKind::NaN),
            Scalar::Float64(v) => Self::FloatBits(v.to_bits()),
            Scalar::Utf8(v) => Self::Utf8(v.as_str()),
            Scalar::Date(v) => Self::Date(*v),
            Scalar::DateTime(v) => Self::DateTime(*v),
            Scalar::Time(v) => Self::Time(*v),
            Scalar::YearMonth(v) => Self::YearMonth(*v),
            Scalar::YearQuarter(v) => Self::YearQuarter(*v),
            Scalar::Null(kind) => Self::Null(*kind),
        }
    }
}
