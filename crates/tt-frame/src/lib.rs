#![forbid(unsafe_code)]

use std::collections::HashSet;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tt_columnar::{Column, ColumnError};
use tt_index::{IndexClass, IndexError, TimeIndex};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("column {column:?} has length {actual}, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("table has no time index; call with_time_index first")]
    NotATimeTable,
    #[error("row position {position} is out of bounds for {nrows} rows")]
    PositionOutOfBounds { position: usize, nrows: usize },
    #[error("column position {position} is out of bounds for {ncols} columns")]
    ColumnPositionOutOfBounds { position: usize, ncols: usize },
    #[error("row mask length ({mask_len}) does not match row count ({nrows})")]
    MaskLengthMismatch { mask_len: usize, nrows: usize },
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A table of equally long named columns.
///
/// A frame optionally designates one temporal column as its time index
/// and may be grouped by any number of other columns. Every operation
/// returns a new frame; storage is never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeFrame {
    columns: Vec<(String, Column)>,
    nrows: usize,
    time_index: Option<TimeIndex>,
    groups: Vec<String>,
}

impl TimeFrame {
    pub fn new(columns: Vec<(String, Column)>) -> Result<Self, FrameError> {
        let nrows = columns.first().map_or(0, |(_, column)| column.len());
        let mut seen = HashSet::with_capacity(columns.len());
        for (name, column) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(FrameError::DuplicateColumn(name.clone()));
            }
            if column.len() != nrows {
                return Err(FrameError::LengthMismatch {
                    column: name.clone(),
                    expected: nrows,
                    actual: column.len(),
                });
            }
        }

        Ok(Self {
            columns,
            nrows,
            time_index: None,
            groups: Vec::new(),
        })
    }

    /// Designate `column` as the time index, anchored in `time_zone`.
    pub fn with_time_index(mut self, column: &str, time_zone: Tz) -> Result<Self, FrameError> {
        let dtype = self
            .column(column)
            .ok_or_else(|| FrameError::UnknownColumn(column.to_owned()))?
            .dtype();
        let class = IndexClass::from_dtype(dtype)?;
        self.time_index = Some(TimeIndex::new(column, class, time_zone));
        Ok(self)
    }

    pub fn with_index(self, column: &str) -> Result<Self, FrameError> {
        self.with_time_index(column, Tz::UTC)
    }

    pub fn group_by(mut self, columns: &[&str]) -> Result<Self, FrameError> {
        for name in columns {
            if self.column(name).is_none() {
                return Err(FrameError::UnknownColumn((*name).to_owned()));
            }
        }
        self.groups = columns.iter().map(|name| (*name).to_owned()).collect();
        Ok(self)
    }

    #[must_use]
    pub fn ungroup(mut self) -> Self {
        self.groups.clear();
        self
    }

    #[must_use]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    #[must_use]
    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, column)| column)
    }

    #[must_use]
    pub fn time_index(&self) -> Option<&TimeIndex> {
        self.time_index.as_ref()
    }

    pub fn require_time_index(&self) -> Result<&TimeIndex, FrameError> {
        self.time_index.as_ref().ok_or(FrameError::NotATimeTable)
    }

    /// The column backing the time index.
    pub fn index_column(&self) -> Result<&Column, FrameError> {
        let index = self.require_time_index()?;
        self.column(index.column())
            .ok_or_else(|| FrameError::UnknownColumn(index.column().to_owned()))
    }

    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    #[must_use]
    pub fn is_grouped(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Gather rows by position; index and grouping carry over.
    pub fn select_rows(&self, positions: &[usize]) -> Result<Self, FrameError> {
        if let Some(&position) = positions.iter().find(|&&position| position >= self.nrows) {
            return Err(FrameError::PositionOutOfBounds {
                position,
                nrows: self.nrows,
            });
        }

        let columns = self
            .columns
            .iter()
            .map(|(name, column)| {
                Ok::<_, FrameError>((name.clone(), column.take_positions(positions)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.with_columns(columns, positions.len()))
    }

    /// Keep rows whose mask bit is set, in their original order.
    pub fn filter_rows(&self, mask: &[bool]) -> Result<Self, FrameError> {
        if mask.len() != self.nrows {
            return Err(FrameError::MaskLengthMismatch {
                mask_len: mask.len(),
                nrows: self.nrows,
            });
        }

        let columns = self
            .columns
            .iter()
            .map(|(name, column)| Ok::<_, FrameError>((name.clone(), column.filter_mask(mask)?)))
            .collect::<Result<Vec<_>, _>>()?;
        let nrows = mask.iter().filter(|keep| **keep).count();

        Ok(self.with_columns(columns, nrows))
    }

    /// Keep the named columns in the order given.
    ///
    /// Dropping the index column drops the time index; grouping columns
    /// that are not selected stop grouping the result.
    pub fn select_columns(&self, names: &[&str]) -> Result<Self, FrameError> {
        let mut seen = HashSet::with_capacity(names.len());
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(*name) {
                return Err(FrameError::DuplicateColumn((*name).to_owned()));
            }
            let column = self
                .column(name)
                .ok_or_else(|| FrameError::UnknownColumn((*name).to_owned()))?;
            columns.push(((*name).to_owned(), column.clone()));
        }

        let time_index = self
            .time_index
            .as_ref()
            .filter(|index| seen.contains(index.column()))
            .cloned();
        let groups = self
            .groups
            .iter()
            .filter(|group| seen.contains(group.as_str()))
            .cloned()
            .collect();

        Ok(Self {
            columns,
            nrows: self.nrows,
            time_index,
            groups,
        })
    }

    pub fn select_column_positions(&self, positions: &[usize]) -> Result<Self, FrameError> {
        let names = positions
            .iter()
            .map(|&position| {
                self.columns
                    .get(position)
                    .map(|(name, _)| name.as_str())
                    .ok_or(FrameError::ColumnPositionOutOfBounds {
                        position,
                        ncols: self.columns.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.select_columns(&names)
    }

    /// Swap in a new column of the same length under an existing name.
    /// Replacing the index column re-derives the index class.
    pub fn replace_column(&self, name: &str, column: Column) -> Result<Self, FrameError> {
        if column.len() != self.nrows {
            return Err(FrameError::LengthMismatch {
                column: name.to_owned(),
                expected: self.nrows,
                actual: column.len(),
            });
        }

        let mut out = self.clone();
        if let Some(index) = out.time_index.as_mut() {
            if index.column() == name {
                let class = IndexClass::from_dtype(column.dtype())?;
                *index = TimeIndex::new(name, class, index.time_zone());
            }
        }

        let slot = out
            .columns
            .iter_mut()
            .find(|(candidate, _)| candidate == name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_owned()))?;
        slot.1 = column;
        Ok(out)
    }

    fn with_columns(&self, columns: Vec<(String, Column)>, nrows: usize) -> Self {
        Self {
            columns,
            nrows,
            time_index: self.time_index.clone(),
            groups: self.groups.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use chrono_tz::Tz;
    use tt_columnar::Column;
    use tt_index::{IndexClass, IndexError};
    use tt_types::{DType, Scalar};

    use super::{FrameError, TimeFrame};

    fn day(d: u32) -> Scalar {
        Scalar::Date(NaiveDate::from_ymd_opt(2015, 1, d).expect("date"))
    }

    fn sample() -> TimeFrame {
        let date = Column::from_values(vec![day(1), day(2), day(3)]).expect("date");
        let value = Column::from_values(vec![
            Scalar::Int64(10),
            Scalar::Int64(20),
            Scalar::Int64(30),
        ])
        .expect("value");
        let key = Column::from_values(vec![
            Scalar::Utf8("a".to_owned()),
            Scalar::Utf8("b".to_owned()),
            Scalar::Utf8("a".to_owned()),
        ])
        .expect("key");

        TimeFrame::new(vec![
            ("date".to_owned(), date),
            ("value".to_owned(), value),
            ("key".to_owned(), key),
        ])
        .expect("frame")
        .with_time_index("date", Tz::UTC)
        .expect("index")
    }

    #[test]
    fn new_rejects_ragged_and_duplicate_columns() {
        let short = Column::from_values(vec![Scalar::Int64(1)]).expect("short");
        let long = Column::from_values(vec![Scalar::Int64(1), Scalar::Int64(2)]).expect("long");

        let err = TimeFrame::new(vec![("a".to_owned(), short.clone()), ("b".to_owned(), long)])
            .expect_err("ragged");
        assert!(matches!(err, FrameError::LengthMismatch { expected: 1, actual: 2, .. }));

        let err = TimeFrame::new(vec![("a".to_owned(), short.clone()), ("a".to_owned(), short)])
            .expect_err("duplicate");
        assert!(matches!(err, FrameError::DuplicateColumn(name) if name == "a"));
    }

    #[test]
    fn time_index_requires_temporal_column() {
        let frame = sample();
        assert_eq!(
            frame.time_index().expect("index").class(),
            IndexClass::Date
        );

        let err = sample()
            .with_time_index("value", Tz::UTC)
            .expect_err("numeric index");
        assert!(matches!(
            err,
            FrameError::Index(IndexError::UnsupportedIndexClass {
                dtype: DType::Int64
            })
        ));
    }

    #[test]
    fn row_selection_keeps_index_and_groups() {
        let frame = sample().group_by(&["key"]).expect("grouped");

        let out = frame.select_rows(&[2, 0]).expect("rows");
        assert_eq!(out.nrows(), 2);
        assert_eq!(out.index_column().expect("index").values(), &[day(3), day(1)]);
        assert_eq!(out.groups(), &["key".to_owned()]);

        let out = frame.filter_rows(&[false, true, true]).expect("mask");
        assert_eq!(out.index_column().expect("index").values(), &[day(2), day(3)]);

        assert!(matches!(
            frame.select_rows(&[3]),
            Err(FrameError::PositionOutOfBounds { position: 3, nrows: 3 })
        ));
    }

    #[test]
    fn dropping_the_index_column_drops_the_time_index() {
        let frame = sample().group_by(&["key"]).expect("grouped");

        let out = frame.select_columns(&["value", "date"]).expect("columns");
        assert_eq!(out.column_names(), vec!["value", "date"]);
        assert!(out.time_index().is_some());
        assert!(!out.is_grouped());

        let out = frame.select_column_positions(&[1]).expect("positions");
        assert!(matches!(out.require_time_index(), Err(FrameError::NotATimeTable)));
    }

    #[test]
    fn replace_column_rederives_index_class() {
        let frame = sample();
        let months = Column::new(
            DType::YearMonth,
            vec![day(1), day(2), day(3)],
        )
        .expect("months");

        let out = frame.replace_column("date", months).expect("replace");
        assert_eq!(
            out.time_index().expect("index").class(),
            IndexClass::YearMonth
        );
    }

    #[test]
    fn frame_round_trips_through_json() {
        let frame = sample();
        let json = serde_json::to_string(&frame).expect("serialize");
        let back: TimeFrame = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, frame);
    }
}
