use std::ops::Range;

use serde::{Deserialize, Serialize};
use tt_columnar::Column;
use tt_frame::TimeFrame;
use tt_groupby::{GroupByOptions, group_rows};
use tt_index::IndexClass;
use tt_period::PeriodSpec;
use tt_types::Scalar;

use crate::{FloorError, FloorOptions, floor_scalar_to};

/// Which member of a period bucket represents it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseSide {
    #[default]
    Start,
    End,
}

impl CollapseSide {
    fn pick(self, run: &Range<usize>) -> usize {
        match self {
            Self::Start => run.start,
            Self::End => run.end - 1,
        }
    }
}

/// Runs of adjacent values sharing a floored bucket. Missing values
/// belong to no run and break the run around them.
fn bucket_runs(
    values: &[Scalar],
    period: &PeriodSpec,
    options: &FloorOptions,
) -> Result<Vec<Range<usize>>, FloorError> {
    let keys = values
        .iter()
        .map(|value| floor_scalar_to(value, period, options))
        .collect::<Result<Vec<_>, _>>()?;

    let mut runs = Vec::new();
    let mut start = 0;
    for position in 1..=keys.len() {
        let closes = position == keys.len()
            || keys[position].is_missing()
            || keys[start].is_missing()
            || keys[position] != keys[start];
        if closes {
            if !keys[start].is_missing() {
                runs.push(start..position);
            }
            start = position;
        }
    }
    Ok(runs)
}

/// Replace each index value with the first or last actual value of its
/// contiguous period bucket.
pub fn collapse_index(
    column: &Column,
    period: &PeriodSpec,
    side: CollapseSide,
    options: &FloorOptions,
) -> Result<Column, FloorError> {
    let class = IndexClass::from_dtype(column.dtype())?;
    let mut values = column.values().to_vec();
    for run in bucket_runs(column.values(), period, options)? {
        let representative = column.values()[side.pick(&run)].clone();
        values[run].fill(representative);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(%class, %period, ?side, rows = values.len(), "collapse_index");

    Ok(Column::new(class.dtype(), values)?)
}

/// Keep one row per period bucket within each group: the first row of
/// the bucket for [`CollapseSide::Start`], the last for
/// [`CollapseSide::End`]. Rows with a missing index value are dropped.
pub fn as_period(
    frame: &TimeFrame,
    period: &PeriodSpec,
    side: CollapseSide,
) -> Result<TimeFrame, FloorError> {
    let index = frame.require_time_index()?;
    let options = FloorOptions::in_zone(index.time_zone());
    let index_column = frame.index_column()?;

    let mut keep = vec![false; frame.nrows()];
    for group in group_rows(frame, GroupByOptions::default())? {
        let values = index_column.take_positions(&group.positions)?;
        for run in bucket_runs(values.values(), period, &options)? {
            keep[group.positions[side.pick(&run)]] = true;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        %period,
        ?side,
        rows = frame.nrows(),
        kept = keep.iter().filter(|kept| **kept).count(),
        "as_period"
    );

    Ok(frame.filter_rows(&keep)?)
}
