#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tt_columnar::ColumnError;
use tt_formula::{FormulaBounds, FormulaError, TimeFormula, parse_time_formula, resolve_range};
use tt_frame::{FrameError, TimeFrame};
use tt_groupby::{GroupByError, GroupByOptions, group_rows};
use tt_index::{TimeIndex, index_extremes, range_positions};
use tt_types::Scalar;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Formula(#[from] FormulaError),
    #[error(transparent)]
    GroupBy(#[from] GroupByError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// Keep the rows whose index falls inside `formula`'s range, inclusive
/// on both ends.
///
/// Grouped frames resolve `start`/`end` against each group's own index
/// extremes. Row order, columns, the time index and grouping all carry
/// over unchanged.
pub fn filter_time(frame: &TimeFrame, formula: &TimeFormula) -> Result<TimeFrame, FilterError> {
    let mask = time_mask(frame, formula)?;
    Ok(frame.filter_rows(&mask)?)
}

/// The row selection [`filter_time`] would apply.
pub fn time_mask(frame: &TimeFrame, formula: &TimeFormula) -> Result<Vec<bool>, FilterError> {
    let index = frame.require_time_index()?;
    let bounds = parse_time_formula(index.class(), formula)?;
    let index_column = frame.index_column()?;
    let groups = group_rows(frame, GroupByOptions::default())?;

    let mut mask = vec![false; frame.nrows()];
    if !frame.is_grouped() {
        for position in select_in_slice(index, &bounds, index_column.values())? {
            mask[position] = true;
        }
    } else {
        for group in &groups {
            let values = index_column.take_positions(&group.positions)?;
            for local in select_in_slice(index, &bounds, values.values())? {
                mask[group.positions[local]] = true;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        formula = %formula,
        groups = groups.len(),
        rows = frame.nrows(),
        selected = mask.iter().filter(|keep| **keep).count(),
        "filter_time"
    );

    Ok(mask)
}

fn select_in_slice(
    index: &TimeIndex,
    bounds: &FormulaBounds,
    values: &[Scalar],
) -> Result<Vec<usize>, FormulaError> {
    let extremes = index_extremes(values);
    let Some(range) = resolve_range(index.class(), index.time_zone(), bounds, extremes)? else {
        return Ok(Vec::new());
    };
    Ok(range_positions(values, range.from(), range.to()))
}

/// Which rows [`subset`] keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RowSelector {
    All,
    Formula(TimeFormula),
    Positions(Vec<usize>),
    Mask(Vec<bool>),
}

impl From<TimeFormula> for RowSelector {
    fn from(formula: TimeFormula) -> Self {
        Self::Formula(formula)
    }
}

/// Which columns [`subset`] keeps, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnSelector {
    Names(Vec<String>),
    Positions(Vec<usize>),
}

/// Combined row/column selection. A formula row selector filters by
/// time; every other selector is plain positional, mask or column
/// indexing. Rows are selected before columns, so a formula can still
/// see the index column even if the column selector drops it.
pub fn subset(
    frame: &TimeFrame,
    rows: &RowSelector,
    columns: Option<&ColumnSelector>,
) -> Result<TimeFrame, FilterError> {
    let selected = match rows {
        RowSelector::All => frame.clone(),
        RowSelector::Formula(formula) => filter_time(frame, formula)?,
        RowSelector::Positions(positions) => frame.select_rows(positions)?,
        RowSelector::Mask(mask) => frame.filter_rows(mask)?,
    };

    let out = match columns {
        None => selected,
        Some(ColumnSelector::Names(names)) => {
            let names = names.iter().map(String::as_str).collect::<Vec<_>>();
            selected.select_columns(&names)?
        }
        Some(ColumnSelector::Positions(positions)) => selected.select_column_positions(positions)?,
    };
    Ok(out)
}

/// Method-call sugar for the free functions in this crate.
pub trait TimeFilterExt {
    fn filter_time(&self, formula: &TimeFormula) -> Result<TimeFrame, FilterError>;

    fn subset(
        &self,
        rows: &RowSelector,
        columns: Option<&ColumnSelector>,
    ) -> Result<TimeFrame, FilterError>;
}

impl TimeFilterExt for TimeFrame {
    fn filter_time(&self, formula: &TimeFormula) -> Result<TimeFrame, FilterError> {
        filter_time(self, formula)
    }

    fn subset(
        &self,
        rows: &RowSelector,
        columns: Option<&ColumnSelector>,
    ) -> Result<TimeFrame, FilterError> {
        subset(self, rows, columns)
    }
}
