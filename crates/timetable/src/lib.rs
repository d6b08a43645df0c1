#![forbid(unsafe_code)]

//! Time-aware row filtering for indexed tables.
//!
//! ```text
//! let frame = TimeFrame::new(columns)?.with_index("date")?;
//! let q1 = filter_time(&frame, &"2015-01 ~ 2015-03".parse()?)?;
//! let monthly = as_period(&frame, &parse_period("1 month")?, CollapseSide::End)?;
//! ```
//!
//! The building blocks live in the `tt-*` crates and are re-exported
//! here unchanged.

pub use tt_columnar::{Column, ColumnError, ValidityMask};
pub use tt_filter::{
    ColumnSelector, FilterError, RowSelector, TimeFilterExt, filter_time, subset, time_mask,
};
pub use tt_floor::{
    CollapseSide, DEFAULT_FLOOR_UNIT, FloorError, FloorOptions, as_period, collapse_index,
    floor_index, floor_index_with, floor_scalar, floor_scalar_to, floor_time_index,
};
pub use tt_formula::{
    Bound, FormulaBounds, FormulaError, FormulaSide, PartialTime, Precision, ResolvedRange, Side,
    TimeFormula, expand_bound, parse_time_formula, parse_time_string, resolve_range,
};
pub use tt_frame::{FrameError, TimeFrame};
pub use tt_groupby::{GroupByError, GroupByOptions, RowGroup, group_rows};
pub use tt_index::{
    IndexClass, IndexError, TimeIndex, in_range, index_extremes, is_monotonic_increasing,
    range_positions,
};
pub use tt_period::{PeriodError, PeriodSpec, parse_period};
pub use tt_types::{
    CalendarError, DType, NullKind, Scalar, TimeUnit, TypeError, YearMonth, YearQuarter,
};

pub mod prelude {
    pub use crate::{
        CollapseSide, Column, ColumnSelector, FilterError, FloorOptions, FormulaSide, IndexClass,
        PeriodSpec, RowSelector, Scalar, TimeFilterExt, TimeFormula, TimeFrame, as_period,
        filter_time, floor_index, floor_time_index, parse_period, subset,
    };
}
