use std::cmp::Ordering;

use chrono::{
    DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc,
};
use chrono_tz::Tz;
use tt_index::IndexClass;
use tt_types::{Scalar, YearMonth, YearQuarter};

use crate::FormulaError;
use crate::parse::{Bound, FormulaBounds, PartialTime, Precision};

/// Which end of a range a bound sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    From,
    To,
}

/// Concrete inclusive bounds in the index's native scalar kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRange {
    from: Scalar,
    to: Scalar,
}

impl ResolvedRange {
    #[must_use]
    pub fn from(&self) -> &Scalar {
        &self.from
    }

    #[must_use]
    pub fn to(&self) -> &Scalar {
        &self.to
    }

    #[must_use]
    pub fn into_parts(self) -> (Scalar, Scalar) {
        (self.from, self.to)
    }
}

/// Expand one bound into an index value.
///
/// `extremes` are the smallest and largest values of the index slice
/// being filtered; `start`/`end` resolve to them and yield `None` when
/// the slice has no values.
pub fn expand_bound(
    bound: &Bound,
    side: Side,
    class: IndexClass,
    time_zone: Tz,
    extremes: Option<(&Scalar, &Scalar)>,
) -> Result<Option<Scalar>, FormulaError> {
    match bound {
        Bound::Start => Ok(extremes.map(|(lo, _)| lo.clone())),
        Bound::End => Ok(extremes.map(|(_, hi)| hi.clone())),
        Bound::Exact(value) => Ok(Some(value.clone())),
        Bound::Partial(time) => expand_partial(time, side, class, time_zone).map(Some),
    }
}

/// Expand both bounds and check `from <= to`.
pub fn resolve_range(
    class: IndexClass,
    time_zone: Tz,
    bounds: &FormulaBounds,
    extremes: Option<(&Scalar, &Scalar)>,
) -> Result<Option<ResolvedRange>, FormulaError> {
    let from = expand_bound(&bounds.from, Side::From, class, time_zone, extremes)?;
    let to = expand_bound(&bounds.to, Side::To, class, time_zone, extremes)?;
    let (Some(from), Some(to)) = (from, to) else {
        return Ok(None);
    };

    if from.time_cmp(&to) == Some(Ordering::Greater) {
        return Err(FormulaError::InvalidRange {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(Some(ResolvedRange { from, to }))
}

fn expand_partial(
    time: &PartialTime,
    side: Side,
    class: IndexClass,
    time_zone: Tz,
) -> Result<Scalar, FormulaError> {
    let edge = window_edge(time, side).ok_or_else(|| FormulaError::UnparsableTimeString {
        value: time.text.clone(),
        class,
    })?;

    let value = match class {
        IndexClass::Date => Scalar::Date(edge.date()),
        IndexClass::YearMonth => Scalar::YearMonth(YearMonth::from_date(edge.date())),
        IndexClass::YearQuarter => Scalar::YearQuarter(YearQuarter::from_date(edge.date())),
        IndexClass::TimeOfDay => Scalar::Time(edge.time()),
        IndexClass::DateTime => Scalar::DateTime(anchor(time, edge, side, time_zone)?),
    };
    Ok(value)
}

/// First (`From`) or last (`To`) second of the window spelled out by
/// `time`. Second-precision values are their own window.
fn window_edge(time: &PartialTime, side: Side) -> Option<NaiveDateTime> {
    let pick = |precision: Precision, given: u32, first: u32, last: u32| {
        if time.covers(precision) {
            given
        } else {
            match side {
                Side::From => first,
                Side::To => last,
            }
        }
    };

    let month = pick(Precision::Month, time.month, 1, 12);
    let month_start = NaiveDate::from_ymd_opt(time.year, month, 1)?;
    let day = pick(Precision::Day, time.day, 1, u32::from(month_start.num_days_in_month()));
    let hour = pick(Precision::Hour, time.hour, 0, 23);
    let minute = pick(Precision::Minute, time.minute, 0, 59);
    let second = pick(Precision::Second, time.second, 0, 59);

    let date = NaiveDate::from_ymd_opt(time.year, month, day)?;
    let clock = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(date.and_time(clock))
}

/// Pin a local wall-clock edge to an instant: an explicit zone suffix
/// wins, otherwise the index's zone applies. Repeated wall-clock times
/// take the earliest instant on the `From` side and the latest on the
/// `To` side.
///
/// A skipped wall-clock time is an error only when the caller spelled
/// out the time of day. An implied edge (midnight for a day, month or
/// year) in a skipped span snaps to the span's boundary instead: the
/// transition on the `From` side, one second before it on the `To` side.
fn anchor(
    time: &PartialTime,
    edge: NaiveDateTime,
    side: Side,
    time_zone: Tz,
) -> Result<DateTime<Utc>, FormulaError> {
    let nonexistent = || FormulaError::NonexistentLocalTime {
        value: time.text.clone(),
        time_zone,
    };

    if let Some(offset) = time.offset {
        return offset
            .from_local_datetime(&edge)
            .single()
            .map(|instant| instant.with_timezone(&Utc))
            .ok_or_else(nonexistent);
    }

    match time_zone.from_local_datetime(&edge) {
        LocalResult::Single(instant) => Ok(instant.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, latest) => Ok(match side {
            Side::From => earliest.with_timezone(&Utc),
            Side::To => latest.with_timezone(&Utc),
        }),
        LocalResult::None if time.covers(Precision::Hour) => Err(nonexistent()),
        LocalResult::None => {
            let transition = gap_transition(edge, time_zone).ok_or_else(nonexistent)?;
            match side {
                Side::From => Ok(transition),
                Side::To => transition
                    .checked_sub_signed(chrono::TimeDelta::seconds(1))
                    .ok_or_else(nonexistent),
            }
        }
    }
}

/// First instant whose wall-clock time in `time_zone` is at or after
/// `local`. For a `local` inside a skipped span this is the transition
/// that ends the span.
fn gap_transition(local: NaiveDateTime, time_zone: Tz) -> Option<DateTime<Utc>> {
    let offset_seconds = |at: NaiveDateTime| {
        time_zone
            .offset_from_local_datetime(&at)
            .earliest()
            .map(|offset| i64::from(offset.fix().local_minus_utc()))
    };
    let before = offset_seconds(local.checked_sub_days(Days::new(1))?)?;
    let after = offset_seconds(local.checked_add_days(Days::new(1))?)?;

    // The transition lies between `local` read with either offset.
    let wall = local.and_utc().timestamp();
    let (mut lo, mut hi) = (wall - before.max(after), wall - before.min(after));
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let mid_local = DateTime::from_timestamp(mid, 0)?
            .with_timezone(&time_zone)
            .naive_local();
        if mid_local >= local {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    DateTime::from_timestamp(lo, 0)
}
