#![forbid(unsafe_code)]

//! Flooring of time index values to period boundaries.
//!
//! Every index class is floored through the same naive calendar
//! arithmetic in [`tt_types::calendar`]; this crate only handles getting
//! each class in and out of naive local time.

mod collapse;

use chrono::{DateTime, Days, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tt_columnar::{Column, ColumnError};
use tt_frame::{FrameError, TimeFrame};
use tt_groupby::GroupByError;
use tt_index::{IndexClass, IndexError};
use tt_period::{PeriodError, PeriodSpec, parse_period};
use tt_types::calendar::floor_naive;
use tt_types::{CalendarError, Scalar, YearMonth, YearQuarter};

pub use collapse::{CollapseSide, as_period, collapse_index};

/// Unit used when a caller has no preference.
pub const DEFAULT_FLOOR_UNIT: &str = "seconds";

#[derive(Debug, Error)]
pub enum FloorError {
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    GroupBy(#[from] GroupByError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorOptions {
    /// First day of a week for `week` floors.
    pub week_start: Weekday,
    /// Zone whose local clock datetime values are floored in.
    pub time_zone: Tz,
}

impl Default for FloorOptions {
    fn default() -> Self {
        Self {
            week_start: Weekday::Sun,
            time_zone: Tz::UTC,
        }
    }
}

impl FloorOptions {
    #[must_use]
    pub fn in_zone(time_zone: Tz) -> Self {
        Self {
            time_zone,
            ..Self::default()
        }
    }
}

/// Floor a single index value to `unit`, a period string such as
/// `"day"` or `"15 minutes"`.
pub fn floor_scalar(value: &Scalar, unit: &str, options: &FloorOptions) -> Result<Scalar, FloorError> {
    floor_scalar_to(value, &parse_period(unit)?, options)
}

/// [`floor_scalar`] with an already parsed period.
pub fn floor_scalar_to(
    value: &Scalar,
    period: &PeriodSpec,
    options: &FloorOptions,
) -> Result<Scalar, FloorError> {
    let floor = |naive: NaiveDateTime| {
        floor_naive(naive, period.frequency, period.unit, options.week_start)
    };

    let floored = match value {
        Scalar::Null(_) => value.clone(),
        Scalar::DateTime(instant) => {
            let local = instant.with_timezone(&options.time_zone).naive_local();
            Scalar::DateTime(anchor_local(floor(local)?, options.time_zone)?)
        }
        Scalar::Date(date) => Scalar::Date(floor(date.and_time(NaiveTime::MIN))?.date()),
        Scalar::Time(time) => {
            let epoch = DateTime::UNIX_EPOCH.date_naive();
            Scalar::Time(floor(epoch.and_time(*time))?.time())
        }
        Scalar::YearMonth(month) => Scalar::YearMonth(YearMonth::from_date(
            floor(month.first_day().and_time(NaiveTime::MIN))?.date(),
        )),
        Scalar::YearQuarter(quarter) => Scalar::YearQuarter(YearQuarter::from_date(
            floor(quarter.first_day().and_time(NaiveTime::MIN))?.date(),
        )),
        other => {
            return Err(IndexError::UnsupportedIndexClass {
                dtype: other.dtype(),
            }
            .into());
        }
    };
    Ok(floored)
}

/// Map a floored local time back to an instant. Ambiguous times take
/// the earlier instant. Times inside a DST gap are read with the offset
/// in force before the gap, which lands on the transition itself.
fn anchor_local(local: NaiveDateTime, time_zone: Tz) -> Result<DateTime<Utc>, FloorError> {
    if let Some(instant) = time_zone.from_local_datetime(&local).earliest() {
        return Ok(instant.with_timezone(&Utc));
    }

    let out_of_range = || CalendarError::OutOfRange { value: local };
    let before = local.checked_sub_days(Days::new(1)).ok_or_else(out_of_range)?;
    let offset = time_zone
        .offset_from_local_datetime(&before)
        .earliest()
        .ok_or_else(out_of_range)?
        .fix();
    let utc = local
        .checked_sub_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())))
        .ok_or_else(out_of_range)?;
    Ok(utc.and_utc())
}

/// Floor every value of a time column to `unit`, in UTC with Sunday
/// weeks.
pub fn floor_index(column: &Column, unit: &str) -> Result<Column, FloorError> {
    floor_index_with(column, unit, &FloorOptions::default())
}

pub fn floor_index_with(
    column: &Column,
    unit: &str,
    options: &FloorOptions,
) -> Result<Column, FloorError> {
    let class = IndexClass::from_dtype(column.dtype())?;
    let period = parse_period(unit)?;
    let values = column
        .values()
        .iter()
        .map(|value| floor_scalar_to(value, &period, options))
        .collect::<Result<Vec<_>, _>>()?;

    #[cfg(feature = "tracing")]
    tracing::debug!(%class, %period, rows = values.len(), "floor_index");

    Ok(Column::new(class.dtype(), values)?)
}

/// Floor a frame's index column in the index's own time zone.
pub fn floor_time_index(frame: &TimeFrame, unit: &str) -> Result<TimeFrame, FloorError> {
    let index = frame.require_time_index()?;
    let floored = floor_index_with(
        frame.index_column()?,
        unit,
        &FloorOptions::in_zone(index.time_zone()),
    )?;
    Ok(frame.replace_column(index.column(), floored)?)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
    use chrono_tz::Tz;
    use tt_columnar::Column;
    use tt_frame::TimeFrame;
    use tt_index::{IndexClass, IndexError};
    use tt_period::PeriodError;
    use tt_types::{CalendarError, NullKind, Scalar, TimeUnit, YearMonth, YearQuarter};

    use super::{
        DEFAULT_FLOOR_UNIT, FloorError, FloorOptions, floor_index, floor_scalar, floor_time_index,
    };

    fn day(y: i32, m: u32, d: u32) -> Scalar {
        Scalar::Date(NaiveDate::from_ymd_opt(y, m, d).expect("date"))
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Scalar {
        Scalar::DateTime(Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().expect("utc"))
    }

    fn hms(h: u32, m: u32, s: u32) -> Scalar {
        Scalar::Time(NaiveTime::from_hms_opt(h, m, s).expect("time"))
    }

    #[test]
    fn dates_floor_to_calendar_units() {
        let options = FloorOptions::default();
        let value = day(2015, 8, 19);
        let cases = [
            ("day", day(2015, 8, 19)),
            ("2 days", day(2015, 8, 19)),
            ("month", day(2015, 8, 1)),
            ("quarter", day(2015, 7, 1)),
            ("year", day(2015, 1, 1)),
            ("2 years", day(2014, 1, 1)),
            ("week", day(2015, 8, 16)),
        ];
        for (unit, expected) in cases {
            assert_eq!(floor_scalar(&value, unit, &options).expect(unit), expected, "{unit}");
        }
        assert_eq!(
            floor_scalar(&day(2015, 8, 20), "2 d", &options).expect("2 d"),
            day(2015, 8, 19)
        );
    }

    #[test]
    fn week_start_is_configurable() {
        let monday = FloorOptions {
            week_start: Weekday::Mon,
            ..FloorOptions::default()
        };
        assert_eq!(
            floor_scalar(&day(2015, 1, 7), "week", &monday).expect("week"),
            day(2015, 1, 5)
        );
        assert_eq!(
            floor_scalar(&day(2015, 1, 7), "week", &FloorOptions::default()).expect("week"),
            day(2015, 1, 4)
        );
    }

    #[test]
    fn multi_week_floor_is_rejected() {
        let err = floor_scalar(&day(2015, 1, 7), "2 weeks", &FloorOptions::default())
            .expect_err("two weeks");
        assert!(matches!(
            err,
            FloorError::Calendar(CalendarError::UnsupportedStep {
                step: 2,
                unit: TimeUnit::Week
            })
        ));
    }

    #[test]
    fn time_of_day_floors_on_the_clock() {
        let options = FloorOptions::default();
        assert_eq!(
            floor_scalar(&hms(9, 44, 10), "15 minutes", &options).expect("15 min"),
            hms(9, 30, 0)
        );
        assert_eq!(floor_scalar(&hms(9, 44, 10), "hour", &options).expect("hour"), hms(9, 0, 0));
        assert_eq!(floor_scalar(&hms(9, 44, 10), "day", &options).expect("day"), hms(0, 0, 0));
    }

    #[test]
    fn month_and_quarter_classes_round_trip() {
        let options = FloorOptions::default();
        let may = Scalar::YearMonth(YearMonth::new(2015, 5).expect("month"));
        assert_eq!(
            floor_scalar(&may, "quarter", &options).expect("quarter"),
            Scalar::YearMonth(YearMonth::new(2015, 4).expect("month"))
        );
        assert_eq!(floor_scalar(&may, "month", &options).expect("month"), may);

        let q3 = Scalar::YearQuarter(YearQuarter::new(2015, 3).expect("quarter"));
        assert_eq!(
            floor_scalar(&q3, "2 years", &options).expect("2 years"),
            Scalar::YearQuarter(YearQuarter::new(2014, 1).expect("quarter"))
        );
    }

    #[test]
    fn datetimes_floor_in_local_time() {
        let new_york = FloorOptions::in_zone(Tz::America__New_York);
        // 01:30 EST.
        assert_eq!(
            floor_scalar(&utc(2015, 3, 8, 6, 30, 0), "day", &new_york).expect("day"),
            utc(2015, 3, 8, 5, 0, 0)
        );
        // Same instant floored in UTC.
        assert_eq!(
            floor_scalar(&utc(2015, 3, 8, 6, 30, 0), "day", &FloorOptions::default())
                .expect("utc day"),
            utc(2015, 3, 8, 0, 0, 0)
        );
    }

    #[test]
    fn dst_transitions_resolve_to_an_existing_instant() {
        let new_york = FloorOptions::in_zone(Tz::America__New_York);
        // 03:30 EDT floors to 02:00 local, which is skipped; the result is
        // the transition instant.
        assert_eq!(
            floor_scalar(&utc(2015, 3, 8, 7, 30, 0), "2 hours", &new_york).expect("gap"),
            utc(2015, 3, 8, 7, 0, 0)
        );
        // Second 01:30 (EST) floors to the first 01:00 (EDT).
        let floored = floor_scalar(&utc(2015, 11, 1, 6, 30, 0), "hour", &new_york).expect("fold");
        assert_eq!(floored, utc(2015, 11, 1, 5, 0, 0));
        assert_eq!(floor_scalar(&floored, "hour", &new_york).expect("again"), floored);
    }

    #[test]
    fn default_unit_drops_subseconds() {
        let instant = Utc
            .with_ymd_and_hms(2015, 1, 1, 12, 0, 0)
            .single()
            .expect("utc")
            + chrono::TimeDelta::milliseconds(750);
        assert_eq!(
            floor_scalar(&Scalar::DateTime(instant), DEFAULT_FLOOR_UNIT, &FloorOptions::default())
                .expect("seconds"),
            utc(2015, 1, 1, 12, 0, 0)
        );
    }

    #[test]
    fn column_floor_keeps_missing_values() {
        let column = Column::from_values(vec![day(2015, 8, 19), Scalar::Null(NullKind::NaT)])
            .expect("column");
        let floored = floor_index(&column, "month").expect("floor");
        assert_eq!(floored.values(), &[day(2015, 8, 1), Scalar::Null(NullKind::NaT)]);
        assert_eq!(floored.dtype(), column.dtype());
    }

    #[test]
    fn non_time_columns_and_bad_units_are_rejected() {
        let ints = Column::from_values(vec![Scalar::Int64(1)]).expect("ints");
        assert!(matches!(
            floor_index(&ints, "day"),
            Err(FloorError::Index(IndexError::UnsupportedIndexClass { .. }))
        ));

        let dates = Column::from_values(vec![day(2015, 1, 1)]).expect("dates");
        assert!(matches!(
            floor_index(&dates, "fortnight"),
            Err(FloorError::Period(PeriodError::UnknownUnit { .. }))
        ));
    }

    #[test]
    fn frame_index_floors_in_its_own_zone() {
        let frame = TimeFrame::new(vec![(
            "ts".to_owned(),
            Column::from_values(vec![utc(2015, 3, 8, 6, 30, 0), utc(2015, 3, 9, 3, 0, 0)])
                .expect("ts"),
        )])
        .expect("frame")
        .with_time_index("ts", Tz::America__New_York)
        .expect("index");

        let floored = floor_time_index(&frame, "day").expect("floor");
        let index = floored.require_time_index().expect("index");
        assert_eq!(index.class(), IndexClass::DateTime);
        assert_eq!(index.time_zone(), Tz::America__New_York);
        assert_eq!(
            floored.index_column().expect("column").values(),
            &[utc(2015, 3, 8, 5, 0, 0), utc(2015, 3, 8, 5, 0, 0)]
        );
    }

    #[test]
    fn options_serialize() {
        let json = serde_json::to_string(&FloorOptions::default()).expect("json");
        assert_eq!(json, r#"{"week_start":"Sun","time_zone":"UTC"}"#);
    }
}
