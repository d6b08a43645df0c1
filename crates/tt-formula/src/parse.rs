use std::sync::LazyLock;

use chrono::{FixedOffset, NaiveDate};
use regex::{Captures, Regex};
use tt_index::IndexClass;
use tt_types::Scalar;

use crate::{FormulaError, FormulaSide, TimeFormula};

static CALENDAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})(?:[-/](\d{1,2})(?:[-/](\d{1,2})(?:[ T](\d{1,2})(?::(\d{1,2})(?::(\d{1,2}))?)?)?)?)?\s*(Z|[+-]\d{2}:?\d{2})?$",
    )
    .expect("calendar pattern is a valid regex")
});

static CLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{1,2})(?::(\d{1,2}))?)?$")
        .expect("clock pattern is a valid regex")
});

/// How much of a time string was spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

/// A time string split into its fields. Fields beyond `precision` are
/// unset and get filled in by expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialTime {
    pub(crate) text: String,
    pub(crate) precision: Precision,
    pub(crate) year: i32,
    pub(crate) month: u32,
    pub(crate) day: u32,
    pub(crate) hour: u32,
    pub(crate) minute: u32,
    pub(crate) second: u32,
    pub(crate) offset: Option<FixedOffset>,
}

impl PartialTime {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    #[must_use]
    pub fn offset(&self) -> Option<FixedOffset> {
        self.offset
    }

    pub(crate) fn covers(&self, precision: Precision) -> bool {
        self.precision >= precision
    }
}

/// A formula side after parsing, before resolution against data.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Start,
    End,
    Partial(PartialTime),
    Exact(Scalar),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormulaBounds {
    pub from: Bound,
    pub to: Bound,
}

/// Parse both sides of `formula` for an index of the given class.
///
/// A one-sided formula yields the same bound on both sides.
pub fn parse_time_formula(
    class: IndexClass,
    formula: &TimeFormula,
) -> Result<FormulaBounds, FormulaError> {
    let to = parse_side(class, formula.to_side())?;
    let from = if formula.is_one_sided() {
        to.clone()
    } else {
        parse_side(class, formula.from_side())?
    };
    Ok(FormulaBounds { from, to })
}

fn parse_side(class: IndexClass, side: &FormulaSide) -> Result<Bound, FormulaError> {
    match side {
        FormulaSide::Start => Ok(Bound::Start),
        FormulaSide::End => Ok(Bound::End),
        FormulaSide::Text(text) => parse_text_side(class, text),
        FormulaSide::Value(Scalar::Utf8(text)) => parse_text_side(class, text),
        FormulaSide::Value(Scalar::Int64(year)) => parse_text_side(class, &year.to_string()),
        FormulaSide::Value(value) if value.dtype() == class.dtype() => {
            Ok(Bound::Exact(value.clone()))
        }
        FormulaSide::Value(value) => Err(FormulaError::LiteralClassMismatch {
            dtype: value.dtype(),
            class,
        }),
    }
}

fn parse_text_side(class: IndexClass, text: &str) -> Result<Bound, FormulaError> {
    match text.trim() {
        "start" => Ok(Bound::Start),
        "end" => Ok(Bound::End),
        _ => parse_time_string(class, text).map(Bound::Partial),
    }
}

/// Split a time string into fields, detecting its precision.
///
/// Time-of-day indexes read `HH`, `HH:MM` or `HH:MM:SS`. Every other
/// class reads `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, then an optional
/// `HH[:MM[:SS]]` and, once a time is present, a `Z` or `±HH:MM` zone.
pub fn parse_time_string(class: IndexClass, text: &str) -> Result<PartialTime, FormulaError> {
    let unparsable = || FormulaError::UnparsableTimeString {
        value: text.to_owned(),
        class,
    };
    let trimmed = text.trim();

    let parsed = if class.has_calendar() {
        let caps = CALENDAR_PATTERN.captures(trimmed).ok_or_else(unparsable)?;
        parse_calendar(text, &caps)
    } else {
        let caps = CLOCK_PATTERN.captures(trimmed).ok_or_else(unparsable)?;
        parse_clock(text, &caps)
    };

    parsed.filter(fields_in_range).ok_or_else(unparsable)
}

fn field(caps: &Captures<'_>, group: usize) -> Option<Option<u32>> {
    match caps.get(group) {
        Some(m) => m.as_str().parse().ok().map(Some),
        None => Some(None),
    }
}

fn parse_calendar(text: &str, caps: &Captures<'_>) -> Option<PartialTime> {
    let year = caps.get(1)?.as_str().parse().ok()?;
    let fields = [
        field(caps, 2)?,
        field(caps, 3)?,
        field(caps, 4)?,
        field(caps, 5)?,
        field(caps, 6)?,
    ];
    let precision = match fields {
        [None, ..] => Precision::Year,
        [Some(_), None, ..] => Precision::Month,
        [Some(_), Some(_), None, ..] => Precision::Day,
        [Some(_), Some(_), Some(_), None, _] => Precision::Hour,
        [Some(_), Some(_), Some(_), Some(_), None] => Precision::Minute,
        [Some(_), Some(_), Some(_), Some(_), Some(_)] => Precision::Second,
    };

    let offset = match caps.get(7) {
        None => None,
        Some(_) if precision < Precision::Hour => return None,
        Some(m) => Some(parse_offset(m.as_str())?),
    };

    let [month, day, hour, minute, second] = fields.map(|value| value.unwrap_or_default());
    Some(PartialTime {
        text: text.to_owned(),
        precision,
        year,
        month,
        day,
        hour,
        minute,
        second,
        offset,
    })
}

fn parse_clock(text: &str, caps: &Captures<'_>) -> Option<PartialTime> {
    let hour = field(caps, 1)??;
    let minute = field(caps, 2)?;
    let second = field(caps, 3)?;
    let precision = match (minute, second) {
        (None, _) => Precision::Hour,
        (Some(_), None) => Precision::Minute,
        (Some(_), Some(_)) => Precision::Second,
    };

    Some(PartialTime {
        text: text.to_owned(),
        precision,
        year: 1970,
        month: 1,
        day: 1,
        hour,
        minute: minute.unwrap_or_default(),
        second: second.unwrap_or_default(),
        offset: None,
    })
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    if text == "Z" {
        return FixedOffset::east_opt(0);
    }
    let sign = if text.starts_with('-') { -1 } else { 1 };
    let digits = text[1..].replace(':', "");
    let hours: i32 = digits.get(..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..)?.parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn fields_in_range(time: &PartialTime) -> bool {
    let month_ok = !time.covers(Precision::Month) || (1..=12).contains(&time.month);
    let day_ok = !time.covers(Precision::Day)
        || NaiveDate::from_ymd_opt(time.year, time.month, time.day).is_some();
    month_ok && day_ok && time.hour < 24 && time.minute < 60 && time.second < 60
}

/// Split a formula string at its top-level `~`, honoring quotes.
pub(crate) fn parse_formula_str(input: &str) -> Result<TimeFormula, FormulaError> {
    let malformed = || FormulaError::MalformedFormula(input.to_owned());

    let mut sides = vec![String::new()];
    let mut quote = None;
    for c in input.chars() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (None, '~') => sides.push(String::new()),
            _ => {}
        }
        if let Some(current) = sides.last_mut() {
            if c != '~' || quote.is_some() {
                current.push(c);
            }
        }
    }
    if quote.is_some() {
        return Err(malformed());
    }

    let [lhs, rhs] = sides.as_slice() else {
        return Err(malformed());
    };
    let rhs = unquote(rhs).ok_or_else(malformed)?;
    let lhs = lhs.trim();
    if lhs.is_empty() {
        return Ok(TimeFormula::one_sided(rhs));
    }
    let lhs = unquote(lhs).ok_or_else(malformed)?;
    Ok(TimeFormula::new(lhs, rhs))
}

fn unquote(side: &str) -> Option<&str> {
    let side = side.trim();
    let inner = ['\'', '"']
        .iter()
        .find_map(|&q| side.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)))
        .unwrap_or(side);
    (!inner.trim().is_empty()).then_some(inner)
}
