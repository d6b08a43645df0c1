#![forbid(unsafe_code)]

//! Time formulas: `from ~ to` range expressions over a time index.
//!
//! A formula is parsed in two steps. [`parse_time_formula`] turns each
//! side into a [`Bound`] using only the index class, so malformed
//! strings fail before any data is touched. [`resolve_range`] then
//! expands both bounds into concrete index values, resolving `start`
//! and `end` against the extremes of whatever slice of the index is
//! being filtered (a whole table or a single group).

mod expand;
mod parse;

use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tt_index::IndexClass;
use tt_types::{DType, Scalar};

pub use expand::{ResolvedRange, Side, expand_bound, resolve_range};
pub use parse::{Bound, FormulaBounds, PartialTime, Precision, parse_time_formula, parse_time_string};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    #[error("cannot parse {value:?} as a {class} time string")]
    UnparsableTimeString { value: String, class: IndexClass },
    #[error("range start {from} is after range end {to}")]
    InvalidRange { from: String, to: String },
    #[error("literal of dtype {dtype:?} cannot bound a {class} index")]
    LiteralClassMismatch { dtype: DType, class: IndexClass },
    #[error("local time {value:?} does not exist in time zone {time_zone}")]
    NonexistentLocalTime { value: String, time_zone: Tz },
    #[error("malformed time formula {0:?}")]
    MalformedFormula(String),
}

/// One side of a time formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FormulaSide {
    /// Earliest index value of the slice being filtered.
    Start,
    /// Latest index value of the slice being filtered.
    End,
    Text(String),
    /// A value already of the index's native type, used as given.
    Value(Scalar),
}

impl From<&str> for FormulaSide {
    fn from(value: &str) -> Self {
        match value.trim() {
            "start" => Self::Start,
            "end" => Self::End,
            _ => Self::Text(value.to_owned()),
        }
    }
}

impl From<String> for FormulaSide {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<i64> for FormulaSide {
    fn from(value: i64) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Scalar> for FormulaSide {
    fn from(value: Scalar) -> Self {
        Self::Value(value)
    }
}

impl fmt::Display for FormulaSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::End => f.write_str("end"),
            Self::Text(text) => write!(f, "'{text}'"),
            Self::Value(value) => write!(f, "{value}"),
        }
    }
}

/// `from ~ to`, or the one-sided `~ to` which covers exactly the span
/// implied by `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeFormula {
    from: Option<FormulaSide>,
    to: FormulaSide,
}

impl TimeFormula {
    #[must_use]
    pub fn new(from: impl Into<FormulaSide>, to: impl Into<FormulaSide>) -> Self {
        Self {
            from: Some(from.into()),
            to: to.into(),
        }
    }

    #[must_use]
    pub fn one_sided(rhs: impl Into<FormulaSide>) -> Self {
        Self {
            from: None,
            to: rhs.into(),
        }
    }

    /// The left-hand side; for a one-sided formula this is the right-hand
    /// side again.
    #[must_use]
    pub fn from_side(&self) -> &FormulaSide {
        self.from.as_ref().unwrap_or(&self.to)
    }

    #[must_use]
    pub fn to_side(&self) -> &FormulaSide {
        &self.to
    }

    #[must_use]
    pub fn is_one_sided(&self) -> bool {
        self.from.is_none()
    }
}

impl fmt::Display for TimeFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.from {
            Some(from) => write!(f, "{from} ~ {}", self.to),
            None => write!(f, "~ {}", self.to),
        }
    }
}

impl FromStr for TimeFormula {
    type Err = FormulaError;

    /// Parses `"2015-01 ~ 2015-06"`, `"~ 2015"` or `"'start' ~ '2015-03'"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse::parse_formula_str(s)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tt_types::Scalar;

    use super::{FormulaError, FormulaSide, TimeFormula};

    #[test]
    fn keywords_become_start_and_end() {
        assert_eq!(FormulaSide::from("start"), FormulaSide::Start);
        assert_eq!(FormulaSide::from(" end "), FormulaSide::End);
        assert_eq!(
            FormulaSide::from("2015"),
            FormulaSide::Text("2015".to_owned())
        );
        assert_eq!(FormulaSide::from(2015), FormulaSide::Text("2015".to_owned()));
    }

    #[test]
    fn one_sided_formula_mirrors_rhs() {
        let formula = TimeFormula::one_sided("2015");
        assert!(formula.is_one_sided());
        assert_eq!(formula.from_side(), formula.to_side());
        assert_eq!(formula.to_string(), "~ '2015'");
    }

    #[test]
    fn string_formulas_parse_both_shapes() {
        let formula: TimeFormula = "2015-01 ~ 2015-06".parse().expect("two-sided");
        assert_eq!(formula, TimeFormula::new("2015-01", "2015-06"));

        let formula: TimeFormula = "~'2015'".parse().expect("one-sided");
        assert_eq!(formula, TimeFormula::one_sided("2015"));

        let formula: TimeFormula = "\"start\" ~ '2015-01-01 12:00:00'"
            .parse()
            .expect("quoted keyword");
        assert_eq!(formula.from_side(), &FormulaSide::Start);
        assert_eq!(
            formula.to_side(),
            &FormulaSide::Text("2015-01-01 12:00:00".to_owned())
        );
    }

    #[test]
    fn string_formulas_reject_bad_shapes() {
        for bad in ["2015", "2015 ~", "a ~ b ~ c", "'2015 ~ 2016", " ~ "] {
            assert!(
                matches!(
                    bad.parse::<TimeFormula>(),
                    Err(FormulaError::MalformedFormula(_))
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn formula_serializes_sides_by_kind() {
        let day = NaiveDate::from_ymd_opt(2015, 1, 1).expect("date");
        let formula = TimeFormula::new(FormulaSide::Start, Scalar::Date(day));
        let json = serde_json::to_string(&formula).expect("json");
        assert_eq!(
            json,
            r#"{"from":{"kind":"start"},"to":{"kind":"value","value":{"kind":"date","value":"2015-01-01"}}}"#
        );
    }
}
