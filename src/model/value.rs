//! Cell values and the text parsers used to type them.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Tokens treated as missing when read from a CSV cell.
const NULL_TOKENS: &[&str] = &["NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "none"];

/// Digits grouped in threes by commas, with an optional fraction.
static THOUSANDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("static pattern"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Format used when dates are written out.
pub const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d";

/// Format used when timestamps are written out.
/// Fractional seconds are written only when present.
pub const TIMESTAMP_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Build a value from a raw CSV field. Empty and NA-like fields become `Null`.
    pub fn from_raw(field: &str) -> Self {
        if is_null_token(field) {
            Value::Null
        } else {
            Value::Text(field.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the text of a `Text` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a number, parsing text if needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            Value::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// Interpret the value as a calendar date, parsing text if needed.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            Value::Text(s) => parse_date(s).or_else(|| parse_timestamp(s).map(|ts| ts.date())),
            _ => None,
        }
    }

    /// Interpret the value as a timestamp. Dates map to midnight.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::Text(s) => parse_timestamp(s).or_else(|| parse_date(s)?.and_hms_opt(0, 0, 0)),
            _ => None,
        }
    }

    /// Interpret the value as a boolean flag.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Canonical text used to compare key values across tables.
    ///
    /// Integral floats (`3.0`) and their text forms compare equal to `3`.
    pub fn key_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(format!("{}", *f as i64)),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => {
                let trimmed = s.trim();
                match trimmed.strip_suffix(".0") {
                    Some(head) if head.parse::<i64>().is_ok() => Some(head.to_string()),
                    _ => Some(trimmed.to_string()),
                }
            }
            Value::Boolean(b) => Some(b.to_string()),
            Value::Date(d) => Some(d.format(DATE_OUTPUT_FORMAT).to_string()),
            Value::Timestamp(ts) => Some(ts.format(TIMESTAMP_OUTPUT_FORMAT).to_string()),
        }
    }

    /// Render the value as a CSV field. `Null` renders as an empty field.
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format(DATE_OUTPUT_FORMAT).to_string(),
            Value::Timestamp(ts) => ts.format(TIMESTAMP_OUTPUT_FORMAT).to_string(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_field()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// True if `field` reads as missing: blank or one of the NA-like tokens.
pub fn is_null_token(field: &str) -> bool {
    let trimmed = field.trim();
    trimmed.is_empty() || NULL_TOKENS.contains(&trimmed)
}

/// Parse a number, tolerating surrounding whitespace and well-formed
/// thousands grouping (`1,250.5`). Any other comma makes the text unparseable.
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let parsed = match trimmed.parse::<f64>() {
        Ok(x) => x,
        Err(_) if THOUSANDS.is_match(trimmed) => trimmed.replace(',', "").parse::<f64>().ok()?,
        Err(_) => return None,
    };
    parsed.is_finite().then_some(parsed)
}

/// Parse a calendar date in one of the accepted formats.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Parse a timestamp in one of the accepted formats, including RFC 3339.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.naive_local())
        })
}
