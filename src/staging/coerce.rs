//! Cell-level coercion and text normalization.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{is_null_token, ColumnSpec, DataType, Normalization, Value};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Outcome of coercing one cell against its column declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub value: Value,
    /// A non-null input could not be converted and became `Null`.
    pub invalid: bool,
    /// The numeric value fell outside the declared domain.
    pub out_of_domain: bool,
    /// The value was pulled back into the domain.
    pub clamped: bool,
}

impl Coerced {
    fn ok(value: Value) -> Self {
        Self {
            value,
            invalid: false,
            out_of_domain: false,
            clamped: false,
        }
    }

    fn invalid() -> Self {
        Self {
            value: Value::Null,
            invalid: true,
            out_of_domain: false,
            clamped: false,
        }
    }
}

/// Convert `value` to the declared type, then apply the declared normalization
/// and domain.
pub fn coerce(value: &Value, spec: &ColumnSpec) -> Coerced {
    if value.is_null() {
        return Coerced::ok(Value::Null);
    }

    match spec.data_type {
        DataType::Text => {
            let text = value.to_field();
            let normalized = normalize_text(&text, spec.normalization);
            // "n/a" title-cases to the null token "N/A".
            if is_null_token(&normalized) {
                Coerced::ok(Value::Null)
            } else {
                Coerced::ok(Value::Text(normalized))
            }
        }
        DataType::Integer => match value.as_f64() {
            Some(x) if x.fract() == 0.0 => check_domain(x, spec, |x| Value::Integer(x as i64)),
            _ => Coerced::invalid(),
        },
        DataType::Float => match value.as_f64() {
            Some(x) => check_domain(x, spec, Value::Float),
            None => Coerced::invalid(),
        },
        DataType::Boolean => value
            .as_bool()
            .map(|b| Coerced::ok(Value::Boolean(b)))
            .unwrap_or_else(Coerced::invalid),
        DataType::Date => value
            .as_date()
            .map(|d| Coerced::ok(Value::Date(d)))
            .unwrap_or_else(Coerced::invalid),
        DataType::Timestamp => value
            .as_timestamp()
            .map(|ts| Coerced::ok(Value::Timestamp(ts)))
            .unwrap_or_else(Coerced::invalid),
    }
}

fn check_domain(x: f64, spec: &ColumnSpec, build: impl Fn(f64) -> Value) -> Coerced {
    if spec.domain.contains(x) {
        return Coerced::ok(build(x));
    }
    if spec.clamp {
        Coerced {
            value: build(spec.domain.clamp(x)),
            invalid: false,
            out_of_domain: true,
            clamped: true,
        }
    } else {
        Coerced {
            value: build(x),
            invalid: false,
            out_of_domain: true,
            clamped: false,
        }
    }
}

/// Apply a text normalization. Every mode except `None` trims and collapses
/// runs of whitespace.
pub fn normalize_text(text: &str, mode: Normalization) -> String {
    if mode == Normalization::None {
        return text.to_string();
    }
    let collapsed = WHITESPACE.replace_all(text.trim(), " ");
    match mode {
        Normalization::None | Normalization::Trim => collapsed.into_owned(),
        Normalization::Lower => collapsed.to_lowercase(),
        Normalization::Title => title_case(&collapsed),
    }
}

/// Upper-case the first letter of every word and lower-case the rest.
/// A word starts after any non-alphabetic character.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}
