//! Cell values and the field type dispatch set.

use std::fmt;

use serde::Deserialize;

/// The closed set of types a field schema can declare.
///
/// The contract fixes this set, so dispatch is a single `match` rather
/// than any open-ended lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A coerced cell scalar.
///
/// A cell starts life as raw text. The type check replaces the working
/// value with one of these, and every downstream check (enum, bounds,
/// length, multiple-of) reads the coerced form.
///
/// Equality is loose across `Int` and `Float` so that enum membership
/// behaves like the JSON documents that declare it: `5` and `5.0` are the
/// same member.
#[derive(Debug, Clone)]
pub enum ScalarValue {
    Str(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl ScalarValue {
    /// Numeric view, if this value is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Float(v) => Some(*v),
            ScalarValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Character length. Defined for strings only; length checks skip
    /// everything else.
    pub fn char_len(&self) -> Option<usize> {
        match self {
            ScalarValue::Str(s) => Some(s.chars().count()),
            _ => None,
        }
    }
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScalarValue::Str(a), ScalarValue::Str(b)) => a == b,
            (ScalarValue::Bool(a), ScalarValue::Bool(b)) => a == b,
            (ScalarValue::Int(a), ScalarValue::Int(b)) => a == b,
            (ScalarValue::Float(a), ScalarValue::Float(b)) => a == b,
            (ScalarValue::Int(a), ScalarValue::Float(b))
            | (ScalarValue::Float(b), ScalarValue::Int(a)) => (*a as f64) == *b,
            _ => false,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Str(s) => f.write_str(s),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Int(v) => write!(f, "{v}"),
            ScalarValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Str(s.to_string())
    }
}
