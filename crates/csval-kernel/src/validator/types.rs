//! Type and format coercion.
//!
//! A [`TypeCheck`] is compiled once per field at bind time (regexes and
//! token sets resolved up front) and applied to every cell in the bound
//! column. On success it replaces the cell's working value with the
//! coerced scalar; every downstream check reads that coerced form. A null
//! working value passes through untouched — nullability is a separate
//! check.

use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csval_types::{FieldType, ScalarValue};
use regex::Regex;
use uuid::Uuid;

use crate::error::SetupError;
use crate::schema::{FieldSchema, StringFormat, DEFAULT_DATETIME_PATTERN};

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$";
const HOSTNAME_PATTERN: &str = r"^(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])\.)*([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-]*[A-Za-z0-9])$";

/// A compiled type/format check for one field. Closed over the four
/// declared types; dispatch is a single match.
#[derive(Debug, Clone)]
pub enum TypeCheck {
    String(StringCheck),
    Number { group_char: String },
    Integer { group_char: String },
    Boolean {
        true_values: HashSet<String>,
        false_values: HashSet<String>,
    },
}

/// The string-type sub-dispatch: `format` overrides plain pattern
/// matching.
#[derive(Debug, Clone)]
pub enum StringCheck {
    /// No format; optional regex from `pattern`.
    Plain(Option<Regex>),
    Email(Regex),
    Uri,
    Uuid,
    Ipv4,
    Ipv6,
    Hostname(Regex),
    /// chrono format string from `pattern` (default `%Y-%m-%d`).
    Datetime(String),
}

impl TypeCheck {
    /// Compile the check for a field. Regex failures are fatal setup
    /// errors — the schema itself is malformed.
    pub fn compile(field: &FieldSchema) -> Result<Self, SetupError> {
        match field.field_type {
            FieldType::String => {
                let check = match field.format {
                    None => {
                        let pattern = match &field.pattern {
                            Some(source) => Some(Regex::new(&format!("^(?:{source})"))?),
                            None => None,
                        };
                        StringCheck::Plain(pattern)
                    }
                    Some(StringFormat::Email) => StringCheck::Email(compiled(EMAIL_PATTERN)?),
                    Some(StringFormat::Uri) => StringCheck::Uri,
                    Some(StringFormat::Uuid) => StringCheck::Uuid,
                    Some(StringFormat::Ipv4) => StringCheck::Ipv4,
                    Some(StringFormat::Ipv6) => StringCheck::Ipv6,
                    Some(StringFormat::Hostname) => {
                        StringCheck::Hostname(compiled(HOSTNAME_PATTERN)?)
                    }
                    Some(StringFormat::Datetime) => StringCheck::Datetime(
                        field
                            .pattern
                            .clone()
                            .unwrap_or_else(|| DEFAULT_DATETIME_PATTERN.to_string()),
                    ),
                };
                Ok(TypeCheck::String(check))
            }
            FieldType::Number => Ok(TypeCheck::Number {
                group_char: field.group_char.clone(),
            }),
            FieldType::Integer => Ok(TypeCheck::Integer {
                group_char: field.group_char.clone(),
            }),
            FieldType::Boolean => Ok(TypeCheck::Boolean {
                true_values: field.true_values.clone(),
                false_values: field.false_values.clone(),
            }),
        }
    }

    /// Validate and coerce the working value in place.
    ///
    /// Returns `false` on a type/format failure. The working value is
    /// still left in its best-effort state (coerced where a parse
    /// succeeded, raw text otherwise) so downstream checks behave
    /// predictably either way.
    pub fn apply(&self, value: &mut Option<ScalarValue>) -> bool {
        let Some(ScalarValue::Str(text)) = value.as_ref() else {
            // Null passes through; an already-coerced value cannot occur
            // because the type check is always the first link.
            return true;
        };
        let text = text.clone();

        match self {
            TypeCheck::String(check) => check.matches(&text),
            TypeCheck::Number { group_char } => match strip_group(&text, group_char).parse::<f64>()
            {
                Ok(parsed) => {
                    *value = Some(ScalarValue::Float(parsed));
                    true
                }
                Err(_) => false,
            },
            TypeCheck::Integer { group_char } => {
                match strip_group(&text, group_char).parse::<i64>() {
                    Ok(parsed) => {
                        *value = Some(ScalarValue::Int(parsed));
                        true
                    }
                    Err(_) => false,
                }
            }
            TypeCheck::Boolean {
                true_values,
                false_values,
            } => {
                if true_values.contains(&text) {
                    *value = Some(ScalarValue::Bool(true));
                    true
                } else if false_values.contains(&text) {
                    *value = Some(ScalarValue::Bool(false));
                    true
                } else {
                    false
                }
            }
        }
    }
}

impl StringCheck {
    fn matches(&self, text: &str) -> bool {
        match self {
            StringCheck::Plain(pattern) => pattern.as_ref().is_none_or(|re| re.is_match(text)),
            StringCheck::Email(re) | StringCheck::Hostname(re) => re.is_match(text),
            StringCheck::Uri => url::Url::parse(text).is_ok(),
            StringCheck::Uuid => Uuid::parse_str(text)
                .map(|u| u.get_version_num() == 4)
                .unwrap_or(false),
            StringCheck::Ipv4 => text.parse::<Ipv4Addr>().is_ok(),
            StringCheck::Ipv6 => text.parse::<Ipv6Addr>().is_ok(),
            StringCheck::Datetime(format) => parse_datetime(text, format),
        }
    }
}

fn strip_group(text: &str, group_char: &str) -> String {
    if group_char.is_empty() {
        text.to_string()
    } else {
        text.replace(group_char, "")
    }
}

/// Accept date-and-time, date-only, and time-only format strings.
fn parse_datetime(text: &str, format: &str) -> bool {
    NaiveDateTime::parse_from_str(text, format).is_ok()
        || NaiveDate::parse_from_str(text, format).is_ok()
        || NaiveTime::parse_from_str(text, format).is_ok()
}

fn compiled(pattern: &str) -> Result<Regex, SetupError> {
    Ok(Regex::new(pattern)?)
}
