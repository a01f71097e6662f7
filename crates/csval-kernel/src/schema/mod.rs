//! Schema model.
//!
//! Two stages: [`RawSchema`] is the serde mirror of the document as
//! written; [`Schema`] is the normalized, immutable form the rest of the
//! kernel consumes. Normalization happens exactly once, before any row is
//! read, and never mutates the caller's document:
//!
//! - list keywords (`missingValues`, `trueValues`, `falseValues`) become
//!   sets; `enum` becomes a deduplicated scalar list
//! - defaults are applied (`type=string`, `nullable=true`, ...)
//! - `patternFields` regexes are compiled, in declaration order
//! - `$ref` exclusivity is enforced

mod raw;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use csval_types::{FieldType, ScalarValue};
use regex::Regex;
use serde_json::Value;

pub use raw::{RawField, RawSchema};

use crate::error::SetupError;

/// Tokens that normalize to null when no `missingValues` is declared.
pub const DEFAULT_MISSING_VALUES: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "-"];

/// Default `pattern` for the `datetime` format.
pub const DEFAULT_DATETIME_PATTERN: &str = "%Y-%m-%d";

/// String formats a field may declare. Closed set; anything else is a
/// setup failure (the upstream shape checker should have caught it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Email,
    Uri,
    Uuid,
    Ipv4,
    Ipv6,
    Hostname,
    Datetime,
}

impl StringFormat {
    fn parse(name: &str) -> Result<Self, SetupError> {
        match name {
            "email" => Ok(StringFormat::Email),
            "uri" => Ok(StringFormat::Uri),
            "uuid" => Ok(StringFormat::Uuid),
            "ipv4" => Ok(StringFormat::Ipv4),
            "ipv6" => Ok(StringFormat::Ipv6),
            "hostname" => Ok(StringFormat::Hostname),
            "datetime" => Ok(StringFormat::Datetime),
            other => Err(SetupError::Schema(format!("unknown format `{other}`"))),
        }
    }
}

/// One field's normalized contract. Read-only after normalization.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Declared name. Always present for entries under `fields`; optional
    /// for definitions and pattern fields.
    pub name: Option<String>,
    pub field_type: FieldType,
    pub format: Option<StringFormat>,
    /// Regex source (plain strings) or chrono format string (`datetime`).
    pub pattern: Option<String>,
    pub required: bool,
    pub nullable: bool,
    /// Allowed coerced values. Membership is a linear scan with loose
    /// numeric equality; enum sets are small.
    pub enum_values: Option<Vec<ScalarValue>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub multiple_of: Option<f64>,
    pub true_values: HashSet<String>,
    pub false_values: HashSet<String>,
    /// Digit-grouping separator stripped before numeric parse.
    pub group_char: String,
    /// Unresolved reference to a definition, resolved at bind time.
    pub reference: Option<String>,
}

/// A compiled pattern field: regex plus the contract it binds.
#[derive(Debug, Clone)]
pub struct PatternField {
    /// Pattern as written, kept for binding diagnostics.
    pub source: String,
    pub regex: Regex,
    pub field: Arc<FieldSchema>,
}

/// The normalized root contract.
///
/// Built once, read-only for the remainder of the run — this is the
/// invariant that makes concurrent row validation safe without locks.
#[derive(Debug)]
pub struct Schema {
    /// Declared fields, in schema order. Names may repeat.
    pub fields: Vec<Arc<FieldSchema>>,
    pub definitions: HashMap<String, Arc<FieldSchema>>,
    /// Compiled pattern fields, in declaration order (first match wins).
    pub pattern_fields: Vec<PatternField>,
    /// Trigger field -> fields that must co-occur. BTreeMap keeps error
    /// output deterministic.
    pub dependencies: BTreeMap<String, Vec<String>>,
    pub missing_values: HashSet<String>,
    pub additional_fields: bool,
    pub exact_fields: bool,
    pub min_fields: Option<usize>,
    pub max_fields: Option<usize>,
}

impl Schema {
    /// Parse and normalize a schema document from JSON text.
    pub fn from_json_str(doc: &str) -> Result<Self, SetupError> {
        let raw: RawSchema =
            serde_json::from_str(doc).map_err(|e| SetupError::Schema(e.to_string()))?;
        Self::normalize(raw)
    }

    /// Normalize an already-deserialized document.
    pub fn from_value(doc: Value) -> Result<Self, SetupError> {
        let raw: RawSchema =
            serde_json::from_value(doc).map_err(|e| SetupError::Schema(e.to_string()))?;
        Self::normalize(raw)
    }

    /// Produce the immutable normalized schema. The raw document is
    /// consumed; the caller's own copy is never touched.
    pub fn normalize(raw: RawSchema) -> Result<Self, SetupError> {
        let mut fields = Vec::with_capacity(raw.fields.len());
        for field in raw.fields {
            if field.name.is_none() {
                return Err(SetupError::Schema(
                    "every entry under `fields` must declare a name".into(),
                ));
            }
            fields.push(Arc::new(normalize_field(field)?));
        }

        let mut definitions = HashMap::with_capacity(raw.definitions.len());
        for (name, field) in raw.definitions {
            definitions.insert(name, Arc::new(normalize_field(field)?));
        }

        let mut pattern_fields = Vec::with_capacity(raw.pattern_fields.len());
        for (source, field) in raw.pattern_fields {
            // Anchor at the start: pattern fields match like `re.match`,
            // not a substring search.
            let regex = Regex::new(&format!("^(?:{source})"))?;
            pattern_fields.push(PatternField {
                source,
                regex,
                field: Arc::new(normalize_field(field)?),
            });
        }

        let missing_values = match raw.missing_values {
            Some(tokens) => tokens.into_iter().collect(),
            None => DEFAULT_MISSING_VALUES.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Schema {
            fields,
            definitions,
            pattern_fields,
            dependencies: raw.dependencies.into_iter().collect(),
            missing_values,
            additional_fields: raw.additional_fields.unwrap_or(true),
            exact_fields: raw.exact_fields.unwrap_or(false),
            min_fields: raw.min_fields,
            max_fields: raw.max_fields,
        })
    }
}

fn normalize_field(raw: RawField) -> Result<FieldSchema, SetupError> {
    if raw.reference.is_some() && raw.has_direct_constraints() {
        let name = raw.name.as_deref().unwrap_or("<anonymous>");
        return Err(SetupError::Schema(format!(
            "field `{name}` declares both $ref and direct constraints"
        )));
    }

    let format = match &raw.format {
        Some(name) => Some(StringFormat::parse(name)?),
        None => None,
    };

    let enum_values = match raw.enum_values {
        Some(values) => {
            let mut scalars: Vec<ScalarValue> = Vec::with_capacity(values.len());
            for value in values {
                let scalar = json_scalar(&value).ok_or_else(|| {
                    SetupError::Schema(format!("enum member {value} is not a scalar"))
                })?;
                if !scalars.contains(&scalar) {
                    scalars.push(scalar);
                }
            }
            Some(scalars)
        }
        None => None,
    };

    Ok(FieldSchema {
        name: raw.name,
        field_type: raw.field_type.unwrap_or_default(),
        format,
        pattern: raw.pattern,
        required: raw.required.unwrap_or(false),
        nullable: raw.nullable.unwrap_or(true),
        enum_values,
        minimum: raw.minimum,
        maximum: raw.maximum,
        exclusive_minimum: raw.exclusive_minimum.unwrap_or(false),
        exclusive_maximum: raw.exclusive_maximum.unwrap_or(false),
        min_length: raw.min_length,
        max_length: raw.max_length,
        multiple_of: raw.multiple_of,
        true_values: raw
            .true_values
            .map(|v| v.into_iter().collect())
            .unwrap_or_else(|| HashSet::from(["true".to_string()])),
        false_values: raw
            .false_values
            .map(|v| v.into_iter().collect())
            .unwrap_or_else(|| HashSet::from(["false".to_string()])),
        group_char: raw.group_char.unwrap_or_default(),
        reference: raw.reference,
    })
}

/// Convert a JSON scalar into the coerced-value domain. Integral floats
/// become `Int` so `5` and `5.0` land on one representation.
fn json_scalar(value: &Value) -> Option<ScalarValue> {
    match value {
        Value::String(s) => Some(ScalarValue::Str(s.clone())),
        Value::Bool(b) => Some(ScalarValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(ScalarValue::Int(i))
            } else {
                n.as_f64().map(ScalarValue::Float)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize_doc(doc: &str) -> Result<Schema, SetupError> {
        Schema::from_json_str(doc)
    }

    #[test]
    fn defaults_are_applied() {
        let schema = normalize_doc(r#"{"fields": [{"name": "id"}]}"#).expect("should normalize");
        let field = &schema.fields[0];
        assert_eq!(field.field_type, FieldType::String);
        assert!(field.nullable);
        assert!(!field.required);
        assert!(schema.additional_fields);
        assert!(!schema.exact_fields);
        assert!(schema.missing_values.contains(""));
        assert!(schema.missing_values.contains("NA"));
    }

    #[test]
    fn boolean_token_defaults_are_case_sensitive() {
        let schema =
            normalize_doc(r#"{"fields": [{"name": "flag", "type": "boolean"}]}"#).expect("ok");
        let field = &schema.fields[0];
        assert!(field.true_values.contains("true"));
        assert!(!field.true_values.contains("True"));
    }

    #[test]
    fn enum_members_are_deduplicated_across_int_and_float() {
        let schema =
            normalize_doc(r#"{"fields": [{"name": "n", "enum": [5, 5.0, "5"]}]}"#).expect("ok");
        let members = schema.fields[0].enum_values.as_ref().expect("enum");
        // 5 and 5.0 collapse; "5" stays distinct.
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn ref_with_direct_constraints_is_rejected() {
        let err = normalize_doc(r#"{"fields": [{"name": "id", "type": "integer", "$ref": "x"}]}"#)
            .expect_err("should fail");
        assert!(matches!(err, SetupError::Schema(_)));
    }

    #[test]
    fn bad_pattern_field_regex_is_fatal() {
        let err = normalize_doc(r#"{"fields": [], "patternFields": {"[": {}}}"#)
            .expect_err("should fail");
        assert!(matches!(err, SetupError::Pattern(_)));
    }

    #[test]
    fn unknown_format_is_fatal() {
        let err = normalize_doc(r#"{"fields": [{"name": "u", "format": "telephone"}]}"#)
            .expect_err("should fail");
        assert!(matches!(err, SetupError::Schema(_)));
    }

    #[test]
    fn nameless_declared_field_is_fatal() {
        let err = normalize_doc(r#"{"fields": [{"type": "integer"}]}"#).expect_err("should fail");
        assert!(matches!(err, SetupError::Schema(_)));
    }

    #[test]
    fn declared_missing_values_replace_defaults() {
        let schema = normalize_doc(r#"{"fields": [], "missingValues": ["~"]}"#).expect("ok");
        assert!(schema.missing_values.contains("~"));
        assert!(!schema.missing_values.contains("NA"));
    }
}
