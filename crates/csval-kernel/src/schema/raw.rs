//! Serde mirror of a schema document.
//!
//! The meta-schema shape check happens upstream of this crate; these types
//! only carry the keywords through to normalization. Nothing here is
//! consumed directly by the pipeline — see [`super::Schema::normalize`].

use std::collections::HashMap;

use csval_types::FieldType;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Root schema document, as written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSchema {
    #[serde(default)]
    pub fields: Vec<RawField>,
    #[serde(default)]
    pub definitions: HashMap<String, RawField>,
    /// Declaration order is meaningful (first match wins), so this is
    /// deserialized as an ordered list of (pattern, field) pairs rather
    /// than a map.
    #[serde(default, deserialize_with = "ordered_pairs")]
    pub pattern_fields: Vec<(String, RawField)>,
    #[serde(default)]
    pub dependencies: HashMap<String, Vec<String>>,
    pub missing_values: Option<Vec<String>>,
    pub additional_fields: Option<bool>,
    pub exact_fields: Option<bool>,
    pub min_fields: Option<usize>,
    pub max_fields: Option<usize>,
}

/// One field's contract, as written.
///
/// `name` is required on entries under `fields` (normalization enforces
/// it) but optional for definitions and pattern fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawField {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub required: Option<bool>,
    pub nullable: Option<bool>,
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<bool>,
    pub exclusive_maximum: Option<bool>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub multiple_of: Option<f64>,
    pub true_values: Option<Vec<String>>,
    pub false_values: Option<Vec<String>>,
    pub group_char: Option<String>,
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
}

impl RawField {
    /// Whether any constraint other than `$ref` is declared. `$ref` is
    /// mutually exclusive with direct constraints.
    pub fn has_direct_constraints(&self) -> bool {
        self.field_type.is_some()
            || self.format.is_some()
            || self.pattern.is_some()
            || self.required.is_some()
            || self.nullable.is_some()
            || self.enum_values.is_some()
            || self.minimum.is_some()
            || self.maximum.is_some()
            || self.exclusive_minimum.is_some()
            || self.exclusive_maximum.is_some()
            || self.min_length.is_some()
            || self.max_length.is_some()
            || self.multiple_of.is_some()
            || self.true_values.is_some()
            || self.false_values.is_some()
            || self.group_char.is_some()
    }
}

/// Deserialize a JSON object into pairs, preserving document order.
fn ordered_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, RawField)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PairVisitor;

    impl<'de> Visitor<'de> for PairVisitor {
        type Value = Vec<(String, RawField)>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a map of regex pattern to field schema")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::new();
            while let Some(entry) = map.next_entry::<String, RawField>()? {
                pairs.push(entry);
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_fields_keep_declaration_order() {
        let doc = r#"{
            "fields": [],
            "patternFields": {
                "^z": {"type": "integer"},
                "^a": {"type": "string"},
                "^m": {"type": "number"}
            }
        }"#;
        let raw: RawSchema = serde_json::from_str(doc).expect("should parse");
        let patterns: Vec<&str> = raw.pattern_fields.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(patterns, ["^z", "^a", "^m"]);
    }

    #[test]
    fn ref_is_parsed_from_dollar_key() {
        let doc = r#"{"fields": [{"name": "id", "$ref": "ident"}]}"#;
        let raw: RawSchema = serde_json::from_str(doc).expect("should parse");
        assert_eq!(raw.fields[0].reference.as_deref(), Some("ident"));
        assert!(!raw.fields[0].has_direct_constraints());
    }
}
