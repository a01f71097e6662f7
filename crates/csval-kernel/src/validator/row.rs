//! Per-cell value checks.
//!
//! Each bound column carries an ordered chain of [`RowCheck`]s, compiled
//! once at bind time. The type check is always the first link because it
//! coerces the working value every later link reads. All value checks
//! skip a null working value; `Nullable` is the only check that can fail
//! on null.

use std::ops::ControlFlow;

use csval_types::{ScalarValue, ValidationError};

use crate::error::SetupError;
use crate::schema::FieldSchema;
use crate::validator::types::TypeCheck;

/// A transient per-(row, column) value holder. Lives for the duration of
/// one cell's chain and is never shared across rows or columns.
#[derive(Debug)]
pub struct Cell<'a> {
    /// Working value: raw text until coerced, then the coerced scalar, or
    /// null after missing-value normalization.
    pub value: Option<ScalarValue>,
    /// 1-based data row number.
    pub row: u64,
    /// Bound column name.
    pub column: &'a str,
}

impl<'a> Cell<'a> {
    fn error(&self, message: String) -> ValidationError {
        ValidationError::cell(message, self.column, self.row)
    }

    fn value_text(&self) -> String {
        match &self.value {
            Some(v) => v.to_string(),
            None => "None".to_string(),
        }
    }
}

/// One link in a column's validator chain. Closed set; the contract
/// fixes the recognized constraint keywords.
#[derive(Debug, Clone)]
pub enum RowCheck {
    Type(TypeCheck),
    Enum(Vec<ScalarValue>),
    Maximum { limit: f64, exclusive: bool },
    Minimum { limit: f64, exclusive: bool },
    MaxLength(usize),
    MinLength(usize),
    MultipleOf(f64),
    Nullable,
}

/// Compile a field's chain: type first, then one link per declared
/// constraint.
pub fn compile_checks(field: &FieldSchema) -> Result<Vec<RowCheck>, SetupError> {
    let mut checks = vec![RowCheck::Type(TypeCheck::compile(field)?)];

    if let Some(members) = &field.enum_values {
        checks.push(RowCheck::Enum(members.clone()));
    }
    if let Some(limit) = field.maximum {
        checks.push(RowCheck::Maximum {
            limit,
            exclusive: field.exclusive_maximum,
        });
    }
    if let Some(limit) = field.minimum {
        checks.push(RowCheck::Minimum {
            limit,
            exclusive: field.exclusive_minimum,
        });
    }
    if let Some(limit) = field.max_length {
        checks.push(RowCheck::MaxLength(limit));
    }
    if let Some(limit) = field.min_length {
        checks.push(RowCheck::MinLength(limit));
    }
    if let Some(divisor) = field.multiple_of {
        checks.push(RowCheck::MultipleOf(divisor));
    }
    // nullable=true can never fail, so only a non-nullable field gets the
    // link at all.
    if !field.nullable {
        checks.push(RowCheck::Nullable);
    }

    Ok(checks)
}

impl RowCheck {
    /// Run one link over the cell, yielding at most one error.
    pub fn run(&self, cell: &mut Cell<'_>) -> Option<ValidationError> {
        match self {
            RowCheck::Type(check) => {
                if check.apply(&mut cell.value) {
                    None
                } else {
                    Some(cell.error(format!(
                        "Value {} does not satisfy the type or format",
                        cell.value_text()
                    )))
                }
            }
            RowCheck::Enum(members) => {
                let value = cell.value.as_ref()?;
                if members.contains(value) {
                    None
                } else {
                    let listed: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                    Some(cell.error(format!(
                        "Value {} is not in enum of [{}]",
                        value,
                        listed.join(", ")
                    )))
                }
            }
            RowCheck::Maximum { limit, exclusive } => {
                let value = cell.value.as_ref()?.as_f64()?;
                let (failed, compare) = if *exclusive {
                    (value >= *limit, "greater than or equal to")
                } else {
                    (value > *limit, "greater than")
                };
                failed.then(|| {
                    cell.error(format!(
                        "Value {} is {compare} maximum of {limit}",
                        cell.value_text()
                    ))
                })
            }
            RowCheck::Minimum { limit, exclusive } => {
                let value = cell.value.as_ref()?.as_f64()?;
                let (failed, compare) = if *exclusive {
                    (value <= *limit, "less than or equal to")
                } else {
                    (value < *limit, "less than")
                };
                failed.then(|| {
                    cell.error(format!(
                        "Value {} is {compare} minimum of {limit}",
                        cell.value_text()
                    ))
                })
            }
            RowCheck::MaxLength(limit) => {
                let len = cell.value.as_ref()?.char_len()?;
                (len > *limit).then(|| {
                    cell.error(format!(
                        "Value {} is longer than maxLength of {limit}",
                        cell.value_text()
                    ))
                })
            }
            RowCheck::MinLength(limit) => {
                let len = cell.value.as_ref()?.char_len()?;
                (len < *limit).then(|| {
                    cell.error(format!(
                        "Value {} is shorter than minLength of {limit}",
                        cell.value_text()
                    ))
                })
            }
            RowCheck::MultipleOf(divisor) => {
                let value = cell.value.as_ref()?.as_f64()?;
                (value % divisor != 0.0).then(|| {
                    cell.error(format!(
                        "Value {} is not multiple of {divisor}",
                        cell.value_text()
                    ))
                })
            }
            RowCheck::Nullable => cell
                .value
                .is_none()
                .then(|| cell.error("Illegal null value".to_string())),
        }
    }
}

/// Run every bound column of one row through its chain, in column-position
/// order. `emit` decides whether the first error stops evaluation.
pub fn check_row(
    columns: &[(usize, crate::binder::ColumnBinding)],
    missing_values: &std::collections::HashSet<String>,
    row: &[String],
    row_num: u64,
    emit: &mut dyn FnMut(ValidationError) -> ControlFlow<()>,
) -> ControlFlow<()> {
    for (position, binding) in columns {
        let raw = row.get(*position).map(String::as_str);
        binding.check_cell(raw, row_num, missing_values, emit)?;
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn field(doc: &str) -> FieldSchema {
        let schema = Schema::from_json_str(&format!(r#"{{"fields": [{doc}]}}"#))
            .expect("schema should normalize");
        (*schema.fields[0]).clone()
    }

    fn run_chain(doc: &str, value: Option<ScalarValue>) -> Vec<ValidationError> {
        let checks = compile_checks(&field(doc)).expect("should compile");
        let mut cell = Cell {
            value,
            row: 1,
            column: "c",
        };
        checks.iter().filter_map(|check| check.run(&mut cell)).collect()
    }

    fn raw(text: &str) -> Option<ScalarValue> {
        Some(ScalarValue::Str(text.to_string()))
    }

    #[test]
    fn chain_puts_type_check_first() {
        let doc = r#"{"name": "n", "type": "integer", "minimum": 3, "nullable": false}"#;
        let checks = compile_checks(&field(doc)).expect("should compile");
        assert!(matches!(checks[0], RowCheck::Type(_)));
        assert!(matches!(checks.last(), Some(RowCheck::Nullable)));
        assert_eq!(checks.len(), 3);
    }

    #[test]
    fn clean_cell_produces_no_errors() {
        let doc = r#"{"name": "n", "type": "integer", "minimum": 1, "maximum": 10}"#;
        assert!(run_chain(doc, raw("5")).is_empty());
    }

    #[test]
    fn inclusive_maximum_allows_equal() {
        let doc = r#"{"name": "n", "type": "number", "maximum": 5}"#;
        assert!(run_chain(doc, raw("5")).is_empty());
        let errors = run_chain(doc, raw("5.5"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Value 5.5 is greater than maximum of 5");
    }

    #[test]
    fn exclusive_maximum_rejects_equal() {
        let doc = r#"{"name": "n", "type": "number", "maximum": 5, "exclusiveMaximum": true}"#;
        let errors = run_chain(doc, raw("5"));
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Value 5 is greater than or equal to maximum of 5"
        );
    }

    #[test]
    fn minimum_variants() {
        let doc = r#"{"name": "n", "type": "integer", "minimum": 3}"#;
        assert!(run_chain(doc, raw("3")).is_empty());
        assert_eq!(
            run_chain(doc, raw("2"))[0].message,
            "Value 2 is less than minimum of 3"
        );

        let doc = r#"{"name": "n", "type": "integer", "minimum": 3, "exclusiveMinimum": true}"#;
        assert_eq!(
            run_chain(doc, raw("3"))[0].message,
            "Value 3 is less than or equal to minimum of 3"
        );
    }

    #[test]
    fn multiple_of_uses_coerced_value() {
        let doc = r#"{"name": "n", "type": "number", "multipleOf": 5}"#;
        assert!(run_chain(doc, raw("10")).is_empty());
        assert_eq!(
            run_chain(doc, raw("14"))[0].message,
            "Value 14 is not multiple of 5"
        );
    }

    #[test]
    fn enum_membership_is_loose_across_numeric_kinds() {
        let doc = r#"{"name": "n", "type": "number", "enum": [5, 10]}"#;
        // number type coerces to float; enum declares ints
        assert!(run_chain(doc, raw("5")).is_empty());
        let errors = run_chain(doc, raw("7"));
        assert_eq!(errors[0].message, "Value 7 is not in enum of [5, 10]");
    }

    #[test]
    fn length_checks_use_char_counts() {
        let doc = r#"{"name": "s", "minLength": 2, "maxLength": 4}"#;
        assert!(run_chain(doc, raw("héll")).is_empty());
        assert_eq!(
            run_chain(doc, raw("h"))[0].message,
            "Value h is shorter than minLength of 2"
        );
        assert_eq!(
            run_chain(doc, raw("hello"))[0].message,
            "Value hello is longer than maxLength of 4"
        );
    }

    #[test]
    fn length_checks_skip_non_string_values() {
        let doc = r#"{"name": "n", "type": "integer", "maxLength": 2}"#;
        assert!(run_chain(doc, raw("12345")).is_empty());
    }

    #[test]
    fn value_checks_skip_null_except_nullable() {
        let doc = r#"{"name": "n", "type": "integer", "minimum": 3, "enum": [5], "multipleOf": 2, "nullable": false}"#;
        let errors = run_chain(doc, None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Illegal null value");
    }

    #[test]
    fn nullable_field_accepts_null_silently() {
        let doc = r#"{"name": "n", "type": "integer", "minimum": 3}"#;
        assert!(run_chain(doc, None).is_empty());
    }

    #[test]
    fn type_failure_still_reports_downstream_predictably() {
        // "abc" fails integer coercion; bounds then skip because the
        // working value is still a string.
        let doc = r#"{"name": "n", "type": "integer", "minimum": 3}"#;
        let errors = run_chain(doc, raw("abc"));
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Value abc does not satisfy the type or format"
        );
    }
}
