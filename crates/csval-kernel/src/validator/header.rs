//! Schema-wide header checks.
//!
//! Run once per file, between binding and row validation, in a fixed
//! order — later steps depend on bindings mutated by earlier ones:
//!
//! `additional_fields` → `dependencies` → `exact_fields` → `max_fields`
//! → `min_fields` → `pattern_fields` → `resolve_refs` → `field_required`
//!
//! `field_required` always runs last and unconditionally. Structural
//! errors are data-level (policy-governed); an unresolvable `$ref` is a
//! fatal [`SetupError`] instead.

use std::collections::HashSet;
use std::ops::ControlFlow;

use csval_types::ValidationError;

use crate::binder::ColumnBindings;
use crate::error::SetupError;
use crate::schema::Schema;

type Emit<'a> = dyn FnMut(ValidationError) -> ControlFlow<()> + 'a;

/// Stop the suite as soon as the emit callback breaks (raise policy).
macro_rules! try_flow {
    ($flow:expr) => {
        if $flow.is_break() {
            return Ok(ControlFlow::Break(()));
        }
    };
}

/// Run the full suite. `Ok(Break)` means the emit callback stopped the
/// run (raise policy); fatal resolution failures surface as `Err`.
pub fn run_suite(
    header: &[String],
    schema: &Schema,
    bindings: &mut ColumnBindings,
    emit: &mut Emit<'_>,
) -> Result<ControlFlow<()>, SetupError> {
    try_flow!(additional_fields(header, schema, emit));
    try_flow!(dependencies(header, schema, emit));
    try_flow!(exact_fields(header, schema, bindings, emit)?);
    try_flow!(max_fields(header, schema, emit));
    try_flow!(min_fields(header, schema, emit));
    pattern_fields(header, schema, bindings)?;
    bindings.resolve_refs(schema)?;
    try_flow!(field_required(schema, bindings, emit));
    Ok(ControlFlow::Continue(()))
}

/// Every header column that is neither declared by name nor matchable by
/// any pattern is an error, unless `additionalFields` allows unknowns.
fn additional_fields(
    header: &[String],
    schema: &Schema,
    emit: &mut Emit<'_>,
) -> ControlFlow<()> {
    if schema.additional_fields {
        return ControlFlow::Continue(());
    }

    let declared: HashSet<&str> = schema
        .fields
        .iter()
        .filter_map(|f| f.name.as_deref())
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    for column in header {
        if declared.contains(column.as_str()) || !seen.insert(column.as_str()) {
            continue;
        }
        let matchable = schema
            .pattern_fields
            .iter()
            .any(|pattern| pattern.regex.is_match(column));
        if !matchable {
            emit(ValidationError::header(format!("Field {column} is not defined")))?;
        }
    }
    ControlFlow::Continue(())
}

/// If a trigger field is present, every declared dependent must be too.
fn dependencies(header: &[String], schema: &Schema, emit: &mut Emit<'_>) -> ControlFlow<()> {
    for (trigger, dependents) in &schema.dependencies {
        if !header.iter().any(|c| c == trigger) {
            continue;
        }
        for dependent in dependents {
            if !header.iter().any(|c| c == dependent) {
                emit(ValidationError::header(format!(
                    "Field {trigger} is provided while {dependent} is not in header"
                )))?;
            }
        }
    }
    ControlFlow::Continue(())
}

/// Under `exactFields`, a name-sequence mismatch is an error, but binding
/// still proceeds positionally either way — the check flags, it does not
/// abort.
fn exact_fields(
    header: &[String],
    schema: &Schema,
    bindings: &mut ColumnBindings,
    emit: &mut Emit<'_>,
) -> Result<ControlFlow<()>, SetupError> {
    if !schema.exact_fields {
        return Ok(ControlFlow::Continue(()));
    }

    let declared: Vec<&str> = schema
        .fields
        .iter()
        .map(|f| f.name.as_deref().unwrap_or_default())
        .collect();
    let actual: Vec<&str> = header.iter().map(String::as_str).collect();

    let mut flow = ControlFlow::Continue(());
    if declared != actual {
        flow = emit(ValidationError::header(
            "Column name is different to fields.name in schema".to_string(),
        ));
    }

    bindings.rebind_positional(header, schema)?;
    Ok(flow)
}

fn max_fields(header: &[String], schema: &Schema, emit: &mut Emit<'_>) -> ControlFlow<()> {
    if let Some(limit) = schema.max_fields {
        if header.len() > limit {
            emit(ValidationError::header(format!(
                "Number of column(s) is greater than maxFields of {limit}"
            )))?;
        }
    }
    ControlFlow::Continue(())
}

fn min_fields(header: &[String], schema: &Schema, emit: &mut Emit<'_>) -> ControlFlow<()> {
    if let Some(limit) = schema.min_fields {
        if header.len() < limit {
            emit(ValidationError::header(format!(
                "Number of column(s) is less than minFields of {limit}"
            )))?;
        }
    }
    ControlFlow::Continue(())
}

/// Fill remaining unbound positions from pattern fields. Not applicable
/// under `exactFields` (positional binding has already claimed every
/// position).
fn pattern_fields(
    header: &[String],
    schema: &Schema,
    bindings: &mut ColumnBindings,
) -> Result<(), SetupError> {
    if schema.exact_fields || schema.pattern_fields.is_empty() {
        return Ok(());
    }
    bindings.apply_patterns(header, schema)
}

/// A required field absent from the header is an error. Runs last and
/// unconditionally; iterates declared order so output is deterministic.
fn field_required(
    schema: &Schema,
    bindings: &ColumnBindings,
    emit: &mut Emit<'_>,
) -> ControlFlow<()> {
    let mut reported: HashSet<&str> = HashSet::new();
    for field in &schema.fields {
        let Some(name) = field.name.as_deref() else {
            continue;
        };
        let Some(binding) = bindings.unfound.get(name) else {
            continue;
        };
        // required may come from a spliced definition, so read the
        // binding, not the declared field.
        if binding.field.required && reported.insert(name) {
            emit(ValidationError::column(
                format!("{name} is a required field"),
                name,
            ))?;
        }
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn schema(doc: &str) -> Schema {
        Schema::from_json_str(doc).expect("schema should normalize")
    }

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn collect_suite(doc: &str, names: &[&str]) -> (Vec<ValidationError>, ColumnBindings) {
        let schema = schema(doc);
        let head = header(names);
        let mut bindings = ColumnBindings::bind(&head, &schema).expect("should bind");
        let mut errors = Vec::new();
        let flow = run_suite(&head, &schema, &mut bindings, &mut |e| {
            errors.push(e);
            ControlFlow::Continue(())
        })
        .expect("suite should run");
        assert!(flow.is_continue());
        (errors, bindings)
    }

    #[test]
    fn clean_header_produces_no_errors() {
        let (errors, _) = collect_suite(
            r#"{"fields": [{"name": "id", "type": "integer"}]}"#,
            &["id", "extra"],
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn additional_fields_false_flags_unknown_columns() {
        let (errors, _) = collect_suite(
            r#"{"fields": [{"name": "id"}], "additionalFields": false}"#,
            &["id", "mystery"],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Field mystery is not defined");
    }

    #[test]
    fn additional_fields_false_accepts_pattern_matchable_columns() {
        let (errors, _) = collect_suite(
            r#"{
                "fields": [{"name": "id"}],
                "patternFields": {"meta_": {}},
                "additionalFields": false
            }"#,
            &["id", "meta_source"],
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn dependency_violation_names_the_missing_dependent() {
        let (errors, _) = collect_suite(
            r#"{"fields": [{"name": "a"}], "dependencies": {"a": ["b", "c"]}}"#,
            &["a", "c"],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Field a is provided while b is not in header");
    }

    #[test]
    fn dependency_with_absent_trigger_is_ignored() {
        let (errors, _) = collect_suite(
            r#"{"fields": [], "dependencies": {"a": ["b"]}}"#,
            &["x"],
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn exact_fields_mismatch_is_one_error_and_binding_proceeds() {
        let (errors, bindings) = collect_suite(
            r#"{"fields": [{"name": "b", "type": "integer"}, {"name": "a"}], "exactFields": true}"#,
            &["a", "b"],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Column name is different to fields.name in schema");
        assert_eq!(bindings.columns[&0].field.name.as_deref(), Some("b"));
        assert_eq!(bindings.columns[&1].field.name.as_deref(), Some("a"));
    }

    #[test]
    fn exact_fields_suppresses_required_accounting() {
        let (errors, _) = collect_suite(
            r#"{
                "fields": [{"name": "a", "required": true}],
                "exactFields": true
            }"#,
            &["a"],
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn field_count_bounds() {
        let (errors, _) = collect_suite(
            r#"{"fields": [], "minFields": 2, "maxFields": 3}"#,
            &["only"],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Number of column(s) is less than minFields of 2");

        let (errors, _) = collect_suite(
            r#"{"fields": [], "minFields": 2, "maxFields": 3}"#,
            &["a", "b", "c", "d"],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Number of column(s) is greater than maxFields of 3");
    }

    #[test]
    fn required_field_missing_from_header() {
        let (errors, _) = collect_suite(
            r#"{"fields": [{"name": "id", "required": true}, {"name": "opt"}]}"#,
            &["other"],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "id is a required field");
        assert_eq!(errors[0].column.as_deref(), Some("id"));
    }

    #[test]
    fn required_via_ref_definition() {
        let (errors, _) = collect_suite(
            r#"{
                "fields": [{"name": "key", "$ref": "ident"}],
                "definitions": {"ident": {"required": true}}
            }"#,
            &["other"],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "key is a required field");
    }

    #[test]
    fn pattern_binding_satisfies_required_accounting() {
        let (errors, bindings) = collect_suite(
            r#"{
                "fields": [{"name": "meta_1", "required": true}],
                "patternFields": {"meta_": {"type": "integer"}}
            }"#,
            &["meta_1"],
        );
        assert!(errors.is_empty());
        assert!(bindings.columns.contains_key(&0));
    }

    #[test]
    fn raise_emit_short_circuits_the_suite() {
        let schema = schema(
            r#"{
                "fields": [{"name": "id", "required": true}],
                "additionalFields": false,
                "minFields": 5
            }"#,
        );
        let head = header(&["unknown"]);
        let mut bindings = ColumnBindings::bind(&head, &schema).expect("should bind");
        let mut first = None;
        let flow = run_suite(&head, &schema, &mut bindings, &mut |e| {
            first = Some(e);
            ControlFlow::Break(())
        })
        .expect("suite should run");
        assert!(flow.is_break());
        // additional_fields runs first, so its error wins.
        assert_eq!(
            first.expect("one error").message,
            "Field unknown is not defined"
        );
    }

    #[test]
    fn undefined_ref_aborts_the_suite() {
        let schema = schema(r#"{"fields": [{"name": "a", "$ref": "ghost"}]}"#);
        let head = header(&["a"]);
        let mut bindings = ColumnBindings::bind(&head, &schema).expect("should bind");
        let err = run_suite(&head, &schema, &mut bindings, &mut |_| {
            ControlFlow::Continue(())
        })
        .expect_err("should fail");
        assert!(matches!(err, SetupError::UndefinedReference(_)));
    }
}
