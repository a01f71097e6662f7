//! Column binding: resolving a schema's declared fields, pattern fields,
//! and `$ref` references against the actual header.
//!
//! Bindings are built in a fixed order (name-based, then — via the header
//! suite — positional rebinding under `exactFields`, pattern filling, and
//! reference resolution), mutated only during the header phase, and
//! read-only thereafter. Row validation reads them concurrently without
//! locks on the strength of that freeze.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;

use csval_types::ValidationError;
use tracing::debug;

use crate::error::SetupError;
use crate::schema::{FieldSchema, Schema};
use crate::validator::row::{compile_checks, Cell, RowCheck};

/// One column's resolved contract: the originating field schema and its
/// compiled validator chain.
///
/// The chain is behind an `Arc` so reference resolution can splice one
/// compiled chain into many bindings; chains hold no runtime state, so
/// sharing is safe.
#[derive(Debug, Clone)]
pub struct ColumnBinding {
    /// Concrete column name: the header name for bound columns, the
    /// declared field name for unfound ones.
    pub column: String,
    pub field: Arc<FieldSchema>,
    pub checks: Arc<Vec<RowCheck>>,
    /// Pattern source that bound this column, for pattern-bound columns.
    pub pattern: Option<String>,
    /// `$ref` target awaiting resolution.
    pending_ref: Option<String>,
}

impl ColumnBinding {
    fn for_field(column: String, field: Arc<FieldSchema>) -> Result<Self, SetupError> {
        match field.reference.clone() {
            Some(target) => Ok(Self {
                column,
                field,
                checks: Arc::new(Vec::new()),
                pattern: None,
                pending_ref: Some(target),
            }),
            None => {
                let checks = Arc::new(compile_checks(&field)?);
                Ok(Self {
                    column,
                    field,
                    checks,
                    pattern: None,
                    pending_ref: None,
                })
            }
        }
    }

    /// Run one cell through missing-value normalization and this column's
    /// chain.
    pub fn check_cell(
        &self,
        raw: Option<&str>,
        row: u64,
        missing_values: &HashSet<String>,
        emit: &mut dyn FnMut(ValidationError) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        // Missing-value normalization runs before everything else; a raw
        // token that maps to null must fail (at most) the nullable check,
        // never type coercion. A cell absent from a short row is null too.
        let value = match raw {
            None => None,
            Some(text) if missing_values.contains(text) => None,
            Some(text) => Some(csval_types::ScalarValue::Str(text.to_string())),
        };

        let mut cell = Cell {
            value,
            row,
            column: &self.column,
        };
        for check in self.checks.iter() {
            if let Some(error) = check.run(&mut cell) {
                emit(error)?;
            }
        }
        ControlFlow::Continue(())
    }
}

/// The binding table: columns present in the header, plus declared fields
/// the header does not contain (kept for required-field accounting).
#[derive(Debug, Default)]
pub struct ColumnBindings {
    pub columns: HashMap<usize, ColumnBinding>,
    pub unfound: HashMap<String, ColumnBinding>,
}

impl ColumnBindings {
    /// Name-based binding of declared fields (resolution steps 1–2).
    ///
    /// Every header position sharing a declared field's name gets that
    /// field's binding; declared fields absent from the header are filed
    /// under `unfound`.
    pub fn bind(header: &[String], schema: &Schema) -> Result<Self, SetupError> {
        let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
        for (position, name) in header.iter().enumerate() {
            positions.entry(name.as_str()).or_default().push(position);
        }

        let mut bindings = Self::default();
        for field in &schema.fields {
            let name = field.name.clone().unwrap_or_default();
            match positions.get(name.as_str()) {
                Some(found) => {
                    for &position in found {
                        bindings
                            .columns
                            .insert(position, ColumnBinding::for_field(name.clone(), Arc::clone(field))?);
                    }
                }
                None => {
                    bindings
                        .unfound
                        .insert(name.clone(), ColumnBinding::for_field(name, Arc::clone(field))?);
                }
            }
        }

        debug!(
            bound = bindings.columns.len(),
            unfound = bindings.unfound.len(),
            "header bound"
        );
        Ok(bindings)
    }

    /// Discard name-based bindings and rebind strictly positionally:
    /// header position *i* gets declared field *i* (resolution step 3,
    /// `exactFields`).
    pub fn rebind_positional(&mut self, header: &[String], schema: &Schema) -> Result<(), SetupError> {
        self.columns.clear();
        self.unfound.clear();
        for (position, (column, field)) in header.iter().zip(&schema.fields).enumerate() {
            self.columns.insert(
                position,
                ColumnBinding::for_field(column.clone(), Arc::clone(field))?,
            );
        }
        Ok(())
    }

    /// Bind remaining unbound positions against the pattern fields, in
    /// declaration order, first match wins (resolution step 4). A matched
    /// name is no longer "unfound".
    pub fn apply_patterns(&mut self, header: &[String], schema: &Schema) -> Result<(), SetupError> {
        // Compile each pattern field's chain once, not once per matched
        // column.
        let mut compiled: Vec<Option<Arc<Vec<RowCheck>>>> = Vec::new();
        for pattern in &schema.pattern_fields {
            compiled.push(match pattern.field.reference {
                Some(_) => None,
                None => Some(Arc::new(compile_checks(&pattern.field)?)),
            });
        }

        for (position, column) in header.iter().enumerate() {
            if self.columns.contains_key(&position) {
                continue;
            }
            for (pattern, checks) in schema.pattern_fields.iter().zip(&compiled) {
                if !pattern.regex.is_match(column) {
                    continue;
                }
                let binding = match checks {
                    Some(checks) => ColumnBinding {
                        column: column.clone(),
                        field: Arc::clone(&pattern.field),
                        checks: Arc::clone(checks),
                        pattern: Some(pattern.source.clone()),
                        pending_ref: None,
                    },
                    None => {
                        let mut binding =
                            ColumnBinding::for_field(column.clone(), Arc::clone(&pattern.field))?;
                        binding.pattern = Some(pattern.source.clone());
                        binding
                    }
                };
                self.columns.insert(position, binding);
                self.unfound.remove(column);
                break;
            }
        }
        Ok(())
    }

    /// Splice each pending `$ref` with its definition's compiled chain
    /// (resolution step 5). An undefined target aborts the run: the
    /// schema itself is malformed.
    pub fn resolve_refs(&mut self, schema: &Schema) -> Result<(), SetupError> {
        let mut resolved: HashMap<&str, (Arc<FieldSchema>, Arc<Vec<RowCheck>>)> = HashMap::new();

        let bindings = self
            .columns
            .values_mut()
            .chain(self.unfound.values_mut())
            .filter(|b| b.pending_ref.is_some());

        for binding in bindings {
            let target = binding.pending_ref.take().unwrap_or_default();
            if !resolved.contains_key(target.as_str()) {
                let Some((name, field)) = schema.definitions.get_key_value(target.as_str()) else {
                    return Err(SetupError::UndefinedReference(target));
                };
                let checks = Arc::new(compile_checks(field)?);
                resolved.insert(name.as_str(), (Arc::clone(field), checks));
            }
            // contains_key above guarantees presence
            if let Some((field, checks)) = resolved.get(target.as_str()) {
                binding.field = Arc::clone(field);
                binding.checks = Arc::clone(checks);
            }
        }
        Ok(())
    }

    /// Freeze into the row-phase view: column bindings sorted by
    /// position. Called once, after the header suite has finished
    /// mutating the table.
    pub fn into_columns(self) -> Vec<(usize, ColumnBinding)> {
        let mut columns: Vec<(usize, ColumnBinding)> = self.columns.into_iter().collect();
        columns.sort_by_key(|(position, _)| *position);
        columns
    }
}
