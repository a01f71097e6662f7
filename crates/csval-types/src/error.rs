//! The data-level validation error record.

use std::fmt;

/// A single data-level validation failure.
///
/// Every failure — header cardinality, missing required field, type
/// mismatch, bound violation — shares this one shape. Callers needing
/// finer handling match on the message; the taxonomy is deliberately
/// flat.
///
/// Errors are self-describing: they embed their row and column, so a
/// consumer receiving them out of order (concurrent execution) loses no
/// information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    /// Column name, when the failure is tied to one column.
    pub column: Option<String>,
    /// 1-based data row number; `None` for header-phase failures.
    pub row: Option<u64>,
}

impl ValidationError {
    /// A header-phase error not tied to any single column.
    pub fn header(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            column: None,
            row: None,
        }
    }

    /// A header-phase error for one column.
    pub fn column(message: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            column: Some(column.into()),
            row: None,
        }
    }

    /// A row-phase error for one cell.
    pub fn cell(message: impl Into<String>, column: impl Into<String>, row: u64) -> Self {
        Self {
            message: message.into(),
            column: Some(column.into()),
            row: Some(row),
        }
    }
}

/// Serialized as one line: `<message>; column: <column-or-empty>; row:
/// <row-or-empty>`. This is the wire form sinks write.
impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}; column: {}; row: ",
            self.message,
            self.column.as_deref().unwrap_or(""),
        )?;
        match self.row {
            Some(row) => write!(f, "{row}"),
            None => Ok(()),
        }
    }
}

impl std::error::Error for ValidationError {}
