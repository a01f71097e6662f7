//! Row input.
//!
//! The kernel consumes rows through [`RowSource`]; dialect concerns
//! (delimiter, quoting, line framing) belong to whatever implements it.
//! The first yielded row is the header.

use async_trait::async_trait;

use crate::error::SourceError;

/// Supplies one header row followed by data rows, already split into
/// string fields.
#[async_trait]
pub trait RowSource: Send {
    /// The next row, or `None` at end of input.
    async fn next_row(&mut self) -> Result<Option<Vec<String>>, SourceError>;
}

/// A source over rows already in memory — for tests and embedders that
/// have parsed their input upstream.
#[derive(Debug)]
pub struct MemorySource {
    rows: std::vec::IntoIter<Vec<String>>,
}

impl MemorySource {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// Convenience constructor from borrowed rows.
    pub fn from_rows(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }
}

#[async_trait]
impl RowSource for MemorySource {
    async fn next_row(&mut self) -> Result<Option<Vec<String>>, SourceError> {
        Ok(self.rows.next())
    }
}
