//! The Checker — drives the pipeline end to end.
//!
//! A run moves through fixed phases: schema normalized (once, up front) →
//! header read and bound → header suite → rows. Fatal setup failures
//! abort before any row is read, regardless of error policy. Data-level
//! errors are routed by policy: `raise` surfaces the first one and stops,
//! `collect` writes every one to the sink and completes the run.
//!
//! Two execution strategies satisfy the same contract: sequential
//! (row-at-a-time, lazily short-circuiting) and chunked-concurrent (rows
//! grouped into fixed-size chunks, one task per row, outputs unordered
//! within a chunk).

use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use csval_types::ValidationError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::binder::{ColumnBinding, ColumnBindings};
use crate::error::{CheckError, SetupError, SourceError};
use crate::schema::Schema;
use crate::sink::ErrorSink;
use crate::source::RowSource;
use crate::validator::header::run_suite;
use crate::validator::row::check_row;

/// What to do with data-level errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Surface the first error and stop all further evaluation.
    Raise,
    /// Write every error to the sink; the run always completes.
    #[default]
    Collect,
}

impl FromStr for ErrorPolicy {
    type Err = SetupError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "raise" => Ok(ErrorPolicy::Raise),
            "collect" => Ok(ErrorPolicy::Collect),
            other => Err(SetupError::Config(format!("unknown error policy `{other}`"))),
        }
    }
}

/// How rows are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Strictly one row at a time.
    #[default]
    Sequential,
    /// Rows grouped into fixed-size chunks; rows within a chunk validate
    /// concurrently and may complete in any order.
    Chunked { chunk_size: NonZeroUsize },
}

impl ExecutionMode {
    /// Chunked mode from a plain integer; zero is a configuration error.
    pub fn chunked(chunk_size: usize) -> Result<Self, SetupError> {
        NonZeroUsize::new(chunk_size)
            .map(|chunk_size| ExecutionMode::Chunked { chunk_size })
            .ok_or_else(|| SetupError::Config("chunk size must be positive".into()))
    }
}

/// Construction-time configuration, fixed for the lifetime of a checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckerConfig {
    pub policy: ErrorPolicy,
    pub mode: ExecutionMode,
}

/// Summary of a completed run (collect policy; a raised error returns
/// `Err` instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Data rows processed.
    pub rows: u64,
    /// Validation errors written to the sink.
    pub errors: u64,
}

/// Validates a row source against one normalized schema.
#[derive(Debug)]
pub struct Checker {
    schema: Arc<Schema>,
    config: CheckerConfig,
}

impl Checker {
    pub fn new(schema: Schema, config: CheckerConfig) -> Self {
        Self {
            schema: Arc::new(schema),
            config,
        }
    }

    /// Parse, normalize, and wrap a schema document in one step.
    pub fn from_json_str(doc: &str, config: CheckerConfig) -> Result<Self, SetupError> {
        Ok(Self::new(Schema::from_json_str(doc)?, config))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Run the full pipeline over `source`, routing errors to `sink`
    /// under the configured policy.
    pub async fn validate<S, K>(&self, source: &mut S, sink: &mut K) -> Result<CheckOutcome, CheckError>
    where
        S: RowSource,
        K: ErrorSink,
    {
        let header = source
            .next_row()
            .await?
            .ok_or_else(|| SourceError::new(anyhow!("input has no header row")))?;

        let mut bindings = ColumnBindings::bind(&header, &self.schema)?;

        // Header phase.
        let mut error_count = 0u64;
        match self.config.policy {
            ErrorPolicy::Raise => {
                let mut first = None;
                let flow = run_suite(&header, &self.schema, &mut bindings, &mut |error| {
                    first = Some(error);
                    ControlFlow::Break(())
                })?;
                if let Some(error) = first {
                    debug!(%error, "header check failed, raising");
                    return Err(CheckError::Invalid(error));
                }
                debug_assert!(flow.is_continue());
            }
            ErrorPolicy::Collect => {
                let mut errors = Vec::new();
                let _ = run_suite(&header, &self.schema, &mut bindings, &mut |error| {
                    errors.push(error);
                    ControlFlow::Continue(())
                })?;
                for error in &errors {
                    sink.write(error).await?;
                }
                error_count += errors.len() as u64;
            }
        }

        // Bindings are frozen from here on; rows only read them.
        let columns = Arc::new(bindings.into_columns());
        debug!(columns = columns.len(), "row phase starting");

        let outcome = match self.config.mode {
            ExecutionMode::Sequential => {
                self.run_sequential(source, sink, &columns, error_count).await?
            }
            ExecutionMode::Chunked { chunk_size } => {
                self.run_chunked(source, sink, Arc::clone(&columns), chunk_size, error_count)
                    .await?
            }
        };

        sink.finish().await?;
        debug!(rows = outcome.rows, errors = outcome.errors, "run complete");
        Ok(outcome)
    }

    async fn run_sequential<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        columns: &[(usize, ColumnBinding)],
        mut error_count: u64,
    ) -> Result<CheckOutcome, CheckError>
    where
        S: RowSource,
        K: ErrorSink,
    {
        let mut rows = 0u64;
        while let Some(row) = source.next_row().await? {
            rows += 1;
            match self.config.policy {
                ErrorPolicy::Raise => {
                    let mut first = None;
                    let _ = check_row(columns, &self.schema.missing_values, &row, rows, &mut |e| {
                        first = Some(e);
                        ControlFlow::Break(())
                    });
                    if let Some(error) = first {
                        return Err(CheckError::Invalid(error));
                    }
                }
                ErrorPolicy::Collect => {
                    let mut errors = Vec::new();
                    let _ = check_row(columns, &self.schema.missing_values, &row, rows, &mut |e| {
                        errors.push(e);
                        ControlFlow::Continue(())
                    });
                    for error in &errors {
                        sink.write(error).await?;
                    }
                    error_count += errors.len() as u64;
                }
            }
        }
        Ok(CheckOutcome {
            rows,
            errors: error_count,
        })
    }

    async fn run_chunked<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        columns: Arc<Vec<(usize, ColumnBinding)>>,
        chunk_size: NonZeroUsize,
        mut error_count: u64,
    ) -> Result<CheckOutcome, CheckError>
    where
        S: RowSource,
        K: ErrorSink,
    {
        let raise = self.config.policy == ErrorPolicy::Raise;
        let token = CancellationToken::new();
        let mut rows = 0u64;

        loop {
            // Read the next chunk. Chunk k+1 is only dispatched after
            // chunk k has fully drained below.
            let mut chunk = Vec::with_capacity(chunk_size.get());
            while chunk.len() < chunk_size.get() {
                match source.next_row().await? {
                    Some(row) => chunk.push(row),
                    None => break,
                }
            }
            if chunk.is_empty() {
                break;
            }

            let mut tasks: JoinSet<(u64, Vec<ValidationError>)> = JoinSet::new();
            for (offset, row) in chunk.into_iter().enumerate() {
                let row_num = rows + offset as u64 + 1;
                let schema = Arc::clone(&self.schema);
                let columns = Arc::clone(&columns);
                let token = token.clone();
                tasks.spawn(async move {
                    let mut errors = Vec::new();
                    for (position, binding) in columns.iter() {
                        // Cooperative cancellation: once a sibling has
                        // raised, stop doing work.
                        if raise && token.is_cancelled() {
                            break;
                        }
                        let raw = row.get(*position).map(String::as_str);
                        let flow = binding.check_cell(
                            raw,
                            row_num,
                            &schema.missing_values,
                            &mut |error| {
                                errors.push(error);
                                if raise {
                                    token.cancel();
                                    ControlFlow::Break(())
                                } else {
                                    ControlFlow::Continue(())
                                }
                            },
                        );
                        if flow.is_break() {
                            break;
                        }
                    }
                    (row_num, errors)
                });
            }

            let mut chunk_rows = 0u64;
            let mut raised: Option<(u64, ValidationError)> = None;
            while let Some(joined) = tasks.join_next().await {
                let (row_num, errors) = joined?;
                chunk_rows += 1;
                if raise {
                    if let Some(error) = errors.into_iter().next() {
                        // Completion order is arbitrary; keep the error
                        // from the earliest row for stable behavior.
                        match &raised {
                            Some((earliest, _)) if *earliest <= row_num => {}
                            _ => raised = Some((row_num, error)),
                        }
                    }
                } else {
                    for error in &errors {
                        sink.write(error).await?;
                    }
                    error_count += errors.len() as u64;
                }
            }
            rows += chunk_rows;

            if let Some((_, error)) = raised {
                // No further chunk is dispatched.
                return Err(CheckError::Invalid(error));
            }
        }

        Ok(CheckOutcome {
            rows,
            errors: error_count,
        })
    }
}
