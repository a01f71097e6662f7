//! Kernel error types.
//!
//! Two taxonomies live side by side: fatal setup failures ([`SetupError`]),
//! which abort a run before any data row is read regardless of error
//! policy, and data-level [`ValidationError`]s, which the orchestrator
//! routes according to the configured policy. The latter type lives in
//! `csval-types`; this module defines everything fatal.

use csval_types::ValidationError;
use thiserror::Error;

/// Fatal setup failure — the schema or configuration itself is unusable.
///
/// These are never written to the error sink and never downgraded by the
/// `collect` policy: a malformed schema means no verdict about the data
/// can be trusted.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The schema document could not be parsed or normalized.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// A `$ref` names a definition that does not exist.
    #[error("$ref references undefined definition `{0}`")]
    UndefinedReference(String),

    /// A construction-time configuration value is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A field or pattern-field regex failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Failure raised by the external row reader.
///
/// Dialect decoding belongs to the collaborator, so this just wraps
/// whatever it reports.
#[derive(Debug, Error)]
#[error("row source: {0}")]
pub struct SourceError(#[from] pub anyhow::Error);

impl SourceError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(err.into())
    }
}

/// Anything `Checker::validate` can fail with.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// The first validation failure, surfaced under the `raise` policy.
    #[error("{0}")]
    Invalid(ValidationError),

    /// The error sink could not be written.
    #[error("error sink: {0}")]
    Sink(#[from] std::io::Error),

    /// A concurrent row-validation task failed to complete.
    #[error("row task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
