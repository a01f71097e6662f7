//! csval-kernel: the schema resolution and validation pipeline.
//!
//! This crate provides:
//!
//! - **schema**: the raw (serde) schema document and its normalized,
//!   immutable form
//! - **binder**: resolution of declared fields, pattern fields, and
//!   `$ref` references against an actual header
//! - **validator**: type coercion plus the header and row check suites
//! - **checker**: the orchestrator — error policy (raise/collect) and
//!   execution strategy (sequential or chunked-concurrent)
//! - **source / sink**: collaborator traits for row input and error output
//!
//! The pipeline: normalize the schema once → read the header → bind
//! columns → run the header suite → validate rows. Schema and bindings
//! are read-only after the header phase, which is what makes concurrent
//! row validation safe without locks.

pub mod binder;
pub mod checker;
pub mod error;
pub mod schema;
pub mod sink;
pub mod source;
pub mod validator;

pub use binder::{ColumnBinding, ColumnBindings};
pub use checker::{CheckOutcome, Checker, CheckerConfig, ErrorPolicy, ExecutionMode};
pub use csval_types::{FieldType, ScalarValue, ValidationError};
pub use error::{CheckError, SetupError, SourceError};
pub use schema::{FieldSchema, Schema};
pub use sink::{ErrorSink, FileSink, MemorySink, StdoutSink};
pub use source::{MemorySource, RowSource};
