//! Shared types for csval.
//!
//! This crate holds the vocabulary the rest of the workspace speaks:
//!
//! - [`ScalarValue`]: a coerced cell value (string, number, integer, bool)
//! - [`FieldType`]: the closed set of types a field schema can declare
//! - [`ValidationError`]: the one shape every data-level failure takes
//!
//! It deliberately has no dependency on the kernel so embedders can match
//! on errors and values without pulling in the validation machinery.

pub mod error;
pub mod value;

pub use error::ValidationError;
pub use value::{FieldType, ScalarValue};
