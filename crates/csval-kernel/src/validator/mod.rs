//! The check suites.
//!
//! - [`types`]: type/format coercion, the first link of every chain
//! - [`row`]: per-cell value checks compiled into an ordered chain
//! - [`header`]: schema-wide structural checks run once per file
//!
//! Checks never write to the sink themselves; they push errors through a
//! short-circuiting `emit` callback so the `raise` policy can stop at the
//! first failure without buffering.

pub mod header;
pub mod row;
pub mod types;

pub use row::{check_row, Cell, RowCheck};
pub use types::TypeCheck;
