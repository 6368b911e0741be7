//! Declarative attribute permission model.
//!
//! Each user attribute is described by a declarative record: where its
//! value lives (local / remote / cached), whether it can be written, and
//! the minimum authentication level for each operation (check / get /
//! set). The table is loaded once at process start, validated, and is
//! immutable thereafter.
//!
//! This module answers "may this session perform this operation on this
//! attribute"; unknown-attribute and unwritable-attribute errors are
//! raised by the callers that own the request, via the batch `check_*`
//! helpers.

mod error;
mod schema;

pub use error::{AttributeError, SchemaError};
pub use schema::{AttributeDefinition, AttributeOperation, AttributeSchema, AttributeStorage};
