//! Error types for the spyglass-compiler crate.

use spyglass_model::{DataSource, ModelError};
use thiserror::Error;

/// Errors that can occur while compiling a builder query to SQL.
///
/// All variants are configuration errors: they are surfaced to the caller
/// before any SQL is executed, never silently ignored.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The query draws from a signal this compiler does not handle.
    #[error("query {query_name} has unsupported data source {data_source:?}")]
    UnsupportedDataSource {
        /// The offending query.
        query_name: String,
        /// The data source the query asked for.
        data_source: DataSource,
    },

    /// A membership filter was given a scalar where a list is required.
    #[error("filter on {key} requires a list value for operator {operator}")]
    FilterValueNotAList {
        /// The label key the filter applies to.
        key: String,
        /// The membership operator.
        operator: String,
    },

    /// The query model itself failed validation.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, CompileError>;
