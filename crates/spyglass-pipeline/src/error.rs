//! Error types for the spyglass-pipeline crate.

use spyglass_model::ModelError;
use thiserror::Error;

/// Errors that can occur while post-processing query results.
///
/// Parse-time variants are configuration errors and fail the whole request;
/// evaluation-time variants abort only the formula that raised them. Numeric
/// anomalies (division by zero, NaN, infinities) are never errors: the
/// affected points are dropped instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A formula expression failed to parse.
    #[error("cannot parse expression {expression:?} at position {position}: {message}")]
    ExpressionParse {
        /// The offending expression.
        expression: String,
        /// Character offset of the error.
        position: usize,
        /// What the parser expected or found.
        message: String,
    },

    /// An expression called a function absent from the registry.
    #[error("unknown function {name:?} at position {position}")]
    UnknownFunction {
        /// The function name as written.
        name: String,
        /// Character offset of the call.
        position: usize,
    },

    /// A variable had no value in the evaluation environment.
    #[error("no value for variable {name:?}")]
    UnknownVariable {
        /// The variable name.
        name: String,
    },

    /// The request model itself failed validation.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
