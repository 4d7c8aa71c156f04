//! Error types for the spyglass-model crate.

use thiserror::Error;

/// Errors that can occur while constructing or validating query model objects.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The metric name is invalid (empty or contains invalid characters).
    #[error("invalid metric name: {reason}")]
    InvalidMetricName {
        /// The reason the name is invalid.
        reason: String,
    },

    /// The time range is invalid (start > end).
    #[error("invalid time range: start={start}, end={end}")]
    InvalidTimeRange {
        /// Start timestamp in milliseconds.
        start: i64,
        /// End timestamp in milliseconds.
        end: i64,
    },

    /// The step interval is not positive.
    #[error("invalid step interval for query {query_name}: {step}")]
    InvalidStepInterval {
        /// The query carrying the bad step.
        query_name: String,
        /// The rejected step interval in seconds.
        step: i64,
    },

    /// A formula references a variable that is not a sibling query name.
    #[error("formula {formula} references unknown query {variable}")]
    UnknownFormulaVariable {
        /// The formula query name.
        formula: String,
        /// The variable with no matching sibling query.
        variable: String,
    },

    /// The composite query contains no queries.
    #[error("composite query has no queries")]
    EmptyCompositeQuery,
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
