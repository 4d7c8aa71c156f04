//! ClickHouse query compilation for the Spyglass metrics engine.
//!
//! `spyglass-compiler` turns a declarative [`BuilderQuery`] into the SQL the
//! backing store executes. The compiled query is three layers deep:
//!
//! 1. a **filter sub-query** selecting the fingerprints of series matching
//!    the metric name, temporality, and label filters
//! 2. a **temporal sub-query** bucketing each series into step-wide windows,
//!    with counter-reset aware rate/increase windowing
//! 3. a **spatial outer query** reducing across series per group-by label
//!    set via `GROUPING SETS`, with deterministic ordering
//!
//! The compiler only produces the query string; execution belongs to the
//! store client.
//!
//! # Example
//!
//! ```rust
//! use spyglass_compiler::compile;
//! use spyglass_model::{BuilderQuery, PanelType, TimeAggregation, TimeRange};
//!
//! let query = BuilderQuery::new("A", "http_requests_total")
//!     .time_aggregation(TimeAggregation::Rate)
//!     .group_by("service");
//! let range = TimeRange::new(1_700_000_000_000, 1_700_003_600_000).unwrap();
//! let sql = compile(&query, range, PanelType::Graph).unwrap();
//! assert!(sql.contains("GROUPING SETS"));
//! ```

#![doc(html_root_url = "https://docs.rs/spyglass-compiler/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod filter;
pub mod format;
pub mod reduce;
pub mod spatial;
pub mod temporal;

use spyglass_model::{BuilderQuery, DataSource, PanelType, ReduceTo, TimeRange};
use tracing::debug;

// Re-export main entry points at crate root
pub use error::{CompileError, Result};
pub use filter::time_series_filter_query;
pub use reduce::reduce_query;
pub use spatial::metric_query;
pub use temporal::temporal_aggregation_query;

/// The database holding metric tables.
pub const METRICS_DB: &str = "spyglass_metrics";
/// The series-metadata table the filter sub-query reads.
pub const TIME_SERIES_TABLE: &str = "time_series_v4";
/// The samples table the temporal sub-query reads.
pub const SAMPLES_TABLE: &str = "samples_v4";

/// Compiles one builder query for the given window and panel type.
///
/// Graph and list panels get the plain time-series query; table and value
/// panels wrap it in the reduce-to scalar query (defaulting to `last` when
/// the query does not specify a reduction).
///
/// # Errors
///
/// Returns a configuration error for non-metrics data sources, invalid
/// steps, or malformed filters.
pub fn compile(query: &BuilderQuery, range: TimeRange, panel_type: PanelType) -> Result<String> {
    if query.data_source != DataSource::Metrics {
        return Err(CompileError::UnsupportedDataSource {
            query_name: query.query_name.clone(),
            data_source: query.data_source,
        });
    }
    query.validate()?;

    let sql = spatial::metric_query(query, range)?;
    let sql = match panel_type {
        PanelType::Table | PanelType::Value => {
            reduce::reduce_query(&sql, query.reduce_to.unwrap_or(ReduceTo::Last))
        }
        PanelType::Graph | PanelType::List => sql,
    };

    debug!(
        query_name = %query.query_name,
        metric = %query.aggregate_attribute.key,
        sql_len = sql.len(),
        "compiled metric query"
    );

    Ok(sql)
}
