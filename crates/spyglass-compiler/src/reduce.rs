//! The reduce-to scalar wrapper.
//!
//! Table and value panels need one scalar per group rather than a time
//! series. The wrapper collapses a compiled time-series query with a
//! conditional aggregate guarded on `toUnixTimestamp(ts) != 0`, which
//! excludes the rolled-up `GROUPING SETS` row: that row carries the zero
//! timestamp and would otherwise double-count every bucket.

use spyglass_model::ReduceTo;

/// Wraps a compiled time-series query into a single-scalar query.
#[must_use]
pub fn reduce_query(query: &str, reduce_to: ReduceTo) -> String {
    let op = match reduce_to {
        ReduceTo::Last => "anyLastIf",
        ReduceTo::Sum => "sumIf",
        ReduceTo::Avg => "avgIf",
        ReduceTo::Max => "maxIf",
        ReduceTo::Min => "minIf",
    };
    format!(
        "SELECT *, timestamp AS ts FROM (\
         SELECT {op}(value, toUnixTimestamp(ts) != 0) as value, \
         anyIf(ts, toUnixTimestamp(ts) != 0) AS timestamp \
         FROM ({query}))"
    )
}
