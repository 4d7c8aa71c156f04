//! Having-clause filtering of query results.
//!
//! Each predicate list is an AND: a point survives only when every
//! predicate accepts its value. A series left without points is removed
//! from the result. Filtering rebuilds the point and series vectors rather
//! than removing in place.

use spyglass_model::{Having, QueryResult};
use tracing::debug;

/// Drops points failing any predicate, then drops emptied series.
///
/// A result with no predicates is left untouched.
pub fn apply_having(result: &mut QueryResult, having: &[Having]) {
    if having.is_empty() {
        return;
    }

    let before: usize = result.series.iter().map(|s| s.points.len()).sum();
    for series in &mut result.series {
        series
            .points
            .retain(|point| having.iter().all(|h| h.matches(point.value)));
    }
    result.series.retain(|series| !series.points.is_empty());
    let after: usize = result.series.iter().map(|s| s.points.len()).sum();

    debug!(
        query_name = %result.query_name,
        predicates = having.len(),
        dropped = before - after,
        "applied having filter"
    );
}
