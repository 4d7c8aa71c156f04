//! Zero-filling of missing step buckets.
//!
//! Dashboards draw one point per step boundary; a bucket the store returned
//! no row for must render as zero rather than as a hole. The filler
//! reindexes every series onto the fixed step grid: starting at the request
//! start rounded down to a boundary, it walks to the request end in step
//! increments, taking the existing value where one exists and zero where
//! none does. Off-grid points do not survive the reindexing. Filling an
//! already-complete series returns the same series.

use std::collections::{BTreeMap, HashMap};

use spyglass_model::{expression_variables, BuilderQuery, Point, QueryResult};
use tracing::debug;

const DEFAULT_STEP_SECONDS: i64 = 60;

/// Reindexes every series of `result` onto the step grid spanning
/// `[start, end]` (epoch milliseconds), zero-filling missing buckets.
///
/// A formula inherits the least common multiple of the step intervals of
/// the queries its expression references, so its grid is the coarsest one
/// on which every referenced query has a bucket. A missing or non-positive
/// step falls back to sixty seconds.
pub fn fill_gaps(
    result: &mut QueryResult,
    queries: &BTreeMap<String, BuilderQuery>,
    start: i64,
    end: i64,
) {
    let step_ms = effective_step_seconds(result, queries) * 1000;
    let aligned_start = start - start.rem_euclid(step_ms);
    debug!(
        query_name = %result.query_name,
        step_ms,
        aligned_start,
        end,
        "filling gaps"
    );

    for series in &mut result.series {
        let existing: HashMap<i64, f64> = series
            .points
            .iter()
            .map(|p| (p.timestamp, p.value))
            .collect();
        let buckets = (end - aligned_start) / step_ms + 1;
        let mut filled = Vec::with_capacity(buckets.max(0) as usize);
        let mut timestamp = aligned_start;
        while timestamp <= end {
            let value = existing.get(&timestamp).copied().unwrap_or(0.0);
            filled.push(Point::new(timestamp, value));
            timestamp += step_ms;
        }
        series.points = filled;
    }
}

fn effective_step_seconds(
    result: &QueryResult,
    queries: &BTreeMap<String, BuilderQuery>,
) -> i64 {
    let step = queries.get(&result.query_name).map_or(0, |query| {
        if query.is_formula() {
            expression_variables(&query.expression)
                .iter()
                .filter_map(|name| queries.get(name))
                .map(|q| q.step_interval)
                .filter(|step| *step > 0)
                .fold(0, lcm)
        } else {
            query.step_interval
        }
    });
    if step > 0 {
        step
    } else {
        DEFAULT_STEP_SECONDS
    }
}

fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 {
        return b;
    }
    a / gcd(a, b) * b
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}
