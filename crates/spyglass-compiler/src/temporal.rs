//! The temporal aggregation sub-query.
//!
//! Buckets every matching series into `step`-wide windows anchored at epoch
//! and reduces each window per series. Rate and increase build on a
//! `max(value)` window reduction (the counter's end-of-window value, which
//! survives mid-window resets) and compute the delta between consecutive
//! windows of the same fingerprint with counter-reset and large-gap
//! suppression.

use spyglass_model::{BuilderQuery, TimeAggregation, TimeRange};

use crate::error::Result;
use crate::filter::time_series_filter_query;
use crate::format;
use crate::{METRICS_DB, SAMPLES_TABLE};

/// The windowed rate expression.
///
/// A negative delta means the counter reset and the true rate is
/// unknowable, so the window renders nan. A gap of 24h or more between
/// windows also renders nan, which protects the very first bucket: its lag
/// defaults are value 0 and epoch 0, and epoch 0 is always more than 24h in
/// the past.
const RATE_WITHOUT_NEGATIVE: &str = "If((per_series_value - lagInFrame(per_series_value, 1, 0) OVER rate_window) < 0, nan, If((ts - lagInFrame(ts, 1, toDate('1970-01-01')) OVER rate_window) >= 86400, nan, (per_series_value - lagInFrame(per_series_value, 1, 0) OVER rate_window) / (ts - lagInFrame(ts, 1, toDate('1970-01-01')) OVER rate_window)))";

/// The windowed increase expression: the rate expression without the
/// division by elapsed seconds.
const INCREASE_WITHOUT_NEGATIVE: &str = "If((per_series_value - lagInFrame(per_series_value, 1, 0) OVER rate_window) < 0, nan, If((ts - lagInFrame(ts, 1, toDate('1970-01-01')) OVER rate_window) >= 86400, nan, (per_series_value - lagInFrame(per_series_value, 1, 0) OVER rate_window)))";

/// Builds the per-series temporal aggregation sub-query.
///
/// # Errors
///
/// Propagates filter compilation errors.
pub fn temporal_aggregation_query(query: &BuilderQuery, range: TimeRange) -> Result<String> {
    let filter_sub_query = time_series_filter_query(query)?;

    let mut any_labels = String::new();
    let mut labels = String::new();
    for tag in &query.group_by {
        any_labels.push_str(&format!("any({key}) as {key}, ", key = tag.key));
        labels.push_str(&format!("{}, ", tag.key));
    }

    let bucketed = |op: &str| bucket_query(query, range, &any_labels, op, &filter_sub_query);

    let sql = match query.time_aggregation {
        TimeAggregation::Avg => bucketed("avg(value)"),
        TimeAggregation::Sum => bucketed("sum(value)"),
        TimeAggregation::Min => bucketed("min(value)"),
        TimeAggregation::Max => bucketed("max(value)"),
        TimeAggregation::Count => bucketed("count(value)"),
        TimeAggregation::CountDistinct => bucketed("count(distinct(value))"),
        TimeAggregation::AnyLast => bucketed("anyLast(value)"),
        TimeAggregation::Rate => windowed(&labels, RATE_WITHOUT_NEGATIVE, &bucketed("max(value)")),
        TimeAggregation::Increase => {
            windowed(&labels, INCREASE_WITHOUT_NEGATIVE, &bucketed("max(value)"))
        }
    };

    Ok(sql)
}

fn bucket_query(
    query: &BuilderQuery,
    range: TimeRange,
    any_labels: &str,
    op: &str,
    filter_sub_query: &str,
) -> String {
    let metric = format::quote(&query.aggregate_attribute.key);
    format!(
        "SELECT fingerprint, {any_labels}\
         toStartOfInterval(toDateTime(intDiv(unix_milli, 1000)), INTERVAL {step} SECOND) as ts, \
         {op} as per_series_value \
         FROM {METRICS_DB}.{SAMPLES_TABLE} \
         INNER JOIN ({filter_sub_query}) as filtered_time_series USING fingerprint \
         WHERE metric_name = {metric} AND unix_milli >= {start} AND unix_milli <= {end} \
         GROUP BY fingerprint, ts \
         ORDER BY fingerprint, ts",
        step = query.step_interval,
        start = range.start,
        end = range.end,
    )
}

fn windowed(labels: &str, delta_expression: &str, inner: &str) -> String {
    format!(
        "SELECT {labels}ts, {delta_expression} as per_series_value FROM ({inner}) \
         WINDOW rate_window as (PARTITION BY fingerprint ORDER BY fingerprint, ts)"
    )
}
