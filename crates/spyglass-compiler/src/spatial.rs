//! The spatial aggregation outer query.
//!
//! Wraps the temporal sub-query, drops nan per-series values (counter
//! resets and protected first buckets), and reduces across series sharing
//! the requested group-by labels. A `GROUPING SETS` construct produces both
//! the per-timestamp groups and the rolled-up per-label aggregate in one
//! pass; the rolled-up row carries a zero timestamp and is what the
//! reduce-to wrapper filters on.

use spyglass_model::{
    AttributeKey, BuilderQuery, Having, HavingOperator, OrderBy, SortOrder, SpaceAggregation,
    TimeRange,
};

use crate::error::Result;
use crate::format;
use crate::temporal::temporal_aggregation_query;

/// Builds the full time-series query for one builder query.
///
/// # Errors
///
/// Propagates filter and temporal compilation errors.
pub fn metric_query(query: &BuilderQuery, range: TimeRange) -> Result<String> {
    let temporal_sub_query = temporal_aggregation_query(query, range)?;

    let select_labels = select_columns(&query.group_by);
    let group_by = grouping_sets(&query.group_by);
    let order_by = order_by_clause(&query.order_by, &query.group_by);
    let having = having_clause(&query.having);

    let op = match query.space_aggregation {
        SpaceAggregation::Avg => "avg(per_series_value)",
        SpaceAggregation::Sum => "sum(per_series_value)",
        SpaceAggregation::Min => "min(per_series_value)",
        SpaceAggregation::Max => "max(per_series_value)",
        SpaceAggregation::Count => "count(per_series_value)",
    };

    Ok(format!(
        "SELECT {select_labels}, {op} as value FROM ({temporal_sub_query}) \
         WHERE isNaN(per_series_value) = 0 \
         GROUP BY {group_by}{having} \
         ORDER BY {order_by}"
    ))
}

/// The select list: each group-by tag, then the bucket timestamp.
fn select_columns(tags: &[AttributeKey]) -> String {
    let mut columns: Vec<&str> = tags.iter().map(|tag| tag.key.as_str()).collect();
    columns.push("ts");
    columns.join(", ")
}

/// One set with `ts` for the per-bucket groups, one without for the
/// rolled-up aggregate.
fn grouping_sets(tags: &[AttributeKey]) -> String {
    let keys: Vec<&str> = tags.iter().map(|tag| tag.key.as_str()).collect();
    let mut with_ts = keys.clone();
    with_ts.push("ts");
    format!(
        "GROUPING SETS ( ({}), ({}) )",
        with_ts.join(", "),
        keys.join(", ")
    )
}

/// Requested order for each group-by tag, ASC when unspecified, and always
/// `ts ASC` last to break ties by timestamp.
fn order_by_clause(items: &[OrderBy], tags: &[AttributeKey]) -> String {
    let mut order_by: Vec<String> = Vec::with_capacity(tags.len() + 1);
    for tag in tags {
        let requested = items.iter().find(|item| item.column_name == tag.key);
        match requested {
            Some(item) => {
                let direction = match item.order {
                    SortOrder::Asc => "asc",
                    SortOrder::Desc => "desc",
                };
                order_by.push(format!("{} {direction}", item.column_name));
            }
            None => order_by.push(format!("{} ASC", tag.key)),
        }
    }
    order_by.push("ts ASC".to_string());
    order_by.join(", ")
}

/// Renders the AND-joined having predicates, empty when there are none.
fn having_clause(items: &[Having]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = items
        .iter()
        .map(|item| {
            format!(
                "value {} {}",
                having_operator(item.op),
                format::having_value(&item.value)
            )
        })
        .collect();
    format!(" HAVING {}", rendered.join(" AND "))
}

const fn having_operator(op: HavingOperator) -> &'static str {
    match op {
        HavingOperator::Equal => "=",
        HavingOperator::NotEqual => "!=",
        HavingOperator::GreaterThan => ">",
        HavingOperator::GreaterThanOrEq => ">=",
        HavingOperator::LessThan => "<",
        HavingOperator::LessThanOrEq => "<=",
        HavingOperator::In => "IN",
        HavingOperator::NotIn => "NOT IN",
    }
}
