//! The time-series filter sub-query.
//!
//! Series metadata lives in a separate table from samples; this module
//! compiles a query's label filters into the `filtered_time_series`
//! sub-query that selects the matching fingerprints (plus any group-by
//! labels, extracted from the JSON label blob).

use spyglass_model::{BuilderQuery, FilterItem, FilterOperator, FilterValue, Temporality};

use crate::error::{CompileError, Result};
use crate::format;
use crate::{METRICS_DB, TIME_SERIES_TABLE};

/// Builds the sub-query selecting fingerprints of series matching the
/// query's metric name, temporality, and label filters.
///
/// # Errors
///
/// Returns `CompileError::FilterValueNotAList` when a membership operator
/// is paired with a scalar value.
pub fn time_series_filter_query(query: &BuilderQuery) -> Result<String> {
    let metric = format::quote(&query.aggregate_attribute.key);
    let mut conditions = vec![temporality_condition(&metric, query.temporality)];

    for item in &query.filters {
        if let Some(condition) = filter_condition(item)? {
            conditions.push(condition);
        }
    }

    let mut select_labels = String::new();
    for tag in &query.group_by {
        select_labels.push_str(&format!(
            " JSONExtractString(labels, '{key}') as {key},",
            key = tag.key
        ));
    }

    Ok(format!(
        "SELECT DISTINCT{select_labels} fingerprint FROM {METRICS_DB}.{TIME_SERIES_TABLE} WHERE {}",
        conditions.join(" AND ")
    ))
}

/// Delta metrics match only themselves; cumulative and unspecified series
/// are interchangeable for filtering because unspecified is treated as
/// cumulative downstream.
fn temporality_condition(metric: &str, temporality: Temporality) -> String {
    match temporality {
        Temporality::Delta => {
            format!("metric_name = {metric} AND temporality = 'Delta'")
        }
        Temporality::Cumulative | Temporality::Unspecified => {
            format!("metric_name = {metric} AND temporality IN ['Cumulative', 'Unspecified']")
        }
    }
}

fn filter_condition(item: &FilterItem) -> Result<Option<String>> {
    let key = &item.key;
    let extract = format!("JSONExtractString(labels, '{key}')");

    // Pattern operators take the first element when handed a list; an empty
    // list drops the condition entirely.
    let pattern_value = |value: &FilterValue| -> Option<String> {
        match value {
            FilterValue::List(items) => items.first().map(|first| format::quote(first)),
            other => Some(format::filter_value(other)),
        }
    };

    let list_value = |operator: &str| -> Result<String> {
        match &item.value {
            FilterValue::List(_) => Ok(format::filter_value(&item.value)),
            FilterValue::String(_) | FilterValue::Number(_) => {
                Err(CompileError::FilterValueNotAList {
                    key: key.clone(),
                    operator: operator.to_string(),
                })
            }
        }
    };

    let condition = match item.op {
        FilterOperator::Equal => Some(format!("{extract} = {}", format::filter_value(&item.value))),
        FilterOperator::NotEqual => {
            Some(format!("{extract} != {}", format::filter_value(&item.value)))
        }
        FilterOperator::GreaterThan => {
            Some(format!("{extract} > {}", format::filter_value(&item.value)))
        }
        FilterOperator::GreaterThanOrEq => {
            Some(format!("{extract} >= {}", format::filter_value(&item.value)))
        }
        FilterOperator::LessThan => {
            Some(format!("{extract} < {}", format::filter_value(&item.value)))
        }
        FilterOperator::LessThanOrEq => {
            Some(format!("{extract} <= {}", format::filter_value(&item.value)))
        }
        FilterOperator::In => Some(format!("{extract} IN {}", list_value("in")?)),
        FilterOperator::NotIn => Some(format!("{extract} NOT IN {}", list_value("nin")?)),
        FilterOperator::Like => pattern_value(&item.value).map(|v| format!("like({extract}, {v})")),
        FilterOperator::NotLike => {
            pattern_value(&item.value).map(|v| format!("notLike({extract}, {v})"))
        }
        FilterOperator::Contains => contains_pattern(&item.value)
            .map(|pattern| format!("like({extract}, {})", format::quote(&pattern))),
        FilterOperator::NotContains => contains_pattern(&item.value)
            .map(|pattern| format!("notLike({extract}, {})", format::quote(&pattern))),
        FilterOperator::Regex => {
            pattern_value(&item.value).map(|v| format!("match({extract}, {v})"))
        }
        FilterOperator::NotRegex => {
            pattern_value(&item.value).map(|v| format!("not match({extract}, {v})"))
        }
        FilterOperator::Exists => Some(format!("has(JSONExtractKeys(labels), '{key}')")),
        FilterOperator::NotExists => Some(format!("not has(JSONExtractKeys(labels), '{key}')")),
    };

    Ok(condition)
}

fn contains_pattern(value: &FilterValue) -> Option<String> {
    match value {
        FilterValue::String(s) => Some(format!("%{s}%")),
        FilterValue::Number(n) => Some(format!("%{}%", format::format_number(*n))),
        FilterValue::List(items) => items.first().map(|first| format!("%{first}%")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spyglass_model::BuilderQuery;

    fn base_query() -> BuilderQuery {
        BuilderQuery::new("A", "http_requests_total")
    }

    #[test]
    fn bare_query_filters_on_metric_and_temporality() {
        let sql = time_series_filter_query(&base_query()).unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT fingerprint FROM spyglass_metrics.time_series_v4 \
             WHERE metric_name = 'http_requests_total' \
             AND temporality IN ['Cumulative', 'Unspecified']"
        );
    }

    #[test]
    fn delta_temporality_is_exact() {
        let query = base_query().temporality(Temporality::Delta);
        let sql = time_series_filter_query(&query).unwrap();
        assert!(sql.contains("temporality = 'Delta'"));
        assert!(!sql.contains("IN ['Cumulative'"));
    }

    #[test]
    fn group_by_labels_are_extracted() {
        let query = base_query().group_by("service").group_by("env");
        let sql = time_series_filter_query(&query).unwrap();
        assert!(sql.starts_with(
            "SELECT DISTINCT JSONExtractString(labels, 'service') as service, \
             JSONExtractString(labels, 'env') as env, fingerprint"
        ));
    }

    #[test]
    fn equality_filter() {
        let query = base_query().filter(FilterItem::new("env", FilterOperator::Equal, "prod"));
        let sql = time_series_filter_query(&query).unwrap();
        assert!(sql.contains("JSONExtractString(labels, 'env') = 'prod'"));
    }

    #[test]
    fn membership_filter_requires_list() {
        let query = base_query().filter(FilterItem::new("env", FilterOperator::In, "prod"));
        assert!(matches!(
            time_series_filter_query(&query),
            Err(CompileError::FilterValueNotAList { .. })
        ));

        let query = base_query().filter(FilterItem::new(
            "env",
            FilterOperator::In,
            vec!["prod".to_string(), "staging".to_string()],
        ));
        let sql = time_series_filter_query(&query).unwrap();
        assert!(sql.contains("JSONExtractString(labels, 'env') IN ['prod', 'staging']"));
    }

    #[test]
    fn contains_wraps_pattern() {
        let query = base_query().filter(FilterItem::new(
            "host",
            FilterOperator::Contains,
            "gpu-node",
        ));
        let sql = time_series_filter_query(&query).unwrap();
        assert!(sql.contains("like(JSONExtractString(labels, 'host'), '%gpu-node%')"));
    }

    #[test]
    fn regex_filter_uses_match() {
        let query = base_query().filter(FilterItem::new(
            "host",
            FilterOperator::Regex,
            "gpu-.*",
        ));
        let sql = time_series_filter_query(&query).unwrap();
        assert!(sql.contains("match(JSONExtractString(labels, 'host'), 'gpu-.*')"));
    }

    #[test]
    fn pattern_operator_with_list_takes_first() {
        let query = base_query().filter(FilterItem::new(
            "host",
            FilterOperator::Like,
            vec!["gpu-%".to_string(), "cpu-%".to_string()],
        ));
        let sql = time_series_filter_query(&query).unwrap();
        assert!(sql.contains("like(JSONExtractString(labels, 'host'), 'gpu-%')"));
        assert!(!sql.contains("cpu-%"));
    }

    #[test]
    fn pattern_operator_with_empty_list_drops_condition() {
        let query = base_query().filter(FilterItem::new(
            "host",
            FilterOperator::Like,
            Vec::<String>::new(),
        ));
        let sql = time_series_filter_query(&query).unwrap();
        assert!(!sql.contains("like("));
    }

    #[test]
    fn exists_checks_label_keys() {
        let query = base_query().filter(FilterItem::new("env", FilterOperator::Exists, ""));
        let sql = time_series_filter_query(&query).unwrap();
        assert!(sql.contains("has(JSONExtractKeys(labels), 'env')"));

        let query = base_query().filter(FilterItem::new("env", FilterOperator::NotExists, ""));
        let sql = time_series_filter_query(&query).unwrap();
        assert!(sql.contains("not has(JSONExtractKeys(labels), 'env')"));
    }
}
