//! Top-N series selection.
//!
//! Orders the series of a result by the query's `order_by` keys and keeps
//! the first `limit` of them. Ordering defaults to the synthetic value
//! column, descending, so an unadorned `limit: 10` keeps the ten largest
//! series.
//!
//! The value column compares each series by a single representative
//! number. When every series carries exactly one point (the table and
//! value panel shape) that point is compared directly; otherwise the mean
//! of the finite points stands in for the series. Label columns compare
//! lexicographically, with a series missing the label ordering before one
//! that has it. The sort is stable and multi-key: the first key that
//! distinguishes two series decides, and later keys break ties.

use std::cmp::Ordering;

use spyglass_model::{BuilderQuery, OrderBy, QueryResult, Series, SortOrder, ORDER_BY_VALUE};
use tracing::debug;

/// Sorts the series of `result` per the query's ordering keys and, when
/// the query sets a positive limit, truncates to that many series.
///
/// The sort applies even when `limit` is zero so that ordering keys alone
/// produce a deterministic series order.
pub fn apply_limit(result: &mut QueryResult, query: &BuilderQuery) {
    let default_order = [OrderBy::default_value_desc()];
    let orders: &[OrderBy] = if query.order_by.is_empty() {
        &default_order
    } else {
        &query.order_by
    };

    // With one point everywhere the scalar itself is the sort key;
    // otherwise summarize each series by its finite-point mean.
    let all_single = result.series.iter().all(|s| s.points.len() == 1);
    let mut keyed: Vec<(f64, Series)> = result
        .series
        .drain(..)
        .map(|series| (sort_value(&series, all_single), series))
        .collect();

    keyed.sort_by(|(a_value, a), (b_value, b)| compare(orders, *a_value, a, *b_value, b));

    result.series = keyed.into_iter().map(|(_, series)| series).collect();
    if query.limit > 0 && result.series.len() > query.limit {
        debug!(
            query_name = %result.query_name,
            limit = query.limit,
            dropped = result.series.len() - query.limit,
            "truncating to series limit"
        );
        result.series.truncate(query.limit);
    }
}

fn sort_value(series: &Series, all_single: bool) -> f64 {
    if all_single {
        return series.points[0].value;
    }
    let finite: Vec<f64> = series
        .points
        .iter()
        .map(|p| p.value)
        .filter(|v| v.is_finite())
        .collect();
    let sum: f64 = finite.iter().sum();
    sum / finite.len().max(1) as f64
}

fn compare(
    orders: &[OrderBy],
    a_value: f64,
    a: &Series,
    b_value: f64,
    b: &Series,
) -> Ordering {
    for order in orders {
        let ordering = if order.column_name == ORDER_BY_VALUE {
            a_value.total_cmp(&b_value)
        } else {
            compare_label(
                a.labels.get(&order.column_name),
                b.labels.get(&order.column_name),
            )
        };
        let ordering = match order.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_label(a: Option<&String>, b: Option<&String>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn service_series(name: &str, values: &[f64]) -> Series {
        let mut series = Series::new(HashMap::new()).label("service", name);
        for (i, value) in values.iter().enumerate() {
            series = series.point(i as i64 * 60_000, *value);
        }
        series
    }

    fn result_of(series: Vec<Series>) -> QueryResult {
        let mut result = QueryResult::new("A");
        result.series = series;
        result
    }

    #[test]
    fn default_order_keeps_the_largest_series() {
        let mut result = result_of(vec![
            service_series("frontend", &[10.0, 20.0]),
            service_series("redis", &[30.0, 50.0]),
        ]);
        let query = BuilderQuery::new("A", "m").limit(1);

        apply_limit(&mut result, &query);

        assert_eq!(result.series.len(), 1);
        assert_eq!(result.series[0].labels["service"], "redis");
    }

    #[test]
    fn ascending_value_order_keeps_the_smallest_series() {
        let mut result = result_of(vec![
            service_series("frontend", &[10.0, 20.0]),
            service_series("redis", &[30.0, 50.0]),
        ]);
        let query = BuilderQuery::new("A", "m")
            .limit(1)
            .order_by(OrderBy::new(ORDER_BY_VALUE, SortOrder::Asc));

        apply_limit(&mut result, &query);

        assert_eq!(result.series.len(), 1);
        assert_eq!(result.series[0].labels["service"], "frontend");
    }

    #[test]
    fn single_point_series_compare_by_the_point_itself() {
        let mut result = result_of(vec![
            service_series("frontend", &[10.0]),
            service_series("redis", &[50.0]),
        ]);
        let query = BuilderQuery::new("A", "m").limit(1);

        apply_limit(&mut result, &query);

        assert_eq!(result.series[0].labels["service"], "redis");
    }

    #[test]
    fn label_order_sorts_lexicographically() {
        let mut result = result_of(vec![
            service_series("redis", &[50.0]),
            service_series("frontend", &[10.0]),
        ]);
        let query = BuilderQuery::new("A", "m")
            .limit(1)
            .order_by(OrderBy::new("service", SortOrder::Asc));

        apply_limit(&mut result, &query);

        assert_eq!(result.series[0].labels["service"], "frontend");
    }

    #[test]
    fn missing_label_sorts_before_present_label() {
        let unlabeled = Series::new(HashMap::new()).point(0, 99.0);
        let mut result = result_of(vec![service_series("frontend", &[10.0]), unlabeled]);
        let query = BuilderQuery::new("A", "m").order_by(OrderBy::new("service", SortOrder::Asc));

        apply_limit(&mut result, &query);

        assert!(result.series[0].labels.is_empty());
        assert_eq!(result.series[1].labels["service"], "frontend");
    }

    #[test]
    fn later_keys_break_ties_of_earlier_keys() {
        let make = |service: &str, op: &str, value: f64| {
            Series::new(HashMap::new())
                .label("service", service)
                .label("operation", op)
                .point(0, value)
        };
        let mut result = result_of(vec![
            make("api", "write", 1.0),
            make("api", "read", 2.0),
            make("db", "read", 3.0),
        ]);
        let query = BuilderQuery::new("A", "m")
            .order_by(OrderBy::new("service", SortOrder::Asc))
            .order_by(OrderBy::new("operation", SortOrder::Desc));

        apply_limit(&mut result, &query);

        let order: Vec<(&str, &str)> = result
            .series
            .iter()
            .map(|s| {
                (
                    s.labels["service"].as_str(),
                    s.labels["operation"].as_str(),
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![("api", "write"), ("api", "read"), ("db", "read")]
        );
    }

    #[test]
    fn non_finite_points_are_ignored_by_the_mean() {
        let mut noisy = service_series("noisy", &[10.0, 10.0]);
        noisy.points.push(spyglass_model::Point::new(120_000, f64::NAN));
        noisy
            .points
            .push(spyglass_model::Point::new(180_000, f64::INFINITY));
        let mut result = result_of(vec![noisy, service_series("steady", &[9.0, 9.0])]);
        let query = BuilderQuery::new("A", "m").limit(1);

        apply_limit(&mut result, &query);

        // The noisy mean is 10, not inf, so it wins under descending order.
        assert_eq!(result.series[0].labels["service"], "noisy");
    }

    #[test]
    fn sort_without_limit_still_orders_series() {
        let mut result = result_of(vec![
            service_series("frontend", &[10.0]),
            service_series("redis", &[50.0]),
        ]);
        let query = BuilderQuery::new("A", "m");

        apply_limit(&mut result, &query);

        assert_eq!(result.series.len(), 2);
        assert_eq!(result.series[0].labels["service"], "redis");
        assert_eq!(result.series[1].labels["service"], "frontend");
    }

    #[test]
    fn empty_series_sorts_with_value_zero() {
        let empty = Series::new(HashMap::new()).label("service", "empty");
        let mut result = result_of(vec![
            service_series("neg", &[-5.0, -5.0]),
            empty,
            service_series("pos", &[5.0, 5.0]),
        ]);
        let query = BuilderQuery::new("A", "m");

        apply_limit(&mut result, &query);

        let order: Vec<&str> = result
            .series
            .iter()
            .map(|s| s.labels["service"].as_str())
            .collect();
        assert_eq!(order, vec!["pos", "empty", "neg"]);
    }

    proptest! {
        #[test]
        fn never_keeps_more_than_the_limit(
            values in proptest::collection::vec(
                proptest::collection::vec(-1e6f64..1e6, 1..5),
                0..12,
            ),
            limit in 1usize..6,
        ) {
            let series: Vec<Series> = values
                .iter()
                .enumerate()
                .map(|(i, vs)| service_series(&format!("s{i}"), vs))
                .collect();
            let total = series.len();
            let mut result = result_of(series);
            let query = BuilderQuery::new("A", "m").limit(limit);

            apply_limit(&mut result, &query);

            prop_assert!(result.series.len() <= limit);
            prop_assert_eq!(result.series.len(), total.min(limit));
        }
    }
}
