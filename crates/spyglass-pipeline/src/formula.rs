//! Formula evaluation over sibling query results.
//!
//! A formula joins the series of the queries its expression references and
//! evaluates the expression once per timestamp. The join key set is derived
//! from the label sets actually present in the data: every distinct label
//! set is a candidate, and a set that is a subset of another candidate is
//! folded into the larger one, so `A{service, operation} / B{service}`
//! produces one output series per `{service, operation}` pair with the `B`
//! value broadcast across it.
//!
//! Missing values at a timestamp default to zero only for aggregations
//! where zero means "nothing observed" (sum, count, rate, increase). For
//! value-shaped aggregations (avg, min, max, latest) the timestamp is
//! skipped instead. Non-finite evaluation results are dropped, so a
//! division by zero thins the output rather than failing the formula.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use spyglass_model::{expression_variables, BuilderQuery, Point, QueryResult, Series};
use tracing::debug;

use crate::error::Result;
use crate::expr::Expr;

/// Evaluates a formula query against the results of its sibling queries.
///
/// `results` holds the post-aggregation series per query name; `queries` is
/// the full composite query map, consulted for the default-zero rule of
/// each referenced query.
///
/// # Errors
///
/// Returns a parse error for a malformed expression or an unknown
/// function. Evaluation itself cannot fail once every referenced variable
/// is bound, which the join guarantees.
pub fn evaluate(
    formula: &BuilderQuery,
    results: &[QueryResult],
    queries: &BTreeMap<String, BuilderQuery>,
) -> Result<QueryResult> {
    let expr = Expr::parse(&formula.expression)?;
    let variables = expression_variables(&formula.expression);

    let referenced: Vec<&QueryResult> = variables
        .iter()
        .filter_map(|name| results.iter().find(|r| r.query_name == *name))
        .collect();

    let join_keys = unique_label_sets(&referenced);
    debug!(
        formula = %formula.query_name,
        expression = %formula.expression,
        join_keys = join_keys.len(),
        "evaluating formula"
    );

    let mut output = QueryResult::new(formula.query_name.clone());
    let mut env: HashMap<String, f64> = HashMap::with_capacity(variables.len());

    for key in join_keys {
        let mut values_by_variable: HashMap<&str, HashMap<i64, f64>> = HashMap::new();
        let mut timestamps: BTreeSet<i64> = BTreeSet::new();

        for variable in &variables {
            // A series contributes to a join key when its labels are a
            // subset of the key. The key owner matches by equality and a
            // less specific series broadcasts into every key that extends
            // its labels.
            let matched = referenced
                .iter()
                .find(|r| r.query_name == *variable)
                .and_then(|r| r.series.iter().find(|s| is_subset(&s.labels, &key)));
            if let Some(series) = matched {
                let values: HashMap<i64, f64> = series
                    .points
                    .iter()
                    .map(|p| (p.timestamp, p.value))
                    .collect();
                timestamps.extend(values.keys().copied());
                values_by_variable.insert(variable.as_str(), values);
            }
        }

        let mut series = Series::new(key.clone());
        'timestamps: for timestamp in timestamps {
            env.clear();
            for variable in &variables {
                let value = values_by_variable
                    .get(variable.as_str())
                    .and_then(|values| values.get(&timestamp).copied());
                match value {
                    Some(value) => {
                        env.insert(variable.clone(), value);
                    }
                    None if defaults_to_zero(queries, variable) => {
                        env.insert(variable.clone(), 0.0);
                    }
                    None => continue 'timestamps,
                }
            }
            let value = expr.eval(&env)?;
            if value.is_finite() {
                series.points.push(Point::new(timestamp, value));
            }
        }

        if !series.points.is_empty() {
            output.series.push(series);
        }
    }

    Ok(output)
}

fn defaults_to_zero(queries: &BTreeMap<String, BuilderQuery>, variable: &str) -> bool {
    queries
        .get(variable)
        .is_some_and(BuilderQuery::can_default_zero)
}

/// Collects the distinct label sets across the referenced results, largest
/// first, with sets subsumed by a larger set removed.
///
/// Sorting is stable, so ties keep the order the results presented them
/// in, and the output order fixes the output series order of the formula.
fn unique_label_sets(referenced: &[&QueryResult]) -> Vec<HashMap<String, String>> {
    let mut candidates: Vec<&HashMap<String, String>> = referenced
        .iter()
        .flat_map(|r| r.series.iter().map(|s| &s.labels))
        .collect();
    candidates.sort_by_key(|labels| std::cmp::Reverse(labels.len()));

    let mut kept: Vec<HashMap<String, String>> = Vec::new();
    for candidate in candidates {
        if !kept.iter().any(|existing| is_subset(candidate, existing)) {
            kept.push(candidate.clone());
        }
    }
    kept
}

fn is_subset(inner: &HashMap<String, String>, outer: &HashMap<String, String>) -> bool {
    inner
        .iter()
        .all(|(key, value)| outer.get(key) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spyglass_model::TimeAggregation;

    fn queries(pairs: &[(&str, TimeAggregation)]) -> BTreeMap<String, BuilderQuery> {
        pairs
            .iter()
            .map(|(name, agg)| {
                (
                    (*name).to_string(),
                    BuilderQuery::new(*name, "m").time_aggregation(*agg),
                )
            })
            .collect()
    }

    fn sum_queries() -> BTreeMap<String, BuilderQuery> {
        queries(&[("A", TimeAggregation::Sum), ("B", TimeAggregation::Sum)])
    }

    #[test]
    fn scalar_broadcasts_across_grouped_series() {
        let results = vec![
            QueryResult::new("A")
                .with_series(
                    Series::new(HashMap::new())
                        .label("service", "frontend")
                        .point(1, 10.0)
                        .point(2, 20.0),
                )
                .with_series(
                    Series::new(HashMap::new())
                        .label("service", "redis")
                        .point(1, 12.0)
                        .point(2, 45.0),
                ),
            QueryResult::new("B")
                .with_series(Series::new(HashMap::new()).point(1, 22.0).point(2, 65.0)),
        ];
        let formula = BuilderQuery::formula("F1", "A/B");

        let got = evaluate(&formula, &results, &sum_queries()).unwrap();

        assert_eq!(got.series.len(), 2);
        let frontend = &got.series[0];
        assert_eq!(frontend.labels["service"], "frontend");
        assert!((frontend.points[0].value - 10.0 / 22.0).abs() < f64::EPSILON);
        assert!((frontend.points[1].value - 20.0 / 65.0).abs() < f64::EPSILON);
        let redis = &got.series[1];
        assert_eq!(redis.labels["service"], "redis");
        assert!((redis.points[0].value - 12.0 / 22.0).abs() < f64::EPSILON);
        assert!((redis.points[1].value - 45.0 / 65.0).abs() < f64::EPSILON);
    }

    #[test]
    fn disjoint_label_sets_default_the_missing_side_to_zero() {
        let results = vec![
            QueryResult::new("A").with_series(
                Series::new(HashMap::new())
                    .label("service_name", "frontend")
                    .label("operation", "GET /api")
                    .point(1, 10.0)
                    .point(2, 20.0),
            ),
            QueryResult::new("B").with_series(
                Series::new(HashMap::new())
                    .label("service_name", "redis")
                    .point(1, 30.0)
                    .point(3, 40.0),
            ),
        ];
        let formula = BuilderQuery::formula("F1", "A + B");

        let got = evaluate(&formula, &results, &sum_queries()).unwrap();

        assert_eq!(got.series.len(), 2);
        let frontend = &got.series[0];
        assert_eq!(frontend.labels.len(), 2);
        assert_eq!(
            frontend
                .points
                .iter()
                .map(|p| (p.timestamp, p.value))
                .collect::<Vec<_>>(),
            vec![(1, 10.0), (2, 20.0)]
        );
        let redis = &got.series[1];
        assert_eq!(redis.labels["service_name"], "redis");
        assert_eq!(
            redis
                .points
                .iter()
                .map(|p| (p.timestamp, p.value))
                .collect::<Vec<_>>(),
            vec![(1, 30.0), (3, 40.0)]
        );
    }

    #[test]
    fn non_finite_quotients_are_dropped() {
        // ts 1: 10/0 is infinite, ts 2: 0/0 is nan, ts 3: 0/10 survives.
        let results = vec![
            QueryResult::new("A")
                .with_series(Series::new(HashMap::new()).point(1, 10.0).point(2, 0.0)),
            QueryResult::new("B")
                .with_series(Series::new(HashMap::new()).point(1, 0.0).point(3, 10.0)),
        ];
        let formula = BuilderQuery::formula("F1", "A/B");

        let got = evaluate(&formula, &results, &sum_queries()).unwrap();

        assert_eq!(got.series.len(), 1);
        assert_eq!(got.series[0].points.len(), 1);
        assert_eq!(got.series[0].points[0].timestamp, 3);
        assert!(got.series[0].points[0].value.abs() < f64::EPSILON);
    }

    #[test]
    fn error_rate_defaults_queries_without_errors_to_zero() {
        let totals = QueryResult::new("A")
            .with_series(
                Series::new(HashMap::new())
                    .label("service_name", "frontend")
                    .point(1, 10.0)
                    .point(2, 20.0),
            )
            .with_series(
                Series::new(HashMap::new())
                    .label("service_name", "redis")
                    .point(1, 12.0)
                    .point(2, 45.0),
            )
            .with_series(
                Series::new(HashMap::new())
                    .label("service_name", "route")
                    .point(1, 2.0)
                    .point(2, 45.0),
            );
        let errors = QueryResult::new("B").with_series(
            Series::new(HashMap::new())
                .label("service_name", "redis")
                .point(1, 6.0)
                .point(2, 9.0),
        );
        let formula = BuilderQuery::formula("F1", "B/A");

        let got = evaluate(&formula, &[totals, errors], &sum_queries()).unwrap();

        assert_eq!(got.series.len(), 3);
        let by_service: HashMap<&str, Vec<f64>> = got
            .series
            .iter()
            .map(|s| {
                (
                    s.labels["service_name"].as_str(),
                    s.points.iter().map(|p| p.value).collect(),
                )
            })
            .collect();
        assert_eq!(by_service["frontend"], vec![0.0, 0.0]);
        assert_eq!(by_service["redis"], vec![0.5, 0.2]);
        assert_eq!(by_service["route"], vec![0.0, 0.0]);
    }

    #[test]
    fn value_aggregations_skip_timestamps_instead_of_defaulting() {
        let results = vec![
            QueryResult::new("A").with_series(
                Series::new(HashMap::new())
                    .label("service_name", "frontend")
                    .point(1, 10.0)
                    .point(2, 20.0),
            ),
            QueryResult::new("B").with_series(
                Series::new(HashMap::new())
                    .label("service_name", "redis")
                    .point(1, 30.0)
                    .point(3, 40.0),
            ),
        ];
        let formula = BuilderQuery::formula("F1", "A + B");
        let queries = queries(&[("A", TimeAggregation::Avg), ("B", TimeAggregation::Avg)]);

        let got = evaluate(&formula, &results, &queries).unwrap();

        assert!(got.series.is_empty());
    }

    #[test]
    fn subset_label_sets_fold_into_superset_keys() {
        let per_operation = QueryResult::new("A")
            .with_series(
                Series::new(HashMap::new())
                    .label("service", "api")
                    .label("operation", "read")
                    .point(1, 6.0),
            )
            .with_series(
                Series::new(HashMap::new())
                    .label("service", "api")
                    .label("operation", "write")
                    .point(1, 4.0),
            );
        let per_service = QueryResult::new("B").with_series(
            Series::new(HashMap::new())
                .label("service", "api")
                .point(1, 10.0),
        );
        let formula = BuilderQuery::formula("F1", "A/B");

        let got = evaluate(&formula, &[per_operation, per_service], &sum_queries()).unwrap();

        // The bare {service} key folds into the two {service, operation}
        // keys, each of which sees the broadcast B value.
        assert_eq!(got.series.len(), 2);
        assert!((got.series[0].points[0].value - 0.6).abs() < f64::EPSILON);
        assert!((got.series[1].points[0].value - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn functions_apply_per_timestamp() {
        let results = vec![QueryResult::new("A")
            .with_series(Series::new(HashMap::new()).point(1, 16.0).point(2, 64.0))];
        let formula = BuilderQuery::formula("F1", "sqrt(A)");
        let queries = queries(&[("A", TimeAggregation::Sum)]);

        let got = evaluate(&formula, &results, &queries).unwrap();

        assert_eq!(got.series.len(), 1);
        assert!((got.series[0].points[0].value - 4.0).abs() < f64::EPSILON);
        assert!((got.series[0].points[1].value - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_expression_is_a_parse_error() {
        let formula = BuilderQuery::formula("F1", "A +");
        let err = evaluate(&formula, &[], &sum_queries()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PipelineError::ExpressionParse { .. }
        ));
    }
}
