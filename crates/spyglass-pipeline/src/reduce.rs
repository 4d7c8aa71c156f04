//! Scalar reduction of series for table and value panels.
//!
//! A table or value panel shows one number per series, so each series'
//! point list collapses to a single point. `last` keeps the final point
//! with its timestamp; the arithmetic reductions produce a point at
//! timestamp zero. An empty series reduces to NaN under `last`, `avg`,
//! `min`, and `max`, and to zero under `sum`.

use spyglass_model::{Point, QueryResult, ReduceTo};

/// Collapses every series of `result` to a single point per `reduce_to`.
pub fn reduce_result(result: &mut QueryResult, reduce_to: ReduceTo) {
    for series in &mut result.series {
        let point = match reduce_to {
            ReduceTo::Last => series
                .points
                .last()
                .copied()
                .unwrap_or_else(|| Point::new(0, f64::NAN)),
            ReduceTo::Sum => Point::new(0, series.points.iter().map(|p| p.value).sum()),
            ReduceTo::Avg => {
                let sum: f64 = series.points.iter().map(|p| p.value).sum();
                Point::new(0, sum / series.points.len() as f64)
            }
            ReduceTo::Min => Point::new(
                0,
                series
                    .points
                    .iter()
                    .map(|p| p.value)
                    .fold(f64::NAN, f64::min),
            ),
            ReduceTo::Max => Point::new(
                0,
                series
                    .points
                    .iter()
                    .map(|p| p.value)
                    .fold(f64::NAN, f64::max),
            ),
        };
        series.points = vec![point];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spyglass_model::Series;
    use std::collections::HashMap;
    use test_case::test_case;

    fn result_with_values(values: &[f64]) -> QueryResult {
        let mut series = Series::new(HashMap::new());
        for (i, value) in values.iter().enumerate() {
            series = series.point((i as i64 + 1) * 60_000, *value);
        }
        QueryResult::new("A").with_series(series)
    }

    #[test_case(ReduceTo::Sum, 1.5; "sum adds all points")]
    #[test_case(ReduceTo::Avg, 0.3; "avg divides by count")]
    #[test_case(ReduceTo::Min, 0.1; "min finds the smallest")]
    #[test_case(ReduceTo::Max, 0.5; "max finds the largest")]
    #[test_case(ReduceTo::Last, 0.1; "last keeps the final value")]
    fn reductions(reduce_to: ReduceTo, expected: f64) {
        let mut result = result_with_values(&[0.5, 0.4, 0.3, 0.2, 0.1]);
        reduce_result(&mut result, reduce_to);

        assert_eq!(result.series[0].points.len(), 1);
        assert!((result.series[0].points[0].value - expected).abs() < 1e-9);
    }

    #[test]
    fn last_keeps_the_final_timestamp() {
        let mut result = result_with_values(&[0.5, 0.4]);
        reduce_result(&mut result, ReduceTo::Last);

        assert_eq!(result.series[0].points[0].timestamp, 120_000);
    }

    #[test]
    fn arithmetic_reductions_sit_at_timestamp_zero() {
        let mut result = result_with_values(&[0.5, 0.4]);
        reduce_result(&mut result, ReduceTo::Sum);

        assert_eq!(result.series[0].points[0].timestamp, 0);
    }

    #[test]
    fn empty_series_reduces_to_nan_except_sum() {
        for reduce_to in [ReduceTo::Last, ReduceTo::Avg, ReduceTo::Min, ReduceTo::Max] {
            let mut result = result_with_values(&[]);
            reduce_result(&mut result, reduce_to);
            assert!(result.series[0].points[0].value.is_nan());
        }

        let mut result = result_with_values(&[]);
        reduce_result(&mut result, ReduceTo::Sum);
        assert!(result.series[0].points[0].value.abs() < f64::EPSILON);
    }

    #[test]
    fn every_series_is_reduced() {
        let mut result = QueryResult::new("A")
            .with_series(Series::new(HashMap::new()).point(0, 1.0).point(60_000, 2.0))
            .with_series(Series::new(HashMap::new()).point(0, 3.0).point(60_000, 4.0));
        reduce_result(&mut result, ReduceTo::Sum);

        assert!((result.series[0].points[0].value - 3.0).abs() < f64::EPSILON);
        assert!((result.series[1].points[0].value - 7.0).abs() < f64::EPSILON);
    }
}
