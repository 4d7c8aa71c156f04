//! The post-processing orchestrator.
//!
//! Runs the pipeline stages over a set of query results in a fixed order,
//! gated on the composite query's configuration:
//!
//! 1. having and limit on each raw metrics result
//! 2. the caller's functions hook, when provided
//! 3. scalar reduction for table and value panels
//! 4. per-query table flattening for table panels
//! 5. formula evaluation, with having and limit on each formula result
//! 6. removal of disabled queries (builder query type only)
//! 7. gap filling for graph panels, when requested
//! 8. the web table pivot, when requested
//!
//! Disabled queries are dropped only after formulas run, so a formula can
//! reference a query whose own result the caller never sees. Results leave
//! the pipeline ordered by query name.

use spyglass_model::{DataSource, PanelType, QueryRangeParams, QueryResult, QueryType, ReduceTo};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::{formula, gapfill, having, limit, reduce, table};

/// A caller-supplied hook applied to the results between limiting and
/// reduction, for ad-hoc transformations the pipeline does not model.
pub type FunctionsHook<'a> = &'a dyn Fn(&mut Vec<QueryResult>);

/// Post-processes query results per the request parameters.
///
/// # Errors
///
/// Returns a model error when the parameters fail validation, or a parse
/// error when a formula expression is malformed or calls an unknown
/// function. A formula that fails during evaluation is skipped with a
/// warning instead.
pub fn postprocess(
    results: Vec<QueryResult>,
    params: &QueryRangeParams,
) -> Result<Vec<QueryResult>> {
    postprocess_with(results, params, None)
}

/// [`postprocess`] with an optional functions hook.
pub fn postprocess_with(
    mut results: Vec<QueryResult>,
    params: &QueryRangeParams,
    functions: Option<FunctionsHook<'_>>,
) -> Result<Vec<QueryResult>> {
    params.validate()?;
    let composite = &params.composite_query;
    let queries = &composite.queries;
    debug!(
        queries = queries.len(),
        panel_type = ?composite.panel_type,
        fill_gaps = composite.fill_gaps,
        format_for_web = params.format_for_web,
        "post-processing query results"
    );

    for result in &mut results {
        let Some(query) = queries.get(&result.query_name) else {
            continue;
        };
        if query.is_formula() || query.data_source != DataSource::Metrics {
            continue;
        }
        having::apply_having(result, &query.having);
        limit::apply_limit(result, query);
    }

    if let Some(functions) = functions {
        functions(&mut results);
    }

    if matches!(composite.panel_type, PanelType::Table | PanelType::Value) {
        for result in &mut results {
            let Some(query) = queries.get(&result.query_name) else {
                continue;
            };
            if query.is_formula() || query.data_source != DataSource::Metrics {
                continue;
            }
            reduce::reduce_result(result, query.reduce_to.unwrap_or(ReduceTo::Last));
        }
    }

    if composite.panel_type == PanelType::Table {
        table::flatten_each_query(&mut results, queries);
    }

    for (name, query) in queries {
        if !query.is_formula() {
            continue;
        }
        match formula::evaluate(query, &results, queries) {
            Ok(mut formula_result) => {
                having::apply_having(&mut formula_result, &query.having);
                limit::apply_limit(&mut formula_result, query);
                results.push(formula_result);
            }
            Err(
                err @ (PipelineError::ExpressionParse { .. }
                | PipelineError::UnknownFunction { .. }),
            ) => return Err(err),
            Err(err) => {
                warn!(formula = %name, error = %err, "formula evaluation failed, skipping");
            }
        }
    }

    if composite.query_type == QueryType::Builder {
        results.retain(|result| {
            queries
                .get(&result.query_name)
                .is_none_or(|query| !query.disabled)
        });
    }

    if composite.fill_gaps && composite.panel_type == PanelType::Graph {
        for result in &mut results {
            gapfill::fill_gaps(result, queries, params.start, params.end);
        }
    }

    results.sort_by(|a, b| a.query_name.cmp(&b.query_name));

    if params.format_for_web && composite.panel_type == PanelType::Table {
        let merged = table::pivot_for_web(&results, queries);
        results = vec![merged];
    }

    Ok(results)
}
