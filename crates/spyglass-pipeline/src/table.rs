//! Pivoting series results into tables.
//!
//! Two pivots share one contract: label columns in first-seen order, then
//! value columns named after queries, one row per label combination, and
//! rows sorted query-by-query per each query's `order_by`.
//!
//! The per-query flatten gives each result its own table, for table
//! panels rendering one query at a time. The web pivot merges every
//! result into a single table keyed by label values, so two queries
//! grouped by the same labels land on the same row and a query with no
//! value for a row shows the `"n/a"` sentinel.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use spyglass_model::{
    BuilderQuery, ColumnDescriptor, QueryResult, Series, SortOrder, Table, TableCell, TableRow,
    NOT_AVAILABLE, ORDER_BY_VALUE,
};
use tracing::debug;

/// Pivots each result's series into that result's own table.
///
/// The value column is present only when at least one series carries a
/// point; a series without points still produces a row so that its label
/// combination stays visible.
pub fn flatten_each_query(results: &mut [QueryResult], queries: &BTreeMap<String, BuilderQuery>) {
    for result in results.iter_mut() {
        let mut columns = label_columns(&result.series);
        let has_points = result.series.iter().any(|s| !s.points.is_empty());
        if has_points {
            columns.push(ColumnDescriptor::value(&result.query_name));
        }

        let mut rows: Vec<TableRow> = result
            .series
            .iter()
            .map(|series| {
                let mut row = TableRow::default();
                fill_label_cells(&mut row, &columns, series);
                if let Some(point) = series.points.first() {
                    row.data
                        .insert(result.query_name.clone(), TableCell::Number(point.value));
                }
                row
            })
            .collect();

        sort_rows(&mut rows, queries, &[result.query_name.clone()]);
        result.table = Some(Table { columns, rows });
    }
}

/// Merges all results into a single table keyed by label values.
///
/// Rows are deduplicated on the ordered label-column values, joined
/// verbatim, so two series agreeing on every label column share a row.
/// Every query name becomes a value column; a query with no series for a
/// row leaves the cell missing.
pub fn pivot_for_web(
    results: &[QueryResult],
    queries: &BTreeMap<String, BuilderQuery>,
) -> QueryResult {
    let mut query_names: Vec<String> = results.iter().map(|r| r.query_name.clone()).collect();
    query_names.sort();

    let ordered: Vec<&QueryResult> = query_names
        .iter()
        .filter_map(|name| results.iter().find(|r| r.query_name == *name))
        .collect();

    let mut columns: Vec<ColumnDescriptor> = Vec::new();
    for result in &ordered {
        for column in label_columns(&result.series) {
            if !columns.iter().any(|c| c.name == column.name) {
                columns.push(column);
            }
        }
    }
    let label_count = columns.len();
    for name in &query_names {
        columns.push(ColumnDescriptor::value(name));
    }

    let mut row_index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<TableRow> = Vec::new();
    for result in &ordered {
        for series in &result.series {
            let key = dedup_key(&columns[..label_count], series);
            let index = *row_index.entry(key).or_insert_with(|| {
                let mut row = TableRow::default();
                fill_label_cells(&mut row, &columns[..label_count], series);
                for name in &query_names {
                    row.data.insert(name.clone(), TableCell::Missing);
                }
                rows.push(row);
                rows.len() - 1
            });
            if let Some(point) = series.points.first() {
                rows[index]
                    .data
                    .insert(result.query_name.clone(), TableCell::Number(point.value));
            }
        }
    }

    sort_rows(&mut rows, queries, &query_names);
    debug!(
        queries = query_names.len(),
        columns = columns.len(),
        rows = rows.len(),
        "pivoted results into web table"
    );

    let mut merged = QueryResult::new("");
    merged.table = Some(Table { columns, rows });
    merged
}

/// Label columns in first-seen order across the series' label arrays.
fn label_columns(series: &[Series]) -> Vec<ColumnDescriptor> {
    let mut columns: Vec<ColumnDescriptor> = Vec::new();
    for s in series {
        for entry in &s.labels_array {
            for name in entry.keys() {
                if !columns.iter().any(|c| c.name == *name) {
                    columns.push(ColumnDescriptor::label(name));
                }
            }
        }
    }
    columns
}

fn fill_label_cells(row: &mut TableRow, label_columns: &[ColumnDescriptor], series: &Series) {
    for column in label_columns {
        let cell = series
            .labels
            .get(&column.name)
            .map_or(TableCell::Missing, |value| TableCell::Text(value.clone()));
        row.data.insert(column.name.clone(), cell);
    }
}

/// The row-merge key: ordered label-column values joined verbatim.
///
/// Values are not escaped, matching the dashboard contract for which rows
/// merge; see DESIGN.md.
fn dedup_key(label_columns: &[ColumnDescriptor], series: &Series) -> String {
    let parts: Vec<&str> = label_columns
        .iter()
        .map(|column| {
            series
                .labels
                .get(&column.name)
                .map_or(NOT_AVAILABLE, String::as_str)
        })
        .collect();
    parts.join(",")
}

/// Sorts rows query-by-query per each query's ordering keys.
///
/// The synthetic value column resolves to the query's own column. A
/// missing cell orders after a present one whatever the direction, so
/// rows a query knows nothing about sink to the bottom. The sort is
/// stable; the first decisive comparison wins.
pub fn sort_rows(
    rows: &mut [TableRow],
    queries: &BTreeMap<String, BuilderQuery>,
    query_names: &[String],
) {
    rows.sort_by(|a, b| {
        for name in query_names {
            let Some(query) = queries.get(name) else {
                continue;
            };
            for order in &query.order_by {
                let column = if order.column_name == ORDER_BY_VALUE {
                    name
                } else {
                    &order.column_name
                };
                let ordering = compare_cells(a.cell(column), b.cell(column), order.order);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
        Ordering::Equal
    });
}

fn compare_cells(a: &TableCell, b: &TableCell, order: SortOrder) -> Ordering {
    // Missing cells and kind mismatches order before the direction is
    // applied: absent data sinks to the bottom under asc and desc alike.
    let ordering = match (a, b) {
        (TableCell::Missing, TableCell::Missing) => return Ordering::Equal,
        (TableCell::Missing, _) => return Ordering::Greater,
        (_, TableCell::Missing) => return Ordering::Less,
        (TableCell::Number(a), TableCell::Number(b)) => a.total_cmp(b),
        (TableCell::Text(a), TableCell::Text(b)) => a.cmp(b),
        (TableCell::Number(_), TableCell::Text(_)) => return Ordering::Less,
        (TableCell::Text(_), TableCell::Number(_)) => return Ordering::Greater,
    };
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}
