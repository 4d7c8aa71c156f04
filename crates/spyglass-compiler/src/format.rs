//! ClickHouse literal formatting.

use spyglass_model::{FilterValue, HavingValue};

/// Quotes and escapes a string for embedding as a ClickHouse literal.
#[must_use]
pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Renders a filter value as a ClickHouse literal.
///
/// Lists render in the bracketed array form membership operators expect.
#[must_use]
pub fn filter_value(value: &FilterValue) -> String {
    match value {
        FilterValue::String(s) => quote(s),
        FilterValue::Number(n) => format_number(*n),
        FilterValue::List(items) => {
            let quoted: Vec<String> = items.iter().map(|item| quote(item)).collect();
            format!("[{}]", quoted.join(", "))
        }
    }
}

/// Renders a having value as a ClickHouse literal.
#[must_use]
pub fn having_value(value: &HavingValue) -> String {
    match value {
        HavingValue::Scalar(n) => format_number(*n),
        HavingValue::List(items) => {
            let rendered: Vec<String> = items.iter().map(|item| format_number(*item)).collect();
            format!("[{}]", rendered.join(", "))
        }
    }
}

/// Renders a float without a trailing `.0` for whole numbers, matching the
/// literal form the store's parser produces for integer thresholds.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
