//! Core result types for the query engine.
//!
//! This module provides the shapes the rest of the engine consumes and
//! produces:
//! - [`Point`]: a single aggregated sample
//! - [`Series`]: one labeled time series
//! - [`QueryResult`]: all series produced by one named query or formula
//! - [`MetricName`]: a validated metric name
//! - [`TimeRange`]: the request window

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::table::Table;

/// A single aggregated sample.
///
/// Values may be NaN or infinite; downstream stages treat those as "no data"
/// and skip them rather than propagate them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
    /// The aggregated value.
    pub value: f64,
}

impl Point {
    /// Creates a new point.
    #[must_use]
    pub const fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Returns true if the value is a usable number (not NaN, not infinite).
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.value.is_finite()
    }
}

/// One labeled time series within a query result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Series {
    /// Unique key/value pairs identifying this series within its query.
    pub labels: HashMap<String, String>,
    /// Ordered list of single-key label maps, used for deterministic
    /// per-label iteration when pivoting into tables.
    #[serde(rename = "labelsArray")]
    pub labels_array: Vec<HashMap<String, String>>,
    /// Points in ascending timestamp order, no duplicate timestamps.
    pub points: Vec<Point>,
}

impl Series {
    /// Creates an empty series with the given labels.
    ///
    /// The labels array is derived in ascending key order so that pivoting
    /// is deterministic regardless of map iteration order.
    #[must_use]
    pub fn new(labels: HashMap<String, String>) -> Self {
        let mut keys: Vec<&String> = labels.keys().collect();
        keys.sort();
        let labels_array = keys
            .into_iter()
            .map(|k| {
                let mut m = HashMap::new();
                if let Some(v) = labels.get(k) {
                    m.insert(k.clone(), v.clone());
                }
                m
            })
            .collect();
        Self {
            labels,
            labels_array,
            points: Vec::new(),
        }
    }

    /// Adds a label to this series and returns self for chaining.
    ///
    /// Rebuilds the labels array to keep it consistent with the label map.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        let points = std::mem::take(&mut self.points);
        let mut rebuilt = Self::new(std::mem::take(&mut self.labels));
        rebuilt.points = points;
        rebuilt
    }

    /// Adds a point to this series and returns self for chaining.
    #[must_use]
    pub fn point(mut self, timestamp: i64, value: f64) -> Self {
        self.points.push(Point::new(timestamp, value));
        self
    }

    /// Returns true when this series' labels contain every pair in `subset`.
    #[must_use]
    pub fn labels_contain(&self, subset: &HashMap<String, String>) -> bool {
        subset
            .iter()
            .all(|(k, v)| self.labels.get(k).is_some_and(|have| have == v))
    }
}

/// The result of one named query or formula.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// The query or formula name this result belongs to.
    #[serde(rename = "queryName")]
    pub query_name: String,
    /// All series produced for this query.
    pub series: Vec<Series>,
    /// Pivoted tabular form, present only for table panels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,
}

impl QueryResult {
    /// Creates an empty result for the given query name.
    #[must_use]
    pub fn new(query_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            series: Vec::new(),
            table: None,
        }
    }

    /// Adds a series and returns self for chaining.
    #[must_use]
    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }
}

/// A validated metric name.
///
/// Metric names must:
/// - Be non-empty
/// - Contain only alphanumeric characters, underscores, dots, and colons
/// - Start with a letter or underscore
/// - Be at most 256 characters long
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricName(String);

impl MetricName {
    /// Maximum allowed length for a metric name.
    pub const MAX_LENGTH: usize = 256;

    /// Creates a new validated metric name.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvalidMetricName` if the name is invalid.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(ModelError::InvalidMetricName {
                reason: "metric name cannot be empty".to_string(),
            });
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(ModelError::InvalidMetricName {
                reason: format!(
                    "metric name exceeds maximum length of {} characters",
                    Self::MAX_LENGTH
                ),
            });
        }

        if let Some(c) = name.chars().next() {
            if !c.is_ascii_alphabetic() && c != '_' {
                return Err(ModelError::InvalidMetricName {
                    reason: "metric name must start with a letter or underscore".to_string(),
                });
            }
        }

        for c in name.chars() {
            if !c.is_ascii_alphanumeric() && c != '_' && c != ':' && c != '.' {
                return Err(ModelError::InvalidMetricName {
                    reason: format!("invalid character '{c}' in metric name"),
                });
            }
        }

        Ok(Self(name))
    }

    /// Returns the metric name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `MetricName` and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for MetricName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The request window for a composite query.
///
/// Both bounds are Unix timestamps in milliseconds; start is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in milliseconds.
    pub start: i64,
    /// End timestamp (inclusive), in milliseconds.
    pub end: i64,
}

impl TimeRange {
    /// Creates a new time range.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvalidTimeRange` if start > end.
    pub const fn new(start: i64, end: i64) -> Result<Self> {
        if start > end {
            return Err(ModelError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Returns the duration of this range in milliseconds.
    #[must_use]
    pub const fn duration_millis(&self) -> i64 {
        self.end - self.start
    }

    /// Checks if a timestamp falls within this range (inclusive).
    #[must_use]
    pub const fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}
