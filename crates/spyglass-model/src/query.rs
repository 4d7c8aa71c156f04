//! The aggregation contract for named queries.
//!
//! This module provides the request-side types of the engine:
//! - [`BuilderQuery`]: the aggregation contract for one named query
//! - [`CompositeQuery`]: all named queries of one request plus panel settings
//! - [`TimeAggregation`] / [`SpaceAggregation`]: the temporal and spatial
//!   reducers the compiler synthesizes SQL for
//! - [`FilterItem`], [`Having`], [`OrderBy`]: the filter, predicate, and
//!   ordering clauses carried by a query

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Synthetic order-by column resolving to the aggregated value of a series.
pub const ORDER_BY_VALUE: &str = "__value";

/// The telemetry signal a query draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Metric samples from the columnar store.
    Metrics,
    /// Log records.
    Logs,
    /// Trace spans.
    Traces,
}

/// Whether a metric's raw values are cumulative or already per-interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Temporality {
    /// Ever-increasing counter; deltas must be derived.
    Cumulative,
    /// Already a per-interval amount.
    Delta,
    /// Temporality not recorded; treated as cumulative for filtering.
    #[default]
    Unspecified,
}

/// The per-series reducer applied within one time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAggregation {
    /// Average of samples in the bucket.
    Avg,
    /// Sum of samples in the bucket.
    Sum,
    /// Minimum sample in the bucket.
    Min,
    /// Maximum sample in the bucket.
    Max,
    /// Number of samples in the bucket.
    Count,
    /// Number of distinct sample values in the bucket.
    CountDistinct,
    /// Last sample in the bucket.
    AnyLast,
    /// Per-second delta between consecutive buckets, reset-aware.
    Rate,
    /// Absolute delta between consecutive buckets, reset-aware.
    Increase,
}

impl TimeAggregation {
    /// Returns true when a missing value can default to zero in formula
    /// joins.
    ///
    /// Aggregations with a natural zero (counts, sums, rates) can treat an
    /// absent bucket as "nothing happened"; avg/min/max/any-last cannot,
    /// because zero is a real value there, not an identity.
    #[must_use]
    pub const fn can_default_zero(&self) -> bool {
        matches!(
            self,
            Self::Sum | Self::Count | Self::CountDistinct | Self::Rate | Self::Increase
        )
    }
}

/// The cross-series reducer applied across series sharing a group-by set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceAggregation {
    /// Average across series.
    Avg,
    /// Sum across series.
    Sum,
    /// Minimum across series.
    Min,
    /// Maximum across series.
    Max,
    /// Number of contributing series values.
    Count,
}

/// Filter operators supported by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Exact equality.
    #[serde(rename = "=")]
    Equal,
    /// Exact inequality.
    #[serde(rename = "!=")]
    NotEqual,
    /// Numeric greater-than.
    #[serde(rename = ">")]
    GreaterThan,
    /// Numeric greater-or-equal.
    #[serde(rename = ">=")]
    GreaterThanOrEq,
    /// Numeric less-than.
    #[serde(rename = "<")]
    LessThan,
    /// Numeric less-or-equal.
    #[serde(rename = "<=")]
    LessThanOrEq,
    /// Membership in a value list.
    #[serde(rename = "in")]
    In,
    /// Non-membership in a value list.
    #[serde(rename = "nin")]
    NotIn,
    /// SQL LIKE pattern match.
    #[serde(rename = "like")]
    Like,
    /// Negated SQL LIKE pattern match.
    #[serde(rename = "nlike")]
    NotLike,
    /// Substring containment.
    #[serde(rename = "contains")]
    Contains,
    /// Negated substring containment.
    #[serde(rename = "ncontains")]
    NotContains,
    /// Regular-expression match.
    #[serde(rename = "regex")]
    Regex,
    /// Negated regular-expression match.
    #[serde(rename = "nregex")]
    NotRegex,
    /// Label key exists on the series.
    #[serde(rename = "exists")]
    Exists,
    /// Label key absent from the series.
    #[serde(rename = "nexists")]
    NotExists,
}

/// A filter value: a single scalar or a list for in/nin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// A string value.
    String(String),
    /// A numeric value.
    Number(f64),
    /// A list of string values for membership operators.
    List(Vec<String>),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// One label filter; filters on a query are AND-joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterItem {
    /// The label key the filter applies to.
    pub key: String,
    /// The comparison operator.
    pub op: FilterOperator,
    /// The comparison value.
    pub value: FilterValue,
}

impl FilterItem {
    /// Creates a new filter item.
    pub fn new(key: impl Into<String>, op: FilterOperator, value: impl Into<FilterValue>) -> Self {
        Self {
            key: key.into(),
            op,
            value: value.into(),
        }
    }
}

/// Operators usable in a having clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HavingOperator {
    /// Exact equality.
    #[serde(rename = "=")]
    Equal,
    /// Exact inequality.
    #[serde(rename = "!=")]
    NotEqual,
    /// Greater-than.
    #[serde(rename = ">")]
    GreaterThan,
    /// Greater-or-equal.
    #[serde(rename = ">=")]
    GreaterThanOrEq,
    /// Less-than.
    #[serde(rename = "<")]
    LessThan,
    /// Less-or-equal.
    #[serde(rename = "<=")]
    LessThanOrEq,
    /// Membership in a value list.
    #[serde(rename = "in")]
    In,
    /// Non-membership in a value list.
    #[serde(rename = "nin")]
    NotIn,
}

/// A having-clause value: one scalar or a list for in/nin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HavingValue {
    /// A single threshold.
    Scalar(f64),
    /// A list of accepted (or rejected) values.
    List(Vec<f64>),
}

impl From<f64> for HavingValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for HavingValue {
    fn from(value: Vec<f64>) -> Self {
        Self::List(value)
    }
}

/// One predicate of a having clause; predicates are AND-joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Having {
    /// The column the predicate applies to; the aggregated value column.
    #[serde(rename = "columnName")]
    pub column_name: String,
    /// The comparison operator.
    pub op: HavingOperator,
    /// The comparison value.
    pub value: HavingValue,
}

impl Having {
    /// Creates a having predicate against the value column.
    pub fn new(op: HavingOperator, value: impl Into<HavingValue>) -> Self {
        Self {
            column_name: "value".to_string(),
            op,
            value: value.into(),
        }
    }

    /// Evaluates this predicate against an aggregated point value.
    ///
    /// Float equality is exact; the dashboard contract compares the literal
    /// aggregated value, not an epsilon neighborhood. List values apply to
    /// the membership operators; a scalar paired with in/nin behaves as a
    /// one-element list.
    #[must_use]
    pub fn matches(&self, value: f64) -> bool {
        match (&self.op, &self.value) {
            (HavingOperator::Equal, HavingValue::Scalar(v)) => value == *v,
            (HavingOperator::NotEqual, HavingValue::Scalar(v)) => value != *v,
            (HavingOperator::GreaterThan, HavingValue::Scalar(v)) => value > *v,
            (HavingOperator::GreaterThanOrEq, HavingValue::Scalar(v)) => value >= *v,
            (HavingOperator::LessThan, HavingValue::Scalar(v)) => value < *v,
            (HavingOperator::LessThanOrEq, HavingValue::Scalar(v)) => value <= *v,
            (HavingOperator::In, HavingValue::List(vs)) => vs.iter().any(|v| value == *v),
            (HavingOperator::NotIn, HavingValue::List(vs)) => vs.iter().all(|v| value != *v),
            (HavingOperator::In, HavingValue::Scalar(v)) => value == *v,
            (HavingOperator::NotIn, HavingValue::Scalar(v)) => value != *v,
            // Comparison against a list degrades to rejecting the point.
            (_, HavingValue::List(_)) => false,
        }
    }
}

/// Sort direction for an order-by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// One ordering key of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// A label column name, or [`ORDER_BY_VALUE`] for the value column.
    #[serde(rename = "columnName")]
    pub column_name: String,
    /// The sort direction.
    pub order: SortOrder,
}

impl OrderBy {
    /// Creates an ordering key.
    pub fn new(column_name: impl Into<String>, order: SortOrder) -> Self {
        Self {
            column_name: column_name.into(),
            order,
        }
    }

    /// The default ordering when a query declares none: value, descending.
    #[must_use]
    pub fn default_value_desc() -> Self {
        Self::new(ORDER_BY_VALUE, SortOrder::Desc)
    }
}

/// The scalar-collapse function for table/value panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceTo {
    /// The final point of the series.
    Last,
    /// Sum of all points.
    Sum,
    /// Mean of all points.
    Avg,
    /// Minimum point value.
    Min,
    /// Maximum point value.
    Max,
}

/// The metric attribute a query aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateAttribute {
    /// The metric name.
    pub key: String,
    /// The recorded metric type, when known (e.g. `Sum`, `Gauge`).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub attribute_type: Option<String>,
}

impl AggregateAttribute {
    /// Creates an attribute for the given metric name.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attribute_type: None,
        }
    }
}

/// One group-by attribute key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeKey {
    /// The label key to group on.
    pub key: String,
}

impl AttributeKey {
    /// Creates a group-by key.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// The aggregation contract for one named query.
///
/// A query whose `expression` equals its `query_name` is a raw query
/// compiled to SQL; any other expression marks the query as a formula
/// evaluated over its sibling queries' results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderQuery {
    /// The name this query's result is published under.
    pub query_name: String,
    /// The telemetry signal queried.
    pub data_source: DataSource,
    /// The metric attribute aggregated.
    pub aggregate_attribute: AggregateAttribute,
    /// Counter temporality of the metric.
    pub temporality: Temporality,
    /// The per-series, per-bucket reducer.
    pub time_aggregation: TimeAggregation,
    /// The cross-series reducer.
    pub space_aggregation: SpaceAggregation,
    /// Label filters, AND-joined.
    pub filters: Vec<FilterItem>,
    /// Ordered group-by attribute keys.
    pub group_by: Vec<AttributeKey>,
    /// The query expression; equals `query_name` unless this is a formula.
    pub expression: String,
    /// Disabled queries are computed but stripped from the response.
    pub disabled: bool,
    /// Post-aggregation value predicates.
    pub having: Vec<Having>,
    /// Maximum number of series to return; 0 means unlimited.
    pub limit: usize,
    /// Ordering keys for limit and table sorting.
    pub order_by: Vec<OrderBy>,
    /// Scalar-collapse function for table/value panels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_to: Option<ReduceTo>,
    /// Aggregation step width in seconds.
    pub step_interval: i64,
}

impl BuilderQuery {
    /// Creates a metrics query with the given name and metric, defaulting to
    /// sum time aggregation and sum space aggregation over 60-second steps.
    pub fn new(query_name: impl Into<String>, metric: impl Into<String>) -> Self {
        let query_name = query_name.into();
        Self {
            expression: query_name.clone(),
            query_name,
            data_source: DataSource::Metrics,
            aggregate_attribute: AggregateAttribute::new(metric),
            temporality: Temporality::Unspecified,
            time_aggregation: TimeAggregation::Sum,
            space_aggregation: SpaceAggregation::Sum,
            filters: Vec::new(),
            group_by: Vec::new(),
            disabled: false,
            having: Vec::new(),
            limit: 0,
            order_by: Vec::new(),
            reduce_to: None,
            step_interval: 60,
        }
    }

    /// Creates a formula query evaluating `expression` over sibling queries.
    pub fn formula(query_name: impl Into<String>, expression: impl Into<String>) -> Self {
        let mut query = Self::new(query_name, "");
        query.expression = expression.into();
        query
    }

    /// Sets the time aggregation and returns self for chaining.
    #[must_use]
    pub const fn time_aggregation(mut self, agg: TimeAggregation) -> Self {
        self.time_aggregation = agg;
        self
    }

    /// Sets the space aggregation and returns self for chaining.
    #[must_use]
    pub const fn space_aggregation(mut self, agg: SpaceAggregation) -> Self {
        self.space_aggregation = agg;
        self
    }

    /// Sets the temporality and returns self for chaining.
    #[must_use]
    pub const fn temporality(mut self, temporality: Temporality) -> Self {
        self.temporality = temporality;
        self
    }

    /// Adds a filter and returns self for chaining.
    #[must_use]
    pub fn filter(mut self, item: FilterItem) -> Self {
        self.filters.push(item);
        self
    }

    /// Adds a group-by key and returns self for chaining.
    #[must_use]
    pub fn group_by(mut self, key: impl Into<String>) -> Self {
        self.group_by.push(AttributeKey::new(key));
        self
    }

    /// Adds a having predicate and returns self for chaining.
    #[must_use]
    pub fn having(mut self, having: Having) -> Self {
        self.having.push(having);
        self
    }

    /// Sets the series limit and returns self for chaining.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Adds an ordering key and returns self for chaining.
    #[must_use]
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by.push(order_by);
        self
    }

    /// Sets the scalar-collapse function and returns self for chaining.
    #[must_use]
    pub const fn reduce_to(mut self, reduce_to: ReduceTo) -> Self {
        self.reduce_to = Some(reduce_to);
        self
    }

    /// Sets the step interval in seconds and returns self for chaining.
    #[must_use]
    pub const fn step(mut self, seconds: i64) -> Self {
        self.step_interval = seconds;
        self
    }

    /// Marks the query disabled and returns self for chaining.
    #[must_use]
    pub const fn disable(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Returns true when this query is a formula over sibling queries.
    #[must_use]
    pub fn is_formula(&self) -> bool {
        self.expression != self.query_name
    }

    /// Returns true when a missing value can default to zero in formula
    /// joins. See [`TimeAggregation::can_default_zero`].
    #[must_use]
    pub const fn can_default_zero(&self) -> bool {
        self.time_aggregation.can_default_zero()
    }

    /// Validates this query's own configuration.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvalidStepInterval` if the step is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.step_interval <= 0 {
            return Err(ModelError::InvalidStepInterval {
                query_name: self.query_name.clone(),
                step: self.step_interval,
            });
        }
        Ok(())
    }
}

/// The panel shape a request renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelType {
    /// A time-series graph.
    Graph,
    /// A pivoted table.
    Table,
    /// A single value.
    Value,
    /// A raw list.
    List,
}

/// How a request's queries are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Declarative builder queries; the pipeline stages gate on this.
    Builder,
    /// Raw ClickHouse SQL supplied by the caller.
    ClickHouse,
    /// PromQL supplied by the caller.
    PromQl,
}

/// All named queries of one request plus panel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeQuery {
    /// Named queries, ordered by name for deterministic output.
    pub queries: BTreeMap<String, BuilderQuery>,
    /// The panel shape requested.
    pub panel_type: PanelType,
    /// How the queries are expressed.
    pub query_type: QueryType,
    /// Whether graph panels should have missing buckets zero-filled.
    pub fill_gaps: bool,
}

impl CompositeQuery {
    /// Creates an empty composite query for the given panel type.
    #[must_use]
    pub const fn new(panel_type: PanelType) -> Self {
        Self {
            queries: BTreeMap::new(),
            panel_type,
            query_type: QueryType::Builder,
            fill_gaps: false,
        }
    }

    /// Adds a query under its own name and returns self for chaining.
    #[must_use]
    pub fn query(mut self, query: BuilderQuery) -> Self {
        self.queries.insert(query.query_name.clone(), query);
        self
    }

    /// Enables gap filling and returns self for chaining.
    #[must_use]
    pub const fn with_fill_gaps(mut self) -> Self {
        self.fill_gaps = true;
        self
    }

    /// Returns the query registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BuilderQuery> {
        self.queries.get(name)
    }

    /// Validates the composite query.
    ///
    /// Each query's own configuration must be valid, and every variable a
    /// formula references must name a sibling query. Violations are
    /// configuration errors surfaced before compilation, never silently
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::EmptyCompositeQuery` when no queries are present,
    /// or the first per-query / formula-variable error encountered.
    pub fn validate(&self) -> Result<()> {
        if self.queries.is_empty() {
            return Err(ModelError::EmptyCompositeQuery);
        }
        for (name, query) in &self.queries {
            query.validate()?;
            if !query.is_formula() {
                continue;
            }
            for variable in expression_variables(&query.expression) {
                if !self.queries.contains_key(&variable) {
                    return Err(ModelError::UnknownFormulaVariable {
                        formula: name.clone(),
                        variable,
                    });
                }
            }
        }
        Ok(())
    }
}

/// One full query-range request: the window plus the composite query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRangeParams {
    /// Window start, epoch milliseconds (inclusive).
    pub start: i64,
    /// Window end, epoch milliseconds (inclusive).
    pub end: i64,
    /// The named queries and panel settings.
    pub composite_query: CompositeQuery,
    /// Whether table panels should be pivoted into the web table shape.
    pub format_for_web: bool,
}

impl QueryRangeParams {
    /// Creates request parameters over the given window.
    #[must_use]
    pub const fn new(start: i64, end: i64, composite_query: CompositeQuery) -> Self {
        Self {
            start,
            end,
            composite_query,
            format_for_web: false,
        }
    }

    /// Requests the web table shape and returns self for chaining.
    #[must_use]
    pub const fn for_web(mut self) -> Self {
        self.format_for_web = true;
        self
    }

    /// Validates the window and the composite query.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvalidTimeRange` for an inverted window, or any
    /// error from [`CompositeQuery::validate`].
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(ModelError::InvalidTimeRange {
                start: self.start,
                end: self.end,
            });
        }
        self.composite_query.validate()
    }
}

/// Extracts the variable names referenced by a formula expression.
///
/// A lexical scan sufficient for validation and step resolution: an
/// identifier is a variable unless its next non-space character is an
/// opening parenthesis, which marks it as a function call. Duplicates are
/// removed, first occurrence order is kept.
#[must_use]
pub fn expression_variables(expression: &str) -> Vec<String> {
    let chars: Vec<char> = expression.chars().collect();
    let mut variables: Vec<String> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let is_call = j < chars.len() && chars[j] == '(';
            if !is_call && !variables.contains(&ident) {
                variables.push(ident);
            }
        } else {
            i += 1;
        }
    }
    variables
}
