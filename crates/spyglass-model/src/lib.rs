//! Data model for the Spyglass metrics query engine.
//!
//! `spyglass-model` carries the shapes shared by the query compiler and the
//! post-processing pipeline:
//!
//! - **Results**: [`Point`], [`Series`], [`QueryResult`], and the pivoted
//!   [`Table`] form for table panels
//! - **Requests**: [`BuilderQuery`], [`CompositeQuery`], and
//!   [`QueryRangeParams`], the declarative aggregation contract a dashboard
//!   submits
//! - **Validation**: metric names, time ranges, and the formula-variable
//!   check that rejects a formula referencing an unknown sibling query
//!
//! # Example
//!
//! ```rust
//! use spyglass_model::{
//!     BuilderQuery, CompositeQuery, PanelType, QueryRangeParams, TimeAggregation,
//! };
//!
//! let composite = CompositeQuery::new(PanelType::Graph)
//!     .query(
//!         BuilderQuery::new("A", "http_requests_total")
//!             .time_aggregation(TimeAggregation::Rate)
//!             .group_by("service"),
//!     )
//!     .query(BuilderQuery::formula("F1", "A * 60"));
//!
//! let params = QueryRangeParams::new(1_700_000_000_000, 1_700_003_600_000, composite);
//! params.validate().unwrap();
//! ```

#![doc(html_root_url = "https://docs.rs/spyglass-model/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod query;
pub mod table;
pub mod types;

// Re-export main types at crate root
pub use error::{ModelError, Result};
pub use query::{
    expression_variables, AggregateAttribute, AttributeKey, BuilderQuery, CompositeQuery,
    DataSource, FilterItem, FilterOperator, FilterValue, Having, HavingOperator, HavingValue,
    OrderBy, PanelType, QueryRangeParams, QueryType, ReduceTo, SortOrder, SpaceAggregation,
    Temporality, TimeAggregation, ORDER_BY_VALUE,
};
pub use table::{ColumnDescriptor, Table, TableCell, TableRow, NOT_AVAILABLE};
pub use types::{MetricName, Point, QueryResult, Series, TimeRange};
