//! Result post-processing for the Spyglass metrics engine.
//!
//! `spyglass-pipeline` takes the raw series the store returned for each
//! named query and shapes them into what the panel renders. The stages run
//! in a fixed order driven by the request parameters:
//!
//! - **having** filters points against the query's predicates
//! - **limit** orders series and keeps the top N
//! - **reduce** collapses each series to one scalar for table and value
//!   panels
//! - **formula** joins the referenced results by label set and evaluates
//!   the arithmetic expression per timestamp
//! - **gap filling** reindexes graph series onto the step grid with zeroes
//! - **table** flattens results into rows, and optionally pivots every
//!   query into the single merged table the web UI consumes
//!
//! [`postprocess`] wires the stages together; each stage is also usable on
//! its own.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use spyglass_model::{
//!     BuilderQuery, CompositeQuery, PanelType, QueryRangeParams, QueryResult, Series,
//! };
//! use spyglass_pipeline::postprocess;
//!
//! let composite = CompositeQuery::new(PanelType::Graph)
//!     .query(BuilderQuery::new("A", "http_requests_total"))
//!     .query(BuilderQuery::formula("F1", "A * 2"));
//! let params = QueryRangeParams::new(0, 120_000, composite);
//!
//! let results = vec![QueryResult::new("A").with_series(
//!     Series::new(HashMap::new())
//!         .label("service", "api")
//!         .point(60_000, 4.0),
//! )];
//!
//! let results = postprocess(results, &params).unwrap();
//! assert_eq!(results.len(), 2);
//! assert_eq!(results[1].query_name, "F1");
//! assert!((results[1].series[0].points[0].value - 8.0).abs() < f64::EPSILON);
//! ```

#![doc(html_root_url = "https://docs.rs/spyglass-pipeline/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod expr;
pub mod formula;
pub mod functions;
pub mod gapfill;
pub mod having;
pub mod limit;
pub mod postprocess;
pub mod reduce;
pub mod table;

// Re-export main entry points at crate root
pub use error::{PipelineError, Result};
pub use formula::evaluate as evaluate_formula;
pub use gapfill::fill_gaps;
pub use having::apply_having;
pub use limit::apply_limit;
pub use postprocess::{postprocess, postprocess_with, FunctionsHook};
pub use reduce::reduce_result;
pub use table::{flatten_each_query, pivot_for_web};
