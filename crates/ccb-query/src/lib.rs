//! CCB Query - backend query model and local query construction
//!
//! - [`Query`] and its parts, matching the analytics API's query DSL
//! - [`is_ready`], the predicate gating every backend call
//! - [`LocalQueryBuilder`], the host-side fallback used when the chart code
//!   does not build its own query

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod local;
pub mod query;
pub mod readiness;

pub use error::QueryPrepError;
pub use local::{build_query, LocalQueryBuilder};
pub use query::{Aggregation, Dimension, Measure, Query, QueryLimit, QueryOptions, DEFAULT_LIMIT};
pub use readiness::{has_any_content, is_ready, missing_required};
