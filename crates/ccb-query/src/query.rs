//! Backend query object
//!
//! Mirrors the analytics API's query DSL. Fields use `snake_case` on the wire
//! and optional fields are omitted rather than sent as `null`. Queries built
//! by chart code may carry keys this model does not know; they are kept in
//! the `extra` maps so nothing is lost on the way to the backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default row limit for locally built queries
pub const DEFAULT_LIMIT: u64 = 60_000;

/// A single backend query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Grouping columns
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    /// Aggregated columns
    #[serde(default)]
    pub measures: Vec<Measure>,
    /// Ordering clauses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<Value>>,
    /// Row limit
    #[serde(default)]
    pub limit: QueryLimit,
    /// Locale and timezone
    #[serde(default)]
    pub options: QueryOptions,
    /// Row filters
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Value>>,
    /// Aggregate filters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having: Option<Vec<Value>>,
    /// Unmodelled keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Query {
    /// Empty query with the default limit and options
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimensions: Vec::new(),
            measures: Vec::new(),
            order: None,
            limit: QueryLimit::default(),
            options: QueryOptions::default(),
            filters: None,
            having: None,
            extra: Map::new(),
        }
    }

    /// With row limit
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, by: u64) -> Self {
        self.limit = QueryLimit::by(by);
        self
    }

    /// With options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether the query selects nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty() && self.measures.is_empty()
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

/// Grouping column
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimension {
    /// Dataset id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    /// Column id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    /// Hierarchy / datetime level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Ad-hoc expression (datetime parts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Numeric binning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discretization: Option<Value>,
    /// Formula reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_id: Option<String>,
    /// Unmodelled keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Dimension {
    /// Dimension over a dataset column
    #[must_use]
    pub fn column(dataset_id: impl Into<String>, column_id: impl Into<String>) -> Self {
        Self {
            dataset_id: Some(dataset_id.into()),
            column_id: Some(column_id.into()),
            ..Self::default()
        }
    }

    /// With level
    #[inline]
    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }
}

/// Aggregated column
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Measure {
    /// Dataset id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    /// Column id (`*` for row counts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    /// Aggregation, backend default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    /// Formula reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_id: Option<String>,
    /// Unmodelled keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Measure {
    /// Measure over a dataset column
    #[must_use]
    pub fn column(dataset_id: impl Into<String>, column_id: impl Into<String>) -> Self {
        Self {
            dataset_id: Some(dataset_id.into()),
            column_id: Some(column_id.into()),
            ..Self::default()
        }
    }

    /// With aggregation type
    #[inline]
    #[must_use]
    pub fn with_aggregation(mut self, aggregation: impl Into<String>) -> Self {
        self.aggregation = Some(Aggregation::new(aggregation));
        self
    }
}

/// Aggregation applied to a measure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Aggregation type (`sum`, `average`, ...)
    #[serde(rename = "type")]
    pub aggregation_type: String,
    /// Weight column and other parameters
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Aggregation {
    /// Aggregation of the given type
    #[must_use]
    pub fn new(aggregation_type: impl Into<String>) -> Self {
        Self {
            aggregation_type: aggregation_type.into(),
            extra: Map::new(),
        }
    }
}

/// Row limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimit {
    /// Maximum rows
    pub by: u64,
    /// Rows to skip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl QueryLimit {
    /// Limit without offset
    #[inline]
    #[must_use]
    pub fn by(by: u64) -> Self {
        Self { by, offset: None }
    }
}

impl Default for QueryLimit {
    fn default() -> Self {
        Self::by(DEFAULT_LIMIT)
    }
}

/// Query locale and timezone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Locale for labels and formatting
    pub locale_id: String,
    /// Timezone for datetime bucketing
    pub timezone_id: String,
    /// Unmodelled keys (rollup flags, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryOptions {
    /// Options with locale and timezone
    #[must_use]
    pub fn new(locale_id: impl Into<String>, timezone_id: impl Into<String>) -> Self {
        Self {
            locale_id: locale_id.into(),
            timezone_id: timezone_id.into(),
            extra: Map::new(),
        }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new("en", "UTC")
    }
}
