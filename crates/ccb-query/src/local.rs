//! Host-side fallback query builder
//!
//! Used when the chart code does not build its own query, when the sandbox
//! round-trip times out, or when the chart answers `queryLoaded` with no
//! query. Each column of a `numeric` slot becomes a measure; every other
//! column becomes a dimension. Slots are visited in config order.

use crate::error::QueryPrepError;
use crate::query::{Dimension, Measure, Query, QueryLimit, QueryOptions, DEFAULT_LIMIT};
use ccb_slots::{ColumnRef, Slot, SlotConfig};

/// Local query builder settings
#[derive(Debug, Clone, PartialEq)]
pub struct LocalQueryBuilder {
    limit: QueryLimit,
    options: QueryOptions,
}

impl LocalQueryBuilder {
    /// Builder with the default limit and `en` / `UTC` options
    #[must_use]
    pub fn new() -> Self {
        Self {
            limit: QueryLimit::by(DEFAULT_LIMIT),
            options: QueryOptions::default(),
        }
    }

    /// With row limit
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: QueryLimit) -> Self {
        self.limit = limit;
        self
    }

    /// With locale and timezone
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a query from slot contents
    ///
    /// Slots without a config are skipped. Aggregation and level are only
    /// emitted when the column carries one.
    ///
    /// # Errors
    /// [`QueryPrepError::MissingColumnId`] / [`QueryPrepError::MissingDatasetId`]
    /// when a placed column lacks its backend identity.
    pub fn build(&self, slots: &[Slot], configs: &[SlotConfig]) -> Result<Query, QueryPrepError> {
        let mut query = Query::new().with_options(self.options.clone());
        query.limit = self.limit;

        for config in configs {
            let Some(slot) = slots.iter().find(|s| s.name == config.name) else {
                continue;
            };

            for column in &slot.content {
                check_identity(&slot.name, column)?;
                if config.slot_type.is_numeric() {
                    let mut measure = Measure::column(&column.dataset_id, &column.column_id);
                    if let Some(aggregation) = &column.aggregation_func {
                        measure = measure.with_aggregation(aggregation.as_str());
                    }
                    query.measures.push(measure);
                } else {
                    let mut dimension = Dimension::column(&column.dataset_id, &column.column_id);
                    if let Some(level) = column.level {
                        dimension = dimension.with_level(level);
                    }
                    query.dimensions.push(dimension);
                }
            }
        }

        tracing::trace!(
            dimensions = query.dimensions.len(),
            measures = query.measures.len(),
            "local query built"
        );
        Ok(query)
    }
}

impl Default for LocalQueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a query with the default builder settings
///
/// # Errors
/// See [`LocalQueryBuilder::build`].
pub fn build_query(slots: &[Slot], configs: &[SlotConfig]) -> Result<Query, QueryPrepError> {
    LocalQueryBuilder::new().build(slots, configs)
}

fn check_identity(slot: &str, column: &ColumnRef) -> Result<(), QueryPrepError> {
    if column.column_id.is_empty() {
        return Err(QueryPrepError::MissingColumnId {
            slot: slot.to_string(),
        });
    }
    if column.dataset_id.is_empty() {
        return Err(QueryPrepError::MissingDatasetId {
            slot: slot.to_string(),
            column_id: column.column_id.clone(),
        });
    }
    Ok(())
}
