//! Dataset catalog
//!
//! Turns backend columns into droppable [`ColumnRef`]s and caches them per
//! dataset.

use crate::api::{ApiColumn, DatasetApi, DatasetDetail, DatasetSummary};
use crate::error::ApiError;
use ccb_slots::ColumnRef;
use moka::future::Cache;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Default number of datasets whose columns are kept
pub const DEFAULT_CACHE_CAPACITY: u64 = 64;

/// Default lifetime of cached columns
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Cached access to datasets and their columns
#[derive(Clone)]
pub struct DatasetCatalog {
    api: Arc<dyn DatasetApi>,
    columns: Cache<String, Arc<[ColumnRef]>>,
}

impl std::fmt::Debug for DatasetCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetCatalog")
            .field("cached", &self.columns.entry_count())
            .finish_non_exhaustive()
    }
}

impl DatasetCatalog {
    /// Catalog with default cache settings
    #[must_use]
    pub fn new(api: Arc<dyn DatasetApi>) -> Self {
        Self::with_ttl(api, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }

    /// Catalog with explicit cache capacity and lifetime
    #[must_use]
    pub fn with_ttl(api: Arc<dyn DatasetApi>, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            api,
            columns: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Datasets owned by the caller, newest first
    ///
    /// # Errors
    /// [`ApiError`] from the backend.
    pub async fn datasets(&self) -> Result<Vec<DatasetSummary>, ApiError> {
        Ok(self.api.load_all_datasets().await?.rows)
    }

    /// Droppable columns of a dataset
    ///
    /// Unknown datasets yield no columns and are not cached.
    ///
    /// # Errors
    /// [`ApiError`] from the backend.
    pub async fn columns(&self, dataset_id: &str) -> Result<Arc<[ColumnRef]>, ApiError> {
        if let Some(cached) = self.columns.get(dataset_id).await {
            return Ok(cached);
        }

        let Some(dataset) = self.api.load_dataset_with_columns(dataset_id).await? else {
            tracing::warn!(dataset_id, "dataset not found");
            return Ok(Arc::from(Vec::new()));
        };
        let columns: Arc<[ColumnRef]> = transform_columns(&dataset).into();
        tracing::debug!(dataset_id, columns = columns.len(), "dataset columns loaded");
        self.columns
            .insert(dataset_id.to_string(), Arc::clone(&columns))
            .await;
        Ok(columns)
    }

    /// Drop the cached columns of a dataset
    pub async fn invalidate(&self, dataset_id: &str) {
        self.columns.invalidate(dataset_id).await;
    }
}

/// Column references for every column of `dataset`, in backend order
#[must_use]
pub fn transform_columns(dataset: &DatasetDetail) -> Vec<ColumnRef> {
    dataset
        .columns
        .iter()
        .map(|column| column_ref(&dataset.id, column))
        .collect()
}

fn column_ref(dataset_id: &str, column: &ApiColumn) -> ColumnRef {
    let mut column_ref = ColumnRef::new(dataset_id, &column.id).with_type(&column.column_type);
    column_ref.subtype.clone_from(&column.subtype);
    column_ref.format.clone_from(&column.format);
    column_ref.level = column.level;
    column_ref.lowest_level = column.lowest_level;
    column_ref.currency = column.currency.as_ref().map(|c| c.symbol.clone());
    column_ref.label = Some(column.name.clone());

    let levels = column
        .hierarchy_levels
        .iter()
        .map(|level| json!({ "id": level.id, "level": level.level, "name": level.name }))
        .collect::<Vec<_>>();

    let extra = &mut column_ref.extra;
    extra.insert("column".to_string(), Value::String(column.id.clone()));
    extra.insert("set".to_string(), Value::String(dataset_id.to_string()));
    extra.insert("name".to_string(), column.name.clone());
    extra.insert("hierarchyLevels".to_string(), Value::Array(levels));
    if let Some(description) = &column.description {
        extra.insert("description".to_string(), description.clone());
    }
    column_ref
}

/// Columns whose label matches `term` in any language
///
/// Matching is case-insensitive on the trimmed term; an empty term keeps
/// everything, as do columns whose label is not a language map.
#[must_use]
pub fn filter_columns<'a>(columns: &'a [ColumnRef], term: &str) -> Vec<&'a ColumnRef> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return columns.iter().collect();
    }

    columns
        .iter()
        .filter(|column| match &column.label {
            Some(Value::Object(translations)) => translations.values().any(|value| {
                let text = match value {
                    Value::String(s) => s.to_lowercase(),
                    Value::Null => return false,
                    other => other.to_string().to_lowercase(),
                };
                text.contains(&term)
            }),
            _ => true,
        })
        .collect()
}
