//! Data fetch and result classification
//!
//! Failures never propagate: every path yields a [`FetchOutcome`] whose data
//! is the empty result when anything went wrong, with a user-facing message.

use crate::api::{calculate_query_duration, DatasetApi, QueryResult};
use crate::error::ApiError;
use ccb_query::Query;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Shown when no query could be derived from the slots
pub const PREPARE_FAILED_MESSAGE: &str = "Failed to prepare query. Please check your configuration.";

/// Lead line of the message shown when the data request fails
pub const LOAD_FAILED_MESSAGE: &str =
    "Failed to load chart data. Please check if your query is valid and try again.";

/// Size and timing of a successful query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultInfo {
    /// Number of result rows
    pub row_count: usize,
    /// Backend duration in seconds
    pub duration_in_seconds: f64,
}

/// Data plus status produced by one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Rows to render, `[]` on failure
    pub data: Value,
    /// Present only on success
    pub result_info: Option<QueryResultInfo>,
    /// User-facing error, if any
    pub error: Option<String>,
}

impl FetchOutcome {
    /// Empty result with no error (slots not ready)
    #[must_use]
    pub fn empty() -> Self {
        Self {
            data: Value::Array(Vec::new()),
            result_info: None,
            error: None,
        }
    }

    /// Empty result carrying an error message
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty()
        }
    }

    /// Query could not be prepared
    #[must_use]
    pub fn prepare_failed() -> Self {
        Self::failed(PREPARE_FAILED_MESSAGE)
    }

    /// Successful backend response
    #[must_use]
    pub fn from_result(result: QueryResult) -> Self {
        let duration = result
            .performance
            .as_ref()
            .map_or(0.0, calculate_query_duration);
        Self {
            result_info: Some(QueryResultInfo {
                row_count: result.data.len(),
                duration_in_seconds: duration,
            }),
            data: Value::Array(result.data),
            error: None,
        }
    }

    /// Whether this outcome carries an error
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Message for a request that produced no usable response
#[must_use]
pub fn load_failed_message(query: &Query) -> String {
    let echoed = serde_json::to_string_pretty(query).unwrap_or_default();
    format!("{LOAD_FAILED_MESSAGE}\nQuery: {echoed}")
}

/// Run `query` against the backend, bounded by `timeout`
pub async fn fetch_data(api: &dyn DatasetApi, query: &Query, timeout: Duration) -> FetchOutcome {
    let result = match tokio::time::timeout(timeout, api.query_dataset(query)).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout),
    };

    match result {
        Ok(result) => {
            let outcome = FetchOutcome::from_result(result);
            tracing::info!(
                rows = outcome.result_info.map_or(0, |i| i.row_count),
                "query result received"
            );
            outcome
        }
        Err(ApiError::Backend(message)) => {
            tracing::warn!(%message, "query rejected by backend");
            FetchOutcome::failed(message)
        }
        Err(e) => {
            tracing::error!(error = %e, "chart data query failed");
            FetchOutcome::failed(load_failed_message(query))
        }
    }
}
