//! Testing utilities for CCB workspace
//!
//! Shared fakes and fixtures for session-level tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use ccb_bridge::{
    BundleSource, HeadlessContainer, HeadlessFrame, HostError, InboundEvent, SandboxFrame, WindowId,
};
use ccb_core::{ApiError, DatasetApi, DatasetDetail, DatasetSummary, QueryResult, RowsData};
use ccb_query::Query;
use ccb_slots::{ColumnRef, SlotConfig, SlotType};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn manifest_json() -> String {
    json!({
        "name": "bar-chart",
        "slots": [
            { "name": "category", "type": "categorical", "isRequired": true },
            { "name": "measure", "type": "numeric", "isRequired": true },
            { "name": "legend", "type": "categorical" }
        ]
    })
    .to_string()
}

pub fn slot_configs() -> Vec<SlotConfig> {
    vec![
        SlotConfig::new("category", SlotType::Categorical).required(),
        SlotConfig::new("measure", SlotType::Numeric).required(),
        SlotConfig::new("legend", SlotType::Categorical),
    ]
}

pub fn category_column() -> ColumnRef {
    ColumnRef::new("d1", "cat").with_type("hierarchy")
}

pub fn measure_column() -> ColumnRef {
    ColumnRef::new("d1", "m1").with_type("numeric")
}

/// Dataset API answering queries from a script
#[derive(Debug, Default)]
pub struct FakeDatasetApi {
    responses: Mutex<VecDeque<Result<QueryResult, ApiError>>>,
    queries: Mutex<Vec<Query>>,
    delay: Mutex<Option<Duration>>,
    datasets: Mutex<Vec<DatasetSummary>>,
    details: Mutex<Vec<DatasetDetail>>,
}

impl FakeDatasetApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next query; unscripted queries return no rows
    ///
    /// Responses are taken when the query arrives, before any delay.
    pub fn push_response(&self, response: Result<QueryResult, ApiError>) {
        self.responses.lock().push_back(response);
    }

    pub fn push_rows(&self, rows: Value) {
        let rows = match rows {
            Value::Array(rows) => rows,
            other => vec![other],
        };
        self.push_response(Ok(QueryResult::rows(rows)));
    }

    /// Delay every query by `delay` (tokio time)
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn add_dataset(&self, summary: DatasetSummary, detail: DatasetDetail) {
        self.datasets.lock().push(summary);
        self.details.lock().push(detail);
    }

    /// Queries received so far, in order
    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl DatasetApi for FakeDatasetApi {
    async fn load_all_datasets(&self) -> Result<RowsData<DatasetSummary>, ApiError> {
        let rows = self.datasets.lock().clone();
        Ok(RowsData {
            count: rows.len() as u64,
            rows,
        })
    }

    async fn load_dataset_with_columns(&self, dataset_id: &str) -> Result<Option<DatasetDetail>, ApiError> {
        Ok(self.details.lock().iter().find(|d| d.id == dataset_id).cloned())
    }

    async fn query_dataset(&self, query: &Query) -> Result<QueryResult, ApiError> {
        self.queries.lock().push(query.clone());
        let response = self.responses.lock().pop_front();
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response.unwrap_or_else(|| Ok(QueryResult::default()))
    }
}

/// Bundle source serving fixed text
#[derive(Debug, Clone)]
pub struct StaticBundleSource {
    pub script: String,
    pub style: Option<String>,
}

impl StaticBundleSource {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            style: None,
        }
    }
}

impl Default for StaticBundleSource {
    fn default() -> Self {
        Self::new("module.exports = { render() {}, resize() {}, buildQuery() { return null; } };")
    }
}

#[async_trait]
impl BundleSource for StaticBundleSource {
    async fn fetch_script(&self) -> Result<String, HostError> {
        Ok(self.script.clone())
    }

    async fn fetch_style(&self) -> Result<String, HostError> {
        self.style.clone().ok_or_else(|| HostError::Status {
            url: "index.css".to_string(),
            status: 404,
        })
    }
}

/// Plays the chart side of the bridge for a headless container
#[derive(Debug, Clone)]
pub struct SandboxDriver {
    container: Arc<HeadlessContainer>,
    inbound: mpsc::Sender<InboundEvent>,
}

impl SandboxDriver {
    pub fn new(container: Arc<HeadlessContainer>, inbound: mpsc::Sender<InboundEvent>) -> Self {
        Self { container, inbound }
    }

    pub fn frame(&self) -> Arc<HeadlessFrame> {
        self.container
            .live_frame()
            .expect("no live sandbox frame")
    }

    pub fn window(&self) -> WindowId {
        self.frame().window()
    }

    /// Post a raw message as `source`
    pub async fn post_from(&self, source: WindowId, data: Value) {
        self.inbound
            .send(InboundEvent::new(source, data))
            .await
            .expect("session inbound closed");
    }

    /// Post a raw message from the live frame
    pub async fn post(&self, data: Value) {
        self.post_from(self.window(), data).await;
    }

    pub async fn module_loaded(&self) {
        self.post(json!({ "type": "moduleLoaded" })).await;
    }

    /// `buildQuery` messages received by the live frame
    pub fn build_requests(&self) -> Vec<Value> {
        self.frame().posted_of("buildQuery")
    }

    /// Payloads of the `render` messages received by the live frame
    pub fn renders(&self) -> Vec<Value> {
        self.frame()
            .posted_of("render")
            .into_iter()
            .map(|message| message["data"].clone())
            .collect()
    }

    /// Answer a `buildQuery` message, echoing its request id
    pub async fn answer(&self, request: &Value, query: Option<Value>) {
        self.post(json!({
            "type": "queryLoaded",
            "query": query.unwrap_or(Value::Null),
            "requestId": request["requestId"],
        }))
        .await;
    }
}

pub fn backend_query(dataset_id: &str, column_id: &str) -> Value {
    json!({
        "dimensions": [],
        "measures": [{ "dataset_id": dataset_id, "column_id": column_id, "aggregation": { "type": "count" } }],
        "limit": { "by": 10 },
        "options": { "locale_id": "en", "timezone_id": "UTC" }
    })
}
