//! Analytics backend client
//!
//! Every call is a `POST` of `{action: "get", version: "0.1.0", key, token,
//! find}` to a versioned resource. Error bodies carry `{error: {message}}`;
//! that message is surfaced verbatim as [`ApiError::Backend`].

use crate::auth::User;
use crate::config::ApiConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use ccb_query::Query;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// API version segment and `version` body field
pub const API_VERSION: &str = "0.1.0";

/// Paged result envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowsData<T> {
    /// Total number of matching rows
    #[serde(default)]
    pub count: u64,
    /// Returned rows
    #[serde(default = "Vec::new")]
    pub rows: Vec<T>,
}

/// Dataset listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Dataset id
    pub id: String,
    /// Localized name
    #[serde(default)]
    pub name: Value,
    /// Dataset subtype
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Dataset with its columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDetail {
    /// Dataset id
    pub id: String,
    /// Localized name
    #[serde(default)]
    pub name: Value,
    /// Columns in display order
    #[serde(default)]
    pub columns: Vec<ApiColumn>,
}

/// Column as returned by the backend
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiColumn {
    /// Column id
    pub id: String,
    /// Localized name
    #[serde(default)]
    pub name: Value,
    /// Localized description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    /// Column type
    #[serde(rename = "type", default)]
    pub column_type: String,
    /// Column subtype
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Presentation format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Current level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Highest available level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_level: Option<u32>,
    /// Lowest available level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowest_level: Option<u32>,
    /// Hierarchy levels, ascending
    #[serde(default)]
    pub hierarchy_levels: Vec<ApiHierarchyLevel>,
    /// Currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<ApiCurrency>,
}

/// Hierarchy level of a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiHierarchyLevel {
    /// Level id
    pub id: String,
    /// Depth
    #[serde(default)]
    pub level: u32,
    /// Localized name
    #[serde(default)]
    pub name: Value,
}

/// Currency attached to a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCurrency {
    /// Currency id
    #[serde(default)]
    pub id: String,
    /// Currency name
    #[serde(default)]
    pub name: String,
    /// Display symbol
    #[serde(default)]
    pub symbol: String,
}

/// Successful data query response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Result rows
    #[serde(default)]
    pub data: Vec<Value>,
    /// Timing breakdown in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Map<String, Value>>,
    /// Other response keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryResult {
    /// Result with rows and no timing
    #[must_use]
    pub fn rows(data: Vec<Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// With timing breakdown
    #[must_use]
    pub fn with_performance(mut self, performance: Map<String, Value>) -> Self {
        self.performance = Some(performance);
        self
    }
}

/// Total query duration in seconds from a timing breakdown
///
/// The `rows` entry is not a timing. A numeric `total` wins (clamped at
/// zero); otherwise the remaining numeric entries are summed.
#[must_use]
pub fn calculate_query_duration(performance: &Map<String, Value>) -> f64 {
    let timings = performance
        .iter()
        .filter(|(key, _)| key.as_str() != "rows")
        .filter_map(|(key, value)| value.as_f64().map(|ms| (key.as_str(), ms)))
        .collect::<Vec<_>>();

    if timings.is_empty() {
        return 0.0;
    }
    if let Some((_, total)) = timings.iter().find(|(key, _)| *key == "total") {
        return total.max(0.0) / 1000.0;
    }
    timings.iter().map(|(_, ms)| ms).sum::<f64>() / 1000.0
}

/// Operations the builder needs from the analytics backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatasetApi: Send + Sync {
    /// Datasets owned by the caller, newest first
    async fn load_all_datasets(&self) -> Result<RowsData<DatasetSummary>, ApiError>;

    /// A dataset with its columns, `None` if unknown
    async fn load_dataset_with_columns(&self, dataset_id: &str) -> Result<Option<DatasetDetail>, ApiError>;

    /// Execute a data query
    async fn query_dataset(&self, query: &Query) -> Result<QueryResult, ApiError>;
}

/// HTTP client for the Luzmo API
#[derive(Debug, Clone)]
pub struct LuzmoClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
    token: String,
}

impl LuzmoClient {
    /// Client from API settings
    ///
    /// # Errors
    /// [`ApiError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("chart-builder/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
            token: config.token.clone(),
        })
    }

    /// Whether a key and token are configured
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.key.is_empty() && !self.token.is_empty()
    }

    /// API root
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Load a user with their organizations
    ///
    /// # Errors
    /// [`ApiError`] on transport, status or backend failure.
    pub async fn load_user(&self, uid: &str) -> Result<RowsData<User>, ApiError> {
        self.post(
            "user",
            json!({
                "where": { "id": uid },
                "include": [{ "model": "Organization", "attributes": ["id", "name"] }]
            }),
        )
        .await
    }

    async fn post<T: DeserializeOwned>(&self, resource: &str, find: Value) -> Result<T, ApiError> {
        if !self.has_credentials() {
            return Err(ApiError::MissingCredentials);
        }

        let url = format!("{}/{API_VERSION}/{resource}", self.base_url);
        let body = json!({
            "action": "get",
            "version": API_VERSION,
            "key": self.key,
            "token": self.token,
            "find": find,
        });

        tracing::debug!(%url, "api request");
        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let value = match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(_) if !status.is_success() => return Err(ApiError::Status(status.as_u16())),
            Err(e) => return Err(ApiError::Decode(e.to_string())),
        };
        if let Some(message) = backend_error(&value) {
            tracing::warn!(%url, %message, "api returned an error");
            return Err(ApiError::Backend(message));
        }
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn backend_error(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    if error.is_null() {
        return None;
    }
    Some(match error.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => error.as_str().map_or_else(|| error.to_string(), str::to_string),
    })
}

#[async_trait]
impl DatasetApi for LuzmoClient {
    async fn load_all_datasets(&self) -> Result<RowsData<DatasetSummary>, ApiError> {
        self.post(
            "securable",
            json!({
                "attributes": ["id", "updated_at", "created_at", "name", "subtype"],
                "where": { "type": "dataset", "is_variant": false },
                "order": [["created_at", "desc"]],
                "options": { "public": false, "owned": true }
            }),
        )
        .await
    }

    async fn load_dataset_with_columns(&self, dataset_id: &str) -> Result<Option<DatasetDetail>, ApiError> {
        let result: RowsData<DatasetDetail> = self
            .post(
                "securable",
                json!({
                    "attributes": ["id", "name"],
                    "where": { "id": dataset_id },
                    "include": [{
                        "model": "Column",
                        "attributes": [
                            "id", "name", "description", "type", "subtype", "format",
                            "highestLevel", "lowestLevel", "duration_levels", "duration_format"
                        ],
                        "separate": true,
                        "order": [["order", "asc"]],
                        "include": [
                            {
                                "model": "HierarchyLevel",
                                "attributes": ["id", "color", "level", "name"],
                                "separate": true,
                                "order": [["level", "asc"]]
                            },
                            { "model": "Currency", "attributes": ["id", "name", "symbol"] }
                        ]
                    }]
                }),
            )
            .await?;
        Ok(result.rows.into_iter().next())
    }

    async fn query_dataset(&self, query: &Query) -> Result<QueryResult, ApiError> {
        self.post("data", json!({ "queries": [query] })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn perf(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn duration_prefers_total() {
        let performance = perf(json!({ "total": 1500, "db": 900, "rows": 42 }));
        assert!((calculate_query_duration(&performance) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn duration_sums_without_total() {
        let performance = perf(json!({ "db": 200, "cache": 50, "rows": 1000, "note": "warm" }));
        assert!((calculate_query_duration(&performance) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn duration_of_empty_or_negative() {
        assert!(calculate_query_duration(&Map::new()).abs() < f64::EPSILON);
        assert!(calculate_query_duration(&perf(json!({ "rows": 3 }))).abs() < f64::EPSILON);
        assert!(calculate_query_duration(&perf(json!({ "total": -20 }))).abs() < f64::EPSILON);
    }

    #[test]
    fn backend_error_message_extraction() {
        assert_eq!(
            backend_error(&json!({ "error": { "message": "Invalid token" } })),
            Some("Invalid token".to_string())
        );
        assert_eq!(backend_error(&json!({ "error": "Forbidden" })), Some("Forbidden".to_string()));
        assert_eq!(backend_error(&json!({ "data": [] })), None);
        assert_eq!(backend_error(&json!({ "error": null })), None);
    }

    #[test]
    fn column_parses_backend_shape() {
        let column: ApiColumn = serde_json::from_value(json!({
            "id": "c1",
            "name": { "en": "Revenue", "fr": "Chiffre d'affaires" },
            "type": "numeric",
            "lowestLevel": 0,
            "hierarchyLevels": [],
            "currency": { "id": "EUR", "name": "Euro", "symbol": "€" }
        }))
        .unwrap();

        assert_eq!(column.column_type, "numeric");
        assert_eq!(column.currency.unwrap().symbol, "€");
        assert_eq!(column.lowest_level, Some(0));
    }

    #[tokio::test]
    async fn missing_credentials_short_circuit() {
        let client = LuzmoClient::new(&ApiConfig::default()).unwrap();
        assert!(!client.has_credentials());
        assert_eq!(client.load_all_datasets().await.unwrap_err(), ApiError::MissingCredentials);
    }
}
