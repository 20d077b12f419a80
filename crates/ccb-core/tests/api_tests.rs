//! `LuzmoClient` against a loopback API server

use ccb_core::{ApiConfig, ApiError, DatasetApi, DatasetCatalog, LuzmoClient, API_VERSION};
use ccb_query::Query;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

type Requests = Arc<Mutex<Vec<(String, Value)>>>;

/// Serve `reply` with `status` for every POST, recording path and body
fn spawn_api(reply: Value, status: StatusCode) -> (SocketAddr, Requests) {
    let requests: Requests = Arc::default();
    let seen = Arc::clone(&requests);
    let route = warp::post()
        .and(warp::path::full())
        .and(warp::body::json())
        .map(move |path: warp::path::FullPath, body: Value| {
            seen.lock().push((path.as_str().to_string(), body));
            warp::reply::with_status(warp::reply::json(&reply), status)
        });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (addr, requests)
}

fn spawn_plain(status: StatusCode) -> SocketAddr {
    let route = warp::post().map(move || warp::reply::with_status("upstream unavailable", status));
    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn client(addr: SocketAddr) -> LuzmoClient {
    let config = ApiConfig {
        base_url: format!("http://{addr}/"),
        key: "key-1".to_string(),
        token: "token-1".to_string(),
        timeout_ms: 5_000,
    };
    LuzmoClient::new(&config).unwrap()
}

#[tokio::test]
async fn query_posts_versioned_get_request() {
    let (addr, requests) = spawn_api(
        json!({ "data": [["a", 1]], "performance": { "query": 120 } }),
        StatusCode::OK,
    );
    let query: Query = serde_json::from_value(json!({ "measures": [{ "dataset_id": "d1", "column_id": "m1" }] })).unwrap();

    let result = client(addr).query_dataset(&query).await.unwrap();

    assert_eq!(result.data, vec![json!(["a", 1])]);
    let requests = requests.lock();
    assert_eq!(requests.len(), 1);
    let (path, body) = &requests[0];
    assert_eq!(path, &format!("/{API_VERSION}/data"));
    assert_eq!(body["action"], "get");
    assert_eq!(body["version"], API_VERSION);
    assert_eq!(body["key"], "key-1");
    assert_eq!(body["token"], "token-1");
    assert_eq!(body["find"]["queries"][0]["measures"][0]["column_id"], "m1");
}

#[tokio::test]
async fn error_body_becomes_backend_error() {
    let (addr, _) = spawn_api(
        json!({ "error": { "type": { "code": 400 }, "message": "Dataset d1 not found" } }),
        StatusCode::BAD_REQUEST,
    );

    let err = client(addr).query_dataset(&Query::default()).await.unwrap_err();
    assert!(matches!(&err, ApiError::Backend(message) if message == "Dataset d1 not found"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn non_json_failure_reports_status() {
    let addr = spawn_plain(StatusCode::SERVICE_UNAVAILABLE);

    let err = client(addr).load_all_datasets().await.unwrap_err();
    assert!(matches!(err, ApiError::Status(503)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn missing_credentials_skip_the_network() {
    let (addr, requests) = spawn_api(json!({ "count": 0, "rows": [] }), StatusCode::OK);
    let config = ApiConfig {
        base_url: format!("http://{addr}"),
        ..ApiConfig::default()
    };
    let client = LuzmoClient::new(&config).unwrap();

    assert!(matches!(
        client.load_all_datasets().await,
        Err(ApiError::MissingCredentials)
    ));
    assert!(requests.lock().is_empty());
}

#[tokio::test]
async fn catalog_lists_datasets_and_columns() {
    let (addr, requests) = spawn_api(
        json!({
            "count": 1,
            "rows": [{
                "id": "d1",
                "name": { "en": "Sales" },
                "columns": [{
                    "id": "c1",
                    "name": { "en": "Revenue" },
                    "type": "numeric",
                    "format": ",.0f",
                    "lowestLevel": 0,
                    "currency": { "id": "USD", "name": "US dollar", "symbol": "$" }
                }]
            }]
        }),
        StatusCode::OK,
    );
    let catalog = DatasetCatalog::new(Arc::new(client(addr)));

    let columns = catalog.columns("d1").await.unwrap();
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].column_id, "c1");
    assert_eq!(columns[0].currency.as_deref(), Some("$"));

    catalog.columns("d1").await.unwrap();
    let requests = requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, format!("/{API_VERSION}/securable"));
    assert_eq!(requests[0].1["find"]["where"]["id"], "d1");
}

#[tokio::test]
async fn user_is_loaded_with_organizations() {
    let (addr, requests) = spawn_api(
        json!({
            "count": 1,
            "rows": [{
                "id": "u1",
                "name": "Ada",
                "email": "ada@example.com",
                "organizations": [{ "id": "o1", "name": "Analytics" }]
            }]
        }),
        StatusCode::OK,
    );

    let users = client(addr).load_user("me").await.unwrap();
    assert_eq!(users.rows[0].organizations[0].id, "o1");
    assert_eq!(requests.lock()[0].0, format!("/{API_VERSION}/user"));
}
