use ccb_bridge::{
    BridgeState, BundleSource, HeadlessContainer, HostError, HttpBundleSource, InboundEvent,
    MessageBridge, SandboxEvent, SandboxHost,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;

fn spawn_bundle_server(with_style: bool) -> SocketAddr {
    let script = warp::path!("custom-chart" / "index.js")
        .map(|| "module.exports.render = function () { return `</script>`; };");
    let style = warp::path!("custom-chart" / "index.css").and_then(move || async move {
        if with_style {
            Ok(".axis { stroke: #888; }")
        } else {
            Err(warp::reject::not_found())
        }
    });

    let (addr, server) = warp::serve(script.or(style)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn host_for(addr: SocketAddr) -> (SandboxHost, Arc<HeadlessContainer>) {
    let container = Arc::new(HeadlessContainer::new());
    let source = HttpBundleSource::new(
        format!("http://{addr}/custom-chart"),
        Duration::from_secs(5),
    )
    .unwrap();
    let host = SandboxHost::new(
        container.clone(),
        Arc::new(source),
        Arc::new(MessageBridge::new()),
    );
    (host, container)
}

#[tokio::test]
async fn test_http_source_fetches_script_and_style() {
    let addr = spawn_bundle_server(true);
    let source = HttpBundleSource::new(format!("http://{addr}/custom-chart/"), Duration::from_secs(5)).unwrap();

    let script = source.fetch_script().await.unwrap();
    let style = source.fetch_style().await.unwrap();
    assert!(script.contains("module.exports.render"));
    assert_eq!(style, ".axis { stroke: #888; }");
}

#[tokio::test]
async fn test_missing_style_is_reported_as_status() {
    let addr = spawn_bundle_server(false);
    let source = HttpBundleSource::new(format!("http://{addr}/custom-chart"), Duration::from_secs(5)).unwrap();

    let err = source.fetch_style().await.unwrap_err();
    assert!(matches!(err, HostError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_unreachable_server_fails_the_load() {
    let container = Arc::new(HeadlessContainer::new());
    let source = HttpBundleSource::new("http://127.0.0.1:9/custom-chart", Duration::from_millis(500)).unwrap();
    let host = SandboxHost::new(container.clone(), Arc::new(source), Arc::new(MessageBridge::new()));

    assert!(matches!(host.load_bundle().await, Err(HostError::Fetch { .. })));
    assert!(container.live_frames().is_empty());
}

#[tokio::test]
async fn test_load_over_http_then_ready() {
    let addr = spawn_bundle_server(true);
    let (host, container) = host_for(addr);

    let window = host.load_bundle().await.unwrap();
    let frame = container.live_frame().unwrap();
    let document = container.document(frame.url()).unwrap();
    assert!(document.contains(".axis { stroke: #888; }"));
    assert!(document.contains(r"\`<\/script>\`"));

    let event = host
        .bridge()
        .accept(&InboundEvent::new(window, json!({ "type": "moduleLoaded" })));
    assert_eq!(event, Some(SandboxEvent::ModuleLoaded));
    assert_eq!(host.bridge().state(), BridgeState::Ready);
}

#[tokio::test]
async fn test_reload_leaves_exactly_one_sandbox() {
    let addr = spawn_bundle_server(true);
    let (host, container) = host_for(addr);
    let host = Arc::new(host);

    let loads = (0..4)
        .map(|_| {
            let host = Arc::clone(&host);
            tokio::spawn(async move { host.load_bundle().await })
        })
        .collect::<Vec<_>>();
    for load in loads {
        load.await.unwrap().unwrap();
    }

    assert_eq!(container.all_frames().len(), 4);
    assert_eq!(container.live_frames().len(), 1);
    assert_eq!(container.live_urls().len(), 1);
    assert_eq!(container.live_urls()[0], *container.live_frame().unwrap().url());
    assert_eq!(host.bridge().window(), host.live_window().await);
}

#[tokio::test]
async fn test_stale_window_after_reload_is_ignored() {
    let addr = spawn_bundle_server(true);
    let (host, _container) = host_for(addr);

    let old = host.load_bundle().await.unwrap();
    let new = host.load_bundle().await.unwrap();

    let from_old = host
        .bridge()
        .accept(&InboundEvent::new(old, json!({ "type": "moduleLoaded" })));
    assert_eq!(from_old, None);
    assert_eq!(host.bridge().state(), BridgeState::Loading);

    let from_new = host
        .bridge()
        .accept(&InboundEvent::new(new, json!({ "type": "moduleLoaded" })));
    assert_eq!(from_new, Some(SandboxEvent::ModuleLoaded));
}
