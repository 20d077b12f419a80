//! Sandbox host
//!
//! Keeps exactly one live sandbox per container. A load fetches the chart
//! bundle, builds the sandbox document, releases the previous frame and its
//! object URL, then mounts and attaches the new frame. Loads are serialized,
//! so a hot-reload racing an initial load never leaves two frames behind.

use crate::bridge::MessageBridge;
use crate::container::{ObjectUrl, SandboxContainer, SandboxFrame, SANDBOX_POLICY};
use crate::document::SandboxDocument;
use crate::error::HostError;
use crate::messages::WindowId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default bundle fetch timeout
pub const DEFAULT_BUNDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where chart script and stylesheet text come from
#[async_trait]
pub trait BundleSource: Send + Sync + std::fmt::Debug {
    /// Fetch the chart script
    async fn fetch_script(&self) -> Result<String, HostError>;

    /// Fetch the chart stylesheet
    async fn fetch_style(&self) -> Result<String, HostError>;
}

/// Bundle served over HTTP as `index.js` / `index.css`
#[derive(Debug, Clone)]
pub struct HttpBundleSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBundleSource {
    /// Source rooted at `base_url` (e.g. `http://localhost:4200/custom-chart`)
    ///
    /// # Errors
    /// [`HostError::Fetch`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, HostError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .user_agent(concat!("chart-builder/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| HostError::Fetch {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { http, base_url })
    }

    /// Cache-busted asset URL
    #[must_use]
    pub fn asset_url(&self, file: &str) -> String {
        format!(
            "{}/{file}?t={}",
            self.base_url,
            chrono::Utc::now().timestamp_millis()
        )
    }

    async fn fetch_text(&self, file: &str) -> Result<String, HostError> {
        let url = self.asset_url(file);
        let fetch_error = |e: reqwest::Error| HostError::Fetch {
            url: url.clone(),
            reason: e.to_string(),
        };

        let response = self.http.get(&url).send().await.map_err(fetch_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(HostError::Status {
                url,
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(fetch_error)
    }
}

#[async_trait]
impl BundleSource for HttpBundleSource {
    async fn fetch_script(&self) -> Result<String, HostError> {
        self.fetch_text("index.js").await
    }

    async fn fetch_style(&self) -> Result<String, HostError> {
        self.fetch_text("index.css").await
    }
}

#[derive(Debug)]
struct LiveSandbox {
    frame: Arc<dyn SandboxFrame>,
    url: ObjectUrl,
}

/// Owner of the sandbox lifecycle for one container
#[derive(Debug)]
pub struct SandboxHost {
    container: Arc<dyn SandboxContainer>,
    source: Arc<dyn BundleSource>,
    bridge: Arc<MessageBridge>,
    live: Mutex<Option<LiveSandbox>>,
}

impl SandboxHost {
    /// Host for a container, loading bundles from `source`
    #[must_use]
    pub fn new(
        container: Arc<dyn SandboxContainer>,
        source: Arc<dyn BundleSource>,
        bridge: Arc<MessageBridge>,
    ) -> Self {
        Self {
            container,
            source,
            bridge,
            live: Mutex::new(None),
        }
    }

    /// Bridge attached to the live frame
    #[must_use]
    pub fn bridge(&self) -> &Arc<MessageBridge> {
        &self.bridge
    }

    /// Container hosting the frames
    #[must_use]
    pub fn container(&self) -> &Arc<dyn SandboxContainer> {
        &self.container
    }

    /// (Re)load the chart bundle into a fresh sandbox
    ///
    /// A script fetch failure aborts the load and leaves the current sandbox
    /// untouched; a stylesheet failure only drops the styles.
    ///
    /// # Errors
    /// [`HostError`] on script fetch or mount failure.
    pub async fn load_bundle(&self) -> Result<WindowId, HostError> {
        let mut live = self.live.lock().await;

        let script = self.source.fetch_script().await.map_err(|e| {
            tracing::error!(error = %e, "failed to load chart bundle");
            e
        })?;
        let style = match self.source.fetch_style().await {
            Ok(style) => style,
            Err(e) => {
                tracing::warn!(error = %e, "no styles found, continuing without styles");
                String::new()
            }
        };

        let document = SandboxDocument::new(&script, &style);

        if let Some(previous) = live.take() {
            self.release(previous);
        }

        let url = self.container.create_object_url(document.html())?;
        let frame = match self.container.mount(&url, SANDBOX_POLICY) {
            Ok(frame) => frame,
            Err(e) => {
                self.container.revoke_object_url(&url);
                return Err(e);
            }
        };
        if let Err(e) = self.bridge.attach(Arc::clone(&frame)) {
            frame.remove();
            self.container.revoke_object_url(&url);
            return Err(e.into());
        }

        let window = frame.window();
        tracing::info!(%window, %url, script_bytes = script.len(), "sandbox mounted");
        *live = Some(LiveSandbox { frame, url });
        Ok(window)
    }

    /// Release the live sandbox, if any
    pub async fn teardown(&self) {
        if let Some(previous) = self.live.lock().await.take() {
            self.release(previous);
        }
    }

    /// Window of the live sandbox
    pub async fn live_window(&self) -> Option<WindowId> {
        self.live.lock().await.as_ref().map(|l| l.frame.window())
    }

    fn release(&self, sandbox: LiveSandbox) {
        self.bridge.detach();
        sandbox.frame.remove();
        self.container.revoke_object_url(&sandbox.url);
        tracing::debug!(window = %sandbox.frame.window(), url = %sandbox.url, "sandbox released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessContainer;
    use crate::state::BridgeState;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug, Default)]
    struct FakeSource {
        script_down: AtomicBool,
        style_down: AtomicBool,
    }

    #[async_trait]
    impl BundleSource for FakeSource {
        async fn fetch_script(&self) -> Result<String, HostError> {
            if self.script_down.load(Ordering::SeqCst) {
                return Err(HostError::Status {
                    url: "index.js".to_string(),
                    status: 503,
                });
            }
            Ok("module.exports = {};".to_string())
        }

        async fn fetch_style(&self) -> Result<String, HostError> {
            if self.style_down.load(Ordering::SeqCst) {
                return Err(HostError::Fetch {
                    url: "index.css".to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(".chart { color: red; }".to_string())
        }
    }

    fn host() -> (SandboxHost, Arc<HeadlessContainer>, Arc<FakeSource>) {
        let container = Arc::new(HeadlessContainer::new());
        let source = Arc::new(FakeSource::default());
        let host = SandboxHost::new(
            container.clone(),
            source.clone(),
            Arc::new(MessageBridge::new()),
        );
        (host, container, source)
    }

    #[tokio::test]
    async fn load_mounts_and_attaches() {
        let (host, container, _) = host();
        let window = host.load_bundle().await.unwrap();

        assert_eq!(host.bridge().state(), BridgeState::Loading);
        assert_eq!(host.bridge().window(), Some(window));
        let url = container.live_frame().unwrap().url().clone();
        assert!(container.document(&url).unwrap().contains(".chart { color: red; }"));
    }

    #[tokio::test]
    async fn reload_releases_previous_sandbox() {
        let (host, container, _) = host();
        let first = host.load_bundle().await.unwrap();
        let second = host.load_bundle().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(container.live_frames().len(), 1);
        assert_eq!(container.live_urls().len(), 1);
        assert!(container.all_frames()[0].is_removed());
    }

    #[tokio::test]
    async fn style_failure_is_not_fatal() {
        let (host, container, source) = host();
        source.style_down.store(true, Ordering::SeqCst);

        host.load_bundle().await.unwrap();
        let url = container.live_frame().unwrap().url().clone();
        assert!(!container.document(&url).unwrap().contains("color: red"));
    }

    #[tokio::test]
    async fn script_failure_keeps_current_sandbox() {
        let (host, container, source) = host();
        let window = host.load_bundle().await.unwrap();
        source.script_down.store(true, Ordering::SeqCst);

        let err = host.load_bundle().await.unwrap_err();
        assert!(matches!(err, HostError::Status { status: 503, .. }));
        assert_eq!(host.live_window().await, Some(window));
        assert_eq!(container.live_frames().len(), 1);
    }

    #[tokio::test]
    async fn teardown_leaves_nothing_behind() {
        let (host, container, _) = host();
        host.load_bundle().await.unwrap();
        host.teardown().await;

        assert!(container.live_frames().is_empty());
        assert!(container.live_urls().is_empty());
        assert_eq!(host.bridge().state(), BridgeState::Unloaded);
        assert_eq!(host.live_window().await, None);
    }

    #[test]
    fn asset_urls_are_cache_busted() {
        let source = HttpBundleSource::new("http://localhost:4200/custom-chart/", DEFAULT_BUNDLE_TIMEOUT).unwrap();
        let url = source.asset_url("index.js");

        assert!(url.starts_with("http://localhost:4200/custom-chart/index.js?t="));
    }
}
