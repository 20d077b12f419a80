//! In-memory sandbox container
//!
//! Records every published document, object URL, mounted frame and posted
//! message so the sandbox lifecycle can be driven and inspected without a
//! browser. Frames never execute chart code; whoever drives the container
//! answers on the chart's behalf through the session's inbound channel.

use crate::container::{ObjectUrl, SandboxContainer, SandboxFrame};
use crate::error::{BridgeError, HostError};
use crate::messages::{Dimensions, WindowId};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Frame mounted in a [`HeadlessContainer`]
#[derive(Debug)]
pub struct HeadlessFrame {
    window: WindowId,
    url: ObjectUrl,
    policy: String,
    posted: Mutex<Vec<Value>>,
    removed: AtomicBool,
    fail_posts: AtomicBool,
}

impl HeadlessFrame {
    fn new(url: ObjectUrl, policy: &str) -> Self {
        Self {
            window: WindowId::new(),
            url,
            policy: policy.to_string(),
            posted: Mutex::new(Vec::new()),
            removed: AtomicBool::new(false),
            fail_posts: AtomicBool::new(false),
        }
    }

    /// URL the frame was mounted from
    #[must_use]
    pub fn url(&self) -> &ObjectUrl {
        &self.url
    }

    /// Sandbox policy the frame was mounted with
    #[must_use]
    pub fn policy(&self) -> &str {
        &self.policy
    }

    /// Every message posted so far
    #[must_use]
    pub fn posted(&self) -> Vec<Value> {
        self.posted.lock().clone()
    }

    /// Posted messages of one `type`
    #[must_use]
    pub fn posted_of(&self, kind: &str) -> Vec<Value> {
        self.posted
            .lock()
            .iter()
            .filter(|m| m.get("type").and_then(Value::as_str) == Some(kind))
            .cloned()
            .collect()
    }

    /// Drain posted messages
    pub fn take_posted(&self) -> Vec<Value> {
        std::mem::take(&mut *self.posted.lock())
    }

    /// Whether the frame was removed from the container
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    /// Make subsequent posts fail
    pub fn set_fail_posts(&self, fail: bool) {
        self.fail_posts.store(fail, Ordering::SeqCst);
    }
}

impl SandboxFrame for HeadlessFrame {
    fn window(&self) -> WindowId {
        self.window
    }

    fn post_message(&self, message: &Value, _target_origin: &str) -> Result<(), BridgeError> {
        if self.is_removed() {
            return Err(BridgeError::Post("frame removed".to_string()));
        }
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(BridgeError::Post("frame rejected message".to_string()));
        }
        self.posted.lock().push(message.clone());
        Ok(())
    }

    fn remove(&self) {
        self.removed.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct ContainerState {
    documents: HashMap<ObjectUrl, String>,
    frames: Vec<Arc<HeadlessFrame>>,
}

/// In-memory [`SandboxContainer`]
#[derive(Debug)]
pub struct HeadlessContainer {
    state: Mutex<ContainerState>,
    dimensions: Mutex<Dimensions>,
}

impl HeadlessContainer {
    /// Empty 800x600 container
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimensions(Dimensions::new(800, 600))
    }

    /// Empty container of the given size
    #[must_use]
    pub fn with_dimensions(dimensions: Dimensions) -> Self {
        Self {
            state: Mutex::new(ContainerState::default()),
            dimensions: Mutex::new(dimensions),
        }
    }

    /// Change the reported size
    pub fn set_dimensions(&self, dimensions: Dimensions) {
        *self.dimensions.lock() = dimensions;
    }

    /// Frames still attached
    #[must_use]
    pub fn live_frames(&self) -> Vec<Arc<HeadlessFrame>> {
        self.state
            .lock()
            .frames
            .iter()
            .filter(|f| !f.is_removed())
            .cloned()
            .collect()
    }

    /// Every frame ever mounted, oldest first
    #[must_use]
    pub fn all_frames(&self) -> Vec<Arc<HeadlessFrame>> {
        self.state.lock().frames.clone()
    }

    /// The single live frame, if exactly one exists
    #[must_use]
    pub fn live_frame(&self) -> Option<Arc<HeadlessFrame>> {
        let mut live = self.live_frames();
        if live.len() == 1 {
            live.pop()
        } else {
            None
        }
    }

    /// Object URLs not yet revoked
    #[must_use]
    pub fn live_urls(&self) -> Vec<ObjectUrl> {
        self.state.lock().documents.keys().cloned().collect()
    }

    /// Document published at a URL
    #[must_use]
    pub fn document(&self, url: &ObjectUrl) -> Option<String> {
        self.state.lock().documents.get(url).cloned()
    }
}

impl Default for HeadlessContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxContainer for HeadlessContainer {
    fn create_object_url(&self, html: &str) -> Result<ObjectUrl, HostError> {
        let url = ObjectUrl::new(format!("blob:headless/{}", Uuid::new_v4()));
        self.state.lock().documents.insert(url.clone(), html.to_string());
        Ok(url)
    }

    fn revoke_object_url(&self, url: &ObjectUrl) {
        self.state.lock().documents.remove(url);
    }

    fn mount(&self, url: &ObjectUrl, policy: &str) -> Result<Arc<dyn SandboxFrame>, HostError> {
        let frame = Arc::new(HeadlessFrame::new(url.clone(), policy));
        self.state.lock().frames.push(Arc::clone(&frame));
        Ok(frame)
    }

    fn dimensions(&self) -> Dimensions {
        *self.dimensions.lock()
    }
}
