//! Isolated execution context abstraction
//!
//! A [`SandboxContainer`] is the element that hosts chart frames (an iframe
//! parent in a browser, a webview host, or the in-memory
//! [`HeadlessContainer`](crate::headless::HeadlessContainer)). Frames are
//! created from a document published at an object URL; both the frame and the
//! URL must be released when the sandbox is replaced.

use crate::error::{BridgeError, HostError};
use crate::messages::{Dimensions, WindowId};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Frame sandbox policy: scripts may run, nothing else is granted
pub const SANDBOX_POLICY: &str = "allow-scripts";

/// URL backing a mounted sandbox document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    /// Wrap a URL string
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// URL text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One mounted sandbox frame
pub trait SandboxFrame: Send + Sync + fmt::Debug {
    /// Identity of the frame's message window
    fn window(&self) -> WindowId;

    /// Post a structured message into the frame
    ///
    /// # Errors
    /// [`BridgeError::Post`] when the frame cannot receive messages.
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), BridgeError>;

    /// Detach the frame from its container
    fn remove(&self);
}

/// Element owning the sandbox frames of one chart
pub trait SandboxContainer: Send + Sync + fmt::Debug {
    /// Publish an HTML document and return its URL
    ///
    /// # Errors
    /// [`HostError::Mount`] if the document cannot be published.
    fn create_object_url(&self, html: &str) -> Result<ObjectUrl, HostError>;

    /// Release a URL from [`Self::create_object_url`]
    fn revoke_object_url(&self, url: &ObjectUrl);

    /// Mount a frame loading `url` under the given sandbox policy
    ///
    /// # Errors
    /// [`HostError::Mount`] if the frame cannot be created.
    fn mount(&self, url: &ObjectUrl, policy: &str) -> Result<Arc<dyn SandboxFrame>, HostError>;

    /// Current size of the rendering area
    fn dimensions(&self) -> Dimensions;
}
