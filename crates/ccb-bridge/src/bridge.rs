//! Message bridge between host and sandbox
//!
//! Routes typed messages across the sandbox boundary. The boundary channel
//! has no authentication of its own, so every inbound event is checked
//! against the live frame's window before its payload is even parsed.

use crate::container::SandboxFrame;
use crate::error::BridgeError;
use crate::messages::{BridgeMessage, InboundEvent, SandboxEvent, WindowId};
use crate::state::{validate_transition, BridgeState};
use parking_lot::RwLock;
use std::sync::Arc;

/// Target origin used when none is configured
pub const DEFAULT_TARGET_ORIGIN: &str = "*";

/// Result of an outbound send
#[derive(Debug)]
pub enum SendOutcome {
    /// Posted to the live frame
    Sent,
    /// Bridge not ready (or message not sandbox-bound); nothing posted
    Dropped,
    /// Posting failed
    Failed(BridgeError),
}

impl SendOutcome {
    /// Whether the message reached the frame
    #[inline]
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

#[derive(Debug, Default)]
struct BridgeInner {
    frame: Option<Arc<dyn SandboxFrame>>,
    state: BridgeState,
}

/// Bridge for one chart container
#[derive(Debug)]
pub struct MessageBridge {
    inner: RwLock<BridgeInner>,
    target_origin: String,
}

impl MessageBridge {
    /// Unattached bridge posting with the default target origin
    #[must_use]
    pub fn new() -> Self {
        Self::with_target_origin(DEFAULT_TARGET_ORIGIN)
    }

    /// Unattached bridge posting with an explicit target origin
    #[must_use]
    pub fn with_target_origin(origin: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(BridgeInner::default()),
            target_origin: origin.into(),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.inner.read().state
    }

    /// Whether sandbox-bound messages may be sent
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == BridgeState::Ready
    }

    /// Window of the live frame
    #[must_use]
    pub fn window(&self) -> Option<WindowId> {
        self.inner.read().frame.as_ref().map(|f| f.window())
    }

    /// Attach a freshly mounted frame (`Unloaded -> Loading`)
    ///
    /// # Errors
    /// [`BridgeError::InvalidTransition`] if a frame is still attached.
    pub fn attach(&self, frame: Arc<dyn SandboxFrame>) -> Result<(), BridgeError> {
        let mut inner = self.inner.write();
        validate_transition(inner.state, BridgeState::Loading)?;

        tracing::debug!(window = %frame.window(), "sandbox attached");
        inner.frame = Some(frame);
        inner.state = BridgeState::Loading;
        Ok(())
    }

    /// Detach the live frame (`-> Unloaded`) and hand it back for removal
    pub fn detach(&self) -> Option<Arc<dyn SandboxFrame>> {
        let mut inner = self.inner.write();
        let frame = inner.frame.take();
        if inner.state != BridgeState::Unloaded {
            tracing::debug!(from = %inner.state, "sandbox detached");
            inner.state = BridgeState::Unloaded;
        }
        frame
    }

    /// Post a sandbox-bound message
    ///
    /// Sends before `moduleLoaded` are dropped silently.
    pub fn send(&self, message: &BridgeMessage) -> SendOutcome {
        if message.is_host_bound() {
            tracing::debug!(kind = message.kind(), "refusing to send host-bound message");
            return SendOutcome::Dropped;
        }

        let frame = {
            let inner = self.inner.read();
            match (&inner.frame, inner.state) {
                (Some(frame), BridgeState::Ready) => Arc::clone(frame),
                (_, state) => {
                    tracing::trace!(kind = message.kind(), %state, "bridge not ready, message dropped");
                    return SendOutcome::Dropped;
                }
            }
        };

        let payload = match serde_json::to_value(message) {
            Ok(payload) => payload,
            Err(e) => return SendOutcome::Failed(e.into()),
        };

        match frame.post_message(&payload, &self.target_origin) {
            Ok(()) => {
                tracing::trace!(kind = message.kind(), window = %frame.window(), "message posted");
                SendOutcome::Sent
            }
            Err(e) => SendOutcome::Failed(e),
        }
    }

    /// Authenticate and parse an inbound event
    ///
    /// Returns `None` for events from any window other than the live frame,
    /// for malformed payloads and for sandbox-bound message types.
    pub fn accept(&self, event: &InboundEvent) -> Option<SandboxEvent> {
        let mut inner = self.inner.write();

        let live = inner.frame.as_ref().map(|f| f.window());
        if live != Some(event.source) {
            tracing::debug!(source = %event.source, "ignoring message from foreign window");
            return None;
        }

        let message = match serde_json::from_value::<BridgeMessage>(event.data.clone()) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed bridge message");
                return None;
            }
        };

        match message {
            BridgeMessage::ModuleLoaded => {
                if inner.state == BridgeState::Ready {
                    tracing::debug!("duplicate moduleLoaded ignored");
                    return None;
                }
                if let Err(e) = validate_transition(inner.state, BridgeState::Ready) {
                    tracing::debug!(error = %e, "moduleLoaded out of order");
                    return None;
                }
                inner.state = BridgeState::Ready;
                tracing::info!(source = %event.source, "chart module loaded");
                Some(SandboxEvent::ModuleLoaded)
            }
            BridgeMessage::QueryLoaded { query, request_id } => {
                Some(SandboxEvent::QueryLoaded { query, request_id })
            }
            BridgeMessage::ModuleError { error } => {
                tracing::warn!(%error, "chart module error");
                Some(SandboxEvent::ModuleError { error })
            }
            other @ (BridgeMessage::Render { .. }
            | BridgeMessage::Resize { .. }
            | BridgeMessage::BuildQuery { .. }) => {
                tracing::debug!(kind = other.kind(), "ignoring sandbox-bound message type from sandbox");
                None
            }
        }
    }
}

impl Default for MessageBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ObjectUrl, SandboxContainer, SANDBOX_POLICY};
    use crate::headless::HeadlessContainer;
    use serde_json::json;

    fn attached() -> (MessageBridge, Arc<dyn SandboxFrame>) {
        let container = HeadlessContainer::new();
        let frame = container
            .mount(&ObjectUrl::new("blob:test"), SANDBOX_POLICY)
            .unwrap();
        let bridge = MessageBridge::new();
        bridge.attach(Arc::clone(&frame)).unwrap();
        (bridge, frame)
    }

    fn build_query() -> BridgeMessage {
        BridgeMessage::BuildQuery {
            slots: Vec::new(),
            slot_configurations: Vec::new(),
            request_id: 1,
        }
    }

    #[test]
    fn sends_without_frame_are_dropped() {
        let bridge = MessageBridge::new();

        assert_eq!(bridge.state(), BridgeState::Unloaded);
        assert!(matches!(bridge.send(&build_query()), SendOutcome::Dropped));
    }

    #[test]
    fn sends_before_ready_are_dropped() {
        let (bridge, _frame) = attached();

        assert_eq!(bridge.state(), BridgeState::Loading);
        assert!(matches!(bridge.send(&build_query()), SendOutcome::Dropped));
    }

    #[test]
    fn module_loaded_makes_bridge_ready() {
        let (bridge, frame) = attached();
        let event = InboundEvent::new(frame.window(), json!({ "type": "moduleLoaded" }));

        assert_eq!(bridge.accept(&event), Some(SandboxEvent::ModuleLoaded));
        assert!(bridge.is_ready());
        assert!(bridge.send(&build_query()).is_sent());

        // a second moduleLoaded is not an event
        assert_eq!(bridge.accept(&event), None);
    }

    #[test]
    fn foreign_window_is_ignored() {
        let (bridge, _frame) = attached();
        let spoofed = InboundEvent::new(WindowId::new(), json!({ "type": "moduleLoaded" }));

        assert_eq!(bridge.accept(&spoofed), None);
        assert_eq!(bridge.state(), BridgeState::Loading);
    }

    #[test]
    fn module_error_keeps_state() {
        let (bridge, frame) = attached();
        let event = InboundEvent::new(frame.window(), json!({ "type": "moduleError", "error": "boom" }));

        assert_eq!(
            bridge.accept(&event),
            Some(SandboxEvent::ModuleError { error: json!("boom") })
        );
        assert_eq!(bridge.state(), BridgeState::Loading);
    }

    #[test]
    fn sandbox_bound_types_from_sandbox_are_ignored() {
        let (bridge, frame) = attached();
        let event = InboundEvent::new(
            frame.window(),
            json!({ "type": "buildQuery", "slots": [], "slotConfigurations": [], "requestId": 3 }),
        );

        assert_eq!(bridge.accept(&event), None);
    }

    #[test]
    fn attach_twice_is_rejected_until_detached() {
        let (bridge, frame) = attached();

        assert!(matches!(
            bridge.attach(Arc::clone(&frame)),
            Err(BridgeError::InvalidTransition { .. })
        ));
        assert!(bridge.detach().is_some());
        assert_eq!(bridge.window(), None);
        assert!(bridge.attach(frame).is_ok());
    }

    #[test]
    fn detached_bridge_ignores_old_window() {
        let (bridge, frame) = attached();
        bridge.detach();

        let event = InboundEvent::new(frame.window(), json!({ "type": "moduleLoaded" }));
        assert_eq!(bridge.accept(&event), None);
        assert_eq!(bridge.state(), BridgeState::Unloaded);
    }
}
