//! Render scheduler
//!
//! Coalesces render and resize requests onto the next frame of a
//! [`FrameClock`]. At most one render frame is pending at a time: a render
//! requested while one is pending replaces its payload instead of scheduling
//! another frame, so each frame posts the most recent intent and never a
//! backlog. A new resize aborts the not-yet-fired previous one.

use crate::bridge::{MessageBridge, SendOutcome};
use crate::messages::{BridgeMessage, RenderMessage, ResizeMessage};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default frame interval (~60 fps)
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Source of paint-cycle ticks
pub trait FrameClock: Send + Sync + fmt::Debug {
    /// Future resolving at the next frame
    fn next_frame(&self) -> BoxFuture<'static, ()>;
}

/// Frame clock ticking at a fixed interval on the tokio timer
#[derive(Debug, Clone, Copy)]
pub struct IntervalFrameClock {
    interval: Duration,
}

impl IntervalFrameClock {
    /// Clock with the given frame interval
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for IntervalFrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameClock for IntervalFrameClock {
    fn next_frame(&self) -> BoxFuture<'static, ()> {
        tokio::time::sleep(self.interval).boxed()
    }
}

#[derive(Debug, Default)]
struct PendingRender {
    payload: Option<RenderMessage>,
    frame: Option<JoinHandle<()>>,
}

/// Render/resize coalescer for one bridge
#[derive(Debug)]
pub struct RenderScheduler {
    bridge: Arc<MessageBridge>,
    clock: Arc<dyn FrameClock>,
    render: Arc<Mutex<PendingRender>>,
    resize: Mutex<Option<JoinHandle<()>>>,
}

impl RenderScheduler {
    /// Scheduler posting through `bridge` on `clock` frames
    #[must_use]
    pub fn new(bridge: Arc<MessageBridge>, clock: Arc<dyn FrameClock>) -> Self {
        Self {
            bridge,
            clock,
            render: Arc::new(Mutex::new(PendingRender::default())),
            resize: Mutex::new(None),
        }
    }

    /// Whether a render frame is pending
    #[must_use]
    pub fn has_pending_render(&self) -> bool {
        self.render.lock().payload.is_some()
    }

    /// Post `message` as a `render` on the next frame
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule_render(&self, message: RenderMessage) {
        let mut pending = self.render.lock();
        if pending.payload.replace(message).is_some() {
            tracing::trace!("render coalesced into pending frame");
            return;
        }

        let shared = Arc::clone(&self.render);
        let bridge = Arc::clone(&self.bridge);
        let frame = self.clock.next_frame();
        pending.frame = Some(tokio::spawn(async move {
            frame.await;
            let payload = {
                let mut pending = shared.lock();
                pending.frame = None;
                pending.payload.take()
            };
            if let Some(data) = payload {
                log_outcome("render", bridge.send(&BridgeMessage::Render { data }));
            }
        }));
    }

    /// Post `message` as a `resize` on the next frame, replacing any
    /// resize not yet fired
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule_resize(&self, message: ResizeMessage) {
        let mut resize = self.resize.lock();
        if let Some(previous) = resize.take() {
            previous.abort();
        }

        let bridge = Arc::clone(&self.bridge);
        let frame = self.clock.next_frame();
        *resize = Some(tokio::spawn(async move {
            frame.await;
            log_outcome("resize", bridge.send(&BridgeMessage::Resize { data: message }));
        }));
    }

    /// Abort every pending frame
    pub fn cancel_all(&self) {
        {
            let mut pending = self.render.lock();
            pending.payload = None;
            if let Some(frame) = pending.frame.take() {
                frame.abort();
            }
        }
        if let Some(frame) = self.resize.lock().take() {
            frame.abort();
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn log_outcome(kind: &str, outcome: SendOutcome) {
    match outcome {
        SendOutcome::Sent => tracing::trace!(kind, "frame posted"),
        SendOutcome::Dropped => tracing::debug!(kind, "frame dropped, sandbox not ready"),
        SendOutcome::Failed(e) => tracing::error!(kind, error = %e, "frame post failed"),
    }
}
