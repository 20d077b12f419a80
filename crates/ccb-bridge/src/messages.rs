//! Bridge wire format
//!
//! Every message crossing the sandbox boundary is a [`BridgeMessage`], a
//! JSON object tagged by `type`. Host-bound variants (`moduleLoaded`,
//! `queryLoaded`, `moduleError`) arrive as [`InboundEvent`]s; sandbox-bound
//! variants (`render`, `resize`, `buildQuery`) are posted to the live frame.

use ccb_query::Query;
use ccb_slots::{Slot, SlotConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identity of a sandbox's message window
///
/// Assigned when a frame is mounted; inbound events carry the identity of the
/// window that posted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(Uuid);

impl WindowId {
    /// Fresh random window identity
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window:{}", self.0)
    }
}

/// Raw message received from some window
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Window that posted the message
    pub source: WindowId,
    /// Unparsed payload
    pub data: Value,
}

impl InboundEvent {
    /// Event from a window
    #[must_use]
    pub fn new(source: WindowId, data: Value) -> Self {
        Self { source, data }
    }
}

/// Rendering area size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Dimensions {
    /// Dimensions from width and height
    #[inline]
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Render options passed to the chart
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Theme object
    pub theme: Value,
}

/// Full render payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMessage {
    /// Query result rows
    pub data: Value,
    /// Slot snapshot the data belongs to
    pub slots: Vec<Slot>,
    /// Slot definitions
    pub slot_configurations: Vec<SlotConfig>,
    /// Theme and other options
    pub options: RenderOptions,
    /// UI language
    pub language: String,
    /// Container size
    pub dimensions: Dimensions,
}

impl RenderMessage {
    /// Layout-only view of this payload
    #[must_use]
    pub fn to_resize(&self) -> ResizeMessage {
        ResizeMessage {
            slots: self.slots.clone(),
            slot_configurations: self.slot_configurations.clone(),
            options: self.options.clone(),
            language: self.language.clone(),
            dimensions: self.dimensions,
        }
    }
}

/// Resize payload: a render payload without data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeMessage {
    /// Current slot snapshot
    pub slots: Vec<Slot>,
    /// Slot definitions
    pub slot_configurations: Vec<SlotConfig>,
    /// Theme and other options
    pub options: RenderOptions,
    /// UI language
    pub language: String,
    /// Container size
    pub dimensions: Dimensions,
}

/// Every message exchanged with the sandbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeMessage {
    /// Chart code finished loading
    ModuleLoaded,
    /// Chart code answered a `buildQuery`
    QueryLoaded {
        /// Built query; `null` when the chart defers to the host
        #[serde(default)]
        query: Option<Query>,
        /// Echo of the request id
        #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
    },
    /// Chart code raised an error
    ModuleError {
        /// Error description as posted
        #[serde(default)]
        error: Value,
    },
    /// Draw with data
    Render {
        /// Payload
        data: RenderMessage,
    },
    /// Re-layout without new data
    Resize {
        /// Payload
        data: ResizeMessage,
    },
    /// Ask the chart code to build its query
    BuildQuery {
        /// Current slots
        slots: Vec<Slot>,
        /// Slot definitions
        #[serde(rename = "slotConfigurations")]
        slot_configurations: Vec<SlotConfig>,
        /// Sequence number echoed in the answer
        #[serde(rename = "requestId")]
        request_id: u64,
    },
}

impl BridgeMessage {
    /// Wire tag of this message
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModuleLoaded => "moduleLoaded",
            Self::QueryLoaded { .. } => "queryLoaded",
            Self::ModuleError { .. } => "moduleError",
            Self::Render { .. } => "render",
            Self::Resize { .. } => "resize",
            Self::BuildQuery { .. } => "buildQuery",
        }
    }

    /// Whether this message travels sandbox to host
    #[must_use]
    pub fn is_host_bound(&self) -> bool {
        matches!(
            self,
            Self::ModuleLoaded | Self::QueryLoaded { .. } | Self::ModuleError { .. }
        )
    }
}

/// Authenticated, parsed event from the live sandbox
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxEvent {
    /// Module reached the ready state
    ModuleLoaded,
    /// Answer to a `buildQuery`
    QueryLoaded {
        /// Built query, if any
        query: Option<Query>,
        /// Echoed request id, if any
        request_id: Option<u64>,
    },
    /// Error raised inside the sandbox
    ModuleError {
        /// Error description
        error: Value,
    },
}
