//! CCB Bridge - sandboxed chart host and message bridge
//!
//! Loads untrusted chart code into an isolated context and talks to it:
//! - [`SandboxHost`] fetches the bundle, builds the sandbox document and keeps
//!   exactly one live frame per container
//! - [`MessageBridge`] authenticates inbound events by source window and
//!   gates outbound messages on the `Unloaded -> Loading -> Ready` lifecycle
//! - [`RenderScheduler`] coalesces render and resize requests onto frames
//!
//! The isolated context is reached through [`SandboxContainer`] /
//! [`SandboxFrame`]; [`HeadlessContainer`] is an in-memory implementation.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bridge;
pub mod container;
pub mod document;
pub mod error;
pub mod escape;
pub mod headless;
pub mod host;
pub mod messages;
pub mod scheduler;
pub mod state;

pub use bridge::{MessageBridge, SendOutcome, DEFAULT_TARGET_ORIGIN};
pub use container::{ObjectUrl, SandboxContainer, SandboxFrame, SANDBOX_POLICY};
pub use document::SandboxDocument;
pub use error::{BridgeError, HostError};
pub use escape::escape_script;
pub use headless::{HeadlessContainer, HeadlessFrame};
pub use host::{BundleSource, HttpBundleSource, SandboxHost, DEFAULT_BUNDLE_TIMEOUT};
pub use messages::{
    BridgeMessage, Dimensions, InboundEvent, RenderMessage, RenderOptions, ResizeMessage,
    SandboxEvent, WindowId,
};
pub use scheduler::{FrameClock, IntervalFrameClock, RenderScheduler, DEFAULT_FRAME_INTERVAL};
pub use state::BridgeState;
