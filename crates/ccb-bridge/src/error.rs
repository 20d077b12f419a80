//! Bridge and host errors

use crate::state::BridgeState;

/// Errors raised by the message bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Transition not in the bridge state table
    #[error("invalid bridge transition {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: BridgeState,
        /// Requested state
        to: BridgeState,
    },

    /// Posting to the frame failed
    #[error("failed to post message: {0}")]
    Post(String),

    /// Payload could not be serialized
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while standing up or tearing down a sandbox
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Bundle asset could not be fetched
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        /// Asset URL
        url: String,
        /// Transport error
        reason: String,
    },

    /// Bundle server answered with a non-success status
    #[error("bundle server returned {status} for {url}")]
    Status {
        /// Asset URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Container could not create the document URL or mount the frame
    #[error("failed to mount sandbox: {0}")]
    Mount(String),

    /// Bridge refused the new frame
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl HostError {
    /// Whether a later attempt may succeed without intervention
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Mount(_) | Self::Bridge(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let down = HostError::Status {
            url: "http://localhost/index.js".to_string(),
            status: 503,
        };
        let missing = HostError::Status {
            url: "http://localhost/index.js".to_string(),
            status: 404,
        };

        assert!(down.is_transient());
        assert!(!missing.is_transient());
        assert!(!HostError::Mount("detached".to_string()).is_transient());
    }
}
