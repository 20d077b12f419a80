//! Bridge state machine
//!
//! `Unloaded -> Loading -> Ready -> Unloaded`, with `Loading -> Unloaded` for
//! a reload before the chart reports loaded.

use crate::error::BridgeError;
use std::fmt;

/// Lifecycle of one sandbox instance as seen by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BridgeState {
    /// No live frame
    #[default]
    Unloaded,
    /// Frame mounted, chart code not yet loaded
    Loading,
    /// Chart code posted `moduleLoaded`
    Ready,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => f.write_str("unloaded"),
            Self::Loading => f.write_str("loading"),
            Self::Ready => f.write_str("ready"),
        }
    }
}

/// Validates a bridge state transition.
pub fn validate_transition(from: BridgeState, to: BridgeState) -> Result<(), BridgeError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(BridgeError::InvalidTransition { from, to })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: BridgeState) -> &'static [BridgeState] {
    use BridgeState::{Loading, Ready, Unloaded};
    match from {
        Unloaded => &[Loading],
        Loading => &[Ready, Unloaded],
        Ready => &[Unloaded],
    }
}
