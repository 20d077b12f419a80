//! Error types for slot state and manifest loading

/// Errors raised by [`crate::SlotStore`] mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    /// No slot config with this name
    #[error("unknown slot: {0}")]
    UnknownSlot(String),

    /// Slot accepts a single column only
    #[error("slot '{slot}' accepts a single column, got {count}")]
    TooManyColumns {
        /// Slot name
        slot: String,
        /// Number of columns offered
        count: usize,
    },

    /// Column type not in the slot's acceptable list
    #[error("slot '{slot}' does not accept columns of type '{column_type}'")]
    UnacceptableColumnType {
        /// Slot name
        slot: String,
        /// Offending column type
        column_type: String,
    },
}

/// Errors raised while loading the slot manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Manifest is not valid JSON
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Manifest has no `slots` array
    #[error("manifest has no slots array")]
    MissingSlots,

    /// Schema validation failed; one `path: message` entry per violation
    #[error("Manifest slot validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    /// The generated schema could not be compiled
    #[error("slot schema could not be compiled: {0}")]
    Schema(String),
}
