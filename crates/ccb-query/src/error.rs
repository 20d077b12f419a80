//! Query preparation errors

/// Errors raised while deriving a query from slot state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryPrepError {
    /// A placed column has no column id
    #[error("column in slot '{slot}' has no column id")]
    MissingColumnId {
        /// Slot name
        slot: String,
    },

    /// A placed column has no dataset id
    #[error("column '{column_id}' in slot '{slot}' has no dataset id")]
    MissingDatasetId {
        /// Slot name
        slot: String,
        /// Column id
        column_id: String,
    },
}
