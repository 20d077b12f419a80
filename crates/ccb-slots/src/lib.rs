//! CCB Slots - slot data model and state store
//!
//! Holds the assignment of dataset columns to the chart's named slots:
//! - [`SlotConfig`] definitions loaded from a schema-validated manifest
//! - [`SlotStore`], the observable single source of truth for slot contents
//! - the query-relevant projection used to skip redundant backend queries
//!
//! # Example
//!
//! ```rust,ignore
//! use ccb_slots::{load_manifest, ColumnRef, SlotStore};
//!
//! let manifest = load_manifest(&std::fs::read_to_string("manifest.json")?);
//! let store = SlotStore::new(manifest.configs);
//! store.set_slot_content("category", vec![ColumnRef::new("d1", "c1")])?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod manifest;
pub mod projection;
pub mod store;
pub mod types;

pub use error::{ManifestError, SlotError};
pub use manifest::{load_manifest, parse_manifest, parse_slots, slots_schema, ManifestLoad};
pub use projection::{query_signature, ColumnSignature, QuerySignature, SlotQuerySignature};
pub use store::{SlotChange, SlotSnapshot, SlotStore, DEFAULT_NUMERIC_AGGREGATION};
pub use types::{ColumnRef, Slot, SlotConfig, SlotType};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
