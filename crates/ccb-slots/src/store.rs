//! Slot state store
//!
//! Single authoritative, observable snapshot of slot contents. Every mutation
//! replaces the whole snapshot; subscribers receive either every snapshot
//! ([`SlotStore::subscribe`]) or only query-relevant changes
//! ([`SlotStore::subscribe_query`]).

use crate::error::SlotError;
use crate::projection::{query_signature, QuerySignature};
use crate::types::{ColumnRef, Slot, SlotConfig, SlotType};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Aggregation assigned to numeric columns dropped without one
pub const DEFAULT_NUMERIC_AGGREGATION: &str = "sum";

/// Immutable snapshot of all slots
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSnapshot {
    revision: u64,
    slots: Arc<[Slot]>,
}

impl SlotSnapshot {
    /// Snapshot with one empty slot per config
    #[must_use]
    pub fn empty_for(configs: &[SlotConfig]) -> Self {
        Self {
            revision: 0,
            slots: configs.iter().map(|c| Slot::empty(c.name.clone())).collect(),
        }
    }

    /// Snapshot from explicit slots (revision 0)
    #[must_use]
    pub fn from_slots(slots: Vec<Slot>) -> Self {
        Self {
            revision: 0,
            slots: slots.into(),
        }
    }

    /// Monotonic revision; 0 for the initial snapshot
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All slots in config order
    #[inline]
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slot by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Whether any slot holds a column
    #[must_use]
    pub fn has_any_content(&self) -> bool {
        self.slots.iter().any(Slot::is_filled)
    }

    /// Query-relevant projection of this snapshot
    #[must_use]
    pub fn query_signature(&self) -> QuerySignature {
        query_signature(&self.slots)
    }
}

/// Outcome of a successful mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotChange {
    /// Revision of the new snapshot
    pub revision: u64,
    /// Whether the query-relevant projection changed
    pub query_relevant: bool,
}

#[derive(Debug)]
struct StoreInner {
    configs: Arc<[SlotConfig]>,
    snapshots: watch::Sender<SlotSnapshot>,
    signatures: watch::Sender<QuerySignature>,
    writer: Mutex<()>,
}

/// Observable slot state store
///
/// Cheap to clone; all clones share the same state.
#[derive(Debug, Clone)]
pub struct SlotStore {
    inner: Arc<StoreInner>,
}

impl SlotStore {
    /// Create a store seeded with one empty slot per config
    #[must_use]
    pub fn new(configs: Vec<SlotConfig>) -> Self {
        let initial = SlotSnapshot::empty_for(&configs);
        let signature = initial.query_signature();
        let (snapshots, _) = watch::channel(initial);
        let (signatures, _) = watch::channel(signature);

        Self {
            inner: Arc::new(StoreInner {
                configs: configs.into(),
                snapshots,
                signatures,
                writer: Mutex::new(()),
            }),
        }
    }

    /// Slot configs this store was seeded with
    #[inline]
    #[must_use]
    pub fn configs(&self) -> &[SlotConfig] {
        &self.inner.configs
    }

    /// Config for a slot name
    #[must_use]
    pub fn config(&self, name: &str) -> Option<&SlotConfig> {
        self.inner.configs.iter().find(|c| c.name == name)
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> SlotSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Current query-relevant projection
    #[must_use]
    pub fn query_signature(&self) -> QuerySignature {
        self.inner.signatures.borrow().clone()
    }

    /// Receive every new snapshot
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SlotSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Receive only query-relevant changes
    #[must_use]
    pub fn subscribe_query(&self) -> watch::Receiver<QuerySignature> {
        self.inner.signatures.subscribe()
    }

    /// Replace the content of one slot
    ///
    /// Numeric slots default an unset aggregation to `sum`; other slots drop
    /// any aggregation.
    ///
    /// # Errors
    /// - [`SlotError::UnknownSlot`] if no config has this name
    /// - [`SlotError::TooManyColumns`] for single-column slots
    /// - [`SlotError::UnacceptableColumnType`] for rejected column types
    pub fn set_slot_content(
        &self,
        slot_name: &str,
        columns: Vec<ColumnRef>,
    ) -> Result<SlotChange, SlotError> {
        let config = self
            .config(slot_name)
            .ok_or_else(|| SlotError::UnknownSlot(slot_name.to_string()))?;

        if columns.len() > 1 && !config.accepts_multiple() {
            return Err(SlotError::TooManyColumns {
                slot: slot_name.to_string(),
                count: columns.len(),
            });
        }
        if let Some(rejected) = columns
            .iter()
            .find(|c| !config.accepts_column_type(&c.column_type))
        {
            return Err(SlotError::UnacceptableColumnType {
                slot: slot_name.to_string(),
                column_type: rejected.column_type.clone(),
            });
        }

        let content = normalize_columns(config.slot_type, columns);

        let _guard = self.inner.writer.lock();
        let current = self.snapshot();
        let slots = current
            .slots
            .iter()
            .map(|slot| {
                if slot.name == slot_name {
                    Slot::with_content(slot_name, content.clone())
                } else {
                    slot.clone()
                }
            })
            .collect::<Vec<_>>();

        let snapshot = SlotSnapshot {
            revision: current.revision + 1,
            slots: slots.into(),
        };
        let revision = snapshot.revision;
        let signature = snapshot.query_signature();

        self.inner.snapshots.send_replace(snapshot);
        let query_relevant = self.inner.signatures.send_if_modified(|current| {
            if *current == signature {
                false
            } else {
                *current = signature;
                true
            }
        });

        tracing::debug!(slot = slot_name, revision, query_relevant, "slot content replaced");

        Ok(SlotChange {
            revision,
            query_relevant,
        })
    }

    /// Remove every column from a slot
    ///
    /// # Errors
    /// [`SlotError::UnknownSlot`] if no config has this name.
    pub fn clear_slot(&self, slot_name: &str) -> Result<SlotChange, SlotError> {
        self.set_slot_content(slot_name, Vec::new())
    }
}

fn normalize_columns(slot_type: SlotType, columns: Vec<ColumnRef>) -> Vec<ColumnRef> {
    columns
        .into_iter()
        .map(|mut column| {
            column.aggregation_func = if slot_type.is_numeric() {
                column
                    .aggregation_func
                    .or_else(|| Some(DEFAULT_NUMERIC_AGGREGATION.to_string()))
            } else {
                None
            };
            column
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn configs() -> Vec<SlotConfig> {
        vec![
            SlotConfig::new("category", SlotType::Categorical).required(),
            SlotConfig::new("measure", SlotType::Numeric).required(),
            SlotConfig::new("legend", SlotType::Categorical),
        ]
    }

    #[test]
    fn store_starts_with_empty_slots() {
        let store = SlotStore::new(configs());
        let snapshot = store.snapshot();

        assert_eq!(snapshot.revision(), 0);
        assert_eq!(snapshot.slots().len(), 3);
        assert!(!snapshot.has_any_content());
    }

    #[test]
    fn unknown_slot_is_an_error() {
        let store = SlotStore::new(configs());
        let err = store
            .set_slot_content("size", vec![ColumnRef::new("d1", "c1")])
            .unwrap_err();

        assert_eq!(err, SlotError::UnknownSlot("size".to_string()));
        assert_eq!(store.snapshot().revision(), 0);
    }

    #[test]
    fn numeric_slot_defaults_to_sum() {
        let store = SlotStore::new(configs());
        store
            .set_slot_content("measure", vec![ColumnRef::new("d1", "m1").with_type("numeric")])
            .unwrap();

        let snapshot = store.snapshot();
        let measure = snapshot.get("measure").unwrap();
        assert_eq!(measure.content[0].aggregation_func.as_deref(), Some("sum"));
    }

    #[test]
    fn categorical_slot_drops_aggregation() {
        let store = SlotStore::new(configs());
        store
            .set_slot_content(
                "category",
                vec![ColumnRef::new("d1", "c1").with_aggregation("sum")],
            )
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.get("category").unwrap().content[0].aggregation_func, None);
    }

    #[test]
    fn single_column_slot_rejects_two() {
        let store = SlotStore::new(configs());
        let err = store
            .set_slot_content(
                "legend",
                vec![ColumnRef::new("d1", "a"), ColumnRef::new("d1", "b")],
            )
            .unwrap_err();

        assert!(matches!(err, SlotError::TooManyColumns { count: 2, .. }));
    }

    #[test]
    fn format_only_change_is_not_query_relevant() {
        let store = SlotStore::new(configs());
        let first = store
            .set_slot_content("measure", vec![ColumnRef::new("d1", "m1").with_format(",.0f")])
            .unwrap();
        let second = store
            .set_slot_content("measure", vec![ColumnRef::new("d1", "m1").with_format(",.2f")])
            .unwrap();

        assert!(first.query_relevant);
        assert!(!second.query_relevant);
        assert_eq!(second.revision, 2);
    }

    #[tokio::test]
    async fn subscribers_see_snapshots_and_filtered_signatures() {
        let store = SlotStore::new(configs());
        let mut snapshots = store.subscribe();
        let mut signatures = store.subscribe_query();

        store
            .set_slot_content("category", vec![ColumnRef::new("d1", "c1").with_label("A")])
            .unwrap();
        assert!(snapshots.has_changed().unwrap());
        assert!(signatures.has_changed().unwrap());
        snapshots.borrow_and_update();
        signatures.borrow_and_update();

        store
            .set_slot_content("category", vec![ColumnRef::new("d1", "c1").with_label("B")])
            .unwrap();
        assert!(snapshots.has_changed().unwrap());
        assert!(!signatures.has_changed().unwrap());
    }
}
