//! Query-relevant projection of slot state
//!
//! Strips presentation-only fields (format, label, ...) so that cosmetic slot
//! edits can re-render without re-querying. Equality is structural.

use crate::types::Slot;
use serde::{Deserialize, Serialize};

/// The parts of a column that influence the backend query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSignature {
    /// Backend column id
    pub column_id: String,
    /// Backend dataset id
    pub dataset_id: String,
    /// Aggregation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_func: Option<String>,
}

/// Query-relevant view of one slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotQuerySignature {
    /// Slot name
    pub name: String,
    /// Query-relevant column fields
    pub content: Vec<ColumnSignature>,
}

/// Query-relevant view of all slots, in slot order
pub type QuerySignature = Vec<SlotQuerySignature>;

/// Project slots onto their query-relevant fields
#[must_use]
pub fn query_signature(slots: &[Slot]) -> QuerySignature {
    slots
        .iter()
        .map(|slot| SlotQuerySignature {
            name: slot.name.clone(),
            content: slot
                .content
                .iter()
                .map(|column| ColumnSignature {
                    column_id: column.column_id.clone(),
                    dataset_id: column.dataset_id.clone(),
                    aggregation_func: column.aggregation_func.clone(),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnRef;
    use proptest::prelude::*;

    fn column(dataset: &str, id: &str) -> ColumnRef {
        ColumnRef::new(dataset, id).with_type("numeric")
    }

    #[test]
    fn format_change_keeps_signature() {
        let before = vec![Slot::with_content("measure", vec![column("d1", "m1").with_format(",.0f")])];
        let after = vec![Slot::with_content("measure", vec![column("d1", "m1").with_format(",.2f")])];

        assert_ne!(before, after);
        assert_eq!(query_signature(&before), query_signature(&after));
    }

    #[test]
    fn aggregation_change_alters_signature() {
        let sum = vec![Slot::with_content("measure", vec![column("d1", "m1").with_aggregation("sum")])];
        let avg = vec![Slot::with_content("measure", vec![column("d1", "m1").with_aggregation("average")])];

        assert_ne!(query_signature(&sum), query_signature(&avg));
    }

    proptest! {
        #[test]
        fn presentation_fields_never_affect_signature(
            format_a in proptest::option::of("[,.0-9a-z%]{0,6}"),
            format_b in proptest::option::of("[,.0-9a-z%]{0,6}"),
            label_a in "[A-Za-z ]{0,12}",
            label_b in "[A-Za-z ]{0,12}",
            aggregation in proptest::option::of(prop_oneof![Just("sum"), Just("average"), Just("max")]),
        ) {
            let mut a = column("d1", "m1");
            a.format = format_a;
            a.label = Some(serde_json::Value::String(label_a));
            a.aggregation_func = aggregation.map(str::to_string);

            let mut b = a.clone();
            b.format = format_b;
            b.label = Some(serde_json::Value::String(label_b));

            let left = vec![Slot::with_content("measure", vec![a])];
            let right = vec![Slot::with_content("measure", vec![b])];
            prop_assert_eq!(query_signature(&left), query_signature(&right));
        }
    }
}
