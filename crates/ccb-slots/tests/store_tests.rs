use ccb_slots::{load_manifest, ColumnRef, SlotConfig, SlotError, SlotStore, SlotType};
use proptest::prelude::*;
use std::collections::HashSet;
use std::thread;

const MANIFEST: &str = r#"{
    "slots": [
        { "name": "category", "type": "categorical", "order": 1, "isRequired": true },
        { "name": "measure", "type": "numeric", "order": 2, "isRequired": true,
          "acceptableColumnTypes": ["numeric"], "canAcceptMultipleColumns": true },
        { "name": "legend", "type": "categorical", "order": 3 }
    ]
}"#;

fn store() -> SlotStore {
    let load = load_manifest(MANIFEST);
    assert!(load.is_valid(), "{:?}", load.error);
    SlotStore::new(load.configs)
}

#[test]
fn test_manifest_seeds_store() {
    let store = store();
    let names = store
        .snapshot()
        .slots()
        .iter()
        .map(|s| s.name.clone())
        .collect::<Vec<_>>();

    assert_eq!(names, vec!["category", "measure", "legend"]);
}

#[test]
fn test_acceptable_types_enforced() {
    let store = store();

    let err = store
        .set_slot_content("measure", vec![ColumnRef::new("d1", "c1").with_type("hierarchy")])
        .unwrap_err();
    assert!(matches!(err, SlotError::UnacceptableColumnType { .. }));

    let change = store
        .set_slot_content(
            "measure",
            vec![
                ColumnRef::new("d1", "m1").with_type("numeric"),
                ColumnRef::new("d1", "m2").with_type("numeric").with_aggregation("average"),
            ],
        )
        .unwrap();
    assert!(change.query_relevant);

    let snapshot = store.snapshot();
    let aggregations = snapshot
        .get("measure")
        .unwrap()
        .content
        .iter()
        .map(|c| c.aggregation_func.clone())
        .collect::<Vec<_>>();
    assert_eq!(
        aggregations,
        vec![Some("sum".to_string()), Some("average".to_string())]
    );
}

#[test]
fn test_clear_slot_is_query_relevant() {
    let store = store();
    store
        .set_slot_content("legend", vec![ColumnRef::new("d1", "l1")])
        .unwrap();
    let change = store.clear_slot("legend").unwrap();

    assert!(change.query_relevant);
    assert!(!store.snapshot().get("legend").unwrap().is_filled());
}

#[test]
fn test_concurrent_writers_are_totally_ordered() {
    let store = store();
    let handles = (0..8)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|j| {
                        store
                            .set_slot_content(
                                "legend",
                                vec![ColumnRef::new("d1", format!("c{i}-{j}"))],
                            )
                            .unwrap()
                            .revision
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    let revisions = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect::<HashSet<_>>();

    assert_eq!(revisions.len(), 200);
    assert_eq!(store.snapshot().revision(), 200);
}

proptest! {
    #[test]
    fn prop_other_slots_untouched(
        column in "[a-z]{1,8}",
        format in proptest::option::of("[,.0-9f]{1,5}"),
    ) {
        let store = SlotStore::new(vec![
            SlotConfig::new("category", SlotType::Categorical).required(),
            SlotConfig::new("measure", SlotType::Numeric).required(),
        ]);
        store.set_slot_content("category", vec![ColumnRef::new("d1", "cat")]).unwrap();
        let before = store.snapshot();

        let mut dropped = ColumnRef::new("d1", column);
        dropped.format = format;
        store.set_slot_content("measure", vec![dropped]).unwrap();
        let after = store.snapshot();

        prop_assert_eq!(before.get("category"), after.get("category"));
        prop_assert_eq!(after.revision(), before.revision() + 1);
    }
}
