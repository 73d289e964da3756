//! Shared fixtures for binding integration tests.

#![allow(dead_code)]

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use docbind::{Binding, BindingTarget, MemoryStore, Phase, ResultEnvelope};
use docbind_api::{record, DocumentRef, Record, Value};

/// Upper bound for any wait on a live binding.
pub const WAIT: Duration = Duration::from_secs(5);

/// Users `u1`..`u3` and tasks referencing them as `requester`.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .seed_json(serde_json::json!({
            "users": {
                "u1": {"name": "Ana", "role": "Requester"},
                "u2": {"name": "Bruno", "role": "Helper"},
                "u3": {"name": "Chen", "role": "Requester"}
            },
            "tasks": {
                "t01": {"title": "Deep clean kitchen", "category": "Cleaning", "budget": 120, "requester": {"$ref": "users/u1"}},
                "t02": {"title": "Wash windows", "category": "Cleaning", "budget": 45, "requester": {"$ref": "users/u2"}},
                "t03": {"title": "Mow lawn", "category": "Gardening", "budget": 60, "requester": {"$ref": "users/u1"}},
                "t04": {"title": "Clean garage", "category": "Cleaning", "budget": 200, "requester": {"$ref": "users/u3"}},
                "t05": {"title": "Vacuum stairs", "category": "Cleaning", "budget": 30, "requester": {"$ref": "users/u2"}},
                "t06": {"title": "Plant roses", "category": "Gardening", "budget": 90, "requester": {"$ref": "users/u3"}}
            }
        }))
        .expect("seed fixture");
    store
}

/// Add `count` extra cleaning tasks with distinct budgets.
pub fn add_cleaning_tasks(store: &MemoryStore, count: usize) {
    for i in 0..count {
        store.set(
            &DocumentRef::new("tasks", &format!("extra{:02}", i)),
            record([
                ("title", Value::from(format!("Extra chore {}", i))),
                ("category", Value::from("Cleaning")),
                ("budget", Value::from(1000 + i as i64)),
                ("requester", Value::from(DocumentRef::new("users", "u1"))),
            ]),
        );
    }
}

pub async fn settle<T: BindingTarget>(binding: &Binding<T>) -> ResultEnvelope<T::Data> {
    tokio::time::timeout(WAIT, binding.watch().settled())
        .await
        .expect("binding did not settle in time")
        .expect("binding closed")
}

pub async fn wait_for_phase<T: BindingTarget>(
    binding: &Binding<T>,
    phase: Phase,
) -> ResultEnvelope<T::Data> {
    tokio::time::timeout(WAIT, binding.watch().wait_until(|_, p| p == phase))
        .await
        .expect("phase not reached in time")
        .expect("binding closed")
}

pub async fn wait_for_data<T, F>(binding: &Binding<T>, mut condition: F) -> T::Data
where
    T: BindingTarget,
    F: FnMut(&T::Data) -> bool,
{
    tokio::time::timeout(
        WAIT,
        binding
            .watch()
            .wait_until(|envelope, _| !envelope.loading && condition(&envelope.data)),
    )
    .await
    .expect("data condition not reached in time")
    .expect("binding closed")
    .data
}

pub fn ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

pub fn field<'a>(record: &'a Record, name: &str) -> &'a Value {
    record
        .get(name)
        .unwrap_or_else(|| panic!("record has no field '{}'", name))
}

pub fn assert_no_references<D: Debug>(records: &[Record], context: D) {
    for record in records {
        for (name, value) in record {
            assert!(
                !value.is_reference(),
                "field '{}' still holds a reference ({:?})",
                name,
                context
            );
        }
    }
}
