use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{CommitError, StoreError};
use crate::event::{Event, EventId, EventTimestamp, RawRecord};

use super::{EventStore, Table, TableResolution};

type Events = BTreeMap<(EventId, EventTimestamp), RawRecord>;

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Events>,
    refused_objects: BTreeSet<String>,
    commits: usize,
}

/// In-process store with the same merge semantics as the server.
///
/// Clones share state, so a table handed to an importer can be inspected
/// through the store afterwards.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    alive: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            alive: true,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `ping` fails.
    pub fn unreachable() -> Self {
        Self {
            alive: false,
            ..Self::default()
        }
    }

    pub fn with_table(self, name: &str) -> Self {
        self.lock().tables.entry(name.to_string()).or_default();
        self
    }

    /// Every commit for `object_id` fails with a 500 from here on.
    pub fn refuse_object(&self, object_id: &str) {
        self.lock().refused_objects.insert(object_id.to_string());
    }

    pub fn events(&self, table: &str, object_id: &str) -> Vec<Event> {
        let state = self.lock();
        let Some(events) = state.tables.get(table) else {
            return Vec::new();
        };
        events
            .iter()
            .filter(|((id, _), _)| id.as_str() == object_id)
            .map(|((_, timestamp), data)| Event::new(*timestamp, data.clone()))
            .collect()
    }

    pub fn event_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, BTreeMap::len)
    }

    /// Successful commits across all tables, merges included.
    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventStore for MemoryStore {
    type Table = MemoryTable;

    fn ping(&self) -> bool {
        self.alive
    }

    fn resolve_table(
        &self,
        name: &str,
        resolution: TableResolution,
    ) -> Result<Self::Table, StoreError> {
        let mut state = self.lock();
        match resolution {
            TableResolution::RequireExisting if !state.tables.contains_key(name) => {
                return Err(StoreError::TableNotFound {
                    name: name.to_string(),
                });
            }
            TableResolution::RequireExisting => {}
            TableResolution::Recreate => {
                state.tables.insert(name.to_string(), Events::new());
            }
        }
        Ok(MemoryTable {
            name: name.to_string(),
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    state: Arc<Mutex<State>>,
}

impl Table for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn commit_merge(&self, object_id: &EventId, event: &Event) -> Result<(), CommitError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.refused_objects.contains(object_id.as_str()) {
            return Err(CommitError::Rejected {
                status: 500,
                body: format!("object {object_id} refused"),
            });
        }
        let Some(events) = state.tables.get_mut(&self.name) else {
            return Err(CommitError::Rejected {
                status: 404,
                body: format!("table {} not found", self.name),
            });
        };
        let stored = events
            .entry((object_id.clone(), event.timestamp))
            .or_default();
        for (key, value) in &event.data {
            stored.insert(key.clone(), value.clone());
        }
        state.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn event(ts: &str, data: Value) -> Event {
        let Value::Object(data) = data else {
            panic!("test data must be an object");
        };
        Event::new(EventTimestamp::parse_rfc3339(ts).unwrap(), data)
    }

    fn id(raw: &str) -> EventId {
        EventId::new(raw).unwrap()
    }

    #[test]
    fn merge_unions_disjoint_keys_and_later_values_win() {
        let store = MemoryStore::new().with_table("users");
        let table = store
            .resolve_table("users", TableResolution::RequireExisting)
            .unwrap();
        let ts = "2024-01-01T00:00:00Z";

        table.commit_merge(&id("u1"), &event(ts, json!({"a": 1, "b": 1}))).unwrap();
        table.commit_merge(&id("u1"), &event(ts, json!({"b": 2, "c": 3}))).unwrap();

        let events = store.events("users", "u1");
        assert_eq!(events.len(), 1);
        assert_eq!(
            Value::Object(events[0].data.clone()),
            json!({"a": 1, "b": 2, "c": 3})
        );
        assert_eq!(store.commit_count(), 2);
    }

    #[test]
    fn distinct_timestamps_are_distinct_events() {
        let store = MemoryStore::new().with_table("users");
        let table = store
            .resolve_table("users", TableResolution::RequireExisting)
            .unwrap();

        table
            .commit_merge(&id("u1"), &event("2024-01-01T00:00:00Z", json!({"a": 1})))
            .unwrap();
        table
            .commit_merge(&id("u1"), &event("2024-01-01T00:10:00Z", json!({"a": 2})))
            .unwrap();

        assert_eq!(store.events("users", "u1").len(), 2);
        assert_eq!(store.event_count("users"), 2);
    }

    #[test]
    fn resolution_policies() {
        let store = MemoryStore::new();
        assert_eq!(
            store
                .resolve_table("missing", TableResolution::RequireExisting)
                .unwrap_err(),
            StoreError::TableNotFound {
                name: "missing".to_string()
            }
        );

        let store = store.with_table("users");
        let table = store
            .resolve_table("users", TableResolution::RequireExisting)
            .unwrap();
        table
            .commit_merge(&id("u1"), &event("2024-01-01T00:00:00Z", json!({"a": 1})))
            .unwrap();

        store.resolve_table("users", TableResolution::Recreate).unwrap();
        assert_eq!(store.event_count("users"), 0);
    }

    #[test]
    fn refused_objects_fail_to_commit() {
        let store = MemoryStore::new().with_table("users");
        store.refuse_object("bad");
        let table = store
            .resolve_table("users", TableResolution::RequireExisting)
            .unwrap();

        let err = table
            .commit_merge(&id("bad"), &event("2024-01-01T00:00:00Z", json!({})))
            .unwrap_err();
        assert!(matches!(err, CommitError::Rejected { status: 500, .. }));
        assert!(!MemoryStore::unreachable().ping());
    }
}
