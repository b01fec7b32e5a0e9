//! The remote event store, seen only through its contract.

mod http;
mod memory;

pub use http::{HttpStore, HttpTable};
pub use memory::{MemoryStore, MemoryTable};

use crate::error::{CommitError, StoreError};
use crate::event::{Event, EventId};

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum TableResolution {
    /// Use the table as it is; fail when it does not exist.
    #[default]
    RequireExisting,
    /// Drop the table if it exists, then create it empty.
    Recreate,
}

pub trait EventStore {
    type Table: Table;

    /// Liveness check, performed once before any ingestion.
    fn ping(&self) -> bool;

    fn resolve_table(
        &self,
        name: &str,
        resolution: TableResolution,
    ) -> Result<Self::Table, StoreError>;
}

pub trait Table {
    fn name(&self) -> &str;

    /// Writes `event` at (`object_id`, `event.timestamp`). When an event
    /// already exists there, the stored properties are combined with the new
    /// ones and the new values win on conflicting keys.
    fn commit_merge(&self, object_id: &EventId, event: &Event) -> Result<(), CommitError>;
}

impl<T: Table + ?Sized> Table for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn commit_merge(&self, object_id: &EventId, event: &Event) -> Result<(), CommitError> {
        (**self).commit_merge(object_id, event)
    }
}

impl<T: Table + ?Sized> Table for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn commit_merge(&self, object_id: &EventId, event: &Event) -> Result<(), CommitError> {
        (**self).commit_merge(object_id, event)
    }
}
