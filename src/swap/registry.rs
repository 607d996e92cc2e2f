use std::collections::HashMap;

use tracing::debug;

use crate::swap::SwapRecord;

/// Ordered id -> record store for swaps attached to this session, fed by an
/// initial bulk snapshot plus the incremental event stream.
///
/// `order` holds insertion order and contains exactly the keys of `by_id`,
/// with no duplicates. Attach events insert-if-absent; state-change events
/// only overwrite the derived fields of an already known record.
#[derive(Debug, Default)]
pub struct SwapRegistry {
    order: Vec<String>,
    by_id: HashMap<String, SwapRecord>,
}

impl SwapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole registry with the swaps currently attached to the
    /// network. Called once at startup.
    pub fn load_initial(&mut self, records: Vec<SwapRecord>) {
        self.order.clear();
        self.by_id.clear();
        for record in records {
            self.on_attached(record);
        }
    }

    /// Insert a newly attached swap. Idempotent: a second attach for the
    /// same id leaves both the record and the ordering untouched.
    pub fn on_attached(&mut self, record: SwapRecord) {
        if self.by_id.contains_key(&record.id) {
            return;
        }
        self.order.push(record.id.clone());
        self.by_id.insert(record.id.clone(), record);
    }

    /// Overwrite the flow-state attributes of a known swap. The identity
    /// fields recorded at attach time are kept. Streams deliver attach
    /// before update, so an unknown id is dropped, never inserted.
    pub fn on_state_changed(&mut self, record: SwapRecord) {
        match self.by_id.get_mut(&record.id) {
            Some(existing) => existing.state_fields = record.state_fields,
            None => debug!(swap_id = %record.id, "state change for unknown swap, ignoring"),
        }
    }

    /// Records sorted by creation time, newest first. Swaps created at the
    /// same instant keep their insertion order.
    pub fn snapshot(&self) -> Vec<SwapRecord> {
        let mut records: Vec<&SwapRecord> = self
            .order
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .collect();
        records.sort_by(|a, b| b.created_unix.cmp(&a.created_unix));
        records.into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
