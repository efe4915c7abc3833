//! # Summary
//!
//! The replicated application state: an append-only, slot-ordered chat
//! log. Each replica owns its own copy; convergence across replicas is
//! the protocol's correctness goal. Clients assemble their own view of
//! the log from the responses they receive.

use serde_derive::{Deserialize, Serialize};

/// An opaque client operation. Equality is structural: two commands are
/// the same exactly when client, client-local id, and payload all match.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Command {
    /// Issuing client's id
    pub client: usize,

    /// Client-local sequence number, unique per client
    pub c_id: usize,

    /// Opaque payload (a chat message in this application)
    pub op: String,
}

/// One executed slot: the decided command and the slot it filled.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateEntry {
    pub command: Command,
    pub s_id: usize,
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct State {
    entries: Vec<StateEntry>,
}

impl State {
    /// Appends the next executed slot. Replicas perform decisions in
    /// strict slot order, so entries always arrive in increasing slots.
    pub fn append(&mut self, entry: StateEntry) {
        self.entries.push(entry);
    }

    /// Merges an entry into a client-side view, keeping slot order and
    /// dropping duplicates. Responses may arrive more than once and out
    /// of order relative to other clients' slots.
    pub fn observe(&mut self, entry: StateEntry) {
        match self.entries.binary_search_by_key(&entry.s_id, |e| e.s_id) {
            Ok(_) => (),
            Err(index) => self.entries.insert(index, entry),
        }
    }

    pub fn entries(&self) -> &[StateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(s_id: usize, op: &str) -> StateEntry {
        StateEntry {
            command: Command {
                client: 0,
                c_id: s_id,
                op: op.to_string(),
            },
            s_id,
        }
    }

    #[test]
    fn observe_orders_and_deduplicates() {
        let mut state = State::default();
        state.observe(entry(2, "b"));
        state.observe(entry(1, "a"));
        state.observe(entry(2, "b"));
        state.observe(entry(3, "c"));
        let slots: Vec<usize> = state.entries().iter().map(|e| e.s_id).collect();
        assert_eq!(slots, vec![1, 2, 3]);
    }
}
