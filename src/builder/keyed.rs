use std::{collections::HashMap, hash::Hash};

use derive_ex::derive_ex;
use slabmap::SlabMap;

use crate::{ChangeError, KeyedEntry};


/// Accumulates the edits of one batch of set or map mutations.
///
/// Holds at most one entry per key. An addition and a removal of the same key
/// within one batch cancel out, a removal followed by an addition becomes a
/// replacement.
#[derive_ex(Default)]
#[default(Self::new())]
pub struct KeyedChangeBuilder<K, V> {
    depth: usize,
    entries: SlabMap<KeyedEntry<K, V>>,
    index: HashMap<K, usize>,
}

impl<K, V> KeyedChangeBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            depth: 0,
            entries: SlabMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash, V> KeyedChangeBuilder<K, V> {
    pub fn depth(&self) -> usize {
        self.depth
    }
    pub fn is_in_batch(&self) -> bool {
        self.depth != 0
    }
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn begin_change(&mut self) {
        self.depth += 1;
        tracing::trace!(depth = self.depth, "begin change");
    }
    pub fn end_change(&mut self) -> Result<Option<Vec<KeyedEntry<K, V>>>, ChangeError> {
        self.check_state()?;
        Ok(self.close())
    }
    pub(crate) fn close(&mut self) -> Option<Vec<KeyedEntry<K, V>>> {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
        tracing::trace!(depth = self.depth, "end change");
        if self.depth != 0 || self.index.is_empty() {
            return None;
        }
        self.index.clear();
        let entries: Vec<_> = self.entries.drain().map(|(_, e)| e).collect();
        tracing::trace!(entries = entries.len(), "commit change");
        Some(entries)
    }
    /// Leaves the current batch without committing; pending entries carry over.
    pub(crate) fn leave(&mut self) {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
        tracing::debug!(
            depth = self.depth,
            pending = self.index.len(),
            "left change without commit"
        );
    }
    fn check_state(&self) -> Result<(), ChangeError> {
        if self.depth == 0 {
            tracing::debug!("edit recorded outside of a batch");
            Err(ChangeError::NotInBatch)
        } else {
            Ok(())
        }
    }

    /// Records that `key` was added.
    pub fn next_add(&mut self, key: K) -> Result<(), ChangeError> {
        self.check_state()?;
        self.add(key);
        Ok(())
    }
    /// Records that `key` was removed; `old` is the value it held.
    pub fn next_remove(&mut self, key: K, old: V) -> Result<(), ChangeError> {
        self.check_state()?;
        self.remove(key, old);
        Ok(())
    }

    pub(crate) fn add(&mut self, key: K) {
        if let Some(&slot) = self.index.get(&key) {
            self.entries[slot].added = true;
            return;
        }
        let slot = self.entries.insert(KeyedEntry {
            key: key.clone(),
            removed: None,
            added: true,
        });
        self.index.insert(key, slot);
    }

    pub(crate) fn remove(&mut self, key: K, old: V) {
        let Some(&slot) = self.index.get(&key) else {
            let slot = self.entries.insert(KeyedEntry {
                key: key.clone(),
                removed: Some(old),
                added: false,
            });
            self.index.insert(key, slot);
            return;
        };
        let entry = &mut self.entries[slot];
        if entry.removed.is_some() {
            // Replaced earlier in this batch; `old` is an intermediate value.
            entry.added = false;
        } else {
            self.entries.remove(slot);
            self.index.remove(&key);
        }
    }
}
