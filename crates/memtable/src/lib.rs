//! # Memtable
//!
//! An in-memory, sorted, mutable write buffer for the storage engine.
//!
//! The memtable is the first point of contact for every write operation. It
//! buffers recent `Set` and `Remove` commands in a sorted structure
//! (`BTreeMap`) before they are flushed to an immutable on-disk SSTable.
//!
//! ## Key properties
//! - **Sorted order**: entries are always in ascending key order (required
//!   for SSTable flush — a sparse index needs first-key-per-partition to be
//!   meaningful).
//! - **Latest wins**: inserting over an existing key replaces it, regardless
//!   of whether the new command is a `Set` or a `Remove`.
//! - **Tombstone support**: deletes are retained (not dropped) so they can
//!   shadow older `Set`s once flushed to an SSTable.
//! - **Key-count size**: `len()` is the bound the engine checks against its
//!   flush threshold — one entry per distinct key, not a byte budget.
//!
//! ## Example
//! ```rust
//! use memtable::Memtable;
//! use command::Command;
//!
//! let mut m = Memtable::new();
//! m.insert(Command::Set { key: b"hello".to_vec(), value: b"world".to_vec() });
//! assert!(!m.get(b"hello").unwrap().is_tombstone());
//!
//! m.insert(Command::Remove { key: b"hello".to_vec() });
//! assert!(m.get(b"hello").unwrap().is_tombstone());
//! ```

use command::Command;
use std::collections::BTreeMap;

/// An ordered, in-memory write buffer backed by a `BTreeMap`.
///
/// At most one [`Command`] is retained per key — the latest insertion wins,
/// whether it is a `Set` or a `Remove`. The map's length (a count of
/// distinct keys, not a byte size) is what the engine compares against its
/// configured threshold to decide when to rotate.
#[derive(Debug, Default)]
pub struct Memtable {
    map: BTreeMap<Vec<u8>, Command>,
}

impl Memtable {
    /// Creates a new, empty memtable.
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    /// Inserts a command, replacing any existing entry for the same key.
    pub fn insert(&mut self, command: Command) {
        self.map.insert(command.key().to_vec(), command);
    }

    /// Returns the command stored for `key`, if any. The result may be a
    /// tombstone (`Command::Remove`) — callers that only want live values
    /// should check [`Command::is_tombstone`].
    pub fn get(&self, key: &[u8]) -> Option<&Command> {
        self.map.get(key)
    }

    /// Returns `true` if `key` has an entry (live or tombstone).
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Returns an iterator over all commands in **ascending key order**.
    ///
    /// Includes tombstones. The ordering guarantee comes from the
    /// underlying `BTreeMap` and is required for a correct SSTable flush.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.map.values()
    }

    /// Number of distinct keys held (including tombstones). This is the
    /// "size" the engine compares against its rotation threshold.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` if the memtable holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drains all entries in ascending key order, leaving the memtable
    /// empty. Used when freezing a memtable for flush: the caller takes
    /// ownership of the sorted commands without a second clone pass.
    pub fn drain_sorted(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.map).into_values().collect()
    }
}
