//! Read path: `get`.
//!
//! Point lookups walk memory-table precedence before touching disk: active
//! memory table, then the frozen one (present only mid-flush), then
//! SSTables newest-first. The whole walk happens under one shared lock
//! acquisition so it observes a consistent snapshot.

use command::Command;

use crate::{Engine, EngineError};

impl Engine {
    /// Looks up `key`.
    ///
    /// Returns `Ok(Some(value))` if the most recent command for `key` is a
    /// `Set`, `Ok(None)` if it's a `Remove` (tombstone) or `key` isn't
    /// present anywhere. A transient I/O failure reading an individual
    /// SSTable is surfaced to the caller without poisoning the engine —
    /// unlike the write path, a failed read doesn't risk any divergence
    /// between memory and disk.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        let inner = self.inner.read().map_err(crate::poison_to_illegal)?;
        inner.check_usable()?;

        if let Some(command) = inner.active.get(key) {
            return Ok(resolve(command));
        }
        if let Some(frozen) = &inner.frozen {
            if let Some(command) = frozen.get(key) {
                return Ok(resolve(command));
            }
        }
        for sstable in &inner.sstables {
            if let Some(command) = sstable.get(key)? {
                return Ok(resolve(&command));
            }
        }
        Ok(None)
    }
}

fn resolve(command: &Command) -> Option<Vec<u8>> {
    match command {
        Command::Set { value, .. } => Some(value.clone()),
        Command::Remove { .. } => None,
    }
}
