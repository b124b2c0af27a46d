//! Write path: `set`, `remove`, and the internal flush (rotation) protocol.

use command::Command;
use memtable::Memtable;
use sstable::SsTableWriter;
use std::sync::Arc;
use tracing::{debug, warn};
use wal::WalWriter;

use crate::{frozen_wal_path, sst_path, Engine, EngineError, ACTIVE_WAL_NAME};

impl Engine {
    /// Inserts (or overwrites) `key` with `value`.
    ///
    /// The command is appended to the WAL and fsynced before this call
    /// returns, then applied to the active memory table. If the memory
    /// table's distinct-key count now exceeds the configured threshold, a
    /// flush runs synchronously before `set` returns.
    pub fn set(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), EngineError> {
        self.write_command(Command::Set { key, value })
    }

    /// Marks `key` as deleted. Never errors on an absent key — the
    /// tombstone is recorded regardless, so it can shadow an older `Set`
    /// once one or both reach an SSTable.
    pub fn remove(&self, key: Vec<u8>) -> Result<(), EngineError> {
        self.write_command(Command::Remove { key })
    }

    fn write_command(&self, command: Command) -> Result<(), EngineError> {
        let needs_flush = {
            let mut inner = self.inner.write().map_err(crate::poison_to_illegal)?;
            inner.check_usable()?;

            if let Err(e) = inner.wal_writer_mut().append(&command) {
                inner.poisoned = true;
                return Err(e.into());
            }
            inner.active.insert(command);
            inner.active.len() > inner.threshold
        };

        if needs_flush {
            self.flush()?;
        }
        Ok(())
    }

    /// Runs the rotation (flush) protocol. Held for its entire duration —
    /// including the lock-free build in step 2 — by `flush_guard`, so at
    /// most one flush is ever in flight: a second caller whose own
    /// `active` also crossed the threshold waits here rather than
    /// freezing a second table while the first's build is still running.
    ///
    /// 1. **Freeze** — swap the active memory table out for an empty one,
    ///    publish the old one as `frozen` (so reads still see it), rename
    ///    the active WAL file aside under a name unique to this flush, and
    ///    open a fresh WAL at the active path. All under the exclusive
    ///    lock.
    /// 2. **Build** — outside the lock, stream the frozen table's commands
    ///    (already key-ordered) into a new SSTable and fsync it.
    /// 3. **Publish** — retake the lock, insert the new SSTable at the
    ///    front of the newest-first list, drop `frozen`, and delete the
    ///    WAL that was set aside in step 1 along with any earlier frozen
    ///    WALs left over from a crash before a previous flush published.
    ///
    /// A crash between steps 1 and 3 is survived by recovery: an SSTable
    /// that never reached a valid footer is discarded on reopen, and the
    /// set-aside WAL (if still present) is replayed again, which is safe
    /// because commands overwrite by key.
    pub(crate) fn flush(&self) -> Result<(), EngineError> {
        let _flush_permit = self.flush_guard.lock().map_err(crate::poison_to_illegal)?;

        let (frozen, seq, dir, part_size, this_frozen_wal_path, to_retire) = {
            let mut inner = self.inner.write().map_err(crate::poison_to_illegal)?;
            inner.check_usable()?;

            if inner.active.is_empty() && inner.retired_wal_paths.is_empty() {
                return Ok(());
            }

            let mut fresh = Memtable::new();
            std::mem::swap(&mut inner.active, &mut fresh);
            let frozen = Arc::new(fresh);
            inner.frozen = Some(Arc::clone(&frozen));

            let seq = inner.next_seq;
            inner.next_seq += 1;

            let active_wal_path = inner.dir.join(ACTIVE_WAL_NAME);
            let this_frozen_wal_path = frozen_wal_path(&inner.dir, seq);

            if let Err(e) = std::fs::rename(&active_wal_path, &this_frozen_wal_path) {
                inner.poisoned = true;
                return Err(e.into());
            }
            match WalWriter::create(&active_wal_path) {
                Ok(w) => inner.wal_writer = Some(w),
                Err(e) => {
                    inner.poisoned = true;
                    return Err(e.into());
                }
            }

            let to_retire = std::mem::take(&mut inner.retired_wal_paths);

            (
                frozen,
                seq,
                inner.dir.clone(),
                inner.part_size,
                this_frozen_wal_path,
                to_retire,
            )
        };

        let sst_path = sst_path(&dir, seq);
        let build_result = SsTableWriter::build_from_sorted(&sst_path, part_size, frozen.iter().cloned())
            .and_then(|()| sstable::SsTableReader::open(&sst_path));

        let reader = match build_result {
            Ok(reader) => reader,
            Err(e) => {
                let mut inner = self.inner.write().map_err(crate::poison_to_illegal)?;
                inner.poisoned = true;
                return Err(e.into());
            }
        };

        {
            let mut inner = self.inner.write().map_err(crate::poison_to_illegal)?;
            inner.sstables.insert(0, reader);
            inner.frozen = None;
            for path in std::iter::once(&this_frozen_wal_path).chain(to_retire.iter()) {
                if let Err(e) = std::fs::remove_file(path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to retire frozen wal after flush"
                        );
                    }
                }
            }
        }

        debug!(seq, path = %sst_path.display(), "flush complete");
        Ok(())
    }
}
