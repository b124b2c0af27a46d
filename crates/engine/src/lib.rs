//! # Engine
//!
//! The central orchestrator that ties [`memtable`], [`wal`], and [`sstable`]
//! together into a complete LSM-tree key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────┐
//! │                  ENGINE                   │
//! │                                           │
//! │ write.rs → WAL append → memtable insert   │
//! │              |                            │
//! │              |  (size > threshold?)       │
//! │              v                            │
//! │           flush() → new SSTable           │
//! │                                           │
//! │ read.rs → active → frozen → SSTables      │
//! │            (newest first, first match wins) │
//! └───────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module        | Purpose                                            |
//! |---------------|-----------------------------------------------------|
//! | [`lib.rs`]    | `Engine`, `EngineInner`, `EngineError`, shared locking |
//! | [`recovery`]  | WAL replay, SSTable discovery, cold-start flush     |
//! | [`write`]     | `set`, `remove`, internal `flush`                   |
//! | [`read`]      | `get`                                                |
//!
//! ## Crash safety
//!
//! Every mutation is appended to the active WAL, fsynced, before it is
//! applied to the memory table. A flush builds and fsyncs a new SSTable
//! before the WAL that covered it is deleted, so no acknowledged write can
//! be lost to a single crash (see [`write`] for the exact protocol and its
//! recovery cases).
//!
//! There is no compaction: SSTables accumulate one per flush and are read
//! newest-first. That tradeoff is deliberate, trading unbounded read-path
//! table growth for a much simpler and more obviously crash-safe write path.

mod read;
mod recovery;
#[cfg(test)]
mod tests;
mod write;

use memtable::Memtable;
use sstable::{SsTableReader, SstableError};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use wal::{WalError, WalWriter};

/// Errors surfaced by the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Underlying storage failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An SSTable's footer, index, or partition framing did not validate.
    #[error("corrupt sstable: {0}")]
    CorruptTable(String),

    /// A WAL frame was malformed in a way that isn't a truncated tail.
    #[error("corrupt wal frame: {0}")]
    CorruptFrame(String),

    /// `build_from_sorted` was asked to flush a memory table whose commands
    /// weren't strictly increasing by key. This indicates a bug in the
    /// memory table's ordering, not a caller error.
    #[error("duplicate or out-of-order key during flush: {0:?}")]
    DuplicateKey(Vec<u8>),

    /// The engine was used after `close`, `close` was called while another
    /// operation was in flight, or an earlier I/O failure poisoned it.
    #[error("illegal state: {0}")]
    IllegalState(String),
}

impl From<SstableError> for EngineError {
    fn from(e: SstableError) -> Self {
        match e {
            SstableError::Io(io) => EngineError::Io(io),
            SstableError::CorruptTable(msg) => EngineError::CorruptTable(msg),
            SstableError::DuplicateKey(key) => EngineError::DuplicateKey(key),
        }
    }
}

impl From<WalError> for EngineError {
    fn from(e: WalError) -> Self {
        match e {
            WalError::Io(io) => EngineError::Io(io),
            WalError::CorruptFrame(msg) => EngineError::CorruptFrame(msg),
        }
    }
}

fn poison_to_illegal<T>(_: PoisonError<T>) -> EngineError {
    EngineError::IllegalState("engine lock poisoned by a panicking operation".into())
}

/// All mutable engine state, guarded by a single readers/writer lock.
///
/// Readers walk `active`, then `frozen`, then `sstables` under one shared
/// acquisition so a `get` always sees a consistent snapshot.
pub(crate) struct EngineInner {
    dir: PathBuf,
    part_size: usize,
    threshold: usize,
    active: Memtable,
    /// Set only while a flush's SSTable build is in flight; readers
    /// consult this before falling through to `sstables`. `flush_guard`
    /// (see [`Engine`]) guarantees at most one flush runs at a time, so
    /// there is never more than one frozen table to track.
    frozen: Option<Arc<Memtable>>,
    /// Newest-first.
    sstables: Vec<SsTableReader>,
    next_seq: u64,
    wal_writer: Option<WalWriter>,
    closed: bool,
    /// Set when a write-path I/O failure leaves memory and disk
    /// potentially divergent; once set, all future `set`/`remove` calls
    /// are rejected rather than risk silently losing data.
    poisoned: bool,
    /// Frozen WAL files left behind by a flush that started before an
    /// earlier crash and never reached publish. Their commands are already
    /// folded into `active` by replay at open time, so they aren't needed
    /// for recovery anymore, but they can't be deleted until some future
    /// flush's SSTable durably covers them too. The next flush to run
    /// (forced or ordinary) retires all of them alongside its own frozen
    /// WAL.
    retired_wal_paths: Vec<PathBuf>,
}

impl EngineInner {
    fn wal_writer_mut(&mut self) -> &mut WalWriter {
        self.wal_writer
            .as_mut()
            .expect("wal_writer missing on an open engine")
    }

    fn check_usable(&self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::IllegalState("engine is closed".into()));
        }
        if self.poisoned {
            return Err(EngineError::IllegalState(
                "engine poisoned by a prior write-path failure".into(),
            ));
        }
        Ok(())
    }
}

/// A handle to an open key-value store.
///
/// Cheap to clone (an `Arc` around the shared state) so multiple threads
/// can hold independent handles to the same engine.
///
/// `flush_guard` serializes the entire freeze-build-publish sequence of
/// [`write::flush`](Engine::flush) across every clone of this handle: a
/// flush holds it for its full duration, including the lock-free SSTable
/// build, so at most one flush is ever in flight and `close` can detect one
/// with a non-blocking `try_lock` rather than racing it.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<RwLock<EngineInner>>,
    pub(crate) flush_guard: Arc<Mutex<()>>,
}

const ACTIVE_WAL_NAME: &str = "wal";
const FROZEN_WAL_PREFIX: &str = "wal.tmp.";
const SST_SEQ_WIDTH: usize = 20;

fn sst_file_name(seq: u64) -> String {
    format!("{:0width$}.sst", seq, width = SST_SEQ_WIDTH)
}

pub(crate) fn sst_path(dir: &std::path::Path, seq: u64) -> PathBuf {
    dir.join(sst_file_name(seq))
}

/// Each flush gets its own uniquely-named frozen WAL (seq-numbered, like
/// SSTables) rather than a single fixed `wal.tmp` path. With flushes fully
/// serialized, only one such file is ever "in flight" in ordinary
/// operation, but giving every flush its own name also means a leftover
/// file from a flush that crashed before publish is never mistaken for, or
/// clobbered by, a later flush's in-progress one.
fn frozen_wal_file_name(seq: u64) -> String {
    format!("{FROZEN_WAL_PREFIX}{:0width$}", seq, width = SST_SEQ_WIDTH)
}

pub(crate) fn frozen_wal_path(dir: &std::path::Path, seq: u64) -> PathBuf {
    dir.join(frozen_wal_file_name(seq))
}

/// Parses a frozen-WAL file name back into its seq number, if it matches
/// [`frozen_wal_file_name`]'s pattern.
pub(crate) fn parse_frozen_wal_seq(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(FROZEN_WAL_PREFIX)
        .and_then(|rest| rest.parse::<u64>().ok())
}
