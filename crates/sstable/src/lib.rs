//! # SSTable - Sorted String Table
//!
//! Immutable, on-disk storage files for the key-value engine.
//!
//! When the in-memory `Memtable` reaches its distinct-key threshold the
//! engine flushes it to disk as an SSTable. SSTables are *write-once,
//! read-many* — once created they are never modified (there is no
//! compaction in this engine; old SSTables accumulate and are only ever
//! read, newest first).
//!
//! ## File layout
//!
//! ```text
//! [DATA: partition blob]*  [INDEX: sparse-index blob]  [FOOTER: 56 bytes]
//! ```
//!
//! See [`format`] for the exact byte layout of each section. The data
//! section is split into fixed-size partitions (at most `part_size`
//! commands each); the index records one (first key, byte range) pair per
//! partition rather than one entry per key, so the index stays small and a
//! point lookup costs at most two partition reads.

mod format;
mod pread;
mod reader;
mod writer;

pub use format::{Position, TableMetaInfo, FOOTER_SIZE, MAGIC, VERSION};
pub use reader::SsTableReader;
pub use writer::SsTableWriter;

use thiserror::Error;

/// Errors produced by building or reading an SSTable.
#[derive(Debug, Error)]
pub enum SstableError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// `build_from_sorted` was given a non-increasing key sequence.
    #[error("duplicate or out-of-order key: {0:?}")]
    DuplicateKey(Vec<u8>),

    /// The file's footer, index, or partition framing did not validate.
    #[error("corrupt sstable: {0}")]
    CorruptTable(String),
}

impl From<command::CommandError> for SstableError {
    fn from(e: command::CommandError) -> Self {
        match e {
            command::CommandError::Io(io) => SstableError::Io(io),
            command::CommandError::CorruptFrame(msg) => SstableError::CorruptTable(msg),
        }
    }
}

#[cfg(test)]
mod tests;
