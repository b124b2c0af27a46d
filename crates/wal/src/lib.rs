//! # WAL — Write-Ahead Log
//!
//! Crash-safe durability for the storage engine. Every mutation is encoded
//! with [`command::Command::encode_to`] and appended to the active WAL
//! *before* the corresponding change lands in the memory table. On restart
//! the WAL is replayed to reconstruct the memory table, so no acknowledged
//! write is lost.
//!
//! ## Format
//!
//! The WAL is a flat concatenation of [`command`]'s length-prefixed frames —
//! no header, no record-level checksum. A truncated trailing frame (a crash
//! mid-append) is not an error: replay stops there and returns everything
//! read up to that point.
//!
//! ## Example
//!
//! ```rust,no_run
//! use command::Command;
//! use wal::{WalWriter, WalReader};
//!
//! let mut w = WalWriter::create("wal.log").unwrap();
//! w.append(&Command::Set { key: b"hello".to_vec(), value: b"world".to_vec() }).unwrap();
//! drop(w);
//!
//! let commands = WalReader::open("wal.log").unwrap().replay().unwrap();
//! ```

use command::{Command, CommandError, DecodedFrame};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors produced by WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A WAL frame was malformed in a way that isn't explained by a
    /// truncated tail (unknown command kind, missing subframe, ...).
    #[error("corrupt wal frame: {0}")]
    CorruptFrame(String),
}

impl From<CommandError> for WalError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::Io(io) => WalError::Io(io),
            CommandError::CorruptFrame(msg) => WalError::CorruptFrame(msg),
        }
    }
}

/// Append-only WAL writer.
///
/// Every [`append`](WalWriter::append) is followed by `flush` + `sync_all`
/// (fsync) — durability here is unconditional, not a configurable mode.
pub struct WalWriter {
    file: File,
    path: PathBuf,
}

impl WalWriter {
    /// Opens (or creates) a WAL file in append mode.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Self { file, path })
    }

    /// Encodes `command` and appends it to the WAL file, fsyncing before
    /// returning. Once this call returns `Ok`, the command is durable.
    pub fn append(&mut self, command: &Command) -> Result<(), WalError> {
        command.encode_to(&mut self.file)?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Closes the current WAL and replaces it with a fresh, empty file at
    /// the same path.
    ///
    /// Crash recovery relies on the engine keeping the prior WAL's contents
    /// around (under a different name) until the corresponding SSTable is
    /// durable; this call itself is just "truncate and start over" for
    /// whichever path it's pointed at.
    pub fn rotate(&mut self) -> Result<(), WalError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .read(true)
            .open(&self.path)?;
        self.file = file;
        Ok(())
    }

    /// Path this writer is appending to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Sequential WAL reader.
///
/// Generic over any [`Read`] implementor so tests can replay from an
/// in-memory buffer without touching the filesystem.
pub struct WalReader<R: Read> {
    rdr: BufReader<R>,
}

impl WalReader<File> {
    /// Opens an existing WAL file for replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<WalReader<File>, WalError> {
        let f = File::open(path)?;
        Ok(WalReader {
            rdr: BufReader::new(f),
        })
    }
}

impl<R: Read> WalReader<R> {
    /// Wraps an arbitrary reader for replay (used by tests).
    pub fn from_reader(reader: R) -> Self {
        WalReader {
            rdr: BufReader::new(reader),
        }
    }

    /// Replays every frame in the WAL and returns the commands in append
    /// order.
    ///
    /// - Clean EOF ends replay normally.
    /// - A truncated trailing frame ends replay normally too (a warning is
    ///   logged, not an error) — partial writes are never applied.
    /// - A frame that's malformed but not simply truncated (bad command
    ///   kind, missing subframe) also ends replay, with a warning, rather
    ///   than failing the caller: a misparsed frame can't be safely
    ///   resynced past, so everything read before it is still returned.
    /// - An I/O error is propagated.
    pub fn replay(&mut self) -> Result<Vec<Command>, WalError> {
        let mut commands = Vec::new();
        loop {
            match Command::decode_from(&mut self.rdr) {
                Ok(DecodedFrame::Command(cmd)) => commands.push(cmd),
                Ok(DecodedFrame::Eof) => break,
                Ok(DecodedFrame::Truncated) => {
                    warn!("wal tail truncated mid-frame; discarding partial write");
                    break;
                }
                Err(CommandError::CorruptFrame(msg)) => {
                    warn!(reason = %msg, "wal frame corrupt; stopping replay at last good frame");
                    break;
                }
                Err(CommandError::Io(e)) => return Err(WalError::Io(e)),
            }
        }
        Ok(commands)
    }
}

#[cfg(test)]
mod tests;
