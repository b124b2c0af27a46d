//! Cold-start path: SSTable discovery and WAL replay.

use config::EngineConfig;
use memtable::Memtable;
use sstable::{SsTableReader, SstableError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};
use wal::{WalError, WalReader, WalWriter};

use crate::{parse_frozen_wal_seq, Engine, EngineError, EngineInner, ACTIVE_WAL_NAME};

impl Engine {
    /// Opens (or creates) an engine rooted at `dir`.
    ///
    /// Scans `dir` for existing SSTables, discarding any whose footer fails
    /// to validate (the remnant of a crash mid-flush). Replays every
    /// leftover frozen WAL (oldest first — each is the remnant of a flush
    /// that renamed the active WAL aside but crashed before its SSTable was
    /// registered) and then the active WAL, into one fresh memory table.
    /// The leftover frozen WALs are kept on disk, not deleted, until the
    /// next flush durably covers them too (see [`crate::write::flush`]). If
    /// replay leaves more than `threshold` entries, an immediate flush runs
    /// before `open` returns, so callers never observe a memory table
    /// already over budget.
    pub fn open<P: AsRef<Path>>(dir: P, config: EngineConfig) -> Result<Engine, EngineError> {
        let dir = dir.as_ref().to_path_buf();
        let EngineConfig { part_size, threshold } = config;
        std::fs::create_dir_all(&dir)?;

        let (sstables, max_sst_seq) = load_sstables(&dir)?;
        let (retired_wal_paths, max_frozen_seq) = discover_frozen_wals(&dir)?;

        let active_wal_path = dir.join(ACTIVE_WAL_NAME);

        let mut active = Memtable::new();
        // Frozen WALs predate active chronologically; replay them first (in
        // the order they were produced) so any key active also touched
        // correctly overwrites it.
        for path in &retired_wal_paths {
            replay_into(path, &mut active)?;
        }
        replay_into(&active_wal_path, &mut active)?;

        let wal_writer = WalWriter::create(&active_wal_path)?;

        debug!(
            path = %dir.display(),
            sstables = sstables.len(),
            retired_wals = retired_wal_paths.len(),
            replayed = active.len(),
            "engine opened"
        );

        let inner = EngineInner {
            dir,
            part_size,
            threshold,
            active,
            frozen: None,
            sstables,
            next_seq: max_sst_seq.max(max_frozen_seq) + 1,
            wal_writer: Some(wal_writer),
            closed: false,
            poisoned: false,
            retired_wal_paths,
        };

        let engine = Engine {
            inner: Arc::new(RwLock::new(inner)),
            flush_guard: Arc::new(Mutex::new(())),
        };

        let needs_flush = {
            let inner = engine.inner.read().map_err(crate::poison_to_illegal)?;
            inner.active.len() > inner.threshold || !inner.retired_wal_paths.is_empty()
        };
        if needs_flush {
            warn!("replayed memory table exceeds threshold or has retired wals pending; flushing before serving writes");
            engine.flush()?;
        }

        Ok(engine)
    }

    /// Closes file handles in order: the WAL writer first, then SSTables.
    ///
    /// Does not flush the memory table — recovery relies entirely on WAL
    /// replay. Calling `close` on an already-closed engine surfaces
    /// `IllegalState`, as does calling it while a flush is in progress: a
    /// flush's SSTable build runs with the engine's main lock released, so
    /// `close` detects that case with a non-blocking attempt on
    /// [`Engine`]'s `flush_guard` rather than racing the flush's publish
    /// step.
    pub fn close(&self) -> Result<(), EngineError> {
        let _flush_permit = match self.flush_guard.try_lock() {
            Ok(permit) => permit,
            Err(std::sync::TryLockError::WouldBlock) => {
                return Err(EngineError::IllegalState(
                    "close called while a flush is in progress".into(),
                ))
            }
            Err(std::sync::TryLockError::Poisoned(_)) => {
                return Err(EngineError::IllegalState(
                    "engine poisoned by a panicking flush".into(),
                ))
            }
        };

        let mut inner = self.inner.write().map_err(crate::poison_to_illegal)?;
        if inner.closed {
            return Err(EngineError::IllegalState(
                "close called on an already-closed engine".into(),
            ));
        }
        inner.closed = true;
        inner.wal_writer.take();
        inner.frozen = None;
        inner.sstables.clear();
        Ok(())
    }
}

fn load_sstables(dir: &Path) -> Result<(Vec<SsTableReader>, u64), EngineError> {
    let mut candidates: Vec<(u64, std::path::PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sst") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Ok(seq) = stem.parse::<u64>() else {
            continue;
        };
        candidates.push((seq, path));
    }

    let max_seq = candidates.iter().map(|(seq, _)| *seq).max().unwrap_or(0);
    // Newest (largest seq) first, matching the engine's read precedence.
    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let mut sstables = Vec::with_capacity(candidates.len());
    for (seq, path) in candidates {
        match SsTableReader::open(&path) {
            Ok(reader) => sstables.push(reader),
            Err(SstableError::CorruptTable(reason)) => {
                warn!(
                    seq,
                    path = %path.display(),
                    reason,
                    "discarding sstable with an invalid footer during recovery"
                );
            }
            Err(SstableError::Io(e)) => return Err(EngineError::Io(e)),
            Err(SstableError::DuplicateKey(_)) => {
                unreachable!("open() never produces DuplicateKey")
            }
        }
    }

    Ok((sstables, max_seq))
}

/// Scans `dir` for leftover frozen WAL files (`wal.tmp.<seq>`), the remnant
/// of a flush that renamed the active WAL aside but crashed before
/// publishing its SSTable. Returns them sorted oldest-first alongside the
/// greatest seq found (0 if none), for folding into `next_seq`.
fn discover_frozen_wals(dir: &Path) -> Result<(Vec<PathBuf>, u64), EngineError> {
    let mut candidates: Vec<(u64, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(seq) = parse_frozen_wal_seq(name) else {
            continue;
        };
        candidates.push((seq, path));
    }

    let max_seq = candidates.iter().map(|(seq, _)| *seq).max().unwrap_or(0);
    candidates.sort_by_key(|(seq, _)| *seq);

    Ok((candidates.into_iter().map(|(_, path)| path).collect(), max_seq))
}

fn replay_into(path: &Path, mem: &mut Memtable) -> Result<(), EngineError> {
    match WalReader::open(path) {
        Ok(mut reader) => {
            for command in reader.replay()? {
                mem.insert(command);
            }
            Ok(())
        }
        Err(WalError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
