use byteorder::{LittleEndian, ReadBytesExt};
use command::{Command, DecodedFrame};
use std::collections::BTreeMap;
use std::fs::File;
use std::ops::Bound::{Excluded, Unbounded};
use std::path::{Path, PathBuf};

use crate::format::{Position, TableMetaInfo, FOOTER_SIZE};
use crate::pread::read_exact_at;
use crate::SstableError;

/// An opened, immutable SSTable file.
///
/// [`open`](SsTableReader::open) loads the sparse index into memory; the
/// data section stays on disk and is only touched by
/// [`get`](SsTableReader::get). The file handle is kept for the reader's
/// lifetime and read through explicit-offset I/O (see [`crate::pread`]), so
/// a single `&SsTableReader` can serve concurrent lookups from multiple
/// threads without any locking.
pub struct SsTableReader {
    #[allow(dead_code)]
    path: PathBuf,
    file: File,
    index: BTreeMap<Vec<u8>, Position>,
    footer: TableMetaInfo,
}

impl SsTableReader {
    /// Opens an SSTable, reading and validating its footer and loading the
    /// sparse index into memory.
    ///
    /// Fails with [`SstableError::CorruptTable`] if the footer's magic,
    /// version, or layout invariants don't hold, or if the index fails to
    /// decode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SstableError> {
        let path_buf = path.as_ref().to_path_buf();
        let file = File::open(&path_buf)?;
        let file_size = file.metadata()?.len();

        if file_size < FOOTER_SIZE {
            return Err(SstableError::CorruptTable(
                "file too small to contain a footer".into(),
            ));
        }

        let mut footer_buf = vec![0u8; FOOTER_SIZE as usize];
        read_exact_at(&file, &mut footer_buf, file_size - FOOTER_SIZE)?;
        let footer = TableMetaInfo::read_from(&mut &footer_buf[..])?;
        footer
            .validate(file_size)
            .map_err(SstableError::CorruptTable)?;

        let mut index_buf = vec![0u8; footer.index_len as usize];
        read_exact_at(&file, &mut index_buf, footer.index_start)?;
        let index = decode_index(&index_buf)?;

        Ok(Self {
            path: path_buf,
            file,
            index,
            footer,
        })
    }

    /// Point lookup for `key`.
    ///
    /// Finds the partition whose first key is the greatest one `<= key`
    /// (the "lower" partition) via one binary search over the in-memory
    /// index. Since the sparse index only records partition starts, `key`
    /// may also fall in the lower partition's *successor* if it sorts
    /// after all of the lower partition's keys but the lower partition
    /// doesn't cover it fully; rather than decode to find out, we simply
    /// read both candidate partitions (lower and, if present, the next
    /// one) in a single I/O and scan. Returns `Ok(None)` if `key` sorts
    /// before the table's first key or isn't present in either partition.
    pub fn get(&self, key: &[u8]) -> Result<Option<Command>, SstableError> {
        let lower = self.index.range(..=key.to_vec()).next_back();
        let (_, l_pos) = match lower {
            Some(pair) => pair,
            None => return Ok(None),
        };

        let upper = self.index.range((Excluded(key.to_vec()), Unbounded)).next();
        let read_start = l_pos.offset;
        let read_end = match upper {
            Some((_, u_pos)) => u_pos.offset + u_pos.length,
            None => l_pos.offset + l_pos.length,
        };

        let mut buf = vec![0u8; (read_end - read_start) as usize];
        read_exact_at(&self.file, &mut buf, read_start)?;

        let mut cur = &buf[..];
        while !cur.is_empty() {
            let entries = decode_partition(&mut cur)?;
            if let Some((_, cmd)) = entries.into_iter().find(|(k, _)| k.as_slice() == key) {
                return Ok(Some(cmd));
            }
        }
        Ok(None)
    }

    /// Number of partitions in the sparse index.
    pub fn partition_count(&self) -> usize {
        self.index.len()
    }

    /// The `part_size` this table was built with.
    pub fn part_size(&self) -> u64 {
        self.footer.part_size
    }
}

fn decode_index(buf: &[u8]) -> Result<BTreeMap<Vec<u8>, Position>, SstableError> {
    let mut cur = buf;
    let count = cur.read_u32::<LittleEndian>()?;
    let mut index = BTreeMap::new();
    for _ in 0..count {
        let key_len = cur.read_u32::<LittleEndian>()? as usize;
        if key_len > cur.len() {
            return Err(SstableError::CorruptTable(
                "index key length exceeds remaining bytes".into(),
            ));
        }
        let mut key = vec![0u8; key_len];
        cur.read_exact(&mut key)?;
        let offset = cur.read_u64::<LittleEndian>()?;
        let length = cur.read_u64::<LittleEndian>()?;
        index.insert(key, Position { offset, length });
    }
    Ok(index)
}

fn decode_partition(cur: &mut &[u8]) -> Result<Vec<(Vec<u8>, Command)>, SstableError> {
    let count = cur.read_u32::<LittleEndian>()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key_len = cur.read_u32::<LittleEndian>()? as usize;
        if key_len > cur.len() {
            return Err(SstableError::CorruptTable(
                "partition entry key length exceeds remaining bytes".into(),
            ));
        }
        let mut key = vec![0u8; key_len];
        cur.read_exact(&mut key)?;
        let cmd = match Command::decode_from(cur)? {
            DecodedFrame::Command(cmd) => cmd,
            DecodedFrame::Eof | DecodedFrame::Truncated => {
                return Err(SstableError::CorruptTable(
                    "truncated command frame inside partition".into(),
                ))
            }
        };
        entries.push((key, cmd));
    }
    Ok(entries)
}
