use byteorder::{LittleEndian, WriteBytesExt};
use command::Command;
use std::fs::{rename, OpenOptions};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crate::format::{Position, TableMetaInfo, MAGIC, VERSION};
use crate::SstableError;

/// Writes a sorted sequence of [`Command`]s to disk as an immutable
/// SSTable file.
///
/// The writer is stateless — all work happens inside
/// [`SsTableWriter::build_from_sorted`]. The write is crash-safe: data is
/// first written to a temporary file, fsynced, and only then atomically
/// renamed into place, so a crash mid-write leaves the target path either
/// absent or holding the previous complete file.
pub struct SsTableWriter;

impl SsTableWriter {
    /// Builds a new SSTable at `path` from `commands`, which must yield
    /// [`Command`]s with strictly increasing keys.
    ///
    /// Partitions are at most `part_size` commands each. Returns
    /// [`SstableError::DuplicateKey`] if two consecutive commands share a
    /// key (or arrive out of order), and any I/O failure as
    /// [`SstableError::Io`].
    pub fn build_from_sorted<I>(
        path: &Path,
        part_size: usize,
        commands: I,
    ) -> Result<(), SstableError>
    where
        I: IntoIterator<Item = Command>,
    {
        assert!(part_size > 0, "part_size must be positive");

        let tmp_path = path.with_extension("sst.tmp");
        let raw_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut file = BufWriter::new(raw_file);

        let mut index: Vec<(Vec<u8>, Position)> = Vec::new();
        let mut partition: Vec<Command> = Vec::new();
        let mut last_key: Option<Vec<u8>> = None;

        for cmd in commands {
            let key = cmd.key().to_vec();
            if let Some(prev) = &last_key {
                if key <= *prev {
                    return Err(SstableError::DuplicateKey(key));
                }
            }
            last_key = Some(key);

            partition.push(cmd);
            if partition.len() == part_size {
                let pos = write_partition(&mut file, &partition)?;
                let first_key = partition[0].key().to_vec();
                index.push((first_key, pos));
                partition.clear();
            }
        }
        if !partition.is_empty() {
            let pos = write_partition(&mut file, &partition)?;
            let first_key = partition[0].key().to_vec();
            index.push((first_key, pos));
        }

        let data_len = file.stream_position()?;
        let index_start = data_len;

        file.write_u32::<LittleEndian>(index.len() as u32)?;
        for (key, pos) in &index {
            file.write_u32::<LittleEndian>(key.len() as u32)?;
            file.write_all(key)?;
            file.write_u64::<LittleEndian>(pos.offset)?;
            file.write_u64::<LittleEndian>(pos.length)?;
        }

        let index_end = file.stream_position()?;
        let index_len = index_end - index_start;

        let footer = TableMetaInfo {
            version: VERSION,
            data_start: 0,
            data_len,
            index_start,
            index_len,
            part_size: part_size as u64,
            magic: MAGIC,
        };
        footer.write_to(&mut file)?;

        file.flush()?;
        file.into_inner()
            .map_err(|e| SstableError::Io(e.into_error()))?
            .sync_all()?;

        rename(&tmp_path, path)?;

        if let Some(parent) = path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}

/// Writes one partition blob (`[count][(key-frame, command-frame)]*`) and
/// returns its file-absolute [`Position`].
fn write_partition<W: Write + Seek>(
    file: &mut W,
    partition: &[Command],
) -> Result<Position, SstableError> {
    let start = file.stream_position()?;

    file.write_u32::<LittleEndian>(partition.len() as u32)?;
    for cmd in partition {
        let key = cmd.key();
        file.write_u32::<LittleEndian>(key.len() as u32)?;
        file.write_all(key)?;
        cmd.encode_to(file)
            .map_err(|e| SstableError::Io(into_io_error(e)))?;
    }

    let end = file.stream_position()?;
    Ok(Position {
        offset: start,
        length: end - start,
    })
}

fn into_io_error(e: command::CommandError) -> std::io::Error {
    match e {
        command::CommandError::Io(io) => io,
        other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
    }
}
