//! SSTable binary format: partitions, sparse index, and the fixed footer.
//!
//! ```text
//! [DATA: partition blob]*  [INDEX: sparse-index blob]  [FOOTER: 56 bytes]
//! ```
//!
//! A partition blob holds up to `part_size` commands:
//!
//! ```text
//! [count: u32 LE] ([key_len: u32 LE][key][command frame]) * count
//! ```
//!
//! where `command frame` is [`command::Command::encode`]'s own
//! length-prefixed frame (so the key appears twice on disk — once as the
//! partition entry's lookup key, once inside the command itself — which is
//! what makes each entry self-describing without consulting the index).
//!
//! The sparse index blob records one (first key, partition range) pair per
//! partition:
//!
//! ```text
//! [count: u32 LE] ([key_len: u32 LE][key][offset: u64 LE][length: u64 LE]) * count
//! ```
//!
//! The footer is fixed-size so [`crate::reader::SSTableReader::open`] can
//! read it without any prior knowledge of the file:
//!
//! ```text
//! [version: u64][data_start: u64][data_len: u64]
//! [index_start: u64][index_len: u64][part_size: u64][magic: u64]
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Current on-disk format version.
pub const VERSION: u64 = 1;

/// Magic trailer identifying an SSTable file (ASCII "LSMSSTB\0").
pub const MAGIC: u64 = 0x4C53_4D53_5354_4200;

/// Fixed footer size in bytes: six `u64` fields plus the magic.
pub const FOOTER_SIZE: u64 = 8 * 7;

/// A contiguous byte range within an SSTable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: u64,
    pub length: u64,
}

/// The SSTable footer, fixed-layout and always the last [`FOOTER_SIZE`]
/// bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMetaInfo {
    pub version: u64,
    pub data_start: u64,
    pub data_len: u64,
    pub index_start: u64,
    pub index_len: u64,
    pub part_size: u64,
    pub magic: u64,
}

impl TableMetaInfo {
    /// Checks the footer's internal invariants:
    /// `data_start + data_len == index_start` and
    /// `index_start + index_len + FOOTER_SIZE == file_size`.
    pub fn validate(&self, file_size: u64) -> Result<(), String> {
        if self.magic != MAGIC {
            return Err(format!("bad magic: {:#x}", self.magic));
        }
        if self.version != VERSION {
            return Err(format!("unsupported version: {}", self.version));
        }
        if self.data_start + self.data_len != self.index_start {
            return Err(format!(
                "data_start({}) + data_len({}) != index_start({})",
                self.data_start, self.data_len, self.index_start
            ));
        }
        if self.index_start + self.index_len + FOOTER_SIZE != file_size {
            return Err(format!(
                "index_start({}) + index_len({}) + footer({}) != file_size({})",
                self.index_start, self.index_len, FOOTER_SIZE, file_size
            ));
        }
        Ok(())
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.version)?;
        w.write_u64::<LittleEndian>(self.data_start)?;
        w.write_u64::<LittleEndian>(self.data_len)?;
        w.write_u64::<LittleEndian>(self.index_start)?;
        w.write_u64::<LittleEndian>(self.index_len)?;
        w.write_u64::<LittleEndian>(self.part_size)?;
        w.write_u64::<LittleEndian>(self.magic)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            version: r.read_u64::<LittleEndian>()?,
            data_start: r.read_u64::<LittleEndian>()?,
            data_len: r.read_u64::<LittleEndian>()?,
            index_start: r.read_u64::<LittleEndian>()?,
            index_len: r.read_u64::<LittleEndian>()?,
            part_size: r.read_u64::<LittleEndian>()?,
            magic: r.read_u64::<LittleEndian>()?,
        })
    }
}
