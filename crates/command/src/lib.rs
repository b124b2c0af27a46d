//! # Command — the shared unit of WAL and SSTable storage.
//!
//! A [`Command`] is a tagged record carrying either a `Set` (key + value) or
//! a `Remove` (tombstone, key only). Both the write-ahead log and SSTable
//! data partitions store commands using the same length-prefixed binary
//! frame, so this crate owns the one codec both depend on.
//!
//! ## Binary frame
//!
//! ```text
//! [frame_len: u32 LE][kind: u8][key-frame][value-frame?]
//! ```
//!
//! `frame_len` counts every byte after itself. Kind `0` is `Set` (followed
//! by a value sub-frame); kind `1` is `Remove` (no value sub-frame). Each
//! sub-frame is itself length-prefixed: `[len: u32 LE][bytes]`.
//!
//! Encoding is deterministic — the same [`Command`] always yields the same
//! bytes, which matters for reproducing SSTable partitions byte-for-byte.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

const KIND_SET: u8 = 0;
const KIND_REMOVE: u8 = 1;

/// A single mutation: a key-value insertion or a tombstone.
///
/// Every variant carries the key it applies to, so a `Command` alone is
/// enough to know what it shadows during a merged read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Insert or overwrite `key` with `value`.
    Set { key: Vec<u8>, value: Vec<u8> },
    /// Mark `key` as deleted. Shadows any older `Set` for the same key.
    Remove { key: Vec<u8> },
}

impl Command {
    /// Returns the key this command applies to.
    pub fn key(&self) -> &[u8] {
        match self {
            Command::Set { key, .. } => key,
            Command::Remove { key } => key,
        }
    }

    /// `true` for `Remove` (tombstone) commands.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Command::Remove { .. })
    }
}

/// Errors from encoding or decoding a [`Command`] frame.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Underlying I/O failure while reading or writing a frame.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A complete frame was read but failed to parse: unknown kind, or a
    /// value sub-frame present/absent contrary to the kind.
    #[error("corrupt frame: {0}")]
    CorruptFrame(String),
}

/// Outcome of reading one frame from a stream.
///
/// Distinguishes a clean end of stream and a truncated trailing frame
/// (writer crashed mid-append) from a genuinely malformed frame, since the
/// WAL replay contract treats the first two as "stop, not an error".
#[derive(Debug)]
pub enum DecodedFrame {
    /// A fully-parsed command.
    Command(Command),
    /// No bytes remained at all.
    Eof,
    /// A partial frame was found at the end of the stream.
    Truncated,
}

impl Command {
    /// Encodes this command to its length-prefixed binary frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        match self {
            Command::Set { key, value } => {
                body.push(KIND_SET);
                write_subframe(&mut body, key);
                write_subframe(&mut body, value);
            }
            Command::Remove { key } => {
                body.push(KIND_REMOVE);
                write_subframe(&mut body, key);
            }
        }
        let mut out = Vec::with_capacity(4 + body.len());
        out.write_u32::<LittleEndian>(body.len() as u32)
            .expect("writes to a Vec never fail");
        out.extend_from_slice(&body);
        out
    }

    /// Encodes and writes this command's frame directly to `w`.
    pub fn encode_to<W: Write>(&self, w: &mut W) -> Result<(), CommandError> {
        w.write_all(&self.encode())?;
        Ok(())
    }

    /// Reads one frame from `r`. See [`DecodedFrame`] for the three
    /// possible outcomes.
    pub fn decode_from<R: Read>(r: &mut R) -> Result<DecodedFrame, CommandError> {
        let frame_len = match r.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(DecodedFrame::Eof),
            Err(e) => return Err(CommandError::Io(e)),
        };

        let mut body = vec![0u8; frame_len as usize];
        match r.read_exact(&mut body) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(DecodedFrame::Truncated)
            }
            Err(e) => return Err(CommandError::Io(e)),
        }

        Self::decode_body(&body).map(DecodedFrame::Command)
    }

    fn decode_body(body: &[u8]) -> Result<Command, CommandError> {
        let mut cur = body;
        let kind = read_u8(&mut cur)?;
        let key = read_subframe(&mut cur)?;
        match kind {
            KIND_SET => {
                let value = read_subframe(&mut cur)?;
                if !cur.is_empty() {
                    return Err(CommandError::CorruptFrame(
                        "trailing bytes after Set value sub-frame".into(),
                    ));
                }
                Ok(Command::Set { key, value })
            }
            KIND_REMOVE => {
                if !cur.is_empty() {
                    return Err(CommandError::CorruptFrame(
                        "Remove frame carries an unexpected value sub-frame".into(),
                    ));
                }
                Ok(Command::Remove { key })
            }
            other => Err(CommandError::CorruptFrame(format!(
                "unknown command kind {other}"
            ))),
        }
    }
}

fn write_subframe(out: &mut Vec<u8>, bytes: &[u8]) {
    out.write_u32::<LittleEndian>(bytes.len() as u32)
        .expect("writes to a Vec never fail");
    out.extend_from_slice(bytes);
}

fn read_u8(cur: &mut &[u8]) -> Result<u8, CommandError> {
    if cur.is_empty() {
        return Err(CommandError::CorruptFrame(
            "frame ended before kind byte".into(),
        ));
    }
    let b = cur[0];
    *cur = &cur[1..];
    Ok(b)
}

fn read_subframe(cur: &mut &[u8]) -> Result<Vec<u8>, CommandError> {
    if cur.len() < 4 {
        return Err(CommandError::CorruptFrame(
            "frame ended before sub-frame length".into(),
        ));
    }
    let len = u32::from_le_bytes([cur[0], cur[1], cur[2], cur[3]]) as usize;
    *cur = &cur[4..];
    if cur.len() < len {
        return Err(CommandError::CorruptFrame(
            "sub-frame length exceeds remaining bytes".into(),
        ));
    }
    let bytes = cur[..len].to_vec();
    *cur = &cur[len..];
    Ok(bytes)
}
