//! Explicit-offset file reads.
//!
//! SSTable reads use absolute-offset I/O (pread-style) so position state is
//! never shared between threads reading the same file handle concurrently.
//! `Read + Seek` on a shared `File` would need a lock around the
//! seek-then-read pair; `read_at`/`seek_read` need no lock at all because
//! the offset travels with the call, not the handle.

use std::fs::File;
use std::io;

#[cfg(unix)]
pub fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
pub fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut read = 0usize;
    while read < buf.len() {
        let n = file.seek_read(&mut buf[read..], offset + read as u64)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected EOF during positioned read",
            ));
        }
        read += n;
    }
    Ok(())
}
