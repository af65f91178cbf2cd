//! Backing byte streams for the registry and credential documents
//!
//! A [`Storer`] is a seekable, truncatable stream that a document is read
//! from at offset 0 and rewritten over in one shot. There is no temp-file
//! rename: a save seeks to 0, writes, truncates to the new length and seeks
//! back so the next read sees exactly the new content.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// A stream a whole document can be loaded from and rewritten into
pub trait Storer: Read + Write + Seek {
    /// Cut the stream to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Release the stream
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Storer for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl Storer for Cursor<Vec<u8>> {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length out of range"))?;
        self.get_mut().truncate(len);
        Ok(())
    }
}

impl<S: Storer + ?Sized> Storer for &mut S {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        (**self).truncate(len)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Read the whole stream from offset 0
pub fn read_all<S: Storer + ?Sized>(storer: &mut S) -> io::Result<Vec<u8>> {
    storer.seek(SeekFrom::Start(0))?;
    let mut raw = Vec::new();
    storer.read_to_end(&mut raw)?;
    Ok(raw)
}

/// Replace the stream's content with `raw` and rewind
pub fn overwrite<S: Storer + ?Sized>(storer: &mut S, raw: &[u8]) -> io::Result<()> {
    storer.seek(SeekFrom::Start(0))?;
    storer.write_all(raw)?;
    storer.truncate(raw.len() as u64)?;
    storer.seek(SeekFrom::Start(0))?;
    storer.flush()
}
