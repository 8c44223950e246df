//! Seekable byte sources of known size.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};

/// Chunk size used when copying a window to the client.
const COPY_CHUNK: usize = 64 * 1024;

/// An addressable, seekable source of bytes with a known total size.
pub trait ByteStream: Read + Seek {
    fn size(&self) -> u64;

    /// Modification time of the underlying resource, when it has one.
    fn modified(&self) -> Option<SystemTime> {
        None
    }

    /// Path of the backing file, for file-backed streams.
    fn path(&self) -> Option<&Path> {
        None
    }
}

impl<T: AsRef<[u8]>> ByteStream for Cursor<T> {
    fn size(&self) -> u64 {
        self.get_ref().as_ref().len() as u64
    }
}

/// A file opened for streaming; size and mtime are captured at open time.
#[derive(Debug)]
pub struct FileStream {
    file: File,
    path: PathBuf,
    size: u64,
    modified: Option<SystemTime>,
}

impl FileStream {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let meta = file.metadata().map_err(|e| Error::io(path, e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for FileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl ByteStream for FileStream {
    fn size(&self) -> u64 {
        self.size
    }

    fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Seek to `offset` and copy exactly `length` bytes into `out`.
pub fn copy_window<S, W>(stream: &mut S, offset: u64, length: u64, out: &mut W) -> Result<u64>
where
    S: ByteStream + ?Sized,
    W: Write + ?Sized,
{
    stream.seek(SeekFrom::Start(offset))?;
    let mut remaining = length;
    let mut buf = vec![0u8; COPY_CHUNK.min(length as usize).max(1)];
    while remaining > 0 {
        let want = buf.len().min(remaining as usize);
        let n = stream.read(&mut buf[..want])?;
        if n == 0 {
            return Err(Error::Stream(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended {remaining} bytes short of the requested window"),
            )));
        }
        out.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    Ok(length)
}
