//! Random-access byte sources: a memory-mapped view and a buffered sequential reader.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Random-access reader over a file, abstracting over the backing storage.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes at the current cursor, returning the number read.
    /// A return of 0 with a non-empty `buf` signals EOF.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Move the logical cursor, Unix `lseek`-style.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Current cursor position.
    fn position(&self) -> u64;

    /// Total size of the underlying file, in bytes.
    fn size(&self) -> u64;

    /// Read exactly `buf.len()` bytes, failing with `UnexpectedEof` on a short read.
    fn read_exact(&mut self, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read(buf)? {
                0 => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
                n => buf = &mut buf[n..],
            }
        }
        Ok(())
    }
}

/// A memory-mapped, read-only view over a file.
///
/// Reads copy out of the map rather than returning borrowed slices, so the
/// type can implement [`Read`] uniformly with [`BufferedSource`].
pub struct MmapSource {
    map: memmap2::Mmap,
    cursor: u64,
}

impl MmapSource {
    /// Memory-map the file at `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and this crate does not assume the
        // backing file is free from concurrent modification by other processes;
        // a torn read is possible but manifests as a parse error, not UB.
        let map = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Self { map, cursor: 0 })
    }
}

impl ByteSource for MmapSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.cursor as usize;
        if start >= self.map.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.map.len() - start);
        buf[..n].copy_from_slice(&self.map[start..start + n]);
        self.cursor += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor = resolve_seek(self.cursor, self.map.len() as u64, pos)?;
        Ok(self.cursor)
    }

    fn position(&self) -> u64 {
        self.cursor
    }

    fn size(&self) -> u64 {
        self.map.len() as u64
    }
}

/// A buffered, sequential file reader.
pub struct BufferedSource {
    file: io::BufReader<File>,
    cursor: u64,
    size: u64,
}

impl BufferedSource {
    /// Open the file at `path` for buffered sequential reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: io::BufReader::new(file),
            cursor: 0,
            size,
        })
    }
}

impl ByteSource for BufferedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = Read::read(&mut self.file, buf)?;
        self.cursor += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor = self.file.seek(pos)?;
        Ok(self.cursor)
    }

    fn position(&self) -> u64 {
        self.cursor
    }

    fn size(&self) -> u64 {
        self.size
    }
}

fn resolve_seek(cursor: u64, size: u64, pos: SeekFrom) -> io::Result<u64> {
    let new_pos = match pos {
        SeekFrom::Start(n) => n as i128,
        SeekFrom::End(n) => size as i128 + n as i128,
        SeekFrom::Current(n) => cursor as i128 + n as i128,
    };
    if new_pos < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek to a negative position",
        ));
    }
    Ok(new_pos as u64)
}

impl Read for MmapSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ByteSource::read(self, buf)
    }
}
impl Seek for MmapSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        ByteSource::seek(self, pos)
    }
}

impl Read for BufferedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ByteSource::read(self, buf)
    }
}
impl Seek for BufferedSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        ByteSource::seek(self, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn mmap_source_reads_and_seeks() {
        let fixture = write_fixture(b"0123456789");
        let mut src = MmapSource::open(fixture.path()).unwrap();
        assert_eq!(src.size(), 10);

        let mut buf = [0u8; 4];
        assert_eq!(src.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(src.position(), 4);

        src.seek(SeekFrom::Start(8)).unwrap();
        let mut tail = [0u8; 4];
        assert_eq!(src.read(&mut tail).unwrap(), 2);
        assert_eq!(&tail[..2], b"89");

        assert_eq!(src.read(&mut tail).unwrap(), 0);
    }

    #[test]
    fn buffered_source_reads_and_seeks() {
        let fixture = write_fixture(b"abcdefghij");
        let mut src = BufferedSource::open(fixture.path()).unwrap();
        assert_eq!(src.size(), 10);

        let mut buf = [0u8; 3];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        src.seek(SeekFrom::Current(2)).unwrap();
        let mut buf2 = [0u8; 2];
        src.read_exact(&mut buf2).unwrap();
        assert_eq!(&buf2, b"fg");
    }
}
