//! Top-level traversal of a Matroska Segment, with corruption-recovery rescan.

use std::io::{Read, Seek, SeekFrom};

use crate::base::Header;
use crate::element::Element;
use crate::error::Error;
use crate::io::{ReadElement, ReadFrom};
use crate::master::{Cluster, Ebml, Info, Segment, Tracks};

/// Byte budget for the corruption-recovery rescan (spec § 4.D).
const RECOVERY_BYTE_LIMIT: u64 = 5_000_000;
/// Don't bother rescanning this close to the end of the segment.
const RECOVERY_MIN_TAIL: u64 = 1000;

/// Top-level traversal of the Segment element: locates it, then dispatches
/// Info/Tracks/Cluster children on demand.
pub struct SegmentScanner<S> {
    source: S,
    /// Absolute offset of the first byte of the Segment's body.
    data_position: u64,
    /// Absolute offset one past the last byte of the Segment's body, if known.
    end_position: Option<u64>,
}

impl<S: Read + Seek> SegmentScanner<S> {
    /// Open a scanner over `source`, reading and validating the EBML and Segment headers.
    pub fn open(mut source: S) -> crate::Result<Self> {
        source.seek(SeekFrom::Start(0))?;

        let ebml_header = Header::read_from(&mut source)?;
        if ebml_header.id != Ebml::ID {
            return Err(Error::InvalidContainer("missing EBML header"));
        }
        skip(&mut source, &ebml_header)?;

        let segment_header = Header::read_from(&mut source)?;
        if segment_header.id != Segment::ID {
            return Err(Error::InvalidContainer("missing Segment element"));
        }
        let data_position = stream_position(&mut source)?;
        let end_position = if segment_header.size.is_unknown {
            None
        } else {
            Some(data_position + *segment_header.size)
        };

        Ok(Self {
            source,
            data_position,
            end_position,
        })
    }

    fn file_size(&mut self) -> crate::Result<u64> {
        let cur = stream_position(&mut self.source)?;
        let end = self.source.seek(SeekFrom::End(0))?;
        self.source.seek(SeekFrom::Start(cur))?;
        Ok(end)
    }

    fn segment_end(&mut self) -> crate::Result<u64> {
        match self.end_position {
            Some(p) => Ok(p),
            None => self.file_size(),
        }
    }

    /// Walk the Segment's top-level children, decoding Info and Tracks.
    ///
    /// Per spec § 4.D this does not descend into Clusters; use
    /// [`read_clusters`](Self::read_clusters) separately.
    pub fn read_info_and_tracks(&mut self) -> crate::Result<(Option<Info>, Option<Tracks>)> {
        self.source.seek(SeekFrom::Start(self.data_position))?;
        let end = self.segment_end()?;

        let mut info = None;
        let mut tracks = None;

        loop {
            let pos = stream_position(&mut self.source)?;
            if pos >= end {
                break;
            }
            match self.try_read_header()? {
                None => break,
                Some(None) => {
                    // zero-ID byte: not relevant outside Cluster recovery, skip it.
                    continue;
                }
                Some(Some(header)) => {
                    if header.id == Info::ID {
                        info = Some(Info::read_element(&header, &mut self.source)?);
                    } else if header.id == Tracks::ID {
                        tracks = Some(Tracks::read_element(&header, &mut self.source)?);
                    } else {
                        skip(&mut self.source, &header)?;
                    }
                }
            }
        }

        Ok((info, tracks))
    }

    /// Walk the Segment's top-level children, invoking `on_cluster` for each Cluster found.
    ///
    /// `progress` is invoked once per top-level child visited (including
    /// skipped ones), receiving the child's absolute byte offset.
    pub fn read_clusters<C, P>(&mut self, mut on_cluster: C, mut progress: P) -> crate::Result<()>
    where
        C: FnMut(Cluster) -> crate::Result<()>,
        P: FnMut(u64),
    {
        self.source.seek(SeekFrom::Start(self.data_position))?;
        let end = self.segment_end()?;

        loop {
            let pos = stream_position(&mut self.source)?;
            if pos >= end {
                break;
            }
            progress(pos);

            match self.try_read_header()? {
                None => break,
                Some(None) => {
                    if end.saturating_sub(pos) <= RECOVERY_MIN_TAIL {
                        break;
                    }
                    self.recover(end)?;
                }
                Some(Some(header)) => {
                    if header.id == Cluster::ID {
                        let cluster = Cluster::read_element(&header, &mut self.source)?;
                        on_cluster(cluster)?;
                    } else {
                        skip(&mut self.source, &header)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Reads the next top-level header. `Ok(None)` means end of stream,
    /// `Ok(Some(None))` means the ID VINT decoded to zero (spec § 4.B: "no more
    /// element at this offset"), `Ok(Some(Some(header)))` is a normal header.
    fn try_read_header(&mut self) -> crate::Result<Option<Option<Header>>> {
        let mut first = [0u8; 1];
        let n = self.source.read(&mut first)?;
        if n == 0 {
            return Ok(None);
        }
        if first[0] == 0 {
            return Ok(Some(None));
        }
        self.source.seek(SeekFrom::Current(-1))?;
        Ok(Some(Some(Header::read_from(&mut self.source)?)))
    }

    /// Advance one byte at a time until a Cluster header is found or the
    /// recovery byte budget is exhausted.
    fn recover(&mut self, end: u64) -> crate::Result<()> {
        let mut bad_bytes: u64 = 0;
        loop {
            let pos = stream_position(&mut self.source)?;
            if pos >= end {
                return Ok(());
            }
            if bad_bytes > RECOVERY_BYTE_LIMIT {
                return Err(Error::RecoveryLimitReached);
            }

            let mut first = [0u8; 1];
            if self.source.read(&mut first)? == 0 {
                return Ok(());
            }
            if first[0] != 0 {
                self.source.seek(SeekFrom::Current(-1))?;
                if let Ok(header) = Header::read_from(&mut self.source) {
                    if header.id == Cluster::ID {
                        self.source.seek(SeekFrom::Start(pos))?;
                        return Ok(());
                    }
                }
                self.source.seek(SeekFrom::Start(pos))?;
            }
            self.source.seek(SeekFrom::Start(pos + 1))?;
            bad_bytes += 1;
        }
    }
}

fn stream_position<S: Seek>(source: &mut S) -> crate::Result<u64> {
    Ok(source.seek(SeekFrom::Current(0))?)
}

fn skip<S: Read + Seek>(source: &mut S, header: &Header) -> crate::Result<()> {
    if header.size.is_unknown {
        return Err(Error::ElementBodySizeUnknown(header.id));
    }
    source.seek(SeekFrom::Current(*header.size as i64))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn minimal_segment() -> Vec<u8> {
        // EBML header, size 0.
        let mut data = vec![0x1A, 0x45, 0xDF, 0xA3, 0x80];
        // Segment, size 0.
        data.extend_from_slice(&[0x18, 0x53, 0x80, 0x67, 0x80]);
        data
    }

    #[test]
    fn opens_a_minimal_segment() {
        let data = minimal_segment();
        let scanner = SegmentScanner::open(Cursor::new(data));
        assert!(scanner.is_ok());
    }

    #[test]
    fn rejects_missing_ebml_header() {
        let data = vec![0x18, 0x53, 0x80, 0x67, 0x80];
        let err = SegmentScanner::open(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::InvalidContainer(_)));
    }
}
