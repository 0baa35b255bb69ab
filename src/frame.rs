use crate::{
    base::VInt64,
    functional::{Decode, Encode},
    lacer::Lacer,
    leaf::SimpleBlock,
    master::{BlockGroup, Cluster},
};

/// A Matroska encoded frame, with lacing already split out.
pub struct Frame<'a> {
    /// in matroska timestamp units
    pub data: &'a [u8],
    /// whether the frame is a keyframe
    pub is_keyframe: bool,
    /// whether the frame is invisible (mostly for subtitle tracks)
    pub is_invisible: bool,
    /// whether the frame is discardable (for video tracks, e.g. non-reference frames)
    pub is_discardable: bool,
    /// track number the frame belongs to
    pub track_number: u64,
    /// absolute timestamp of the frame, in the same timescale as the Cluster timestamp
    pub timestamp: i64,
    /// this frame's share of the Block's duration, in the same timescale as `timestamp`.
    ///
    /// Zero when neither a `BlockDuration` nor a track `DefaultDuration` was
    /// available to apportion; callers doing subtitle overlap fix-up treat
    /// zero as "not yet known" (spec § 4.F).
    pub duration_ticks: i64,
}

/// A block in a Cluster, either a SimpleBlock or a BlockGroup.
///
/// This is a convenience enum to allow handling both types of blocks uniformly.
/// * when reading: often we just want to iterate over all blocks in a cluster, regardless of type.
/// * when writing: we may want to write a list of blocks of mixed types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterBlock {
    /// A SimpleBlock
    Simple(SimpleBlock),
    /// A BlockGroup
    Group(BlockGroup),
}
impl From<SimpleBlock> for ClusterBlock {
    fn from(b: SimpleBlock) -> Self {
        ClusterBlock::Simple(b)
    }
}
impl From<BlockGroup> for ClusterBlock {
    fn from(b: BlockGroup) -> Self {
        ClusterBlock::Group(b)
    }
}

impl Encode for ClusterBlock {
    fn encode<B: crate::functional::BufMut>(&self, buf: &mut B) -> crate::Result<()> {
        match self {
            ClusterBlock::Simple(b) => b.encode(buf),
            ClusterBlock::Group(b) => b.encode(buf),
        }
    }
}

/// Split `total_ticks` (if known) or `default_frame_ticks` (as a per-frame
/// fallback) across `n` laced frames (spec § 4.F, Open Question (b)). Any
/// division remainder from a known total is folded into the last frame so the
/// parts still sum to the declared whole.
fn lace_durations(total_ticks: Option<i64>, default_frame_ticks: Option<i64>, n: usize) -> Vec<i64> {
    if n == 0 {
        return Vec::new();
    }
    if let Some(total) = total_ticks {
        if n == 1 {
            return vec![total];
        }
        let per = total / n as i64;
        let mut durations = vec![per; n];
        let last = n - 1;
        durations[last] = total - per * last as i64;
        durations
    } else if let Some(per) = default_frame_ticks {
        vec![per; n]
    } else {
        vec![0; n]
    }
}

/// Cumulative start offsets (relative to `base`) for a sequence of durations.
fn lace_starts(base: i64, durations: &[i64]) -> Vec<i64> {
    let mut starts = Vec::with_capacity(durations.len());
    let mut acc = base;
    for &d in durations {
        starts.push(acc);
        acc += d;
    }
    starts
}

fn split_frames<'a>(data: &'a [u8], lacing: u8) -> crate::Result<Vec<&'a [u8]>> {
    match lacing {
        0b00 => Ok(vec![data]),
        0b01 => Lacer::Xiph.delace(data),
        0b11 => Lacer::Ebml.delace(data),
        _ => Lacer::FixedSize.delace(data),
    }
}

enum BlockRef<'a> {
    Simple(&'a crate::leaf::SimpleBlock),
    Group(&'a crate::master::BlockGroup),
}

impl<'a> BlockRef<'a> {
    fn into_frames(self, cluster_ts: u64, default_duration_ticks: Option<i64>) -> crate::Result<Vec<Frame<'a>>> {
        let (body, is_keyframe, is_invisible_base, is_discardable_base, block_duration) = match self {
            BlockRef::Simple(block) => (&block[..], None, None, None, None),
            BlockRef::Group(g) => (
                &g.block[..],
                Some(g.reference_block.is_empty()),
                None,
                Some(false),
                g.block_duration.as_ref().map(|d| **d as i64),
            ),
        };

        let mut buf = body;
        let track_number = *VInt64::decode(&mut buf)?;
        let relative_timestamp = i16::decode(&mut buf)?;
        let flags = u8::decode(&mut buf)?;
        let data = buf;

        let is_keyframe = is_keyframe.unwrap_or(flags & 0x80 != 0);
        let is_invisible = is_invisible_base.unwrap_or(flags & 0x08 != 0);
        let is_discardable = is_discardable_base.unwrap_or(flags & 0x01 != 0);

        let lacing = (flags >> 1) & 0x03;
        let base_ts = cluster_ts as i64 + relative_timestamp as i64;
        let parts = split_frames(data, lacing)?;
        let durations = lace_durations(block_duration, default_duration_ticks, parts.len());
        let starts = lace_starts(base_ts, &durations);

        Ok(parts
            .into_iter()
            .zip(durations)
            .zip(starts)
            .map(|((d, duration_ticks), timestamp)| Frame {
                data: d,
                is_keyframe,
                is_invisible,
                is_discardable,
                track_number,
                timestamp,
                duration_ticks,
            })
            .collect())
    }
}

impl<'a> From<&'a crate::leaf::SimpleBlock> for BlockRef<'a> {
    fn from(b: &'a crate::leaf::SimpleBlock) -> Self {
        BlockRef::Simple(b)
    }
}
impl<'a> From<&'a crate::master::BlockGroup> for BlockRef<'a> {
    fn from(b: &'a crate::master::BlockGroup) -> Self {
        BlockRef::Group(b)
    }
}

impl Cluster {
    /// Frames in the cluster, with lacing split out and durations apportioned.
    ///
    /// `SimpleBlock` and `BlockGroup` children are visited in the order they
    /// were parsed, not necessarily interleaved as they appeared on disk; each
    /// [`Frame`] carries an absolute timestamp so callers needing strict
    /// presentation order should sort on it. `default_duration_ticks` is the
    /// requested track's `DefaultDuration`, already converted to the Segment's
    /// timestamp-scale units; it's used to apportion lacing when no
    /// `BlockDuration` is present.
    pub fn frames(&self, default_duration_ticks: Option<i64>) -> crate::Result<Vec<Frame<'_>>> {
        let cluster_ts = *self.timestamp;
        let mut out = Vec::new();
        for b in &self.simple_block {
            out.extend(BlockRef::from(b).into_frames(cluster_ts, default_duration_ticks)?);
        }
        for g in &self.block_group {
            out.extend(BlockRef::from(g).into_frames(cluster_ts, default_duration_ticks)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apportions_block_duration_across_fixed_lacing() {
        let durations = lace_durations(Some(300), None, 3);
        assert_eq!(durations, vec![100, 100, 100]);
        let starts = lace_starts(1000, &durations);
        assert_eq!(starts, vec![1000, 1100, 1200]);
    }

    #[test]
    fn remainder_goes_to_the_last_laced_frame() {
        let durations = lace_durations(Some(10), None, 3);
        assert_eq!(durations, vec![3, 3, 4]);
    }

    #[test]
    fn falls_back_to_default_duration_when_no_block_duration() {
        let durations = lace_durations(None, Some(40), 3);
        assert_eq!(durations, vec![40, 40, 40]);
    }

    #[test]
    fn unlaced_single_frame_keeps_the_whole_duration() {
        let durations = lace_durations(Some(500), None, 1);
        assert_eq!(durations, vec![500]);
    }
}
