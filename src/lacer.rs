//! Handler for lacing and delacing operations on frame data.

use crate::Error;
use crate::base::VInt64;
use crate::functional::{Buf, Decode, Encode};

fn encode_signed_vint(value: i64, out: &mut Vec<u8>) {
    let mut len = 1u32;
    let mut bias = (1i64 << (7 * len - 1)) - 1;
    while len < 8 && !(-bias..=bias).contains(&value) {
        len += 1;
        bias = (1i64 << (7 * len - 1)) - 1;
    }
    let biased = (value + bias) as u64;
    VInt64::new(biased)
        .encode(out)
        .expect("encoding to a Vec never fails");
}

fn decode_signed_vint(buf: &mut &[u8]) -> crate::Result<i64> {
    if !buf.has_remaining() {
        return Err(Error::MalformedLacingData);
    }
    let first = buf.slice(1)[0];
    if first == 0 {
        return Err(Error::MalformedLacingData);
    }
    let len = (first.leading_zeros() + 1) as i64;
    let raw = VInt64::decode(buf).map_err(|_| Error::MalformedLacingData)?;
    let bias = (1i64 << (7 * len - 1)) - 1;
    Ok(*raw as i64 - bias)
}

/// Handler for lacing and delacing operations on frame data.
pub enum Lacer {
    /// Xiph lacing (variable-size frames with size prefixes)
    Xiph,
    /// Fixed-size lacing (all frames have the same size)
    FixedSize,
    /// EBML lacing (variable-size frames with EBML-encoded sizes)
    Ebml,
}

impl Lacer {
    /// Encode multiple frames into a single laced block
    pub fn lace(&self, frames: &[&[u8]]) -> Vec<u8> {
        match self {
            Lacer::Xiph => {
                if frames.is_empty() {
                    return vec![];
                }
                let num_frames = frames.len();
                let mut output = vec![];
                output.push((num_frames - 1) as u8); // Number of frames - 1
                for frame in &frames[..num_frames - 1] {
                    let mut size = frame.len();
                    while size >= 0xFF {
                        output.push(0xFF);
                        size -= 0xFF;
                    }
                    output.push(size as u8);
                }
                for frame in frames {
                    output.extend_from_slice(frame);
                }
                output
            }
            Lacer::FixedSize => {
                let mut output = vec![frames.len().saturating_sub(1) as u8];
                for frame in frames {
                    output.extend_from_slice(frame);
                }
                output
            }
            Lacer::Ebml => {
                if frames.is_empty() {
                    return vec![];
                }
                let mut output = vec![(frames.len() - 1) as u8];
                let first_size = crate::base::VInt64::new(frames[0].len() as u64);
                first_size.encode(&mut output).expect("encoding to a Vec never fails");
                let mut prev = frames[0].len() as i64;
                for frame in &frames[1..frames.len() - 1] {
                    let delta = frame.len() as i64 - prev;
                    encode_signed_vint(delta, &mut output);
                    prev = frame.len() as i64;
                }
                for frame in frames {
                    output.extend_from_slice(frame);
                }
                output
            }
        }
    }

    /// Decode a laced block into individual frames
    pub fn delace<'a>(&self, data: &'a [u8]) -> crate::Result<Vec<&'a [u8]>> {
        // TODO(perf): avoid heap allocations ideally
        // we should be able to return a `impl Iterator<Item = crate::Result<&'a [u8]>>` here
        // can make it work using nightly features like `generators`.
        // but not sure how to do that with the current stable Rust.

        match self {
            Lacer::Xiph => {
                if data.is_empty() {
                    return Ok(vec![]);
                }

                let num_frames = data[0] as usize + 1;
                if num_frames == 1 {
                    return Ok(vec![&data[1..]]);
                }
                let mut out = Vec::with_capacity(num_frames);

                let data_start_pos = data
                    .iter()
                    .enumerate()
                    .skip(1)
                    .filter(|(_, b)| **b != 0xFF)
                    .nth(num_frames - 2)
                    .map(|(i, _)| i)
                    .ok_or(Error::MalformedLacingData)?
                    + 1;

                let laced_data = data
                    .get(data_start_pos..)
                    .ok_or(Error::MalformedLacingData)?;

                let mut start = 0;
                for size in data[1..data_start_pos]
                    .split_inclusive(|b| *b != 0xFF)
                    .map(|chunk| chunk.iter().map(|b| *b as usize).sum::<usize>())
                {
                    out.push(
                        laced_data
                            .get(start..start + size)
                            .ok_or(Error::MalformedLacingData)?,
                    );
                    start += size;
                }
                out.push(laced_data.get(start..).ok_or(Error::MalformedLacingData)?);
                Ok(out)
            }
            Lacer::FixedSize => {
                if data.is_empty() {
                    return Ok(vec![]);
                }
                let num_frames = data[0] as usize + 1;
                let rest = &data[1..];
                if num_frames == 0 || rest.len() % num_frames != 0 {
                    return Err(Error::MalformedLacingData);
                }
                let size = rest.len() / num_frames;
                Ok(rest.chunks(size).collect())
            }
            Lacer::Ebml => {
                if data.is_empty() {
                    return Ok(vec![]);
                }
                let num_frames = data[0] as usize + 1;
                let mut cursor = &data[1..];
                if num_frames == 1 {
                    return Ok(vec![cursor]);
                }

                let mut sizes = Vec::with_capacity(num_frames);
                let first_size = *VInt64::decode(&mut cursor).map_err(|_| Error::MalformedLacingData)? as i64;
                sizes.push(first_size);
                for _ in 0..num_frames - 2 {
                    let prev = *sizes.last().unwrap();
                    let delta = decode_signed_vint(&mut cursor)?;
                    sizes.push(prev + delta);
                }

                let total_declared: i64 = sizes.iter().sum();
                if total_declared < 0 || total_declared as usize > cursor.len() {
                    return Err(Error::MalformedLacingData);
                }
                let last_size = cursor.len() - total_declared as usize;

                let mut out = Vec::with_capacity(num_frames);
                let mut start = 0usize;
                for size in sizes {
                    let size = size as usize;
                    out.push(cursor.get(start..start + size).ok_or(Error::MalformedLacingData)?);
                    start += size;
                }
                out.push(cursor.get(start..start + last_size).ok_or(Error::MalformedLacingData)?);
                Ok(out)
            }
        }
    }
}

// The Xiph lacing uses the same coding of size as found in the Ogg container [@?RFC3533]. The bits 5-6 of the Block Header flags are set to 01.
// The Block data with laced frames is stored as follows:
//     Lacing Head on 1 Octet: Number of frames in the lace minus 1.
//     Lacing size of each frame except the last one.
//     Binary data of each frame consecutively.
// The lacing size is split into 255 values, stored as unsigned octets – for example, 500 is coded 255;245 or [0xFF 0xF5]. A frame with a size multiple of 255 is coded with a 0 at the end of the size – for example, 765 is coded 255;255;255;0 or [0xFF 0xFF 0xFF 0x00].
// The size of the last frame is deduced from the size remaining in the Block after the other frames.
#[cfg(test)]
mod lacer_tests {
    use super::*;
    #[test]
    fn test_xiph_lacing() {
        // 0 frames
        let laced = Lacer::Xiph.lace(&[]);
        assert_eq!(laced, vec![]);
        let frames: Vec<_> = Lacer::Xiph.delace(&[]).unwrap();
        assert_eq!(frames.len(), 0);

        // 4 frames, sizes: 255, 256, 1, remaining
        let len = vec![0x03, 0xFF, 0x00, 0xFF, 0x1, 0x1];
        let frame0 = vec![2u8; 255];
        let frame1 = vec![42u8; 256];
        let frame2 = vec![38u8; 1];
        let frame3 = vec![100u8; 1];

        let laced = Lacer::Xiph.lace(&[&frame0, &frame1, &frame2, &frame3]);
        let data = [len, frame0, frame1, frame2, frame3].concat();
        assert_eq!(laced, data);

        let frames: Vec<_> = Lacer::Xiph.delace(&data).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], &[2u8; 255]);
        assert_eq!(frames[1], &[42u8; 256]);
        assert_eq!(frames[2], &[38u8; 1]);
        assert_eq!(frames[3], &[100u8; 1]);

        // 1 frame, size: remaining
        let len = vec![0x00];
        let frame0 = vec![2u8; 255];

        let laced = Lacer::Xiph.lace(&[&frame0]);
        let data = [len, frame0].concat();
        assert_eq!(laced, data);

        let frames: Vec<_> = Lacer::Xiph.delace(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], &[2u8; 255]);

        // 2 frames, sizes: 32, remaining
        let len = vec![0x01, 0x20];
        let frame0 = vec![2u8; 32];
        let frame1 = vec![42u8; 256];

        let laced = Lacer::Xiph.lace(&[&frame0, &frame1]);
        let data = [len, frame0, frame1].concat();
        assert_eq!(laced, data);

        let frames: Vec<_> = Lacer::Xiph.delace(&data).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], &[2u8; 32]);
        assert_eq!(frames[1], &[42u8; 256]);

        // 4 frames, sizes: 600, 3, 520, remaining
        let len = vec![0x03, 0xFF, 0xFF, 0x5A, 0x3, 0xFF, 0xFF, 0xA];
        assert_eq!(0xff + 0xff + 0x5A, 600);
        assert_eq!(0xff + 0xff + 0xA, 520);
        let frame0 = vec![2u8; 600];
        let frame1 = vec![42u8; 3];
        let frame2 = vec![38u8; 520];
        let frame3 = vec![100u8; 1];

        let laced = Lacer::Xiph.lace(&[&frame0, &frame1, &frame2, &frame3]);
        let data = [len, frame0, frame1, frame2, frame3].concat();
        assert_eq!(laced, data);

        let frames: Vec<_> = Lacer::Xiph.delace(&data).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], &[2u8; 600]);
        assert_eq!(frames[1], &[42u8; 3]);
        assert_eq!(frames[2], &[38u8; 520]);
        assert_eq!(frames[3], &[100u8; 1]);
    }

    #[test]
    fn test_fixed_size_lacing() {
        let frame0 = vec![1u8; 10];
        let frame1 = vec![2u8; 10];
        let frame2 = vec![3u8; 10];

        let laced = Lacer::FixedSize.lace(&[&frame0, &frame1, &frame2]);
        assert_eq!(laced[0], 2); // 3 frames - 1
        assert_eq!(laced.len(), 1 + 30);

        let frames = Lacer::FixedSize.delace(&laced).unwrap();
        assert_eq!(frames, vec![&frame0[..], &frame1[..], &frame2[..]]);
    }

    #[test]
    fn test_fixed_size_lacing_malformed() {
        // 3 frames declared, but payload isn't evenly divisible by 3.
        let data = vec![2u8, 0, 1, 2, 3, 4];
        assert!(Lacer::FixedSize.delace(&data).is_err());
    }

    #[test]
    fn test_ebml_lacing() {
        let frame0 = vec![9u8; 100];
        let frame1 = vec![8u8; 150];
        let frame2 = vec![7u8; 90];
        let frame3 = vec![6u8; 40];

        let laced = Lacer::Ebml.lace(&[&frame0, &frame1, &frame2, &frame3]);
        let frames = Lacer::Ebml.delace(&laced).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], &frame0[..]);
        assert_eq!(frames[1], &frame1[..]);
        assert_eq!(frames[2], &frame2[..]);
        assert_eq!(frames[3], &frame3[..]);
    }

    #[test]
    fn test_ebml_lacing_single_frame() {
        let frame0 = vec![5u8; 20];
        let laced = Lacer::Ebml.lace(&[&frame0]);
        let frames = Lacer::Ebml.delace(&laced).unwrap();
        assert_eq!(frames, vec![&frame0[..]]);
    }
}
