//! Subtitle payload decompression and text normalisation.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::Error;
use crate::track::ContentEncoding;

/// Inflate `payload` if `content_encoding` declares zlib compression scoped to
/// frame data; otherwise return it unchanged. Other algorithms and scopes are
/// passed through untouched.
pub fn decompress(content_encoding: Option<&ContentEncoding>, payload: &[u8]) -> crate::Result<Vec<u8>> {
    match content_encoding {
        Some(enc) if enc.is_zlib_on_frames() => {
            let mut decoder = ZlibDecoder::new(payload);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| Error::DecompressionFailure(e.to_string()))?;
            Ok(out)
        }
        _ => Ok(payload.to_vec()),
    }
}

/// Truncate at the first NUL byte and normalise CRLF/CR line endings to LF.
///
/// Invalid UTF-8 is replaced rather than rejected: subtitle tracks in the
/// wild routinely carry mis-encoded text, and a single bad event shouldn't
/// fail the whole stream.
pub fn normalize_text(data: &[u8]) -> String {
    let truncated = match data.iter().position(|&b| b == 0) {
        Some(i) => &data[..i],
        None => data,
    };
    String::from_utf8_lossy(truncated).replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn passes_through_uncompressed() {
        let out = decompress(None, b"hello").unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn inflates_zlib_on_frames() {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"Hello").unwrap();
        let compressed = encoder.finish().unwrap();

        let enc = ContentEncoding {
            algorithm: 0,
            scope: 1,
            kind: 0,
        };
        let out = decompress(Some(&enc), &compressed).unwrap();
        assert_eq!(out, b"Hello");
    }

    #[test]
    fn ignores_non_matching_encoding() {
        let enc = ContentEncoding {
            algorithm: 1,
            scope: 1,
            kind: 0,
        };
        let out = decompress(Some(&enc), b"raw").unwrap();
        assert_eq!(out, b"raw");
    }

    #[test]
    fn truncates_at_nul_and_normalises_newlines() {
        let text = normalize_text(b"Hello\r\nworld\0garbage");
        assert_eq!(text, "Hello\nworld");
    }
}
