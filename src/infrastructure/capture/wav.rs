//! Streaming PCM WAV framing
//!
//! Capture emits the header before the total length is known, so the RIFF
//! and data sizes carry the "unknown length" marker until the assembled
//! clip is sealed.

/// Size field value for a stream of unknown length
pub const UNKNOWN_LENGTH: u32 = 0xFFFF_FFFF;

/// Bytes in a canonical PCM header
pub const HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;

/// Canonical 16-bit PCM header with unknown-length size fields
pub fn streaming_header(sample_rate: u32, channels: u16) -> Vec<u8> {
    let channels = channels.max(1);
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * block_align as u32;

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&UNKNOWN_LENGTH.to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&UNKNOWN_LENGTH.to_le_bytes());
    header
}

/// Little-endian sample bytes
pub fn encode_samples(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let field: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(field))
}

/// Replace unknown or overlong RIFF/data sizes with the real lengths.
///
/// Anything that is not a RIFF/WAVE stream is returned untouched.
pub fn seal_streaming_header(mut bytes: Vec<u8>) -> Vec<u8> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return bytes;
    }

    let total = bytes.len();
    let riff_size = (total - 8) as u32;
    bytes[4..8].copy_from_slice(&riff_size.to_le_bytes());

    let mut offset = 12;
    while offset + 8 <= total {
        let Some(size) = read_u32(&bytes, offset + 4) else {
            break;
        };
        let body = offset + 8;

        if &bytes[offset..offset + 4] == b"data" {
            let actual = (total - body) as u32;
            if size == UNKNOWN_LENGTH || body + size as usize > total {
                bytes[offset + 4..offset + 8].copy_from_slice(&actual.to_le_bytes());
            }
            break;
        }

        // Chunks are word aligned
        offset = body + size as usize + (size as usize & 1);
    }

    bytes
}
