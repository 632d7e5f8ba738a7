//! WAV container helpers for recorder chunks
//!
//! The header is written before the data length is known, so it uses the
//! streaming convention of `0xFFFF_FFFF` for the RIFF and data sizes.

use super::traits::PcmFormat;

const BITS_PER_SAMPLE: u16 = 16;
const UNKNOWN_SIZE: u32 = 0xFFFF_FFFF;

/// Length of the canonical PCM WAV header
pub const WAV_HEADER_LEN: usize = 44;

/// Build a 16-bit PCM WAV header for a stream of unknown length
pub fn streaming_wav_header(format: PcmFormat) -> Vec<u8> {
    let block_align = format.channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = format.sample_rate * block_align as u32;

    let mut header = Vec::with_capacity(WAV_HEADER_LEN);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&UNKNOWN_SIZE.to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM
    header.extend_from_slice(&format.channels.to_le_bytes());
    header.extend_from_slice(&format.sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&UNKNOWN_SIZE.to_le_bytes());
    header
}

/// Encode interleaved samples as 16-bit little-endian PCM
pub fn encode_samples(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Convert a float sample in [-1.0, 1.0] to i16, clamping out-of-range input
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Convert an unsigned 16-bit sample to signed
pub fn u16_to_i16(sample: u16) -> i16 {
    (sample as i32 - 32768) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = streaming_wav_header(PcmFormat {
            sample_rate: 48000,
            channels: 2,
        });

        assert_eq!(header.len(), WAV_HEADER_LEN);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[36..40], b"data");
        // byte rate = 48000 * 2ch * 2 bytes
        assert_eq!(u32::from_le_bytes([header[28], header[29], header[30], header[31]]), 192_000);
        // block align
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 4);
        assert_eq!(&header[40..44], &[0xFF; 4]);
    }

    #[test]
    fn test_encode_samples_little_endian() {
        let bytes = encode_samples(&[1, -1, 0x1234]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xFF, 0xFF, 0x34, 0x12]);
    }

    #[test]
    fn test_sample_conversions() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(4.0), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), -i16::MAX);
        assert_eq!(u16_to_i16(32768), 0);
        assert_eq!(u16_to_i16(0), i16::MIN);
        assert_eq!(u16_to_i16(u16::MAX), i16::MAX);
    }
}
