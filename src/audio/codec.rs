//! PCM codec helpers: transport (base64) encoding and 16-bit ↔ float
//! sample conversion.
//!
//! The session protocol carries audio as base64 text in both directions:
//! capture encodes outbound windows, playback decodes inbound fragments.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::CodecError;

/// Decoded, de-interleaved audio in the [-1.0, 1.0) float domain.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatBuffer {
    /// One sample vector per channel, all the same length.
    pub samples: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl FloatBuffer {
    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decode the text-safe transport representation back to raw bytes.
///
/// Empty input is valid and yields an empty buffer.
pub fn decode_transport_audio(encoded: &str) -> Result<Vec<u8>, CodecError> {
    BASE64
        .decode(encoded)
        .map_err(|e| CodecError::InvalidEncoding(e.to_string()))
}

/// Encode raw bytes into the text-safe transport representation.
pub fn encode_transport_audio(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Interpret `bytes` as interleaved little-endian signed 16-bit samples and
/// de-interleave into per-channel float vectors scaled by 1/32768.
pub fn pcm16_to_float(
    bytes: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<FloatBuffer, CodecError> {
    let frame_bytes = channels as usize * 2;
    if frame_bytes == 0 || bytes.len() % frame_bytes != 0 {
        return Err(CodecError::TruncatedFrame {
            len: bytes.len(),
            channels,
        });
    }

    let frames = bytes.len() / frame_bytes;
    let mut samples: Vec<Vec<f32>> = (0..channels).map(|_| Vec::with_capacity(frames)).collect();

    for frame in bytes.chunks_exact(frame_bytes) {
        for (ch, sample_bytes) in frame.chunks_exact(2).enumerate() {
            let value = i16::from_le_bytes([sample_bytes[0], sample_bytes[1]]);
            samples[ch].push(value as f32 / 32768.0);
        }
    }

    Ok(FloatBuffer {
        samples,
        sample_rate,
    })
}

/// Convert float samples back to little-endian PCM16 bytes.
///
/// Out-of-range values are clamped to the i16 range, not wrapped; wrapping a
/// clipped sample produces an audible crack.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let scaled = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        bytes.extend_from_slice(&scaled.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    // Deterministic pseudo-random bytes, no external crate needed.
    fn pseudo_random_bytes(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn transport_round_trip() {
        for len in [0usize, 1, 17, 8192] {
            let bytes = pseudo_random_bytes(len);
            let encoded = encode_transport_audio(&bytes);
            let decoded = decode_transport_audio(&encoded).unwrap();
            assert_eq!(decoded, bytes, "round trip failed for {} bytes", len);
        }
    }

    #[test]
    fn decode_rejects_non_alphabet_input() {
        assert!(decode_transport_audio("not base64 !!!").is_err());
    }

    #[test]
    fn decode_accepts_empty_input() {
        assert_eq!(decode_transport_audio("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn pcm16_scaling_round_trip_within_one_lsb() {
        let original: Vec<i16> = vec![0, 1, -1, 1000, -1000, i16::MAX, i16::MIN, 12345];
        let bytes: Vec<u8> = original.iter().flat_map(|s| s.to_le_bytes()).collect();

        let floats = pcm16_to_float(&bytes, 16000, 1).unwrap();
        let back = float_to_pcm16(&floats.samples[0]);

        for (i, (a, b)) in bytes.chunks_exact(2).zip(back.chunks_exact(2)).enumerate() {
            let a = i16::from_le_bytes([a[0], a[1]]);
            let b = i16::from_le_bytes([b[0], b[1]]);
            assert!((a as i32 - b as i32).abs() <= 1, "sample {} drifted: {} vs {}", i, a, b);
        }
    }

    #[test]
    fn pcm16_to_float_deinterleaves_channels() {
        // Two frames of stereo: L=100 R=-100, L=200 R=-200
        let samples: Vec<i16> = vec![100, -100, 200, -200];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let buffer = pcm16_to_float(&bytes, 48000, 2).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frames(), 2);
        assert!(buffer.samples[0][0] > 0.0 && buffer.samples[1][0] < 0.0);
    }

    #[test]
    fn pcm16_to_float_rejects_partial_frames() {
        assert!(pcm16_to_float(&[0u8; 3], 16000, 1).is_err());
        assert!(pcm16_to_float(&[0u8; 6], 16000, 2).is_err());
    }

    #[test]
    fn float_to_pcm16_clamps_out_of_range() {
        let bytes = float_to_pcm16(&[2.0, -2.0]);
        let hi = i16::from_le_bytes([bytes[0], bytes[1]]);
        let lo = i16::from_le_bytes([bytes[2], bytes[3]]);
        assert_eq!(hi, i16::MAX);
        assert_eq!(lo, i16::MIN);
    }

    #[test]
    fn float_buffer_duration() {
        let buffer = FloatBuffer {
            samples: vec![vec![0.0; 12000]],
            sample_rate: 24000,
        };
        assert!((buffer.duration_secs() - 0.5).abs() < 1e-9);
    }
}
