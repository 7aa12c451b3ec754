//! PCM frame to 8-bit PWM duty level conversion.

use crate::wav::BitsPerSample;

/// Duty level that holds the output at the midpoint of its swing.
pub const SILENCE_LEVEL: u8 = 128;

/// Converts the first channel of one PCM frame into an 8-bit duty level.
///
/// - 8-bit PCM is already unsigned and centered on 128, so the byte passes through.
/// - 16-bit PCM is offset into the unsigned range and truncated to its high byte.
///
/// A frame too short for its sample width yields [`SILENCE_LEVEL`].
#[must_use]
pub fn convert(frame_bytes: &[u8], bits_per_sample: BitsPerSample) -> u8 {
    match (bits_per_sample, frame_bytes) {
        (BitsPerSample::Eight, [sample_u8, ..]) => *sample_u8,
        (BitsPerSample::Sixteen, [low_byte, high_byte, ..]) => {
            let sample_i32 = i32::from(i16::from_le_bytes([*low_byte, *high_byte]));
            ((sample_i32 + 32_768) >> 8) as u8
        }
        _ => SILENCE_LEVEL,
    }
}
