//! Decode-once parser for linear PCM WAV payloads.
//!
//! See [`WavInfo::parse`]. The parser borrows the payload; nothing is copied.

use core::num::NonZeroU32;

use thiserror::Error;

/// Smallest byte length of a canonical PCM WAV file (RIFF + `fmt ` + `data` headers).
const MIN_WAV_LEN: usize = 44;
const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const FMT_CHUNK_MIN_LEN: usize = 16;
const WAVE_FORMAT_PCM: u16 = 0x0001;

/// Why a WAV payload was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum WavError {
    /// Fewer than 44 bytes.
    #[error("file shorter than a WAV header")]
    TooShort,
    /// The first four bytes are not `RIFF`.
    #[error("missing RIFF header")]
    NotRiff,
    /// Bytes 8..12 are not `WAVE`.
    #[error("missing WAVE header")]
    NotWave,
    /// No complete `fmt ` chunk was found.
    #[error("missing fmt chunk")]
    MissingFmt,
    /// The `fmt ` chunk is shorter than 16 bytes.
    #[error("fmt chunk too small")]
    FmtTooSmall,
    /// Not linear PCM.
    #[error("format code {format:#06x} is not PCM")]
    NotPcm {
        /// The `wFormatTag` field.
        format: u16,
    },
    /// Only mono and stereo are supported.
    #[error("unsupported channel count {channels}")]
    UnsupportedChannels {
        /// The `nChannels` field.
        channels: u16,
    },
    /// Only 8-bit and 16-bit samples are supported.
    #[error("unsupported bit depth {bits}")]
    UnsupportedBitDepth {
        /// The `wBitsPerSample` field.
        bits: u16,
    },
    /// The sample rate field is zero.
    #[error("sample rate is zero")]
    ZeroSampleRate,
    /// No complete `data` chunk was found.
    #[error("missing data chunk")]
    MissingData,
    /// The `data` chunk cannot hold a single full frame.
    #[error("data chunk holds no complete frame")]
    NoCompleteFrame,
}

/// PCM sample width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum BitsPerSample {
    /// Unsigned 8-bit samples centered on 128.
    Eight,
    /// Signed little-endian 16-bit samples.
    Sixteen,
}

impl BitsPerSample {
    /// Bytes occupied by one sample of one channel.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Eight => 1,
            Self::Sixteen => 2,
        }
    }

    /// Bit width as stored in the `fmt ` chunk.
    #[must_use]
    pub const fn bits(self) -> u16 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }
}

/// Interleaved channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Channels {
    /// One channel.
    Mono,
    /// Two interleaved channels; playback uses the first.
    Stereo,
}

impl Channels {
    /// Number of interleaved channels.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// Validated metadata and PCM payload of a parsed WAV file.
///
/// `data().len()` is always a non-zero multiple of [`Self::frame_stride`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo<'a> {
    data: &'a [u8],
    sample_rate_hz: NonZeroU32,
    bits_per_sample: BitsPerSample,
    channels: Channels,
}

impl<'a> WavInfo<'a> {
    /// Parses a RIFF/WAVE byte buffer holding 8- or 16-bit mono or stereo PCM.
    ///
    /// Chunks are walked from the end of the RIFF header, honoring the pad byte
    /// that follows odd-sized chunks. A chunk whose payload overruns the buffer
    /// is skipped. When a chunk id repeats, the last complete one wins.
    ///
    /// # Errors
    /// Returns a [`WavError`] describing the first problem found. No partial
    /// result is ever returned.
    pub fn parse(wav_bytes: &'a [u8]) -> Result<Self, WavError> {
        if wav_bytes.len() < MIN_WAV_LEN {
            return Err(WavError::TooShort);
        }
        if !wav_tag_eq(wav_bytes, 0, *b"RIFF") {
            return Err(WavError::NotRiff);
        }
        if !wav_tag_eq(wav_bytes, 8, *b"WAVE") {
            return Err(WavError::NotWave);
        }

        let mut fmt_chunk: Option<&[u8]> = None;
        let mut fmt_too_small = false;
        let mut data_chunk: Option<&[u8]> = None;

        let mut chunk_offset = RIFF_HEADER_LEN;
        while let Some(chunk_data_start) = chunk_offset
            .checked_add(CHUNK_HEADER_LEN)
            .filter(|chunk_data_start| *chunk_data_start <= wav_bytes.len())
        {
            let chunk_size = read_u32_le(wav_bytes, chunk_offset + 4) as usize;
            let chunk_data = chunk_data_start
                .checked_add(chunk_size)
                .and_then(|chunk_data_end| wav_bytes.get(chunk_data_start..chunk_data_end));

            if let Some(chunk_data) = chunk_data {
                if wav_tag_eq(wav_bytes, chunk_offset, *b"fmt ") {
                    if chunk_data.len() < FMT_CHUNK_MIN_LEN {
                        fmt_too_small = true;
                    } else {
                        fmt_chunk = Some(chunk_data);
                    }
                } else if wav_tag_eq(wav_bytes, chunk_offset, *b"data") {
                    data_chunk = Some(chunk_data);
                }
            }

            let Some(next_chunk_offset) = chunk_size
                .checked_add(chunk_size & 1)
                .and_then(|padded_chunk_size| chunk_data_start.checked_add(padded_chunk_size))
            else {
                break;
            };
            chunk_offset = next_chunk_offset;
        }

        let fmt_chunk = match fmt_chunk {
            Some(fmt_chunk) => fmt_chunk,
            None if fmt_too_small => return Err(WavError::FmtTooSmall),
            None => return Err(WavError::MissingFmt),
        };

        let audio_format = read_u16_le(fmt_chunk, 0);
        let channel_count = read_u16_le(fmt_chunk, 2);
        let sample_rate_hz = read_u32_le(fmt_chunk, 4);
        let bits = read_u16_le(fmt_chunk, 14);

        if audio_format != WAVE_FORMAT_PCM {
            return Err(WavError::NotPcm {
                format: audio_format,
            });
        }
        let channels = match channel_count {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            channels => return Err(WavError::UnsupportedChannels { channels }),
        };
        let bits_per_sample = match bits {
            8 => BitsPerSample::Eight,
            16 => BitsPerSample::Sixteen,
            bits => return Err(WavError::UnsupportedBitDepth { bits }),
        };
        let sample_rate_hz = NonZeroU32::new(sample_rate_hz).ok_or(WavError::ZeroSampleRate)?;
        let data_chunk = data_chunk.ok_or(WavError::MissingData)?;

        let frame_stride = bits_per_sample.bytes() * channels.count();
        let data_size = data_chunk.len() - data_chunk.len() % frame_stride;
        if data_size == 0 {
            return Err(WavError::NoCompleteFrame);
        }

        Ok(Self {
            data: &data_chunk[..data_size],
            sample_rate_hz,
            bits_per_sample,
            channels,
        })
    }

    /// PCM bytes, truncated to whole frames.
    #[must_use]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Length of [`Self::data`] in bytes.
    #[must_use]
    pub const fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Sample rate in hertz.
    #[must_use]
    pub const fn sample_rate_hz(&self) -> NonZeroU32 {
        self.sample_rate_hz
    }

    /// Sample width.
    #[must_use]
    pub const fn bits_per_sample(&self) -> BitsPerSample {
        self.bits_per_sample
    }

    /// Channel layout.
    #[must_use]
    pub const fn channels(&self) -> Channels {
        self.channels
    }

    /// Bytes per frame across all channels. Always greater than zero.
    #[must_use]
    pub const fn frame_stride(&self) -> usize {
        self.bits_per_sample.bytes() * self.channels.count()
    }

    /// Number of whole frames in the payload.
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.data.len() / self.frame_stride()
    }
}

fn wav_tag_eq(wav_bytes: &[u8], byte_offset: usize, tag_bytes: [u8; 4]) -> bool {
    wav_bytes.get(byte_offset..byte_offset + 4) == Some(&tag_bytes[..])
}

// Callers guarantee the offsets are in bounds: chunk headers are checked by the
// walk loop and `fmt ` payloads are at least 16 bytes.
fn read_u16_le(bytes: &[u8], byte_offset: usize) -> u16 {
    u16::from_le_bytes([bytes[byte_offset], bytes[byte_offset + 1]])
}

fn read_u32_le(bytes: &[u8], byte_offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[byte_offset],
        bytes[byte_offset + 1],
        bytes[byte_offset + 2],
        bytes[byte_offset + 3],
    ])
}
