//! Read cursor over the decoded PCM payload and the buffer refill protocol.
//!
//! See [`SampleSource::fill`].

use crate::level::{self, SILENCE_LEVEL};
use crate::wav::WavInfo;

/// End-of-data behavior for playback.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum AtEnd {
    /// Emit the silence level forever once the data is exhausted.
    #[default]
    Silence,
    /// Restart the cursor at the first frame and keep playing.
    Loop,
}

/// Position of the next unread frame.
///
/// `remaining` counts the bytes left before the end of the payload and never
/// exceeds the payload size.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlaybackCursor {
    position: usize,
    remaining: usize,
}

impl PlaybackCursor {
    const fn at_start(data_size: usize) -> Self {
        Self {
            position: 0,
            remaining: data_size,
        }
    }

    /// Byte offset of the next frame.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Bytes left before the end of the payload.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }
}

/// Produces duty levels from a [`WavInfo`] payload, one frame per slot.
///
/// The cursor and the `done` flag are only mutated through [`Self::fill`];
/// once streaming starts the DMA completion handler is its only caller.
pub struct SampleSource<'a> {
    wav_info: WavInfo<'a>,
    cursor: PlaybackCursor,
    at_end: AtEnd,
    done: bool,
}

impl<'a> SampleSource<'a> {
    /// Creates a source positioned on the first frame.
    #[must_use]
    pub const fn new(wav_info: WavInfo<'a>, at_end: AtEnd) -> Self {
        Self {
            cursor: PlaybackCursor::at_start(wav_info.data_size()),
            wav_info,
            at_end,
            done: false,
        }
    }

    /// Fills every slot of `levels` in order and returns how many slots carry
    /// audio rather than silence.
    ///
    /// When fewer than one frame's worth of bytes remain:
    /// - [`AtEnd::Silence`] writes [`SILENCE_LEVEL`] into this and all later
    ///   slots and marks the source done. Later calls keep writing silence and
    ///   never read the payload again.
    /// - [`AtEnd::Loop`] rewinds to the first frame and keeps going.
    pub fn fill(&mut self, levels: &mut [u16]) -> usize {
        let frame_stride = self.wav_info.frame_stride();
        let bits_per_sample = self.wav_info.bits_per_sample();
        let data = self.wav_info.data();
        let mut audio_slot_count = 0;

        for slot_index in 0..levels.len() {
            if self.cursor.remaining < frame_stride {
                match self.at_end {
                    AtEnd::Silence => {
                        self.done = true;
                        levels[slot_index..].fill(u16::from(SILENCE_LEVEL));
                        break;
                    }
                    AtEnd::Loop => self.cursor = PlaybackCursor::at_start(data.len()),
                }
            }

            let frame_end = self.cursor.position + frame_stride;
            let level = match data.get(self.cursor.position..frame_end) {
                Some(frame_bytes) => level::convert(frame_bytes, bits_per_sample),
                None => SILENCE_LEVEL,
            };

            levels[slot_index] = u16::from(level);
            self.cursor.position = frame_end;
            self.cursor.remaining -= frame_stride;
            audio_slot_count += 1;
        }

        audio_slot_count
    }

    /// True once the payload is exhausted in [`AtEnd::Silence`] mode.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Current read cursor.
    #[must_use]
    pub const fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    /// Bytes per frame of the underlying payload.
    #[must_use]
    pub const fn frame_stride(&self) -> usize {
        self.wav_info.frame_stride()
    }

    /// The parsed payload this source reads from.
    #[must_use]
    pub const fn wav_info(&self) -> &WavInfo<'a> {
        &self.wav_info
    }

    /// End-of-data policy.
    #[must_use]
    pub const fn at_end(&self) -> AtEnd {
        self.at_end
    }
}
