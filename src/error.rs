//! Crate-wide error type.

use thiserror::Error;

use crate::wav::WavError;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised before streaming starts.
///
/// Once the DMA ring is running there is no failure path: the interrupt
/// handler always has a level to write, falling back to silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Error {
    /// The WAV payload is malformed or uses an unsupported format.
    #[error("invalid WAV payload: {0}")]
    Wav(#[from] WavError),

    /// A playback session was already claimed; only one may exist.
    #[error("a playback session is already active")]
    SessionActive,

    /// Both transfer lanes were bound to the same DMA channel.
    #[error("DMA channel {channel} bound to both lanes")]
    DuplicateDmaChannel {
        /// The channel number given twice.
        channel: u8,
    },

    /// The pace slice is the slice driving the carrier.
    #[error("PWM slice {slice} cannot both carry audio and pace DMA")]
    PaceSliceIsCarrier {
        /// The slice given for both roles.
        slice: u8,
    },

    /// `init` was called on an engine that already configured its channels.
    #[error("DMA engine initialized twice")]
    AlreadyInitialized,

    /// `start` was called before `init` armed both channels.
    #[error("DMA engine started before it was initialized")]
    EngineNotReady,
}
