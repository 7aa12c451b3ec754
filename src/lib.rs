#![doc = include_str!("../README.md")]
//!
//! # Glossary
//!
//! Resources used on the Pico 1 and Pico 2:
//!
//! - **PWM ([Pulse Width Modulation](https://en.wikipedia.org/wiki/Pulse-width_modulation)) Slices:** Pico 1 has 8 slices (& 16 channels),
//!   Pico 2 has 12. One slice carries the audio, a second one only paces DMA. These "slices"
//!   are unrelated to Rust slices.
//! - **DMA ([Direct Memory Access](https://en.wikipedia.org/wiki/Direct_memory_access)):** Both Pico 1 and 2 have 12 channels. Playback
//!   claims two of them and chains them into a ring.
//! - **DREQ:** A hardware "transfer one item now" request. Here it comes from the pacing slice
//!   wrapping once per audio sample.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Compile-time checks: exactly one board must be selected (unless testing with host feature)
#[cfg(all(target_os = "none", not(any(feature = "pico1", feature = "pico2"))))]
compile_error!("Must enable exactly one board feature: 'pico1' or 'pico2'");

#[cfg(all(target_os = "none", feature = "pico1", feature = "pico2"))]
compile_error!("Cannot enable both 'pico1' and 'pico2' features simultaneously");

// Compile-time check: the interrupt handler and runtime are Cortex-M only
#[cfg(all(target_os = "none", not(feature = "arm")))]
compile_error!("Must enable the 'arm' architecture feature");

pub mod dma_engine;
mod error;
pub mod level;
pub mod pwm;
// Embedded-only: touches DMA and PWM registers and owns the DMA interrupt.
#[cfg(target_os = "none")]
pub mod pwm_audio;
pub mod sample_source;
pub mod session;
#[cfg(all(test, feature = "host"))]
mod test_wav;
pub mod wav;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
