//! Carrier and pace PWM slices.
//!
//! The carrier slice drives the audio pin with an 8-bit duty cycle that DMA
//! rewrites once per sample. The pace slice drives no pin; each time its
//! counter wraps it raises the DREQ that lets DMA move the next sample.
//!
//! Slice arithmetic is plain Rust and host-testable. Slice setup goes through
//! embassy-rp's `Pwm` driver and only exists on the embedded target.

use core::num::NonZeroU32;

#[cfg(target_os = "none")]
use embassy_rp::{
    Peri,
    gpio::Pin as _,
    pac,
    pwm::{self, ChannelAPin, ChannelBPin, Pwm, Slice},
};

use crate::{Error, Result};

/// Carrier counter TOP: 256 duty levels, one per 8-bit level.
pub const CARRIER_TOP: u16 = 255;

/// Largest pace wrap the 16-bit counter can express (TOP = 0xFFFF).
pub const MAX_PACE_WRAP: u32 = 0x1_0000;

/// PWM slices on the selected chip.
#[cfg(not(feature = "pico2"))]
pub const PWM_SLICE_COUNT: u8 = 8;
/// PWM slices on the selected chip.
#[cfg(feature = "pico2")]
pub const PWM_SLICE_COUNT: u8 = 12;

/// DREQ number of slice 0's wrap event. Slice `n` raises `PACE_DREQ_BASE + n`.
#[cfg(not(feature = "pico2"))]
pub const PACE_DREQ_BASE: u8 = 24;
/// DREQ number of slice 0's wrap event. Slice `n` raises `PACE_DREQ_BASE + n`.
#[cfg(feature = "pico2")]
pub const PACE_DREQ_BASE: u8 = 32;

/// One of the two compare outputs of a slice.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum PwmChannel {
    /// Even GPIOs; low half of the CC register.
    A,
    /// Odd GPIOs; high half of the CC register.
    B,
}

impl PwmChannel {
    /// Index of this output within its slice.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// The slice and compare output wired to one GPIO.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct CarrierOutput {
    gpio: u8,
    slice: u8,
    channel: PwmChannel,
}

impl CarrierOutput {
    /// Maps a bank-0 GPIO number to its PWM slice and output.
    ///
    /// GPIO 0..=31 wrap around the first eight slices. GPIO 32..=47 (RP2350B
    /// only) wrap around slices 8..=11.
    #[must_use]
    pub const fn for_gpio(gpio: u8) -> Self {
        let slice = if gpio < 32 {
            (gpio >> 1) & 7
        } else {
            8 + (((gpio - 32) >> 1) & 3)
        };
        let channel = if gpio & 1 == 0 {
            PwmChannel::A
        } else {
            PwmChannel::B
        };
        Self {
            gpio,
            slice,
            channel,
        }
    }

    /// GPIO number.
    #[must_use]
    pub const fn gpio(&self) -> u8 {
        self.gpio
    }

    /// Slice index.
    #[must_use]
    pub const fn slice(&self) -> u8 {
        self.slice
    }

    /// Compare output within the slice.
    #[must_use]
    pub const fn channel(&self) -> PwmChannel {
        self.channel
    }

    /// Byte offset of this output's 16-bit half inside the slice's CC register.
    #[must_use]
    pub const fn duty_offset(&self) -> u32 {
        2 * self.channel.index() as u32
    }
}

/// Chooses the slice that paces DMA, distinct from `carrier_slice`.
///
/// Takes the next slice index modulo `slice_count`. Returns `None` when there is
/// no second slice to use.
#[must_use]
pub const fn pick_pace_slice(carrier_slice: u8, slice_count: u8) -> Option<u8> {
    if slice_count < 2 {
        return None;
    }
    let pace_slice = (carrier_slice % slice_count + 1) % slice_count;
    Some(pace_slice)
}

/// Pace counter period in system clocks: `round(clk_sys_hz / sample_rate_hz)`
/// clamped to `1..=MAX_PACE_WRAP`.
#[must_use]
pub fn pace_wrap(clk_sys_hz: u32, sample_rate_hz: NonZeroU32) -> u32 {
    let sample_rate_hz = u64::from(sample_rate_hz.get());
    let wrap = (u64::from(clk_sys_hz) + sample_rate_hz / 2) / sample_rate_hz;
    wrap.clamp(1, u64::from(MAX_PACE_WRAP)) as u32
}

/// TOP register value for a clamped pace wrap.
#[must_use]
pub const fn pace_top(pace_wrap: u32) -> u16 {
    (pace_wrap - 1) as u16
}

/// DREQ raised when `pace_slice` wraps.
#[must_use]
pub const fn pace_dreq(pace_slice: u8) -> u8 {
    PACE_DREQ_BASE + pace_slice
}

/// Rejects a pace slice that is also the carrier slice.
///
/// # Errors
/// [`Error::PaceSliceIsCarrier`] when both roles name the same slice.
pub const fn check_pace_slice(carrier_slice: u8, pace_slice: u8) -> Result<u8> {
    if pace_slice == carrier_slice {
        return Err(Error::PaceSliceIsCarrier { slice: pace_slice });
    }
    Ok(pace_slice)
}

/// Bus address of the output's 16-bit duty half-register, the fixed DMA
/// write target.
#[cfg(target_os = "none")]
pub(crate) fn duty_register_addr(carrier_output: &CarrierOutput) -> u32 {
    let cc_addr = pac::PWM.ch(usize::from(carrier_output.slice)).cc().as_ptr() as u32;
    cc_addr + carrier_output.duty_offset()
}

/// A carrier slice driving one GPIO, resting at the silence level.
///
/// Owns the slice and the pin, and offers no way to change the duty cycle:
/// once playback starts only DMA writes it. Building a `Carrier` on its own is
/// the safe idle state, with the pin held at the PWM midpoint.
///
/// Dropping it disables the slice.
#[cfg(target_os = "none")]
pub struct Carrier {
    _pwm: Pwm<'static>,
    carrier_output: CarrierOutput,
}

#[cfg(target_os = "none")]
impl Carrier {
    /// Carrier on an even GPIO, output A of `slice`.
    pub fn new_output_a<S: Slice>(
        slice: Peri<'static, S>,
        pin: Peri<'static, impl ChannelAPin<S>>,
    ) -> Self {
        let carrier_output = CarrierOutput::for_gpio(pin.pin());
        let pwm = Pwm::new_output_a(slice, pin, carrier_config());
        Self::logged(pwm, carrier_output)
    }

    /// Carrier on an odd GPIO, output B of `slice`.
    pub fn new_output_b<S: Slice>(
        slice: Peri<'static, S>,
        pin: Peri<'static, impl ChannelBPin<S>>,
    ) -> Self {
        let carrier_output = CarrierOutput::for_gpio(pin.pin());
        let pwm = Pwm::new_output_b(slice, pin, carrier_config());
        Self::logged(pwm, carrier_output)
    }

    fn logged(pwm: Pwm<'static>, carrier_output: CarrierOutput) -> Self {
        defmt::debug!(
            "carrier: gpio {} slice {} channel {}",
            carrier_output.gpio,
            carrier_output.slice,
            carrier_output.channel
        );
        Self {
            _pwm: pwm,
            carrier_output,
        }
    }

    /// Slice and output wired to the pin.
    #[must_use]
    pub const fn carrier_output(&self) -> CarrierOutput {
        self.carrier_output
    }
}

// TOP 255 with both compares at silence. The default divider is 1.
#[cfg(target_os = "none")]
fn carrier_config() -> pwm::Config {
    let silence_level = u16::from(crate::level::SILENCE_LEVEL);
    let mut config = pwm::Config::default();
    config.top = CARRIER_TOP;
    config.compare_a = silence_level;
    config.compare_b = silence_level;
    config
}

/// Starts `pace_slice` free-running with the given TOP. No pin is attached.
///
/// The returned handle must stay alive for as long as DMA is paced.
#[cfg(target_os = "none")]
pub(crate) fn start_pace(
    pace_slice: Peri<'static, impl Slice>,
    pace_top: u16,
) -> Pwm<'static> {
    let pace_slice_number = pace_slice.number();
    let mut config = pwm::Config::default();
    config.top = pace_top;
    let pwm = Pwm::new_free(pace_slice, config);

    defmt::debug!(
        "pace: slice {} top {} dreq {}",
        pace_slice_number,
        pace_top,
        pace_dreq(pace_slice_number)
    );
    pwm
}
