//! A device abstraction that streams a WAV payload to one GPIO as PWM audio.
//!
//! See [`PwmAudio`] for usage.
//!
//! Two DMA channels are chained into a ring and paced by a second PWM slice
//! that wraps once per sample. After [`PwmAudio::new`] returns, the CPU only
//! runs the `DMA_IRQ_1` handler, which refills whichever buffer just drained.
//! DMA interrupt line 0 is left to embassy-rp's async DMA driver.
//!
//! Both PWM slices are owned for the rest of the boot: the carrier through a
//! `&'static` [`Carrier`], the pace slice by this module. Nothing but DMA can
//! write the duty register once playback starts.

use core::num::NonZeroU32;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use defmt::info;
use embassy_rp::Peri;
use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::dma::Channel;
use embassy_rp::interrupt::{self, InterruptExt, Priority};
use embassy_rp::pac;
use embassy_rp::pwm::{Pwm, Slice};
use static_cell::StaticCell;

use crate::dma_engine::{
    ChannelBinding, DmaPort, DoubleBufferEngine, TransferTarget, route_completion,
};
use crate::pwm::{self, Carrier, CarrierOutput};
use crate::sample_source::{AtEnd, SampleSource};
use crate::session::SessionSlot;
use crate::wav::WavInfo;
use crate::{Error, Result};

// The DMA interrupt line whose enable and status registers this module owns.
const DMA_IRQ_LINE: usize = 1;
// embassy-rp enables every channel on line 0 at init.
const EMBASSY_DMA_IRQ_LINE: usize = 0;

type PlaybackEngine = DoubleBufferEngine<'static, RpDmaPort>;

static SESSION: SessionSlot<PlaybackEngine> = SessionSlot::new();
static PLAYBACK_DONE: AtomicBool = AtomicBool::new(false);
static LATE_REFILLS: AtomicU32 = AtomicU32::new(0);
static PACE_PWM: StaticCell<Pwm<'static>> = StaticCell::new();

/// [`DmaPort`] on the RP DMA controller, completion routed to `DMA_IRQ_1`.
struct RpDmaPort;

impl DmaPort for RpDmaPort {
    fn configure(
        &mut self,
        binding: ChannelBinding,
        target: TransferTarget,
        read_addr: *const u16,
        transfer_count: usize,
    ) {
        let dma_channel = pac::DMA.ch(usize::from(binding.channel));
        dma_channel.read_addr().write_value(read_addr as u32);
        dma_channel.write_addr().write_value(target.write_addr());
        write_trans_count(dma_channel, transfer_count);

        let mut ctrl = pac::dma::regs::CtrlTrig(0);
        ctrl.set_en(true);
        ctrl.set_data_size(pac::dma::vals::DataSize::SIZE_HALFWORD);
        ctrl.set_incr_read(true);
        ctrl.set_incr_write(false);
        ctrl.set_treq_sel(pac::dma::vals::TreqSel::from(target.pacing_dreq()));
        ctrl.set_chain_to(binding.chain_to);
        // Alias 1 CTRL does not trigger.
        dma_channel.al1_ctrl().write_value(ctrl.0);

        let enable_masks = [
            pac::DMA.inte(EMBASSY_DMA_IRQ_LINE).read(),
            pac::DMA.inte(DMA_IRQ_LINE).read(),
        ];
        let [embassy_mask, audio_mask] =
            route_completion(enable_masks, binding.channel, DMA_IRQ_LINE);
        pac::DMA.inte(EMBASSY_DMA_IRQ_LINE).write_value(embassy_mask);
        pac::DMA.inte(DMA_IRQ_LINE).write_value(audio_mask);
    }

    fn rearm(&mut self, channel: u8, read_addr: *const u16, transfer_count: usize) {
        let dma_channel = pac::DMA.ch(usize::from(channel));
        dma_channel.read_addr().write_value(read_addr as u32);
        write_trans_count(dma_channel, transfer_count);
    }

    fn trigger(&mut self, channel: u8) {
        pac::DMA
            .multi_chan_trigger()
            .write(|w| w.set_multi_chan_trigger(1 << channel));
    }

    fn take_completion(&mut self, channel: u8) -> bool {
        let channel_mask = 1_u32 << channel;
        let is_flagged = pac::DMA.ints(DMA_IRQ_LINE).read() & channel_mask != 0;
        if is_flagged {
            pac::DMA.ints(DMA_IRQ_LINE).write_value(channel_mask);
        }
        is_flagged
    }
}

#[cfg(feature = "pico1")]
fn write_trans_count(dma_channel: pac::dma::Channel, transfer_count: usize) {
    dma_channel
        .trans_count()
        .write(|w| *w = transfer_count as u32);
}

#[cfg(feature = "pico2")]
fn write_trans_count(dma_channel: pac::dma::Channel, transfer_count: usize) {
    dma_channel.trans_count().write(|w| {
        w.set_mode(0.into());
        w.set_count(transfer_count as u32);
    });
}

#[embassy_rp::interrupt]
fn DMA_IRQ_1() {
    // SAFETY: this handler is the only caller once the session is active and
    // an interrupt never preempts itself.
    let published = unsafe {
        SESSION.service(|engine| {
            engine.on_transfer_complete();
            (engine.is_done(), engine.late_refills())
        })
    };
    if let Some((is_done, late_refills)) = published {
        PLAYBACK_DONE.store(is_done, Ordering::Relaxed);
        LATE_REFILLS.store(late_refills, Ordering::Relaxed);
    }
}

/// Plays one WAV payload on a GPIO through a PWM carrier fed by chained DMA.
///
/// Only one instance can exist per boot. Playback runs until power-off; at
/// the end of the data the pin either rests at the silence level or the
/// payload loops, per [`AtEnd`].
///
/// # Example
///
/// ```rust,no_run
/// # #![no_std]
/// # #![no_main]
/// use pwm_wav_player::{
///     Result, pwm::Carrier, pwm_audio::PwmAudio, sample_source::AtEnd, wav::WavInfo,
/// };
/// use embassy_time::{Duration, Timer};
/// use static_cell::StaticCell;
/// # #[panic_handler]
/// # fn panic(_info: &core::panic::PanicInfo) -> ! { loop {} }
///
/// async fn example(p: embassy_rp::Peripherals, wav_bytes: &'static [u8]) -> Result<()> {
///     // GPIO 15 is output B of slice 7. The pin rests at silence from here on.
///     static CARRIER: StaticCell<Carrier> = StaticCell::new();
///     let carrier = CARRIER.init(Carrier::new_output_b(p.PWM_SLICE7, p.PIN_15));
///
///     let wav_info = WavInfo::parse(wav_bytes)?;
///     let pwm_audio = PwmAudio::new(
///         carrier,
///         p.PWM_SLICE0,
///         p.DMA_CH0,
///         p.DMA_CH1,
///         wav_info,
///         AtEnd::Silence,
///     )?;
///
///     // Playback runs from the DMA interrupt; the foreground only watches.
///     while !pwm_audio.is_done() {
///         Timer::after(Duration::from_millis(100)).await;
///     }
///     defmt::info!("late refills: {}", pwm_audio.late_refills());
///
///     core::future::pending().await // keep the pin driven
/// }
/// ```
pub struct PwmAudio {
    carrier_output: CarrierOutput,
    pace_slice: u8,
    dma_channels: [u8; 2],
    sample_rate_hz: NonZeroU32,
}

impl PwmAudio {
    /// Starts `pace_slice` at the WAV's sample rate and `dma_a`/`dma_b`
    /// streaming into `carrier`.
    ///
    /// [`pwm::pick_pace_slice`] gives a pace slice that never collides with
    /// the carrier.
    ///
    /// # Errors
    /// - [`Error::PaceSliceIsCarrier`] if `pace_slice` drives the carrier.
    /// - [`Error::DuplicateDmaChannel`] if both channels are the same.
    /// - [`Error::SessionActive`] if playback was already started this boot.
    ///
    /// All of these are detected before any register is written. The carrier
    /// keeps holding silence when they occur.
    pub fn new(
        carrier: &'static Carrier,
        pace_slice: Peri<'static, impl Slice>,
        dma_a: Peri<'static, impl Channel>,
        dma_b: Peri<'static, impl Channel>,
        wav_info: WavInfo<'static>,
        at_end: AtEnd,
    ) -> Result<Self> {
        let carrier_output = carrier.carrier_output();
        let pace_slice_number =
            pwm::check_pace_slice(carrier_output.slice(), pace_slice.number())?;
        let pace_top = pwm::pace_top(pwm::pace_wrap(clk_sys_freq(), wav_info.sample_rate_hz()));
        let dma_channels = [dma_a.number(), dma_b.number()];

        let target = TransferTarget::new(
            pwm::duty_register_addr(&carrier_output),
            pwm::pace_dreq(pace_slice_number),
        );
        let engine = DoubleBufferEngine::new(
            RpDmaPort,
            SampleSource::new(wav_info, at_end),
            target,
            dma_channels,
        )?;
        let mut engine = SESSION.claim(engine)?;

        PACE_PWM
            .try_init(pwm::start_pace(pace_slice, pace_top))
            .ok_or(Error::SessionActive)?;
        engine.init()?;
        engine.start()?;
        SESSION.activate(engine);

        interrupt::DMA_IRQ_1.set_priority(Priority::P0);
        // SAFETY: the session is active, so the handler has an engine to service.
        unsafe { interrupt::DMA_IRQ_1.enable() };

        info!(
            "pwm audio: gpio {} slice {} pace slice {} top {} dma {}/{} at {} Hz",
            carrier_output.gpio(),
            carrier_output.slice(),
            pace_slice_number,
            pace_top,
            dma_channels[0],
            dma_channels[1],
            wav_info.sample_rate_hz().get()
        );

        Ok(Self {
            carrier_output,
            pace_slice: pace_slice_number,
            dma_channels,
            sample_rate_hz: wav_info.sample_rate_hz(),
        })
    }

    /// True once the payload has been exhausted in [`AtEnd::Silence`] mode.
    ///
    /// Updated by the interrupt handler after each refill, so it turns true
    /// while the last buffers of audio are still draining.
    #[must_use]
    pub fn is_done(&self) -> bool {
        PLAYBACK_DONE.load(Ordering::Relaxed)
    }

    /// Interrupts that found both buffers drained, i.e. missed refill deadlines.
    #[must_use]
    pub fn late_refills(&self) -> u32 {
        LATE_REFILLS.load(Ordering::Relaxed)
    }

    /// Playback sample rate.
    #[must_use]
    pub const fn sample_rate_hz(&self) -> NonZeroU32 {
        self.sample_rate_hz
    }

    /// Carrier slice and output driving the pin.
    #[must_use]
    pub const fn carrier_output(&self) -> CarrierOutput {
        self.carrier_output
    }

    /// Slice pacing DMA.
    #[must_use]
    pub const fn pace_slice(&self) -> u8 {
        self.pace_slice
    }

    /// DMA channels of lanes A and B.
    #[must_use]
    pub const fn dma_channels(&self) -> [u8; 2] {
        self.dma_channels
    }
}
