#![allow(missing_docs)]
#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]

use core::convert::Infallible;
use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_rp::{Peri, dma::Channel, pwm::Slice};
use embassy_time::Timer;
use pwm_wav_player::{
    Result,
    pwm::{self, Carrier, CarrierOutput, PWM_SLICE_COUNT},
    pwm_audio::PwmAudio,
    sample_source::AtEnd,
    wav::WavInfo,
};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

#[cfg(feature = "pico2")]
#[unsafe(link_section = ".start_block")]
#[used]
pub static IMAGE_DEF: embassy_rp::block::ImageDef = embassy_rp::block::ImageDef::secure_exe();

// Written by build.rs: $PWM_AUDIO_WAV if set, otherwise a short synthesized chime.
static WAV_BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/payload.wav"));

// Speaker (through an RC low-pass and amplifier) on GPIO 15, output B of slice 7.
const AUDIO_GPIO: u8 = 15;
// Slice 0 paces DMA, the slice picked for a slice 7 carrier.
const _: () = assert!(matches!(
    pwm::pick_pace_slice(CarrierOutput::for_gpio(AUDIO_GPIO).slice(), PWM_SLICE_COUNT),
    Some(0)
));

#[embassy_executor::main]
async fn main(_spawner: Spawner) -> ! {
    let p = embassy_rp::init(Default::default());

    // Safe idle from here on: the pin rests at the PWM midpoint, not floating.
    static CARRIER: StaticCell<Carrier> = StaticCell::new();
    let carrier: &'static Carrier = CARRIER.init(Carrier::new_output_b(p.PWM_SLICE7, p.PIN_15));

    let Err(err) = inner_main(carrier, p.PWM_SLICE0, p.DMA_CH0, p.DMA_CH1).await;

    error!("playback did not start: {}", err);
    loop {
        Timer::after_secs(60).await;
    }
}

async fn inner_main(
    carrier: &'static Carrier,
    pace_slice: Peri<'static, impl Slice>,
    dma_a: Peri<'static, impl Channel>,
    dma_b: Peri<'static, impl Channel>,
) -> Result<Infallible> {
    let wav_info = WavInfo::parse(WAV_BYTES)?;
    info!(
        "wav: {} Hz, {} bit, {} channel(s), {} frames",
        wav_info.sample_rate_hz().get(),
        wav_info.bits_per_sample().bits(),
        wav_info.channels().count(),
        wav_info.frame_count()
    );

    let pwm_audio = PwmAudio::new(
        carrier,
        pace_slice,
        dma_a,
        dma_b,
        wav_info,
        AtEnd::Silence,
    )?;

    // The foreground only reports what the DMA interrupt publishes.
    let mut reported_late_refills = 0;
    let mut reported_done = false;
    loop {
        Timer::after_millis(250).await;

        let late_refills = pwm_audio.late_refills();
        if late_refills != reported_late_refills {
            warn!("late refills: {}", late_refills);
            reported_late_refills = late_refills;
        }
        if !reported_done && pwm_audio.is_done() {
            info!("playback finished; output held at silence");
            reported_done = true;
        }
    }
}
