#![allow(missing_docs)]

use super::{
    ChannelBinding, ChannelPhase, DmaPort, DoubleBufferEngine, Lane, TransferTarget,
    route_completion,
};
use crate::Error;
use crate::level::SILENCE_LEVEL;
use crate::sample_source::{AtEnd, SampleSource};
use crate::test_wav::{MONO_16, s16le, wav_bytes};
use crate::wav::WavInfo;
use std::cell::RefCell;
use std::error::Error as StdError;
use std::rc::Rc;

const CHANNEL_A: u8 = 3;
const CHANNEL_B: u8 = 7;
const DUTY_ADDR: u32 = 0x4005_000E;
const PACE_DREQ: u8 = 25;
const SILENCE: u16 = SILENCE_LEVEL as u16;

#[derive(Debug, PartialEq)]
enum DmaEvent {
    Configure {
        binding: ChannelBinding,
        target: TransferTarget,
        transfer_count: usize,
    },
    Rearm {
        channel: u8,
        transfer_count: usize,
    },
    Trigger {
        channel: u8,
    },
}

#[derive(Default)]
struct FakeDmaState {
    events: Vec<DmaEvent>,
    completion_flags: [bool; 16],
}

/// Records register programming and lets a test raise completion flags.
#[derive(Clone, Default)]
struct FakeDma(Rc<RefCell<FakeDmaState>>);

impl FakeDma {
    fn complete(&self, channel: u8) {
        self.0.borrow_mut().completion_flags[usize::from(channel)] = true;
    }

    fn take_events(&self) -> Vec<DmaEvent> {
        std::mem::take(&mut self.0.borrow_mut().events)
    }

    fn is_flagged(&self, channel: u8) -> bool {
        self.0.borrow().completion_flags[usize::from(channel)]
    }
}

impl DmaPort for FakeDma {
    fn configure(
        &mut self,
        binding: ChannelBinding,
        target: TransferTarget,
        _read_addr: *const u16,
        transfer_count: usize,
    ) {
        self.0.borrow_mut().events.push(DmaEvent::Configure {
            binding,
            target,
            transfer_count,
        });
    }

    fn rearm(&mut self, channel: u8, _read_addr: *const u16, transfer_count: usize) {
        self.0.borrow_mut().events.push(DmaEvent::Rearm {
            channel,
            transfer_count,
        });
    }

    fn trigger(&mut self, channel: u8) {
        self.0
            .borrow_mut()
            .events
            .push(DmaEvent::Trigger { channel });
    }

    fn take_completion(&mut self, channel: u8) -> bool {
        std::mem::take(&mut self.0.borrow_mut().completion_flags[usize::from(channel)])
    }
}

fn target() -> TransferTarget {
    TransferTarget::new(DUTY_ADDR, PACE_DREQ)
}

fn engine_for<'a, const N: usize>(
    wav_info: WavInfo<'a>,
    at_end: AtEnd,
    fake_dma: &FakeDma,
) -> Result<DoubleBufferEngine<'a, FakeDma, N>, Error> {
    DoubleBufferEngine::new(
        fake_dma.clone(),
        SampleSource::new(wav_info, at_end),
        target(),
        [CHANNEL_A, CHANNEL_B],
    )
}

#[test]
fn init_fills_both_buffers_and_chains_lanes() -> Result<(), Box<dyn StdError>> {
    let bytes = wav_bytes(&MONO_16, &s16le(&[0, 16_384, -16_384, 0]));
    let fake_dma = FakeDma::default();
    let mut engine = engine_for::<2>(WavInfo::parse(&bytes)?, AtEnd::Silence, &fake_dma)?;

    assert_eq!(engine.phase(Lane::A), ChannelPhase::Idle);
    engine.init()?;

    assert_eq!(engine.buffer(Lane::A).levels(), &[128, 192]);
    assert_eq!(engine.buffer(Lane::B).levels(), &[64, 128]);
    assert_eq!(engine.phase(Lane::A), ChannelPhase::Armed);
    assert_eq!(engine.phase(Lane::B), ChannelPhase::Armed);
    assert_eq!(engine.binding(Lane::B).chain_to, CHANNEL_A);
    assert_eq!(
        fake_dma.take_events(),
        [
            DmaEvent::Configure {
                binding: ChannelBinding {
                    lane: Lane::A,
                    channel: CHANNEL_A,
                    chain_to: CHANNEL_B,
                },
                target: target(),
                transfer_count: 2,
            },
            DmaEvent::Configure {
                binding: ChannelBinding {
                    lane: Lane::B,
                    channel: CHANNEL_B,
                    chain_to: CHANNEL_A,
                },
                target: target(),
                transfer_count: 2,
            },
        ]
    );
    Ok(())
}

#[test]
fn start_triggers_lane_a_only() -> Result<(), Box<dyn StdError>> {
    let bytes = wav_bytes(&MONO_16, &s16le(&[0; 8]));
    let fake_dma = FakeDma::default();
    let mut engine = engine_for::<4>(WavInfo::parse(&bytes)?, AtEnd::Silence, &fake_dma)?;
    engine.init()?;
    fake_dma.take_events();

    engine.start()?;
    assert_eq!(
        fake_dma.take_events(),
        [DmaEvent::Trigger { channel: CHANNEL_A }]
    );
    assert_eq!(engine.phase(Lane::A), ChannelPhase::Draining);
    assert_eq!(engine.phase(Lane::B), ChannelPhase::Armed);
    Ok(())
}

#[test]
fn start_before_init_is_rejected() -> Result<(), Box<dyn StdError>> {
    let bytes = wav_bytes(&MONO_16, &s16le(&[0; 8]));
    let fake_dma = FakeDma::default();
    let mut engine = engine_for::<4>(WavInfo::parse(&bytes)?, AtEnd::Silence, &fake_dma)?;

    assert_eq!(engine.start(), Err(Error::EngineNotReady));
    assert!(fake_dma.take_events().is_empty(), "nothing may be triggered");

    engine.init()?;
    engine.start()?;
    assert_eq!(engine.start(), Err(Error::EngineNotReady));
    Ok(())
}

#[test]
fn second_init_is_rejected_without_touching_channels() -> Result<(), Box<dyn StdError>> {
    let bytes = wav_bytes(&MONO_16, &s16le(&[0, 16_384, -16_384, 0, 1, 2, 3, 4]));
    let fake_dma = FakeDma::default();
    let mut engine = engine_for::<2>(WavInfo::parse(&bytes)?, AtEnd::Silence, &fake_dma)?;
    engine.init()?;
    fake_dma.take_events();
    let cursor_after_init = engine.sample_source().cursor();

    assert_eq!(engine.init(), Err(Error::AlreadyInitialized));
    engine.start()?;
    assert_eq!(engine.init(), Err(Error::AlreadyInitialized));

    assert_eq!(
        fake_dma.take_events(),
        [DmaEvent::Trigger { channel: CHANNEL_A }]
    );
    assert_eq!(engine.sample_source().cursor(), cursor_after_init);
    assert_eq!(engine.buffer(Lane::A).levels(), &[128, 192]);
    Ok(())
}

#[test]
fn completion_is_routed_to_one_interrupt_line() {
    // Line 0 starts with every channel enabled.
    let routed = route_completion([0xFFFF, 0], CHANNEL_A, 1);
    assert_eq!(routed, [0xFFFF & !(1 << CHANNEL_A), 1 << CHANNEL_A]);

    let routed = route_completion(routed, CHANNEL_B, 1);
    assert_eq!(
        routed,
        [
            0xFFFF & !(1 << CHANNEL_A) & !(1 << CHANNEL_B),
            (1 << CHANNEL_A) | (1 << CHANNEL_B)
        ]
    );
    assert_eq!(route_completion([0, 0b1000], 3, 1), [0, 0b1000]);
}

#[test]
fn same_channel_for_both_lanes_is_rejected() -> Result<(), Box<dyn StdError>> {
    let bytes = wav_bytes(&MONO_16, &s16le(&[0; 8]));
    let result = DoubleBufferEngine::<FakeDma, 4>::new(
        FakeDma::default(),
        SampleSource::new(WavInfo::parse(&bytes)?, AtEnd::Silence),
        target(),
        [CHANNEL_A, CHANNEL_A],
    );
    assert!(matches!(
        result,
        Err(Error::DuplicateDmaChannel { channel: CHANNEL_A })
    ));
    Ok(())
}

#[test]
fn completion_refills_and_rearms_finished_lane() -> Result<(), Box<dyn StdError>> {
    let samples: Vec<i16> = (0..6).map(|index| index * 256).collect();
    let bytes = wav_bytes(&MONO_16, &s16le(&samples));
    let fake_dma = FakeDma::default();
    let mut engine = engine_for::<2>(WavInfo::parse(&bytes)?, AtEnd::Silence, &fake_dma)?;
    engine.init()?;
    engine.start()?;
    fake_dma.take_events();

    fake_dma.complete(CHANNEL_A);
    let serviced_lanes = engine.on_transfer_complete();

    assert_eq!(&serviced_lanes[..], &[Lane::A]);
    assert!(!fake_dma.is_flagged(CHANNEL_A), "flag must be cleared");
    assert_eq!(engine.buffer(Lane::A).levels(), &[132, 133]);
    assert_eq!(engine.buffer(Lane::B).levels(), &[130, 131]);
    assert_eq!(engine.phase(Lane::A), ChannelPhase::Armed);
    assert_eq!(engine.phase(Lane::B), ChannelPhase::Draining);
    assert_eq!(
        fake_dma.take_events(),
        [DmaEvent::Rearm {
            channel: CHANNEL_A,
            transfer_count: 2,
        }]
    );
    assert_eq!(engine.late_refills(), 0);
    Ok(())
}

#[test]
fn spurious_interrupt_services_nothing() -> Result<(), Box<dyn StdError>> {
    let bytes = wav_bytes(&MONO_16, &s16le(&[0; 8]));
    let fake_dma = FakeDma::default();
    let mut engine = engine_for::<4>(WavInfo::parse(&bytes)?, AtEnd::Silence, &fake_dma)?;
    engine.init()?;
    engine.start()?;
    fake_dma.take_events();

    assert!(engine.on_transfer_complete().is_empty());
    assert!(fake_dma.take_events().is_empty());
    assert_eq!(engine.phase(Lane::A), ChannelPhase::Draining);
    Ok(())
}

#[test]
fn both_flags_set_services_both_and_counts_late_refill() -> Result<(), Box<dyn StdError>> {
    let bytes = wav_bytes(&MONO_16, &s16le(&[0; 32]));
    let fake_dma = FakeDma::default();
    let mut engine = engine_for::<4>(WavInfo::parse(&bytes)?, AtEnd::Silence, &fake_dma)?;
    engine.init()?;
    engine.start()?;
    fake_dma.take_events();

    fake_dma.complete(CHANNEL_A);
    fake_dma.complete(CHANNEL_B);
    let serviced_lanes = engine.on_transfer_complete();

    assert_eq!(&serviced_lanes[..], &[Lane::A, Lane::B]);
    assert!(!fake_dma.is_flagged(CHANNEL_A));
    assert!(!fake_dma.is_flagged(CHANNEL_B));
    assert_eq!(
        fake_dma.take_events(),
        [
            DmaEvent::Rearm {
                channel: CHANNEL_A,
                transfer_count: 4,
            },
            DmaEvent::Rearm {
                channel: CHANNEL_B,
                transfer_count: 4,
            },
        ]
    );
    assert_eq!(engine.late_refills(), 1);
    assert_eq!(engine.sample_source().cursor().remaining(), 64 - 4 * 2 * 4);
    Ok(())
}

#[test]
fn alternating_completions_stream_then_fall_silent() -> Result<(), Box<dyn StdError>> {
    let bytes = wav_bytes(&MONO_16, &s16le(&[0, 16_384, -16_384, 0, i16::MAX, i16::MIN]));
    let fake_dma = FakeDma::default();
    let mut engine = engine_for::<2>(WavInfo::parse(&bytes)?, AtEnd::Silence, &fake_dma)?;
    engine.init()?;
    engine.start()?;

    // A drained [128, 192]; refill picks up after what B already holds.
    fake_dma.complete(CHANNEL_A);
    engine.on_transfer_complete();
    assert_eq!(engine.buffer(Lane::A).levels(), &[255, 0]);
    assert!(!engine.is_done());

    fake_dma.complete(CHANNEL_B);
    engine.on_transfer_complete();
    assert_eq!(engine.buffer(Lane::B).levels(), &[SILENCE, SILENCE]);
    assert!(engine.is_done());
    assert_eq!(engine.phase(Lane::A), ChannelPhase::Draining);
    assert_eq!(engine.phase(Lane::B), ChannelPhase::Armed);

    for _ in 0..3 {
        for (channel, lane) in [(CHANNEL_A, Lane::A), (CHANNEL_B, Lane::B)] {
            fake_dma.complete(channel);
            engine.on_transfer_complete();
            assert_eq!(engine.buffer(lane).levels(), &[SILENCE, SILENCE]);
        }
    }
    assert!(engine.is_done());
    assert_eq!(engine.late_refills(), 0);
    Ok(())
}

#[test]
fn loop_mode_keeps_streaming_audio() -> Result<(), Box<dyn StdError>> {
    let bytes = wav_bytes(&MONO_16, &s16le(&[i16::MIN, i16::MAX, 0]));
    let fake_dma = FakeDma::default();
    let mut engine = engine_for::<2>(WavInfo::parse(&bytes)?, AtEnd::Loop, &fake_dma)?;
    engine.init()?;
    engine.start()?;

    assert_eq!(engine.buffer(Lane::A).levels(), &[0, 255]);
    assert_eq!(engine.buffer(Lane::B).levels(), &[128, 0]);

    fake_dma.complete(CHANNEL_A);
    engine.on_transfer_complete();
    assert_eq!(engine.buffer(Lane::A).levels(), &[255, 128]);
    assert!(!engine.is_done());
    Ok(())
}
