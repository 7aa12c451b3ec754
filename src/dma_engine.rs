//! Two DMA channels chained into a ring, each draining its own buffer into the
//! carrier's duty register.
//!
//! ```text
//!            chain_to                chain_to
//!   lane A ───────────▶ lane B ───────────▶ lane A ...
//!   buffer A            buffer B
//!      │ one u16 per pace DREQ │
//!      └──────────▶ duty half-register ◀──────┘
//! ```
//!
//! While one lane drains, the completion interrupt refills and rearms the other.
//! The refill of a lane must finish before its partner drains `N` samples,
//! otherwise the chain restarts a lane that still holds stale levels. Each
//! lane moves through [`ChannelPhase`] in order:
//! `Armed → Draining → CompletePendingRefill → Armed`.
//!
//! Hardware access goes through [`DmaPort`] so the state machine runs on the host.

use heapless::Vec;

use crate::sample_source::SampleSource;
use crate::{Error, Result};

/// Transfer slots per buffer.
pub const SAMPLE_BUFFER_LEN: usize = 512;

/// One half of the double buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Lane {
    /// Started first.
    A,
    /// Chained from A.
    B,
}

impl Lane {
    /// Both lanes in service order.
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    /// Array index of this lane.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    /// The partner this lane chains to.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Where a lane is in its refill cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ChannelPhase {
    /// Not configured yet.
    Idle,
    /// Read address and count point at a full buffer; waiting for a trigger.
    Armed,
    /// Moving one level per pacing DREQ.
    Draining,
    /// All transfers done, completion flag raised, buffer not yet refilled.
    CompletePendingRefill,
}

/// A lane's DMA channel and the channel it chains to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct ChannelBinding {
    /// Lane this binding belongs to.
    pub lane: Lane,
    /// DMA channel number.
    pub channel: u8,
    /// Channel triggered when this one finishes.
    pub chain_to: u8,
}

/// Fixed destination shared by both lanes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct TransferTarget {
    write_addr: u32,
    pacing_dreq: u8,
}

impl TransferTarget {
    /// `write_addr` is the 16-bit duty half-register; `pacing_dreq` the pace
    /// slice's wrap DREQ.
    #[must_use]
    pub const fn new(write_addr: u32, pacing_dreq: u8) -> Self {
        Self {
            write_addr,
            pacing_dreq,
        }
    }

    /// Bus address every transfer writes to.
    #[must_use]
    pub const fn write_addr(&self) -> u32 {
        self.write_addr
    }

    /// DREQ that paces every transfer.
    #[must_use]
    pub const fn pacing_dreq(&self) -> u8 {
        self.pacing_dreq
    }
}

/// Levels for one lane. DMA reads it as 16-bit words, so each slot holds an
/// 8-bit level in its low byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TransferBuffer<const N: usize>([u16; N]);

impl<const N: usize> TransferBuffer<N> {
    const fn new() -> Self {
        Self([0; N])
    }

    /// Current contents.
    #[must_use]
    pub const fn levels(&self) -> &[u16; N] {
        &self.0
    }

    fn as_ptr(&self) -> *const u16 {
        self.0.as_ptr()
    }
}

/// Hardware seam for the DMA controller.
///
/// Implementations program the registers of a single controller. `configure`
/// and `rearm` must never start a transfer; only `trigger` and the hardware
/// chain do.
pub trait DmaPort {
    /// Programs a channel for 16-bit reads from `read_addr` (incrementing) to
    /// the target's fixed write address, paced by the target's DREQ, chaining
    /// to `binding.chain_to`, and enables its completion interrupt.
    fn configure(
        &mut self,
        binding: ChannelBinding,
        target: TransferTarget,
        read_addr: *const u16,
        transfer_count: usize,
    );

    /// Resets a finished channel's read address and transfer count.
    fn rearm(&mut self, channel: u8, read_addr: *const u16, transfer_count: usize);

    /// Starts a configured channel.
    fn trigger(&mut self, channel: u8);

    /// Returns whether the channel's completion flag is set, clearing it if so.
    fn take_completion(&mut self, channel: u8) -> bool;
}

/// DMA interrupt enable masks for lines 0 and 1 after routing `channel`'s
/// completion to `line` only. Other channels keep their routing.
#[must_use]
pub const fn route_completion(enable_masks: [u32; 2], channel: u8, line: usize) -> [u32; 2] {
    let channel_mask = 1_u32 << channel;
    let mut routed = [
        enable_masks[0] & !channel_mask,
        enable_masks[1] & !channel_mask,
    ];
    routed[line] |= channel_mask;
    routed
}

/// The chained double-buffer state machine.
///
/// # Buffer addresses
///
/// [`Self::init`] hands the addresses of both buffers to the DMA controller.
/// From then on the engine must stay where it is until power-off, which is why
/// playback keeps it in a `'static` session slot.
pub struct DoubleBufferEngine<'a, P: DmaPort, const N: usize = SAMPLE_BUFFER_LEN> {
    dma_port: P,
    sample_source: SampleSource<'a>,
    target: TransferTarget,
    bindings: [ChannelBinding; 2],
    buffers: [TransferBuffer<N>; 2],
    phases: [ChannelPhase; 2],
    late_refills: u32,
}

impl<'a, P: DmaPort, const N: usize> DoubleBufferEngine<'a, P, N> {
    /// Binds lane A to `dma_channels[0]` and lane B to `dma_channels[1]`,
    /// chained to each other.
    ///
    /// # Errors
    /// [`Error::DuplicateDmaChannel`] when both lanes name the same channel.
    pub fn new(
        dma_port: P,
        sample_source: SampleSource<'a>,
        target: TransferTarget,
        dma_channels: [u8; 2],
    ) -> Result<Self> {
        let [channel_a, channel_b] = dma_channels;
        if channel_a == channel_b {
            return Err(Error::DuplicateDmaChannel { channel: channel_a });
        }

        Ok(Self {
            dma_port,
            sample_source,
            target,
            bindings: [
                ChannelBinding {
                    lane: Lane::A,
                    channel: channel_a,
                    chain_to: channel_b,
                },
                ChannelBinding {
                    lane: Lane::B,
                    channel: channel_b,
                    chain_to: channel_a,
                },
            ],
            buffers: [TransferBuffer::new(), TransferBuffer::new()],
            phases: [ChannelPhase::Idle; 2],
            late_refills: 0,
        })
    }

    /// Fills both buffers from the source and configures both channels
    /// without starting either.
    ///
    /// # Errors
    /// [`Error::AlreadyInitialized`] on any call after the first. Channels are
    /// never reconfigured.
    pub fn init(&mut self) -> Result<()> {
        if self.phases != [ChannelPhase::Idle; 2] {
            return Err(Error::AlreadyInitialized);
        }
        for lane in Lane::ALL {
            let lane_index = lane.index();
            self.sample_source.fill(&mut self.buffers[lane_index].0);
            self.dma_port.configure(
                self.bindings[lane_index],
                self.target,
                self.buffers[lane_index].as_ptr(),
                N,
            );
            self.phases[lane_index] = ChannelPhase::Armed;
        }
        Ok(())
    }

    /// Triggers lane A. The hardware chain takes over from there.
    ///
    /// # Errors
    /// [`Error::EngineNotReady`] unless both lanes are armed, i.e. before
    /// [`Self::init`] or after a previous `start`.
    pub fn start(&mut self) -> Result<()> {
        if self.phases != [ChannelPhase::Armed; 2] {
            return Err(Error::EngineNotReady);
        }
        self.dma_port.trigger(self.bindings[Lane::A.index()].channel);
        self.phases[Lane::A.index()] = ChannelPhase::Draining;
        Ok(())
    }

    /// Services every lane whose completion flag is set, A before B, and
    /// returns the lanes serviced.
    ///
    /// Each serviced lane is refilled and rearmed. Its partner, which the
    /// hardware chain has already started, is recorded as draining. Finding
    /// both flags set means a refill ran late and is counted in
    /// [`Self::late_refills`].
    pub fn on_transfer_complete(&mut self) -> Vec<Lane, 2> {
        let completed_lanes: Vec<Lane, 2> = Lane::ALL
            .into_iter()
            .filter(|lane| {
                self.dma_port
                    .take_completion(self.bindings[lane.index()].channel)
            })
            .collect();

        if completed_lanes.len() == Lane::ALL.len() {
            self.late_refills = self.late_refills.saturating_add(1);
        }

        for lane in &completed_lanes {
            self.refill(*lane);
        }
        completed_lanes
    }

    fn refill(&mut self, lane: Lane) {
        let lane_index = lane.index();
        let partner_index = lane.other().index();

        self.phases[lane_index] = ChannelPhase::CompletePendingRefill;
        if self.phases[partner_index] == ChannelPhase::Armed {
            self.phases[partner_index] = ChannelPhase::Draining;
        }

        self.sample_source.fill(&mut self.buffers[lane_index].0);
        self.dma_port.rearm(
            self.bindings[lane_index].channel,
            self.buffers[lane_index].as_ptr(),
            N,
        );
        self.phases[lane_index] = ChannelPhase::Armed;
    }

    /// True once the source has run out in [`crate::sample_source::AtEnd::Silence`] mode.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.sample_source.is_done()
    }

    /// Handler invocations that found both lanes complete.
    #[must_use]
    pub const fn late_refills(&self) -> u32 {
        self.late_refills
    }

    /// A lane's current levels.
    #[must_use]
    pub const fn buffer(&self, lane: Lane) -> &TransferBuffer<N> {
        &self.buffers[lane.index()]
    }

    /// A lane's current phase.
    #[must_use]
    pub const fn phase(&self, lane: Lane) -> ChannelPhase {
        self.phases[lane.index()]
    }

    /// A lane's channel binding.
    #[must_use]
    pub const fn binding(&self, lane: Lane) -> ChannelBinding {
        self.bindings[lane.index()]
    }

    /// The source feeding both buffers.
    #[must_use]
    pub const fn sample_source(&self) -> &SampleSource<'a> {
        &self.sample_source
    }
}

#[cfg(all(test, feature = "host"))]
mod host_tests;
