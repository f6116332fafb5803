//! Hardware collaborators the controller drives: the DMA engine, the audio
//! FIFO, and the status LED (`spec.md` §6, §9 — "hardware bring-up is out of
//! scope; model the DMA/FIFO/LED as traits with an in-memory test double").
//!
//! `SimHardware` stands in for the real AXI DMA + FIFO + GPIO LED this would
//! drive on actual silicon. Its FIFO is a real lock-free SPSC ring buffer
//! (the same `ringbuf` crate backing the audio player's producer/consumer
//! queue), not just a counter, so `fifo_fill`/backpressure behave like the
//! hardware FIFO this stands in for.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use drm_common::constants::{CHUNK_SZ, FIFO_CAP};

/// Visible controller state, mirrored onto the status LED (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Red,
    Yellow,
    Green,
    Blue,
}

/// The hardware surface the streaming pipeline and dispatcher drive.
///
/// Two BRAM half-buffers back the DMA window at offsets `0` and `CHUNK_SZ`;
/// `bram_write` stages a decrypted chunk into one half, and `dma_start`
/// kicks off (or continues) pushing bytes from BRAM into the audio FIFO.
pub trait Hardware {
    /// Whether the DMA engine is still draining a previous transfer.
    fn dma_busy(&self) -> bool;

    /// Start transferring `len` bytes from the BRAM window at `bram_offset`
    /// into the audio FIFO. Non-blocking on real hardware; the caller polls
    /// `dma_busy`/`fifo_fill` to pace further transfers.
    fn dma_start(&mut self, bram_offset: usize, len: usize);

    /// Current fill level of the hardware FIFO, in bytes. Takes `&mut self`
    /// since on real hardware reading this register can itself be the point
    /// where a pending consumer catches up in a software model.
    fn fifo_fill(&mut self) -> u32;

    /// Stage plaintext bytes into the BRAM window at `offset`.
    fn bram_write(&mut self, offset: usize, data: &[u8]);

    /// Set the status LED.
    fn led_set(&mut self, color: LedColor);
}

/// In-memory `Hardware` double. `dma_start` pushes into a real SPSC ring
/// buffer standing in for the hardware FIFO, then immediately drains it
/// into `output` (there is no separate real-time consumer in a test
/// harness) — so `fifo_fill` still reflects genuine ring-buffer occupancy
/// at the instant it's read, and `output` accumulates exactly what a real
/// codec would have played. `max_transfer` caps bytes moved per
/// `dma_start` call, forcing the pipeline's transfer loop to run more than
/// once per chunk, useful for exercising that loop directly.
pub struct SimHardware {
    bram: [u8; 2 * CHUNK_SZ],
    fifo_producer: HeapProd<u8>,
    fifo_consumer: HeapCons<u8>,
    pub output: Vec<u8>,
    pub led: LedColor,
    max_transfer: Option<usize>,
    pub dma_start_calls: u32,
    /// When set, `dma_start` stops draining the FIFO synchronously and
    /// `fifo_fill` instead drains this many bytes per poll, so the FIFO
    /// genuinely holds bytes across calls instead of always reading back
    /// empty. Models a downstream consumer that hasn't caught up yet.
    drip_drain: Option<usize>,
}

impl SimHardware {
    pub fn new() -> Self {
        let (fifo_producer, fifo_consumer) = HeapRb::<u8>::new(FIFO_CAP as usize).split();
        SimHardware {
            bram: [0u8; 2 * CHUNK_SZ],
            fifo_producer,
            fifo_consumer,
            output: Vec::new(),
            led: LedColor::Red,
            max_transfer: None,
            dma_start_calls: 0,
            drip_drain: None,
        }
    }

    /// Cap bytes moved per `dma_start` call, to exercise multi-iteration
    /// transfer loops in tests.
    pub fn with_max_transfer(mut self, max: usize) -> Self {
        self.max_transfer = Some(max);
        self
    }

    /// Stop draining the FIFO synchronously inside `dma_start`; instead
    /// drain `rate` bytes every time `fifo_fill` is polled afterwards, so a
    /// burst's bytes stay resident in the FIFO for a test to observe and
    /// the FIFO-margin wait in `pipeline::transfer_from_bram` has
    /// something real to wait on.
    pub fn with_drip_drain(mut self, rate: usize) -> Self {
        self.drip_drain = Some(rate);
        self
    }

    /// Drain whatever is left resident in the FIFO straight to `output`,
    /// bypassing `drip_drain`. Lets a test collect the final bytes of a
    /// drip-drained transfer once it's done pacing.
    pub fn flush(&mut self) {
        let fill = self.fifo_consumer.occupied_len();
        let mut drained = vec![0u8; fill];
        let popped = self.fifo_consumer.pop_slice(&mut drained);
        self.output.extend_from_slice(&drained[..popped]);
    }
}

impl Default for SimHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl Hardware for SimHardware {
    fn dma_busy(&self) -> bool {
        false
    }

    fn dma_start(&mut self, bram_offset: usize, len: usize) {
        self.dma_start_calls += 1;
        let n = self.max_transfer.map_or(len, |m| m.min(len));
        let pushed = self.fifo_producer.push_slice(&self.bram[bram_offset..bram_offset + n]);
        debug_assert_eq!(pushed, n, "caller must size transfers to the FIFO's free space");

        if self.drip_drain.is_none() {
            let mut drained = vec![0u8; pushed];
            let popped = self.fifo_consumer.pop_slice(&mut drained);
            self.output.extend_from_slice(&drained[..popped]);
        }
    }

    fn fifo_fill(&mut self) -> u32 {
        let fill = self.fifo_producer.occupied_len() as u32;
        if let Some(rate) = self.drip_drain {
            let mut drained = vec![0u8; rate];
            let popped = self.fifo_consumer.pop_slice(&mut drained);
            self.output.extend_from_slice(&drained[..popped]);
        }
        fill
    }

    fn bram_write(&mut self, offset: usize, data: &[u8]) {
        self.bram[offset..offset + data.len()].copy_from_slice(data);
    }

    fn led_set(&mut self, color: LedColor) {
        self.led = color;
    }
}
