//! Lock-free SPSC (Single Producer, Single Consumer) word FIFO.
//!
//! The only resource shared between the packet scheduler and the waveform
//! engine.
//!
//! ```text
//! PacketScheduler ──try_push──▶ WordFifo ──pop──▶ WaveformEngine
//!   (producer)                 (lock-free)          (consumer)
//! ```
//!
//! # Rules
//!
//! - Push never blocks: a full FIFO returns [`WouldBlock`] and the word stays
//!   with the producer
//! - Pop never blocks: an empty FIFO returns `None` and the engine substitutes
//!   an idle word
//! - Only atomic operations for synchronization

use core::sync::atomic::{AtomicU32, Ordering};

use crate::word::FramedWord;

/// Default depth: 8 words, enough for padding + preamble + six packet bytes.
pub const DEFAULT_FIFO_DEPTH: usize = 8;

/// Returned by [`WordFifo::try_push`] when the FIFO is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WouldBlock;

/// Bounded SPSC ring of framed words.
///
/// # Memory Ordering
///
/// - Producer stores the slot, then publishes `write_idx` with `Release`
/// - Consumer loads `write_idx` with `Acquire` before reading the slot
/// - Consumer frees the slot by publishing `read_idx` with `Release`
pub struct WordFifo<const N: usize = DEFAULT_FIFO_DEPTH> {
    slots: [AtomicU32; N],

    /// Next write index (monotonically increasing, wraps via mask).
    write_idx: AtomicU32,

    /// Next read index (monotonically increasing, wraps via mask).
    read_idx: AtomicU32,

    /// Pops that found the FIFO empty.
    underruns: AtomicU32,
}

impl<const N: usize> WordFifo<N> {
    /// Mask for wrapping index to buffer size.
    const MASK: usize = N - 1;

    /// Create a new empty FIFO.
    ///
    /// # Panics
    ///
    /// Panics at compile time if N is not a power of 2.
    pub const fn new() -> Self {
        const { assert!(N.is_power_of_two(), "FIFO depth must be power of 2") };

        Self {
            slots: [const { AtomicU32::new(0) }; N],
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            underruns: AtomicU32::new(0),
        }
    }

    /// Push a word (producer side).
    ///
    /// Completes in O(1), never blocks.
    #[inline]
    pub fn try_push(&self, word: FramedWord) -> Result<(), WouldBlock> {
        let write = self.write_idx.load(Ordering::Relaxed);
        let read = self.read_idx.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N as u32 {
            return Err(WouldBlock);
        }

        self.slots[(write as usize) & Self::MASK].store(word.raw(), Ordering::Relaxed);
        self.write_idx.store(write.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Pop a word (consumer side).
    ///
    /// Returns `None` and counts an underrun if the FIFO is empty.
    #[inline]
    pub fn pop(&self) -> Option<FramedWord> {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);

        if read == write {
            self.underruns.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let raw = self.slots[(read as usize) & Self::MASK].load(Ordering::Relaxed);
        self.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(FramedWord::from_raw(raw))
    }

    /// Number of words waiting for the consumer.
    #[inline]
    pub fn len(&self) -> usize {
        // Read index first: it never passes a write index loaded after it,
        // so the difference cannot wrap from either side.
        let read = self.read_idx.load(Ordering::Acquire);
        let write = self.write_idx.load(Ordering::Acquire);
        (write.wrapping_sub(read) as usize).min(N)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// Free slots available to the producer.
    #[inline]
    pub fn free(&self) -> usize {
        N - self.len().min(N)
    }

    /// Get count of empty pops.
    #[inline]
    pub fn underruns(&self) -> u32 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Get the buffer capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for WordFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}
