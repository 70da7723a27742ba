//! DCC waveform engine.
//!
//! Pure bit-level state machine, no packet semantics and no hardware
//! dependencies. Consumes framed words from the [`WordFifo`], produces the
//! track waveform. Fully testable on host.
//!
//! # States
//!
//! ```text
//!            end latch set: emit "1", clear latch
//!          ┌──────────────┐
//!          ▼              │
//!   ┌─ FetchHeader ───────┘
//!   │      │ pull word (all-zero word if FIFO empty)
//!   │      ▼
//!   │   Classify ── flag 1: run, skip 15, budget 16
//!   │      │        flag 0: latch end flag, skip 21, budget 9
//!   │      ▼
//!   └── EmitBits ── one bit per step, "1" short / "0" long
//! ```
//!
//! Every bit is a full cycle: high half, then low half of equal width.
//! The line never stops: an empty FIFO yields nine long "0" bits per
//! substituted word.

use crate::config::TimingConfig;
use crate::fifo::WordFifo;
use crate::word::{FramedWord, BYTE_BITS, BYTE_UNUSED_BITS, RUN_BITS, RUN_UNUSED_BITS};

/// A DCC bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bit {
    /// Long cycle.
    Zero,
    /// Short cycle.
    One,
}

/// Signal line level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[inline]
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

/// One emitted bit with its half-cycle widths in ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitCycle {
    pub bit: Bit,
    pub high_ticks: u16,
    pub low_ticks: u16,
}

/// FSM state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// A: emit pending packet-end bit, else fetch the next word.
    FetchHeader,
    /// B: read the segment flag and load the bit budget.
    Classify,
    /// C: shift out `remaining` bits.
    EmitBits { remaining: u8 },
}

/// 32-bit output shift register, MSB out first.
#[derive(Clone, Copy, Debug, Default)]
struct ShiftRegister {
    bits: u32,
}

impl ShiftRegister {
    #[inline]
    fn load(&mut self, word: FramedWord) {
        self.bits = word.raw();
    }

    /// Shift out the top `count` bits (1..=31).
    #[inline]
    fn out(&mut self, count: u8) -> u32 {
        let value = self.bits >> (32 - count as u32);
        self.bits <<= count as u32;
        value
    }
}

/// Engine counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Bits emitted since start/reset.
    pub bits: u32,
    /// Words fetched from the FIFO.
    pub words: u32,
    /// All-zero words substituted on an empty FIFO.
    pub starved: u32,
    /// Packet-end bits emitted.
    pub packet_ends: u32,
}

/// Waveform engine.
///
/// Single consumer of the word FIFO. Drive it with [`tick`](Self::tick) for a
/// cycle-accurate line level, or pull [`BitCycle`]s through the `Iterator`
/// impl to feed a pulse peripheral.
///
/// # Example
///
/// ```
/// use rust_dcc_generator::fifo::WordFifo;
/// use rust_dcc_generator::config::TimingConfig;
/// use rust_dcc_generator::waveform::{WaveformEngine, Bit};
///
/// let fifo: WordFifo = WordFifo::new();
/// let mut engine = WaveformEngine::new(&fifo, TimingConfig::NMRA);
///
/// // Nothing queued: the line keeps running with long "0" bits
/// assert_eq!(engine.next_bit(), Bit::Zero);
/// ```
pub struct WaveformEngine<'a, const N: usize = { crate::fifo::DEFAULT_FIFO_DEPTH }> {
    fifo: &'a WordFifo<N>,
    timing: TimingConfig,

    // FSM state
    state: State,
    osr: ShiftRegister,
    end_latch: bool,

    // Tick-level output
    level: Level,
    remaining_ticks: u16,
    pending_low_ticks: u16,

    stats: EngineStats,
}

impl<'a, const N: usize> WaveformEngine<'a, N> {
    /// Create an engine reading from `fifo`.
    ///
    /// `timing` should have passed [`TimingConfig::validate`]; zero widths are
    /// clamped to one tick so the line always advances.
    pub fn new(fifo: &'a WordFifo<N>, timing: TimingConfig) -> Self {
        Self {
            fifo,
            timing,
            state: State::FetchHeader,
            osr: ShiftRegister::default(),
            end_latch: false,
            level: Level::Low,
            remaining_ticks: 0,
            pending_low_ticks: 0,
            stats: EngineStats::default(),
        }
    }

    /// Get timing in use.
    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Get counters.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Return to state A with an empty latch and a fresh half-cycle.
    ///
    /// Bits of a partly emitted word are discarded.
    pub fn reset(&mut self) {
        self.state = State::FetchHeader;
        self.osr = ShiftRegister::default();
        self.end_latch = false;
        self.level = Level::Low;
        self.remaining_ticks = 0;
        self.pending_low_ticks = 0;
        self.stats = EngineStats::default();
    }

    /// Run the FSM until the next bit is emitted.
    pub fn next_bit(&mut self) -> Bit {
        loop {
            match self.state {
                State::FetchHeader => {
                    if self.end_latch {
                        self.end_latch = false;
                        self.stats.packet_ends = self.stats.packet_ends.wrapping_add(1);
                        return self.emit(Bit::One);
                    }

                    let word = match self.fifo.pop() {
                        Some(word) => word,
                        None => {
                            self.stats.starved = self.stats.starved.wrapping_add(1);
                            FramedWord::STARVED
                        }
                    };
                    self.stats.words = self.stats.words.wrapping_add(1);
                    self.osr.load(word);
                    self.state = State::Classify;
                }
                State::Classify => {
                    let remaining = if self.osr.out(1) == 1 {
                        self.osr.out(RUN_UNUSED_BITS);
                        RUN_BITS
                    } else {
                        self.end_latch = self.osr.out(1) == 1;
                        self.osr.out(BYTE_UNUSED_BITS);
                        BYTE_BITS
                    };
                    self.state = State::EmitBits { remaining };
                }
                State::EmitBits { remaining } => {
                    let bit = if self.osr.out(1) == 1 { Bit::One } else { Bit::Zero };
                    self.state = if remaining > 1 {
                        State::EmitBits { remaining: remaining - 1 }
                    } else {
                        State::FetchHeader
                    };
                    return self.emit(bit);
                }
            }
        }
    }

    /// Next bit with its half-cycle widths.
    pub fn next_cycle(&mut self) -> BitCycle {
        let bit = self.next_bit();
        let half = self.half_ticks(bit);
        BitCycle {
            bit,
            high_ticks: half,
            low_ticks: half,
        }
    }

    /// Advance one tick and return the line level for that tick.
    #[inline]
    pub fn tick(&mut self) -> Level {
        if self.remaining_ticks == 0 {
            if self.level.is_high() && self.pending_low_ticks > 0 {
                self.level = Level::Low;
                self.remaining_ticks = self.pending_low_ticks;
                self.pending_low_ticks = 0;
            } else {
                let cycle = self.next_cycle();
                self.level = Level::High;
                self.remaining_ticks = cycle.high_ticks;
                self.pending_low_ticks = cycle.low_ticks;
            }
        }

        self.remaining_ticks -= 1;
        self.level
    }

    // --- Private methods ---

    #[inline]
    fn emit(&mut self, bit: Bit) -> Bit {
        self.stats.bits = self.stats.bits.wrapping_add(1);
        bit
    }

    #[inline]
    fn half_ticks(&self, bit: Bit) -> u16 {
        let ticks = match bit {
            Bit::One => self.timing.one_half_ticks,
            Bit::Zero => self.timing.zero_half_ticks,
        };
        ticks.max(1)
    }
}

/// Endless stream of bit cycles.
impl<'a, const N: usize> Iterator for WaveformEngine<'a, N> {
    type Item = BitCycle;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_cycle())
    }
}
