//! Reference decoder model shared by the integration tests.
//!
//! Recovers bits from tick-level engine output and parses packets the way a
//! decoder would: ≥ 14 ones, then bytes introduced by a "0" start bit, ended
//! by a "1" packet-end bit.

#![allow(dead_code)]

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use embedded_hal_mock::eh1::digital::{Mock as PinMock, State as PinState, Transaction as PinTransaction};

use rust_dcc_generator::config::TimingConfig;
use rust_dcc_generator::fifo::WordFifo;
use rust_dcc_generator::waveform::{Bit, Level, WaveformEngine};
use rust_dcc_generator::word::FramedWord;

/// Minimum preamble a decoder accepts.
pub const MIN_PREAMBLE: usize = 14;

/// A packet as seen by the decoder, checksum byte included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    pub preamble: usize,
    pub bytes: Vec<u8>,
}

impl DecodedPacket {
    /// XOR over all bytes including the checksum is zero.
    pub fn checksum_ok(&self) -> bool {
        self.bytes.iter().fold(0u8, |acc, b| acc ^ b) == 0
    }

    /// Bytes without the checksum.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 1]
    }
}

/// Pull `count` bits from the engine.
pub fn collect_bits<const N: usize>(engine: &mut WaveformEngine<'_, N>, count: usize) -> Vec<Bit> {
    (0..count).map(|_| engine.next_bit()).collect()
}

/// Pull `count` ticks from the engine.
pub fn collect_ticks<const N: usize>(engine: &mut WaveformEngine<'_, N>, count: usize) -> Vec<Level> {
    (0..count).map(|_| engine.tick()).collect()
}

/// Recover bits from line levels.
///
/// Panics on a cycle that does not start high, has unequal halves, or a
/// half-cycle width matching neither bit. A trailing partial cycle is
/// ignored.
pub fn bits_from_ticks(levels: &[Level], timing: &TimingConfig) -> Vec<Bit> {
    let mut runs: Vec<(Level, usize)> = Vec::new();
    for level in levels {
        match runs.last_mut() {
            Some((l, n)) if *l == *level => *n += 1,
            _ => runs.push((*level, 1)),
        }
    }
    // The last run may be cut short
    runs.pop();

    runs.chunks_exact(2)
        .map(|pair| {
            let (high, high_len) = pair[0];
            let (low, low_len) = pair[1];
            assert_eq!(high, Level::High, "cycle must start high");
            assert_eq!(low, Level::Low);
            assert_eq!(high_len, low_len, "half-cycles must be symmetric");
            if high_len == timing.one_half_ticks as usize {
                Bit::One
            } else if high_len == timing.zero_half_ticks as usize {
                Bit::Zero
            } else {
                panic!("illegal half-cycle of {} ticks", high_len)
            }
        })
        .collect()
}

#[derive(Debug)]
enum DecodeState {
    Preamble,
    Data { bits: u8, value: u8 },
    Separator,
}

/// Parse every complete packet in `bits`.
pub fn decode_packets(bits: &[Bit]) -> Vec<DecodedPacket> {
    let mut packets = Vec::new();
    let mut state = DecodeState::Preamble;
    let mut ones = 0usize;
    let mut preamble = 0usize;
    let mut bytes = Vec::new();

    for bit in bits {
        state = match state {
            DecodeState::Preamble => match bit {
                Bit::One => {
                    ones += 1;
                    DecodeState::Preamble
                }
                Bit::Zero if ones >= MIN_PREAMBLE => {
                    preamble = ones;
                    ones = 0;
                    bytes.clear();
                    DecodeState::Data { bits: 0, value: 0 }
                }
                Bit::Zero => {
                    ones = 0;
                    DecodeState::Preamble
                }
            },
            DecodeState::Data { bits, value } => {
                let value = (value << 1) | (*bit == Bit::One) as u8;
                if bits + 1 == 8 {
                    bytes.push(value);
                    DecodeState::Separator
                } else {
                    DecodeState::Data { bits: bits + 1, value }
                }
            }
            DecodeState::Separator => match bit {
                Bit::Zero => DecodeState::Data { bits: 0, value: 0 },
                Bit::One => {
                    packets.push(DecodedPacket {
                        preamble,
                        bytes: bytes.clone(),
                    });
                    // The end bit counts toward the next preamble
                    ones = 1;
                    DecodeState::Preamble
                }
            },
        };
    }
    packets
}

/// Pop everything waiting in the FIFO.
pub fn drain_words<const N: usize>(fifo: &WordFifo<N>) -> Vec<FramedWord> {
    std::iter::from_fn(|| fifo.pop()).collect()
}

/// Enable pin expecting exactly the writes in `levels`, in order.
///
/// Call `done()` at the end of the test.
pub fn enable_pin(levels: &[PinState]) -> PinMock {
    let expected: Vec<PinTransaction> = levels.iter().map(|l| PinTransaction::set(l.clone())).collect();
    PinMock::new(&expected)
}

/// Enable pin whose driver always fails.
#[derive(Debug, Default)]
pub struct BrokenPin {
    pub attempts: usize,
}

impl ErrorType for BrokenPin {
    type Error = ErrorKind;
}

impl OutputPin for BrokenPin {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        self.attempts += 1;
        Err(ErrorKind::Other)
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        self.attempts += 1;
        Err(ErrorKind::Other)
    }
}

/// Small deterministic generator for property-style loops.
pub struct Lcg(u32);

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self(seed)
    }

    pub fn next_u8(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.0 >> 24) as u8
    }
}
