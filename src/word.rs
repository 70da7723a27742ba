//! Module: word
//!
//! Purpose: Framed words, the unit exchanged between packet scheduler and
//! waveform engine. One word describes one segment of the bitstream.
//!
//! Layout (consumed MSB first):
//! ```text
//! run segment:  1 xxxxxxxxxxxxxxx RRRRRRRRRRRRRRRR   16 bits R emitted
//! byte segment: 0 E xxxxxxxxxxxxxxxxxxxxx 0 DDDDDDDD  start bit + 8 data bits
//!                 └─ packet end: one extra "1" after this byte
//! ```
//!
//! The all-zero word is what the engine substitutes on starvation: a byte
//! segment of nine "0" bits without packet end.
//!
//! Safety: Safe. No unsafe blocks. Copy types only.

/// Bit 31: segment is a run (preamble or padding).
pub const RUN_FLAG: u32 = 0x8000_0000;

/// Bit 30 of a byte segment: last byte of the packet.
pub const LAST_BYTE_FLAG: u32 = 0x4000_0000;

/// Bits emitted by a run segment.
pub const RUN_BITS: u8 = 16;

/// Unused bits between the run flag and the run payload.
pub const RUN_UNUSED_BITS: u8 = 15;

/// Bits emitted by a byte segment (start bit + 8 data bits).
pub const BYTE_BITS: u8 = 9;

/// Unused bits between the packet-end flag and the start bit.
pub const BYTE_UNUSED_BITS: u8 = 21;

/// A single framed word.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FramedWord(u32);

impl FramedWord {
    /// 16 "1" bits. One preamble word plus the packet-end bit of the previous
    /// packet gives 17 ones, above the 14 bit minimum.
    pub const PREAMBLE: Self = Self(RUN_FLAG | 0xFFFF);

    /// 16 "0" bits (3.2 ms at nominal timing).
    pub const PADDING: Self = Self(RUN_FLAG);

    /// Substituted by the engine when its input is empty.
    pub const STARVED: Self = Self(0);

    /// Byte segment for a packet byte that is not the last.
    #[inline]
    pub const fn byte(value: u8) -> Self {
        Self(value as u32)
    }

    /// Byte segment for the last packet byte (normally the checksum).
    #[inline]
    pub const fn last_byte(value: u8) -> Self {
        Self(LAST_BYTE_FLAG | value as u32)
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True for preamble/padding words.
    #[inline]
    pub const fn is_run(self) -> bool {
        self.0 & RUN_FLAG != 0
    }

    /// True if this byte segment closes a packet.
    #[inline]
    pub const fn is_last(self) -> bool {
        !self.is_run() && self.0 & LAST_BYTE_FLAG != 0
    }

    /// Data byte carried by a byte segment.
    #[inline]
    pub fn data(self) -> Option<u8> {
        if self.is_run() {
            None
        } else {
            Some(self.0 as u8)
        }
    }
}

impl From<FramedWord> for u32 {
    fn from(w: FramedWord) -> u32 {
        w.0
    }
}
