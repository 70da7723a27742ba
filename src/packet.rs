//! DCC packet builder.
//!
//! Encodes addresses and instructions per NMRA S-9.2 / S-9.2.1, computes the
//! error detection byte and frames packets into [`FramedWord`]s for the
//! waveform engine.
//!
//! ```text
//! preamble   address      instruction(s)        checksum   end
//! 1111...1 0 AAAAAAAA 0 IIIIIIII 0 IIIIIIII 0 CCCCCCCC 1
//! ```
//!
//! Only 128-step speed and function group 1 instructions are built here.

use crate::error::PacketError;
use crate::word::FramedWord;

/// Highest short (7-bit) address.
pub const MAX_SHORT_ADDRESS: u16 = 127;

/// Lowest long (14-bit) address.
pub const MIN_LONG_ADDRESS: u16 = 128;

/// Highest long address. First byte stays within 0xC0..=0xE7.
pub const MAX_LONG_ADDRESS: u16 = 0x27FF;

/// Reserved idle address.
pub const IDLE_ADDRESS: u8 = 0xFF;

/// Highest speed value of the 128-step instruction.
pub const MAX_SPEED: u8 = 127;

/// Highest function number of group 1.
pub const MAX_FG1_FUNCTION: u8 = 4;

/// Packet bytes excluding the checksum.
pub const MAX_PACKET_BYTES: usize = 5;

/// Framed words of the longest packet: padding + preamble + bytes + checksum.
pub const MAX_FRAMED_WORDS: usize = 2 + MAX_PACKET_BYTES + 1;

/// Top bits of the first byte of a long address.
const LONG_ADDRESS_MARKER: u16 = 0xC000;

/// Advanced operations: 128 speed step control.
const SPEED_128_INSTRUCTION: u8 = 0x3F;

/// Function group one instruction (100DDDDD).
const FUNCTION_GROUP_1: u8 = 0x80;

/// Direction bit of the 128-step speed byte.
const FORWARD_BIT: u8 = 0x80;

/// Instruction bit per group 1 function: F0 (FL) is bit 4, F1..F4 bits 0..3.
const FG1_INSTRUCTION_BITS: [u8; 5] = [0x10, 0x01, 0x02, 0x04, 0x08];

/// Decoder address.
///
/// Kind follows purely from the numeric range, so short and long never
/// overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    /// 1..=127, one byte.
    Short(u8),
    /// 128..=10239, two bytes with the top bits `11`.
    Long(u16),
}

impl Address {
    /// Validate a raw address.
    pub fn new(raw: u16) -> Result<Self, PacketError> {
        match raw {
            1..=MAX_SHORT_ADDRESS => Ok(Address::Short(raw as u8)),
            MIN_LONG_ADDRESS..=MAX_LONG_ADDRESS => Ok(Address::Long(raw)),
            _ => Err(PacketError::InvalidAddress(raw)),
        }
    }

    /// Numeric address.
    #[inline]
    pub fn value(self) -> u16 {
        match self {
            Address::Short(a) => a as u16,
            Address::Long(a) => a,
        }
    }

    /// Address bytes as transmitted.
    pub fn encode(self) -> AddressBytes {
        match self {
            Address::Short(a) => AddressBytes { bytes: [a, 0], len: 1 },
            Address::Long(a) => {
                let marked = LONG_ADDRESS_MARKER | a;
                AddressBytes {
                    bytes: [(marked >> 8) as u8, marked as u8],
                    len: 2,
                }
            }
        }
    }

    /// Parse the address at the start of a packet.
    ///
    /// Returns `None` for broadcast, idle, accessory and reserved first bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let first = *bytes.first()?;
        match first {
            1..=0x7F => Some(Address::Short(first)),
            0xC0..=0xE7 => {
                let second = *bytes.get(1)?;
                let raw = (((first & 0x3F) as u16) << 8) | second as u16;
                Address::new(raw).ok()
            }
            _ => None,
        }
    }
}

/// One or two address bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressBytes {
    bytes: [u8; 2],
    len: u8,
}

impl AddressBytes {
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Encode a raw address (1 byte short, 2 bytes long).
pub fn encode_address(raw: u16) -> Result<AddressBytes, PacketError> {
    Address::new(raw).map(Address::encode)
}

/// Locomotive direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Encode a 128-step speed instruction: `0x3F`, `D SSSSSSS`.
pub fn encode_speed(direction: Direction, speed: u8) -> Result<[u8; 2], PacketError> {
    if speed > MAX_SPEED {
        return Err(PacketError::InvalidSpeed(speed));
    }
    Ok([SPEED_128_INSTRUCTION, speed_byte(direction, speed)])
}

/// Direction and speed from the second byte of a 128-step instruction.
#[inline]
pub fn decode_speed_byte(byte: u8) -> (Direction, u8) {
    let direction = if byte & FORWARD_BIT != 0 {
        Direction::Forward
    } else {
        Direction::Reverse
    };
    (direction, byte & MAX_SPEED)
}

#[inline]
fn speed_byte(direction: Direction, speed: u8) -> u8 {
    let dir = match direction {
        Direction::Forward => FORWARD_BIT,
        Direction::Reverse => 0,
    };
    dir | (speed & MAX_SPEED)
}

/// Function group 1 state: F0..F4, bit n = function n.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FunctionGroup1(u8);

impl FunctionGroup1 {
    /// All functions off.
    pub const OFF: Self = Self(0);

    /// Mask of valid function bits.
    const MASK: u8 = 0x1F;

    #[inline]
    pub const fn from_mask(mask: u8) -> Self {
        Self(mask & Self::MASK)
    }

    #[inline]
    pub const fn mask(self) -> u8 {
        self.0
    }

    /// Instruction byte `100 FL F4 F3 F2 F1`.
    pub fn instruction(self) -> u8 {
        FG1_INSTRUCTION_BITS
            .iter()
            .enumerate()
            .filter(|(f, _)| self.0 & (1 << f) != 0)
            .fold(FUNCTION_GROUP_1, |acc, (_, bit)| acc | bit)
    }
}

/// Set or clear function `function` in `current`.
pub fn encode_function_group1(
    function: u8,
    on: bool,
    current: FunctionGroup1,
) -> Result<FunctionGroup1, PacketError> {
    if function > MAX_FG1_FUNCTION {
        return Err(PacketError::InvalidFunction(function));
    }
    let bit = 1 << function;
    let mask = if on { current.0 | bit } else { current.0 & !bit };
    Ok(FunctionGroup1(mask))
}

/// Error detection byte: XOR of all bytes.
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// A DCC packet without its checksum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Packet {
    bytes: [u8; MAX_PACKET_BYTES],
    len: u8,
}

impl Packet {
    /// Idle packet: address 0xFF, instruction 0x00.
    pub const IDLE: Self = Self {
        bytes: [IDLE_ADDRESS, 0x00, 0, 0, 0],
        len: 2,
    };

    /// 128-step speed/direction packet.
    pub fn speed(address: Address, direction: Direction, speed: u8) -> Result<Self, PacketError> {
        let instruction = encode_speed(direction, speed)?;
        Self::addressed(address, &instruction)
    }

    /// Function group 1 packet.
    pub fn function_group1(address: Address, functions: FunctionGroup1) -> Self {
        let mut packet = Self {
            bytes: [0; MAX_PACKET_BYTES],
            len: 0,
        };
        // Two address bytes + one instruction always fit.
        for b in address.encode().as_slice() {
            packet.bytes[packet.len as usize] = *b;
            packet.len += 1;
        }
        packet.bytes[packet.len as usize] = functions.instruction();
        packet.len += 1;
        packet
    }

    fn addressed(address: Address, instruction: &[u8]) -> Result<Self, PacketError> {
        let addr = address.encode();
        let total = addr.len() + instruction.len();
        if total > MAX_PACKET_BYTES {
            return Err(PacketError::TooLong);
        }
        let mut packet = Self {
            bytes: [0; MAX_PACKET_BYTES],
            len: total as u8,
        };
        packet.bytes[..addr.len()].copy_from_slice(addr.as_slice());
        packet.bytes[addr.len()..total].copy_from_slice(instruction);
        Ok(packet)
    }

    /// Address and instruction bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Error detection byte for this packet.
    #[inline]
    pub fn checksum(&self) -> u8 {
        checksum(self.as_bytes())
    }

    /// Target decoder, `None` for idle/broadcast.
    #[inline]
    pub fn address(&self) -> Option<Address> {
        Address::decode(self.as_bytes())
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.bytes[0] == IDLE_ADDRESS
    }

    /// Append the checksum and frame the result.
    pub fn framed(&self) -> FramedPacket {
        let mut out = FramedPacket::new();
        out.push(FramedWord::PREAMBLE);
        for b in self.as_bytes() {
            out.push(FramedWord::byte(*b));
        }
        out.push(FramedWord::last_byte(self.checksum()));
        out
    }
}

/// Frame bytes as they are: preamble, one word per byte, end flag on the last.
///
/// The caller supplies the checksum as the final byte.
pub fn frame(bytes: &[u8]) -> Result<FramedPacket, PacketError> {
    let (last, body) = bytes.split_last().ok_or(PacketError::Empty)?;
    if bytes.len() > MAX_PACKET_BYTES + 1 {
        return Err(PacketError::TooLong);
    }

    let mut out = FramedPacket::new();
    out.push(FramedWord::PREAMBLE);
    for b in body {
        out.push(FramedWord::byte(*b));
    }
    out.push(FramedWord::last_byte(*last));
    Ok(out)
}

/// Framed words of one packet, in transmit order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramedPacket {
    words: [FramedWord; MAX_FRAMED_WORDS],
    len: u8,
}

impl FramedPacket {
    /// Empty sequence.
    pub const fn new() -> Self {
        Self {
            words: [FramedWord::STARVED; MAX_FRAMED_WORDS],
            len: 0,
        }
    }

    // Callers never exceed MAX_FRAMED_WORDS: one padding, one preamble, six bytes.
    fn push(&mut self, word: FramedWord) {
        if (self.len as usize) < MAX_FRAMED_WORDS {
            self.words[self.len as usize] = word;
            self.len += 1;
        }
    }

    /// Prepend a padding run (16 "0" bits).
    ///
    /// No-op if the sequence is already full.
    pub fn with_padding(mut self) -> Self {
        let len = self.len as usize;
        if len < MAX_FRAMED_WORDS {
            self.words.copy_within(0..len, 1);
            self.words[0] = FramedWord::PADDING;
            self.len += 1;
        }
        self
    }

    #[inline]
    pub fn as_slice(&self) -> &[FramedWord] {
        &self.words[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for FramedPacket {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_packet_framing() {
        let framed = Packet::IDLE.framed();
        assert_eq!(
            framed.as_slice(),
            &[
                FramedWord::PREAMBLE,
                FramedWord::byte(0xFF),
                FramedWord::byte(0x00),
                FramedWord::last_byte(0xFF),
            ]
        );
        assert!(Packet::IDLE.is_idle());
        assert_eq!(Packet::IDLE.address(), None);
    }

    #[test]
    fn test_long_address_bytes() {
        let bytes = encode_address(1000).unwrap();
        // 1000 = 0x03E8 -> 0xC3 0xE8
        assert_eq!(bytes.as_slice(), &[0xC3, 0xE8]);

        let bytes = encode_address(MAX_LONG_ADDRESS).unwrap();
        assert_eq!(bytes.as_slice(), &[0xE7, 0xFF]);
    }

    #[test]
    fn test_function_instruction_bits() {
        let fl = FunctionGroup1::from_mask(0b00001);
        assert_eq!(fl.instruction(), 0x90);

        let f1_f4 = FunctionGroup1::from_mask(0b11110);
        assert_eq!(f1_f4.instruction(), 0x8F);
    }

    #[test]
    fn test_padding_prepends() {
        let framed = Packet::IDLE.framed().with_padding();
        assert_eq!(framed.len(), 5);
        assert_eq!(framed.as_slice()[0], FramedWord::PADDING);
        assert_eq!(framed.as_slice()[1], FramedWord::PREAMBLE);
    }
}
