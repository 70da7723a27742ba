//! Refresh queue: latest command state per decoder address.
//!
//! Host commands write here, the packet scheduler reads here. Slots hold
//! command *state* (speed byte, function mask), packets are rebuilt from it
//! when the scheduler visits, so a slot always reflects the last accepted
//! command.
//!
//! # Rules
//!
//! - Last write wins: no history, a new command overwrites the slot state
//! - Writers publish data before the `present` bit (`Release`), the reader
//!   checks `present` (`Acquire`) before reading data
//! - `fresh` bits are set by writers and taken (swapped to zero) by the
//!   scheduler to grant priority repeats
//! - Commands come from one host context; the scheduler is the only reader

use core::sync::atomic::{AtomicU16, AtomicU8, Ordering};

use crate::error::CommandError;
use crate::packet::{
    decode_speed_byte, encode_function_group1, encode_speed, Address, Direction, FunctionGroup1,
    Packet,
};

/// Default number of refresh slots.
pub const DEFAULT_SLOTS: usize = 16;

/// Free slot marker (address 0 is broadcast, never stored).
const FREE: u16 = 0;

/// Packet kinds a slot can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    Speed = 0,
    FunctionGroup1 = 1,
}

impl PacketKind {
    /// Rotation order.
    pub const ALL: [PacketKind; 2] = [PacketKind::Speed, PacketKind::FunctionGroup1];

    #[inline]
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn other(self) -> Self {
        match self {
            PacketKind::Speed => PacketKind::FunctionGroup1,
            PacketKind::FunctionGroup1 => PacketKind::Speed,
        }
    }
}

/// One decoder's command state.
struct RefreshSlot {
    address: AtomicU16,
    speed: AtomicU8,
    functions: AtomicU8,
    /// PacketKind bits holding valid state.
    present: AtomicU8,
    /// PacketKind bits changed since the scheduler last looked.
    fresh: AtomicU8,
    /// Bumped each time a free slot is claimed by an address.
    claim: AtomicU16,
}

impl RefreshSlot {
    const fn new() -> Self {
        Self {
            address: AtomicU16::new(FREE),
            speed: AtomicU8::new(0),
            functions: AtomicU8::new(0),
            present: AtomicU8::new(0),
            fresh: AtomicU8::new(0),
            claim: AtomicU16::new(0),
        }
    }

    #[inline]
    fn address(&self) -> u16 {
        self.address.load(Ordering::Acquire)
    }

    #[inline]
    fn publish(&self, kind: PacketKind) {
        self.present.fetch_or(kind.bit(), Ordering::Release);
        self.fresh.fetch_or(kind.bit(), Ordering::Release);
    }
}

/// Scheduler view of an active slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SlotEntry {
    pub address: Address,
    /// PacketKind bits holding valid state.
    pub present: u8,
    /// Claim count; changes when the slot passes to another owner.
    pub claim: u16,
}

/// Fixed-capacity table of refresh slots.
pub struct RefreshQueue<const S: usize = DEFAULT_SLOTS> {
    slots: [RefreshSlot; S],
}

impl<const S: usize> RefreshQueue<S> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            slots: [const { RefreshSlot::new() }; S],
        }
    }

    /// Store a speed/direction command for `address`.
    pub fn set_speed(&self, address: Address, direction: Direction, speed: u8) -> Result<(), CommandError> {
        let [_, byte] = encode_speed(direction, speed)?;

        let slot = self.slot_for(address)?;
        slot.speed.store(byte, Ordering::Relaxed);
        slot.publish(PacketKind::Speed);
        Ok(())
    }

    /// Set or clear one group 1 function for `address`.
    ///
    /// Validates `function` before touching the table.
    pub fn set_function(&self, address: Address, function: u8, on: bool) -> Result<(), CommandError> {
        // Probe against an empty mask: only the range check matters here.
        encode_function_group1(function, on, FunctionGroup1::OFF)?;

        let slot = self.slot_for(address)?;
        let bit = 1u8 << function;
        if on {
            slot.functions.fetch_or(bit, Ordering::Relaxed);
        } else {
            slot.functions.fetch_and(!bit, Ordering::Relaxed);
        }
        slot.publish(PacketKind::FunctionGroup1);
        Ok(())
    }

    /// Free the slot of `address`. Returns `false` if it had none.
    pub fn release(&self, address: Address) -> bool {
        match self.find(address.value()) {
            Some(slot) => {
                slot.present.store(0, Ordering::Release);
                slot.fresh.store(0, Ordering::Relaxed);
                slot.speed.store(0, Ordering::Relaxed);
                slot.functions.store(0, Ordering::Relaxed);
                slot.address.store(FREE, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Last speed/direction stored for `address`.
    pub fn speed(&self, address: Address) -> Option<(Direction, u8)> {
        let slot = self.find(address.value())?;
        if slot.present.load(Ordering::Acquire) & PacketKind::Speed.bit() == 0 {
            return None;
        }
        Some(decode_speed_byte(slot.speed.load(Ordering::Relaxed)))
    }

    /// Function group 1 state stored for `address`.
    pub fn functions(&self, address: Address) -> Option<FunctionGroup1> {
        let slot = self.find(address.value())?;
        if slot.present.load(Ordering::Acquire) & PacketKind::FunctionGroup1.bit() == 0 {
            return None;
        }
        Some(FunctionGroup1::from_mask(slot.functions.load(Ordering::Relaxed)))
    }

    /// Number of addresses holding at least one packet.
    pub fn active(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.address() != FREE && s.present.load(Ordering::Acquire) != 0)
            .count()
    }

    /// Slot capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        S
    }

    // --- Scheduler side ---

    /// Address, present kinds and claim count of slot `index`, `None` if inactive.
    pub(crate) fn entry(&self, index: usize) -> Option<SlotEntry> {
        let slot = self.slots.get(index)?;
        let raw = slot.address();
        if raw == FREE {
            return None;
        }
        let present = slot.present.load(Ordering::Acquire);
        if present == 0 {
            return None;
        }
        let claim = slot.claim.load(Ordering::Acquire);
        Address::new(raw).ok().map(|address| SlotEntry { address, present, claim })
    }

    /// Take the fresh bits of slot `index`.
    pub(crate) fn take_fresh(&self, index: usize) -> u8 {
        self.slots
            .get(index)
            .map(|s| s.fresh.swap(0, Ordering::AcqRel))
            .unwrap_or(0)
    }

    /// Build the packet of `kind` for slot `index` from its current state.
    pub(crate) fn packet(&self, index: usize, kind: PacketKind) -> Option<Packet> {
        let SlotEntry { address, present, .. } = self.entry(index)?;
        if present & kind.bit() == 0 {
            return None;
        }
        let slot = &self.slots[index];
        match kind {
            PacketKind::Speed => {
                let (direction, speed) = decode_speed_byte(slot.speed.load(Ordering::Relaxed));
                Packet::speed(address, direction, speed).ok()
            }
            PacketKind::FunctionGroup1 => {
                let functions = FunctionGroup1::from_mask(slot.functions.load(Ordering::Relaxed));
                Some(Packet::function_group1(address, functions))
            }
        }
    }

    // --- Private methods ---

    fn find(&self, raw: u16) -> Option<&RefreshSlot> {
        self.slots.iter().find(|s| s.address() == raw)
    }

    /// Existing slot for `address`, else claim a free one.
    fn slot_for(&self, address: Address) -> Result<&RefreshSlot, CommandError> {
        let raw = address.value();
        if let Some(slot) = self.find(raw) {
            return Ok(slot);
        }

        for slot in &self.slots {
            if slot
                .address
                .compare_exchange(FREE, raw, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                slot.claim.fetch_add(1, Ordering::AcqRel);
                return Ok(slot);
            }
        }

        Err(CommandError::QueueFull)
    }
}

impl<const S: usize> Default for RefreshQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}
