//! Packet scheduler: refresh queue → word FIFO.
//!
//! Runs in one thread at the packet period. Each [`service`] call:
//!
//! 1. Drives the enable line from power state and fault
//! 2. Flushes words left over from the previous packet; stops if the FIFO
//!    is still full (nothing is dropped)
//! 3. Picks one packet: idle while power is `Off`, else the next active
//!    refresh slot after the cursor (idle if none)
//! 4. Frames it, with a padding run if the previous packet went to the same
//!    decoder, and pushes as many words as fit
//!
//! Round-robin over slots bounds refresh latency: with N active addresses
//! every address is offered within N calls that are not blocked by a full
//! FIFO. Within a slot a freshly changed kind gets `command_repeats`
//! priority sends, otherwise speed and function packets alternate.
//!
//! [`service`]: PacketScheduler::service

use embedded_hal::digital::{Error as _, OutputPin, PinState};

use crate::config::DccConfig;
use crate::fault::FaultCode;
use crate::fifo::{WordFifo, DEFAULT_FIFO_DEPTH};
use crate::generator::{DccGenerator, PowerState};
use crate::logging::{LogSource, LogStream};
use crate::packet::{Address, FramedPacket, Packet};
use crate::refresh::{PacketKind, SlotEntry, DEFAULT_SLOTS};
use crate::{rt_debug, rt_info, rt_trace, rt_warn};

/// Result of one scheduling step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// Power unknown or generator faulted: nothing queued.
    Inert,
    /// Words of the previous packet still waiting for FIFO space.
    Blocked,
    /// `packet` was framed; `complete` if all its words fit the FIFO.
    Queued { packet: Packet, complete: bool },
}

/// Scheduler counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Packets framed (idle included).
    pub packets: u32,
    /// Idle packets framed.
    pub idle: u32,
    /// Packets preceded by a padding run.
    pub padded: u32,
    /// Calls that ended with words still pending.
    pub deferrals: u32,
}

/// Scheduler-owned rotation state of one refresh slot.
#[derive(Clone, Copy, Debug)]
struct SlotRotation {
    /// Slot claim this state belongs to.
    claim: u16,
    last_kind: PacketKind,
    /// Priority sends left, indexed by `PacketKind::index`.
    repeats: [u8; 2],
}

impl SlotRotation {
    // Speed goes first on a new slot.
    const NEW: Self = Self {
        claim: 0,
        last_kind: PacketKind::FunctionGroup1,
        repeats: [0; 2],
    };

    /// Start over if the slot changed owner since the last visit.
    fn follow(&mut self, claim: u16) {
        if self.claim != claim {
            *self = Self { claim, ..Self::NEW };
        }
    }

    /// Grant priority sends to the kinds in `fresh`.
    fn refresh(&mut self, fresh: u8, repeats: u8) {
        for kind in PacketKind::ALL {
            if fresh & kind.bit() != 0 {
                self.repeats[kind.index()] = repeats;
            }
        }
    }

    /// Pick the kind to send among `present`.
    fn choose(&mut self, present: u8) -> Option<PacketKind> {
        let next = self.last_kind.other();
        let prev = self.last_kind;
        let has = |k: PacketKind| present & k.bit() != 0;

        let kind = match (has(next), has(prev)) {
            (true, true) => {
                if self.repeats[prev.index()] > 0 && self.repeats[next.index()] == 0 {
                    prev
                } else {
                    next
                }
            }
            (true, false) => next,
            (false, true) => prev,
            (false, false) => return None,
        };

        let left = &mut self.repeats[kind.index()];
        *left = left.saturating_sub(1);
        self.last_kind = kind;
        Some(kind)
    }
}

/// Packet scheduler, the single producer of the word FIFO.
pub struct PacketScheduler<'a, const N: usize = DEFAULT_FIFO_DEPTH, const S: usize = DEFAULT_SLOTS> {
    generator: &'a DccGenerator<S>,
    fifo: &'a WordFifo<N>,
    config: &'a DccConfig,
    log: &'a LogStream,

    cursor: usize,
    rotation: [SlotRotation; S],

    // Words of the last packet not yet accepted by the FIFO
    pending: FramedPacket,
    pending_pos: usize,

    last_address: Option<Address>,
    enable_level: Option<bool>,
    blocked: bool,
    stats: SchedulerStats,
}

impl<'a, const N: usize, const S: usize> PacketScheduler<'a, N, S> {
    pub fn new(
        generator: &'a DccGenerator<S>,
        fifo: &'a WordFifo<N>,
        config: &'a DccConfig,
        log: &'a LogStream,
    ) -> Self {
        Self {
            generator,
            fifo,
            config,
            log,
            cursor: 0,
            rotation: [SlotRotation::NEW; S],
            pending: FramedPacket::new(),
            pending_pos: 0,
            last_address: None,
            enable_level: None,
            blocked: false,
            stats: SchedulerStats::default(),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Words of the current packet still waiting for FIFO space.
    pub fn pending_words(&self) -> usize {
        self.pending.len() - self.pending_pos
    }

    /// Run one scheduling step.
    ///
    /// `enable` is the booster ENABLE output; it is written only when its
    /// level has to change.
    pub fn service<P: OutputPin>(&mut self, now_us: i64, enable: &mut P) -> ServiceOutcome {
        let power = self.generator.power_state();
        let high = power == PowerState::On && !self.generator.fault().is_active();
        self.drive_enable(now_us, high, enable);

        // Re-read: a failed enable write latches a fault
        if self.generator.fault().is_active() || power == PowerState::Unknown {
            return ServiceOutcome::Inert;
        }

        if !self.flush() {
            self.stats.deferrals = self.stats.deferrals.wrapping_add(1);
            if !self.blocked {
                self.blocked = true;
                rt_warn!(
                    self.log,
                    LogSource::Scheduler,
                    now_us,
                    "FIFO full, {} words deferred",
                    self.pending_words()
                );
            }
            return ServiceOutcome::Blocked;
        }
        self.blocked = false;

        let packet = match power {
            PowerState::On => self.next_packet(now_us).unwrap_or(Packet::IDLE),
            _ => Packet::IDLE,
        };
        let address = packet.address();

        let mut framed = packet.framed();
        if address.is_some() && address == self.last_address && self.config.same_address_padding() {
            framed = framed.with_padding();
            self.stats.padded = self.stats.padded.wrapping_add(1);
        }
        self.last_address = address;

        self.stats.packets = self.stats.packets.wrapping_add(1);
        if packet.is_idle() {
            self.stats.idle = self.stats.idle.wrapping_add(1);
        }

        self.pending = framed;
        self.pending_pos = 0;
        let complete = self.flush();
        if !complete {
            self.stats.deferrals = self.stats.deferrals.wrapping_add(1);
        }

        rt_trace!(
            self.log,
            LogSource::Scheduler,
            now_us,
            "packet {:02X?} chk {:02X}",
            packet.as_bytes(),
            packet.checksum()
        );

        ServiceOutcome::Queued { packet, complete }
    }

    // --- Private methods ---

    fn drive_enable<P: OutputPin>(&mut self, now_us: i64, high: bool, enable: &mut P) {
        if self.enable_level == Some(high) {
            return;
        }
        match enable.set_state(PinState::from(high)) {
            Ok(()) => {
                self.enable_level = Some(high);
                rt_info!(
                    self.log,
                    LogSource::Scheduler,
                    now_us,
                    "enable {}",
                    if high { "high" } else { "low" }
                );
            }
            Err(e) => {
                self.enable_level = None;
                rt_warn!(self.log, LogSource::Scheduler, now_us, "enable write failed: {:?}", e.kind());
                self.generator.latch_fault(FaultCode::DriverFault, high as u32);
            }
        }
    }

    /// Push pending words. Returns `true` once none are left.
    fn flush(&mut self) -> bool {
        let words = self.pending.as_slice();
        while self.pending_pos < words.len() {
            if self.fifo.try_push(words[self.pending_pos]).is_err() {
                return false;
            }
            self.pending_pos += 1;
        }
        true
    }

    /// Next refresh packet after the cursor, advancing it.
    fn next_packet(&mut self, now_us: i64) -> Option<Packet> {
        let generator = self.generator;
        let queue = generator.queue();
        let repeats = self.config.command_repeats();

        for step in 0..S {
            let index = (self.cursor + step) % S;
            let Some(SlotEntry { address, present, claim }) = queue.entry(index) else {
                continue;
            };

            let rotation = &mut self.rotation[index];
            rotation.follow(claim);
            let fresh = queue.take_fresh(index);
            if fresh != 0 {
                rotation.refresh(fresh, repeats);
                rt_debug!(
                    self.log,
                    LogSource::Scheduler,
                    now_us,
                    "slot {} addr {} fresh {:02b}",
                    index,
                    address.value(),
                    fresh
                );
            }

            let Some(kind) = rotation.choose(present) else {
                continue;
            };
            if let Some(packet) = queue.packet(index, kind) {
                self.cursor = (index + 1) % S;
                return Some(packet);
            }
        }
        None
    }
}

/// Fixed-rate pacing of the scheduler loop.
///
/// Step starts sit on a grid `period` apart, so service time and sleep
/// rounding do not accumulate. After an overrun the grid restarts at the
/// late step instead of bursting to catch up.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pacer {
    next_us: Option<i64>,
}

impl Pacer {
    pub const fn new() -> Self {
        Self { next_us: None }
    }

    /// Microseconds to sleep after a step that started at `started_us`,
    /// given the current time `now_us`.
    pub fn delay_us(&mut self, started_us: i64, now_us: i64, period_ms: u16) -> u64 {
        let period = period_ms as i64 * 1_000;
        let anchor = self.next_us.unwrap_or(started_us);
        let deadline = (anchor + period).max(now_us);
        self.next_us = Some(deadline);
        (deadline - now_us) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEED: u8 = 1 << PacketKind::Speed as u8;
    const FG1: u8 = 1 << PacketKind::FunctionGroup1 as u8;

    #[test]
    fn test_rotation_alternates_when_settled() {
        let mut r = SlotRotation::NEW;
        let both = SPEED | FG1;
        assert_eq!(r.choose(both), Some(PacketKind::Speed));
        assert_eq!(r.choose(both), Some(PacketKind::FunctionGroup1));
        assert_eq!(r.choose(both), Some(PacketKind::Speed));
    }

    #[test]
    fn test_rotation_fresh_kind_repeats() {
        let mut r = SlotRotation::NEW;
        let both = SPEED | FG1;
        r.choose(both); // speed
        r.refresh(SPEED, 2);

        // Speed was last, but it is fresh and function is not
        assert_eq!(r.choose(both), Some(PacketKind::Speed));
        assert_eq!(r.choose(both), Some(PacketKind::Speed));
        // Budget spent: back to alternating
        assert_eq!(r.choose(both), Some(PacketKind::FunctionGroup1));
        assert_eq!(r.choose(both), Some(PacketKind::Speed));
    }

    #[test]
    fn test_rotation_resets_for_new_claim() {
        let mut r = SlotRotation::NEW;
        r.follow(1);
        r.choose(SPEED | FG1); // speed
        r.follow(1);
        assert_eq!(r.choose(SPEED | FG1), Some(PacketKind::FunctionGroup1));

        r.follow(2);
        assert_eq!(r.choose(SPEED | FG1), Some(PacketKind::Speed));
    }

    #[test]
    fn test_pacer_holds_period_start_to_start() {
        let mut pacer = Pacer::new();
        // Step at 0 took 4 ms
        assert_eq!(pacer.delay_us(0, 4_000, 30), 26_000);
        // Woke 2 ms late at 32 ms, step took 3 ms: next start still at 60 ms
        assert_eq!(pacer.delay_us(32_000, 35_000, 30), 25_000);
        assert_eq!(pacer.delay_us(60_000, 61_000, 30), 29_000);
    }

    #[test]
    fn test_pacer_restarts_after_overrun() {
        let mut pacer = Pacer::new();
        assert_eq!(pacer.delay_us(0, 1_000, 15), 14_000);
        // Step at 15 ms ran until 40 ms: go again now, no burst
        assert_eq!(pacer.delay_us(15_000, 40_000, 15), 0);
        assert_eq!(pacer.delay_us(40_000, 41_000, 15), 14_000);
    }

    #[test]
    fn test_rotation_single_kind() {
        let mut r = SlotRotation::NEW;
        assert_eq!(r.choose(FG1), Some(PacketKind::FunctionGroup1));
        assert_eq!(r.choose(FG1), Some(PacketKind::FunctionGroup1));
        assert_eq!(r.choose(0), None);
    }
}
