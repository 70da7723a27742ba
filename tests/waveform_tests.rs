//! Waveform engine tests

mod common;

use common::{bits_from_ticks, collect_bits, collect_ticks, decode_packets, MIN_PREAMBLE};

use rust_dcc_generator::config::TimingConfig;
use rust_dcc_generator::error::ConfigError;
use rust_dcc_generator::fifo::WordFifo;
use rust_dcc_generator::packet::{Address, Direction, FunctionGroup1, Packet};
use rust_dcc_generator::waveform::{Bit, WaveformEngine};
use rust_dcc_generator::word::FramedWord;

fn push_packet<const N: usize>(fifo: &WordFifo<N>, packet: &Packet) {
    for word in packet.framed().as_slice() {
        fifo.try_push(*word).unwrap();
    }
}

#[test]
fn test_starvation_emits_legal_long_zeros() {
    let fifo = WordFifo::<8>::new();
    let mut engine = WaveformEngine::new(&fifo, TimingConfig::NMRA);

    // 300 full "0" cycles
    let levels = collect_ticks(&mut engine, 300 * 100);
    let bits = bits_from_ticks(&levels, &TimingConfig::NMRA);

    assert!(bits.len() >= 299);
    assert!(bits.iter().all(|b| *b == Bit::Zero));
    assert!(engine.stats().starved >= 33);
    assert!(fifo.underruns() >= 33);
}

#[test]
fn test_engine_recovers_after_starvation() {
    let fifo = WordFifo::<8>::new();
    let mut engine = WaveformEngine::new(&fifo, TimingConfig::NMRA);

    // Starve exactly one substituted word
    assert!(collect_bits(&mut engine, 9).iter().all(|b| *b == Bit::Zero));

    push_packet(&fifo, &Packet::IDLE);
    let packets = decode_packets(&collect_bits(&mut engine, 60));
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].bytes, vec![0xFF, 0x00, 0xFF]);
}

#[test]
fn test_tick_level_end_to_end() {
    let fifo = WordFifo::<8>::new();
    let speed = Packet::speed(Address::new(3).unwrap(), Direction::Forward, 64).unwrap();
    push_packet(&fifo, &speed);

    let mut engine = WaveformEngine::new(&fifo, TimingConfig::NMRA);
    let levels = collect_ticks(&mut engine, 60 * 200);
    let packets = decode_packets(&bits_from_ticks(&levels, &TimingConfig::NMRA));

    assert_eq!(packets.len(), 1);
    let p = &packets[0];
    assert!(p.preamble >= MIN_PREAMBLE);
    assert!(p.checksum_ok());
    assert_eq!(p.payload(), speed.as_bytes());
}

#[test]
fn test_back_to_back_packets_keep_preamble() {
    let fifo = WordFifo::<16>::new();
    let addr = Address::new(1000).unwrap();
    let a = Packet::speed(addr, Direction::Reverse, 5).unwrap();
    let b = Packet::function_group1(addr, FunctionGroup1::from_mask(0b11111));
    push_packet(&fifo, &a);
    push_packet(&fifo, &b);

    let mut engine = WaveformEngine::new(&fifo, TimingConfig::NMRA);
    let packets = decode_packets(&collect_bits(&mut engine, 200));

    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].payload(), a.as_bytes());
    assert_eq!(packets[1].payload(), b.as_bytes());
    // Previous end bit plus a full preamble word
    assert_eq!(packets[1].preamble, 17);
    assert_eq!(engine.stats().packet_ends, 2);
}

#[test]
fn test_padding_is_sixteen_zeros() {
    let fifo = WordFifo::<8>::new();
    fifo.try_push(FramedWord::PADDING).unwrap();
    fifo.try_push(FramedWord::PREAMBLE).unwrap();
    let mut engine = WaveformEngine::new(&fifo, TimingConfig::NMRA);

    let bits = collect_bits(&mut engine, 32);
    assert!(bits[..16].iter().all(|b| *b == Bit::Zero));
    assert!(bits[16..].iter().all(|b| *b == Bit::One));
}

#[test]
fn test_iterator_yields_symmetric_cycles() {
    let fifo = WordFifo::<8>::new();
    fifo.try_push(FramedWord::PREAMBLE).unwrap();
    let engine = WaveformEngine::new(&fifo, TimingConfig::NMRA);

    let cycles: Vec<_> = engine.take(25).collect();
    assert!(cycles[..16].iter().all(|c| c.bit == Bit::One && c.high_ticks == 29 && c.low_ticks == 29));
    assert!(cycles[16..].iter().all(|c| c.bit == Bit::Zero && c.high_ticks == 50 && c.low_ticks == 50));
}

#[test]
fn test_stretched_zero_timing() {
    // 1 µs tick, "0" half stretched to 150 µs
    let timing = TimingConfig { tick_ns: 1_000, one_half_ticks: 58, zero_half_ticks: 150 };
    assert!(timing.validate().is_ok());

    let fifo = WordFifo::<8>::new();
    push_packet(&fifo, &Packet::IDLE);
    let mut engine = WaveformEngine::new(&fifo, timing);
    let levels = collect_ticks(&mut engine, 60 * 300);
    let packets = decode_packets(&bits_from_ticks(&levels, &timing));

    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].payload(), &[0xFF, 0x00]);
}

#[test]
fn test_timing_bounds() {
    let with = |one: u16, zero: u16| TimingConfig { tick_ns: 2_000, one_half_ticks: one, zero_half_ticks: zero };

    // "1" half 54 µs and 62 µs
    assert_eq!(with(27, 50).validate(), Err(ConfigError::InvalidTiming));
    assert_eq!(with(31, 50).validate(), Err(ConfigError::InvalidTiming));
    // "0" half 94 µs and 9902 µs
    assert_eq!(with(29, 47).validate(), Err(ConfigError::InvalidTiming));
    assert_eq!(with(29, 4951).validate(), Err(ConfigError::InvalidTiming));
    // 60 µs / 96 µs is inside both windows but below the 1.72 ratio
    assert_eq!(with(30, 48).validate(), Err(ConfigError::InvalidTiming));
    // Edges
    assert!(with(28, 49).validate().is_ok());
    assert!(with(30, 4950).validate().is_ok());

    let zero_tick = TimingConfig { tick_ns: 0, ..TimingConfig::NMRA };
    assert_eq!(zero_tick.validate(), Err(ConfigError::InvalidTiming));
}

#[test]
fn test_reset_drops_partial_word() {
    let fifo = WordFifo::<8>::new();
    fifo.try_push(FramedWord::PREAMBLE).unwrap();
    fifo.try_push(FramedWord::last_byte(0xAA)).unwrap();
    let mut engine = WaveformEngine::new(&fifo, TimingConfig::NMRA);

    collect_bits(&mut engine, 8);
    engine.reset();
    assert_eq!(engine.stats().bits, 0);

    // Remaining preamble bits are gone; next word is the byte segment
    let bits = collect_bits(&mut engine, 10);
    assert_eq!(bits[0], Bit::Zero);
    assert_eq!(bits[9], Bit::One);
}
