//! Word FIFO tests

use std::sync::Arc;
use std::thread;

use rust_dcc_generator::fifo::{WordFifo, WouldBlock};
use rust_dcc_generator::word::FramedWord;

#[test]
fn test_fifo_empty() {
    let fifo: WordFifo = WordFifo::new();
    assert!(fifo.is_empty());
    assert_eq!(fifo.capacity(), 8);
    assert_eq!(fifo.free(), 8);
    assert_eq!(fifo.pop(), None);
}

#[test]
fn test_fifo_order_and_wrap() {
    let fifo = WordFifo::<4>::new();

    for round in 0..10u8 {
        fifo.try_push(FramedWord::byte(round)).unwrap();
        fifo.try_push(FramedWord::last_byte(round)).unwrap();
        assert_eq!(fifo.len(), 2);
        assert_eq!(fifo.pop(), Some(FramedWord::byte(round)));
        assert_eq!(fifo.pop(), Some(FramedWord::last_byte(round)));
    }
    assert_eq!(fifo.underruns(), 0);
}

#[test]
fn test_full_push_is_rejected_not_overwritten() {
    let fifo = WordFifo::<2>::new();
    fifo.try_push(FramedWord::PREAMBLE).unwrap();
    fifo.try_push(FramedWord::byte(1)).unwrap();

    assert_eq!(fifo.try_push(FramedWord::byte(2)), Err(WouldBlock));
    assert_eq!(fifo.pop(), Some(FramedWord::PREAMBLE));
    assert_eq!(fifo.pop(), Some(FramedWord::byte(1)));
    assert_eq!(fifo.pop(), None);
}

#[test]
fn test_spsc_threads_preserve_order() {
    const WORDS: u32 = 20_000;

    let fifo = Arc::new(WordFifo::<8>::new());

    let producer = {
        let fifo = Arc::clone(&fifo);
        thread::spawn(move || {
            for i in 0..WORDS {
                let word = FramedWord::from_raw(i);
                while fifo.try_push(word).is_err() {
                    thread::yield_now();
                }
            }
        })
    };

    let mut expected = 0u32;
    while expected < WORDS {
        match fifo.pop() {
            Some(word) => {
                assert_eq!(word.raw(), expected);
                expected += 1;
            }
            None => thread::yield_now(),
        }
    }

    producer.join().unwrap();
    assert!(fifo.is_empty());
}

#[test]
fn test_len_bounded_from_consumer_side() {
    const WORDS: u32 = 20_000;

    let fifo = Arc::new(WordFifo::<4>::new());

    let producer = {
        let fifo = Arc::clone(&fifo);
        thread::spawn(move || {
            for i in 0..WORDS {
                while fifo.try_push(FramedWord::from_raw(i)).is_err() {
                    thread::yield_now();
                }
            }
        })
    };

    let mut popped = 0u32;
    while popped < WORDS {
        assert!(fifo.len() <= fifo.capacity());
        match fifo.pop() {
            Some(_) => popped += 1,
            None => thread::yield_now(),
        }
    }

    producer.join().unwrap();
}
