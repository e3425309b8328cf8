//! Integration tests for the bounded ring queues.
//!
//! Covers the capacity contract, the fill/drain scenario, FIFO for both
//! strategies, and conservation under multi-producer multi-consumer stress.
//!
//! Run with: cargo test --test ring_queue_test -- --nocapture

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_sync::{spsc, RingQueue};

// ============================================================================
// CAPACITY
// ============================================================================

#[test]
fn test_capacity_rounding() {
    let requested = [0, 1, 4, 127, 128, 129];
    let expected = [4, 4, 4, 128, 128, 256];

    for (req, exp) in requested.into_iter().zip(expected) {
        assert_eq!(RingQueue::<i32>::new(req).size(), exp, "mpmc request {req}");
        let (tx, rx) = spsc::channel::<i32>(req);
        assert_eq!(tx.size(), exp, "spsc request {req}");
        assert_eq!(rx.size(), exp, "spsc request {req}");
    }
}

// ============================================================================
// FILL / DRAIN SCENARIO
// ============================================================================

#[test]
fn test_fill_drain_scenario_mpmc() {
    let queue = RingQueue::new(5);
    assert_eq!(queue.size(), 8);

    for i in 1..=8 {
        queue.enqueue(i);
    }
    assert_eq!(queue.try_enqueue(9), Err(9));

    for i in 1..=8 {
        assert_eq!(queue.dequeue(), i);
    }
    assert_eq!(queue.try_dequeue(), None);

    for i in 1..=4 {
        assert!(queue.try_enqueue(i).is_ok());
    }
    for i in 1..=4 {
        assert_eq!(queue.try_dequeue(), Some(i));
    }
    assert!(queue.is_empty());
}

#[test]
fn test_fill_drain_scenario_spsc() {
    let (mut tx, mut rx) = spsc::channel(5);
    assert_eq!(tx.size(), 8);

    for i in 1..=8 {
        tx.enqueue(i);
    }
    assert_eq!(tx.try_enqueue(9), Err(9));

    for i in 1..=8 {
        assert_eq!(rx.dequeue(), i);
    }
    assert_eq!(rx.try_dequeue(), None);

    for i in 1..=4 {
        assert!(tx.try_enqueue(i).is_ok());
    }
    for i in 1..=4 {
        assert_eq!(rx.try_dequeue(), Some(i));
    }
    assert!(rx.is_empty());
}

// ============================================================================
// FIFO
// ============================================================================

#[test]
fn test_fifo_single_producer_keep_order() {
    const ITEMS: u32 = 20_000;

    let queue = Arc::new(RingQueue::with_order(16, true));
    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for i in 0..ITEMS {
                queue.enqueue(i);
            }
        })
    };

    for expected in 0..ITEMS {
        assert_eq!(queue.dequeue(), expected);
    }
    producer.join().unwrap();
    assert!(queue.is_empty());
}

#[test]
fn test_fifo_single_producer_try_ops() {
    const ITEMS: u32 = 5_000;

    let queue = Arc::new(RingQueue::new(20));
    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for i in 0..ITEMS {
                let mut item = i;
                while let Err(rejected) = queue.try_enqueue(item) {
                    item = rejected;
                    thread::yield_now();
                }
            }
        })
    };

    let mut received = Vec::with_capacity(ITEMS as usize);
    while received.len() < ITEMS as usize {
        match queue.try_dequeue() {
            Some(value) => received.push(value),
            None => thread::yield_now(),
        }
    }
    producer.join().unwrap();

    assert!(received.iter().copied().eq(0..ITEMS));
}

#[test]
fn test_fifo_spsc_blocking() {
    const ITEMS: u64 = 50_000;

    let (mut tx, mut rx) = spsc::channel(32);
    let producer = thread::spawn(move || {
        for i in 0..ITEMS {
            tx.enqueue(i);
        }
    });

    for expected in 0..ITEMS {
        assert_eq!(rx.dequeue(), expected);
    }
    producer.join().unwrap();
}

// ============================================================================
// MPMC CONSERVATION
// ============================================================================

/// Runs `producers` blocking producers and `consumers` try-dequeue consumers
/// and returns (sent, received) multisets.
fn run_mpmc(
    keep_order: bool,
    producers: usize,
    consumers: usize,
    per_producer: usize,
) -> (HashMap<u32, usize>, HashMap<u32, usize>) {
    let queue = Arc::new(RingQueue::with_order(20, keep_order));
    let finished = Arc::new(AtomicBool::new(false));

    let producer_handles: Vec<_> = (0..producers)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(p as u64);
                let mut sent = Vec::with_capacity(per_producer);
                for _ in 0..per_producer {
                    let value: u32 = rng.gen_range(0..=100);
                    sent.push(value);
                    queue.enqueue(value);
                }
                sent
            })
        })
        .collect();

    let consumer_handles: Vec<_> = (0..consumers)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                let mut received = Vec::new();
                loop {
                    if finished.load(Ordering::SeqCst) && queue.is_empty() {
                        break;
                    }
                    match queue.try_dequeue() {
                        Some(value) => received.push(value),
                        None => thread::yield_now(),
                    }
                }
                received
            })
        })
        .collect();

    let mut sent = HashMap::new();
    for handle in producer_handles {
        for value in handle.join().unwrap() {
            *sent.entry(value).or_insert(0) += 1;
        }
    }
    finished.store(true, Ordering::SeqCst);

    let mut received = HashMap::new();
    for handle in consumer_handles {
        for value in handle.join().unwrap() {
            *received.entry(value).or_insert(0) += 1;
        }
    }

    (sent, received)
}

#[test]
fn test_mpmc_conservation_keep_order() {
    let (sent, received) = run_mpmc(true, 5, 5, 1_000);
    assert_eq!(sent.values().sum::<usize>(), 5_000);
    assert_eq!(sent, received);
}

#[test]
fn test_mpmc_conservation_relaxed() {
    let (sent, received) = run_mpmc(false, 5, 5, 1_000);
    assert_eq!(sent.values().sum::<usize>(), 5_000);
    assert_eq!(sent, received);
}

#[test]
fn test_mpmc_blocking_both_sides() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 10_000;

    let queue = Arc::new(RingQueue::with_order(8, false));
    let start = Arc::new(Barrier::new((PRODUCERS * 2) as usize));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for i in 0..PER_PRODUCER {
                    queue.enqueue(p * PER_PRODUCER + i);
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                (0..PER_PRODUCER).map(|_| queue.dequeue()).sum::<u64>()
            })
        })
        .collect();

    let begin = Instant::now();
    for producer in producers {
        producer.join().unwrap();
    }
    let total: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();
    println!("blocking mpmc: {} items in {:?}", PRODUCERS * PER_PRODUCER, begin.elapsed());

    let n = PRODUCERS * PER_PRODUCER;
    assert_eq!(total, n * (n - 1) / 2);
    assert!(queue.is_empty());
}

#[test]
fn test_mpmc_per_producer_order_keep_order() {
    const PRODUCERS: usize = 3;
    const PER_PRODUCER: u32 = 5_000;

    let queue = Arc::new(RingQueue::with_order(64, true));
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.enqueue((p, i));
                }
            })
        })
        .collect();

    // One consumer: each producer's items must come out in submission order.
    let mut next = [0u32; PRODUCERS];
    for _ in 0..(PRODUCERS as u32 * PER_PRODUCER) {
        let (p, i) = queue.dequeue();
        assert_eq!(i, next[p], "producer {p} reordered");
        next[p] += 1;
    }
    for producer in producers {
        producer.join().unwrap();
    }
    assert_eq!(next, [PER_PRODUCER; PRODUCERS]);
}

// ============================================================================
// SATURATION UNDER CONTENTION
// ============================================================================

#[test]
fn test_try_enqueue_never_overfills() {
    const THREADS: usize = 8;

    let queue = Arc::new(RingQueue::new(8));
    let start = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let queue = Arc::clone(&queue);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                (0..4).filter(|i| queue.try_enqueue(t * 4 + i).is_ok()).count()
            })
        })
        .collect();

    let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(accepted, 8);
    assert_eq!(queue.len(), 8);

    let mut drained = 0;
    while queue.try_dequeue().is_some() {
        drained += 1;
    }
    assert_eq!(drained, 8);
}
