//! Integration tests for the unbounded queue under concurrent load.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use strata_sync::UnboundedQueue;

#[test]
fn test_concurrent_sum_is_conserved() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 25_000;

    let queue = Arc::new(UnboundedQueue::new());
    let done = Arc::new(AtomicBool::new(false));

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut sum = 0u64;
                loop {
                    match queue.try_dequeue() {
                        Some(value) => sum += value,
                        None if done.load(Ordering::SeqCst) => {
                            // Producers are finished; drain whatever is left.
                            while let Some(value) = queue.try_dequeue() {
                                sum += value;
                            }
                            return sum;
                        }
                        None => thread::yield_now(),
                    }
                }
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.enqueue(p * PER_PRODUCER + i);
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);

    let total: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();
    let n = PRODUCERS * PER_PRODUCER;
    assert_eq!(total, n * (n - 1) / 2);
    assert!(queue.is_empty());
}

#[test]
fn test_boxed_payloads_survive_handoff() {
    let queue = Arc::new(UnboundedQueue::new());

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for i in 0..1_000 {
                queue.enqueue(vec![i; 16]);
            }
        })
    };
    producer.join().unwrap();

    for i in 0..1_000 {
        let batch = queue.try_dequeue().unwrap();
        assert_eq!(batch.len(), 16);
        assert!(batch.iter().all(|&v| v == i));
    }
    assert!(queue.try_dequeue().is_none());
}
