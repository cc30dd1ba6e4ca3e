//! Drain and Shutdown Tests
//!
//! After `complete()` nothing new is accepted, everything queued before it is
//! processed exactly once, and the pool converges to zero workers.

mod common;

use common::{harness, settle, wait_until};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tidepool_core::port::processor::mocks::RecordingProcessor;
use tidepool_core::{Pool, PoolConfig};

/// A drained pool completes and converges to zero at once
#[tokio::test]
async fn test_complete_after_drain_converges_to_zero() {
    let h = harness(
        PoolConfig::new(1, 5),
        RecordingProcessor::new().with_delay(Duration::from_millis(1)),
    );

    for i in 0..8 {
        h.pool.submit(i).unwrap();
    }
    assert!(
        wait_until(Duration::from_secs(2), || {
            h.processor.completed() == 8 && h.pool.stats().backlog == 0
        })
        .await
    );

    h.pool.complete();
    tokio::time::timeout(Duration::from_millis(500), h.pool.join())
        .await
        .expect("idle workers should exit almost immediately");

    let stats = h.pool.stats();
    assert!(stats.is_terminal());
    assert_eq!(stats.active, 0);
    assert_eq!(stats.pending_starts, 0);
    assert_eq!(stats.pending_stops, 0);
    assert_eq!(stats.processed, 8);

    // Terminal state is idempotent
    tokio_test::assert_err!(h.pool.submit(99));
    h.pool.complete();
    settle().await;
    assert_eq!(h.pool.stats(), stats);
}

/// Completion requested before anything was processed
#[tokio::test]
async fn test_complete_before_drain_processes_everything_once() {
    let h = harness(PoolConfig::new(2, 5), RecordingProcessor::new());

    for i in 0..3 {
        h.pool.submit(i).unwrap();
    }
    h.pool.complete();

    tokio::time::timeout(Duration::from_secs(2), h.pool.join())
        .await
        .expect("pool should drain and stop");

    let mut delivered = h.processor.delivered();
    delivered.sort_unstable();
    assert_eq!(delivered, vec![0, 1, 2]);
    assert!(h.pool.stats().is_terminal());
}

#[tokio::test]
async fn test_join_waits_for_every_held_item() {
    let h = harness(PoolConfig::new(1, 5), RecordingProcessor::new().gated());

    for i in 0..3 {
        h.pool.submit(i).unwrap();
    }
    h.pool.complete();

    h.processor.release(1);
    assert!(wait_until(Duration::from_secs(2), || h.processor.completed() == 1).await);
    settle().await;
    assert_eq!(h.processor.completed(), 1, "only one item was let through");
    assert!(!h.pool.stats().is_terminal());

    h.processor.release(2);
    tokio::time::timeout(Duration::from_secs(2), h.pool.join())
        .await
        .expect("released items should finish the drain");
    assert_eq!(h.processor.completed(), 3);
    assert_eq!(h.pool.stats().processed, 3);
}

#[tokio::test]
async fn test_stopped_workers_keep_draining_after_complete() {
    let h = harness(PoolConfig::new(1, 2), RecordingProcessor::new().gated());

    for i in 0..10 {
        h.pool.submit(i).unwrap();
    }
    settle().await;
    let before = h.pool.stats();
    assert_eq!(before.active, 5);

    h.pool.complete();
    let stats = h.pool.stats();
    assert_eq!(stats.pending_stops, 5, "every worker is asked to stop");
    assert_eq!(stats.current_target(), 0);

    h.processor.open_gate();
    tokio::time::timeout(Duration::from_secs(2), h.pool.join())
        .await
        .expect("pool should drain");

    assert_eq!(h.processor.delivered_count(), 10);
    assert_eq!(h.pool.stats().processed, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_exactly_once() {
    let processor = Arc::new(RecordingProcessor::<u32>::new());
    let config = PoolConfig::new(2, 3).with_downscale_cooldown(Duration::from_millis(5));
    let pool = Arc::new(Pool::<u32>::new(config, processor.clone()).unwrap());

    let producers: Vec<_> = (0..4u32)
        .map(|p| {
            let pool = Arc::clone(&pool);
            tokio::task::spawn_blocking(move || {
                for i in 0..250 {
                    pool.submit(p * 10_000 + i).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.expect("producer panicked");
    }

    pool.complete();
    tokio::time::timeout(Duration::from_secs(10), pool.join())
        .await
        .expect("pool should drain");

    let delivered = processor.delivered();
    assert_eq!(delivered.len(), 1000, "every item delivered");
    let unique: HashSet<_> = delivered.iter().copied().collect();
    assert_eq!(unique.len(), 1000, "no item delivered twice");

    let stats = pool.stats();
    assert_eq!(stats.processed, 1000);
    assert_eq!(stats.registered, 0);
}

#[tokio::test]
async fn test_dropping_pool_drains_queued_items() {
    let processor = Arc::new(RecordingProcessor::<u32>::new());
    let pool = Pool::<u32>::new(PoolConfig::new(1, 5), processor.clone()).unwrap();

    for i in 0..6 {
        pool.submit(i).unwrap();
    }
    drop(pool);

    assert!(
        wait_until(Duration::from_secs(2), || processor.completed() == 6).await,
        "queued items survive the pool handle"
    );
}
