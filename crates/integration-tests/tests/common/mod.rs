//! Shared helpers for pool integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tidepool_core::port::processor::mocks::RecordingProcessor;
use tidepool_core::port::time_provider::mocks::ManualTimeProvider;
use tidepool_core::{Pool, PoolConfig};

/// Poll `condition` every few ms until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Let every runnable task make progress (current-thread runtime)
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
}

pub struct Harness {
    pub pool: Pool<u32>,
    pub processor: Arc<RecordingProcessor<u32>>,
    pub clock: Arc<ManualTimeProvider>,
}

/// Pool on a manual clock, so the downscale cooldown only passes when told
pub fn harness(config: PoolConfig, processor: RecordingProcessor<u32>) -> Harness {
    let processor = Arc::new(processor);
    let clock = Arc::new(ManualTimeProvider::new(1_000_000));
    let pool = Pool::<u32>::with_time_provider(config, processor.clone(), clock.clone())
        .expect("valid pool config");
    Harness {
        pool,
        processor,
        clock,
    }
}
