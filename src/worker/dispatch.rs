//! Bounded fan-out of items over a worker pool

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Above this many items the pool gets one worker per this many items
pub const ITEMS_PER_WORKER: usize = 100;

/// Worker count for `item_count` items: `count / 100` for large boards,
/// otherwise one worker per available CPU. Never below 1.
pub fn pool_size(item_count: usize) -> usize {
    if item_count > ITEMS_PER_WORKER {
        (item_count / ITEMS_PER_WORKER).max(1)
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Result of a completed fan-out
#[derive(Debug)]
pub struct Dispatched<O> {
    pub elapsed: Duration,
    /// One entry per item that completed, in completion order
    pub outcomes: Vec<O>,
}

/// Run `f` on every item with at most `pool_size` in flight, and wait for all.
///
/// Items run as separate tasks on the runtime's worker threads; order is not
/// preserved. A panicking item is logged and contributes no outcome.
pub async fn run_all<T, F, Fut>(items: Vec<T>, pool_size: usize, f: F) -> Dispatched<Fut::Output>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let start = Instant::now();
    let pool_size = pool_size.max(1);
    let total = items.len();
    debug!(total, pool_size, "Dispatching items");

    let semaphore = Arc::new(Semaphore::new(pool_size));
    let f = Arc::new(f);
    let mut join_set = JoinSet::new();

    for item in items {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let f = Arc::clone(&f);
        join_set.spawn(async move {
            let _permit = permit;
            f(item).await
        });
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(result) = join_set.join_next().await {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => error!("Worker task panicked: {}", e),
        }
    }

    Dispatched {
        elapsed: start.elapsed(),
        outcomes,
    }
}
