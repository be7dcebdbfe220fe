//! Async usage examples

use esox_boundedpool::{BoundedPool, BoxError, PoolConfiguration};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== EsoxSolutions.BoundedPool - Async Examples ===\n");

    // Example 1: Async acquire
    async_acquire().await;

    // Example 2: Async with timeout
    async_with_timeout().await;

    // Example 3: Concurrent access with backpressure
    concurrent_access().await;

    // Example 4: Background shrink
    background_shrink().await;
}

fn connections(baseline: usize, max: usize) -> BoundedPool<String> {
    let next = std::sync::atomic::AtomicUsize::new(0);
    BoundedPool::new(
        move || {
            let id = next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok::<_, BoxError>(format!("conn-{}", id))
        },
        PoolConfiguration::new()
            .with_name("connections")
            .with_baseline_size(baseline)
            .with_max_pool_size(max),
    )
    .unwrap()
}

async fn async_acquire() {
    println!("1. Async Acquire:");
    let pool = connections(2, 4);

    {
        let conn = pool.acquire_async().await.unwrap();
        println!("   Got connection asynchronously: {}", *conn);
    }

    println!();
}

async fn async_with_timeout() {
    println!("2. Async with Timeout:");
    let pool = connections(1, 1);

    // Hold the only connection
    let _conn = pool.acquire_async().await.unwrap();

    // Try to get another (should time out)
    match pool.acquire_timeout(Duration::from_millis(100)).await {
        Ok(_) => println!("   Got connection"),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");
    let pool = Arc::new(connections(1, 3));

    let mut handles = vec![];

    for i in 0..8 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            // At most three tasks hold a connection at once
            let conn = pool.acquire_async().await.unwrap();
            println!("   Task {} got {}", i, *conn);
            sleep(Duration::from_millis(50)).await;
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final pool size: {}\n", pool.current_size());
}

async fn background_shrink() {
    println!("4. Background Shrink:");
    let pool = BoundedPool::new(
        || Ok::<_, BoxError>(Vec::<u8>::with_capacity(4096)),
        PoolConfiguration::new()
            .with_name("scratch")
            .with_baseline_size(1)
            .with_max_pool_size(4)
            .with_shrink_interval(Duration::from_secs(30 * 60)),
    )
    .unwrap();

    {
        let _burst: Vec<_> = (0..4).map(|_| pool.try_acquire().unwrap()).collect();
    }
    println!("   Size after burst: {}", pool.current_size());
    println!("   The worker trims idle buffers back to 1 every 30 minutes");

    pool.dispose();
    println!("   Disposed, shrink worker stopped");
}
