//! Basic usage examples for BoundedPool

use esox_boundedpool::{BoundedPool, BoxError, Closeable, PoolConfiguration, PoolError};
use tracing_subscriber::EnvFilter;

fn main() {
    // Set RUST_LOG=esox_boundedpool=debug to see pool events
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== EsoxSolutions.BoundedPool - Basic Examples ===\n");

    // Example 1: Blocking acquire with automatic return
    simple_pool();

    // Example 2: Growth and shrink-back
    grow_and_shrink();

    // Example 3: Try methods
    try_methods();

    // Example 4: Closeable objects and teardown
    closeable_teardown();

    // Example 5: Metrics
    metrics();
}

fn buffers(baseline: usize, max: usize) -> BoundedPool<Vec<u8>> {
    BoundedPool::new(
        || Ok::<_, BoxError>(vec![0u8; 1024]),
        PoolConfiguration::new()
            .with_name("buffers")
            .with_baseline_size(baseline)
            .with_max_pool_size(max),
    )
    .unwrap()
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = buffers(2, 4);

    {
        let buf = pool.acquire().unwrap();
        println!("   Got buffer of {} bytes", buf.len());
        println!("   Free permits while held: {}", pool.current_available_permits());
        // Buffer automatically returned when dropped
    }

    println!("   Available after return: {}\n", pool.available_count());
}

fn grow_and_shrink() {
    println!("2. Growth and Shrink:");
    let pool = buffers(1, 5);

    {
        let held: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
        println!("   Holding {} buffers, pool size {}", held.len(), pool.current_size());
    }

    let evicted = pool.shrink();
    println!("   Shrink evicted {}, pool size back to {}\n", evicted, pool.current_size());
}

fn try_methods() {
    println!("3. Try Methods:");
    let pool = buffers(1, 1);

    let first = pool.try_acquire();
    assert!(first.is_ok());

    match pool.try_acquire() {
        Ok(_) => println!("   Unexpectedly got a second buffer"),
        Err(PoolError::Exhausted { max_size }) => {
            println!("   Pool exhausted at {} buffers", max_size)
        }
        Err(e) => println!("   Error: {}", e),
    }

    drop(first);
    println!("   After release: {}\n", pool.try_acquire().is_ok());
}

struct Channel {
    id: usize,
}

impl Closeable for Channel {
    fn close(self) -> Result<(), BoxError> {
        println!("   Closing channel {}", self.id);
        Ok(())
    }
}

fn closeable_teardown() {
    println!("4. Closeable Teardown:");
    let next = std::sync::atomic::AtomicUsize::new(0);
    let pool = BoundedPool::new(
        move || {
            Ok::<_, BoxError>(Channel {
                id: next.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            })
        },
        PoolConfiguration::new()
            .with_name("channels")
            .with_baseline_size(3)
            .with_max_pool_size(3)
            .with_closeable_cleanup(),
    )
    .unwrap();

    pool.dispose();
    pool.dispose();
    println!("   Disposed: {}\n", pool.is_disposed());
}

fn metrics() {
    println!("5. Metrics:");
    let pool = buffers(2, 8);

    for _ in 0..5 {
        let _buf = pool.acquire().unwrap();
    }

    let metrics = pool.export_metrics();
    println!("   Acquired: {}", metrics["total_acquired"]);
    println!("   Created: {}", metrics["total_created"]);
    println!("   Utilization: {}", metrics["utilization"]);
}
