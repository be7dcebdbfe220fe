// EsoxSolutions.BoundedPool - Rust Port
// Bounded, thread-safe object pool with async support

// This is just a binary wrapper - the actual library is in lib.rs
// Run examples with: cargo run --example basic

use esox_boundedpool::{BoundedPool, PoolConfiguration};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== EsoxSolutions.BoundedPool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    println!("Quick Demo:");
    let pool = BoundedPool::new(
        || Ok::<_, std::io::Error>(String::with_capacity(256)),
        PoolConfiguration::new()
            .with_name("demo")
            .with_baseline_size(2)
            .with_max_pool_size(4),
    )?;

    {
        let first = pool.acquire()?;
        let second = pool.acquire()?;
        let third = pool.acquire()?;
        println!("  Checked out: {} buffers of {}", pool.checked_out(), pool.max_size());
        println!("  Pool size grew to: {}", pool.current_size());
        drop((first, second, third));
    }

    let evicted = pool.shrink();
    println!("  Shrink evicted {} idle buffers, size now {}", evicted, pool.current_size());

    pool.dispose();
    println!("  Disposed: {}", pool.is_disposed());
    Ok(())
}
