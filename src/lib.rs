//! # EsoxSolutions.BoundedPool (Rust Port)
//!
//! Bounded, thread-safe object pool for expensive-to-create objects such as
//! connections, channels and buffers.
//!
//! ## Features
//!
//! - Hard ceiling on live objects enforced by a counting admission gate
//! - Eager creation up to a baseline size, lazy growth up to the ceiling
//! - Blocking and async acquisition built on the same core
//! - Automatic return of objects via RAII (Drop trait)
//! - Periodic shrink-back to the baseline with per-object cleanup
//! - Idempotent teardown
//! - Metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_boundedpool::{BoundedPool, PoolConfiguration};
//!
//! let pool = BoundedPool::new(
//!     || Ok::<_, std::io::Error>(vec![0u8; 4096]),
//!     PoolConfiguration::new().with_baseline_size(2).with_max_pool_size(8),
//! )
//! .unwrap();
//!
//! {
//!     let buf = pool.acquire().unwrap();
//!     println!("Got a buffer of {} bytes", buf.len());
//!     // Buffer automatically returned when `buf` goes out of scope
//! }
//! ```

mod cleanup;
mod config;
mod errors;
mod metrics;
mod pool;
mod shrink;

pub use cleanup::Closeable;
pub use config::{MIN_SHRINK_INTERVAL, PoolConfiguration};
pub use errors::{BoxError, PoolError, PoolResult};
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{BoundedPool, PooledObject};
