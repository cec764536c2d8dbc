//! # recycle_pool
//!
//! Bounded, thread-safe object pool whose objects reset themselves on
//! return, for Rust, with blocking and async acquisition.
//!
//! ## Features
//!
//! - `min_size`/`max_size` bounds with pre-warming at construction
//! - Automatic return of objects via RAII (Drop trait)
//! - Blocking acquire with timeout when the pool is saturated
//! - Async acquire with timeout and cancellation
//! - Reset-on-return with discard of instances that fail to reset
//! - Wrapper adapter for types that cannot implement [`PooledResource`]
//! - Cleanup failures reported through a hook, never to the caller
//! - Eviction (TTL / idle timeout) and idle trimming
//! - Health monitoring and metrics, Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use recycle_pool::{ObjectPool, PooledResource};
//!
//! struct Connection {
//!     buffered: Vec<u8>,
//! }
//!
//! impl PooledResource for Connection {
//!     fn reset_state(&mut self) -> bool {
//!         self.buffered.clear();
//!         true
//!     }
//! }
//!
//! let pool = ObjectPool::bounded(5, 25, || {
//!     Ok::<_, std::io::Error>(Connection { buffered: Vec::new() })
//! })
//! .unwrap();
//! assert_eq!(pool.idle_count(), 5);
//!
//! {
//!     let mut conn = pool.acquire().unwrap();
//!     conn.buffered.extend_from_slice(b"GET /");
//!     // Reset and returned when `conn` goes out of scope
//! }
//!
//! assert!(pool.acquire().unwrap().buffered.is_empty());
//! ```

mod config;
mod errors;
mod eviction;
mod health;
mod metrics;
mod pool;
mod reservation;
mod resource;

pub use config::{CleanupHook, PoolConfiguration};
pub use errors::{BoxError, CleanupError, PoolError, PoolResult};
pub use eviction::EvictionPolicy;
pub use health::HealthStatus;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::{ObjectPool, PooledObject};
pub use resource::{PooledResource, Wrapped};
