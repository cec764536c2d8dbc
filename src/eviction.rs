//! Eviction policies for automatic removal of idle instances

use std::time::{Duration, Instant};

/// Eviction policy for idle pool entries
///
/// Expired entries are released instead of handed out by `acquire`, and are
/// removed by [`ObjectPool::trim_idle`](crate::ObjectPool::trim_idle).
///
/// # Examples
///
/// ```
/// use recycle_pool::{EvictionPolicy, PoolConfiguration};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_ttl(Duration::from_secs(3600));
///
/// assert_eq!(config.eviction_policy(), EvictionPolicy::TimeToLive(Duration::from_secs(3600)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// No eviction
    #[default]
    None,

    /// Time-to-live: instances expire a fixed duration after creation
    TimeToLive(Duration),

    /// Idle timeout: instances expire after sitting idle
    IdleTimeout(Duration),

    /// Combined: TTL or idle timeout
    Combined {
        ttl: Duration,
        idle_timeout: Duration,
    },
}

impl EvictionPolicy {
    pub fn is_none(&self) -> bool {
        matches!(self, EvictionPolicy::None)
    }
}

/// Timestamps carried with every instance the pool owns
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lifetime {
    pub created_at: Instant,
    pub last_used: Instant,
}

impl Lifetime {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            created_at: now,
            last_used: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub fn is_expired(&self, policy: &EvictionPolicy) -> bool {
        self.is_expired_at(policy, Instant::now())
    }

    pub fn is_expired_at(&self, policy: &EvictionPolicy, now: Instant) -> bool {
        let age = now.saturating_duration_since(self.created_at);
        let idle = now.saturating_duration_since(self.last_used);
        match policy {
            EvictionPolicy::None => false,
            EvictionPolicy::TimeToLive(ttl) => age > *ttl,
            EvictionPolicy::IdleTimeout(timeout) => idle > *timeout,
            EvictionPolicy::Combined { ttl, idle_timeout } => age > *ttl || idle > *idle_timeout,
        }
    }
}
