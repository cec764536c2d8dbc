//! Pool configuration options

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{CleanupError, PoolError, PoolResult};
use crate::eviction::EvictionPolicy;

/// Callback receiving every cleanup failure the pool swallows.
pub type CleanupHook = Arc<dyn Fn(&CleanupError) + Send + Sync>;

/// Configuration for object pool behavior
///
/// # Examples
///
/// ```
/// use recycle_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_min_size(5)
///     .with_max_size(25)
///     .with_acquire_timeout(Duration::from_secs(2))
///     .with_idle_timeout(Duration::from_secs(300));
///
/// assert_eq!(config.min_size, 5);
/// assert_eq!(config.max_size, Some(25));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct PoolConfiguration {
    /// Instances created up front and kept through idle trimming
    pub min_size: usize,

    /// Upper bound on idle plus checked-out instances, `None` for unbounded
    pub max_size: Option<usize>,

    /// How long a saturated `acquire` waits, `None` to wait indefinitely
    pub acquire_timeout: Option<Duration>,

    /// Soft cap on idle instances; returns beyond it are released
    pub max_idle: Option<usize>,

    /// Time-to-live for instances (eviction policy)
    pub time_to_live: Option<Duration>,

    /// Idle timeout for instances (eviction policy)
    pub idle_timeout: Option<Duration>,

    /// Checkouts held longer than this are reported by health checks
    pub lease_warning: Option<Duration>,

    /// Observer for swallowed reset/release failures
    pub on_cleanup_error: Option<CleanupHook>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: Some(100),
            acquire_timeout: None,
            max_idle: None,
            time_to_live: None,
            idle_timeout: None,
            lease_warning: None,
            on_cleanup_error: None,
        }
    }
}

impl fmt::Debug for PoolConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("max_idle", &self.max_idle)
            .field("time_to_live", &self.time_to_live)
            .field("idle_timeout", &self.idle_timeout)
            .field("lease_warning", &self.lease_warning)
            .field("on_cleanup_error", &self.on_cleanup_error.is_some())
            .finish()
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of instances to pre-warm and keep
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Set the maximum number of live instances
    ///
    /// # Examples
    ///
    /// ```
    /// use recycle_pool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_max_size(50);
    /// assert_eq!(config.max_size, Some(50));
    /// ```
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = Some(size);
        self
    }

    /// Remove the upper bound on live instances
    pub fn unbounded(mut self) -> Self {
        self.max_size = None;
        self
    }

    /// Set how long a saturated acquire waits before failing
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Cap the number of idle instances retained on return
    pub fn with_max_idle(mut self, count: usize) -> Self {
        self.max_idle = Some(count);
        self
    }

    /// Set time-to-live for instances
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Set idle timeout for instances
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Warn about checkouts held longer than `threshold`
    pub fn with_lease_warning(mut self, threshold: Duration) -> Self {
        self.lease_warning = Some(threshold);
        self
    }

    /// Observe cleanup failures
    ///
    /// # Examples
    ///
    /// ```
    /// use recycle_pool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_cleanup_hook(|err| eprintln!("pool cleanup failed: {err}"));
    ///
    /// assert!(config.on_cleanup_error.is_some());
    /// ```
    pub fn with_cleanup_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CleanupError) + Send + Sync + 'static,
    {
        self.on_cleanup_error = Some(Arc::new(hook));
        self
    }

    /// Eviction policy implied by the TTL and idle timeout settings
    pub fn eviction_policy(&self) -> EvictionPolicy {
        match (self.time_to_live, self.idle_timeout) {
            (Some(ttl), Some(idle_timeout)) => EvictionPolicy::Combined { ttl, idle_timeout },
            (Some(ttl), None) => EvictionPolicy::TimeToLive(ttl),
            (None, Some(idle)) => EvictionPolicy::IdleTimeout(idle),
            (None, None) => EvictionPolicy::None,
        }
    }

    /// Check the size bounds for consistency
    pub fn validate(&self) -> PoolResult<()> {
        if let Some(max) = self.max_size {
            if max == 0 {
                return Err(PoolError::InvalidConfiguration(
                    "max_size must be greater than 0".to_string(),
                ));
            }
            if self.min_size > max {
                return Err(PoolError::InvalidConfiguration(format!(
                    "min_size ({}) must not exceed max_size ({})",
                    self.min_size, max
                )));
            }
        }
        if let Some(max_idle) = self.max_idle
            && max_idle < self.min_size
        {
            return Err(PoolError::InvalidConfiguration(format!(
                "max_idle ({}) must not be below min_size ({})",
                max_idle, self.min_size
            )));
        }
        Ok(())
    }
}
