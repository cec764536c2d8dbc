//! Health monitoring for object pools

use std::time::Duration;

/// Health status of an object pool
///
/// # Examples
///
/// ```
/// use recycle_pool::ObjectPool;
///
/// let pool = ObjectPool::bounded(3, 10, || Ok::<_, std::io::Error>(Vec::<u32>::new())).unwrap();
///
/// let health = pool.health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_objects, 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current pool utilization (0.0 to 1.0)
    pub utilization: f64,

    /// Idle objects count
    pub idle_objects: usize,

    /// Checked-out objects count
    pub checked_out_objects: usize,

    /// Configured upper bound, if any
    pub max_size: Option<usize>,

    /// Checkouts held longer than the configured lease warning
    pub long_held_leases: usize,

    /// Whether the pool has been disposed
    pub closed: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn new(
        idle: usize,
        checked_out: usize,
        max_size: Option<usize>,
        long_held_leases: usize,
        lease_warning: Option<Duration>,
        closed: bool,
    ) -> Self {
        let utilization = crate::metrics::utilization(checked_out, max_size);

        let mut warnings = Vec::new();
        let mut is_healthy = !closed;

        if closed {
            warnings.push("Pool is disposed".to_string());
        }

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if let Some(max) = max_size
            && idle == 0
            && checked_out >= max
        {
            warnings.push("Pool is saturated".to_string());
        }

        if long_held_leases > 0 {
            let threshold = lease_warning.unwrap_or_default();
            warnings.push(format!(
                "{long_held_leases} object(s) checked out for longer than {threshold:?}"
            ));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            idle_objects: idle,
            checked_out_objects: checked_out,
            max_size,
            long_held_leases,
            closed,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
