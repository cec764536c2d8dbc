//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use recycle_pool::ObjectPool;
///
/// let pool = ObjectPool::bounded(2, 4, || Ok::<_, std::io::Error>(Vec::<u8>::new())).unwrap();
///
/// {
///     let _buf = pool.acquire().unwrap();
///     let metrics = pool.metrics();
///     assert_eq!(metrics.total_acquired, 1);
///     assert_eq!(metrics.checked_out, 1);
///     assert_eq!(metrics.idle, 1);
/// }
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Instances produced by the factory
    pub total_created: usize,

    /// Instances released and dropped by the pool
    pub total_destroyed: usize,

    /// Successful acquisitions
    pub total_acquired: usize,

    /// Instances put back into the idle set
    pub total_returned: usize,

    /// Returns whose reset reported the instance unusable
    pub reset_failures: usize,

    /// Swallowed reset/release failures
    pub cleanup_errors: usize,

    /// Factory failures
    pub creation_failures: usize,

    /// Acquisitions that had to wait on a saturated pool
    pub saturation_waits: usize,

    /// Acquisitions that gave up waiting
    pub timeouts: usize,

    /// Current checked-out instances
    pub checked_out: usize,

    /// Current idle instances
    pub idle: usize,

    /// Checked-out share of `max_size` (0.0 to 1.0, 0.0 when unbounded)
    pub utilization: f64,

    /// Configured upper bound, if any
    pub max_size: Option<usize>,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("reset_failures".to_string(), self.reset_failures.to_string());
        metrics.insert("cleanup_errors".to_string(), self.cleanup_errors.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("saturation_waits".to_string(), self.saturation_waits.to_string());
        metrics.insert("timeouts".to_string(), self.timeouts.to_string());
        metrics.insert("checked_out".to_string(), self.checked_out.to_string());
        metrics.insert("idle".to_string(), self.idle.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert(
            "max_size".to_string(),
            self.max_size.map_or_else(|| "unbounded".to_string(), |m| m.to_string()),
        );
        metrics
    }
}

pub(crate) fn utilization(checked_out: usize, max_size: Option<usize>) -> f64 {
    match max_size {
        Some(max) if max > 0 => checked_out as f64 / max as f64,
        _ => 0.0,
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use recycle_pool::ObjectPool;
    /// use std::collections::HashMap;
    ///
    /// let pool = ObjectPool::bounded(1, 3, || Ok::<_, std::io::Error>(String::new())).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("objectpool_objects_idle"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> crate::PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let registry = Registry::new();
        let export = |err: prometheus::Error| crate::PoolError::MetricsExport(err.to_string());

        let gauges = [
            ("objectpool_objects_checked_out", "Current checked-out objects", metrics.checked_out),
            ("objectpool_objects_idle", "Current idle objects", metrics.idle),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help)).map_err(export)?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge)).map_err(export)?;
        }

        let utilization =
            Gauge::with_opts(opts("objectpool_utilization", "Pool utilization ratio")).map_err(export)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(export)?;

        let counters = [
            ("objectpool_objects_created_total", "Objects created by the factory", metrics.total_created),
            ("objectpool_objects_destroyed_total", "Objects released by the pool", metrics.total_destroyed),
            ("objectpool_objects_acquired_total", "Successful acquisitions", metrics.total_acquired),
            ("objectpool_objects_returned_total", "Objects returned to the idle set", metrics.total_returned),
            ("objectpool_reset_failures_total", "Objects discarded after a failed reset", metrics.reset_failures),
            ("objectpool_cleanup_errors_total", "Swallowed reset/release failures", metrics.cleanup_errors),
            ("objectpool_creation_failures_total", "Factory failures", metrics.creation_failures),
            ("objectpool_saturation_waits_total", "Acquisitions that waited on a saturated pool", metrics.saturation_waits),
            ("objectpool_timeouts_total", "Acquisitions that timed out", metrics.timeouts),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help)).map_err(export)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(export)?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(export)?;
        String::from_utf8(buffer).map_err(|err| crate::PoolError::MetricsExport(err.to_string()))
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub total_acquired: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub reset_failures: AtomicUsize,
    pub cleanup_errors: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub saturation_waits: AtomicUsize,
    pub timeouts: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, checked_out: usize, idle: usize, max_size: Option<usize>) -> PoolMetrics {
        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            reset_failures: self.reset_failures.load(Ordering::Relaxed),
            cleanup_errors: self.cleanup_errors.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            saturation_waits: self.saturation_waits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            checked_out,
            idle,
            utilization: utilization(checked_out, max_size),
            max_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reads_counters() {
        let tracker = MetricsTracker::new();
        MetricsTracker::bump(&tracker.total_created);
        MetricsTracker::bump(&tracker.total_created);
        MetricsTracker::bump(&tracker.timeouts);

        let metrics = tracker.get_metrics(3, 1, Some(4));
        assert_eq!(metrics.total_created, 2);
        assert_eq!(metrics.timeouts, 1);
        assert!((metrics.utilization - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn unbounded_utilization_is_zero() {
        assert_eq!(utilization(10, None), 0.0);
    }

    #[test]
    fn export_map_formats_values() {
        let metrics = MetricsTracker::new().get_metrics(1, 2, None);
        let map = metrics.export();
        assert_eq!(map["idle"], "2");
        assert_eq!(map["max_size"], "unbounded");
        assert_eq!(map["utilization"], "0.00");
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn prometheus_export_contains_labels() {
        let metrics = MetricsTracker::new().get_metrics(2, 1, Some(4));
        let output = MetricsExporter::export_prometheus(&metrics, "conns", None).unwrap();
        assert!(output.contains("objectpool_objects_checked_out{pool=\"conns\"} 2"));
        assert!(output.contains("# TYPE objectpool_timeouts_total counter"));
    }
}
