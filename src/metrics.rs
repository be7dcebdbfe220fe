//! Metrics collection and export for bounded pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "metrics")]
use serde::Serialize;

/// Point-in-time metrics for a pool
///
/// # Examples
///
/// ```
/// use esox_boundedpool::{BoundedPool, PoolConfiguration};
///
/// let pool = BoundedPool::new(
///     || Ok::<_, std::io::Error>(vec![0u8; 64]),
///     PoolConfiguration::new().with_baseline_size(2).with_max_pool_size(4),
/// )
/// .unwrap();
///
/// {
///     let _buf = pool.acquire().unwrap();
///     let metrics = pool.metrics();
///     assert_eq!(metrics.total_acquired, 1);
///     assert_eq!(metrics.checked_out, 1);
///     assert_eq!(metrics.current_size, 2);
/// }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(Serialize))]
pub struct PoolMetrics {
    /// Objects currently in existence
    pub current_size: usize,

    /// Floor restored by shrink cycles
    pub baseline_size: usize,

    /// Hard ceiling
    pub max_size: usize,

    /// Objects idle in the pool
    pub available_objects: usize,

    /// Objects held by callers
    pub checked_out: usize,

    /// Free gate permits
    pub available_permits: usize,

    /// Total successful acquisitions
    pub total_acquired: usize,

    /// Total objects returned to the pool
    pub total_released: usize,

    /// Total objects produced by the factory
    pub total_created: usize,

    /// Total objects removed by shrink, disposal or detach
    pub total_evicted: usize,

    /// Factory invocations that failed
    pub creation_failures: usize,

    /// Acquisitions that failed because the ceiling was reached
    pub exhausted_events: usize,

    /// Completed shrink cycles
    pub shrink_cycles: usize,

    /// Checked out objects relative to the ceiling (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("current_size".to_string(), self.current_size.to_string());
        metrics.insert("baseline_size".to_string(), self.baseline_size.to_string());
        metrics.insert("max_size".to_string(), self.max_size.to_string());
        metrics.insert("available_objects".to_string(), self.available_objects.to_string());
        metrics.insert("checked_out".to_string(), self.checked_out.to_string());
        metrics.insert("available_permits".to_string(), self.available_permits.to_string());
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_evicted".to_string(), self.total_evicted.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("exhausted_events".to_string(), self.exhausted_events.to_string());
        metrics.insert("shrink_cycles".to_string(), self.shrink_cycles.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_boundedpool::{BoundedPool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = BoundedPool::new(|| Ok::<_, std::io::Error>(1u32), PoolConfiguration::new()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("my_pool", Some(&tags));
    /// assert!(output.contains("boundedpool_objects_current"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        let gauges = [
            ("boundedpool_objects_current", "Objects currently in existence", metrics.current_size),
            ("boundedpool_objects_available", "Objects idle in the pool", metrics.available_objects),
            ("boundedpool_objects_checked_out", "Objects held by callers", metrics.checked_out),
            ("boundedpool_permits_available", "Free admission permits", metrics.available_permits),
            ("boundedpool_objects_max", "Maximum pool size", metrics.max_size),
        ];
        for (name, help, value) in gauges {
            Self::push_sample(&mut output, name, help, "gauge", &labels, value.to_string());
        }

        Self::push_sample(
            &mut output,
            "boundedpool_utilization",
            "Pool utilization ratio",
            "gauge",
            &labels,
            format!("{:.2}", metrics.utilization),
        );

        let counters = [
            ("boundedpool_objects_acquired_total", "Total objects acquired", metrics.total_acquired),
            ("boundedpool_objects_released_total", "Total objects released", metrics.total_released),
            ("boundedpool_objects_created_total", "Total objects created", metrics.total_created),
            ("boundedpool_objects_evicted_total", "Total objects evicted", metrics.total_evicted),
            ("boundedpool_creation_failures_total", "Failed object creations", metrics.creation_failures),
            ("boundedpool_events_exhausted_total", "Pool exhausted events", metrics.exhausted_events),
            ("boundedpool_shrink_cycles_total", "Completed shrink cycles", metrics.shrink_cycles),
        ];
        for (name, help, value) in counters {
            Self::push_sample(&mut output, name, help, "counter", &labels, value.to_string());
        }

        output
    }

    fn push_sample(output: &mut String, name: &str, help: &str, kind: &str, labels: &str, value: String) {
        output.push_str(&format!("# HELP {name} {help}\n"));
        output.push_str(&format!("# TYPE {name} {kind}\n"));
        output.push_str(&format!("{name}{{{labels}}} {value}\n"));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_created: AtomicUsize,
    pub total_evicted: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub exhausted_events: AtomicUsize,
    pub shrink_cycles: AtomicUsize,
}

/// Gauges sampled from the live pool when a snapshot is taken
pub(crate) struct Gauges {
    pub current_size: usize,
    pub baseline_size: usize,
    pub max_size: usize,
    pub available_objects: usize,
    pub available_permits: usize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, gauges: Gauges) -> PoolMetrics {
        let checked_out = gauges.max_size.saturating_sub(gauges.available_permits);
        let utilization = if gauges.max_size > 0 {
            checked_out as f64 / gauges.max_size as f64
        } else {
            0.0
        };

        PoolMetrics {
            current_size: gauges.current_size,
            baseline_size: gauges.baseline_size,
            max_size: gauges.max_size,
            available_objects: gauges.available_objects,
            checked_out,
            available_permits: gauges.available_permits,
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            exhausted_events: self.exhausted_events.load(Ordering::Relaxed),
            shrink_cycles: self.shrink_cycles.load(Ordering::Relaxed),
            utilization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauges() -> Gauges {
        Gauges {
            current_size: 6,
            baseline_size: 2,
            max_size: 8,
            available_objects: 4,
            available_permits: 6,
        }
    }

    #[test]
    fn snapshot_derives_checked_out_from_permits() {
        let tracker = MetricsTracker::new();
        MetricsTracker::increment(&tracker.total_acquired);
        MetricsTracker::increment(&tracker.total_acquired);

        let metrics = tracker.snapshot(gauges());
        assert_eq!(metrics.checked_out, 2);
        assert_eq!(metrics.total_acquired, 2);
        assert!((metrics.utilization - 0.25).abs() < f64::EPSILON);
        assert_eq!(metrics.export()["utilization"], "0.25");
    }

    #[test]
    fn prometheus_labels_are_sorted() {
        let metrics = MetricsTracker::new().snapshot(gauges());
        let mut tags = HashMap::new();
        tags.insert("zone".to_string(), "b".to_string());
        tags.insert("app".to_string(), "a".to_string());

        let output = MetricsExporter::export_prometheus(&metrics, "conns", Some(&tags));
        assert!(output.contains("boundedpool_objects_current{pool=\"conns\",app=\"a\",zone=\"b\"} 6\n"));
        assert!(output.contains("# TYPE boundedpool_shrink_cycles_total counter\n"));
    }
}
