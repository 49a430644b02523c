// Process-local counters for cache behaviour, provider health and
// notification outcomes. Cheap atomics, read back through the admin
// metrics endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Distance resolutions slower than this get logged.
const SLOW_RESOLUTION_THRESHOLD_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    distance_cache_hits: AtomicU64,
    distance_cache_misses: AtomicU64,
    distance_provider_failures: AtomicU64,
    distance_resolutions: AtomicU64,
    total_resolution_time_us: AtomicU64,
    slow_resolutions: AtomicU64,
    bookings_created: AtomicU64,
    reminders_sent: AtomicU64,
    emails_failed: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub fn record_cache_hit(&self) {
        self.inner.distance_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.distance_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.inner.distance_provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_booking_created(&self) {
        self.inner.bookings_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reminder_sent(&self) {
        self.inner.reminders_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_email_failure(&self) {
        self.inner.emails_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Cache hit rate over the life of the process (0.0 to 1.0).
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.inner.distance_cache_hits.load(Ordering::Relaxed);
        let misses = self.inner.distance_cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Start timing one distance resolution. Records on drop.
    pub fn start_distance_resolution(&self) -> ResolutionTimer {
        ResolutionTimer {
            start: Instant::now(),
            metrics: self.clone(),
        }
    }

    fn record_resolution(&self, duration: Duration) {
        self.inner.distance_resolutions.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_resolution_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_millis() as u64 > SLOW_RESOLUTION_THRESHOLD_MS {
            self.inner.slow_resolutions.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow distance resolution: {}ms", duration.as_millis());
        }
    }

    pub fn avg_resolution_time_ms(&self) -> f64 {
        let count = self.inner.distance_resolutions.load(Ordering::Relaxed);
        let total_us = self.inner.total_resolution_time_us.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            (total_us as f64 / count as f64) / 1000.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            distance_cache_hit_rate: self.cache_hit_rate(),
            distance_cache_hits: self.inner.distance_cache_hits.load(Ordering::Relaxed),
            distance_cache_misses: self.inner.distance_cache_misses.load(Ordering::Relaxed),
            distance_provider_failures: self.inner.distance_provider_failures.load(Ordering::Relaxed),
            distance_resolutions: self.inner.distance_resolutions.load(Ordering::Relaxed),
            avg_resolution_time_ms: self.avg_resolution_time_ms(),
            slow_resolutions: self.inner.slow_resolutions.load(Ordering::Relaxed),
            bookings_created: self.inner.bookings_created.load(Ordering::Relaxed),
            reminders_sent: self.inner.reminders_sent.load(Ordering::Relaxed),
            emails_failed: self.inner.emails_failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer for one distance resolution; records its duration when dropped.
pub struct ResolutionTimer {
    start: Instant,
    metrics: ServiceMetrics,
}

impl Drop for ResolutionTimer {
    fn drop(&mut self) {
        self.metrics.record_resolution(self.start.elapsed());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub distance_cache_hit_rate: f64,
    pub distance_cache_hits: u64,
    pub distance_cache_misses: u64,
    pub distance_provider_failures: u64,
    pub distance_resolutions: u64,
    pub avg_resolution_time_ms: f64,
    pub slow_resolutions: u64,
    pub bookings_created: u64,
    pub reminders_sent: u64,
    pub emails_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_metrics_report_zeroes() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        assert_eq!(metrics.avg_resolution_time_ms(), 0.0);
    }

    #[test]
    fn cache_hit_rate_reflects_recorded_lookups() {
        let metrics = ServiceMetrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        assert_eq!(metrics.cache_hit_rate(), 2.0 / 3.0);
    }

    #[test]
    fn resolution_timer_records_on_drop() {
        let metrics = ServiceMetrics::new();
        {
            let _timer = metrics.start_distance_resolution();
            thread::sleep(Duration::from_millis(5));
        }
        let summary = metrics.summary();
        assert_eq!(summary.distance_resolutions, 1);
        assert!(summary.avg_resolution_time_ms >= 5.0);
    }
}
