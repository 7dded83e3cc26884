//! Atomic request counters for the `/metrics` endpoint.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Process-wide request statistics.
///
/// All counters use relaxed atomic operations: updates are lock-free and the
/// published values are eventually consistent, which is enough for
/// scrape-style monitoring.
#[derive(Default)]
pub struct ServerMetrics {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    protocol_errors: AtomicUsize,
    not_found: AtomicUsize,
    server_errors: AtomicUsize,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request and its end-to-end latency.
    pub fn record_request(&self, latency: Duration) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Count a request rejected with 400 before routing.
    pub fn inc_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a 404 response.
    pub fn inc_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a 500 response (handler fault or I/O failure).
    pub fn inc_server_error(&self) {
        self.server_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn protocol_errors(&self) -> usize {
        self.protocol_errors.load(Ordering::Relaxed)
    }

    pub fn not_found(&self) -> usize {
        self.not_found.load(Ordering::Relaxed)
    }

    pub fn server_errors(&self) -> usize {
        self.server_errors.load(Ordering::Relaxed)
    }

    /// Mean request latency across all recorded requests.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_latency_is_zero_without_requests() {
        let m = ServerMetrics::new();
        assert_eq!(m.average_latency(), Duration::from_nanos(0));
    }

    #[test]
    fn records_requests_and_latency() {
        let m = ServerMetrics::new();
        m.record_request(Duration::from_millis(10));
        m.record_request(Duration::from_millis(20));
        assert_eq!(m.request_count(), 2);
        assert_eq!(m.average_latency(), Duration::from_millis(15));
    }

    #[test]
    fn error_counters_are_independent() {
        let m = ServerMetrics::new();
        m.inc_protocol_error();
        m.inc_not_found();
        m.inc_not_found();
        m.inc_server_error();
        assert_eq!(m.protocol_errors(), 1);
        assert_eq!(m.not_found(), 2);
        assert_eq!(m.server_errors(), 1);
    }
}
