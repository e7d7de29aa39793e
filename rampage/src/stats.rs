use metrics_util::AtomicBucket;
use pdatastructs::tdigest::{TDigest, K1};
use rampage_core::{CheckResult, CheckStats, LatencyStats, RunStats};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Shared counters for a single run.
///
/// Every `record_*` method is a handful of relaxed atomic operations. Latency samples are
/// buffered in a lock-free bucket and only folded into the t-digest when a snapshot is taken, so
/// the digest's lock is never touched by virtual users.
pub(crate) struct StatsAggregator {
    requests: AtomicU64,
    iterations: AtomicU64,
    transport_errors: AtomicU64,
    checks_passed: AtomicU64,
    checks_failed: AtomicU64,
    run_errors: AtomicU64,
    peak_users: AtomicUsize,
    checks: Vec<CheckCounter>,
    latency: Latency,
}

struct CheckCounter {
    name: String,
    passed: AtomicU64,
    failed: AtomicU64,
}

impl StatsAggregator {
    /// `check_names` must be in the order checks are evaluated.
    pub fn new<'a>(check_names: impl IntoIterator<Item = &'a str>) -> Self {
        #[cfg(feature = "metrics")]
        describe_metrics();

        Self {
            requests: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            checks_passed: AtomicU64::new(0),
            checks_failed: AtomicU64::new(0),
            run_errors: AtomicU64::new(0),
            peak_users: AtomicUsize::new(0),
            checks: check_names
                .into_iter()
                .map(|name| CheckCounter {
                    name: name.to_string(),
                    passed: AtomicU64::new(0),
                    failed: AtomicU64::new(0),
                })
                .collect(),
            latency: Latency::new(),
        }
    }

    /// A request which received a response after `latency`.
    pub fn record_request(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.latency.record(latency);

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("rampage_requests").increment(1);
            metrics::histogram!("rampage_latency").record(latency.as_secs_f64());
        }
    }

    /// A request which never received a response.
    pub fn record_transport_error(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.transport_errors.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("rampage_requests").increment(1);
            metrics::counter!("rampage_transport_errors").increment(1);
        }
    }

    pub fn record_checks(&self, results: &[CheckResult]) {
        debug_assert_eq!(results.len(), self.checks.len());

        let mut passed = 0;
        let mut failed = 0;
        for (counter, result) in self.checks.iter().zip(results) {
            if result.passed {
                counter.passed.fetch_add(1, Ordering::Relaxed);
                passed += 1;
            } else {
                counter.failed.fetch_add(1, Ordering::Relaxed);
                failed += 1;
            }
        }

        self.checks_passed.fetch_add(passed, Ordering::Relaxed);
        self.checks_failed.fetch_add(failed, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("rampage_checks_passed").increment(passed);
            metrics::counter!("rampage_checks_failed").increment(failed);
        }
    }

    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_error(&self) {
        self.run_errors.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        metrics::counter!("rampage_run_errors").increment(1);
    }

    pub fn observe_users(&self, active: usize) {
        self.peak_users.fetch_max(active, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        metrics::gauge!("rampage_users").set(active as f64);
    }

    pub fn snapshot(&self, elapsed: Duration) -> RunStats {
        RunStats {
            requests: self.requests.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            checks_passed: self.checks_passed.load(Ordering::Relaxed),
            checks_failed: self.checks_failed.load(Ordering::Relaxed),
            run_errors: self.run_errors.load(Ordering::Relaxed),
            checks: self
                .checks
                .iter()
                .map(|c| CheckStats {
                    name: c.name.clone(),
                    passed: c.passed.load(Ordering::Relaxed),
                    failed: c.failed.load(Ordering::Relaxed),
                })
                .collect(),
            latency: self.latency.summary(),
            elapsed,
            peak_users: self.peak_users.load(Ordering::Relaxed),
        }
    }
}

struct Latency {
    pending: AtomicBucket<Duration>,
    count: AtomicU64,
    sum_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
    digest: Mutex<TDigest<K1>>,
}

impl Latency {
    fn new() -> Self {
        Self {
            pending: AtomicBucket::new(),
            count: AtomicU64::new(0),
            sum_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
            digest: Mutex::new(default_tdigest()),
        }
    }

    fn record(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.pending.push(latency);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    fn summary(&self) -> LatencyStats {
        let mut digest = self.digest.lock().unwrap_or_else(PoisonError::into_inner);
        self.pending.clear_with(|durs| {
            for dur in durs {
                digest.insert(dur.as_secs_f64());
            }
        });

        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return LatencyStats::default();
        }

        LatencyStats {
            count,
            min: Duration::from_nanos(self.min_nanos.load(Ordering::Relaxed)),
            mean: Duration::from_nanos(self.sum_nanos.load(Ordering::Relaxed) / count),
            max: Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed)),
            p50: quantile(&digest, 0.5),
            p90: quantile(&digest, 0.9),
            p95: quantile(&digest, 0.95),
            p99: quantile(&digest, 0.99),
        }
    }
}

fn quantile(digest: &TDigest<K1>, q: f64) -> Duration {
    let secs = digest.quantile(q);

    // NOTE: TDigest returns NaN when it holds no samples yet.
    if secs.is_finite() && secs >= 0. {
        Duration::from_secs_f64(secs)
    } else {
        trace!("Non-finite latency quantile for q={q}.");
        Duration::ZERO
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

#[cfg(feature = "metrics")]
fn describe_metrics() {
    metrics::describe_counter!("rampage_requests", "Requests sent by virtual users");
    metrics::describe_counter!("rampage_checks_passed", "Checks which passed");
    metrics::describe_counter!("rampage_checks_failed", "Checks which failed");
    metrics::describe_counter!(
        "rampage_transport_errors",
        "Requests which never received a response"
    );
    metrics::describe_counter!("rampage_run_errors", "Controller-level errors");
    metrics::describe_gauge!("rampage_users", "Active virtual users");
    metrics::describe_histogram!(
        "rampage_latency",
        metrics::Unit::Seconds,
        "Request latency"
    );
}
