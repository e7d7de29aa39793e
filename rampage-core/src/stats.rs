use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Point-in-time copy of everything the stats aggregator has counted.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RunStats {
    pub requests: u64,
    pub iterations: u64,
    pub transport_errors: u64,
    pub checks_passed: u64,
    pub checks_failed: u64,
    /// Controller-level failures, e.g. virtual users which could not be spawned.
    pub run_errors: u64,
    pub checks: Vec<CheckStats>,
    pub latency: LatencyStats,
    pub elapsed: Duration,
    pub peak_users: usize,
}

impl RunStats {
    pub fn checks_total(&self) -> u64 {
        self.checks_passed + self.checks_failed
    }

    /// Fraction of failed checks, 0 when no check ran.
    pub fn check_failure_rate(&self) -> f64 {
        match self.checks_total() {
            0 => 0.,
            total => self.checks_failed as f64 / total as f64,
        }
    }

    pub fn requests_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0. {
            self.requests as f64 / secs
        } else {
            0.
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CheckStats {
    pub name: String,
    pub passed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub min: Duration,
    pub mean: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min={:?}, mean={:?}, p50={:?}, p90={:?}, p95={:?}, p99={:?}, max={:?}",
            self.min, self.mean, self.p50, self.p90, self.p95, self.p99, self.max,
        )
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "requests={} ({:.2}/s), iterations={}, transport_errors={}, run_errors={}, peak_users={}, elapsed={:?}",
            self.requests,
            self.requests_per_sec(),
            self.iterations,
            self.transport_errors,
            self.run_errors,
            self.peak_users,
            self.elapsed,
        )?;
        writeln!(f, "latency: {}", self.latency)?;
        for check in &self.checks {
            let total = check.passed + check.failed;
            let pct = if total > 0 {
                check.passed as f64 / total as f64 * 100.
            } else {
                0.
            };
            writeln!(
                f,
                "check `{}`: {:.2}% ({} passed, {} failed)",
                check.name, pct, check.passed, check.failed
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_rate_handles_empty_runs() {
        let stats = RunStats::default();
        assert_eq!(stats.check_failure_rate(), 0.);
        assert_eq!(stats.requests_per_sec(), 0.);

        let stats = RunStats {
            requests: 10,
            checks_passed: 3,
            checks_failed: 1,
            elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(stats.check_failure_rate(), 0.25);
        assert_eq!(stats.requests_per_sec(), 5.);
    }
}
