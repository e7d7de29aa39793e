use crate::{
    duration, Check, CheckSpec, ConfigError, Method, Request, RunPlan, RunStats, Stage,
    DEFAULT_THRESHOLD_EXIT_CODE, DEFAULT_TICK, DEFAULT_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Everything needed to run a load test.
///
/// Usually read from a JSON file:
///
/// ```json
/// {
///   "stages": [
///     { "duration": "1s", "target": 100 },
///     { "duration": "5s", "target": 500 },
///     { "duration": "30s", "target": 1000 }
///   ],
///   "target_url": "http://localhost:80/pessoas",
///   "request_method": "POST",
///   "checks": [{ "name": "success login", "kind": "status", "equals": 200 }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub stages: Vec<Stage>,
    pub target_url: String,
    #[serde(default)]
    pub request_method: Method,
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
    /// Pause at the end of every iteration.
    #[serde(default, with = "duration::option")]
    pub sleep: Option<Duration>,
    #[serde(default = "default_tick", with = "duration")]
    pub tick: Duration,
    /// Per-request transport timeout.
    #[serde(default = "default_timeout", with = "duration")]
    pub timeout: Duration,
    /// Upper bound on live virtual users (active plus retiring).
    #[serde(default)]
    pub max_users: Option<usize>,
    /// Global request rate limit shared by every virtual user.
    #[serde(default)]
    pub max_rps: Option<u32>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

fn default_tick() -> Duration {
    DEFAULT_TICK
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl RunConfig {
    pub fn new(target_url: &str, stages: Vec<Stage>) -> Self {
        Self {
            stages,
            target_url: target_url.to_string(),
            request_method: Method::default(),
            payload: None,
            headers: BTreeMap::new(),
            checks: vec![],
            sleep: None,
            tick: DEFAULT_TICK,
            timeout: DEFAULT_TIMEOUT,
            max_users: None,
            max_rps: None,
            thresholds: Thresholds::default(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.request_method = method;
        self
    }

    pub fn payload(mut self, payload: &str) -> Self {
        self.payload = Some(payload.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn check(mut self, check: CheckSpec) -> Self {
        self.checks.push(check);
        self
    }

    pub fn sleep(mut self, sleep: Duration) -> Self {
        self.sleep = Some(sleep);
        self
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_users(mut self, max_users: usize) -> Self {
        self.max_users = Some(max_users);
        self
    }

    pub fn max_rps(mut self, max_rps: u32) -> Self {
        self.max_rps = Some(max_rps);
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Runs every validation, without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.plan()?;
        self.request()?;
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        if self.max_rps == Some(0) {
            return Err(ConfigError::ZeroRps);
        }
        if let Some(rate) = self.thresholds.max_check_failure_rate {
            if !(0. ..=1.).contains(&rate) {
                return Err(ConfigError::InvalidFailureRate(rate));
            }
        }
        Ok(())
    }

    pub fn plan(&self) -> Result<RunPlan, ConfigError> {
        RunPlan::new(self.stages.clone())
    }

    pub fn request(&self) -> Result<Request, ConfigError> {
        let url = Url::parse(&self.target_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.target_url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(ConfigError::UnsupportedScheme(scheme.to_string())),
        }

        let mut request = Request::new(self.request_method, url);
        for (name, value) in &self.headers {
            request = request.with_header(name.as_str(), value.as_str());
        }
        if let Some(payload) = &self.payload {
            request = request.with_body(payload.as_bytes());
        }
        Ok(request)
    }

    pub fn checks(&self) -> Vec<Check> {
        self.checks.iter().map(Check::from).collect()
    }
}

/// Conditions under which a completed run is reported as failed.
///
/// With no limits set a run always exits successfully; individual check failures only matter
/// once `max_check_failure_rate` is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    #[serde(default)]
    pub max_run_errors: Option<u64>,
    #[serde(default)]
    pub max_check_failure_rate: Option<f64>,
    #[serde(default = "default_exit_code")]
    pub exit_code: i32,
}

fn default_exit_code() -> i32 {
    DEFAULT_THRESHOLD_EXIT_CODE
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_run_errors: None,
            max_check_failure_rate: None,
            exit_code: DEFAULT_THRESHOLD_EXIT_CODE,
        }
    }
}

impl Thresholds {
    pub fn breaches(&self, stats: &RunStats) -> Vec<Breach> {
        let mut breaches = vec![];

        if let Some(limit) = self.max_run_errors {
            if stats.run_errors > limit {
                breaches.push(Breach::RunErrors {
                    limit,
                    actual: stats.run_errors,
                });
            }
        }

        if let Some(limit) = self.max_check_failure_rate {
            let actual = stats.check_failure_rate();
            if actual > limit {
                breaches.push(Breach::CheckFailureRate { limit, actual });
            }
        }

        breaches
    }

    /// Process exit status for a run which crossed `breaches`.
    pub fn exit_code(&self, breaches: &[Breach]) -> i32 {
        if breaches.is_empty() {
            0
        } else {
            self.exit_code
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Breach {
    RunErrors { limit: u64, actual: u64 },
    CheckFailureRate { limit: f64, actual: f64 },
}

impl fmt::Display for Breach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breach::RunErrors { limit, actual } => {
                write!(f, "run errors {actual} exceeded limit of {limit}")
            }
            Breach::CheckFailureRate { limit, actual } => write!(
                f,
                "check failure rate {:.2}% exceeded limit of {:.2}%",
                actual * 100.,
                limit * 100.
            ),
        }
    }
}
