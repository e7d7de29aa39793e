use std::time::Duration;

/// Interval at which the ramp controller recomputes the desired number of virtual users.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Per-request transport timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit code reported when a threshold is crossed.
pub const DEFAULT_THRESHOLD_EXIT_CODE: i32 = 99;

/// How often the controller logs a progress line.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
