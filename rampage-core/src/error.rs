use thiserror::Error;

/// Problems with a run configuration. Always reported before any stage begins.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Run plan has no stages.")]
    EmptyPlan,

    #[error("Stage {index} has a zero duration.")]
    ZeroDuration { index: usize },

    #[error("Tick interval must be greater than zero.")]
    ZeroTick,

    #[error("Invalid target url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported url scheme `{0}`; expected http or https.")]
    UnsupportedScheme(String),

    #[error("Unknown request method `{0}`.")]
    UnknownMethod(String),

    #[error("Invalid stage `{0}`; expected `<duration>:<target>` such as `5s:500`.")]
    InvalidStage(String),

    #[error("Check failure rate threshold must be within [0, 1], got {0}.")]
    InvalidFailureRate(f64),

    #[error("max_rps must be greater than zero.")]
    ZeroRps,
}

/// A request which never produced a response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out.")]
    Timeout,

    #[error("Transport error: {0}")]
    Other(String),
}

/// Failure to bring up a new virtual user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpawnError {
    #[error("Virtual user limit of {limit} reached.")]
    Exhausted { limit: usize },

    #[error("No async runtime available to spawn virtual users.")]
    NoRuntime,
}
