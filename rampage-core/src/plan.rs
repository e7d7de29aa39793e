use crate::{duration, ConfigError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// A time-boxed ramp target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "duration")]
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// Parses the CLI shorthand `<duration>:<target>`, e.g. `30s:1000`.
impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dur, target) = s
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::InvalidStage(s.to_string()))?;
        let duration = humantime::parse_duration(dur.trim())
            .map_err(|_| ConfigError::InvalidStage(s.to_string()))?;
        let target = target
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidStage(s.to_string()))?;
        Ok(Self { duration, target })
    }
}

/// Where a run should be at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampPoint {
    pub stage: usize,
    pub concurrency: usize,
}

/// An ordered, validated sequence of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    stages: Vec<Stage>,
    total: Duration,
}

impl RunPlan {
    pub fn new(stages: Vec<Stage>) -> Result<Self, ConfigError> {
        if stages.is_empty() {
            return Err(ConfigError::EmptyPlan);
        }

        if let Some(index) = stages.iter().position(|s| s.duration.is_zero()) {
            return Err(ConfigError::ZeroDuration { index });
        }

        let total = stages.iter().map(|s| s.duration).sum();
        Ok(Self { stages, total })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }

    pub fn max_concurrency(&self) -> usize {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    /// Linearly interpolated concurrency at `elapsed` since the start of the run.
    ///
    /// Each stage ramps from the previous stage's target (0 for the first stage) to its own
    /// target. Returns `None` once the plan is exhausted.
    pub fn point_at(&self, elapsed: Duration) -> Option<RampPoint> {
        if elapsed > self.total {
            return None;
        }

        let mut from = 0;
        let mut stage_start = Duration::ZERO;
        for (stage, Stage { duration, target }) in self.stages.iter().enumerate() {
            let stage_end = stage_start + *duration;
            let last = stage + 1 == self.stages.len();
            if elapsed < stage_end || last {
                let progress = (elapsed - stage_start).as_secs_f64() / duration.as_secs_f64();
                let progress = progress.clamp(0., 1.);
                let concurrency = from as f64 + (*target as f64 - from as f64) * progress;
                return Some(RampPoint {
                    stage,
                    concurrency: concurrency.round() as usize,
                });
            }
            from = *target;
            stage_start = stage_end;
        }

        None
    }
}
