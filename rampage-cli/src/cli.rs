use anyhow::{anyhow, bail, Context};
use clap::Parser;
use rampage::core::{CheckSpec, Method, RunConfig, Stage};
use std::path::PathBuf;
use std::time::Duration;

/// Ramp virtual users against an HTTP endpoint.
///
/// Flags override the matching fields of the configuration file, e.g.
/// `rampage -u http://localhost:80/pessoas -X POST -s 1s:100 -s 5s:500 --expect-status 200`
#[derive(Parser, Debug)]
#[command(version, about)]
pub(crate) struct RampageCli {
    /// JSON run configuration.
    pub config: Option<PathBuf>,

    /// Target url.
    #[arg(short, long)]
    pub url: Option<String>,

    /// Request method.
    #[arg(short = 'X', long)]
    pub method: Option<Method>,

    /// Ramp stage as `<duration>:<target>`; repeat for each stage.
    #[arg(short, long = "stage")]
    pub stages: Vec<Stage>,

    /// Request body.
    #[arg(short, long)]
    pub data: Option<String>,

    /// Request header as `name: value`; may be repeated.
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Add a check that the response has this status code.
    #[arg(long)]
    pub expect_status: Option<u16>,

    /// Pause at the end of every iteration, e.g. `500ms`.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub sleep: Option<Duration>,

    /// Controller tick interval.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub tick: Option<Duration>,

    #[arg(long)]
    pub max_users: Option<usize>,

    #[arg(long)]
    pub max_rps: Option<u32>,

    /// Fail the run when more than this fraction of checks fail.
    #[arg(long)]
    pub max_check_failure_rate: Option<f64>,

    /// Fail the run when the controller records more errors than this.
    #[arg(long)]
    pub max_run_errors: Option<u64>,

    /// Print the final statistics as JSON.
    #[arg(long)]
    pub json: bool,

    /// Log more (repeat for trace output).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl RampageCli {
    pub fn into_config(self) -> anyhow::Result<RunConfig> {
        let mut config = match (&self.config, &self.url) {
            (Some(path), _) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Unable to read {}", path.display()))?;
                serde_json::from_str::<RunConfig>(&raw)
                    .with_context(|| format!("Invalid configuration in {}", path.display()))?
            }
            (None, Some(url)) => RunConfig::new(url, vec![]),
            (None, None) => bail!("Either a configuration file or --url is required."),
        };

        if let Some(url) = self.url {
            config.target_url = url;
        }
        if !self.stages.is_empty() {
            config.stages = self.stages;
        }
        if let Some(method) = self.method {
            config.request_method = method;
        }
        if let Some(data) = self.data {
            config.payload = Some(data);
        }
        for header in &self.headers {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| anyhow!("Invalid header `{header}`; expected `name: value`."))?;
            config
                .headers
                .insert(name.trim().to_string(), value.trim().to_string());
        }
        if let Some(status) = self.expect_status {
            config
                .checks
                .push(CheckSpec::status(&format!("status is {status}"), status));
        }
        if let Some(sleep) = self.sleep {
            config.sleep = Some(sleep);
        }
        if let Some(tick) = self.tick {
            config.tick = tick;
        }
        if let Some(max_users) = self.max_users {
            config.max_users = Some(max_users);
        }
        if let Some(max_rps) = self.max_rps {
            config.max_rps = Some(max_rps);
        }
        if let Some(rate) = self.max_check_failure_rate {
            config.thresholds.max_check_failure_rate = Some(rate);
        }
        if let Some(limit) = self.max_run_errors {
            config.thresholds.max_run_errors = Some(limit);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampage::core::{CheckKind, ConfigError};

    fn parse(args: &[&str]) -> anyhow::Result<RunConfig> {
        let cli = RampageCli::try_parse_from(std::iter::once("rampage").chain(args.iter().copied()))?;
        cli.into_config()
    }

    fn plan_path() -> String {
        format!("{}/plans/pessoas.json", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn builds_config_from_flags() {
        let config = parse(&[
            "-u",
            "http://localhost:80/pessoas",
            "-X",
            "post",
            "-s",
            "1s:100",
            "-s",
            "5s:500",
            "-H",
            "content-type: application/json",
            "--expect-status",
            "200",
            "--sleep",
            "250ms",
        ])
        .unwrap();

        assert_eq!(config.request_method, Method::Post);
        assert_eq!(
            config.stages,
            vec![
                Stage::new(Duration::from_secs(1), 100),
                Stage::new(Duration::from_secs(5), 500)
            ]
        );
        assert_eq!(config.headers["content-type"], "application/json");
        assert_eq!(config.checks[0].kind, CheckKind::Status { equals: 200 });
        assert_eq!(config.sleep, Some(Duration::from_millis(250)));
    }

    #[test]
    fn bundled_plan_matches_benchmark() {
        let config = parse(&[&plan_path()]).unwrap();
        assert_eq!(config.stages.len(), 3);
        assert_eq!(config.plan().unwrap().total_duration(), Duration::from_secs(36));
        assert_eq!(config.checks[0].name, "success login");
    }

    #[test]
    fn flags_override_file() {
        let path = plan_path();
        let config = parse(&[
            &path,
            "--url",
            "http://127.0.0.1:3002/pessoas",
            "-s",
            "2s:10",
            "--max-check-failure-rate",
            "0.05",
        ])
        .unwrap();

        assert_eq!(config.target_url, "http://127.0.0.1:3002/pessoas");
        assert_eq!(config.stages, vec![Stage::new(Duration::from_secs(2), 10)]);
        assert_eq!(config.thresholds.max_check_failure_rate, Some(0.05));
        assert_eq!(config.request_method, Method::Post);
    }

    #[test]
    fn rejects_incomplete_input() {
        assert!(parse(&[]).is_err());

        let err = parse(&["-u", "http://localhost"]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::EmptyPlan)
        );

        assert!(parse(&["-u", "http://localhost", "-s", "1s:1", "-H", "no-colon"]).is_err());
        assert!(parse(&["-u", "http://localhost", "-s", "soon:1"]).is_err());
    }
}
