//! `rampage` command line runner.
use anyhow::Context;
use clap::Parser;
use rampage::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;

use cli::RampageCli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = RampageCli::parse();
    init_tracing(args.verbose)?;

    let json = args.json;
    let config = args.into_config()?;
    let client = ReqwestClient::new(config.timeout).context("Unable to build HTTP client")?;
    let test = LoadTest::new(config, client)?;

    let handle = test.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; waiting for in-flight requests.");
            handle.stop();
        }
    });

    let report = test.await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.stats)?);
    } else {
        print!("{}", report.stats);
    }

    for breach in &report.breaches {
        error!("{breach}");
    }
    info!("Exiting with status {}.", report.exit_code);

    std::process::exit(report.exit_code)
}

fn init_tracing(verbose: u8) -> anyhow::Result<()> {
    let default = match verbose {
        0 => "rampage=info",
        1 => "rampage=debug",
        _ => "rampage=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
