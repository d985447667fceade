//! Command-line entry point for event-loadtest.
//!
//! Every setting comes from the environment (see `event-loadtest --help`).
//! Configuration errors exit with status 1 before any traffic is generated;
//! a run stopped by `DURATION` or a signal exits with status 0.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use event_loadtest::observability::init_tracing;
use event_loadtest::run::{run as run_loadtest, spawn_shutdown_handler};
use event_loadtest::Args;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        println!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    init_tracing();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) =>
        {
            e.exit()
        }
        Err(e) => return Err(e).context("Invalid configuration"),
    };
    let settings = args.build().context("Invalid configuration")?;

    let cancel = CancellationToken::new();
    spawn_shutdown_handler(cancel.clone());

    let report = run_loadtest(settings, cancel).await?;
    println!("{}", report.summary());
    Ok(())
}
