#![warn(clippy::all)]

use clap::Parser;

use crate::helpers::result::CaptureErr;
use crate::opts::{Opts, Subcommand};
use crate::prelude::*;

mod database;
mod helpers;
mod opts;
mod plan;
mod prelude;
mod provision;
mod seed;
mod verify;

#[tokio::main]
async fn main() -> Result {
    let opts = Opts::parse();
    let _sentry_guard = helpers::tracing::init(&opts.tracing)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting…");

    run_subcommand(opts.subcommand).await.capture_err()
}

async fn run_subcommand(subcommand: Subcommand) -> Result {
    let start_instant = Instant::now();
    let result = match subcommand {
        Subcommand::Provision(opts) => provision::run(opts).await,
        Subcommand::Verify(opts) => verify::run(opts).await,
    };
    info!(elapsed = format_elapsed(start_instant).as_str(), "finished");
    result
}
