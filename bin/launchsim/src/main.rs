//! # Launchsim
//!
//! Launchsim checks requests of a chain launch before they are approved. `launchsim` is a binary
//! crate for a command line application running the verifications against a ledger snapshot.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod verify;
use verify::Verify;

mod check_param;
use check_param::CheckParam;

mod common;

#[derive(Debug, Parser)]
#[clap(about, version)]
struct Cli {
    #[clap(subcommand)]
    command: Subcommands,
}

#[derive(Debug, Subcommand)]
enum Subcommands {
    /// Verify that a batch of requests yields a genesis the chain boots from.
    Verify(Verify),
    /// Check a single param change against the default genesis of the chain.
    CheckParam(CheckParam),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,launchsim=trace,launchsim_core=trace");
    }
    env_logger::init();

    match cli.command {
        Subcommands::Verify(cmd) => cmd.run().await,
        Subcommands::CheckParam(cmd) => cmd.run().await,
    }
}
