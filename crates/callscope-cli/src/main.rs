//! Callscope CLI
//!
//! Builds call trees from extracted graph facts, scores call paths for
//! intent and risk, and moves the graph in and out of Neo4j.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

use commands::Cli;

/// Initialize tracing.
///
/// When stdout carries machine-readable output (JSON, or a script written to
/// stdout), logs go to stderr with ANSI disabled so they cannot corrupt it.
fn init_tracing(verbose: bool, machine_output: bool) {
    let default_filter = if verbose {
        "callscope=debug,callscope_core=debug,callscope_graph=debug"
    } else {
        "callscope=info,callscope_core=info,callscope_graph=info"
    };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter.into());

    if machine_output {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.machine_output());
    cli.execute().await
}
