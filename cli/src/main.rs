//! Keyward CLI
//!
//! Issues and manages license keys and runs the client activation workflow
//! against a local SQLite database.
//!
//! Usage:
//!   keyward keygen
//!   keyward --vault-key <KEY> --actor <ACCOUNT> app create "My App"
//!   keyward --vault-key <KEY> verify LS-XXXXX-XXXXX-XXXXX-7 <APP_ID>

use anyhow::Result;
use clap::Parser;
use keyward_cli::{Args, Command, Config, Services, execute, keygen};
use std::process::ExitCode;
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let outcome = if matches!(args.command, Command::Keygen) {
        keygen()?
    } else {
        let config = Config::from_args(&args)?;
        let actor = config.actor;
        debug!(database = %config.database.display(), "opening services");
        let services = Services::open(config)?;
        execute(&services, actor, args.command)?
    };

    println!("{}", serde_json::to_string_pretty(&outcome.body)?);
    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
