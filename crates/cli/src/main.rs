//! tokenrelay - authenticated calls against a token-protected API

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod commands;
mod context;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use commands::Commands;
use context::ClientContext;
use tokenrelay_infra::{init_tracing, LogFormat, DEFAULT_LOG_LEVEL};
use tracing::debug;

#[derive(Parser)]
#[command(name = "tokenrelay")]
#[command(about = "Authenticated HTTP calls with token refresh and re-login")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON or TOML); environment and probed files
    /// otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Password for login, or for an up-front login before a call
    #[arg(long, global = true, env = "TOKENRELAY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Filter used when RUST_LOG is unset
    #[arg(short = 'l', long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Missing .env is the normal case
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.log_format, &cli.log_level) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }
    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "Loaded .env");
    }

    let result = match ClientContext::load(cli.config) {
        Ok(context) => cli.command.execute(&context, cli.password).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
