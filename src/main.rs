use std::process::ExitCode;

use clap::Parser;
use hindsight::adapter::inbound::cli::command::Cli;
use hindsight::adapter::inbound::cli::{execute, output};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
