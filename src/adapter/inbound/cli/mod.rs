//! CLI module graph and dispatch.

pub mod command;
pub mod evaluate;
pub mod health;
pub mod insight;
pub mod learn;
pub mod output;
pub mod run;

use std::path::Path;

use self::command::{Cli, Commands, DEFAULT_CONFIG};
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Load the explicit config file, else `hindsight.toml` when present,
/// else built-in defaults. Environment overrides apply in every case.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation.
#[allow(clippy::result_large_err)]
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(DEFAULT_CONFIG),
        None => {
            let mut config = Config::default();
            config.apply_env(|key| std::env::var(key).ok())?;
            config.validate()?;
            Ok(config)
        }
    }
}

/// Run the parsed command.
///
/// # Errors
///
/// Returns the command's failure; the caller maps it to the exit code.
pub async fn execute(cli: Cli) -> Result<()> {
    output::configure(output::OutputConfig::new(cli.json, cli.quiet));
    let config = load_config(cli.config.as_deref())?;
    config.init_logging();

    match cli.command {
        Commands::Run => run::execute(config).await,
        Commands::Evaluate(args) => evaluate::execute(config, &args).await,
        Commands::Learn(args) => learn::execute(config, &args).await,
        Commands::Insight(args) => insight::execute(config, &args).await,
        Commands::Health => health::execute(config).await,
    }
}
