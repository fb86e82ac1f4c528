mod config;
mod debug_dump;
mod discord;
mod dispatch;
mod format;
mod logging;
mod message;
mod notifier;
mod thread_store;
mod transcript;
mod types;

use clap::error::ErrorKind;
use clap::Parser;
use config::Config;
use notifier::{NotifyError, Outcome};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;

const ENV_FILE_VAR: &str = "CLAUDE_DISCORD_ENV_FILE";

/// Claude Code hook that posts events read from stdin to Discord.
///
/// Always exits 0 so a notification problem never blocks the session.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Env file with DISCORD_* settings [default: ~/.claude/hooks/.env.discord]
    #[arg(long, env = ENV_FILE_VAR)]
    env_file: Option<PathBuf>,

    /// Print the formatted Discord message as JSON instead of sending it
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Settings used when the command line can't be parsed.
    fn fallback() -> Self {
        Self {
            env_file: std::env::var_os(ENV_FILE_VAR).map(PathBuf::from),
            dry_run: false,
        }
    }
}

fn main() -> ExitCode {
    let (cli, arg_error) = match Cli::try_parse() {
        Ok(cli) => (cli, None),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => (Cli::fallback(), Some(e.to_string())),
    };

    let (config, config_errors) = Config::load(cli.env_file.as_deref());
    if config.debug {
        // Logging is best-effort; there is nowhere to report its failure.
        let _ = logging::init(&config.log_dir());
    }
    if let Some(e) = arg_error {
        tracing::warn!(error = %logging::sanitize(&e), "ignoring invalid arguments");
    }
    for e in &config_errors {
        tracing::warn!(error = %logging::sanitize(&e.to_string()), "config problem");
    }

    panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %logging::sanitize(&info.to_string()), "notifier panicked");
    }));

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        notifier::run(&config, io::stdin().lock(), cli.dry_run)
    }));

    match result {
        Ok(Ok(Outcome::DryRun(message))) => match serde_json::to_string_pretty(&message) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!(error = %e, "serializing dry-run message"),
        },
        Ok(Ok(Outcome::Filtered)) => tracing::debug!("event filtered"),
        Ok(Ok(Outcome::Delivered(_))) => {}
        Ok(Err(NotifyError::Delivery(e))) => {
            tracing::warn!(kind = %e.kind(), error = %logging::sanitize(&e.to_string()), "delivery failed");
        }
        Ok(Err(e)) => tracing::warn!(error = %logging::sanitize(&e.to_string()), "hook input rejected"),
        Err(_) => {}
    }
    ExitCode::SUCCESS
}
