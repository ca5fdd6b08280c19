//! `unipkg`: extract and scan Unity `.unitypackage` archives.

mod commands;

use clap::{Parser, Subcommand};
use commands::extract::ExtractCommand;
use commands::scan::ScanCommand;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use unipkg_config::Config;

#[derive(Parser)]
#[command(
    name = "unipkg",
    version,
    about = "Extract and scan Unity .unitypackage archives",
    after_help = "EXAMPLES:\n  \
                  unipkg extract Downloads/Props.unitypackage Projects/Props\n  \
                  unipkg extract --organize --max-asset-count 5000 Props.unitypackage\n  \
                  unipkg scan *.unitypackage\n\n\
                  Settings are read from unipkg.toml in the user configuration directory,\n\
                  then from UNIPKG_* environment variables (UNIPKG_EXTRACT__ORGANIZE_BY_CATEGORY=true)."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (TOML, YAML or JSON) to use instead of the default
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Extract a package into a directory
    Extract(ExtractCommand),

    /// Check packages for malicious scripts
    Scan(ScanCommand),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = ?err, "Failed to load configuration");
            return ExitCode::FAILURE;
        },
    };

    match cli.command {
        Command::Extract(command) => command.execute(&config).await,
        Command::Scan(command) => command.execute(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["unipkg", "scan", "a.unitypackage", "-v", "--config", "x.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Command::Scan(_)));
    }
}
