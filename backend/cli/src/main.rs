mod data_cmd;
mod page_cmd;
mod source;
mod terminal_output;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use stateforge_config::{
    apply_all_defaults, config_dir, config_file_path, load_and_prepare, render_config,
    write_config, StateforgeConfig,
};
use stateforge_logging::init_logger;

#[derive(Parser)]
#[command(name = "stateforge")]
#[command(about = "Drive stateforge load plugins against a simulated data source")]
#[command(version)]
struct Cli {
    /// Config file (defaults to `$STATEFORGE_CONFIG_DIR/config.yaml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overriding the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh a paged user list, then load more until it runs out
    Page {
        /// Number of pages the simulated source serves
        #[arg(long)]
        pages: Option<u32>,
    },
    /// Load a single profile and supersede the load halfway through
    Data,
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config
    Show,
    /// Write a config file with every default filled in
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));
    let config = load_and_prepare(&path).await?;

    let level = cli.log_level.as_deref().unwrap_or(config.log_level());
    init_logger(config.log_dir().map(PathBuf::as_path), level, config.log_json());
    info!(path = %path.display(), "Starting stateforge");

    match cli.command {
        Commands::Page { pages } => page_cmd::run(&config, pages).await?,
        Commands::Data => data_cmd::run(&config).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => print!("{}", render_config(&config)?),
            ConfigAction::Init { force } => {
                if path.exists() && !force {
                    bail!("{} already exists; pass --force to overwrite", path.display());
                }
                write_config(&apply_all_defaults(StateforgeConfig::default()), &path).await?;
                terminal_output::note_success(&format!("Wrote {}", path.display()));
            }
        },
    }

    Ok(())
}
