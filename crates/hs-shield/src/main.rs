//! HookShield
//!
//! Command line entry point. Initializes the global allocator, loads the
//! configuration, sets up logging and dispatches to the command handlers.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::CheckKind;
use config::ShieldConfig;
use hs_rules::{RuleId, RuleType};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const DEFAULT_CONFIG: &str = "hookshield.toml";

#[derive(Parser)]
#[command(name = "hookshield")]
#[command(about = "Ad SDK neutralization and request block rules")]
struct Cli {
    /// Configuration file (defaults to ./hookshield.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the rule database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage block rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Decide whether a request would be blocked
    Check {
        /// Host (with --kind dns) or URL
        target: String,

        /// Request path the check simulates
        #[arg(short, long, value_enum, default_value = "web")]
        kind: CheckKind,

        /// Shorthand for --kind dns
        #[arg(long)]
        dns: bool,

        /// Print the emitted request events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Run a discovery + install pass against a method inventory
    Install {
        /// JSON method inventory (overrides `inventory` in the config)
        #[arg(short, long)]
        inventory: Option<PathBuf>,

        /// Host package name used in discovery keys
        #[arg(long)]
        host: Option<String>,

        /// Print the install report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List all rules, most recent first
    List {
        #[arg(long)]
        json: bool,
    },

    /// Add a rule
    Add {
        /// Domain, URL or KeyWord
        rule_type: RuleType,
        value: String,
    },

    /// Remove rules by id
    Remove {
        #[arg(required = true)]
        ids: Vec<RuleId>,
    },

    /// Remove every rule
    Clear,

    /// Import a `.rule` file
    Import { file: PathBuf },

    /// Export all rules to a file
    Export { file: PathBuf },

    /// Rules whose type or value contains the text
    Search {
        text: String,
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<ShieldConfig> {
    match path {
        Some(path) => Ok(ShieldConfig::from_toml_file(path)?),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            Ok(ShieldConfig::from_toml_file(Path::new(DEFAULT_CONFIG))?)
        }
        None => Ok(ShieldConfig::default()),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }

    init_logging(&config.log_level);
    info!("HookShield starting");
    debug!("Using rule database {}", config.database.display());

    match cli.command {
        Commands::Rules { action } => match action {
            RulesAction::List { json } => commands::list_rules(&config, json),
            RulesAction::Add { rule_type, value } => commands::add_rule(&config, rule_type, &value).await,
            RulesAction::Remove { ids } => commands::remove_rules(&config, &ids).await,
            RulesAction::Clear => commands::clear_rules(&config).await,
            RulesAction::Import { file } => commands::import_rules(&config, &file).await,
            RulesAction::Export { file } => commands::export_rules(&config, &file).await,
            RulesAction::Search { text, json } => commands::search_rules(&config, &text, json),
        },
        Commands::Check {
            target,
            kind,
            dns,
            json,
        } => {
            let kind = if dns { CheckKind::Dns } else { kind };
            commands::check(&config, &target, kind, json)
        }
        Commands::Install {
            inventory,
            host,
            json,
        } => {
            if let Some(host) = host {
                config.host_package = host;
            }
            commands::install(&config, inventory.as_deref(), json)
        }
    }
}
