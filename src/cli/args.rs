//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// vault-cache - inspect and maintain persisted decrypted-record caches
///
/// Operates directly on the file state store; no key material is needed.
#[derive(Parser, Debug)]
#[command(name = "vault-cache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "VAULT_CACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// State directory (overrides the configured one)
    #[arg(long, global = true, env = "VAULT_CACHE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect or reset persisted cache cells
    State(StateArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the state command
#[derive(Parser, Debug)]
pub struct StateArgs {
    #[command(subcommand)]
    pub action: StateAction,
}

/// State subcommands
#[derive(Subcommand, Debug)]
pub enum StateAction {
    /// Show status and contents of a cache
    Show {
        #[command(flatten)]
        slot: SlotArgs,

        /// Print the raw persisted value as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reset a cache to null / cleared
    Clear {
        #[command(flatten)]
        slot: SlotArgs,
    },
}

/// Which cache cells to address
#[derive(Parser, Debug, Clone)]
pub struct SlotArgs {
    /// Storage area
    #[arg(short, long)]
    pub area: String,

    /// Cache name within the area
    #[arg(short, long)]
    pub name: String,

    /// Owning user id
    #[arg(short, long)]
    pub user: String,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
