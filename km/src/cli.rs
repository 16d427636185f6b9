//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_USER: &str = "local";

/// KitchenMaster - conversational kitchen design assistant
#[derive(Parser)]
#[command(
    name = "km",
    about = "Conversational kitchen design assistant",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/kitchenmaster/logs/kitchenmaster.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start an interactive design session
    Chat {
        #[arg(short, long, default_value = DEFAULT_USER)]
        user: String,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Directory for generated images
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Send a single message and print the reply
    Send {
        message: String,

        #[arg(short, long, default_value = DEFAULT_USER)]
        user: String,

        #[arg(long)]
        conversation: Option<String>,

        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// List conversations, newest first
    Conversations {
        #[arg(short, long, default_value = DEFAULT_USER)]
        user: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the messages of a conversation
    History {
        id: String,

        #[arg(short, long, default_value = DEFAULT_USER)]
        user: String,
    },

    /// List the design iterations of a conversation
    Designs {
        id: String,

        #[arg(short, long, default_value = DEFAULT_USER)]
        user: String,

        /// Only the newest version
        #[arg(long)]
        latest: bool,
    },

    /// Delete a conversation
    Delete {
        id: String,

        #[arg(short, long, default_value = DEFAULT_USER)]
        user: String,
    },

    /// Print the technical specification for a layout (offline)
    Specs {
        /// Available linear meters
        #[arg(short, long)]
        meters: f64,

        /// Layout shape (lineal, L, U, G, paralela)
        #[arg(short, long, default_value = "lineal")]
        shape: String,

        /// Budget tier (bajo, medio, alto, premium)
        #[arg(short, long)]
        budget: Option<String>,

        #[arg(long)]
        cabinets: Option<String>,

        #[arg(long)]
        countertop: Option<String>,

        #[arg(long)]
        backsplash: Option<String>,
    },
}
