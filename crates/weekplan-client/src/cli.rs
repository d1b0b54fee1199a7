//! Command-line interface definition.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// weekplan - Who is free this week, from a CalDAV server
#[derive(Debug, Parser)]
#[command(name = "weekplan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "WEEKPLAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    // --- Connection flags (override config.toml) ---
    /// CalDAV server URL; `https://` is assumed when no scheme is given
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Account name
    #[arg(long, short, global = true)]
    pub username: Option<String>,

    /// Account password
    #[arg(long, env = "WEEKPLAN_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Accept any TLS certificate (self-signed test servers only)
    #[arg(long, global = true)]
    pub trust_all_certificates: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List users (principals) known to the server
    Users {
        /// Only users whose display name contains this text
        #[arg(long, short)]
        search: Option<String>,
    },

    /// List calendars
    Calendars {
        /// Include the calendars of every user, not only your own
        #[arg(long, short)]
        all: bool,
    },

    /// Show the weekly availability grid
    Week {
        /// Principal href of a user to include (can be repeated)
        #[arg(long = "user", required = true, action = clap::ArgAction::Append)]
        users: Vec<String>,

        /// Any date in the week to show (defaults to the current week)
        #[arg(long)]
        week: Option<NaiveDate>,

        /// Output the schedule rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
