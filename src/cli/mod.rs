//! Command-line interface, parsed with clap and dispatched from `run()`.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Datakult - Personal Media Catalog
/// Track films, series, games, books and music in one place
#[derive(Parser)]
#[command(name = "datakult")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server with the backup scheduler
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Export, import and list backup archives
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },

    /// Re-render the stored HTML for every review
    RegenerateReviews,

    /// Set a new password for a user
    ResetPassword {
        /// Username of the account to reset
        username: String,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Write a new backup archive
    Export {
        /// Directory to write the archive to (default: configured backup dir)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Archive file name (default: timestamped)
        #[arg(long)]
        filename: Option<String>,
        /// Rotate after export, keeping only the newest N archives
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Restore a backup archive into the catalog
    Import {
        /// Path to a .tar.gz archive
        file: PathBuf,
        /// Empty all tables before restoring
        #[arg(long)]
        flush: bool,
        /// Restore the database only, skip media files
        #[arg(long)]
        no_media: bool,
    },
    /// List archives in the backup directory
    #[command(alias = "ls")]
    List {
        /// Directory to list (default: configured backup dir)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

pub use commands::*;
