// SPDX-License-Identifier: AGPL-3.0-or-later
//! File Warden CLI
//!
//! A sandboxed file manager: every operation is confined to one workspace
//! directory, with automatic backups before destructive changes.

mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about = "File Warden - sandboxed workspace file manager", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root directory; all paths are confined to it.
    /// Defaults to the config file's root, or the current directory.
    #[arg(short, long, global = true)]
    workspace: Option<String>,

    /// Configuration file (TOML); defaults built in when absent
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit results as JSON envelopes instead of human output
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List directory contents
    #[command(alias = "dir")]
    Ls {
        /// Path to list, relative to the workspace root
        #[arg(default_value = "/")]
        path: String,

        /// Long format with details
        #[arg(short, long)]
        long: bool,

        /// Show all files including hidden
        #[arg(short, long)]
        all: bool,

        /// Glob or substring filter on entry names
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Display file contents
    Cat {
        /// File to display
        path: String,
    },

    /// Write stdin to a file
    Write {
        /// Destination file
        path: String,

        /// Overwrite an existing file (the old content is backed up)
        #[arg(short, long)]
        force: bool,
    },

    /// Copy files or directories
    Cp {
        /// Source path
        source: String,

        /// Destination path
        dest: String,

        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Move or rename files
    Mv {
        /// Source path
        source: String,

        /// Destination path
        dest: String,

        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Remove files or directories (backed up first)
    Rm {
        /// Path(s) to remove
        #[arg(required = true)]
        paths: Vec<String>,

        /// Recursive removal for directories
        #[arg(short, long)]
        recursive: bool,

        /// Confirm the removal; nothing is deleted without this
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Create directories
    Mkdir {
        /// Directory path(s) to create
        #[arg(required = true)]
        paths: Vec<String>,

        /// Create parent directories as needed
        #[arg(short, long)]
        parents: bool,
    },

    /// Show file or directory information
    #[command(alias = "stat")]
    Info {
        /// Path to inspect
        path: String,

        /// Compute content checksums
        #[arg(short = 'C', long)]
        checksums: bool,
    },

    /// Search for files by name and optionally content
    Find {
        /// Pattern: glob for names, substring or regex for content
        pattern: String,

        /// Directory to search under
        #[arg(default_value = "/")]
        path: String,

        /// Also match file contents
        #[arg(short, long)]
        content: bool,

        /// Case-sensitive matching
        #[arg(short = 's', long)]
        case_sensitive: bool,

        /// Treat the pattern as a regular expression
        #[arg(short = 'e', long)]
        regex: bool,

        /// Stop after this many matches
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },

    /// Manage backups of deleted and overwritten files
    Backups {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Show or change engine configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Watch a subtree and print change events
    Watch {
        /// Path to watch
        #[arg(default_value = "/")]
        path: String,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// List stored backups, newest first
    List,

    /// Restore a backup to its original path
    Restore {
        /// Backup id as shown by `backups list`
        id: String,
    },

    /// Remove backups past the retention policy
    Prune,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the active configuration
    Get,

    /// Set one configuration key, e.g. `backup.enabled false`
    Set {
        key: String,
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = commands::Context {
        workspace: cli.workspace,
        config: cli.config,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Ls { path, long, all, filter } => {
            commands::ls(&ctx, &path, long, all, filter).await
        }
        Commands::Cat { path } => commands::cat(&ctx, &path).await,
        Commands::Write { path, force } => commands::write(&ctx, &path, force).await,
        Commands::Cp { source, dest, force } => commands::cp(&ctx, &source, &dest, force).await,
        Commands::Mv { source, dest, force } => commands::mv(&ctx, &source, &dest, force).await,
        Commands::Rm { paths, recursive, yes } => {
            commands::rm(&ctx, &paths, recursive, yes).await
        }
        Commands::Mkdir { paths, parents } => commands::mkdir(&ctx, &paths, parents).await,
        Commands::Info { path, checksums } => commands::info(&ctx, &path, checksums).await,
        Commands::Find {
            pattern,
            path,
            content,
            case_sensitive,
            regex,
            max_results,
        } => {
            commands::find(&ctx, &pattern, &path, content, case_sensitive, regex, max_results)
                .await
        }
        Commands::Backups { action } => match action {
            BackupAction::List => commands::backups_list(&ctx).await,
            BackupAction::Restore { id } => commands::backups_restore(&ctx, &id).await,
            BackupAction::Prune => commands::backups_prune(&ctx).await,
        },
        Commands::Config { action } => match action {
            ConfigAction::Get => commands::config_get(&ctx).await,
            ConfigAction::Set { key, value } => commands::config_set(&ctx, &key, &value).await,
        },
        Commands::Watch { path } => commands::watch(&ctx, &path).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
