// CLI Layer
// ユーザー入力の受付とコマンドルーティング

pub mod command_context;
pub mod commands;

use crate::core::naming::BINARY_NAME;
use crate::core::verification::LogLevel;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// 出力フォーマット
#[derive(Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// Structured JSON output
    Json,
}

/// migra - Database Schema Migration CLI
///
/// Versioned, timestamped schema migrations for SQLite and PostgreSQL.
#[derive(Parser, Debug)]
#[command(name = BINARY_NAME)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Database schema migration CLI tool")]
#[command(long_about = "migra - Database Schema Migration CLI

Versioned, timestamped schema migrations for SQLite and PostgreSQL.

migra helps you:
  • Create timestamped migration files with up/down sections
  • Run pending migrations in order, each in its own transaction
  • Revert the most recently executed migrations
  • Inspect which migrations are executed and which are pending
  • Verify migration state at deploy time, optionally remediating it

Supported databases: PostgreSQL, SQLite")]
#[command(propagate_version = true)]
#[command(after_help = "GETTING STARTED:
  1. Initialize a new project:     migra init --db-type sqlite
  2. Create a migration:           migra create --name \"create users\"
  3. Edit the generated file:      migrations/<timestamp>_create_users.sql
  4. Run pending migrations:       migra run
  5. Check migration status:       migra show

For detailed help on each command, use: migra <command> --help")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Log level (silent, error, warn, info, debug)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new migration project
    ///
    /// Creates the migrations directory and a default .migra.yaml.
    ///
    /// EXAMPLES:
    ///   # Initialize with SQLite
    ///   migra init --db-type sqlite
    ///
    ///   # Initialize with PostgreSQL, overwriting an existing config
    ///   migra init --db-type postgres --force
    Init {
        /// Database type (sqlite, postgres)
        #[arg(long, value_name = "TYPE", default_value = "sqlite")]
        db_type: String,

        /// Force initialization even if config exists
        #[arg(short, long)]
        force: bool,
    },

    /// Create a new timestamped migration file
    ///
    /// EXAMPLES:
    ///   # Create a migration
    ///   migra create --name "create users"
    ///
    ///   # Use an explicit timestamp
    ///   migra create --name "create users" --timestamp 20240101000000
    ///
    ///   # Print the template without writing a file
    ///   migra create --name "create users" --dry-run
    Create {
        /// Migration name (spaces become underscores in the file name)
        #[arg(short, long, value_name = "NAME")]
        name: String,

        /// Explicit timestamp (YYYYMMDDHHMMSS)
        #[arg(long, value_name = "TIMESTAMP")]
        timestamp: Option<String>,

        /// Print the template without writing a file
        #[arg(long)]
        dry_run: bool,

        /// Database type used when no config file exists (sqlite, postgres)
        #[arg(long, value_name = "TYPE")]
        db_type: Option<String>,
    },

    /// Run pending migrations in ascending timestamp order
    ///
    /// EXAMPLES:
    ///   # Run all pending migrations
    ///   migra run
    ///
    ///   # Run only the next two
    ///   migra run --step 2
    ///
    ///   # Continue past failures without transactions
    ///   migra run --transaction false
    Run {
        /// Maximum number of migrations to run
        #[arg(long, value_name = "N")]
        step: Option<usize>,

        /// Report what would run without executing
        #[arg(long)]
        dry_run: bool,

        /// Run each migration in its own transaction and stop at the first failure
        #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
        transaction: bool,
    },

    /// Revert executed migrations, newest first
    ///
    /// EXAMPLES:
    ///   # Revert the last migration
    ///   migra revert
    ///
    ///   # Revert the last three
    ///   migra revert --step 3
    Revert {
        /// Number of migrations to revert (default: 1)
        #[arg(long, value_name = "N")]
        step: Option<usize>,

        /// Report what would be reverted without executing
        #[arg(long)]
        dry_run: bool,

        /// Revert each migration in its own transaction and stop at the first failure
        #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
        transaction: bool,
    },

    /// Show executed and pending migrations
    Show,

    /// Verify migration state as a deploy-time health check
    ///
    /// Options default to the `verification` section of the config file.
    /// Exits with status 1 when verification fails.
    ///
    /// EXAMPLES:
    ///   # Check only
    ///   migra verify
    ///
    ///   # Run pending migrations if any
    ///   migra verify --auto-run
    Verify {
        /// Run pending migrations
        #[arg(long)]
        auto_run: bool,

        /// Run pending migrations in dry-run mode
        #[arg(long)]
        dry_run: bool,

        /// Do not fail on pending migrations
        #[arg(long)]
        warn_only: bool,

        /// Maximum number of pending migrations tolerated
        #[arg(long, value_name = "N")]
        max_pending: Option<usize>,

        /// Succeed without creating the migrations table when it is missing
        #[arg(long)]
        ignore_missing_table: bool,

        /// Evaluate the seed step
        #[arg(long)]
        seed: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["migra", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                step,
                dry_run,
                transaction,
            } => {
                assert_eq!(step, None);
                assert!(!dry_run);
                assert!(transaction);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_revert_without_transaction() {
        let cli =
            Cli::try_parse_from(["migra", "revert", "--step", "2", "--transaction", "false"])
                .unwrap();
        match cli.command {
            Commands::Revert {
                step, transaction, ..
            } => {
                assert_eq!(step, Some(2));
                assert!(!transaction);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "migra",
            "show",
            "--format",
            "json",
            "--log-level",
            "debug",
            "--no-color",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert!(cli.no_color);
    }

    #[test]
    fn test_parse_create_requires_name() {
        assert!(Cli::try_parse_from(["migra", "create"]).is_err());

        let cli = Cli::try_parse_from(["migra", "create", "--name", "create users", "--dry-run"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Create { dry_run: true, .. }));
    }
}
