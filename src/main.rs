use anyhow::Result;
use clap::Parser;
use migra::cli::command_context::CommandContext;
use migra::cli::commands::create::{CreateCommand, CreateCommandHandler};
use migra::cli::commands::init::{InitCommand, InitCommandHandler};
use migra::cli::commands::revert::{RevertCommand, RevertCommandHandler};
use migra::cli::commands::run::{RunCommand, RunCommandHandler};
use migra::cli::commands::show::{ShowCommand, ShowCommandHandler};
use migra::cli::commands::verify::{VerifyCommand, VerifyCommandHandler};
use migra::cli::commands::CommandOutcome;
use migra::cli::{Cli, Commands};
use migra::core::config::DatabaseType;
use migra::core::naming::APP_NAME;
use migra::core::verification::LogLevel;
use migra::services::migration_verifier::MigrationVerifier;
use std::env;
use std::process;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

fn main() {
    // sqlx Any ドライバーを登録
    sqlx::any::install_default_drivers();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(log_level(&cli));

    // 非同期ランタイムを作成して実行
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to create Tokio runtime: {}", e);
            process::exit(1);
        }
    };

    match runtime.block_on(run_command(cli)) {
        Ok(outcome) => {
            if !outcome.output.is_empty() {
                println!("{}", outcome.output);
            }
            if !outcome.success {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// ログレベルを決定する（--log-level > --verbose > 既定の warn）
fn log_level(cli: &Cli) -> LogLevel {
    match (cli.log_level, cli.verbose) {
        (Some(level), _) => level,
        (None, true) => LogLevel::Debug,
        (None, false) => LogLevel::Warn,
    }
}

/// トレーシングを初期化する（RUST_LOG が指定されていればそちらも有効）
fn init_tracing(level: LogLevel) {
    let level = match level {
        LogLevel::Silent => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
    };

    let filter = match format!("{}={}", APP_NAME, level).parse::<Directive>() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// コマンドを実行する
async fn run_command(cli: Cli) -> Result<CommandOutcome> {
    // プロジェクトのルートパスを取得
    let project_path = env::current_dir()?;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { db_type, force } => {
            let handler = InitCommandHandler::new();
            let command = InitCommand {
                config_path: CommandContext::resolve_config_path(&project_path, config_path),
                project_path,
                db_type: db_type.parse()?,
                force,
            };
            CommandOutcome::render(&handler.execute(&command)?, &cli.format)
        }

        Commands::Create {
            name,
            timestamp,
            dry_run,
            db_type,
        } => {
            let context = CommandContext::load_optional(project_path.clone(), config_path)?;
            let db_type = match (db_type, &context) {
                (Some(db_type), _) => db_type.parse()?,
                (None, Some(context)) => context.config.database.db_type,
                (None, None) => DatabaseType::Sqlite,
            };
            let migrations_dir = match &context {
                Some(context) => context.migrations_dir(),
                None => project_path.join("migrations"),
            };

            let handler = CreateCommandHandler::new();
            let command = CreateCommand {
                migrations_dir,
                db_type,
                name,
                timestamp,
                dry_run,
            };
            CommandOutcome::render(&handler.execute(&command)?, &cli.format)
        }

        Commands::Run {
            step,
            dry_run,
            transaction,
        } => {
            let context = CommandContext::load(project_path, config_path)?;
            let manager = context.connect().await?;
            let handler = RunCommandHandler::new();
            let command = RunCommand {
                step,
                dry_run,
                transaction,
            };
            CommandOutcome::render(&handler.execute(&manager, &command).await?, &cli.format)
        }

        Commands::Revert {
            step,
            dry_run,
            transaction,
        } => {
            let context = CommandContext::load(project_path, config_path)?;
            let manager = context.connect().await?;
            let handler = RevertCommandHandler::new();
            let command = RevertCommand {
                step,
                dry_run,
                transaction,
            };
            CommandOutcome::render(&handler.execute(&manager, &command).await?, &cli.format)
        }

        Commands::Show => {
            let context = CommandContext::load(project_path, config_path)?;
            let manager = context.connect().await?;
            let handler = ShowCommandHandler::new();
            let command = ShowCommand {
                verbose: cli.verbose,
            };
            CommandOutcome::render(&handler.execute(&manager, &command).await?, &cli.format)
        }

        Commands::Verify {
            auto_run,
            dry_run,
            warn_only,
            max_pending,
            ignore_missing_table,
            seed,
        } => {
            let context = CommandContext::load(project_path, config_path)?;
            let mut base = context.config.verify_options();
            if let Some(level) = cli.log_level {
                base.log_level = level;
            }

            let verifier = MigrationVerifier::new(context.connect().await?);
            let handler = VerifyCommandHandler::new();
            let command = VerifyCommand {
                auto_run,
                dry_run,
                warn_only,
                max_pending,
                ignore_missing_table,
                seed,
            };
            CommandOutcome::render(
                &handler.execute(&verifier, base, &command).await?,
                &cli.format,
            )
        }
    }
}
