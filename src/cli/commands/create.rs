// createコマンドハンドラー
//
// タイムスタンプ付きのマイグレーション雛形を生成し、
// マイグレーションディレクトリに書き出します。DB接続は不要です。

use crate::adapters::dialect::create_dialect;
use crate::cli::commands::CommandOutput;
use crate::core::config::DatabaseType;
use crate::core::migration::CreateMigrationOptions;
use crate::services::migration_manager::generate_migration;
use crate::services::migration_template::TemplateKind;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// createコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct CreateCommand {
    /// 書き出し先のマイグレーションディレクトリ
    pub migrations_dir: PathBuf,
    /// データベース種別（タイムスタンプ生成に使用）
    pub db_type: DatabaseType,
    /// マイグレーション名
    pub name: String,
    /// 明示的なタイムスタンプ
    pub timestamp: Option<String>,
    /// ファイルを書き出さない
    pub dry_run: bool,
}

/// createコマンドの出力
#[derive(Debug, Clone, Serialize)]
pub struct CreateOutput {
    pub file_name: String,
    pub path: PathBuf,
    pub timestamp: String,
    pub dry_run: bool,
    pub contents: String,
}

impl CommandOutput for CreateOutput {
    fn to_text(&self) -> String {
        if self.dry_run {
            format!(
                "{} Would create {}\n\n{}",
                "[DRY RUN]".yellow(),
                self.path.display(),
                self.contents
            )
        } else {
            format!("{} Created {}", "✓".green(), self.path.display())
        }
    }
}

/// createコマンドハンドラー
#[derive(Debug, Clone)]
pub struct CreateCommandHandler {}

impl CreateCommandHandler {
    /// 新しいCreateCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// createコマンドを実行
    ///
    /// # Arguments
    ///
    /// * `command` - createコマンドのパラメータ
    ///
    /// # Returns
    ///
    /// 生成したファイルの情報（dry-run時は内容のみ）
    pub fn execute(&self, command: &CreateCommand) -> Result<CreateOutput> {
        let dialect = create_dialect(command.db_type);
        let options = CreateMigrationOptions {
            name: command.name.clone(),
            timestamp: command.timestamp.clone(),
            dry_run: command.dry_run,
        };
        let generated = generate_migration(dialect.as_ref(), TemplateKind::Sql, &options)?;
        let path = command.migrations_dir.join(&generated.file_name);

        if !command.dry_run {
            if path.exists() {
                return Err(anyhow!("Migration file already exists: {:?}", path));
            }

            fs::create_dir_all(&command.migrations_dir).with_context(|| {
                format!(
                    "Failed to create migrations directory: {:?}",
                    command.migrations_dir
                )
            })?;
            fs::write(&path, &generated.contents)
                .with_context(|| format!("Failed to write migration file: {:?}", path))?;
        }

        Ok(CreateOutput {
            file_name: generated.file_name,
            path,
            timestamp: generated.timestamp,
            dry_run: generated.dry_run,
            contents: generated.contents,
        })
    }
}

impl Default for CreateCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}
