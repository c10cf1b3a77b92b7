// initコマンドハンドラー
//
// プロジェクトの初期化処理を実装します。
// - マイグレーションディレクトリの作成（migrations/）
// - デフォルト設定ファイルの生成（.migra.yaml）
// - 初期化済みプロジェクトの検出

use crate::cli::commands::CommandOutput;
use crate::core::config::{Config, DatabaseType};
use crate::services::config_serializer::ConfigSerializer;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// initコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct InitCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// 書き出す設定ファイルのパス
    pub config_path: PathBuf,
    /// データベース種別
    pub db_type: DatabaseType,
    /// 強制的に初期化（既存の設定を上書き）
    pub force: bool,
}

/// initコマンドの出力
#[derive(Debug, Clone, Serialize)]
pub struct InitOutput {
    pub config_path: PathBuf,
    pub migrations_dir: PathBuf,
    pub db_type: DatabaseType,
}

impl CommandOutput for InitOutput {
    fn to_text(&self) -> String {
        format!(
            "{} Project initialized ({})\n  Config:     {}\n  Migrations: {}",
            "✓".green(),
            self.db_type,
            self.config_path.display(),
            self.migrations_dir.display()
        )
    }
}

/// initコマンドハンドラー
#[derive(Debug, Clone)]
pub struct InitCommandHandler {}

impl InitCommandHandler {
    /// 新しいInitCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// initコマンドを実行
    ///
    /// # Arguments
    ///
    /// * `command` - initコマンドのパラメータ
    ///
    /// # Returns
    ///
    /// 作成した設定ファイルとディレクトリ
    pub fn execute(&self, command: &InitCommand) -> Result<InitOutput> {
        if command.config_path.exists() && !command.force {
            return Err(anyhow!(
                "Project is already initialized. Use --force option to force re-initialization."
            ));
        }

        let config = Config::new_default(command.db_type);
        let migrations_dir = command.project_path.join(&config.migrations_dir);

        self.create_directory_structure(&migrations_dir)?;
        self.write_config_file(&command.config_path, &config)?;

        Ok(InitOutput {
            config_path: command.config_path.clone(),
            migrations_dir,
            db_type: command.db_type,
        })
    }

    /// マイグレーションディレクトリを作成
    pub fn create_directory_structure(&self, migrations_dir: &Path) -> Result<()> {
        fs::create_dir_all(migrations_dir).with_context(|| {
            format!(
                "Failed to create migrations directory: {:?}",
                migrations_dir
            )
        })
    }

    /// 設定ファイルを書き出す
    fn write_config_file(&self, config_path: &Path, config: &Config) -> Result<()> {
        let yaml = ConfigSerializer::to_yaml(config)?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        fs::write(config_path, yaml)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))
    }
}

impl Default for InitCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}
