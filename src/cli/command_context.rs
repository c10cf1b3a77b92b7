// コマンド共通コンテキスト
//
// 設定ファイル読み込み、環境変数による上書き、パス解決、
// マイグレーションマネージャーの組み立てをCLI層で集約する。

use crate::adapters::database::DatabaseConnectionService;
use crate::core::config::Config;
use crate::services::config_loader::ConfigLoader;
use crate::services::database_config_resolver::{DatabaseConfigResolver, EnvSource, ProcessEnv};
use crate::services::migration_manager::{create_migration_manager, MigrationManager};
use crate::services::migration_source::SqlDirectorySource;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// CLIコマンド共通の実行コンテキスト
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub project_path: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
}

impl CommandContext {
    /// 設定ファイルのパスを解決する（未指定時はプロジェクトルートの既定ファイル）
    pub fn resolve_config_path(project_path: &Path, config_path: Option<&Path>) -> PathBuf {
        match config_path {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => project_path.join(path),
            None => project_path.join(Config::DEFAULT_CONFIG_PATH),
        }
    }

    /// 設定を読み込み、プロセス環境変数で上書きしてコンテキストを作成
    pub fn load(project_path: PathBuf, config_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(project_path, config_path, &ProcessEnv)
    }

    /// 任意の環境変数ソースで上書きしてコンテキストを作成
    pub fn load_with_env(
        project_path: PathBuf,
        config_path: Option<&Path>,
        env: &dyn EnvSource,
    ) -> Result<Self> {
        let config_path = Self::resolve_config_path(&project_path, config_path);
        if !config_path.exists() {
            return Err(anyhow!(
                "Config file not found: {:?}. Please initialize the project first with the `init` command.",
                config_path
            ));
        }

        let config =
            ConfigLoader::from_file(&config_path).with_context(|| "Failed to read config file")?;
        let config = DatabaseConfigResolver::resolve_with(&config, env)?;

        debug!(
            config = %config_path.display(),
            db_type = %config.database.db_type,
            "Loaded configuration"
        );

        Ok(Self {
            project_path,
            config_path,
            config,
        })
    }

    /// 設定ファイルがあれば読み込み、なければ None を返す
    pub fn load_optional(project_path: PathBuf, config_path: Option<&Path>) -> Result<Option<Self>> {
        let resolved = Self::resolve_config_path(&project_path, config_path);
        if !resolved.exists() {
            return Ok(None);
        }
        Self::load(project_path, config_path).map(Some)
    }

    /// マイグレーションディレクトリの絶対パス
    pub fn migrations_dir(&self) -> PathBuf {
        self.project_path.join(&self.config.migrations_dir)
    }

    /// データベースに接続してマイグレーションマネージャーを作成
    pub async fn connect(&self) -> Result<Arc<MigrationManager>> {
        let service = DatabaseConnectionService::new();
        let pool = service
            .create_pool(&self.config.database)
            .await
            .with_context(|| "Failed to connect to database")?;
        service
            .test_connection(&pool)
            .await
            .with_context(|| format!("Cannot reach {} database", self.config.database.db_type))?;

        let source = Arc::new(SqlDirectorySource::new(self.migrations_dir()));
        let manager = create_migration_manager(pool, self.config.database.db_type, source)
            .with_migrations_table(self.config.migrations_table.clone());

        Ok(Arc::new(manager))
    }
}
