// 設定ファイル管理
//
// プロジェクトの設定ファイル（YAML形式）の構造と検証を定義します。
// データベース接続、マイグレーションディレクトリ、起動時検証ポリシー、
// シード設定を一つのファイルで管理します。

use crate::core::error::DatabaseError;
use crate::core::verification::{LogLevel, SeedConfig, SeedOptions, VerifyOptions};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// データベース種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    #[serde(rename = "sqlite")]
    Sqlite,
    #[serde(rename = "postgres", alias = "postgresql")]
    Postgres,
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::Sqlite => write!(f, "sqlite"),
            DatabaseType::Postgres => write!(f, "postgres"),
        }
    }
}

impl FromStr for DatabaseType {
    type Err = DatabaseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(DatabaseType::Postgres),
            _ => Err(DatabaseError::UnsupportedDatabaseType {
                value: value.to_string(),
            }),
        }
    }
}

impl DatabaseType {
    /// デフォルトポート（SQLiteはファイルベースのため不要）
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DatabaseType::Postgres => Some(5432),
            DatabaseType::Sqlite => None,
        }
    }
}

/// プロジェクト設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 設定ファイルのバージョン
    pub version: String,

    /// データベース接続設定
    pub database: DatabaseConfig,

    /// マイグレーションディレクトリ
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,

    /// マイグレーション履歴テーブル名
    #[serde(default = "default_migrations_table")]
    pub migrations_table: String,

    /// 起動時検証ポリシー
    #[serde(default)]
    pub verification: VerificationConfig,

    /// シード設定
    #[serde(default)]
    pub seed: SeedSettings,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_migrations_table() -> String {
    "migrations".to_string()
}

impl Config {
    /// デフォルトの設定ファイルパス
    pub const DEFAULT_CONFIG_PATH: &'static str = crate::core::naming::CONFIG_FILE;

    /// 指定したデータベース種別の初期設定を作成
    pub fn new_default(db_type: DatabaseType) -> Self {
        let database = match db_type {
            DatabaseType::Sqlite => "migra.db".to_string(),
            DatabaseType::Postgres => "migra_db".to_string(),
        };

        Self {
            version: "1.0".to_string(),
            database: DatabaseConfig {
                db_type,
                url: None,
                host: default_host(),
                port: db_type.default_port(),
                database,
                user: None,
                password: None,
                timeout: None,
            },
            migrations_dir: default_migrations_dir(),
            migrations_table: default_migrations_table(),
            verification: VerificationConfig::default(),
            seed: SeedSettings::default(),
        }
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(anyhow!("Config file version is not specified"));
        }

        if self.migrations_table.trim().is_empty() {
            return Err(anyhow!("migrations_table must not be empty"));
        }

        self.database
            .validate()
            .with_context(|| "Invalid database configuration")
    }

    /// 検証ポリシーとシード設定から VerifyOptions を組み立てる
    pub fn verify_options(&self) -> VerifyOptions {
        let verification = &self.verification;
        VerifyOptions {
            auto_run: verification.auto_run,
            dry_run: verification.dry_run,
            warn_only: verification.warn_only,
            max_pending_migrations: verification.max_pending_migrations,
            ignore_missing_migrations_table: verification.ignore_missing_migrations_table,
            log_level: verification.log_level,
            seed: SeedOptions {
                auto_run: self.seed.auto_run,
                config: self.seed.to_seed_config(),
            },
        }
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        serde_saphyr::from_str(yaml).with_context(|| "Failed to parse config file")
    }
}

/// データベース接続設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// データベース種別
    #[serde(rename = "type")]
    pub db_type: DatabaseType,

    /// 接続URL（指定時は個別項目より優先）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// ホスト名（SQLiteの場合は不要）
    #[serde(default = "default_host")]
    pub host: String,

    /// ポート番号（未指定時は種別のデフォルト）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// データベース名（SQLiteの場合はファイルパス）
    #[serde(default)]
    pub database: String,

    /// ユーザー名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// パスワード
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// 接続タイムアウト（秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

fn default_host() -> String {
    "localhost".to_string()
}

impl DatabaseConfig {
    /// Validate database configuration
    pub fn validate(&self) -> Result<()> {
        if self.url.is_none() && self.database.is_empty() {
            return Err(anyhow!("Database name is not specified"));
        }

        Ok(())
    }

    /// ポート番号を解決（未指定時は種別のデフォルト）
    pub fn resolved_port(&self) -> u16 {
        self.port
            .or_else(|| self.db_type.default_port())
            .unwrap_or(0)
    }
}

/// 起動時検証ポリシー
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub auto_run: bool,
    pub dry_run: bool,
    pub warn_only: bool,
    pub max_pending_migrations: usize,
    pub ignore_missing_migrations_table: bool,
    pub log_level: LogLevel,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        let options = VerifyOptions::default();
        Self {
            auto_run: options.auto_run,
            dry_run: options.dry_run,
            warn_only: options.warn_only,
            max_pending_migrations: options.max_pending_migrations,
            ignore_missing_migrations_table: options.ignore_missing_migrations_table,
            log_level: options.log_level,
        }
    }
}

/// シード設定（設定ファイル上の表現）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedSettings {
    pub auto_run: bool,
    pub force: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_password: Option<String>,
}

impl SeedSettings {
    /// シードステップへ渡す SeedConfig に変換
    pub fn to_seed_config(&self) -> SeedConfig {
        SeedConfig {
            master_email: self.master_email.clone(),
            master_name: self.master_name.clone(),
            master_password: self.master_password.clone(),
            force: self.force,
            dry_run: self.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_display() {
        assert_eq!(DatabaseType::Sqlite.to_string(), "sqlite");
        assert_eq!(DatabaseType::Postgres.to_string(), "postgres");
    }

    #[test]
    fn test_database_type_from_str() {
        assert_eq!("sqlite".parse::<DatabaseType>().unwrap(), DatabaseType::Sqlite);
        assert_eq!(
            "PostgreSQL".parse::<DatabaseType>().unwrap(),
            DatabaseType::Postgres
        );
        assert_eq!("postgres".parse::<DatabaseType>().unwrap(), DatabaseType::Postgres);

        let err = "mysql".parse::<DatabaseType>().unwrap_err();
        assert!(err.to_string().contains("mysql"));
    }

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
version: "1.0"
database:
  type: sqlite
  database: app.db
"#;
        let config: Config = yaml.parse().unwrap();

        assert_eq!(config.database.db_type, DatabaseType::Sqlite);
        assert_eq!(config.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(config.migrations_table, "migrations");
        assert_eq!(config.verification.max_pending_migrations, 10);
        assert!(!config.verification.auto_run);
        assert!(!config.seed.auto_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
version: "1.0"
database:
  type: postgresql
  host: db.internal
  port: 6543
  database: retreats
  user: app
  password: secret
migrations_dir: db/migrations
migrations_table: schema_history
verification:
  auto_run: true
  warn_only: true
  max_pending_migrations: 3
  log_level: debug
seed:
  auto_run: true
  master_email: admin@example.com
  master_name: Admin
"#;
        let config: Config = yaml.parse().unwrap();

        assert_eq!(config.database.db_type, DatabaseType::Postgres);
        assert_eq!(config.database.resolved_port(), 6543);
        assert_eq!(config.migrations_table, "schema_history");

        let options = config.verify_options();
        assert!(options.auto_run);
        assert!(options.warn_only);
        assert_eq!(options.max_pending_migrations, 3);
        assert_eq!(options.log_level, LogLevel::Debug);
        assert!(options.seed.auto_run);
        assert_eq!(
            options.seed.config.master_email.as_deref(),
            Some("admin@example.com")
        );
    }

    #[test]
    fn test_validate_requires_database() {
        let mut config = Config::new_default(DatabaseType::Postgres);
        config.database.database.clear();
        assert!(config.validate().is_err());

        config.database.url = Some("postgres://localhost/app".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_port_resolution() {
        let config = Config::new_default(DatabaseType::Postgres);
        assert_eq!(config.database.resolved_port(), 5432);

        let config = Config::new_default(DatabaseType::Sqlite);
        assert_eq!(config.database.resolved_port(), 0);
    }
}
