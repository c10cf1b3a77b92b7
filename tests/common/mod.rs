//! 統合テスト共通のヘルパー
#![allow(dead_code)]

use migra::adapters::database::DatabaseConnectionService;
use migra::core::config::{DatabaseConfig, DatabaseType};
use migra::services::migration_manager::{create_migration_manager, MigrationManager};
use migra::services::migration_source::SqlDirectorySource;
use sqlx::AnyPool;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// 一時ディレクトリ上のSQLiteプロジェクト
pub struct TestProject {
    pub dir: TempDir,
    pub pool: AnyPool,
}

impl TestProject {
    /// 空のマイグレーションディレクトリとSQLiteデータベースを用意する
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("migrations")).unwrap();
        let pool = sqlite_pool(&dir.path().join("test.db")).await;
        Self { dir, pool }
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.dir.path().join("migrations")
    }

    /// マイグレーションファイルを書き出す
    pub fn write_migration(&self, timestamp: &str, name: &str, up: &str, down: &str) -> PathBuf {
        write_migration(&self.migrations_dir(), timestamp, name, up, down)
    }

    /// ディレクトリを読むマネージャーを作成
    pub fn manager(&self) -> MigrationManager {
        let source = Arc::new(SqlDirectorySource::new(self.migrations_dir()));
        create_migration_manager(self.pool.clone(), DatabaseType::Sqlite, source)
    }
}

/// SQLiteファイルの設定
pub fn sqlite_config(path: &Path) -> DatabaseConfig {
    DatabaseConfig {
        db_type: DatabaseType::Sqlite,
        url: None,
        host: "localhost".to_string(),
        port: None,
        database: path.display().to_string(),
        user: None,
        password: None,
        timeout: Some(5),
    }
}

/// SQLiteファイルへの接続プールを作成
pub async fn sqlite_pool(path: &Path) -> AnyPool {
    DatabaseConnectionService::new()
        .create_pool(&sqlite_config(path))
        .await
        .unwrap()
}

/// `<timestamp>_<name>.sql` を up/down セクション付きで書き出す
pub fn write_migration(dir: &Path, timestamp: &str, name: &str, up: &str, down: &str) -> PathBuf {
    let path = dir.join(format!("{}_{}.sql", timestamp, name.replace(' ', "_")));
    let contents = format!("-- migrate:up\n{}\n\n-- migrate:down\n{}\n", up, down);
    fs::write(&path, contents).unwrap();
    path
}
