// データベース接続アダプター
//
// SQLxのAnyドライバーを使用したデータベース接続プールの管理を行います。
// SQLiteとPostgreSQLに対応した統一されたインターフェースを提供します。

use crate::adapters::connection_string::build_connection_string;
use crate::core::config::{DatabaseConfig, DatabaseType};
use crate::core::error::DatabaseError;
use sqlx::pool::PoolOptions;
use sqlx::{Any, AnyPool};
use std::time::Duration;
use tracing::debug;

/// 既定の接続取得タイムアウト（秒）
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// データベース接続サービス
///
/// データベース接続プールの初期化と管理を行います。
#[derive(Debug, Clone)]
pub struct DatabaseConnectionService {}

impl DatabaseConnectionService {
    /// 新しいDatabaseConnectionServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// データベース接続プールを作成
    ///
    /// # Arguments
    ///
    /// * `config` - データベース設定
    ///
    /// # Returns
    ///
    /// 接続プールまたはエラー
    pub async fn create_pool(&self, config: &DatabaseConfig) -> Result<AnyPool, DatabaseError> {
        sqlx::any::install_default_drivers();

        let connection_string = build_connection_string(config);
        let pool_options = self.create_pool_options(config.db_type, config.timeout);

        debug!(db_type = %config.db_type, "Connecting to database");

        pool_options
            .connect(&connection_string)
            .await
            .map_err(|e| DatabaseError::Connection {
                message: format!("Failed to create {} connection pool", config.db_type),
                cause: e.to_string(),
            })
    }

    /// 接続テストを実行
    ///
    /// # Arguments
    ///
    /// * `pool` - データベース接続プール
    pub async fn test_connection(&self, pool: &AnyPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map(|_| ())
            .map_err(|e| DatabaseError::Connection {
                message: "Database connection test failed".to_string(),
                cause: e.to_string(),
            })
    }

    /// プールオプションを作成
    ///
    /// SQLiteは単一ライターのため接続数を1に制限します。
    pub fn create_pool_options(
        &self,
        db_type: DatabaseType,
        timeout_secs: Option<u64>,
    ) -> PoolOptions<Any> {
        let max_connections = match db_type {
            DatabaseType::Postgres => 5,
            DatabaseType::Sqlite => 1,
        };

        PoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(
                timeout_secs.unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            ))
    }
}

impl Default for DatabaseConnectionService {
    fn default() -> Self {
        Self::new()
    }
}
