// エラー型定義
//
// マイグレーションエンジン全体で使用されるカスタムエラー型を提供します。
// thiserrorを使用して、DatabaseError と MigrationError を定義します。

use std::path::PathBuf;
use thiserror::Error;

/// データベースエラー
///
/// QueryRunnerやプール操作で発生するエラーを表現します。
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connection error
    #[error("Database connection error: {message} (cause: {cause})")]
    Connection {
        /// エラーメッセージ
        message: String,
        /// エラー原因
        cause: String,
    },

    /// Query execution error
    #[error("Query execution error: {message}")]
    Query {
        /// エラーメッセージ
        message: String,
        /// 失敗したSQL
        sql: Option<String>,
    },

    /// Transaction error
    #[error("Transaction error: {message}")]
    Transaction {
        /// エラーメッセージ
        message: String,
    },

    /// 方言の構造的制約により実行できない操作
    #[error("{operation} is not supported by {dialect}: {hint}")]
    UnsupportedOperation {
        /// 対象の方言
        dialect: String,
        /// 操作名
        operation: String,
        /// 代替手段の案内
        hint: String,
    },

    /// Unknown database type tag
    #[error("Unsupported database type '{value}'. Supported types: sqlite, postgres")]
    UnsupportedDatabaseType {
        /// 指定された値
        value: String,
    },
}

impl DatabaseError {
    /// 接続エラーかどうか
    pub fn is_connection(&self) -> bool {
        matches!(self, DatabaseError::Connection { .. })
    }

    /// クエリエラーかどうか
    pub fn is_query(&self) -> bool {
        matches!(self, DatabaseError::Query { .. })
    }

    /// トランザクションエラーかどうか
    pub fn is_transaction(&self) -> bool {
        matches!(self, DatabaseError::Transaction { .. })
    }

    /// 未サポート操作エラーかどうか
    pub fn is_unsupported_operation(&self) -> bool {
        matches!(self, DatabaseError::UnsupportedOperation { .. })
    }

    /// 失敗したSQLを取得
    pub fn sql(&self) -> Option<&str> {
        match self {
            DatabaseError::Query { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }

    /// sqlxのエラーをクエリエラーに変換する
    pub(crate) fn query(message: impl Into<String>, sql: &str, cause: sqlx::Error) -> Self {
        DatabaseError::Query {
            message: format!("{}: {}", message.into(), cause),
            sql: Some(sql.to_string()),
        }
    }
}

/// マイグレーションエラー
///
/// マイグレーションの検出、読み込み、実行時に発生するエラーを表現します。
#[derive(Debug, Error)]
pub enum MigrationError {
    /// マイグレーションディレクトリを列挙できない
    #[error("Failed to read migrations directory {path:?}: {cause}")]
    Discovery {
        /// ディレクトリのパス
        path: PathBuf,
        /// エラー原因
        cause: String,
    },

    /// 検出されたマイグレーションの実装を解決できない
    #[error("Failed to load migration '{migration}': {reason}")]
    Load {
        /// マイグレーション名
        migration: String,
        /// 失敗理由
        reason: String,
    },

    /// up()/down() の実行に失敗
    #[error("Migration '{migration}' failed: {source:#}")]
    Execution {
        /// マイグレーション名
        migration: String,
        /// 元のエラー
        #[source]
        source: anyhow::Error,
    },

    /// マイグレーション名が不正
    #[error("Invalid migration name '{name}': {reason}")]
    InvalidName {
        /// 指定された名前
        name: String,
        /// 不正な理由
        reason: String,
    },

    /// タイムスタンプが不正
    #[error("Invalid migration timestamp '{timestamp}': expected 14 digits (YYYYMMDDHHMMSS)")]
    InvalidTimestamp {
        /// 指定されたタイムスタンプ
        timestamp: String,
    },

    /// Database error
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl MigrationError {
    /// 検出エラーかどうか
    pub fn is_discovery(&self) -> bool {
        matches!(self, MigrationError::Discovery { .. })
    }

    /// 読み込みエラーかどうか
    pub fn is_load(&self) -> bool {
        matches!(self, MigrationError::Load { .. })
    }

    /// 実行エラーかどうか
    pub fn is_execution(&self) -> bool {
        matches!(self, MigrationError::Execution { .. })
    }

    /// データベースエラーかどうか
    pub fn is_database(&self) -> bool {
        matches!(self, MigrationError::Database(_))
    }
}
