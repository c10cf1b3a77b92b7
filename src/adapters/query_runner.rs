// QueryRunner（方言共通の契約）
//
// 生SQLの実行、トランザクション制御、DDL操作を方言に依存しない形で提供します。
// 各方言（SQLite / PostgreSQL）はこのトレイトを一度ずつ実装します。

use crate::core::config::DatabaseType;
use crate::core::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, AnyPool, Transaction};
use tracing::debug;

/// SQLに埋め込む／バインドする値
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Array(Vec<SqlValue>),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

impl<T: Into<SqlValue>> From<Vec<T>> for SqlValue {
    fn from(values: Vec<T>) -> Self {
        SqlValue::Array(values.into_iter().map(Into::into).collect())
    }
}

/// カラム定義
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    /// 方言固有の型名（例: INTEGER, VARCHAR(255)）
    pub data_type: String,
    pub nullable: bool,
    pub primary: bool,
    pub unique: bool,
    pub auto_increment: bool,
    /// デフォルト値（SQL式としてそのまま埋め込む）
    pub default: Option<String>,
}

impl ColumnDefinition {
    /// NULL許可のカラムを作成
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            primary: false,
            unique: false,
            auto_increment: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn default_value(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }
}

/// インデックス定義
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// テーブル定義
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub indices: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indices.push(index);
        self
    }

    /// 主キーカラム名の一覧
    pub fn primary_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// 方言共通のクエリ実行インターフェース
///
/// 1つのQueryRunnerは専用の接続を1本だけ保持するため、
/// begin_transaction と commit_transaction の間の文はすべて同じトランザクションに入ります。
/// 複数タスクから同時に使うことは想定していません。
#[async_trait]
pub trait QueryRunner: Send {
    /// 対象のデータベース種別
    fn database_type(&self) -> DatabaseType;

    /// パラメータ付きクエリを実行して行を返す
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<AnyRow>, DatabaseError>;

    /// パラメータなしの文を実行し、影響行数を返す
    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError>;

    /// トランザクションを開始
    async fn begin_transaction(&mut self) -> Result<(), DatabaseError>;

    /// トランザクションをコミット
    async fn commit_transaction(&mut self) -> Result<(), DatabaseError>;

    /// トランザクションをロールバック
    async fn rollback_transaction(&mut self) -> Result<(), DatabaseError>;

    /// トランザクション中かどうか
    fn is_transaction_active(&self) -> bool;

    /// テーブルが存在するか
    async fn table_exists(&mut self, table: &str) -> Result<bool, DatabaseError>;

    /// カラムが存在するか
    async fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, DatabaseError>;

    /// テーブルを作成（定義内のインデックスも作成）
    async fn create_table(
        &mut self,
        table: &TableDefinition,
        if_not_exists: bool,
    ) -> Result<(), DatabaseError>;

    /// テーブルを削除
    async fn drop_table(&mut self, table: &str, if_exists: bool) -> Result<(), DatabaseError>;

    /// カラムを追加
    async fn add_column(
        &mut self,
        table: &str,
        column: &ColumnDefinition,
    ) -> Result<(), DatabaseError>;

    /// カラムを削除
    async fn drop_column(&mut self, table: &str, column: &str) -> Result<(), DatabaseError>;

    /// カラム名を変更
    async fn rename_column(
        &mut self,
        table: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), DatabaseError>;

    /// インデックスを作成
    async fn add_index(&mut self, table: &str, index: &IndexDefinition)
        -> Result<(), DatabaseError>;

    /// インデックスを削除
    async fn drop_index(&mut self, table: &str, index_name: &str) -> Result<(), DatabaseError>;
}

/// QueryRunnerが保持する接続
///
/// トランザクション外では遅延取得した接続を使い、トランザクション中は
/// プールから開始した Transaction を使います。コミットされずに破棄された
/// Transaction は sqlx によってロールバックされます。
pub struct RunnerConnection {
    pool: AnyPool,
    conn: Option<PoolConnection<Any>>,
    tx: Option<Transaction<'static, Any>>,
}

impl std::fmt::Debug for RunnerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerConnection")
            .field("connected", &self.conn.is_some())
            .field("in_transaction", &self.tx.is_some())
            .finish()
    }
}

impl RunnerConnection {
    /// 新しい接続ホルダーを作成（接続は最初の利用時に取得）
    pub fn new(pool: AnyPool) -> Self {
        Self {
            pool,
            conn: None,
            tx: None,
        }
    }

    async fn connection(&mut self) -> Result<&mut AnyConnection, DatabaseError> {
        if let Some(tx) = self.tx.as_mut() {
            return Ok(&mut **tx);
        }

        if self.conn.is_none() {
            let conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| DatabaseError::Connection {
                    message: "Failed to acquire a connection from the pool".to_string(),
                    cause: e.to_string(),
                })?;
            self.conn = Some(conn);
        }

        match self.conn.as_mut() {
            Some(conn) => Ok(&mut **conn),
            None => Err(DatabaseError::Connection {
                message: "Connection is not available".to_string(),
                cause: "released".to_string(),
            }),
        }
    }

    /// パラメータ付きクエリを実行
    pub async fn fetch(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<AnyRow>, DatabaseError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param, sql)?;
        }

        debug!(sql = %sql, params = params.len(), "Executing query");
        let conn = self.connection().await?;
        query
            .fetch_all(conn)
            .await
            .map_err(|e| DatabaseError::query("Failed to execute query", sql, e))
    }

    /// 文を実行
    pub async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        debug!(sql = %sql, "Executing statement");
        let conn = self.connection().await?;
        sqlx::query(sql)
            .execute(conn)
            .await
            .map(|result| result.rows_affected())
            .map_err(|e| DatabaseError::query("Failed to execute statement", sql, e))
    }

    /// トランザクションを開始
    pub async fn begin(&mut self) -> Result<(), DatabaseError> {
        if self.tx.is_some() {
            return Err(DatabaseError::Transaction {
                message: "A transaction is already active on this query runner".to_string(),
            });
        }

        // プール上限が1でも開始できるよう、保持中の接続を先に返却する
        self.conn = None;

        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction {
                message: format!("Failed to start transaction: {}", e),
            })?;
        self.tx = Some(tx);
        Ok(())
    }

    /// トランザクションをコミット
    pub async fn commit(&mut self) -> Result<(), DatabaseError> {
        let tx = self.tx.take().ok_or_else(|| DatabaseError::Transaction {
            message: "No active transaction to commit".to_string(),
        })?;

        tx.commit().await.map_err(|e| DatabaseError::Transaction {
            message: format!("Failed to commit transaction: {}", e),
        })
    }

    /// トランザクションをロールバック
    pub async fn rollback(&mut self) -> Result<(), DatabaseError> {
        let tx = self.tx.take().ok_or_else(|| DatabaseError::Transaction {
            message: "No active transaction to roll back".to_string(),
        })?;

        tx.rollback().await.map_err(|e| DatabaseError::Transaction {
            message: format!("Failed to roll back transaction: {}", e),
        })
    }

    /// トランザクション中かどうか
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// COUNT(*) を返すクエリを実行
    pub async fn fetch_count(&mut self, sql: &str, params: &[SqlValue]) -> Result<i64, DatabaseError> {
        use sqlx::Row;

        let rows = self.fetch(sql, params).await?;
        match rows.first() {
            Some(row) => row
                .try_get::<i64, _>(0)
                .map_err(|e| DatabaseError::query("Failed to read count", sql, e)),
            None => Ok(0),
        }
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &SqlValue,
    sql: &str,
) -> Result<Query<'q, Any, AnyArguments<'q>>, DatabaseError> {
    let query = match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Integer(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Timestamp(dt) => query.bind(crate::adapters::sql_quote::format_datetime(dt)),
        SqlValue::Array(_) => {
            return Err(DatabaseError::Query {
                message: "Array values cannot be bound as parameters; inline them with escape_value"
                    .to_string(),
                sql: Some(sql.to_string()),
            })
        }
    };
    Ok(query)
}
