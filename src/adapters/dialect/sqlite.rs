// SQLite方言
//
// SQLiteはALTER TABLEの機能が制限されているため、カラムの削除・名前変更は
// DBに触れる前に UnsupportedOperation エラーとします（テーブル再作成で対応）。

use super::{DialectQueryRunner, MigrationDialect};
use crate::adapters::query_runner::{ColumnDefinition, QueryRunner, SqlValue};
use crate::adapters::sql_quote::escape_value_sqlite;
use crate::core::config::DatabaseType;
use crate::core::error::DatabaseError;
use async_trait::async_trait;
use sqlx::AnyPool;

/// SQLite用のQueryRunner
pub type SqliteQueryRunner = DialectQueryRunner<SqliteDialect>;

const TABLE_RECREATION_HINT: &str =
    "create a new table with the desired columns, copy the data, drop the old table and rename the new one";

/// SQLite方言
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    fn unsupported(operation: &str) -> DatabaseError {
        DatabaseError::UnsupportedOperation {
            dialect: "SQLite".to_string(),
            operation: operation.to_string(),
            hint: TABLE_RECREATION_HINT.to_string(),
        }
    }
}

#[async_trait]
impl MigrationDialect for SqliteDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn escape_value(&self, value: &SqlValue) -> String {
        escape_value_sqlite(value)
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn create_migrations_table_sql(&self, table: &str) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "name" TEXT NOT NULL,
    "timestamp" TEXT NOT NULL,
    "executed_at" DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    "execution_time" INTEGER NOT NULL DEFAULT 0,
    UNIQUE ("name", "timestamp")
)"#,
            self.escape_identifier(table)
        )
    }

    fn table_exists_sql(&self) -> String {
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?".to_string()
    }

    fn column_exists_sql(&self) -> String {
        "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?".to_string()
    }

    fn column_sql(&self, column: &ColumnDefinition) -> String {
        let mut parts = vec![self.escape_identifier(&column.name)];

        if column.primary && column.auto_increment {
            // AUTOINCREMENT は INTEGER PRIMARY KEY にのみ付与できる
            parts.push("INTEGER PRIMARY KEY AUTOINCREMENT".to_string());
        } else {
            parts.push(column.data_type.clone());
            if column.primary {
                parts.push("PRIMARY KEY".to_string());
            } else if !column.nullable {
                parts.push("NOT NULL".to_string());
            }
        }

        if column.unique && !column.primary {
            parts.push("UNIQUE".to_string());
        }

        if let Some(ref default_value) = column.default {
            parts.push(format!("DEFAULT {}", default_value));
        }

        parts.join(" ")
    }

    fn drop_column_sql(&self, _table: &str, _column: &str) -> Result<String, DatabaseError> {
        Err(Self::unsupported("DROP COLUMN"))
    }

    fn rename_column_sql(
        &self,
        _table: &str,
        _old_name: &str,
        _new_name: &str,
    ) -> Result<String, DatabaseError> {
        Err(Self::unsupported("RENAME COLUMN"))
    }

    async fn create_query_runner(&self, pool: &AnyPool) -> Result<Box<dyn QueryRunner>, DatabaseError> {
        Ok(Box::new(SqliteQueryRunner::new(*self, pool.clone())))
    }
}
