// PostgreSQL方言
//
// 自動採番カラムは SERIAL/BIGSERIAL、配列は ARRAY[...] で表現します。
// イントロスペクションは information_schema を現在のスキーマに限定して参照します。

use super::{DialectQueryRunner, MigrationDialect};
use crate::adapters::query_runner::{ColumnDefinition, QueryRunner, SqlValue};
use crate::adapters::sql_quote::escape_value_postgres;
use crate::core::config::DatabaseType;
use crate::core::error::DatabaseError;
use async_trait::async_trait;
use sqlx::AnyPool;

/// PostgreSQL用のQueryRunner
pub type PostgresQueryRunner = DialectQueryRunner<PostgresDialect>;

/// PostgreSQL方言
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// 自動採番カラムの型
    fn serial_type(data_type: &str) -> &'static str {
        match data_type.to_ascii_uppercase().as_str() {
            "BIGINT" | "INT8" | "BIGSERIAL" => "BIGSERIAL",
            "SMALLINT" | "INT2" | "SMALLSERIAL" => "SMALLSERIAL",
            _ => "SERIAL",
        }
    }
}

#[async_trait]
impl MigrationDialect for PostgresDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn escape_value(&self, value: &SqlValue) -> String {
        escape_value_postgres(value)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn create_migrations_table_sql(&self, table: &str) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
    "id" SERIAL PRIMARY KEY,
    "name" VARCHAR(255) NOT NULL,
    "timestamp" VARCHAR(14) NOT NULL,
    "executed_at" TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    "execution_time" INTEGER NOT NULL DEFAULT 0,
    UNIQUE ("name", "timestamp")
)"#,
            self.escape_identifier(table)
        )
    }

    fn table_exists_sql(&self) -> String {
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1"
            .to_string()
    }

    fn column_exists_sql(&self) -> String {
        "SELECT COUNT(*) FROM information_schema.columns WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2"
            .to_string()
    }

    fn column_sql(&self, column: &ColumnDefinition) -> String {
        let mut parts = vec![self.escape_identifier(&column.name)];

        if column.auto_increment {
            parts.push(Self::serial_type(&column.data_type).to_string());
        } else {
            parts.push(column.data_type.clone());
        }

        if column.primary {
            parts.push("PRIMARY KEY".to_string());
        } else if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if column.unique && !column.primary {
            parts.push("UNIQUE".to_string());
        }

        if let Some(ref default_value) = column.default {
            parts.push(format!("DEFAULT {}", default_value));
        }

        parts.join(" ")
    }

    // executed_at は TIMESTAMP 列のため、文字列パラメータを明示的にキャストする
    fn insert_record_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} (\"name\", \"timestamp\", \"executed_at\", \"execution_time\") VALUES ($1, $2, CAST($3 AS TIMESTAMP), $4)",
            self.escape_identifier(table)
        )
    }

    async fn create_query_runner(&self, pool: &AnyPool) -> Result<Box<dyn QueryRunner>, DatabaseError> {
        Ok(Box::new(PostgresQueryRunner::new(*self, pool.clone())))
    }
}
