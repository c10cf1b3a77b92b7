// データベース方言
//
// 方言ごとに異なるエスケープ規則、履歴テーブルDDL、イントロスペクションSQLを
// MigrationDialect トレイトとして抽象化し、方言タグからファクトリで選択します。
// QueryRunner の実装は方言に対してジェネリックな DialectQueryRunner が担います。

pub mod postgres;
pub mod sqlite;

pub use postgres::{PostgresDialect, PostgresQueryRunner};
pub use sqlite::{SqliteDialect, SqliteQueryRunner};

use crate::adapters::query_runner::{
    ColumnDefinition, IndexDefinition, QueryRunner, RunnerConnection, SqlValue, TableDefinition,
};
use crate::adapters::sql_quote::{quote_columns, quote_identifier};
use crate::core::config::DatabaseType;
use crate::core::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::AnyPool;
use std::sync::Arc;
use tracing::warn;

/// マイグレーションエンジンが利用する方言固有の振る舞い
#[async_trait]
pub trait MigrationDialect: Send + Sync + std::fmt::Debug {
    /// データベース種別
    fn database_type(&self) -> DatabaseType;

    /// 識別子をエスケープ
    fn escape_identifier(&self, name: &str) -> String {
        quote_identifier(name)
    }

    /// 値をリテラルとしてエスケープ
    fn escape_value(&self, value: &SqlValue) -> String;

    /// n番目（1始まり）のバインドパラメータのプレースホルダー
    fn placeholder(&self, index: usize) -> String;

    /// 履歴テーブル作成DDL（存在する場合は何もしない）
    fn create_migrations_table_sql(&self, table: &str) -> String;

    /// テーブル存在確認SQL（パラメータ: テーブル名）
    fn table_exists_sql(&self) -> String;

    /// カラム存在確認SQL（パラメータ: テーブル名, カラム名）
    fn column_exists_sql(&self) -> String;

    /// カラム定義SQL
    fn column_sql(&self, column: &ColumnDefinition) -> String;

    /// 現在時刻から14桁のタイムスタンプを生成
    fn generate_timestamp(&self) -> String {
        format_migration_timestamp(&Utc::now())
    }

    /// 実行記録の取得SQL（name, timestamp, executed_at, execution_time の順）
    fn select_records_sql(&self, table: &str) -> String {
        format!(
            "SELECT \"name\", \"timestamp\", CAST(\"executed_at\" AS TEXT), CAST(\"execution_time\" AS BIGINT) FROM {} ORDER BY \"timestamp\" ASC, \"name\" ASC",
            self.escape_identifier(table)
        )
    }

    /// 実行記録の挿入SQL（パラメータ: name, timestamp, executed_at, execution_time）
    fn insert_record_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} (\"name\", \"timestamp\", \"executed_at\", \"execution_time\") VALUES ({}, {}, {}, {})",
            self.escape_identifier(table),
            self.placeholder(1),
            self.placeholder(2),
            self.placeholder(3),
            self.placeholder(4)
        )
    }

    /// 実行記録の削除SQL（パラメータ: name, timestamp）
    fn delete_record_sql(&self, table: &str) -> String {
        format!(
            "DELETE FROM {} WHERE \"name\" = {} AND \"timestamp\" = {}",
            self.escape_identifier(table),
            self.placeholder(1),
            self.placeholder(2)
        )
    }

    /// CREATE TABLE 文と、続くインデックス作成文
    fn create_table_sql(&self, table: &TableDefinition, if_not_exists: bool) -> Vec<String> {
        let primary = table.primary_columns();
        let composite_primary = primary.len() > 1;

        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                if composite_primary && column.primary {
                    // 複合主キーはテーブル制約として付与する
                    let mut single = column.clone();
                    single.primary = false;
                    self.column_sql(&single)
                } else {
                    self.column_sql(column)
                }
            })
            .collect();

        if composite_primary {
            parts.push(format!("PRIMARY KEY ({})", quote_columns(&primary)));
        }

        let mut statements = vec![format!(
            "CREATE TABLE {}{} (\n    {}\n)",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.escape_identifier(&table.name),
            parts.join(",\n    ")
        )];

        statements.extend(
            table
                .indices
                .iter()
                .map(|index| self.create_index_sql(&table.name, index, if_not_exists)),
        );

        statements
    }

    fn drop_table_sql(&self, table: &str, if_exists: bool) -> String {
        format!(
            "DROP TABLE {}{}",
            if if_exists { "IF EXISTS " } else { "" },
            self.escape_identifier(table)
        )
    }

    fn add_column_sql(&self, table: &str, column: &ColumnDefinition) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.escape_identifier(table),
            self.column_sql(column)
        )
    }

    /// カラム削除SQL（方言によっては未サポート）
    fn drop_column_sql(&self, table: &str, column: &str) -> Result<String, DatabaseError> {
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.escape_identifier(table),
            self.escape_identifier(column)
        ))
    }

    /// カラム名変更SQL（方言によっては未サポート）
    fn rename_column_sql(
        &self,
        table: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<String, DatabaseError> {
        Ok(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.escape_identifier(table),
            self.escape_identifier(old_name),
            self.escape_identifier(new_name)
        ))
    }

    fn add_index_sql(&self, table: &str, index: &IndexDefinition) -> String {
        self.create_index_sql(table, index, false)
    }

    /// `if_not_exists` が true なら既存のインデックスを無視する
    fn create_index_sql(
        &self,
        table: &str,
        index: &IndexDefinition,
        if_not_exists: bool,
    ) -> String {
        format!(
            "CREATE {}INDEX {}{} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.escape_identifier(&index.name),
            self.escape_identifier(table),
            quote_columns(&index.columns)
        )
    }

    fn drop_index_sql(&self, _table: &str, index_name: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", self.escape_identifier(index_name))
    }

    /// 保存された日時文字列を解析
    fn parse_datetime(&self, value: &str) -> DateTime<Utc> {
        parse_stored_datetime(value)
    }

    /// この方言のQueryRunnerを作成
    async fn create_query_runner(&self, pool: &AnyPool) -> Result<Box<dyn QueryRunner>, DatabaseError>;
}

/// 方言タグから方言実装を作成
pub fn create_dialect(db_type: DatabaseType) -> Arc<dyn MigrationDialect> {
    match db_type {
        DatabaseType::Sqlite => Arc::new(SqliteDialect),
        DatabaseType::Postgres => Arc::new(PostgresDialect),
    }
}

/// 日時を YYYYMMDDHHmmss 形式に整形
pub fn format_migration_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y%m%d%H%M%S").to_string()
}

/// 保存された日時文字列を解析する
///
/// RFC 3339 と `YYYY-MM-DD HH:MM:SS[.f]`（UTCとみなす）を受け付けます。
/// どちらにも一致しない場合は警告を出して現在時刻を返します。
pub fn parse_stored_datetime(value: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return dt.with_timezone(&Utc);
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return naive.and_utc();
        }
    }

    warn!(value = %value, "Unrecognized executed_at value, falling back to current time");
    Utc::now()
}

/// 方言に対してジェネリックなQueryRunner
///
/// SQLの組み立ては方言に委譲し、実行は専用の接続で行います。
#[derive(Debug)]
pub struct DialectQueryRunner<D> {
    dialect: D,
    connection: RunnerConnection,
}

impl<D: MigrationDialect> DialectQueryRunner<D> {
    /// 新しいQueryRunnerを作成
    pub fn new(dialect: D, pool: AnyPool) -> Self {
        Self {
            dialect,
            connection: RunnerConnection::new(pool),
        }
    }

    /// 使用している方言
    pub fn dialect(&self) -> &D {
        &self.dialect
    }
}

#[async_trait]
impl<D: MigrationDialect> QueryRunner for DialectQueryRunner<D> {
    fn database_type(&self) -> DatabaseType {
        self.dialect.database_type()
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<AnyRow>, DatabaseError> {
        self.connection.fetch(sql, params).await
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        self.connection.execute(sql).await
    }

    async fn begin_transaction(&mut self) -> Result<(), DatabaseError> {
        self.connection.begin().await
    }

    async fn commit_transaction(&mut self) -> Result<(), DatabaseError> {
        self.connection.commit().await
    }

    async fn rollback_transaction(&mut self) -> Result<(), DatabaseError> {
        self.connection.rollback().await
    }

    fn is_transaction_active(&self) -> bool {
        self.connection.in_transaction()
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool, DatabaseError> {
        let sql = self.dialect.table_exists_sql();
        let count = self
            .connection
            .fetch_count(&sql, &[SqlValue::from(table)])
            .await?;
        Ok(count > 0)
    }

    async fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, DatabaseError> {
        let sql = self.dialect.column_exists_sql();
        let count = self
            .connection
            .fetch_count(&sql, &[SqlValue::from(table), SqlValue::from(column)])
            .await?;
        Ok(count > 0)
    }

    async fn create_table(
        &mut self,
        table: &TableDefinition,
        if_not_exists: bool,
    ) -> Result<(), DatabaseError> {
        for statement in self.dialect.create_table_sql(table, if_not_exists) {
            self.connection.execute(&statement).await?;
        }
        Ok(())
    }

    async fn drop_table(&mut self, table: &str, if_exists: bool) -> Result<(), DatabaseError> {
        let sql = self.dialect.drop_table_sql(table, if_exists);
        self.connection.execute(&sql).await.map(|_| ())
    }

    async fn add_column(
        &mut self,
        table: &str,
        column: &ColumnDefinition,
    ) -> Result<(), DatabaseError> {
        let sql = self.dialect.add_column_sql(table, column);
        self.connection.execute(&sql).await.map(|_| ())
    }

    async fn drop_column(&mut self, table: &str, column: &str) -> Result<(), DatabaseError> {
        // 未サポートの方言ではDBに触れる前にエラーになる
        let sql = self.dialect.drop_column_sql(table, column)?;
        self.connection.execute(&sql).await.map(|_| ())
    }

    async fn rename_column(
        &mut self,
        table: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), DatabaseError> {
        let sql = self.dialect.rename_column_sql(table, old_name, new_name)?;
        self.connection.execute(&sql).await.map(|_| ())
    }

    async fn add_index(
        &mut self,
        table: &str,
        index: &IndexDefinition,
    ) -> Result<(), DatabaseError> {
        let sql = self.dialect.add_index_sql(table, index);
        self.connection.execute(&sql).await.map(|_| ())
    }

    async fn drop_index(&mut self, table: &str, index_name: &str) -> Result<(), DatabaseError> {
        let sql = self.dialect.drop_index_sql(table, index_name);
        self.connection.execute(&sql).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn test_create_dialect() {
        assert_eq!(
            create_dialect(DatabaseType::Sqlite).database_type(),
            DatabaseType::Sqlite
        );
        assert_eq!(
            create_dialect(DatabaseType::Postgres).database_type(),
            DatabaseType::Postgres
        );
    }

    #[test]
    fn test_create_table_if_not_exists_covers_indices() {
        let table = TableDefinition::new("t")
            .column(ColumnDefinition::new("a", "TEXT"))
            .index(IndexDefinition::new("idx_t_a", &["a"]).unique());

        for dialect in [
            create_dialect(DatabaseType::Sqlite),
            create_dialect(DatabaseType::Postgres),
        ] {
            let statements = dialect.create_table_sql(&table, true);
            assert_eq!(
                statements[1],
                r#"CREATE UNIQUE INDEX IF NOT EXISTS "idx_t_a" ON "t" ("a")"#
            );

            let statements = dialect.create_table_sql(&table, false);
            assert_eq!(
                statements[1],
                r#"CREATE UNIQUE INDEX "idx_t_a" ON "t" ("a")"#
            );
        }
    }

    #[test]
    fn test_format_migration_timestamp() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_migration_timestamp(&dt), "20240309070501");
    }

    #[test]
    fn test_generate_timestamp_is_14_digits() {
        for dialect in [
            create_dialect(DatabaseType::Sqlite),
            create_dialect(DatabaseType::Postgres),
        ] {
            let ts = dialect.generate_timestamp();
            assert_eq!(ts.len(), 14);
            assert!(ts.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_parse_stored_datetime_formats() {
        let rfc = parse_stored_datetime("2024-01-02T03:04:05.000Z");
        assert_eq!((rfc.year(), rfc.month(), rfc.day()), (2024, 1, 2));
        assert_eq!((rfc.hour(), rfc.minute(), rfc.second()), (3, 4, 5));

        let pg = parse_stored_datetime("2024-01-02 03:04:05.123");
        assert_eq!(pg.hour(), 3);

        let sqlite = parse_stored_datetime("2024-01-02 03:04:05");
        assert_eq!(sqlite.second(), 5);
    }

    #[test]
    fn test_composite_primary_key_becomes_table_constraint() {
        let table = TableDefinition::new("memberships")
            .column(ColumnDefinition::new("user_id", "INTEGER").primary())
            .column(ColumnDefinition::new("group_id", "INTEGER").primary());

        let statements = SqliteDialect.create_table_sql(&table, false);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains(r#"PRIMARY KEY ("user_id", "group_id")"#));
        assert!(!statements[0].contains("INTEGER PRIMARY KEY"));
    }
}
