/// SQLite QueryRunner の統合テスト
///
/// 実際のSQLiteファイルに対してDDL操作、値のエスケープ、
/// トランザクション制御を確認します。
mod common;

#[cfg(test)]
mod sqlite_runner_tests {
    use super::common::sqlite_pool;
    use migra::adapters::dialect::sqlite::{SqliteDialect, SqliteQueryRunner};
    use migra::adapters::dialect::MigrationDialect;
    use migra::adapters::query_runner::{
        ColumnDefinition, IndexDefinition, QueryRunner, SqlValue, TableDefinition,
    };
    use sqlx::{AnyPool, Row};
    use tempfile::TempDir;

    async fn runner() -> (TempDir, AnyPool, SqliteQueryRunner) {
        let dir = TempDir::new().unwrap();
        let pool = sqlite_pool(&dir.path().join("dialect.db")).await;
        let runner = SqliteQueryRunner::new(SqliteDialect, pool.clone());
        (dir, pool, runner)
    }

    fn users_table() -> TableDefinition {
        TableDefinition::new("users")
            .column(
                ColumnDefinition::new("id", "INTEGER")
                    .primary()
                    .auto_increment(),
            )
            .column(ColumnDefinition::new("email", "TEXT").not_null().unique())
            .column(ColumnDefinition::new("active", "BOOLEAN").default_value("1"))
            .index(IndexDefinition::new("idx_users_active", &["active"]))
    }

    /// テーブルとカラムの作成・存在確認
    #[tokio::test]
    async fn test_create_table_and_add_column() {
        let (_dir, _pool, mut runner) = runner().await;

        runner.create_table(&users_table(), false).await.unwrap();
        assert!(runner.table_exists("users").await.unwrap());
        assert!(runner.column_exists("users", "email").await.unwrap());
        assert!(!runner.column_exists("users", "nickname").await.unwrap());

        runner
            .add_column("users", &ColumnDefinition::new("nickname", "TEXT"))
            .await
            .unwrap();
        assert!(runner.column_exists("users", "nickname").await.unwrap());

        // IF NOT EXISTS 付きの再作成はエラーにならない
        runner.create_table(&users_table(), true).await.unwrap();

        runner.drop_index("users", "idx_users_active").await.unwrap();
        runner.drop_table("users", true).await.unwrap();
        assert!(!runner.table_exists("users").await.unwrap());
    }

    /// カラム削除は未対応エラーになり、テーブルは変更されない
    #[tokio::test]
    async fn test_drop_column_unsupported() {
        let (_dir, _pool, mut runner) = runner().await;
        runner.create_table(&users_table(), false).await.unwrap();

        let err = runner.drop_column("users", "email").await.unwrap_err();
        assert!(err.is_unsupported_operation());
        assert!(err.to_string().contains("DROP COLUMN"));

        let err = runner
            .rename_column("users", "email", "mail")
            .await
            .unwrap_err();
        assert!(err.is_unsupported_operation());

        assert!(runner.column_exists("users", "email").await.unwrap());
        assert!(!runner.column_exists("users", "mail").await.unwrap());
    }

    /// 引用符を含む値を VALUES に埋め込んでも壊れない
    #[tokio::test]
    async fn test_escaped_value_round_trip() {
        let (_dir, _pool, mut runner) = runner().await;
        runner
            .execute("CREATE TABLE people (name TEXT NOT NULL)")
            .await
            .unwrap();

        let literal = SqliteDialect.escape_value(&SqlValue::from("O'Brien"));
        runner
            .execute(&format!("INSERT INTO people (name) VALUES ({})", literal))
            .await
            .unwrap();

        let rows = runner
            .query(
                "SELECT name FROM people WHERE name = ?",
                &[SqlValue::from("O'Brien")],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let name: String = rows[0].get("name");
        assert_eq!(name, "O'Brien");
    }

    /// ロールバックした変更は残らず、コミットした変更は残る
    #[tokio::test]
    async fn test_transaction_control() {
        let (_dir, pool, mut runner) = runner().await;

        runner.begin_transaction().await.unwrap();
        assert!(runner.is_transaction_active());
        runner
            .execute("CREATE TABLE discarded (id INTEGER)")
            .await
            .unwrap();
        runner.rollback_transaction().await.unwrap();
        assert!(!runner.is_transaction_active());
        assert!(!runner.table_exists("discarded").await.unwrap());

        runner.begin_transaction().await.unwrap();
        runner.execute("CREATE TABLE kept (id INTEGER)").await.unwrap();
        runner.commit_transaction().await.unwrap();
        drop(runner);

        let mut other = SqliteQueryRunner::new(SqliteDialect, pool);
        assert!(other.table_exists("kept").await.unwrap());
    }

    /// 失敗したSQLはクエリエラーとして報告される
    #[tokio::test]
    async fn test_query_error_carries_sql() {
        let (_dir, _pool, mut runner) = runner().await;

        let err = runner.execute("SELECT * FROM nowhere").await.unwrap_err();
        assert!(err.is_query());
        assert_eq!(err.sql(), Some("SELECT * FROM nowhere"));
    }
}
