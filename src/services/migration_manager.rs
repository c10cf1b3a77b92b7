// マイグレーションマネージャー
//
// 検出したマイグレーションと履歴テーブルの実行記録を突き合わせ、
// 保留中のマイグレーションを昇順に実行、実行済みのものを降順に取り消します。
// マイグレーションごとに専用のQueryRunnerとトランザクションを使用します。

use crate::adapters::dialect::{create_dialect, MigrationDialect};
use crate::adapters::query_runner::{QueryRunner, SqlValue};
use crate::adapters::sql_quote::format_datetime;
use crate::core::config::DatabaseType;
use crate::core::error::{DatabaseError, MigrationError};
use crate::core::migration::{
    is_valid_timestamp, CreateMigrationOptions, GeneratedMigration, MigrationFile,
    MigrationRecord, MigrationResult, MigrationStats, RunOptions, ShowOptions,
};
use crate::services::migration_source::{file_stem, MigrationSource};
use crate::services::migration_template::{render, TemplateKind};
use sqlx::{AnyPool, Row};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 既定の履歴テーブル名
pub const DEFAULT_MIGRATIONS_TABLE: &str = "migrations";

/// 実行方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

impl Direction {
    fn done_message(&self) -> &'static str {
        match self {
            Direction::Up => "Migration executed successfully",
            Direction::Down => "Migration reverted successfully",
        }
    }

    fn dry_run_message(&self) -> &'static str {
        match self {
            Direction::Up => "Migration would be executed (dry run)",
            Direction::Down => "Migration would be reverted (dry run)",
        }
    }
}

/// マイグレーションマネージャー
///
/// プール、方言、マイグレーションソースを束ねます。
/// バッチ内のマイグレーションは常に1件ずつ順番に実行されます。
pub struct MigrationManager {
    pool: AnyPool,
    dialect: Arc<dyn MigrationDialect>,
    source: Arc<dyn MigrationSource>,
    migrations_table: String,
}

impl std::fmt::Debug for MigrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationManager")
            .field("dialect", &self.dialect)
            .field("migrations_table", &self.migrations_table)
            .finish()
    }
}

/// データベース種別からマネージャーを作成
///
/// # Arguments
///
/// * `pool` - 接続プール
/// * `db_type` - データベース種別
/// * `source` - マイグレーションソース
pub fn create_migration_manager(
    pool: AnyPool,
    db_type: DatabaseType,
    source: Arc<dyn MigrationSource>,
) -> MigrationManager {
    MigrationManager::new(pool, create_dialect(db_type), source)
}

impl MigrationManager {
    /// 新しいMigrationManagerを作成
    pub fn new(
        pool: AnyPool,
        dialect: Arc<dyn MigrationDialect>,
        source: Arc<dyn MigrationSource>,
    ) -> Self {
        Self {
            pool,
            dialect,
            source,
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
        }
    }

    /// 履歴テーブル名を変更
    pub fn with_migrations_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    /// データベース種別
    pub fn database_type(&self) -> DatabaseType {
        self.dialect.database_type()
    }

    /// 使用中の方言
    pub fn dialect(&self) -> &dyn MigrationDialect {
        self.dialect.as_ref()
    }

    /// 履歴テーブル名
    pub fn migrations_table(&self) -> &str {
        &self.migrations_table
    }

    /// 新しいQueryRunnerを取得
    pub async fn query_runner(&self) -> Result<Box<dyn QueryRunner>, DatabaseError> {
        self.dialect.create_query_runner(&self.pool).await
    }

    /// マイグレーションの雛形を生成する
    ///
    /// ファイルへの書き出しは行いません。呼び出し側が `file_name` に
    /// `contents` を保存します。
    pub fn create_migration(
        &self,
        options: &CreateMigrationOptions,
    ) -> Result<GeneratedMigration, MigrationError> {
        generate_migration(self.dialect.as_ref(), self.source.template_kind(), options)
    }

    /// 履歴テーブルを作成する（存在する場合は何もしない）
    pub async fn create_migrations_table(&self) -> Result<(), MigrationError> {
        let sql = self
            .dialect
            .create_migrations_table_sql(&self.migrations_table);
        let mut runner = self.query_runner().await?;
        runner.execute(&sql).await?;
        debug!(table = %self.migrations_table, "Migrations table ensured");
        Ok(())
    }

    /// 履歴テーブルが存在するか
    pub async fn migrations_table_exists(&self) -> Result<bool, MigrationError> {
        let mut runner = self.query_runner().await?;
        Ok(runner.table_exists(&self.migrations_table).await?)
    }

    /// 実行記録を取得する（タイムスタンプ昇順）
    ///
    /// 履歴テーブルが無い場合は空のリストを返し、テーブルは作成しません。
    pub async fn executed_migrations(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let mut runner = self.query_runner().await?;
        if !runner.table_exists(&self.migrations_table).await? {
            return Ok(Vec::new());
        }

        let sql = self.dialect.select_records_sql(&self.migrations_table);
        let rows = runner.query(&sql, &[]).await?;

        rows.iter()
            .map(|row| {
                let read = |e: sqlx::Error| DatabaseError::query("Failed to read migration record", &sql, e);
                let executed_at: String = row.try_get(2).map_err(read)?;
                Ok(MigrationRecord {
                    name: row.try_get(0).map_err(read)?,
                    timestamp: row.try_get(1).map_err(read)?,
                    executed_at: self.dialect.parse_datetime(&executed_at),
                    execution_time: row.try_get(3).map_err(read)?,
                })
            })
            .collect::<Result<Vec<_>, DatabaseError>>()
            .map_err(MigrationError::from)
    }

    /// 検出結果と実行記録を突き合わせた集計（読み取りのみ）
    pub async fn show_migrations(
        &self,
        options: &ShowOptions,
    ) -> Result<MigrationStats, MigrationError> {
        let files = self.source.discover();
        let records = self.executed_migrations().await?;
        let stats = MigrationStats::from_parts(&files, &records);

        if options.verbose {
            for status in &stats.migrations {
                info!(
                    migration = %status.name,
                    timestamp = %status.timestamp,
                    executed = status.executed,
                    "{}",
                    if status.executed { "executed" } else { "pending" }
                );
            }
        }

        Ok(stats)
    }

    /// 保留中のマイグレーションを昇順に実行する
    ///
    /// 個々のマイグレーションの失敗はエラーではなく失敗した MigrationResult になります。
    /// `transaction` が true の場合、最初の失敗でバッチを停止します。
    pub async fn run_migrations(
        &self,
        options: &RunOptions,
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        if options.step == Some(0) {
            info!("Step is 0, nothing to run");
            return Ok(vec![MigrationResult::nothing_to_do("Step is 0, nothing to run")]);
        }

        if !options.dry_run {
            self.create_migrations_table().await?;
        }

        let files = self.source.discover();
        let records = self.executed_migrations().await?;

        let mut pending: Vec<&MigrationFile> = files
            .iter()
            .filter(|file| !records.iter().any(|record| record.name == file.name))
            .collect();
        pending.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        pending.truncate(options.step.unwrap_or(usize::MAX));

        if pending.is_empty() {
            info!("No pending migrations");
            return Ok(vec![MigrationResult::nothing_to_do("No pending migrations")]);
        }

        info!(count = pending.len(), dry_run = options.dry_run, "Running migrations");

        let mut results = Vec::with_capacity(pending.len());
        for file in pending {
            let result = self
                .execute_migration(file, Direction::Up, &file.timestamp, options)
                .await;
            let stop = !result.success && options.transaction;
            results.push(result);
            if stop {
                warn!(migration = %file.name, "Stopping batch after failed migration");
                break;
            }
        }

        Ok(results)
    }

    /// 実行済みのマイグレーションを新しい順に取り消す
    ///
    /// `step` の既定値は1です。
    pub async fn revert_migrations(
        &self,
        options: &RunOptions,
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        if options.step == Some(0) {
            info!("Step is 0, nothing to run");
            return Ok(vec![MigrationResult::nothing_to_do("Step is 0, nothing to run")]);
        }

        if !options.dry_run {
            self.create_migrations_table().await?;
        }

        let files = self.source.discover();
        let mut records = self.executed_migrations().await?;
        records.sort_by(|a, b| (&b.timestamp, &b.name).cmp(&(&a.timestamp, &a.name)));
        records.truncate(options.step.unwrap_or(1));

        if records.is_empty() {
            info!("No executed migrations to revert");
            return Ok(vec![MigrationResult::nothing_to_do(
                "No executed migrations to revert",
            )]);
        }

        info!(count = records.len(), dry_run = options.dry_run, "Reverting migrations");

        let mut results = Vec::with_capacity(records.len());
        for record in &records {
            let result = match files.iter().find(|file| file.name == record.name) {
                // 履歴の削除は記録済みのタイムスタンプで行う
                Some(file) => {
                    self.execute_migration(file, Direction::Down, &record.timestamp, options)
                        .await
                }
                None => missing_implementation(record, options),
            };
            let stop = !result.success && options.transaction;
            results.push(result);
            if stop {
                warn!(migration = %record.name, "Stopping batch after failed revert");
                break;
            }
        }

        Ok(results)
    }

    /// マイグレーション1件を実行し、結果に変換する
    async fn execute_migration(
        &self,
        file: &MigrationFile,
        direction: Direction,
        history_timestamp: &str,
        options: &RunOptions,
    ) -> MigrationResult {
        let started = Instant::now();

        if options.dry_run {
            info!(migration = %file.name, timestamp = %file.timestamp, "{}", direction.dry_run_message());
            return MigrationResult::succeeded(file, direction.dry_run_message().to_string(), None);
        }

        info!(migration = %file.name, timestamp = %file.timestamp, direction = ?direction, "Applying migration");

        let outcome = self
            .apply(file, direction, history_timestamp, options.transaction, started)
            .await;
        let elapsed = elapsed_millis(started);

        match outcome {
            Ok(()) => {
                info!(migration = %file.name, execution_time_ms = elapsed, "{}", direction.done_message());
                MigrationResult::succeeded(file, direction.done_message().to_string(), Some(elapsed))
            }
            Err(e) => {
                warn!(migration = %file.name, error = %e, "Migration failed");
                MigrationResult::failed(file, format!("Migration failed: {}", e), elapsed, e)
            }
        }
    }

    async fn apply(
        &self,
        file: &MigrationFile,
        direction: Direction,
        history_timestamp: &str,
        transaction: bool,
        started: Instant,
    ) -> Result<(), MigrationError> {
        let mut runner = self.query_runner().await?;

        if transaction {
            runner.begin_transaction().await?;
        }

        match self
            .apply_in(runner.as_mut(), file, direction, history_timestamp, started)
            .await
        {
            Ok(()) => {
                if runner.is_transaction_active() {
                    runner.commit_transaction().await?;
                }
                Ok(())
            }
            Err(e) => {
                if runner.is_transaction_active() {
                    if let Err(rollback_error) = runner.rollback_transaction().await {
                        warn!(
                            migration = %file.name,
                            error = %rollback_error,
                            "Rollback failed"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn apply_in(
        &self,
        runner: &mut dyn QueryRunner,
        file: &MigrationFile,
        direction: Direction,
        history_timestamp: &str,
        started: Instant,
    ) -> Result<(), MigrationError> {
        let migration = self.source.load(file).await?;

        let execution = match direction {
            Direction::Up => migration.up(runner).await,
            Direction::Down => migration.down(runner).await,
        };
        execution.map_err(|source| MigrationError::Execution {
            migration: file.name.clone(),
            source,
        })?;

        match direction {
            Direction::Up => {
                let sql = self.dialect.insert_record_sql(&self.migrations_table);
                let params = [
                    SqlValue::from(file.name.as_str()),
                    SqlValue::from(history_timestamp),
                    SqlValue::Text(format_datetime(&chrono::Utc::now())),
                    SqlValue::Integer(elapsed_millis(started)),
                ];
                runner.query(&sql, &params).await?;
            }
            Direction::Down => {
                let sql = self.dialect.delete_record_sql(&self.migrations_table);
                let params = [
                    SqlValue::from(file.name.as_str()),
                    SqlValue::from(history_timestamp),
                ];
                runner.query(&sql, &params).await?;
            }
        }

        Ok(())
    }
}

/// マイグレーションの雛形を生成する（DB接続は不要）
///
/// # Arguments
///
/// * `dialect` - タイムスタンプ生成に使う方言
/// * `kind` - 雛形の種類
/// * `options` - 名前、タイムスタンプ、dry-run
pub fn generate_migration(
    dialect: &dyn MigrationDialect,
    kind: TemplateKind,
    options: &CreateMigrationOptions,
) -> Result<GeneratedMigration, MigrationError> {
    let name = normalize_migration_name(&options.name)?;

    let timestamp = match options.timestamp.as_deref() {
        Some(ts) if is_valid_timestamp(ts) => ts.to_string(),
        Some(ts) => {
            return Err(MigrationError::InvalidTimestamp {
                timestamp: ts.to_string(),
            })
        }
        None => dialect.generate_timestamp(),
    };

    let display_name = name.replace('_', " ");
    let file_name = format!("{}.{}", file_stem(&timestamp, &name), kind.extension());
    let contents = render(kind, &display_name, &timestamp);

    info!(file = %file_name, dry_run = options.dry_run, "Generated migration template");
    debug!(contents = %contents, "Migration template");

    Ok(GeneratedMigration {
        file_name,
        timestamp,
        contents,
        dry_run: options.dry_run,
    })
}

/// 名前を検証し、空白の連続をアンダースコアに置換する
fn normalize_migration_name(name: &str) -> Result<String, MigrationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(MigrationError::InvalidName {
            name: name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }

    if trimmed.contains(['/', '\\']) {
        return Err(MigrationError::InvalidName {
            name: name.to_string(),
            reason: "name must not contain path separators".to_string(),
        });
    }

    Ok(trimmed.split_whitespace().collect::<Vec<_>>().join("_"))
}

/// 実装が見つからない実行記録の取り消し結果
fn missing_implementation(record: &MigrationRecord, options: &RunOptions) -> MigrationResult {
    let stem = file_stem(&record.timestamp, &record.name);
    let file = MigrationFile::new(
        record.name.clone(),
        record.timestamp.clone(),
        stem.clone(),
        PathBuf::from(stem),
    );

    if options.dry_run {
        return MigrationResult::succeeded(
            &file,
            Direction::Down.dry_run_message().to_string(),
            None,
        );
    }

    let error = MigrationError::Load {
        migration: record.name.clone(),
        reason: "the migration was executed but its implementation can no longer be found"
            .to_string(),
    };
    warn!(migration = %record.name, "Cannot revert migration without implementation");
    MigrationResult::failed(&file, format!("Migration failed: {}", error), 0, error)
}

fn elapsed_millis(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_migration_name() {
        assert_eq!(
            normalize_migration_name("  create   users table ").unwrap(),
            "create_users_table"
        );
        assert!(normalize_migration_name("   ").is_err());
        assert!(normalize_migration_name("../escape").is_err());
    }

    #[test]
    fn test_generate_migration() {
        let dialect = create_dialect(DatabaseType::Sqlite);
        let options = CreateMigrationOptions {
            name: "create users table".to_string(),
            timestamp: Some("20240101000000".to_string()),
            dry_run: true,
        };

        let generated = generate_migration(dialect.as_ref(), TemplateKind::Sql, &options).unwrap();
        assert_eq!(generated.file_name, "20240101000000_create_users_table.sql");
        assert!(generated.contents.contains("-- Migration: create users table"));
        assert!(generated.dry_run);

        let generated = generate_migration(dialect.as_ref(), TemplateKind::Rust, &options).unwrap();
        assert_eq!(generated.file_name, "20240101000000_create_users_table.rs");
        assert!(generated.contents.contains("CreateUsersTable20240101000000"));
    }

    #[test]
    fn test_generate_migration_rejects_bad_timestamp() {
        let dialect = create_dialect(DatabaseType::Postgres);
        let options = CreateMigrationOptions {
            name: "x".to_string(),
            timestamp: Some("2024-01-01".to_string()),
            dry_run: false,
        };

        let err = generate_migration(dialect.as_ref(), TemplateKind::Sql, &options).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_generate_migration_uses_dialect_timestamp() {
        let dialect = create_dialect(DatabaseType::Sqlite);
        let options = CreateMigrationOptions {
            name: "add index".to_string(),
            ..CreateMigrationOptions::default()
        };

        let generated = generate_migration(dialect.as_ref(), TemplateKind::Sql, &options).unwrap();
        assert_eq!(generated.timestamp.len(), 14);
        assert!(generated.file_name.ends_with("_add_index.sql"));
    }

    #[test]
    fn test_missing_implementation_is_load_error() {
        let record = MigrationRecord::new(
            "removed".to_string(),
            "20240101000000".to_string(),
            3,
        );

        let result = missing_implementation(&record, &RunOptions::default());
        assert!(!result.success);
        assert!(result.error.as_ref().unwrap().is_load());

        let dry = missing_implementation(
            &record,
            &RunOptions {
                dry_run: true,
                ..RunOptions::default()
            },
        );
        assert!(dry.success);
    }
}
