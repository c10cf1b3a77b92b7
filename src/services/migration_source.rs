// マイグレーションソース
//
// マイグレーションの検出と実装の読み込みを抽象化します。
// コード内で登録する MigrationRegistry と、ディレクトリ上のSQLファイルを
// 検出する SqlDirectorySource の2つの実装を提供します。

use crate::adapters::query_runner::QueryRunner;
use crate::core::error::MigrationError;
use crate::core::migration::{is_valid_timestamp, MigrationFile};
use crate::core::naming::SQL_MIGRATION_EXTENSION;
use crate::services::migration_template::TemplateKind;
use crate::services::sql_statements::split_sql_statements;
use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// マイグレーション1件の実装
#[async_trait]
pub trait Migration: Send + Sync {
    /// マイグレーション名（空白区切り、例: "create users"）
    fn name(&self) -> &str;

    /// タイムスタンプ（YYYYMMDDHHmmss）
    fn timestamp(&self) -> &str;

    /// スキーマ変更を適用
    async fn up(&self, runner: &mut dyn QueryRunner) -> anyhow::Result<()>;

    /// スキーマ変更を取り消す（既定では何もしない）
    async fn down(&self, _runner: &mut dyn QueryRunner) -> anyhow::Result<()> {
        Ok(())
    }
}

/// マイグレーションの供給元
#[async_trait]
pub trait MigrationSource: Send + Sync {
    /// マイグレーションを検出する（タイムスタンプ、名前の昇順）
    ///
    /// 列挙できない場合は警告を出して空のリストを返します。
    fn discover(&self) -> Vec<MigrationFile>;

    /// 検出済みマイグレーションの実装を読み込む
    async fn load(&self, file: &MigrationFile) -> Result<Arc<dyn Migration>, MigrationError>;

    /// create_migration が生成する雛形の種類
    fn template_kind(&self) -> TemplateKind {
        TemplateKind::Sql
    }
}

fn sort_files(files: &mut [MigrationFile]) {
    files.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// 名前のアンダースコア区切り表記（ファイル名用）
pub fn file_stem(timestamp: &str, name: &str) -> String {
    format!("{}_{}", timestamp, name.replace(' ', "_"))
}

/// コード内で登録されたマイグレーションの一覧
#[derive(Default, Clone)]
pub struct MigrationRegistry {
    migrations: Vec<Arc<dyn Migration>>,
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.migrations.iter().map(|m| file_stem(m.timestamp(), m.name())))
            .finish()
    }
}

impl MigrationRegistry {
    /// 空のレジストリを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// マイグレーションを登録
    ///
    /// タイムスタンプが14桁でない場合、または同名のマイグレーションが
    /// 登録済みの場合はエラーを返します。
    pub fn register<M>(&mut self, migration: M) -> Result<&mut Self, MigrationError>
    where
        M: Migration + 'static,
    {
        if !is_valid_timestamp(migration.timestamp()) {
            return Err(MigrationError::InvalidTimestamp {
                timestamp: migration.timestamp().to_string(),
            });
        }

        if migration.name().trim().is_empty() {
            return Err(MigrationError::InvalidName {
                name: migration.name().to_string(),
                reason: "name must not be empty".to_string(),
            });
        }

        if self.migrations.iter().any(|m| m.name() == migration.name()) {
            return Err(MigrationError::InvalidName {
                name: migration.name().to_string(),
                reason: "a migration with this name is already registered".to_string(),
            });
        }

        self.migrations.push(Arc::new(migration));
        Ok(self)
    }

    /// 登録件数
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[async_trait]
impl MigrationSource for MigrationRegistry {
    fn discover(&self) -> Vec<MigrationFile> {
        let mut files: Vec<MigrationFile> = self
            .migrations
            .iter()
            .map(|m| {
                let stem = file_stem(m.timestamp(), m.name());
                MigrationFile::new(
                    m.name().to_string(),
                    m.timestamp().to_string(),
                    stem.clone(),
                    PathBuf::from(stem),
                )
            })
            .collect();
        sort_files(&mut files);
        files
    }

    async fn load(&self, file: &MigrationFile) -> Result<Arc<dyn Migration>, MigrationError> {
        self.migrations
            .iter()
            .find(|m| m.name() == file.name && m.timestamp() == file.timestamp)
            .cloned()
            .ok_or_else(|| MigrationError::Load {
                migration: file.name.clone(),
                reason: "no migration with this name and timestamp is registered".to_string(),
            })
    }

    fn template_kind(&self) -> TemplateKind {
        TemplateKind::Rust
    }
}

/// ディレクトリ上のSQLマイグレーションファイル
///
/// ファイル名は `<14桁のタイムスタンプ>_<名前>.<拡張子>` 形式で、
/// 名前のアンダースコアは空白に置換されます。
#[derive(Debug, Clone)]
pub struct SqlDirectorySource {
    dir: PathBuf,
    extension: String,
}

impl SqlDirectorySource {
    /// 既定の拡張子（sql）でソースを作成
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_extension(dir, SQL_MIGRATION_EXTENSION)
    }

    /// 拡張子を指定してソースを作成
    pub fn with_extension(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// 対象ディレクトリ
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_pattern(&self) -> Result<Regex, regex::Error> {
        Regex::new(&format!(
            r"^(\d{{14}})_(.+)\.{}$",
            regex::escape(&self.extension)
        ))
    }

    fn read_files(&self) -> Result<Vec<MigrationFile>, MigrationError> {
        let discovery_error = |cause: String| MigrationError::Discovery {
            path: self.dir.clone(),
            cause,
        };

        let pattern = self.file_pattern().map_err(|e| discovery_error(e.to_string()))?;
        let entries = std::fs::read_dir(&self.dir).map_err(|e| discovery_error(e.to_string()))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| discovery_error(e.to_string()))?;
            let file_name = entry.file_name().to_string_lossy().to_string();

            if let Some(captures) = pattern.captures(&file_name) {
                let timestamp = captures[1].to_string();
                let name = captures[2].replace('_', " ");
                files.push(MigrationFile::new(name, timestamp, file_name, entry.path()));
            } else {
                debug!(file = %file_name, "Skipping file that is not a migration");
            }
        }

        sort_files(&mut files);
        Ok(files)
    }
}

#[async_trait]
impl MigrationSource for SqlDirectorySource {
    fn discover(&self) -> Vec<MigrationFile> {
        match self.read_files() {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Migration discovery failed, continuing with no migrations");
                Vec::new()
            }
        }
    }

    async fn load(&self, file: &MigrationFile) -> Result<Arc<dyn Migration>, MigrationError> {
        let content = tokio::fs::read_to_string(&file.file_path)
            .await
            .map_err(|e| MigrationError::Load {
                migration: file.name.clone(),
                reason: format!("cannot read {:?}: {}", file.file_path, e),
            })?;

        let migration = SqlFileMigration::parse(file, &content)?;
        Ok(Arc::new(migration))
    }
}

/// SQLファイル本文の区切りマーカー
const UP_MARKER: &str = "-- migrate:up";
const DOWN_MARKER: &str = "-- migrate:down";

/// SQLファイルから読み込んだマイグレーション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFileMigration {
    name: String,
    timestamp: String,
    up: Vec<String>,
    down: Vec<String>,
}

impl SqlFileMigration {
    /// `-- migrate:up` と `-- migrate:down` セクションを解析する
    ///
    /// up セクションは必須です。down セクションが無い場合、down() は何もしません。
    pub fn parse(file: &MigrationFile, content: &str) -> Result<Self, MigrationError> {
        let mut up = String::new();
        let mut down = String::new();
        let mut section: Option<&mut String> = None;
        let mut saw_up = false;

        for line in content.lines() {
            let marker = line.trim().to_ascii_lowercase();
            if marker == UP_MARKER {
                saw_up = true;
                section = Some(&mut up);
                continue;
            }
            if marker == DOWN_MARKER {
                section = Some(&mut down);
                continue;
            }
            if let Some(buffer) = section.as_mut() {
                buffer.push_str(line);
                buffer.push('\n');
            }
        }

        if !saw_up {
            return Err(MigrationError::Load {
                migration: file.name.clone(),
                reason: format!("missing '{}' section", UP_MARKER),
            });
        }

        Ok(Self {
            name: file.name.clone(),
            timestamp: file.timestamp.clone(),
            up: split_sql_statements(&up),
            down: split_sql_statements(&down),
        })
    }

    /// up セクションの文
    pub fn up_statements(&self) -> &[String] {
        &self.up
    }

    /// down セクションの文
    pub fn down_statements(&self) -> &[String] {
        &self.down
    }

    async fn execute_all(
        &self,
        runner: &mut dyn QueryRunner,
        statements: &[String],
    ) -> anyhow::Result<()> {
        for (index, statement) in statements.iter().enumerate() {
            runner
                .execute(statement)
                .await
                .with_context(|| format!("Statement #{} failed", index + 1))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Migration for SqlFileMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }

    async fn up(&self, runner: &mut dyn QueryRunner) -> anyhow::Result<()> {
        self.execute_all(runner, &self.up).await
    }

    async fn down(&self, runner: &mut dyn QueryRunner) -> anyhow::Result<()> {
        self.execute_all(runner, &self.down).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Noop {
        name: &'static str,
        timestamp: &'static str,
    }

    #[async_trait]
    impl Migration for Noop {
        fn name(&self) -> &str {
            self.name
        }

        fn timestamp(&self) -> &str {
            self.timestamp
        }

        async fn up(&self, _runner: &mut dyn QueryRunner) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn migration_file(timestamp: &str, name: &str) -> MigrationFile {
        let stem = file_stem(timestamp, name);
        MigrationFile::new(
            name.to_string(),
            timestamp.to_string(),
            format!("{}.sql", stem),
            PathBuf::from(format!("{}.sql", stem)),
        )
    }

    #[test]
    fn test_registry_discovers_in_timestamp_order() {
        let mut registry = MigrationRegistry::new();
        registry
            .register(Noop {
                name: "add index",
                timestamp: "20240103000000",
            })
            .unwrap()
            .register(Noop {
                name: "create users",
                timestamp: "20240101000000",
            })
            .unwrap();

        let files = registry.discover();
        assert_eq!(registry.len(), 2);
        assert_eq!(files[0].name, "create users");
        assert_eq!(files[0].file_name, "20240101000000_create_users");
        assert_eq!(files[1].timestamp, "20240103000000");
    }

    #[test]
    fn test_registry_rejects_invalid_registrations() {
        let mut registry = MigrationRegistry::new();

        let err = registry
            .register(Noop {
                name: "bad",
                timestamp: "2024",
            })
            .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidTimestamp { .. }));

        registry
            .register(Noop {
                name: "create users",
                timestamp: "20240101000000",
            })
            .unwrap();
        let err = registry
            .register(Noop {
                name: "create users",
                timestamp: "20240102000000",
            })
            .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidName { .. }));
    }

    #[tokio::test]
    async fn test_registry_load_unknown_is_load_error() {
        let registry = MigrationRegistry::new();
        let err = registry
            .load(&migration_file("20240101000000", "missing"))
            .await
            .err()
            .unwrap();
        assert!(err.is_load());
    }

    #[test]
    fn test_directory_discovery_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        for name in [
            "20240103000000_add_index.sql",
            "20240101000000_create_users.sql",
            "20240102000000_create_posts.sql",
            "README.md",
            "2024_short.sql",
            "20240104000000_wrong_ext.txt",
        ] {
            fs::write(temp_dir.path().join(name), "-- migrate:up\n").unwrap();
        }

        let files = SqlDirectorySource::new(temp_dir.path()).discover();

        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["create users", "create posts", "add index"]);
        assert_eq!(files[0].file_name, "20240101000000_create_users.sql");
    }

    #[test]
    fn test_directory_discovery_missing_dir_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let source = SqlDirectorySource::new(temp_dir.path().join("does-not-exist"));
        assert!(source.discover().is_empty());
    }

    #[test]
    fn test_custom_extension() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("20240101000000_a.up.sql"), "").unwrap();
        fs::write(temp_dir.path().join("20240102000000_b.sql"), "").unwrap();

        let files = SqlDirectorySource::with_extension(temp_dir.path(), ".up.sql").discover();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "a");
    }

    #[test]
    fn test_parse_sql_sections() {
        let content = "-- migrate:up\nCREATE TABLE users (id INTEGER);\nCREATE INDEX idx ON users (id);\n\n-- migrate:down\nDROP TABLE users;\n";
        let migration =
            SqlFileMigration::parse(&migration_file("20240101000000", "create users"), content)
                .unwrap();

        assert_eq!(migration.up_statements().len(), 2);
        assert_eq!(migration.down_statements(), &["DROP TABLE users".to_string()]);
        assert_eq!(migration.name(), "create users");
    }

    #[test]
    fn test_parse_without_down_section() {
        let migration = SqlFileMigration::parse(
            &migration_file("20240101000000", "create users"),
            "-- migrate:up\nCREATE TABLE users (id INTEGER);\n",
        )
        .unwrap();
        assert!(migration.down_statements().is_empty());
    }

    #[test]
    fn test_parse_without_up_section_fails() {
        let err = SqlFileMigration::parse(
            &migration_file("20240101000000", "create users"),
            "CREATE TABLE users (id INTEGER);",
        )
        .unwrap_err();
        assert!(err.is_load());
    }
}
