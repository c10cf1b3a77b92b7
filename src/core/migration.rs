// マイグレーションドメインモデル
//
// マイグレーションの検出結果、実行履歴、実行結果、集計を表現する型システム。
// MigrationFile, MigrationRecord, MigrationResult, MigrationStats などの構造体を提供します。

use crate::core::error::MigrationError;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::sync::Arc;

/// タイムスタンプ形式が有効かどうかを検証する
///
/// 有効な形式: 数字のみで構成された14桁の文字列 (YYYYMMDDHHmmss)
pub fn is_valid_timestamp(s: &str) -> bool {
    s.len() == 14 && s.chars().all(|c| c.is_ascii_digit())
}

/// 検出されたマイグレーション
///
/// 1回の検出処理の中では不変です。タイムスタンプは固定幅のため、
/// 文字列の辞書順がそのまま時系列順になります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    /// マイグレーション名（ファイル名のアンダースコアは空白に置換済み）
    pub name: String,

    /// タイムスタンプ（YYYYMMDDHHmmss）
    pub timestamp: String,

    /// ファイル名（例: 20240101000000_create_users.sql）
    pub file_name: String,

    /// 実装の解決に使うパス
    pub file_path: PathBuf,
}

impl MigrationFile {
    /// 新しいマイグレーションファイルを作成
    pub fn new(name: String, timestamp: String, file_name: String, file_path: PathBuf) -> Self {
        Self {
            name,
            timestamp,
            file_name,
            file_path,
        }
    }

    /// タイムスタンプ、名前の順で比較するためのキー
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.timestamp, &self.name)
    }
}

/// マイグレーション記録
///
/// マイグレーション履歴テーブルの1行に対応します。
/// up() 成功時に作成され、down() 成功時に削除されます。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationRecord {
    /// マイグレーション名
    pub name: String,

    /// タイムスタンプ
    pub timestamp: String,

    /// 実行日時
    pub executed_at: DateTime<Utc>,

    /// 実行時間（ミリ秒）
    pub execution_time: i64,
}

impl MigrationRecord {
    /// 新しいマイグレーション記録を作成
    pub fn new(name: String, timestamp: String, execution_time: i64) -> Self {
        Self {
            name,
            timestamp,
            executed_at: Utc::now(),
            execution_time,
        }
    }
}

/// マイグレーション1件分の実行結果（永続化されない）
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// 成功したかどうか
    pub success: bool,

    /// メッセージ
    pub message: String,

    /// 対象マイグレーション名（「保留なし」の結果では None）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<String>,

    /// 対象マイグレーションのタイムスタンプ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// 実行時間（ミリ秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<i64>,

    /// 失敗時の元エラー
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<Arc<MigrationError>>,
}

fn serialize_error<S>(error: &Option<Arc<MigrationError>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(error) => serializer.serialize_str(&format!("{:#}", error)),
        None => serializer.serialize_none(),
    }
}

impl MigrationResult {
    /// 成功結果を作成
    pub fn succeeded(file: &MigrationFile, message: String, execution_time: Option<i64>) -> Self {
        Self {
            success: true,
            message,
            migration: Some(file.name.clone()),
            timestamp: Some(file.timestamp.clone()),
            execution_time,
            error: None,
        }
    }

    /// 失敗結果を作成
    pub fn failed(
        file: &MigrationFile,
        message: String,
        execution_time: i64,
        error: MigrationError,
    ) -> Self {
        Self {
            success: false,
            message,
            migration: Some(file.name.clone()),
            timestamp: Some(file.timestamp.clone()),
            execution_time: Some(execution_time),
            error: Some(Arc::new(error)),
        }
    }

    /// 対象がない場合の合成結果を作成
    pub fn nothing_to_do(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            migration: None,
            timestamp: None,
            execution_time: None,
            error: None,
        }
    }

    /// 特定のマイグレーションに対する結果かどうか
    pub fn is_synthetic(&self) -> bool {
        self.migration.is_none()
    }
}

/// run/revert の実行オプション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// 実行せずに対象だけを報告する
    pub dry_run: bool,

    /// 処理する最大件数（run: 既定は全件、revert: 既定は1件）
    pub step: Option<usize>,

    /// マイグレーションごとにトランザクションを張る
    ///
    /// true の場合は失敗した時点でバッチを停止し、false の場合は失敗後も続行します。
    pub transaction: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            step: None,
            transaction: true,
        }
    }
}

/// show の実行オプション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowOptions {
    /// マイグレーションごとの状態をログに出力する
    pub verbose: bool,
}

/// create の実行オプション
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateMigrationOptions {
    /// マイグレーション名
    pub name: String,

    /// 明示的なタイムスタンプ（未指定時は現在時刻）
    pub timestamp: Option<String>,

    /// ファイルを書き出さずにテンプレートだけを返す
    pub dry_run: bool,
}

/// 生成されたマイグレーションの雛形
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedMigration {
    /// ファイル名
    pub file_name: String,

    /// タイムスタンプ
    pub timestamp: String,

    /// 雛形の内容
    pub contents: String,

    /// dry-run で生成されたかどうか
    pub dry_run: bool,
}

/// マイグレーション1件の状態
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub timestamp: String,
    pub file_name: String,
    pub executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<i64>,
}

/// 検出済みマイグレーションと実行記録の結合結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationStats {
    /// 検出されたマイグレーション数
    pub total: usize,

    /// 実行済み件数
    pub executed: usize,

    /// 保留中の件数
    pub pending: usize,

    /// 各マイグレーションの状態（タイムスタンプ昇順）
    pub migrations: Vec<MigrationStatus>,
}

impl MigrationStats {
    /// 検出結果と実行記録から集計を作成
    pub fn from_parts(files: &[MigrationFile], records: &[MigrationRecord]) -> Self {
        let migrations: Vec<MigrationStatus> = files
            .iter()
            .map(|file| {
                let record = records.iter().find(|r| r.name == file.name);
                MigrationStatus {
                    name: file.name.clone(),
                    timestamp: file.timestamp.clone(),
                    file_name: file.file_name.clone(),
                    executed: record.is_some(),
                    executed_at: record.map(|r| r.executed_at),
                    execution_time: record.map(|r| r.execution_time),
                }
            })
            .collect();

        let executed = migrations.iter().filter(|m| m.executed).count();

        Self {
            total: migrations.len(),
            executed,
            pending: migrations.len() - executed,
            migrations,
        }
    }

    /// 保留中のマイグレーション
    pub fn pending_migrations(&self) -> impl Iterator<Item = &MigrationStatus> {
        self.migrations.iter().filter(|m| !m.executed)
    }

    /// 実行済みのマイグレーション
    pub fn executed_migrations(&self) -> impl Iterator<Item = &MigrationStatus> {
        self.migrations.iter().filter(|m| m.executed)
    }
}
