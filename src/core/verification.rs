// 起動時検証モデル
//
// マイグレーション検証ポリシー（VerifyOptions）と、1回の verify() 呼び出しが
// 返す VerificationResult、その過程で記録される MigrationAction を定義します。

use crate::core::error::MigrationError;
use serde::{Deserialize, Serialize, Serializer};
use std::str::FromStr;
use std::sync::Arc;

/// ログ出力レベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// 指定レベルの出力を許可するかどうか
    pub fn allows(&self, level: LogLevel) -> bool {
        level != LogLevel::Silent && *self >= level
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "silent" | "off" | "none" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!(
                "Unknown log level '{}'. Expected one of: silent, error, warn, info, debug",
                other
            )),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Silent => "silent",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        write!(f, "{}", s)
    }
}

/// シードステップへ明示的に渡す設定
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SeedConfig {
    pub master_email: Option<String>,
    pub master_name: Option<String>,
    pub master_password: Option<String>,
    /// 既にシード済みでも再実行する
    pub force: bool,
    /// 記録だけ行い、ステージングしない
    pub dry_run: bool,
}

// パスワードをログに出さない
impl std::fmt::Debug for SeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedConfig")
            .field("master_email", &self.master_email)
            .field("master_name", &self.master_name)
            .field(
                "master_password",
                &self.master_password.as_ref().map(|_| "********"),
            )
            .field("force", &self.force)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// シード評価のオプション
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedOptions {
    /// シードステップを評価する
    pub auto_run: bool,
    /// シードステップへ渡す設定
    pub config: SeedConfig,
}

/// verify() のポリシー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    /// 保留中のマイグレーションを自動実行する
    pub auto_run: bool,
    /// 自動実行を dry-run で行う
    pub dry_run: bool,
    /// 保留があっても失敗扱いにしない
    pub warn_only: bool,
    /// 許容する保留件数の上限
    pub max_pending_migrations: usize,
    /// 履歴テーブルが無い場合に作成せず成功を返す
    pub ignore_missing_migrations_table: bool,
    /// log_result の出力レベル
    pub log_level: LogLevel,
    /// シード評価
    pub seed: SeedOptions,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            auto_run: false,
            dry_run: false,
            warn_only: false,
            max_pending_migrations: 10,
            ignore_missing_migrations_table: false,
            log_level: LogLevel::Info,
            seed: SeedOptions::default(),
        }
    }
}

/// 検証中に記録されるアクションの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Ran,
    Skipped,
    Failed,
    Pending,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::Ran => "RAN",
            ActionType::Skipped => "SKIPPED",
            ActionType::Failed => "FAILED",
            ActionType::Pending => "PENDING",
        };
        write!(f, "{}", s)
    }
}

/// 検証中の是正ステップのログエントリ
#[derive(Debug, Clone, Serialize)]
pub struct MigrationAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub migration: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<i64>,
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

impl MigrationAction {
    /// エラーを伴わないアクションを作成
    pub fn new(action_type: ActionType, migration: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action_type,
            migration: migration.into(),
            message: message.into(),
            execution_time: None,
            error: None,
        }
    }
}

/// 検証の進行段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStage {
    #[default]
    NotVerified,
    TableChecked,
    StatsComputed,
    AutorunExecuted,
    SeedEvaluated,
    Finalized,
}

/// 1回の verify() の出力
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationResult {
    pub success: bool,
    pub migrations_table_exists: bool,
    pub pending_migrations: usize,
    pub executed_migrations: usize,
    pub total_migrations: usize,
    pub seed_data_executed: bool,
    pub actions: Vec<MigrationAction>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// 最後に到達した段階
    pub stage: VerificationStage,
}

/// 表示用の1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub level: LogLevel,
    pub text: String,
}

impl VerificationResult {
    /// 初期状態の結果を作成（成功扱いから開始）
    pub fn new() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// アクションを追加
    pub fn add_action(&mut self, action: MigrationAction) {
        self.actions.push(action);
    }

    /// 警告を追加
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// エラーを追加（成功フラグを落とす）
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.success = false;
    }

    /// エラーが記録されているかどうか
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 指定レベルで表示する行を組み立てる
    ///
    /// 副作用を持たないため、出力先（ログ、標準出力）は呼び出し側で選びます。
    pub fn report(&self, level: LogLevel) -> Vec<ReportLine> {
        let mut lines = Vec::new();
        let mut push = |line_level: LogLevel, text: String| {
            if level.allows(line_level) {
                lines.push(ReportLine {
                    level: line_level,
                    text,
                });
            }
        };

        let headline = if self.success {
            "Migration verification passed"
        } else {
            "Migration verification failed"
        };
        push(
            if self.success {
                LogLevel::Info
            } else {
                LogLevel::Error
            },
            headline.to_string(),
        );

        push(
            LogLevel::Info,
            format!(
                "Migrations: {} total, {} executed, {} pending (table exists: {})",
                self.total_migrations,
                self.executed_migrations,
                self.pending_migrations,
                self.migrations_table_exists
            ),
        );

        if self.seed_data_executed {
            push(LogLevel::Info, "Seed data staged".to_string());
        }

        for action in &self.actions {
            let mut text = format!("[{}] {}: {}", action.action_type, action.migration, action.message);
            if let Some(ms) = action.execution_time {
                text.push_str(&format!(" ({}ms)", ms));
            }
            let line_level = match action.action_type {
                ActionType::Failed => LogLevel::Error,
                _ => LogLevel::Debug,
            };
            push(line_level, text);
        }

        for warning in &self.warnings {
            push(LogLevel::Warn, format!("Warning: {}", warning));
        }

        for error in &self.errors {
            push(LogLevel::Error, format!("Error: {}", error));
        }

        lines
    }
}
