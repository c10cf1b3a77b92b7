// verifyコマンドハンドラー
//
// デプロイ時のヘルスチェックとしてマイグレーション状態を検証します。
// 設定ファイルの verification セクションを既定値とし、CLIフラグで上書きします。

use crate::cli::commands::CommandOutput;
use crate::core::verification::{ActionType, VerificationResult, VerifyOptions};
use crate::services::migration_verifier::MigrationVerifier;
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

/// verifyコマンドの入力パラメータ
#[derive(Debug, Clone, Default)]
pub struct VerifyCommand {
    pub auto_run: bool,
    pub dry_run: bool,
    pub warn_only: bool,
    pub max_pending: Option<usize>,
    pub ignore_missing_table: bool,
    pub seed: bool,
}

impl VerifyCommand {
    /// 設定由来のオプションにフラグを重ねる（フラグは有効化のみ）
    pub fn apply_to(&self, base: VerifyOptions) -> VerifyOptions {
        let mut options = base;
        options.auto_run |= self.auto_run;
        options.dry_run |= self.dry_run;
        options.warn_only |= self.warn_only;
        options.ignore_missing_migrations_table |= self.ignore_missing_table;
        options.seed.auto_run |= self.seed;
        if let Some(max_pending) = self.max_pending {
            options.max_pending_migrations = max_pending;
        }
        options
    }
}

/// verifyコマンドの出力
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutput {
    #[serde(flatten)]
    pub result: VerificationResult,
}

impl CommandOutput for VerifyOutput {
    fn to_text(&self) -> String {
        let result = &self.result;
        let mut output = String::new();

        if result.success {
            output.push_str(&format!("{} Migration verification passed\n", "✓".green()));
        } else {
            output.push_str(&format!("{} Migration verification failed\n", "✗".red()));
        }

        output.push_str(&format!(
            "  Migrations: {} total, {} executed, {} pending\n",
            result.total_migrations, result.executed_migrations, result.pending_migrations
        ));
        if !result.migrations_table_exists {
            output.push_str("  Migrations table does not exist\n");
        }

        for action in &result.actions {
            let marker = match action.action_type {
                ActionType::Ran => "✓".green(),
                ActionType::Failed => "✗".red(),
                ActionType::Pending => "…".yellow(),
                ActionType::Skipped => "-".normal(),
            };
            let mut line = format!("  {} {}: {}", marker, action.migration, action.message);
            if let Some(ms) = action.execution_time {
                line.push_str(&format!(" ({}ms)", ms));
            }
            output.push_str(&line);
            output.push('\n');
        }

        for warning in &result.warnings {
            output.push_str(&format!("  {} {}\n", "Warning:".yellow(), warning));
        }
        for error in &result.errors {
            output.push_str(&format!("  {} {}\n", "Error:".red(), error));
        }

        output.trim_end().to_string()
    }

    fn is_success(&self) -> bool {
        self.result.success
    }
}

/// verifyコマンドハンドラー
#[derive(Debug, Clone)]
pub struct VerifyCommandHandler {}

impl VerifyCommandHandler {
    /// 新しいVerifyCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// verifyコマンドを実行
    ///
    /// # Arguments
    ///
    /// * `verifier` - 検証サービス
    /// * `base` - 設定ファイル由来の検証ポリシー
    /// * `command` - verifyコマンドのパラメータ
    pub async fn execute(
        &self,
        verifier: &MigrationVerifier,
        base: VerifyOptions,
        command: &VerifyCommand,
    ) -> Result<VerifyOutput> {
        let options = command.apply_to(base);
        let result = verifier.verify(&options).await;
        MigrationVerifier::log_result(&result, options.log_level);
        Ok(VerifyOutput { result })
    }
}

impl Default for VerifyCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}
