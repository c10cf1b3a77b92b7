// runコマンドハンドラー
//
// 保留中のマイグレーションをタイムスタンプ昇順に実行し、
// 1件ごとの結果を表示します。

use crate::cli::commands::CommandOutput;
use crate::core::migration::{MigrationResult, RunOptions};
use crate::services::migration_manager::MigrationManager;
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

/// runコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct RunCommand {
    /// 実行する最大件数
    pub step: Option<usize>,
    /// 実行せずに対象だけを報告する
    pub dry_run: bool,
    /// マイグレーションごとにトランザクションを張る
    pub transaction: bool,
}

/// run/revert の結果一覧
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    pub dry_run: bool,
    pub results: Vec<MigrationResult>,
}

impl BatchOutput {
    /// 失敗した結果の件数
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

impl CommandOutput for BatchOutput {
    fn to_text(&self) -> String {
        let mut output = String::new();

        for result in &self.results {
            let line = match (&result.migration, result.success) {
                (None, _) => result.message.clone(),
                (Some(name), true) if self.dry_run => {
                    format!("{} {}: {}", "[DRY RUN]".yellow(), name, result.message)
                }
                (Some(name), true) => format!(
                    "{} {} ({}ms)",
                    "✓".green(),
                    name,
                    result.execution_time.unwrap_or(0)
                ),
                (Some(name), false) => {
                    let mut line = format!("{} {} - {}", "✗".red(), name, result.message);
                    if let Some(error) = &result.error {
                        line.push_str(&format!("\n    {:#}", error));
                    }
                    line
                }
            };
            output.push_str(&line);
            output.push('\n');
        }

        let failed = self.failed_count();
        if failed > 0 {
            output.push_str(&format!("\n{} {} migration(s) failed", "✗".red(), failed));
        }

        output.trim_end().to_string()
    }

    fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

/// runコマンドハンドラー
#[derive(Debug, Clone)]
pub struct RunCommandHandler {}

impl RunCommandHandler {
    /// 新しいRunCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// runコマンドを実行
    ///
    /// # Arguments
    ///
    /// * `manager` - マイグレーションマネージャー
    /// * `command` - runコマンドのパラメータ
    pub async fn execute(
        &self,
        manager: &MigrationManager,
        command: &RunCommand,
    ) -> Result<BatchOutput> {
        let options = RunOptions {
            dry_run: command.dry_run,
            step: command.step,
            transaction: command.transaction,
        };
        let results = manager.run_migrations(&options).await?;

        Ok(BatchOutput {
            dry_run: command.dry_run,
            results,
        })
    }
}

impl Default for RunCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}
