// showコマンドハンドラー
//
// 検出済みマイグレーションと実行記録を突き合わせて一覧表示します。

use crate::cli::commands::CommandOutput;
use crate::core::migration::{MigrationStats, ShowOptions};
use crate::services::migration_manager::MigrationManager;
use anyhow::Result;
use serde::Serialize;

/// showコマンドの入力パラメータ
#[derive(Debug, Clone, Default)]
pub struct ShowCommand {
    /// 各マイグレーションの状態をログに出力する
    pub verbose: bool,
}

/// showコマンドの出力
#[derive(Debug, Clone, Serialize)]
pub struct ShowOutput {
    #[serde(flatten)]
    pub stats: MigrationStats,
}

impl CommandOutput for ShowOutput {
    fn to_text(&self) -> String {
        let mut output = String::new();
        output.push_str("=== Migration Status ===\n\n");

        if self.stats.migrations.is_empty() {
            output.push_str("No migrations found.\n");
            output.push_str("\nUse the `create` command to create migrations.\n");
            return output.trim_end().to_string();
        }

        output.push_str(&format!(
            "{:<16} {:<40} {:<25}\n",
            "Timestamp", "Name", "Status"
        ));
        output.push_str(&format!("{}\n", "-".repeat(81)));

        for status in &self.stats.migrations {
            let status_display = match status.executed_at {
                Some(at) if status.executed => {
                    format!("✓ Executed {}", at.format("%Y-%m-%d %H:%M:%S"))
                }
                _ => "  Pending".to_string(),
            };
            output.push_str(&format!(
                "{:<16} {:<40} {:<25}\n",
                status.timestamp, status.name, status_display
            ));
        }

        output.push_str(&format!("\n{}\n", "-".repeat(81)));
        output.push_str(&format!(
            "Total: {} (Executed: {}, Pending: {})",
            self.stats.total, self.stats.executed, self.stats.pending
        ));

        output
    }
}

/// showコマンドハンドラー
#[derive(Debug, Clone)]
pub struct ShowCommandHandler {}

impl ShowCommandHandler {
    /// 新しいShowCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// showコマンドを実行
    pub async fn execute(
        &self,
        manager: &MigrationManager,
        command: &ShowCommand,
    ) -> Result<ShowOutput> {
        let stats = manager
            .show_migrations(&ShowOptions {
                verbose: command.verbose,
            })
            .await?;
        Ok(ShowOutput { stats })
    }
}

impl Default for ShowCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}
