// revertコマンドハンドラー
//
// 実行済みマイグレーションを新しい順に取り消します。
// 既定では直近の1件のみを対象にします。

use crate::cli::commands::run::BatchOutput;
use crate::core::migration::RunOptions;
use crate::services::migration_manager::MigrationManager;
use anyhow::Result;

/// revertコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct RevertCommand {
    /// 取り消す件数（未指定時は1件）
    pub step: Option<usize>,
    /// 実行せずに対象だけを報告する
    pub dry_run: bool,
    /// マイグレーションごとにトランザクションを張る
    pub transaction: bool,
}

/// revertコマンドハンドラー
#[derive(Debug, Clone)]
pub struct RevertCommandHandler {}

impl RevertCommandHandler {
    /// 新しいRevertCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// revertコマンドを実行
    ///
    /// # Arguments
    ///
    /// * `manager` - マイグレーションマネージャー
    /// * `command` - revertコマンドのパラメータ
    pub async fn execute(
        &self,
        manager: &MigrationManager,
        command: &RevertCommand,
    ) -> Result<BatchOutput> {
        let options = RunOptions {
            dry_run: command.dry_run,
            step: command.step,
            transaction: command.transaction,
        };
        let results = manager.revert_migrations(&options).await?;

        Ok(BatchOutput {
            dry_run: command.dry_run,
            results,
        })
    }
}

impl Default for RevertCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}
