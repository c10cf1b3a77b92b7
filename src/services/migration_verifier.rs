// 起動時のマイグレーション検証
//
// MigrationManager をラップし、履歴テーブルの確認、保留件数の評価、
// 保留マイグレーションの自動実行、シードステップの評価を1回の呼び出しで行います。
// verify() は失敗せず、すべての結果を VerificationResult に記録します。

use crate::core::error::MigrationError;
use crate::core::migration::{MigrationStats, RunOptions, ShowOptions};
use crate::core::naming::SEED_MIGRATION_MARKER;
use crate::core::verification::{
    ActionType, LogLevel, MigrationAction, SeedConfig, VerificationResult, VerificationStage,
    VerifyOptions,
};
use crate::services::migration_manager::MigrationManager;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// シード設定をシードマイグレーションへ受け渡すステップ
#[async_trait]
pub trait SeedStage: Send + Sync {
    /// シード設定をステージする
    async fn stage(&self, config: &SeedConfig) -> anyhow::Result<()>;
}

/// シード設定を共有スロットに保持する既定のステージ
///
/// シードマイグレーションは同じスロットの複製から `current()` で設定を読み取ります。
#[derive(Debug, Clone, Default)]
pub struct SeedConfigSlot {
    slot: Arc<RwLock<Option<SeedConfig>>>,
}

impl SeedConfigSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// ステージ済みの設定
    pub async fn current(&self) -> Option<SeedConfig> {
        self.slot.read().await.clone()
    }

    /// ステージ済みの設定を取り出して空にする
    pub async fn take(&self) -> Option<SeedConfig> {
        self.slot.write().await.take()
    }
}

#[async_trait]
impl SeedStage for SeedConfigSlot {
    async fn stage(&self, config: &SeedConfig) -> anyhow::Result<()> {
        *self.slot.write().await = Some(config.clone());
        Ok(())
    }
}

/// 実行済みマイグレーション名がシードマイグレーションを指すかどうか
///
/// 空白・アンダースコア・ハイフンと大文字小文字の違いを無視して比較します。
pub fn is_seed_migration(name: &str) -> bool {
    let normalize = |s: &str| -> String {
        s.chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect()
    };
    normalize(name).contains(&normalize(SEED_MIGRATION_MARKER))
}

/// マイグレーション検証サービス
pub struct MigrationVerifier {
    manager: Arc<MigrationManager>,
    seed_stage: Arc<dyn SeedStage>,
}

impl std::fmt::Debug for MigrationVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationVerifier")
            .field("manager", &self.manager)
            .finish()
    }
}

impl MigrationVerifier {
    /// 既定のシードステージ（SeedConfigSlot）で作成
    pub fn new(manager: Arc<MigrationManager>) -> Self {
        Self {
            manager,
            seed_stage: Arc::new(SeedConfigSlot::new()),
        }
    }

    /// シードステージを差し替える
    pub fn with_seed_stage(mut self, seed_stage: Arc<dyn SeedStage>) -> Self {
        self.seed_stage = seed_stage;
        self
    }

    /// ラップしているマネージャー
    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    /// 検証を実行する
    ///
    /// 予期しないエラーは `errors` に追加され、`success` は false になります。
    pub async fn verify(&self, options: &VerifyOptions) -> VerificationResult {
        let mut result = VerificationResult::new();

        match self.run_checks(options, &mut result).await {
            Ok(true) => finalize(options, &mut result),
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "Migration verification aborted");
                result.add_error(format!("Verification failed: {}", e));
            }
        }

        result.stage = VerificationStage::Finalized;
        result
    }

    /// 検証結果をログに出力する（結果は変更しない）
    pub fn log_result(result: &VerificationResult, level: LogLevel) {
        for line in result.report(level) {
            match line.level {
                LogLevel::Error => error!("{}", line.text),
                LogLevel::Warn => warn!("{}", line.text),
                LogLevel::Info => info!("{}", line.text),
                LogLevel::Debug => debug!("{}", line.text),
                LogLevel::Silent => {}
            }
        }
    }

    /// 各段階を実行する。false の場合は最終判定を行わずに終了する。
    async fn run_checks(
        &self,
        options: &VerifyOptions,
        result: &mut VerificationResult,
    ) -> Result<bool, MigrationError> {
        let table = self.manager.migrations_table().to_string();

        result.migrations_table_exists = self.manager.migrations_table_exists().await?;
        if !result.migrations_table_exists {
            if options.ignore_missing_migrations_table {
                result.add_warning(format!(
                    "Migrations table '{}' does not exist; skipping verification",
                    table
                ));
                result.stage = VerificationStage::TableChecked;
                return Ok(false);
            }

            self.manager.create_migrations_table().await?;
            result.migrations_table_exists = true;
            result.add_action(MigrationAction::new(
                ActionType::Ran,
                table.as_str(),
                "Created migrations table",
            ));
        }
        result.stage = VerificationStage::TableChecked;

        let mut stats = self.manager.show_migrations(&ShowOptions::default()).await?;
        apply_stats(result, &stats);
        result.stage = VerificationStage::StatsComputed;

        let pending_before = stats.pending;
        if pending_before > 0 {
            result.add_warning(format!("{} pending migration(s)", pending_before));
            if pending_before > options.max_pending_migrations {
                result.add_error(format!(
                    "Too many pending migrations: {} (maximum allowed: {})",
                    pending_before, options.max_pending_migrations
                ));
            }
        }

        if options.auto_run {
            let run_options = RunOptions {
                dry_run: options.dry_run,
                step: None,
                transaction: true,
            };
            let results = self.manager.run_migrations(&run_options).await?;

            let mut all_succeeded = true;
            for run in results.iter().filter(|r| !r.is_synthetic()) {
                let migration = run.migration.clone().unwrap_or_default();
                let action_type = match (run.success, options.dry_run) {
                    (false, _) => ActionType::Failed,
                    (true, true) => ActionType::Pending,
                    (true, false) => ActionType::Ran,
                };

                if !run.success {
                    all_succeeded = false;
                    result.add_error(format!("Migration '{}' failed: {}", migration, run.message));
                }

                result.add_action(MigrationAction {
                    action_type,
                    migration,
                    message: run.message.clone(),
                    execution_time: run.execution_time,
                    error: run.error.clone(),
                });
            }

            if all_succeeded {
                stats = self.manager.show_migrations(&ShowOptions::default()).await?;
                apply_stats(result, &stats);
            }
            result.stage = VerificationStage::AutorunExecuted;
        }

        if options.seed.auto_run && (options.auto_run || pending_before == 0) {
            self.evaluate_seed(options, &stats, result).await;
            result.stage = VerificationStage::SeedEvaluated;
        }

        Ok(true)
    }

    async fn evaluate_seed(
        &self,
        options: &VerifyOptions,
        stats: &MigrationStats,
        result: &mut VerificationResult,
    ) {
        let seed = &options.seed.config;
        let already_seeded = stats.executed_migrations().any(|m| is_seed_migration(&m.name));

        if already_seeded && !seed.force {
            result.add_action(MigrationAction::new(
                ActionType::Skipped,
                SEED_MIGRATION_MARKER,
                "Seed data already executed",
            ));
            return;
        }

        if seed.dry_run {
            result.add_action(MigrationAction::new(
                ActionType::Pending,
                SEED_MIGRATION_MARKER,
                "Seed data would be staged (dry run)",
            ));
            return;
        }

        match self.seed_stage.stage(seed).await {
            Ok(()) => {
                result.seed_data_executed = true;
                result.add_action(MigrationAction::new(
                    ActionType::Ran,
                    SEED_MIGRATION_MARKER,
                    if already_seeded {
                        "Seed configuration staged (forced)"
                    } else {
                        "Seed configuration staged"
                    },
                ));
            }
            Err(e) => {
                result.add_error(format!("Failed to stage seed configuration: {:#}", e));
                result.add_action(MigrationAction::new(
                    ActionType::Failed,
                    SEED_MIGRATION_MARKER,
                    format!("Failed to stage seed configuration: {:#}", e),
                ));
            }
        }
    }
}

fn apply_stats(result: &mut VerificationResult, stats: &MigrationStats) {
    result.total_migrations = stats.total;
    result.executed_migrations = stats.executed;
    result.pending_migrations = stats.pending;
}

/// 最終判定
fn finalize(options: &VerifyOptions, result: &mut VerificationResult) {
    if result.has_errors() {
        result.success = false;
    } else if result.pending_migrations > 0 && !options.auto_run && !options.warn_only {
        result.success = false;
    } else {
        result.success = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_seed_migration() {
        assert!(is_seed_migration("seed initial data"));
        assert!(is_seed_migration("SeedInitialData"));
        assert!(is_seed_migration("20240101 seed_initial-data v2"));
        assert!(!is_seed_migration("seed users"));
    }

    #[tokio::test]
    async fn test_seed_config_slot_stage_and_take() {
        let slot = SeedConfigSlot::new();
        let reader = slot.clone();
        assert!(reader.current().await.is_none());

        let config = SeedConfig {
            master_email: Some("admin@example.com".to_string()),
            ..SeedConfig::default()
        };
        slot.stage(&config).await.unwrap();

        assert_eq!(reader.current().await, Some(config.clone()));
        assert_eq!(reader.take().await, Some(config));
        assert!(slot.current().await.is_none());
    }

    #[test]
    fn test_finalize_rules() {
        let options = VerifyOptions::default();

        let mut result = VerificationResult::new();
        result.pending_migrations = 1;
        finalize(&options, &mut result);
        assert!(!result.success);

        let warn_only = VerifyOptions {
            warn_only: true,
            ..VerifyOptions::default()
        };
        let mut result = VerificationResult::new();
        result.pending_migrations = 1;
        finalize(&warn_only, &mut result);
        assert!(result.success);

        let mut result = VerificationResult::new();
        result.add_error("boom");
        finalize(&warn_only, &mut result);
        assert!(!result.success);
    }
}
