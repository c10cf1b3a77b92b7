/// 起動時検証の統合テスト
///
/// 保留件数の判定、自動実行、シードステップのゲートを確認します。
mod common;

#[cfg(test)]
mod verifier_tests {
    use super::common::TestProject;
    use async_trait::async_trait;
    use migra::core::migration::RunOptions;
    use migra::core::verification::{
        ActionType, SeedConfig, SeedOptions, VerificationStage, VerifyOptions,
    };
    use migra::services::migration_verifier::{MigrationVerifier, SeedConfigSlot, SeedStage};
    use std::sync::Arc;

    fn two_migrations(project: &TestProject) {
        project.write_migration(
            "20240101000000",
            "create users",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT);",
            "DROP TABLE users;",
        );
        project.write_migration(
            "20240102000000",
            "create posts",
            "CREATE TABLE posts (id INTEGER PRIMARY KEY);",
            "DROP TABLE posts;",
        );
    }

    fn verifier(project: &TestProject) -> MigrationVerifier {
        MigrationVerifier::new(Arc::new(project.manager()))
    }

    fn seed_options(force: bool, dry_run: bool) -> SeedOptions {
        SeedOptions {
            auto_run: true,
            config: SeedConfig {
                master_email: Some("admin@example.com".to_string()),
                master_name: Some("Admin".to_string()),
                master_password: Some("secret".to_string()),
                force,
                dry_run,
            },
        }
    }

    struct FailingStage;

    #[async_trait]
    impl SeedStage for FailingStage {
        async fn stage(&self, _config: &SeedConfig) -> anyhow::Result<()> {
            anyhow::bail!("seed store unavailable")
        }
    }

    /// 保留件数が上限を超えると失敗する
    #[tokio::test]
    async fn test_too_many_pending_fails() {
        let project = TestProject::new().await;
        two_migrations(&project);

        let result = verifier(&project)
            .verify(&VerifyOptions {
                max_pending_migrations: 0,
                warn_only: true,
                ..VerifyOptions::default()
            })
            .await;

        assert!(!result.success);
        assert_eq!(result.pending_migrations, 2);
        assert!(result.errors.iter().any(|e| e.contains("Too many pending")));
        assert_eq!(result.stage, VerificationStage::Finalized);
    }

    /// 保留があり自動実行も warn_only も無ければ失敗する
    #[tokio::test]
    async fn test_pending_without_auto_run_fails() {
        let project = TestProject::new().await;
        two_migrations(&project);

        let result = verifier(&project).verify(&VerifyOptions::default()).await;

        assert!(!result.success);
        assert!(result.errors.is_empty());
        assert!(result.migrations_table_exists);
        assert!(result
            .actions
            .iter()
            .any(|a| a.action_type == ActionType::Ran && a.migration == "migrations"));
    }

    /// warn_only では保留があっても成功する
    #[tokio::test]
    async fn test_warn_only_passes_with_pending() {
        let project = TestProject::new().await;
        two_migrations(&project);

        let result = verifier(&project)
            .verify(&VerifyOptions {
                warn_only: true,
                ..VerifyOptions::default()
            })
            .await;

        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);
    }

    /// 履歴テーブルが無い場合に作成せず成功を返す
    #[tokio::test]
    async fn test_ignore_missing_table() {
        let project = TestProject::new().await;
        two_migrations(&project);
        let verifier = verifier(&project);

        let result = verifier
            .verify(&VerifyOptions {
                ignore_missing_migrations_table: true,
                ..VerifyOptions::default()
            })
            .await;

        assert!(result.success);
        assert!(!result.migrations_table_exists);
        assert_eq!(result.total_migrations, 0);
        assert!(!verifier.manager().migrations_table_exists().await.unwrap());
    }

    /// 自動実行で保留がすべて実行され、集計が更新される
    #[tokio::test]
    async fn test_auto_run_executes_pending() {
        let project = TestProject::new().await;
        two_migrations(&project);

        let result = verifier(&project)
            .verify(&VerifyOptions {
                auto_run: true,
                ..VerifyOptions::default()
            })
            .await;

        assert!(result.success);
        assert_eq!(result.pending_migrations, 0);
        assert_eq!(result.executed_migrations, 2);
        let ran: Vec<&str> = result
            .actions
            .iter()
            .filter(|a| a.action_type == ActionType::Ran && a.execution_time.is_some())
            .map(|a| a.migration.as_str())
            .collect();
        assert_eq!(ran, vec!["create users", "create posts"]);
        assert_eq!(result.stage, VerificationStage::Finalized);
    }

    /// 自動実行の dry-run は保留件数を変えない
    #[tokio::test]
    async fn test_auto_run_dry_run() {
        let project = TestProject::new().await;
        two_migrations(&project);

        let result = verifier(&project)
            .verify(&VerifyOptions {
                auto_run: true,
                dry_run: true,
                ..VerifyOptions::default()
            })
            .await;

        assert!(result.success);
        assert_eq!(result.pending_migrations, 2);
        assert_eq!(
            result
                .actions
                .iter()
                .filter(|a| a.action_type == ActionType::Pending)
                .count(),
            2
        );
    }

    /// 自動実行中の失敗はエラーとして記録される
    #[tokio::test]
    async fn test_auto_run_failure_recorded() {
        let project = TestProject::new().await;
        project.write_migration(
            "20240101000000",
            "broken",
            "INSERT INTO missing_table VALUES (1);",
            "",
        );

        let result = verifier(&project)
            .verify(&VerifyOptions {
                auto_run: true,
                ..VerifyOptions::default()
            })
            .await;

        assert!(!result.success);
        assert!(result
            .actions
            .iter()
            .any(|a| a.action_type == ActionType::Failed && a.error.is_some()));
        assert_eq!(result.pending_migrations, 1);
    }

    /// 保留があり自動実行しない場合、シードは評価されない
    #[tokio::test]
    async fn test_seed_gated_by_pending() {
        let project = TestProject::new().await;
        two_migrations(&project);

        let result = verifier(&project)
            .verify(&VerifyOptions {
                warn_only: true,
                seed: seed_options(false, false),
                ..VerifyOptions::default()
            })
            .await;

        assert!(!result.seed_data_executed);
        assert_eq!(result.stage, VerificationStage::Finalized);
        assert!(!result.actions.iter().any(|a| a.migration == "SeedInitialData"));
    }

    /// 保留が無ければシード設定がステージされる
    #[tokio::test]
    async fn test_seed_staged_when_up_to_date() {
        let project = TestProject::new().await;
        two_migrations(&project);
        project
            .manager()
            .run_migrations(&RunOptions::default())
            .await
            .unwrap();

        let slot = SeedConfigSlot::new();
        let verifier = verifier(&project).with_seed_stage(Arc::new(slot.clone()));
        let options = VerifyOptions {
            seed: seed_options(false, false),
            ..VerifyOptions::default()
        };

        let result = verifier.verify(&options).await;

        assert!(result.success);
        assert!(result.seed_data_executed);
        assert_eq!(slot.current().await, Some(options.seed.config.clone()));
    }

    /// シードが実行済みなら force が無い限りスキップされる
    #[tokio::test]
    async fn test_seed_skipped_when_already_executed() {
        let project = TestProject::new().await;
        project.write_migration(
            "20240101000000",
            "seed initial data",
            "CREATE TABLE seeded (id INTEGER);",
            "DROP TABLE seeded;",
        );
        project
            .manager()
            .run_migrations(&RunOptions::default())
            .await
            .unwrap();

        let result = verifier(&project)
            .verify(&VerifyOptions {
                seed: seed_options(false, false),
                ..VerifyOptions::default()
            })
            .await;
        assert!(result.success);
        assert!(!result.seed_data_executed);
        assert!(result
            .actions
            .iter()
            .any(|a| a.action_type == ActionType::Skipped));

        let forced = verifier(&project)
            .verify(&VerifyOptions {
                seed: seed_options(true, false),
                ..VerifyOptions::default()
            })
            .await;
        assert!(forced.seed_data_executed);
    }

    /// シードの dry-run はステージしない
    #[tokio::test]
    async fn test_seed_dry_run() {
        let project = TestProject::new().await;
        let slot = SeedConfigSlot::new();
        let verifier = verifier(&project).with_seed_stage(Arc::new(slot.clone()));

        let result = verifier
            .verify(&VerifyOptions {
                seed: seed_options(false, true),
                ..VerifyOptions::default()
            })
            .await;

        assert!(result.success);
        assert!(!result.seed_data_executed);
        assert!(slot.current().await.is_none());
        assert!(result
            .actions
            .iter()
            .any(|a| a.action_type == ActionType::Pending));
    }

    /// ステージの失敗は検証の失敗になる
    #[tokio::test]
    async fn test_seed_stage_failure() {
        let project = TestProject::new().await;
        let verifier = verifier(&project).with_seed_stage(Arc::new(FailingStage));

        let result = verifier
            .verify(&VerifyOptions {
                seed: seed_options(false, false),
                ..VerifyOptions::default()
            })
            .await;

        assert!(!result.success);
        assert!(result.errors[0].contains("seed store unavailable"));
    }
}
