// Services
// マイグレーションの検出、実行、検証と設定の解決を担う

pub mod config_loader;
pub mod config_serializer;
pub mod database_config_resolver;
pub mod migration_manager;
pub mod migration_source;
pub mod migration_template;
pub mod migration_verifier;
pub mod sql_statements;
