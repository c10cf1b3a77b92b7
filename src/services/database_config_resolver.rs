// 設定の解決サービス
//
// 環境変数による上書きをサービス層で扱い、coreは純粋な構造体に保つ。
// 環境変数は境界で一度だけ読み取り、エンジンには明示的な値として渡す。

use crate::core::config::{Config, DatabaseConfig, DatabaseType, SeedSettings};
use anyhow::{Context, Result};
use tracing::warn;

/// 環境変数の参照元
///
/// テストでプロセス環境を汚さずに差し替えられるよう抽象化しています。
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// プロセス環境変数
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl<F> EnvSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// 設定の解決ユーティリティ
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfigResolver;

impl DatabaseConfigResolver {
    /// プロセス環境変数による上書きを設定全体に適用
    pub fn resolve(config: &Config) -> Result<Config> {
        Self::resolve_with(config, &ProcessEnv)
    }

    /// 指定した環境変数ソースで上書きを適用
    pub fn resolve_with(config: &Config, env: &dyn EnvSource) -> Result<Config> {
        let mut resolved = config.clone();
        resolved.database = Self::apply_env_overrides(&config.database, env)?;
        resolved.seed = Self::apply_seed_overrides(&config.seed, env);
        Ok(resolved)
    }

    /// データベース設定への上書きを適用
    pub fn apply_env_overrides(base: &DatabaseConfig, env: &dyn EnvSource) -> Result<DatabaseConfig> {
        let mut config = base.clone();

        if let Some(db_type) = non_empty(env, "DB_TYPE") {
            let previous = config.db_type;
            config.db_type = db_type
                .parse::<DatabaseType>()
                .with_context(|| "Invalid DB_TYPE environment variable")?;
            if config.db_type != previous && base.port == previous.default_port() {
                config.port = config.db_type.default_port();
            }
        }
        if let Some(url) = non_empty(env, "DATABASE_URL") {
            config.url = Some(url);
        }
        if let Some(host) = non_empty(env, "DB_HOST") {
            config.host = host;
        }
        if let Some(port) = non_empty(env, "DB_PORT") {
            match port.parse::<u16>() {
                Ok(port_num) => config.port = Some(port_num),
                Err(_) => warn!(value = %port, "Ignoring invalid DB_PORT"),
            }
        }
        if let Some(database) = non_empty(env, "DB_DATABASE") {
            config.database = database;
        }
        if let Some(user) = non_empty(env, "DB_USER") {
            config.user = Some(user);
        }
        if let Some(password) = env.get("DB_PASSWORD") {
            config.password = Some(password);
        }

        Ok(config)
    }

    /// シード設定への上書きを適用
    pub fn apply_seed_overrides(base: &SeedSettings, env: &dyn EnvSource) -> SeedSettings {
        let mut seed = base.clone();

        if let Some(email) = non_empty(env, "SEED_MASTER_EMAIL") {
            seed.master_email = Some(email);
        }
        if let Some(name) = non_empty(env, "SEED_MASTER_NAME") {
            seed.master_name = Some(name);
        }
        if let Some(password) = non_empty(env, "SEED_MASTER_PASSWORD") {
            seed.master_password = Some(password);
        }
        if let Some(force) = flag(env, "SEED_FORCE") {
            seed.force = force;
        }
        if let Some(dry_run) = flag(env, "SEED_DRY_RUN") {
            seed.dry_run = dry_run;
        }

        seed
    }
}

fn non_empty(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.get(key).filter(|value| !value.trim().is_empty())
}

fn flag(env: &dyn EnvSource, key: &str) -> Option<bool> {
    let value = non_empty(env, key)?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(key = %key, value = %value, "Ignoring invalid boolean environment variable");
            None
        }
    }
}
