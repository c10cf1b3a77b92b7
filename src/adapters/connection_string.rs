// 接続文字列ビルダー
//
// DatabaseConfig から sqlx の Any ドライバーが解釈できる接続文字列を生成する。

use crate::core::config::{DatabaseConfig, DatabaseType};
use urlencoding::encode;

/// 接続文字列を生成
///
/// `url` が指定されていればそれをそのまま使用します。
/// ユーザー名とパスワードはパーセントエンコードされるため、
/// `@` や `:` を含むパスワードでも正しく接続文字列が構築されます。
/// SQLiteはファイルが無ければ作成するモード（`mode=rwc`）で開きます。
pub fn build_connection_string(config: &DatabaseConfig) -> String {
    if let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) {
        return url.to_string();
    }

    match config.db_type {
        DatabaseType::Postgres => {
            let user = config.user.as_deref().unwrap_or("postgres");
            let encoded_user = encode(user);
            let auth = match config.password.as_deref() {
                Some(password) if !password.is_empty() => {
                    format!("{}:{}", encoded_user, encode(password))
                }
                _ => encoded_user.to_string(),
            };
            format!(
                "postgres://{}@{}:{}/{}",
                auth,
                config.host,
                config.resolved_port(),
                config.database
            )
        }
        DatabaseType::Sqlite => {
            if config.database == ":memory:" {
                "sqlite::memory:".to_string()
            } else if config.database.contains('?') {
                format!("sqlite://{}", config.database)
            } else {
                format!("sqlite://{}?mode=rwc", config.database)
            }
        }
    }
}
