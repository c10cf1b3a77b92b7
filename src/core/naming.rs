// 命名ポリシー
//
// アプリケーション名と関連パスの単一ソースを提供します。

/// 現行アプリケーション名
pub const APP_NAME: &str = "migra";

/// 既定の設定ファイル名
pub const CONFIG_FILE: &str = ".migra.yaml";

/// バイナリ名
pub const BINARY_NAME: &str = "migra";

/// SQLマイグレーションファイルの既定拡張子
pub const SQL_MIGRATION_EXTENSION: &str = "sql";

/// シードマイグレーションを識別する名前の断片
pub const SEED_MIGRATION_MARKER: &str = "SeedInitialData";
