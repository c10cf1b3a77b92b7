// マイグレーション雛形の生成
//
// create_migration が返す up/down の雛形を描画します。
// SQLファイル用と、レジストリに登録するRust実装用の2種類があります。

use serde::Serialize;

/// 雛形の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// `-- migrate:up` / `-- migrate:down` セクションを持つSQLファイル
    #[default]
    Sql,
    /// Migration トレイトを実装するRustソース
    Rust,
}

impl TemplateKind {
    /// 生成するファイルの拡張子
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateKind::Sql => "sql",
            TemplateKind::Rust => "rs",
        }
    }
}

/// 空白・アンダースコア・ハイフン区切りの名前をPascalCaseに変換
///
/// # Examples
/// ```
/// use migra::services::migration_template::pascal_case;
/// assert_eq!(pascal_case("create users table"), "CreateUsersTable");
/// assert_eq!(pascal_case("add_email-index"), "AddEmailIndex");
/// ```
pub fn pascal_case(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// マイグレーション実装の型名（`<PascalCase(name)><timestamp>`）
pub fn migration_type_name(name: &str, timestamp: &str) -> String {
    format!("{}{}", pascal_case(name), timestamp)
}

/// 雛形を描画する
///
/// # Arguments
///
/// * `kind` - 雛形の種類
/// * `name` - マイグレーション名（空白区切り）
/// * `timestamp` - タイムスタンプ
pub fn render(kind: TemplateKind, name: &str, timestamp: &str) -> String {
    match kind {
        TemplateKind::Sql => render_sql(name, timestamp),
        TemplateKind::Rust => render_rust(name, timestamp),
    }
}

fn render_sql(name: &str, timestamp: &str) -> String {
    format!(
        "-- Migration: {name}\n\
         -- Created at: {timestamp}\n\
         \n\
         -- migrate:up\n\
         \n\
         \n\
         -- migrate:down\n\
         \n",
        name = name,
        timestamp = timestamp
    )
}

fn render_rust(name: &str, timestamp: &str) -> String {
    let type_name = migration_type_name(name, timestamp);
    format!(
        r#"use async_trait::async_trait;
use migra::adapters::query_runner::QueryRunner;
use migra::services::migration_source::Migration;

pub struct {type_name};

#[async_trait]
impl Migration for {type_name} {{
    fn name(&self) -> &str {{
        "{name}"
    }}

    fn timestamp(&self) -> &str {{
        "{timestamp}"
    }}

    async fn up(&self, runner: &mut dyn QueryRunner) -> anyhow::Result<()> {{
        let _ = runner;
        Ok(())
    }}

    async fn down(&self, runner: &mut dyn QueryRunner) -> anyhow::Result<()> {{
        let _ = runner;
        Ok(())
    }}
}}
"#,
        type_name = type_name,
        name = name.replace('"', "\\\""),
        timestamp = timestamp
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("create users"), "CreateUsers");
        assert_eq!(pascal_case("  seed   initial data "), "SeedInitialData");
        assert_eq!(pascal_case(""), "");
    }

    #[test]
    fn test_migration_type_name() {
        assert_eq!(
            migration_type_name("seed initial data", "20240101000000"),
            "SeedInitialData20240101000000"
        );
    }

    #[test]
    fn test_render_sql_has_sections() {
        let contents = render(TemplateKind::Sql, "create users", "20240101000000");
        assert!(contents.contains("-- Migration: create users"));
        assert!(contents.contains("-- migrate:up"));
        assert!(contents.contains("-- migrate:down"));
    }

    #[test]
    fn test_render_rust_declares_type() {
        let contents = render(TemplateKind::Rust, "create users", "20240101000000");
        assert!(contents.contains("pub struct CreateUsers20240101000000;"));
        assert!(contents.contains("impl Migration for CreateUsers20240101000000"));
        assert!(contents.contains("\"20240101000000\""));
    }

    #[test]
    fn test_extension() {
        assert_eq!(TemplateKind::Sql.extension(), "sql");
        assert_eq!(TemplateKind::Rust.extension(), "rs");
    }
}
