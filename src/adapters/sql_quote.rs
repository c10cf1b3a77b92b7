// SQL識別子・リテラルのクォートユーティリティ
//
// SQLite と PostgreSQL の両方言で共有するエスケープ処理を提供します。
// 識別子はどちらもダブルクォート、文字列リテラルはシングルクォートで囲みます。

use crate::adapters::query_runner::SqlValue;
use chrono::{DateTime, SecondsFormat, Utc};

/// 識別子クォート（ダブルクォート）
///
/// 識別子内のダブルクォートは二重にエスケープします。
///
/// # Examples
/// ```
/// use migra::adapters::sql_quote::quote_identifier;
/// assert_eq!(quote_identifier("users"), r#""users""#);
/// assert_eq!(quote_identifier(r#"table"name"#), r#""table""name""#);
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// カラム名リストをクォートしてカンマ区切りで結合
pub fn quote_columns(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 文字列リテラルクォート
///
/// 埋め込まれたシングルクォートは二重にエスケープします。
///
/// # Examples
/// ```
/// use migra::adapters::sql_quote::quote_literal;
/// assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// 日時をISO-8601（ミリ秒、UTC）で表現
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SQLite用の値リテラル
///
/// 真偽値は 1/0、配列はJSON文字列として表現します。
pub fn escape_value_sqlite(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(s) => quote_literal(s),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Float(f) if f.is_finite() => f.to_string(),
        SqlValue::Float(_) => "NULL".to_string(),
        SqlValue::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        SqlValue::Timestamp(dt) => quote_literal(&format_datetime(dt)),
        SqlValue::Array(items) => quote_literal(&array_to_json(items).to_string()),
    }
}

/// PostgreSQL用の値リテラル
///
/// 真偽値は TRUE/FALSE、配列は ARRAY[...] として表現します。
pub fn escape_value_postgres(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(s) => quote_literal(s),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Float(f) if f.is_nan() => "'NaN'".to_string(),
        SqlValue::Float(f) if f.is_infinite() && *f > 0.0 => "'Infinity'".to_string(),
        SqlValue::Float(f) if f.is_infinite() => "'-Infinity'".to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        SqlValue::Timestamp(dt) => quote_literal(&format_datetime(dt)),
        SqlValue::Array(items) => format!(
            "ARRAY[{}]",
            items
                .iter()
                .map(escape_value_postgres)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn array_to_json(items: &[SqlValue]) -> serde_json::Value {
    serde_json::Value::Array(items.iter().map(value_to_json).collect())
}

fn value_to_json(value: &SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Null => serde_json::Value::Null,
        SqlValue::Text(s) => serde_json::Value::String(s.clone()),
        SqlValue::Integer(i) => serde_json::Value::from(*i),
        SqlValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        SqlValue::Bool(b) => serde_json::Value::Bool(*b),
        SqlValue::Timestamp(dt) => serde_json::Value::String(format_datetime(dt)),
        SqlValue::Array(items) => array_to_json(items),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_quote_identifier_simple() {
        assert_eq!(quote_identifier("users"), r#""users""#);
        assert_eq!(quote_identifier("select"), r#""select""#);
    }

    #[test]
    fn test_quote_identifier_with_embedded_quote() {
        // 単一の " は "" にエスケープされ、外側のクォートと合わせて """" になる
        assert_eq!(quote_identifier("\""), "\"\"\"\"");
        assert_eq!(quote_identifier(r#"a"b"c"#), r#""a""b""c""#);
    }

    #[test]
    fn test_quote_columns() {
        let columns = vec!["id".to_string(), "name".to_string()];
        assert_eq!(quote_columns(&columns), r#""id", "name""#);
        assert_eq!(quote_columns(&[]), "");
    }

    #[test]
    fn test_escape_string_with_quote_in_both_dialects() {
        let value = SqlValue::from("O'Brien");
        assert_eq!(escape_value_sqlite(&value), "'O''Brien'");
        assert_eq!(escape_value_postgres(&value), "'O''Brien'");
    }

    #[test]
    fn test_escape_null_and_numbers() {
        assert_eq!(escape_value_sqlite(&SqlValue::Null), "NULL");
        assert_eq!(escape_value_postgres(&SqlValue::Null), "NULL");
        assert_eq!(escape_value_sqlite(&SqlValue::Integer(-42)), "-42");
        assert_eq!(escape_value_postgres(&SqlValue::Float(1.5)), "1.5");
    }

    #[test]
    fn test_escape_booleans_differ_by_dialect() {
        assert_eq!(escape_value_sqlite(&SqlValue::Bool(true)), "1");
        assert_eq!(escape_value_sqlite(&SqlValue::Bool(false)), "0");
        assert_eq!(escape_value_postgres(&SqlValue::Bool(true)), "TRUE");
        assert_eq!(escape_value_postgres(&SqlValue::Bool(false)), "FALSE");
    }

    #[test]
    fn test_escape_timestamp_as_iso8601() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let value = SqlValue::Timestamp(dt);
        assert_eq!(escape_value_sqlite(&value), "'2024-01-02T03:04:05.000Z'");
        assert_eq!(escape_value_postgres(&value), "'2024-01-02T03:04:05.000Z'");
    }

    #[test]
    fn test_escape_array() {
        let value = SqlValue::Array(vec![SqlValue::from("a'b"), SqlValue::Integer(2)]);
        assert_eq!(escape_value_postgres(&value), "ARRAY['a''b', 2]");
        assert_eq!(escape_value_sqlite(&value), r#"'["a''b",2]'"#);
    }

    #[test]
    fn test_escape_non_finite_floats() {
        assert_eq!(escape_value_sqlite(&SqlValue::Float(f64::NAN)), "NULL");
        assert_eq!(escape_value_postgres(&SqlValue::Float(f64::NAN)), "'NaN'");
        assert_eq!(
            escape_value_postgres(&SqlValue::Float(f64::NEG_INFINITY)),
            "'-Infinity'"
        );
    }
}
