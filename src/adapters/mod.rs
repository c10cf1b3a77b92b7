// Adapters
// データベースへのアクセスと方言ごとの差異を抽象化

pub mod connection_string;
pub mod database;
pub mod dialect;
pub mod query_runner;
pub mod sql_quote;
