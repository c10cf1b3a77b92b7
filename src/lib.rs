// Migraライブラリのエントリーポイント
//
// モジュール構造:
// - cli: CLIレイヤー（ユーザー入力の受付とコマンドルーティング）
// - core: コアドメインモデル（マイグレーション、設定、検証結果）
// - adapters: データベース方言ごとのQueryRunnerと接続管理
// - services: マイグレーションの検出、実行、起動時検証

pub mod adapters;
pub mod cli;
pub mod core;
pub mod services;
