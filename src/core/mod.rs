// Core Domain
// マイグレーション、設定、検証結果の純粋なドメインモデル

pub mod config;
pub mod error;
pub mod migration;
pub mod naming;
pub mod verification;
