// コマンドハンドラー層
// 各CLIコマンドの実装

pub mod create;
pub mod init;
pub mod revert;
pub mod run;
pub mod show;
pub mod verify;

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::Serialize;

/// コマンドの出力
///
/// テキスト表示とJSON表示の両方に対応します。
pub trait CommandOutput: Serialize {
    /// 人間向けのテキスト表示
    fn to_text(&self) -> String;

    /// プロセスを正常終了させるかどうか
    fn is_success(&self) -> bool {
        true
    }
}

/// 出力フォーマットに従って描画する
pub fn render_output<T: CommandOutput>(output: &T, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(output.to_text()),
        OutputFormat::Json => {
            serde_json::to_string_pretty(output).with_context(|| "Failed to serialize output")
        }
    }
}

/// 描画済みの出力と終了ステータス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub output: String,
    pub success: bool,
}

impl CommandOutcome {
    /// 出力を描画して結果を作成
    pub fn render<T: CommandOutput>(output: &T, format: &OutputFormat) -> Result<Self> {
        Ok(Self {
            output: render_output(output, format)?,
            success: output.is_success(),
        })
    }
}
