use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// メッセージ処理の段階
///
/// 1メッセージの状態遷移:
///
/// ```text
/// Received → (Transcribing) → Answering → Translating → Synthesizing → Replying → Done
///                                                                         └──→ Failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Received,
    Downloading,
    Transcribing,
    Answering,
    Translating,
    Synthesizing,
    Replying,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Downloading => "downloading",
            Stage::Transcribing => "transcribing",
            Stage::Answering => "answering",
            Stage::Translating => "translating",
            Stage::Synthesizing => "synthesizing",
            Stage::Replying => "replying",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// ボット内部のエラー分類
///
/// `Translation` は翻訳クライアント内部でのみ使われ、外には出ない
/// （翻訳失敗時は原文をそのまま返す）。
#[derive(Debug, Error)]
pub enum BotError {
    #[error("音声ファイルのダウンロードに失敗: {0}")]
    Download(String),

    #[error("文字起こしに失敗: {0}")]
    Transcription(String),

    #[error("回答生成に失敗: {0}")]
    Generation(String),

    #[error("翻訳に失敗: {0}")]
    Translation(String),

    #[error("音声合成に失敗: {0}")]
    Synthesis(String),

    #[error("返信の送信に失敗: {0}")]
    Send(String),

    #[error("ファイル操作に失敗 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("設定エラー: {0}")]
    Config(String),
}

impl BotError {
    /// このエラーが発生した段階
    pub fn stage(&self) -> Stage {
        match self {
            BotError::Download(_) => Stage::Downloading,
            BotError::Transcription(_) => Stage::Transcribing,
            BotError::Generation(_) => Stage::Answering,
            BotError::Translation(_) => Stage::Translating,
            BotError::Synthesis(_) => Stage::Synthesizing,
            BotError::Send(_) => Stage::Replying,
            BotError::Io { .. } | BotError::Config(_) => Stage::Failed,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BotError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type BotResult<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_stage_mapping() {
        assert_eq!(BotError::Download("x".into()).stage(), Stage::Downloading);
        assert_eq!(BotError::Transcription("x".into()).stage(), Stage::Transcribing);
        assert_eq!(BotError::Generation("x".into()).stage(), Stage::Answering);
        assert_eq!(BotError::Synthesis("x".into()).stage(), Stage::Synthesizing);
        assert_eq!(BotError::Send("x".into()).stage(), Stage::Replying);
    }

    #[test]
    fn test_error_display() {
        let err = BotError::Generation("timeout".to_string());
        assert_eq!(err.to_string(), "回答生成に失敗: timeout");
        assert_eq!(Stage::Synthesizing.to_string(), "synthesizing");
    }
}
