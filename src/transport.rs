use crate::error::BotResult;
use crate::types::{ChatId, VoiceHandle};
use async_trait::async_trait;
use std::path::Path;

/// チャットトランスポートの共通トレイト
///
/// オーケストレーターが必要とする送受信操作だけを持つ。
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// 音声メッセージを `dest` にダウンロード
    ///
    /// 失敗時は `BotError::Download`
    async fn download_voice(&self, voice: &VoiceHandle, dest: &Path) -> BotResult<()>;

    /// テキストを送信
    ///
    /// 失敗時は `BotError::Send`
    async fn send_text(&self, chat_id: ChatId, text: &str) -> BotResult<()>;

    /// 音声ファイルをボイスメッセージとして送信
    ///
    /// 失敗時は `BotError::Send`
    async fn send_voice(&self, chat_id: ChatId, audio: &Path) -> BotResult<()>;
}
