use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// チャットID（Telegram の chat id）
pub type ChatId = i64;

/// チャット内のメッセージID
pub type MessageId = i32;

/// 音声メッセージへの参照
///
/// 実体はトランスポート側にあり、`ChatTransport::download_voice` を通してのみ取得する。
///
/// # Examples
///
/// ```
/// # use voice_rag_bot::types::VoiceHandle;
/// let voice = VoiceHandle {
///     file_id: "AwACAgIAAxkBAAIB".to_string(),
///     duration_secs: 3,
///     caption: None,
/// };
/// assert_eq!(voice.file_id, "AwACAgIAAxkBAAIB");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceHandle {
    /// トランスポート側のファイルID
    pub file_id: String,

    /// 再生時間（秒）
    pub duration_secs: u32,

    /// 音声に添えられたテキスト（キャプション）
    ///
    /// 存在する場合は文字起こし結果の前に連結して問い合わせる
    pub caption: Option<String>,
}

/// 受信メッセージの内容
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageContent {
    /// テキストメッセージ
    Text(String),

    /// 音声メッセージ
    Voice(VoiceHandle),
}

/// 受信メッセージ
///
/// トランスポートが受信時に生成し、オーケストレーターは読み取りのみ行う。
/// 処理完了後に破棄される。
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// 返信先チャット
    pub chat_id: ChatId,

    /// チャット内のメッセージID
    pub message_id: MessageId,

    /// 送信者ID（チャンネル投稿などでは存在しない）
    pub sender_id: Option<u64>,

    /// 受信時刻
    pub received_at: DateTime<Utc>,

    /// メッセージ内容
    pub content: MessageContent,
}

impl InboundMessage {
    pub fn text(chat_id: ChatId, message_id: MessageId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            message_id,
            sender_id: None,
            received_at: Utc::now(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn voice(chat_id: ChatId, message_id: MessageId, voice: VoiceHandle) -> Self {
        Self {
            chat_id,
            message_id,
            sender_id: None,
            received_at: Utc::now(),
            content: MessageContent::Voice(voice),
        }
    }
}

/// 文字起こし結果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptResult {
    pub text: String,
}

/// 回答生成結果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerResult {
    pub text: String,
}

/// 翻訳結果
///
/// 翻訳に失敗した場合、`text` は入力テキストそのままで `translated` は false。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslatedResult {
    pub text: String,
    pub translated: bool,
}

impl TranslatedResult {
    /// 翻訳せずに原文を返す
    pub fn passthrough(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            translated: false,
        }
    }
}

/// 合成済み音声ファイル
///
/// 1回の送信の間だけ存在し、送信後に削除される。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceReply {
    pub path: PathBuf,
}

/// 問い合わせ文を組み立てる
///
/// テキストと文字起こし結果を半角スペース1つで連結する。
/// テキストが空でなければテキストを先に置く。
///
/// # Examples
///
/// ```
/// # use voice_rag_bot::types::compose_query;
/// assert_eq!(compose_query("", &["hello".to_string()]), "hello");
/// assert_eq!(compose_query("note:", &["a".to_string(), "b".to_string()]), "note: a b");
/// ```
pub fn compose_query(text: &str, transcripts: &[String]) -> String {
    let transcription = transcripts.join(" ");
    if transcripts.is_empty() {
        text.to_string()
    } else if text.is_empty() {
        transcription
    } else {
        format!("{} {}", text, transcription)
    }
}
