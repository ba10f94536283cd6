use crate::error::{BotError, BotResult};
use crate::orchestrator::MessageOrchestrator;
use crate::transport::ChatTransport;
use crate::types::{self, InboundMessage, MessageContent, VoiceHandle};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile};
use teloxide::update_listeners::Polling;
use teloxide::utils::command::BotCommands;

/// ボットコマンド
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "利用できるコマンド:")]
pub enum Command {
    #[command(description = "挨拶を表示")]
    Start,
    #[command(description = "使い方を表示")]
    Help,
}

/// Telegram Bot API を使ったトランスポート
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn download_voice(&self, voice: &VoiceHandle, dest: &Path) -> BotResult<()> {
        let file = self
            .bot
            .get_file(voice.file_id.clone())
            .await
            .map_err(|e| BotError::Download(format!("getFile 失敗: {}", e)))?;

        let mut dst = tokio::fs::File::create(dest)
            .await
            .map_err(|e| BotError::Download(format!("ファイル作成失敗 {:?}: {}", dest, e)))?;

        self.bot
            .download_file(&file.path, &mut dst)
            .await
            .map_err(|e| BotError::Download(format!("ダウンロード失敗: {}", e)))?;

        Ok(())
    }

    async fn send_text(&self, chat_id: types::ChatId, text: &str) -> BotResult<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| BotError::Send(e.to_string()))?;
        Ok(())
    }

    async fn send_voice(&self, chat_id: types::ChatId, audio: &Path) -> BotResult<()> {
        self.bot
            .send_voice(ChatId(chat_id), InputFile::file(audio))
            .await
            .map_err(|e| BotError::Send(e.to_string()))?;
        Ok(())
    }
}

/// Telegram のメッセージを受信メッセージに変換
///
/// コマンド（`/` で始まるテキスト）と、テキスト・音声以外は対象外。
pub fn inbound_from_message(msg: &Message) -> Option<InboundMessage> {
    let content = if let Some(voice) = msg.voice() {
        MessageContent::Voice(VoiceHandle {
            file_id: voice.file.id.to_string(),
            duration_secs: voice.duration.seconds(),
            caption: msg.caption().map(str::to_string),
        })
    } else {
        let text = msg.text()?;
        if is_command(text) {
            return None;
        }
        MessageContent::Text(text.to_string())
    };

    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        sender_id: msg.from.as_ref().map(|user| user.id.0),
        received_at: msg.date,
        content,
    })
}

fn is_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    orchestrator: Arc<MessageOrchestrator>,
) -> ResponseResult<()> {
    let messages = &orchestrator.services().messages;
    let reply = match cmd {
        Command::Start => messages.greeting.clone(),
        Command::Help => messages.help.clone(),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn message_handler(msg: Message, orchestrator: Arc<MessageOrchestrator>) -> ResponseResult<()> {
    if let Some(inbound) = inbound_from_message(&msg) {
        orchestrator.handle(&inbound).await;
    }
    Ok(())
}

/// ハンドラを登録してロングポーリングを開始
///
/// 停止（Ctrl+C）まで戻らない。
pub async fn run(bot: Bot, orchestrator: Arc<MessageOrchestrator>, long_poll_timeout_secs: u32) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("コマンド一覧の登録に失敗: {}", e);
    }

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(dptree::filter(|msg: Message| msg.voice().is_some()).endpoint(message_handler))
        .branch(
            dptree::filter(|msg: Message| msg.text().map(|t| !is_command(t)).unwrap_or(false))
                .endpoint(message_handler),
        );

    let listener = Polling::builder(bot.clone())
        .timeout(Duration::from_secs(u64::from(long_poll_timeout_secs)))
        .build();

    log::info!("ポーリングを開始します");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![orchestrator])
        .default_handler(|update| async move {
            log::debug!("未処理の更新: {:?}", update.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "メッセージハンドラでエラーが発生しました",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("更新の取得に失敗しました"),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "rag_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/help", "rag_bot").unwrap(), Command::Help);
        assert!(Command::parse("/unknown", "rag_bot").is_err());
    }

    #[test]
    fn test_is_command() {
        assert!(is_command("/start"));
        assert!(is_command("  /help"));
        assert!(!is_command("What is machine learning?"));
    }

    fn message_from_json(extra: serde_json::Value) -> Message {
        let mut value = serde_json::json!({
            "message_id": 17,
            "date": 1_700_000_000,
            "chat": { "id": 4242, "type": "private", "first_name": "Test" },
            "from": { "id": 99, "is_bot": false, "first_name": "Test" }
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_inbound_from_text_message() {
        let msg = message_from_json(serde_json::json!({ "text": "What is machine learning?" }));
        let inbound = inbound_from_message(&msg).unwrap();

        assert_eq!(inbound.chat_id, 4242);
        assert_eq!(inbound.message_id, 17);
        assert_eq!(inbound.sender_id, Some(99));
        assert_eq!(
            inbound.content,
            MessageContent::Text("What is machine learning?".to_string())
        );
    }

    #[test]
    fn test_inbound_from_voice_message() {
        let msg = message_from_json(serde_json::json!({
            "voice": {
                "file_id": "AwACAgIAAxkB",
                "file_unique_id": "AgADBAAD",
                "duration": 3,
                "mime_type": "audio/ogg",
                "file_size": 1024
            },
            "caption": "about crops"
        }));
        let inbound = inbound_from_message(&msg).unwrap();

        assert_eq!(
            inbound.content,
            MessageContent::Voice(VoiceHandle {
                file_id: "AwACAgIAAxkB".to_string(),
                duration_secs: 3,
                caption: Some("about crops".to_string()),
            })
        );
    }

    #[test]
    fn test_inbound_skips_commands() {
        let msg = message_from_json(serde_json::json!({ "text": "/start" }));
        assert!(inbound_from_message(&msg).is_none());
    }
}
