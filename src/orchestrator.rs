use crate::context::Services;
use crate::error::{BotResult, Stage};
use crate::scratch::ScratchFiles;
use crate::transport::ChatTransport;
use crate::types::{compose_query, ChatId, InboundMessage, MessageContent, VoiceHandle};
use std::sync::Arc;

/// 1メッセージの処理を順に進める
///
/// テキスト: 回答生成 → テキスト返信
/// 音声: ダウンロード → 文字起こし → 回答生成 → 翻訳 → 音声合成 → テキスト返信 → 音声返信
///
/// どの段階で失敗しても利用者には必ず何か返信する。
/// 処理中に作成した一時ファイルはすべて処理終了時に削除する。
pub struct MessageOrchestrator {
    services: Services,
    transport: Arc<dyn ChatTransport>,
}

impl MessageOrchestrator {
    pub fn new(services: Services, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            services,
            transport,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// 受信メッセージを種類ごとに振り分け
    pub async fn handle(&self, message: &InboundMessage) -> Stage {
        enter(message.chat_id, Stage::Received);
        log::debug!(
            "受信 (chat {}, sender {:?}, message {})",
            message.chat_id,
            message.sender_id,
            message.message_id
        );

        let stage = match &message.content {
            MessageContent::Text(text) => self.handle_text(message.chat_id, text).await,
            MessageContent::Voice(voice) => self.handle_voice(message.chat_id, voice).await,
        };

        if stage == Stage::Failed {
            log::warn!(
                "メッセージ処理失敗 (chat {}, sender {:?}, message {})",
                message.chat_id,
                message.sender_id,
                message.message_id
            );
        }
        stage
    }

    /// テキストメッセージを処理
    ///
    /// 返信は常に1通（回答または謝罪文）。
    pub async fn handle_text(&self, chat_id: ChatId, text: &str) -> Stage {
        log::info!("ユーザー ({}): \"{}\"", chat_id, text);

        match self.text_chain(chat_id, text).await {
            Ok(()) => {
                enter(chat_id, Stage::Done);
                Stage::Done
            }
            Err(e) => {
                log::error!(
                    "テキストメッセージ処理エラー (chat {}, stage {}): {}",
                    chat_id,
                    e.stage(),
                    e
                );
                // 送信タイムアウトで実際には届いていた場合、回答と謝罪の2通になる
                let apology = &self.services.messages.text_apology;
                if let Err(e) = self.transport.send_text(chat_id, apology).await {
                    log::error!("謝罪メッセージの送信に失敗 (chat {}): {}", chat_id, e);
                }
                enter(chat_id, Stage::Failed);
                Stage::Failed
            }
        }
    }

    async fn text_chain(&self, chat_id: ChatId, text: &str) -> BotResult<()> {
        enter(chat_id, Stage::Answering);
        let answer = self.services.answer.answer(text).await?;
        log::info!("ボット ({}): {}", chat_id, answer.text);

        enter(chat_id, Stage::Replying);
        self.transport.send_text(chat_id, &answer.text).await
    }

    /// 音声メッセージを処理
    ///
    /// 成功時はテキスト → 音声の順に2通返信する。
    /// 失敗時は謝罪文の音声1通のみ返信する（テキストは送らない）。
    pub async fn handle_voice(&self, chat_id: ChatId, voice: &VoiceHandle) -> Stage {
        log::info!("ユーザー ({}): 音声メモ {} 秒", chat_id, voice.duration_secs);
        let mut files = ScratchFiles::new(self.services.store.clone());

        let stage = match self.voice_chain(chat_id, voice, &mut files).await {
            Ok(()) => {
                enter(chat_id, Stage::Done);
                Stage::Done
            }
            Err(e) => {
                log::error!(
                    "音声メッセージ処理エラー (chat {}, stage {}): {}",
                    chat_id,
                    e.stage(),
                    e
                );
                self.send_voice_apology(chat_id, &mut files).await;
                enter(chat_id, Stage::Failed);
                Stage::Failed
            }
        };

        files.release_all().await;
        stage
    }

    async fn voice_chain(
        &self,
        chat_id: ChatId,
        voice: &VoiceHandle,
        files: &mut ScratchFiles,
    ) -> BotResult<()> {
        let language = self.services.language.as_str();

        enter(chat_id, Stage::Downloading);
        let input = files.acquire_unique(&voice.file_id, "ogg");
        self.transport.download_voice(voice, &input).await?;
        log::info!("音声メモをダウンロード (chat {}): {:?}", chat_id, input);

        enter(chat_id, Stage::Transcribing);
        let transcript = self
            .services
            .transcriber
            .transcribe_all(std::slice::from_ref(&input))
            .await?;
        log::info!("文字起こし (chat {}): {}", chat_id, transcript.text);

        enter(chat_id, Stage::Answering);
        let caption = voice.caption.as_deref().unwrap_or("").trim();
        let query = compose_query(caption, &[transcript.text]);
        let answer = self.services.answer.answer(&query).await?;
        log::info!("ボット回答 (翻訳前, chat {}): {}", chat_id, answer.text);

        enter(chat_id, Stage::Translating);
        let translated = self
            .services
            .translator
            .translate(&answer.text, language)
            .await;
        log::info!("ボット回答 (翻訳後, chat {}): {}", chat_id, translated.text);

        enter(chat_id, Stage::Synthesizing);
        let output = files.acquire_unique("reply", &self.services.audio_extension);
        let reply = self
            .services
            .synthesizer
            .synthesize(&translated.text, language, &output)
            .await?;
        files.track(&reply.path);

        enter(chat_id, Stage::Replying);
        self.transport.send_text(chat_id, &translated.text).await?;
        self.transport.send_voice(chat_id, &reply.path).await?;

        Ok(())
    }

    async fn send_voice_apology(&self, chat_id: ChatId, files: &mut ScratchFiles) {
        let output = files.acquire_unique("apology", &self.services.audio_extension);
        let reply = match self
            .services
            .synthesizer
            .synthesize(
                &self.services.messages.voice_apology,
                &self.services.language,
                &output,
            )
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("謝罪音声の合成に失敗 (chat {}): {}", chat_id, e);
                return;
            }
        };
        files.track(&reply.path);

        if let Err(e) = self.transport.send_voice(chat_id, &reply.path).await {
            log::error!("謝罪音声の送信に失敗 (chat {}): {}", chat_id, e);
        }
    }
}

fn enter(chat_id: ChatId, stage: Stage) {
    log::debug!("chat {}: {}", chat_id, stage);
}
