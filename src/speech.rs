use crate::config::SpeechConfig;
use crate::error::{BotError, BotResult};
use crate::types::VoiceReply;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// 1リクエストで合成できる最大文字数
const MAX_TTS_CHARS: usize = 100;

/// 音声合成の共通トレイト
///
/// 出力先は呼び出し側が決める。同時に処理されるメッセージ同士で
/// 出力ファイルを共有しないこと。
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str, output: &Path) -> BotResult<VoiceReply>;
}

/// テキストを `max_chars` 文字以下の断片に分割
///
/// 文末記号の直後、次に空白で区切る。区切れない長い語はそのまま切る。
pub fn split_for_tts(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();

    for sentence in split_sentences(text) {
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in sentence.split_whitespace() {
            let word_len = word.chars().count();

            if word_len > max_chars {
                if !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let chars: Vec<char> = word.chars().collect();
                for part in chars.chunks(max_chars) {
                    pieces.push(part.iter().collect());
                }
                continue;
            }

            let needed = if current.is_empty() {
                word_len
            } else {
                current_len + 1 + word_len
            };
            if needed > max_chars {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }

        if !current.is_empty() {
            pieces.push(current);
        }
    }

    pieces
}

/// 文末記号（。.!?、ヒンディー語のダンダ）で区切る。記号は前の文に残す。
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '।' | '。' | '\n') {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Google 翻訳の読み上げエンドポイントを使う音声合成
pub struct GoogleTts {
    endpoint: String,
    client: reqwest::Client,
}

impl GoogleTts {
    pub fn new(config: &SpeechConfig) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BotError::Config(format!("TTS HTTPクライアント作成失敗: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }

    async fn fetch_piece(&self, piece: &str, language: &str, index: usize, total: usize) -> BotResult<Vec<u8>> {
        let idx = index.to_string();
        let total = total.to_string();
        let textlen = piece.chars().count().to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language),
                ("q", piece),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BotError::Synthesis(format!("TTS リクエスト失敗: {}", e)))?;

        if !response.status().is_success() {
            return Err(BotError::Synthesis(format!(
                "TTS API エラー: {} (言語: {})",
                response.status(),
                language
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::Synthesis(format!("TTS レスポンス読み込み失敗: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, language: &str, output: &Path) -> BotResult<VoiceReply> {
        let pieces = split_for_tts(text, MAX_TTS_CHARS);
        if pieces.is_empty() {
            return Err(BotError::Synthesis("読み上げるテキストがありません".to_string()));
        }

        let mut audio = Vec::new();
        for (index, piece) in pieces.iter().enumerate() {
            let bytes = self.fetch_piece(piece, language, index, pieces.len()).await?;
            audio.extend_from_slice(&bytes);
        }

        tokio::fs::write(output, &audio)
            .await
            .map_err(|e| BotError::Synthesis(format!("音声ファイル書き込み失敗 {:?}: {}", output, e)))?;

        log::debug!(
            "音声合成完了: {:?} ({} 断片, {} バイト)",
            output,
            pieces.len(),
            audio.len()
        );

        Ok(VoiceReply {
            path: output.to_path_buf(),
        })
    }
}
