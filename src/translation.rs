use crate::config::TranslationConfig;
use crate::error::{BotError, BotResult};
use crate::types::TranslatedResult;
use async_trait::async_trait;
use std::time::Duration;

/// 翻訳クライアントの共通トレイト
///
/// 翻訳は付加的な処理なので、失敗してもエラーにはせず原文を返す。
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> TranslatedResult;
}

/// Google 翻訳（公開エンドポイント）クライアント
pub struct GoogleTranslator {
    endpoint: String,
    client: reqwest::Client,
}

impl GoogleTranslator {
    pub fn new(config: &TranslationConfig) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BotError::Config(format!("翻訳 HTTPクライアント作成失敗: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }

    async fn try_translate(&self, text: &str, target_language: &str) -> BotResult<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_language),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| BotError::Translation(format!("リクエスト失敗: {}", e)))?;

        if !response.status().is_success() {
            return Err(BotError::Translation(format!(
                "翻訳 API エラー: {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BotError::Translation(format!("レスポンスパース失敗: {}", e)))?;

        parse_translation(&body)
    }
}

/// `[[["訳文", "原文", ...], ...], ...]` 形式の応答から訳文を連結する
fn parse_translation(body: &serde_json::Value) -> BotResult<String> {
    let segments = body
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or_else(|| BotError::Translation("応答形式が不正です".to_string()))?;

    let text: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(BotError::Translation("訳文が空です".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> TranslatedResult {
        if text.trim().is_empty() {
            return TranslatedResult::passthrough(text);
        }

        match self.try_translate(text, target_language).await {
            Ok(translated) => TranslatedResult {
                text: translated,
                translated: true,
            },
            Err(e) => {
                log::warn!("翻訳に失敗したため原文を使用します ({}): {}", target_language, e);
                TranslatedResult::passthrough(text)
            }
        }
    }
}
