use crate::config::TranscriptionConfig;
use crate::error::{BotError, BotResult};
use crate::types::TranscriptResult;
use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::multipart;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 音声認識クライアントの共通トレイト
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// 音声ファイルを文字起こし
    ///
    /// 出力は常に固定の言語（英語）。リトライは行わない。
    async fn transcribe(&self, path: &Path) -> BotResult<TranscriptResult>;

    /// 複数の音声ファイルを文字起こしし、結果を半角スペースで連結
    async fn transcribe_all(&self, paths: &[PathBuf]) -> BotResult<TranscriptResult> {
        let results = try_join_all(paths.iter().map(|p| self.transcribe(p))).await?;
        let text = results
            .into_iter()
            .map(|r| r.text)
            .collect::<Vec<_>>()
            .join(" ");
        Ok(TranscriptResult { text })
    }
}

/// Whisper API レスポンス
#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Whisper 互換 API（翻訳モード）クライアント
pub struct WhisperTranscriber {
    config: TranscriptionConfig,
    api_key: String,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(config: TranscriptionConfig, api_key: impl Into<String>) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BotError::Config(format!("Whisper API HTTPクライアント作成失敗: {}", e)))?;

        Ok(Self {
            config,
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/audio/translations",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

/// アップロード時のファイル名と MIME タイプ
fn upload_name_and_mime(path: &Path) -> (String, &'static str) {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.ogg".to_string());

    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        _ => "audio/ogg",
    };

    (file_name, mime)
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, path: &Path) -> BotResult<TranscriptResult> {
        let audio = tokio::fs::read(path)
            .await
            .map_err(|e| BotError::Transcription(format!("音声ファイル読み込み失敗 {:?}: {}", path, e)))?;

        log::debug!("Whisper API: {:?} ({} バイト) を送信", path, audio.len());

        let (file_name, mime) = upload_name_and_mime(path);
        let part = multipart::Part::bytes(audio)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| BotError::Transcription(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BotError::Transcription(format!("Whisper API リクエスト失敗: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BotError::Transcription(format!(
                "Whisper API エラー: {} - {}",
                status, error_text
            )));
        }

        let whisper_response: WhisperResponse = response
            .json::<WhisperResponse>()
            .await
            .map_err(|e| BotError::Transcription(format!("Whisper API レスポンスパース失敗: {}", e)))?;

        Ok(TranscriptResult {
            text: whisper_response.text.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapTranscriber(HashMap<PathBuf, String>);

    #[async_trait]
    impl Transcriber for MapTranscriber {
        async fn transcribe(&self, path: &Path) -> BotResult<TranscriptResult> {
            self.0
                .get(path)
                .map(|text| TranscriptResult { text: text.clone() })
                .ok_or_else(|| BotError::Transcription(format!("unknown {:?}", path)))
        }
    }

    #[test]
    fn test_upload_name_and_mime() {
        let (name, mime) = upload_name_and_mime(Path::new("/tmp/temp_audio/abc.ogg"));
        assert_eq!(name, "abc.ogg");
        assert_eq!(mime, "audio/ogg");

        let (_, mime) = upload_name_and_mime(Path::new("clip.wav"));
        assert_eq!(mime, "audio/wav");
    }

    #[test]
    fn test_endpoint_joins_base() {
        let config = TranscriptionConfig {
            api_base: "https://api.example.com/v1/".to_string(),
            ..TranscriptionConfig::default()
        };
        let transcriber = WhisperTranscriber::new(config, "key").unwrap();
        assert_eq!(
            transcriber.endpoint(),
            "https://api.example.com/v1/audio/translations"
        );
    }

    #[tokio::test]
    async fn test_transcribe_all_joins_with_space() {
        let mut map = HashMap::new();
        map.insert(PathBuf::from("a.ogg"), "first".to_string());
        map.insert(PathBuf::from("b.ogg"), "second".to_string());
        let transcriber = MapTranscriber(map);

        let result = transcriber
            .transcribe_all(&[PathBuf::from("a.ogg"), PathBuf::from("b.ogg")])
            .await
            .unwrap();
        assert_eq!(result.text, "first second");

        let err = transcriber
            .transcribe_all(&[PathBuf::from("a.ogg"), PathBuf::from("c.ogg")])
            .await;
        assert!(matches!(err, Err(BotError::Transcription(_))));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_transcription_error() {
        let transcriber =
            WhisperTranscriber::new(TranscriptionConfig::default(), "key").unwrap();
        let result = transcriber
            .transcribe(Path::new("/nonexistent/dir/voice.ogg"))
            .await;
        assert!(matches!(result, Err(BotError::Transcription(_))));
    }
}
