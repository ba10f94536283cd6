use crate::answer::{AnswerPipeline, RagPipeline};
use crate::config::{Config, MessagesConfig, Secrets};
use crate::documents::{load_documents, split_documents, KeywordRetriever};
use crate::llm::ChatCompletionClient;
use crate::scratch::AudioFileStore;
use crate::speech::{GoogleTts, SpeechSynthesizer};
use crate::transcription::{Transcriber, WhisperTranscriber};
use crate::translation::{GoogleTranslator, Translator};
use anyhow::{Context, Result};
use std::sync::Arc;

/// 起動時に一度だけ組み立てる依存関係
///
/// オーケストレーターはこれを通してのみ外部サービスにアクセスする。
/// テストでは各フィールドをモックに差し替える。
#[derive(Clone)]
pub struct Services {
    pub store: Arc<AudioFileStore>,
    pub transcriber: Arc<dyn Transcriber>,
    pub answer: Arc<dyn AnswerPipeline>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// 翻訳先・音声合成の言語
    pub language: String,
    /// 合成音声ファイルの拡張子
    pub audio_extension: String,
    pub messages: MessagesConfig,
}

impl Services {
    /// 設定とシークレットから本番用の依存関係を組み立てる
    pub fn from_config(config: &Config, secrets: &Secrets) -> Result<Self> {
        let api_key = secrets.api_key.clone().unwrap_or_default();

        let store = AudioFileStore::open(&config.scratch.dir)
            .with_context(|| format!("一時音声ディレクトリの準備に失敗: {}", config.scratch.dir))?;

        let transcriber = WhisperTranscriber::new(config.transcription.clone(), api_key.clone())
            .context("音声認識クライアントの作成に失敗")?;

        let documents = load_documents(&config.answer.documents_dir)
            .with_context(|| format!("文書の読み込みに失敗: {}", config.answer.documents_dir))?;
        let chunks = split_documents(
            &documents,
            config.answer.chunk_size,
            config.answer.chunk_overlap,
        );
        log::info!("検索インデックス: {} 断片", chunks.len());
        let retriever = Arc::new(KeywordRetriever::new(chunks));

        let model = Arc::new(
            ChatCompletionClient::new(&config.answer, api_key)
                .context("LLM クライアントの作成に失敗")?,
        );
        let answer = RagPipeline::new(retriever, model, config.answer.top_k);

        let translator =
            GoogleTranslator::new(&config.translation).context("翻訳クライアントの作成に失敗")?;
        let synthesizer =
            GoogleTts::new(&config.speech).context("音声合成クライアントの作成に失敗")?;

        Ok(Self {
            store: Arc::new(store),
            transcriber: Arc::new(transcriber),
            answer: Arc::new(answer),
            translator: Arc::new(translator),
            synthesizer: Arc::new(synthesizer),
            language: config.speech.language.clone(),
            audio_extension: config.speech.audio_extension.clone(),
            messages: config.messages.clone(),
        })
    }
}
