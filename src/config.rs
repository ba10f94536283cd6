use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// ボットトークンを読み込む環境変数名
pub const BOT_TOKEN_ENV: &str = "TOKEN";

/// LLM / 音声認識サービスの API キーを読み込む環境変数名
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub scratch: ScratchConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// ボット（Telegram）設定
///
/// # デフォルト値
///
/// - `long_poll_timeout_secs`: 3 秒
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    /// getUpdates のロングポーリング待ち時間（秒）
    ///
    /// 更新が無いときにサーバー側で待つ上限。ポーリング間の休止時間ではない。
    #[serde(default = "default_long_poll_timeout_secs")]
    pub long_poll_timeout_secs: u32,
}

/// 一時音声ファイル設定
///
/// # デフォルト値
///
/// - `dir`: "temp_audio"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScratchConfig {
    #[serde(default = "default_scratch_dir")]
    pub dir: String,
}

/// 音声認識（Whisper 互換 API）設定
///
/// 翻訳モード（`/audio/translations`）で呼び出すため、入力言語の指定は不要。
///
/// # デフォルト値
///
/// - `api_base`: "https://api.groq.com/openai/v1"
/// - `model`: "whisper-large-v3"
/// - `timeout_secs`: 30 秒
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_whisper_model")]
    pub model: String,
    #[serde(default = "default_transcription_timeout_secs")]
    pub timeout_secs: u64,
}

/// 回答生成（RAG）設定
///
/// # デフォルト値
///
/// - `api_base`: "https://api.groq.com/openai/v1"
/// - `model`: "mixtral-8x7b-32768"
/// - `temperature`: 0.7
/// - `max_tokens`: 4096
/// - `timeout_secs`: 60 秒
/// - `documents_dir`: "documents"
/// - `chunk_size`: 1000 文字
/// - `chunk_overlap`: 200 文字
/// - `top_k`: 4
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_answer_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// 翻訳設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslationConfig {
    #[serde(default = "default_translate_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,
}

/// 音声合成設定
///
/// `language` は翻訳先と音声合成の両方に使う。言語検出は行わない。
///
/// # デフォルト値
///
/// - `language`: "hi" (ヒンディー語)
/// - `endpoint`: "https://translate.google.com/translate_tts"
/// - `audio_extension`: "ogg"
/// - `timeout_secs`: 30 秒
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeechConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,
    #[serde(default = "default_speech_timeout_secs")]
    pub timeout_secs: u64,
}

/// 固定返信メッセージ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagesConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_help")]
    pub help: String,
    #[serde(default = "default_text_apology")]
    pub text_apology: String,
    #[serde(default = "default_voice_apology")]
    pub voice_apology: String,
}

/// 出力設定
///
/// # デフォルト値
///
/// - `log_level`: "info"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl OutputConfig {
    /// `log_level` をログレベルに変換（不正な値は None）
    pub fn level_filter(&self) -> Option<log::LevelFilter> {
        self.log_level.trim().parse().ok()
    }
}

// Default functions
fn default_long_poll_timeout_secs() -> u32 {
    3
}

fn default_scratch_dir() -> String {
    "temp_audio".to_string()
}

fn default_api_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_whisper_model() -> String {
    "whisper-large-v3".to_string()
}

fn default_transcription_timeout_secs() -> u64 {
    30
}

fn default_chat_model() -> String {
    "mixtral-8x7b-32768".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_answer_timeout_secs() -> u64 {
    60
}

fn default_documents_dir() -> String {
    "documents".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    4
}

fn default_translate_endpoint() -> String {
    "https://translate.googleapis.com/translate_a/single".to_string()
}

fn default_translation_timeout_secs() -> u64 {
    10
}

fn default_language() -> String {
    "hi".to_string()
}

fn default_tts_endpoint() -> String {
    "https://translate.google.com/translate_tts".to_string()
}

fn default_audio_extension() -> String {
    "ogg".to_string()
}

fn default_speech_timeout_secs() -> u64 {
    30
}

fn default_greeting() -> String {
    "Hello! Thanks for chatting with me! I can respond to your queries with text or voice!"
        .to_string()
}

fn default_help() -> String {
    "Send me a message or a voice note, and I will respond in the same format!".to_string()
}

fn default_text_apology() -> String {
    "मुझे आपके संदेश को संसाधित करने में समस्या हो रही है। कृपया फिर से प्रयास करें।".to_string()
}

fn default_voice_apology() -> String {
    "मुझे आपकी आवाज़ नोट को संसाधित करने में समस्या हो रही है। कृपया फिर से प्रयास करें।"
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            scratch: ScratchConfig::default(),
            transcription: TranscriptionConfig::default(),
            answer: AnswerConfig::default(),
            translation: TranslationConfig::default(),
            speech: SpeechConfig::default(),
            messages: MessagesConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            long_poll_timeout_secs: default_long_poll_timeout_secs(),
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: default_scratch_dir(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_whisper_model(),
            timeout_secs: default_transcription_timeout_secs(),
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_answer_timeout_secs(),
            documents_dir: default_documents_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_translate_endpoint(),
            timeout_secs: default_translation_timeout_secs(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            endpoint: default_tts_endpoint(),
            audio_extension: default_audio_extension(),
            timeout_secs: default_speech_timeout_secs(),
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            help: default_help(),
            text_apology: default_text_apology(),
            voice_apology: default_voice_apology(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use voice_rag_bot::config::Config;
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。シークレットは書き出さない。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }
}

/// 環境変数から読み込むシークレット
///
/// 設定ファイルには含めない。
#[derive(Clone)]
pub struct Secrets {
    pub bot_token: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("bot_token", &"***")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Secrets {
    /// プロセスの環境変数から読み込み
    ///
    /// # Errors
    ///
    /// ボットトークンが未設定または空の場合
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数から読み込み
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup(BOT_TOKEN_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .with_context(|| format!("環境変数 {} が設定されていません", BOT_TOKEN_ENV))?;

        let api_key = lookup(API_KEY_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if api_key.is_none() {
            log::warn!(
                "環境変数 {} が設定されていません。LLM / 音声認識の呼び出しは失敗します",
                API_KEY_ENV
            );
        }

        Ok(Self { bot_token, api_key })
    }
}
