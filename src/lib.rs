//! voice-rag-bot - 文書検索付き LLM で質問に答える Telegram ボット
//!
//! テキストまたは音声メモで届いた質問に、登録済み文書を根拠として回答する。
//! 音声で質問された場合は、回答を翻訳して音声でも返信する。
//!
//! # 主な機能
//!
//! - **テキスト質問**: 回答をテキストで返信
//! - **音声質問**: 文字起こし → 回答 → 翻訳 → 音声合成 → テキスト + 音声で返信
//! - **RAG**: ローカル文書を分割・検索し、LLM のプロンプトに埋め込む
//! - **フォールバック**: どの段階で失敗しても謝罪メッセージを返信
//! - **一時ファイル管理**: 音声ファイルはメッセージ毎に一意な名前で作成し、処理後に削除
//!
//! # アーキテクチャ
//!
//! ```text
//! [Telegram] → [bot (teloxide)] → [MessageOrchestrator]
//!                                        │
//!          ┌──────────────┬──────────────┼──────────────┬──────────────┐
//!          ↓              ↓              ↓              ↓              ↓
//!   [AudioFileStore] [Transcriber] [AnswerPipeline] [Translator] [SpeechSynthesizer]
//!                                        │
//!                                ┌───────┴───────┐
//!                                ↓               ↓
//!                           [Retriever]    [LanguageModel]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use voice_rag_bot::config::Config;
//!
//! // 設定ファイルを読み込み
//! let config = Config::load_or_default("config.toml").unwrap();
//!
//! // またはデフォルト設定を生成
//! Config::write_default("config.toml").unwrap();
//! ```

pub mod answer;
pub mod bot;
pub mod config;
pub mod context;
pub mod documents;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod scratch;
pub mod speech;
pub mod transcription;
pub mod translation;
pub mod transport;
pub mod types;
