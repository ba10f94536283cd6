use crate::documents::{Chunk, Retriever};
use crate::error::{BotError, BotResult};
use crate::llm::LanguageModel;
use crate::types::AnswerResult;
use async_trait::async_trait;
use std::sync::Arc;

/// RAG プロンプトのテンプレート
const RAG_TEMPLATE: &str = "Answer the question based only on the following context:
{context}
Question: {question}
";

/// 回答生成パイプラインの共通トレイト
///
/// 同じ問い合わせでも毎回同じ回答になるとは限らない。
/// 失敗は `BotError::Generation` として返し、エラー文を回答に混ぜない。
#[async_trait]
pub trait AnswerPipeline: Send + Sync {
    async fn answer(&self, query: &str) -> BotResult<AnswerResult>;
}

/// テンプレートに文脈と質問を埋め込む
pub fn fill_prompt(context: &[Chunk], question: &str) -> String {
    let context = context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    RAG_TEMPLATE
        .replace("{context}", &context)
        .replace("{question}", question)
}

/// 検索 → プロンプト生成 → LLM 呼び出し
pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    model: Arc<dyn LanguageModel>,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(retriever: Arc<dyn Retriever>, model: Arc<dyn LanguageModel>, top_k: usize) -> Self {
        Self {
            retriever,
            model,
            top_k,
        }
    }
}

#[async_trait]
impl AnswerPipeline for RagPipeline {
    async fn answer(&self, query: &str) -> BotResult<AnswerResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(BotError::Generation("問い合わせが空です".to_string()));
        }

        let context = self.retriever.retrieve(query, self.top_k);
        log::debug!("RAG: 関連文書 {} 件", context.len());

        let prompt = fill_prompt(&context, query);
        let text = self.model.complete(&prompt).await?;

        Ok(AnswerResult { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::KeywordRetriever;
    use std::sync::Mutex;

    /// 受け取ったプロンプトを記録して固定の応答を返す
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
        reply: BotResult<String>,
    }

    impl RecordingModel {
        fn replying(text: &str) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                reply: Ok(text.to_string()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, prompt: &str) -> BotResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(BotError::Generation(e.to_string())),
            }
        }
    }

    fn retriever() -> Arc<dyn Retriever> {
        Arc::new(KeywordRetriever::new(vec![
            Chunk {
                source: "ml.txt".to_string(),
                text: "Machine learning is a field of AI.".to_string(),
            },
            Chunk {
                source: "soil.txt".to_string(),
                text: "Crop rotation keeps soil healthy.".to_string(),
            },
        ]))
    }

    #[test]
    fn test_fill_prompt() {
        let chunks = vec![
            Chunk {
                source: "a".to_string(),
                text: "ctx one".to_string(),
            },
            Chunk {
                source: "b".to_string(),
                text: "ctx two".to_string(),
            },
        ];
        let prompt = fill_prompt(&chunks, "Why?");
        assert_eq!(
            prompt,
            "Answer the question based only on the following context:\nctx one\n\nctx two\nQuestion: Why?\n"
        );
    }

    #[tokio::test]
    async fn test_rag_pipeline_uses_retrieved_context() {
        let model = Arc::new(RecordingModel::replying("ML is a field of AI."));
        let pipeline = RagPipeline::new(retriever(), model.clone(), 4);

        let answer = pipeline.answer("What is machine learning?").await.unwrap();
        assert_eq!(answer.text, "ML is a field of AI.");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Machine learning is a field of AI."));
        assert!(!prompts[0].contains("Crop rotation"));
        assert!(prompts[0].ends_with("Question: What is machine learning?\n"));
    }

    #[tokio::test]
    async fn test_rag_pipeline_propagates_generation_error() {
        let model = Arc::new(RecordingModel {
            prompts: Mutex::new(Vec::new()),
            reply: Err(BotError::Generation("503".to_string())),
        });
        let pipeline = RagPipeline::new(retriever(), model, 4);

        let result = pipeline.answer("What is machine learning?").await;
        assert!(matches!(result, Err(BotError::Generation(_))));
    }

    #[tokio::test]
    async fn test_rag_pipeline_rejects_empty_query() {
        let model = Arc::new(RecordingModel::replying("unused"));
        let pipeline = RagPipeline::new(retriever(), model.clone(), 4);

        let result = pipeline.answer("   ").await;
        assert!(matches!(result, Err(BotError::Generation(_))));
        assert!(model.prompts.lock().unwrap().is_empty());
    }
}
