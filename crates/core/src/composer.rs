use crate::error::{ConfigurationError, ModelInvocationError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Returned instead of calling the chat model when retrieval finds nothing.
/// Skipping the call avoids an ungrounded answer and a wasted network trip.
pub const NO_CONTEXT_FALLBACK: &str = "I'm sorry, but I couldn't find any information related to \
     your question in the uploaded documents. Could you please ask something else?";

/// Build the grounded prompt from retrieved chunks and the user question.
/// Chunks are joined in retrieval order with a blank line between them.
pub fn compose_prompt(query: &str, retrieved_chunks: &[String]) -> String {
    let context = retrieved_chunks.join("\n\n");
    format!("Based on this context: {context}\n\nAnswer this question: {query}")
}

/// External chat-completion collaborator.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelInvocationError>;
}

/// Compose and forward to the chat model, or short-circuit to the fixed
/// fallback when there is no retrieved context.
pub async fn answer(
    model: &dyn ChatModel,
    query: &str,
    retrieved_chunks: &[String],
) -> Result<String, ModelInvocationError> {
    if retrieved_chunks.is_empty() {
        return Ok(NO_CONTEXT_FALLBACK.to_string());
    }

    let prompt = compose_prompt(query, retrieved_chunks);
    model.complete(&prompt).await
}

/// Configuration for the hosted chat-completion endpoint. The API key has no
/// default; endpoint and model name do.
#[derive(Debug, Clone)]
pub struct ChatModelConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl ChatModelConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1/chat/completions";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Read configuration from the environment. `CHAT_API_KEY` is required;
    /// `CHAT_API_URL` and `CHAT_MODEL` fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let api_key = std::env::var("CHAT_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigurationError::MissingCredential("CHAT_API_KEY"))?;

        Ok(Self {
            api_key,
            endpoint: std::env::var("CHAT_API_URL")
                .unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string()),
            model: std::env::var("CHAT_MODEL").unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string()),
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }
}

/// [`ChatModel`] implementation for OpenAI-style chat-completions APIs.
pub struct ChatCompletionsClient {
    endpoint: Url,
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(config: ChatModelConfig) -> Result<Self, ConfigurationError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigurationError::MissingCredential("CHAT_API_KEY"));
        }
        let endpoint = Url::parse(&config.endpoint)?;

        Ok(Self {
            endpoint,
            api_key: config.api_key,
            model: config.model,
            timeout: config.timeout,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl ChatModel for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String, ModelInvocationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(ModelInvocationError::Response {
                status: status.as_u16(),
                details: details.chars().take(500).collect(),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ModelInvocationError::EmptyCompletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        calls: AtomicUsize,
        reply: String,
    }

    impl CountingModel {
        fn new(reply: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply: reply.to_string(),
            }
        }
    }

    #[async_trait]
    impl ChatModel for CountingModel {
        async fn complete(&self, _prompt: &str) -> Result<String, ModelInvocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn prompt_embeds_context_and_question() {
        let chunks = vec![
            "Patient has stage 2 hypertension.".to_string(),
            "Recommended follow-up in 3 months.".to_string(),
        ];
        let prompt = compose_prompt("What is the follow-up recommendation?", &chunks);

        assert_eq!(
            prompt,
            "Based on this context: Patient has stage 2 hypertension.\n\n\
             Recommended follow-up in 3 months.\n\n\
             Answer this question: What is the follow-up recommendation?"
        );
    }

    #[tokio::test]
    async fn empty_context_short_circuits_without_model_call() {
        let model = CountingModel::new("should never be seen");
        let response = answer(&model, "any question", &[]).await.unwrap();

        assert_eq!(response, NO_CONTEXT_FALLBACK);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn grounded_question_invokes_model_once() {
        let model = CountingModel::new("Follow up in 3 months.");
        let chunks = vec!["Recommended follow-up in 3 months.".to_string()];
        let response = answer(&model, "When is the follow-up?", &chunks)
            .await
            .unwrap();

        assert_eq!(response, "Follow up in 3 months.");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn client_rejects_blank_api_key() {
        let config = ChatModelConfig {
            api_key: "  ".to_string(),
            endpoint: ChatModelConfig::DEFAULT_ENDPOINT.to_string(),
            model: ChatModelConfig::DEFAULT_MODEL.to_string(),
            timeout: ChatModelConfig::DEFAULT_TIMEOUT,
        };
        assert!(matches!(
            ChatCompletionsClient::new(config),
            Err(ConfigurationError::MissingCredential("CHAT_API_KEY"))
        ));
    }

    #[test]
    fn client_rejects_invalid_endpoint() {
        let config = ChatModelConfig {
            api_key: "key".to_string(),
            endpoint: "not a url".to_string(),
            model: ChatModelConfig::DEFAULT_MODEL.to_string(),
            timeout: ChatModelConfig::DEFAULT_TIMEOUT,
        };
        assert!(matches!(
            ChatCompletionsClient::new(config),
            Err(ConfigurationError::InvalidEndpoint(_))
        ));
    }
}
