use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use warden_core::{LlmConfig, Result, WardenError};

/// The analysis model boundary.
///
/// One prompt in, free text out. The response is expected to contain a JSON
/// object but nothing here assumes it does; decoding is the parser's job.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a rendered prompt and return the model's text response.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Environment variable that holds the API key for a provider.
///
/// # Examples
///
/// ```
/// use warden_review::api_key_env_var;
///
/// assert_eq!(api_key_env_var("openai"), "OPENAI_API_KEY");
/// assert_eq!(api_key_env_var("anthropic"), "ANTHROPIC_API_KEY");
/// assert_eq!(api_key_env_var("my-proxy"), "MY_PROXY_API_KEY");
/// ```
pub fn api_key_env_var(provider: &str) -> String {
    match provider {
        "openai" => "OPENAI_API_KEY".into(),
        "anthropic" => "ANTHROPIC_API_KEY".into(),
        "gemini" | "google" => "GEMINI_API_KEY".into(),
        "groq" => "GROQ_API_KEY".into(),
        other => format!(
            "{}_API_KEY",
            other.to_uppercase().replace(['-', '.'], "_")
        ),
    }
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes the `/v1/chat/completions` endpoint:
/// OpenAI, Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use warden_core::LlmConfig;
/// use warden_review::LlmClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// The API key comes from the config, falling back to the provider's
    /// environment variable. Key-less providers (local Ollama) work with
    /// neither set.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Llm`] if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::LlmConfig;
    /// use warden_review::LlmClient;
    ///
    /// let client = LlmClient::new(&LlmConfig::default()).unwrap();
    /// ```
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WardenError::Llm(format!("failed to create HTTP client: {e}")))?;

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(api_key_env_var(&config.provider)).ok());

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com");
        let url = format!("{base_url}/v1/chat/completions");

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.1,
        });

        debug!(model = %self.config.model, prompt_chars = prompt.len(), "sending analysis request");

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }
        request = request.header("Content-Type", "application/json");

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| WardenError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(WardenError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| WardenError::Llm(format!("failed to parse response: {e}")))?;

        let content = response_body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                WardenError::Llm(format!("unexpected response structure: {response_body}"))
            })?;

        info!(chars = content.len(), "model responded");
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(server_url: &str) -> LlmConfig {
        LlmConfig {
            base_url: Some(server_url.to_string()),
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn client_construction_succeeds() {
        let config = LlmConfig::default();
        let client = LlmClient::new(&config);
        assert!(client.is_ok());
    }

    #[test]
    fn model_returns_config_model() {
        let config = LlmConfig {
            model: "gpt-4o-mini".into(),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn api_key_env_var_known_providers() {
        assert_eq!(api_key_env_var("openai"), "OPENAI_API_KEY");
        assert_eq!(api_key_env_var("gemini"), "GEMINI_API_KEY");
        assert_eq!(api_key_env_var("google"), "GEMINI_API_KEY");
        assert_eq!(api_key_env_var("groq"), "GROQ_API_KEY");
    }

    #[test]
    fn api_key_env_var_falls_back_to_uppercase() {
        assert_eq!(api_key_env_var("litellm"), "LITELLM_API_KEY");
        assert_eq!(api_key_env_var("my-proxy"), "MY_PROXY_API_KEY");
    }

    #[tokio::test]
    async fn complete_returns_message_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"all clear"}}]}"#)
            .create_async()
            .await;

        let client = LlmClient::new(&test_config(&server.url())).unwrap();
        let text = client.complete("review this").await.unwrap();

        mock.assert_async().await;
        assert_eq!(text, "all clear");
    }

    #[tokio::test]
    async fn complete_surfaces_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let client = LlmClient::new(&test_config(&server.url())).unwrap();
        let err = client.complete("review this").await.unwrap_err();
        assert!(err.to_string().contains("429"), "got: {err}");
    }

    #[tokio::test]
    async fn complete_rejects_unexpected_response_shape() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let client = LlmClient::new(&test_config(&server.url())).unwrap();
        let err = client.complete("review this").await.unwrap_err();
        assert!(err.to_string().contains("unexpected response structure"));
    }
}
