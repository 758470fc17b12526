//! Blocking clients for OpenAI-compatible chat and embedding endpoints.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use world_rules::Embedding;

use super::{CompletionRequest, EmbeddingOracle, LanguageOracle, OracleError};
use crate::config::OracleConfig;

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Timeout
        } else if err.is_decode() {
            OracleError::Malformed(err.to_string())
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingBody<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Shared HTTP plumbing for both oracles.
#[derive(Debug, Clone)]
struct OracleHttp {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OracleHttp {
    fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key(),
        })
    }

    fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, OracleError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(%url, status = status.as_u16(), "oracle responded");
        Ok(response.json()?)
    }
}

/// Language oracle over `POST {base_url}/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    inner: OracleHttp,
    model: String,
}

impl ChatCompletionsClient {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        Ok(Self {
            inner: OracleHttp::new(config)?,
            model: config.chat_model.clone(),
        })
    }
}

impl LanguageOracle for ChatCompletionsClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let response: ChatCompletionResponse = self.inner.post_json("/v1/chat/completions", &body)?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default().trim().to_string())
            .ok_or_else(|| OracleError::Malformed("response has no choices".to_string()))
    }
}

/// Embedding oracle over `POST {base_url}/v1/embeddings`.
///
/// Vectors are width-checked and L2-normalised before they are returned.
#[derive(Debug, Clone)]
pub struct EmbeddingsClient {
    inner: OracleHttp,
    model: String,
}

impl EmbeddingsClient {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        Ok(Self {
            inner: OracleHttp::new(config)?,
            model: config.embedding_model.clone(),
        })
    }
}

impl EmbeddingOracle for EmbeddingsClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError> {
        let body = EmbeddingBody {
            model: &self.model,
            input: text,
        };
        let response: EmbeddingResponse = self.inner.post_json("/v1/embeddings", &body)?;
        let vector = response
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| OracleError::Malformed("response has no embedding".to_string()))?;
        unit_vector(vector)
    }
}

fn unit_vector(raw: Vec<f32>) -> Result<Vec<f32>, OracleError> {
    let embedding = Embedding::new(raw).map_err(|err| OracleError::Malformed(err.to_string()))?;
    Ok(embedding.normalized().into_inner())
}
