use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Response;
use tracing::debug;

use super::types::*;
use crate::{AiError, Result};

pub(crate) const OPENAI_API_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) struct OpenAiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AiError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.to_string(),
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| AiError::Config("API key is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, messages = request.messages.len(), "OpenAI chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let chat_response: ChatResponse = check_status(response).await?.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::Parse("No response from OpenAI".into()))
    }

    pub async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        debug!(model, inputs = texts.len(), "OpenAI embedding request");

        let request = EmbeddingRequest { model, input: texts };

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        let embed_response: EmbeddingResponse = check_status(response).await?.json().await?;
        let vectors = embed_response.into_ordered();

        if vectors.len() != texts.len() {
            return Err(AiError::Parse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        Ok(vectors)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AiError::Api {
        status: status.as_u16(),
        body,
    })
}
