//! OpenAI-compatible chat completions over server-sent events.

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    CancellationToken, ChatModel, ChunkSender, ChunkStream, ModelMessage, ModelProvider,
    ModelSelector,
};
use crate::error::{AssistError, AssistResult};

/// A configured chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEndpoint {
    pub vendor: String,
    pub family: String,
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the bearer token. `None` sends no auth.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ModelEndpoint {
    pub fn openai_default() -> Self {
        Self {
            vendor: "openai".to_string(),
            family: "gpt-4o".to_string(),
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
        }
    }

    pub fn matches(&self, selector: &ModelSelector) -> bool {
        self.vendor.eq_ignore_ascii_case(&selector.vendor)
            && self.family.eq_ignore_ascii_case(&selector.family)
    }

    /// `Some(None)` for endpoints without auth, `None` when the key is missing.
    fn resolve_api_key(&self) -> Option<Option<String>> {
        match &self.api_key_env {
            None => Some(None),
            Some(var) => env::var(var).ok().filter(|k| !k.is_empty()).map(Some),
        }
    }
}

pub struct HttpModelProvider {
    client: reqwest::Client,
    endpoints: Vec<ModelEndpoint>,
}

impl HttpModelProvider {
    pub fn new(endpoints: Vec<ModelEndpoint>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    async fn select_chat_models(&self, selector: &ModelSelector) -> AssistResult<Vec<Arc<dyn ChatModel>>> {
        let models = self
            .endpoints
            .iter()
            .filter(|endpoint| endpoint.matches(selector))
            .filter_map(|endpoint| match endpoint.resolve_api_key() {
                Some(api_key) => Some(Arc::new(HttpChatModel {
                    client: self.client.clone(),
                    id: format!("{}/{}", endpoint.vendor, endpoint.model),
                    endpoint: endpoint.clone(),
                    api_key,
                }) as Arc<dyn ChatModel>),
                None => {
                    tracing::debug!(
                        "Skipping {}/{}: {} is not set",
                        endpoint.vendor,
                        endpoint.model,
                        endpoint.api_key_env.as_deref().unwrap_or_default()
                    );
                    None
                }
            })
            .collect();
        Ok(models)
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

pub struct HttpChatModel {
    client: reqwest::Client,
    id: String,
    endpoint: ModelEndpoint,
    api_key: Option<String>,
}

#[async_trait]
impl ChatModel for HttpChatModel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_request(
        &self,
        messages: &[ModelMessage],
        cancel: CancellationToken,
    ) -> AssistResult<ChunkStream> {
        let body = ChatCompletionRequest {
            model: &self.endpoint.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role().as_str(),
                    content: m.content(),
                })
                .collect(),
            stream: true,
        };

        let url = format!("{}/chat/completions", self.endpoint.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AssistError::Cancelled),
            response = request.send() => response
                .map_err(|e| AssistError::io(e).context("Model request failed"))?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AssistError::TransientIo(format!(
                "Model request failed with {}: {}",
                status,
                text.trim()
            )));
        }

        let (tx, stream) = ChunkStream::channel();
        tokio::spawn(pump(response, tx, cancel));
        Ok(stream)
    }
}

/// Forward decoded deltas until `[DONE]`, an error, or cancellation.
async fn pump(mut response: reqwest::Response, tx: ChunkSender, cancel: CancellationToken) {
    let mut decoder = SseDecoder::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Abandoning model stream");
                return;
            }
            next = response.chunk() => next,
        };

        let ended = matches!(next, Ok(None));
        let payloads = match next {
            Ok(Some(bytes)) => decoder.push(&bytes),
            Ok(None) => decoder.finish().into_iter().collect(),
            Err(e) => {
                tx.fail(AssistError::io(e).context("Model stream failed")).await;
                return;
            }
        };

        for payload in payloads {
            match parse_data(&payload) {
                Ok(SseData::Delta(Some(text))) => {
                    if !tx.chunk(text).await {
                        return;
                    }
                }
                Ok(SseData::Delta(None)) => {}
                Ok(SseData::Done) => {
                    tx.done().await;
                    return;
                }
                Err(e) => {
                    tx.fail(e).await;
                    return;
                }
            }
        }

        if ended {
            // Some servers close without sending [DONE].
            tx.done().await;
            return;
        }
    }
}

/// Splits a byte stream into SSE `data:` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes; returns payloads of every complete `data:` line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Payload of a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SseData {
    Delta(Option<String>),
    Done,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

pub fn parse_data(data: &str) -> AssistResult<SseData> {
    if data.trim() == "[DONE]" {
        return Ok(SseData::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| AssistError::io(e).context("Malformed model stream event"))?;

    if let Some(error) = chunk.error {
        return Err(AssistError::TransientIo(error.message));
    }

    Ok(SseData::Delta(
        chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty()),
    ))
}
