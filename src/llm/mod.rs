//! Language model abstraction.
//!
//! A [`ModelProvider`] resolves chat models by vendor and family; a
//! [`ChatModel`] answers a message list with a [`ChunkStream`], an explicit
//! producer that ends with [`StreamEvent::Done`] or [`StreamEvent::Failed`].

mod gateway;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{AssistError, AssistResult};

pub use gateway::{ChunkSink, ModelGateway, NO_MODEL_FOUND};
pub use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
        }
    }
}

/// Role-tagged prompt text. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    role: Role,
    content: String,
}

impl ModelMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Which model to ask for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelector {
    pub vendor: String,
    pub family: String,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self {
            vendor: "openai".to_string(),
            family: "gpt-4o".to_string(),
        }
    }
}

/// Accumulated answer text, or the reason there is none.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelResponse {
    pub value: String,
    pub error: Option<AssistError>,
}

impl ModelResponse {
    pub fn success(value: String) -> Self {
        Self { value, error: None }
    }

    pub fn failed(error: AssistError) -> Self {
        Self {
            value: String::new(),
            error: Some(error),
        }
    }

    /// Error text, empty on success.
    pub fn error_message(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Done,
    Failed(AssistError),
}

/// Producer half of a [`ChunkStream`].
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<StreamEvent>,
}

impl ChunkSender {
    /// Returns `false` once the consumer has gone away.
    pub async fn chunk(&self, text: impl Into<String>) -> bool {
        self.tx.send(StreamEvent::Chunk(text.into())).await.is_ok()
    }

    pub async fn done(self) {
        let _ = self.tx.send(StreamEvent::Done).await;
    }

    pub async fn fail(self, error: AssistError) {
        let _ = self.tx.send(StreamEvent::Failed(error)).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Ordered text fragments from one model request.
#[derive(Debug)]
pub struct ChunkStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl ChunkStream {
    const BUFFER: usize = 64;

    pub fn channel() -> (ChunkSender, ChunkStream) {
        let (tx, rx) = mpsc::channel(Self::BUFFER);
        (ChunkSender { tx }, ChunkStream { rx })
    }

    /// `None` means the producer went away without finishing.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn id(&self) -> &str;

    /// Start one streaming request. The producer stops when `cancel` fires.
    async fn send_request(
        &self,
        messages: &[ModelMessage],
        cancel: CancellationToken,
    ) -> AssistResult<ChunkStream>;
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Models matching `selector`, best first. Empty when none is usable.
    async fn select_chat_models(&self, selector: &ModelSelector) -> AssistResult<Vec<Arc<dyn ChatModel>>>;
}
