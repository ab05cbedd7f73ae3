use std::sync::Arc;

use super::{CancellationToken, ModelMessage, ModelProvider, ModelResponse, ModelSelector, StreamEvent};
use crate::error::{AssistError, AssistResult};

pub const NO_MODEL_FOUND: &str = "No language model found";

/// Receives each streamed fragment, in order, before the next is awaited.
pub type ChunkSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Single-attempt access to the preferred chat model.
pub struct ModelGateway {
    provider: Arc<dyn ModelProvider>,
    selector: ModelSelector,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn ModelProvider>, selector: ModelSelector) -> Self {
        Self { provider, selector }
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    /// Send `messages` to the first matching model and collect its answer.
    ///
    /// A missing model is reported in the response, not as an `Err`.
    /// Cancellation and stream failures are returned as errors and no
    /// partial text is kept.
    pub async fn ask(
        &self,
        messages: &[ModelMessage],
        mut on_chunk: Option<ChunkSink<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> AssistResult<ModelResponse> {
        let models = self.provider.select_chat_models(&self.selector).await?;
        let Some(model) = models.into_iter().next() else {
            tracing::warn!(
                "No chat model for vendor={} family={}",
                self.selector.vendor,
                self.selector.family
            );
            return Ok(ModelResponse::failed(AssistError::Unavailable(
                NO_MODEL_FOUND.to_string(),
            )));
        };

        tracing::debug!("Sending {} messages to {}", messages.len(), model.id());

        let token = cancel.cloned().unwrap_or_default();
        let mut stream = model.send_request(messages, token.clone()).await?;
        let mut value = String::new();

        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::info!("Request to {} cancelled", model.id());
                    return Err(AssistError::Cancelled);
                }
                event = stream.next() => event,
            };

            match event {
                Some(StreamEvent::Chunk(text)) => {
                    value.push_str(&text);
                    if let Some(sink) = on_chunk.as_deref_mut() {
                        sink(&text);
                    }
                }
                Some(StreamEvent::Done) => break,
                Some(StreamEvent::Failed(err)) => return Err(err),
                None => {
                    return Err(AssistError::TransientIo(
                        "Model stream closed before completion".to_string(),
                    ))
                }
            }
        }

        tracing::debug!("Received {} bytes from {}", value.len(), model.id());
        Ok(ModelResponse::success(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatModel, ChunkStream};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Plays a fixed script of events, optionally stalling before the end.
    struct ScriptedModel {
        chunks: Vec<&'static str>,
        finish: bool,
        stall: bool,
        requests: AtomicUsize,
        seen: Mutex<Vec<ModelMessage>>,
    }

    impl ScriptedModel {
        fn new(chunks: Vec<&'static str>) -> Self {
            Self {
                chunks,
                finish: true,
                stall: false,
                requests: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn send_request(
            &self,
            messages: &[ModelMessage],
            cancel: CancellationToken,
        ) -> AssistResult<ChunkStream> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().extend(messages.iter().cloned());

            let (tx, stream) = ChunkStream::channel();
            let chunks = self.chunks.clone();
            let (finish, stall) = (self.finish, self.stall);
            tokio::spawn(async move {
                for chunk in chunks {
                    tx.chunk(chunk).await;
                }
                if stall {
                    cancel.cancelled().await;
                    return;
                }
                if finish {
                    tx.done().await;
                }
            });
            Ok(stream)
        }
    }

    struct FixedProvider {
        model: Option<Arc<ScriptedModel>>,
    }

    #[async_trait]
    impl ModelProvider for FixedProvider {
        async fn select_chat_models(
            &self,
            _selector: &ModelSelector,
        ) -> AssistResult<Vec<Arc<dyn ChatModel>>> {
            Ok(self
                .model
                .iter()
                .map(|m| m.clone() as Arc<dyn ChatModel>)
                .collect())
        }
    }

    fn gateway(model: Option<Arc<ScriptedModel>>) -> ModelGateway {
        ModelGateway::new(Arc::new(FixedProvider { model }), ModelSelector::default())
    }

    #[tokio::test]
    async fn test_no_model_returns_error_response() {
        let response = gateway(None)
            .ask(&[ModelMessage::user("hi")], None, None)
            .await
            .unwrap();

        assert_eq!(response.value, "");
        assert_eq!(response.error_message(), "No language model found");
    }

    #[tokio::test]
    async fn test_chunks_accumulate_and_reach_sink_in_order() {
        let model = Arc::new(ScriptedModel::new(vec!["SEL", "ECT ", "1"]));
        let gateway = gateway(Some(model.clone()));

        let mut received = Vec::new();
        let mut sink = |chunk: &str| received.push(chunk.to_string());
        let response = gateway
            .ask(
                &[ModelMessage::user("one"), ModelMessage::user("two")],
                Some(&mut sink),
                None,
            )
            .await
            .unwrap();

        assert_eq!(response, ModelResponse::success("SELECT 1".to_string()));
        assert_eq!(received, vec!["SEL", "ECT ", "1"]);
        assert_eq!(model.requests.load(Ordering::SeqCst), 1);

        let seen = model.seen.lock().unwrap();
        let contents: Vec<_> = seen.iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_stream_closed_early_is_transient_io() {
        let mut scripted = ScriptedModel::new(vec!["partial"]);
        scripted.finish = false;

        let err = gateway(Some(Arc::new(scripted)))
            .ask(&[ModelMessage::user("hi")], None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::TransientIo);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_returns_cancelled() {
        let mut scripted = ScriptedModel::new(vec!["SELECT"]);
        scripted.stall = true;
        let gateway = gateway(Some(Arc::new(scripted)));

        let token = CancellationToken::new();
        let trigger = token.clone();
        let mut sink = move |_: &str| trigger.cancel();

        let err = gateway
            .ask(&[ModelMessage::user("hi")], Some(&mut sink), Some(&token))
            .await
            .unwrap_err();
        assert_eq!(err, AssistError::Cancelled);
    }
}
