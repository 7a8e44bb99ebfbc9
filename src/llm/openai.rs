//! OpenAI-compatible chat completions client

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, warn};

use super::sse::SseDecoder;
use super::{ChunkStream, CompletionRequest, LanguageModel};
use crate::config::LlmConfig;
use crate::http::{Deadline, build_client};
use crate::marine::payload::preview;
use crate::models::StreamChunk;
use crate::{Result, SeaguardError};

/// Chunks buffered between the provider reader and the consumer
const STREAM_BUFFER: usize = 16;

/// Chat completions client
#[derive(Clone)]
pub struct OpenAiClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
    model: String,
    default_temperature: f32,
    default_max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// What a single `data:` payload of the provider stream means
#[derive(Debug, PartialEq)]
enum StreamEvent {
    Token(String),
    Done,
    Skip,
}

fn parse_stream_payload(data: &str) -> Result<StreamEvent> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(StreamEvent::Skip);
    }
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }
    if let Ok(chunk) = serde_json::from_str::<ChatChunk>(data) {
        let text: String = chunk
            .choices
            .into_iter()
            .filter_map(|choice| choice.delta.content)
            .collect();
        return Ok(if text.is_empty() {
            StreamEvent::Skip
        } else {
            StreamEvent::Token(text)
        });
    }
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(data) {
        return Err(SeaguardError::llm(None, envelope.error.message));
    }
    Err(SeaguardError::llm(
        None,
        format!("unrecognised stream payload: {}", preview(data, 200)),
    ))
}

/// Pull the provider's own error message out of a failure body
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| preview(body, 500))
}

impl OpenAiClient {
    /// Create a new client; fails when no API key is configured
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| SeaguardError::configuration_missing("OPENAI_API_KEY is not set"))?;
        let client = build_client(
            Deadline::PerRead(Duration::from_secs(config.timeout_seconds.into())),
            config.max_retries,
        )?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
        })
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::Response> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_message.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature.unwrap_or(self.default_temperature),
            max_tokens: request.max_tokens.unwrap_or(self.default_max_tokens),
            stream,
            response_format: request.json_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let body = serde_json::to_vec(&body)
            .map_err(|e| SeaguardError::internal(format!("Failed to encode request: {e}")))?;

        debug!(
            "Calling {} (stream={}, prompt {} chars)",
            self.model,
            stream,
            request.prompt.chars().count()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SeaguardError::llm(None, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM provider returned {}: {}", status, preview(&body, 200));
            return Err(SeaguardError::llm(Some(status.as_u16()), error_message(&body)));
        }
        Ok(response)
    }

    /// Relay provider tokens into `tx` until the stream ends or the consumer
    /// goes away
    async fn relay(self, request: CompletionRequest, tx: mpsc::Sender<StreamChunk>) {
        let terminal = tokio::select! {
            outcome = self.pump(&request, &tx) => match outcome {
                Ok(()) => StreamChunk::done(),
                Err(e) => {
                    warn!("LLM stream failed: {}", e);
                    StreamChunk::error(e.to_string())
                }
            },
            () = tx.closed() => {
                debug!("Stream consumer dropped; releasing provider connection");
                return;
            }
        };
        // The consumer may already be gone
        let _ = tx.send(terminal).await;
    }

    async fn pump(
        &self,
        request: &CompletionRequest,
        tx: &mpsc::Sender<StreamChunk>,
    ) -> Result<()> {
        let start_time = Instant::now();
        let response = self.send(request, true).await?;
        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut tokens = 0usize;

        while let Some(bytes) = body.next().await {
            let bytes =
                bytes.map_err(|e| SeaguardError::llm(None, format!("stream read failed: {e}")))?;
            for data in decoder.push(&bytes) {
                match parse_stream_payload(&data)? {
                    StreamEvent::Token(text) => {
                        tokens += 1;
                        if tx.send(StreamChunk::content(text)).await.is_err() {
                            return Ok(());
                        }
                    }
                    StreamEvent::Done => {
                        info!(
                            "LLM stream finished: {} chunks in {:.3}s",
                            tokens,
                            start_time.elapsed().as_secs_f64()
                        );
                        return Ok(());
                    }
                    StreamEvent::Skip => {}
                }
            }
        }

        if let Some(data) = decoder.finish() {
            if parse_stream_payload(&data)? == StreamEvent::Done {
                return Ok(());
            }
        }
        Err(SeaguardError::StreamTruncated)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let start_time = Instant::now();
        let response = self.send(request, false).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SeaguardError::llm(Some(status.as_u16()), format!("read failed: {e}")))?;

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            SeaguardError::llm(
                Some(status.as_u16()),
                format!("invalid completion payload ({e}): {}", preview(&body, 200)),
            )
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SeaguardError::llm(Some(status.as_u16()), "completion had no content"))?;

        info!(
            "LLM completion: {} chars in {:.3}s",
            text.chars().count(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(text)
    }

    fn stream(&self, request: CompletionRequest) -> ChunkStream {
        let client = self.clone();
        // Nothing is sent until the consumer first polls
        stream::once(async move {
            let (tx, rx) = mpsc::channel(STREAM_BUFFER);
            tokio::spawn(client.relay(request, tx));
            ReceiverStream::new(rx)
        })
        .flatten()
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_payload_token() {
        let data = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        assert_eq!(
            parse_stream_payload(data).unwrap(),
            StreamEvent::Token("Hi".to_string())
        );
    }

    #[test]
    fn test_parse_stream_payload_role_only_delta_is_skipped() {
        let data = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_stream_payload(data).unwrap(), StreamEvent::Skip);
        let data = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_stream_payload(data).unwrap(), StreamEvent::Skip);
    }

    #[test]
    fn test_parse_stream_payload_done_and_error() {
        assert_eq!(parse_stream_payload("[DONE]").unwrap(), StreamEvent::Done);
        let err = parse_stream_payload(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert!(err.to_string().contains("overloaded"));
        assert!(parse_stream_payload("not json").is_err());
    }

    #[test]
    fn test_error_message_prefers_provider_text() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error"}}"#),
            "Incorrect API key"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = OpenAiClient::new(&LlmConfig::default()).err().unwrap();
        assert!(matches!(err, SeaguardError::ConfigurationMissing { .. }));
    }
}
