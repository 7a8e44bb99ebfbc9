//! Language model integration
//!
//! - [`LanguageModel`]: provider seam with single-shot and streaming calls
//! - [`openai`]: OpenAI-compatible chat completions client
//! - [`sse`]: incremental `text/event-stream` decoder
//!
//! A stream is a finite, forward-only sequence of [`StreamChunk`]s ending in
//! exactly one `done` or `error` chunk. Dropping it cancels generation.

pub mod openai;
pub mod sse;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::Serialize;

use crate::models::StreamChunk;
use crate::{Result, SeaguardError};

pub use openai::OpenAiClient;

/// Boxed chunk sequence handed from a model to its consumer
pub type ChunkStream = BoxStream<'static, StreamChunk>;

/// A single prompt with optional generation overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_message: Option<String>,
    /// Falls back to the configured default when `None`
    pub temperature: Option<f32>,
    /// Falls back to the configured default when `None`
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON object response
    pub json_output: bool,
}

impl CompletionRequest {
    pub fn new<S: Into<String>>(prompt: S) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_system<S: Into<String>>(mut self, system_message: S) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    #[must_use]
    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// A hosted language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier reported to clients
    fn model_name(&self) -> &str;

    /// Generate the full response text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Generate the response incrementally. Provider failures are reported
    /// as a terminal `error` chunk rather than an `Err`.
    fn stream(&self, request: CompletionRequest) -> ChunkStream;
}

/// Enforce the single-terminal contract on any chunk stream: stop after the
/// first terminal chunk and append an `error` chunk if the source ends
/// without one.
#[must_use]
pub fn ensure_terminal(inner: ChunkStream) -> ChunkStream {
    stream::unfold(Some(inner), |state| async move {
        let mut inner = state?;
        match inner.next().await {
            Some(chunk) if chunk.is_terminal() => Some((chunk, None)),
            Some(chunk) => Some((chunk, Some(inner))),
            None => Some((
                StreamChunk::error(SeaguardError::StreamTruncated.to_string()),
                None,
            )),
        }
    })
    .boxed()
}

/// Drain a stream into its full text; an `error` chunk or a missing terminal
/// becomes an `Err`
pub async fn collect_text(stream: ChunkStream) -> Result<String> {
    let mut stream = stream;
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Content { content } => text.push_str(&content),
            StreamChunk::Done { .. } => return Ok(text),
            StreamChunk::Error { error } => return Err(SeaguardError::llm(None, error)),
        }
    }
    Err(SeaguardError::StreamTruncated)
}

/// Cut the JSON object out of model output that may wrap it in Markdown
/// fences or prose
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let mut body = text.trim();
    if let Some((_, rest)) = body.split_once("```json") {
        body = rest.split("```").next().unwrap_or(rest);
    } else if let Some((_, rest)) = body.split_once("```") {
        body = rest.split("```").next().unwrap_or(rest);
    }
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(items: Vec<StreamChunk>) -> ChunkStream {
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn test_ensure_terminal_passes_through_complete_stream() {
        let out: Vec<_> = ensure_terminal(chunks(vec![
            StreamChunk::content("a"),
            StreamChunk::content("b"),
            StreamChunk::done(),
        ]))
        .collect()
        .await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[2], StreamChunk::done());
    }

    #[tokio::test]
    async fn test_ensure_terminal_appends_error_on_truncation() {
        let out: Vec<_> = ensure_terminal(chunks(vec![StreamChunk::content("a")]))
            .collect()
            .await;
        assert_eq!(out.len(), 2);
        match &out[1] {
            StreamChunk::Error { error } => assert!(error.contains("truncated")),
            other => panic!("expected error chunk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ensure_terminal_stops_after_first_terminal() {
        let out: Vec<_> = ensure_terminal(chunks(vec![
            StreamChunk::content("a"),
            StreamChunk::error("boom"),
            StreamChunk::content("late"),
            StreamChunk::done(),
        ]))
        .collect()
        .await;
        assert_eq!(out, vec![StreamChunk::content("a"), StreamChunk::error("boom")]);
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
        assert_eq!(
            extract_json_object("```json\n{\"a\": {\"b\": 2}}\n```"),
            Some("{\"a\": {\"b\": 2}}")
        );
        assert_eq!(
            extract_json_object("Sure!\n```\n{\"a\":1}\n```\nanything else?"),
            Some("{\"a\":1}")
        );
        assert_eq!(extract_json_object("Result: {\"a\":1} done"), Some("{\"a\":1}"));
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[tokio::test]
    async fn test_collect_text() {
        let text = collect_text(chunks(vec![
            StreamChunk::content("Hello, "),
            StreamChunk::content("sea"),
            StreamChunk::done(),
        ]))
        .await
        .unwrap();
        assert_eq!(text, "Hello, sea");

        let err = collect_text(chunks(vec![StreamChunk::content("x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, SeaguardError::StreamTruncated));

        let err = collect_text(chunks(vec![StreamChunk::error("rate limited")]))
            .await
            .unwrap_err();
        assert!(matches!(err, SeaguardError::LlmProvider { .. }));
    }
}
