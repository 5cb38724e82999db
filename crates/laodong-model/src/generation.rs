//! OpenAI-compatible chat completion client with SSE token streaming.
//!
//! Dropping a [`TokenStream`] drops the underlying response body, which closes
//! the connection. No further tokens are pulled from the provider after that.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::config::{resolve_api_key, GenerationConfig};
use crate::error::{check_status, ModelError, ModelResult};
use crate::{endpoint, http_client};

/// Stream of generated text fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = ModelResult<String>> + Send>>;

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

// ============================================================================
// Client
// ============================================================================

/// Client for `/chat/completions` on Groq, OpenAI, Gemini or a custom server.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionClient {
    /// Create a client.
    ///
    /// A missing key is logged rather than rejected so `health` can still
    /// report the provider as unreachable.
    pub fn new(config: &GenerationConfig) -> ModelResult<Self> {
        let base_url = config.effective_base_url()?;
        let model = config.effective_model()?;
        let key_env = config.effective_api_key_env();
        let api_key = resolve_api_key(&config.provider.to_string(), key_env.as_deref(), false)?;

        if api_key.is_none() {
            if let Some(var) = &key_env {
                warn!("{} is not set; requests to {} will be unauthenticated", var, config.provider);
            }
        }
        info!("Generation backend: {} ({}) at {}", model, config.provider, base_url);

        Ok(Self {
            http: http_client()?,
            base_url,
            model,
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> ModelResult<reqwest::Response> {
        let response = self
            .authorized(self.http.post(endpoint(&self.base_url, "chat/completions")))
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                stream,
            })
            .send()
            .await
            .map_err(|e| ModelError::unavailable(&self.model, e.to_string()))?;

        check_status(&self.model, response).await
    }

    /// Start a streaming completion.
    ///
    /// Resolves once the provider has accepted the request. Tokens then arrive
    /// through the returned stream as the provider emits them.
    pub async fn stream(&self, messages: &[ChatMessage]) -> ModelResult<TokenStream> {
        trace!("Streaming completion with {} messages", messages.len());
        let response = self.send(messages, true).await?;
        Ok(token_stream(
            self.model.clone(),
            Box::pin(response.bytes_stream()),
        ))
    }

    /// Run a completion and return the whole answer.
    pub async fn complete(&self, messages: &[ChatMessage]) -> ModelResult<String> {
        let response = self.send(messages, false).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ModelError::invalid_response(&self.model, e.to_string()))?;

        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::invalid_response(&self.model, "missing message content"))?;

        debug!("Completion returned {} chars", content.chars().count());
        Ok(content.to_string())
    }

    /// Check that the provider answers and accepts the key.
    pub async fn ping(&self) -> ModelResult<()> {
        let response = self
            .authorized(self.http.get(endpoint(&self.base_url, "models")))
            .send()
            .await
            .map_err(|e| ModelError::unavailable(&self.model, e.to_string()))?;
        check_status(&self.model, response).await?;
        Ok(())
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// SSE decoding
// ============================================================================

/// Incremental decoder for `text/event-stream` bodies.
///
/// Collects `data:` lines and yields one payload per event. Events end at a
/// blank line.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.line(line.trim_end_matches(['\n', '\r']), &mut events);
        }

        events
    }

    fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest);
            self.line(rest.trim_end_matches(['\n', '\r']), &mut events);
        }
        self.line("", &mut events);
        events
    }

    fn line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            if !self.data.is_empty() {
                events.push(self.data.join("\n"));
                self.data.clear();
            }
            return;
        }

        // Comments (":") and other fields (event, id, retry) carry nothing we use.
        if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
    }
}

#[derive(Debug, PartialEq)]
enum Delta {
    Token(String),
    Done,
    Skip,
}

fn parse_delta(model_id: &str, payload: &str) -> ModelResult<Delta> {
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(Delta::Done);
    }

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ModelError::invalid_response(model_id, format!("bad stream event: {}", e)))?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ModelError::generation_failed(model_id, message));
    }

    match value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        Some(text) if !text.is_empty() => Ok(Delta::Token(text.to_string())),
        _ => Ok(Delta::Skip),
    }
}

struct SseState<S> {
    model_id: String,
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    eof: bool,
    done: bool,
}

/// Turn an SSE byte stream into a stream of content tokens.
///
/// The stream ends at `[DONE]`, at end of body, or after the first error.
pub fn token_stream<S, B, E>(model_id: String, body: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = SseState {
        model_id,
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        eof: false,
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                return None;
            }

            if let Some(payload) = st.pending.pop_front() {
                match parse_delta(&st.model_id, &payload) {
                    Ok(Delta::Token(text)) => return Some((Ok(text), st)),
                    Ok(Delta::Skip) => continue,
                    Ok(Delta::Done) => {
                        st.done = true;
                        return None;
                    }
                    Err(e) => {
                        st.done = true;
                        return Some((Err(e), st));
                    }
                }
            }

            if st.eof {
                st.done = true;
                return None;
            }

            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let events = st.decoder.push(chunk.as_ref());
                    st.pending.extend(events);
                }
                Some(Err(e)) => {
                    st.done = true;
                    let err = ModelError::generation_failed(&st.model_id, e.to_string());
                    return Some((Err(err), st));
                }
                None => {
                    st.eof = true;
                    let events = st.decoder.finish();
                    st.pending.extend(events);
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn body(chunks: &[&str]) -> impl Stream<Item = Result<Vec<u8>, Infallible>> + Send + Unpin {
        let owned: Vec<Result<Vec<u8>, Infallible>> =
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        futures::stream::iter(owned)
    }

    async fn collect(stream: TokenStream) -> Vec<ModelResult<String>> {
        stream.collect().await
    }

    // ========================================================================
    // SseDecoder
    // ========================================================================

    #[test]
    fn test_decoder_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        let events = decoder.push(b":1}\n\ndata: [DONE]\n\n");
        assert_eq!(events, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn test_decoder_ignores_comments_and_crlf() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\r\n\r\nevent: message\r\ndata: x\r\n\r\n");
        assert_eq!(events, vec!["x".to_string()]);
    }

    #[test]
    fn test_decoder_finish_flushes_partial_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), vec!["tail".to_string()]);
    }

    // ========================================================================
    // parse_delta
    // ========================================================================

    #[test]
    fn test_parse_delta_variants() {
        let token = r#"{"choices":[{"delta":{"content":"Điều"}}]}"#;
        assert_eq!(parse_delta("m", token).unwrap(), Delta::Token("Điều".to_string()));

        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_delta("m", role_only).unwrap(), Delta::Skip);

        assert_eq!(parse_delta("m", "[DONE]").unwrap(), Delta::Done);
    }

    #[test]
    fn test_parse_delta_error_payload() {
        let err = parse_delta("m", r#"{"error":{"message":"rate limited"}}"#).unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    // ========================================================================
    // token_stream
    // ========================================================================

    #[tokio::test]
    async fn test_token_stream_yields_content_until_done() {
        let stream = token_stream(
            "m".to_string(),
            body(&[
                "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"Người lao động \"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"được nghỉ\"}}]}\n\n",
                "data: [DONE]\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
            ]),
        );

        let tokens: Vec<String> = collect(stream)
            .await
            .into_iter()
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(tokens, vec!["Người lao động ", "được nghỉ"]);
    }

    #[tokio::test]
    async fn test_token_stream_stops_after_error() {
        let stream = token_stream(
            "m".to_string(),
            body(&[
                "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
                "data: {\"error\":{\"message\":\"overloaded\"}}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
            ]),
        );

        let items = collect(stream).await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_token_stream_ends_without_done_marker() {
        let stream = token_stream(
            "m".to_string(),
            body(&["data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}"]),
        );
        let items = collect(stream).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), "x");
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_value(ChatMessage::system("hi")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hi");
    }
}
