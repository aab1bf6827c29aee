//! Junior backed by an OpenAI-compatible chat completions server.
//!
//! Works against Ollama, LM Studio, vLLM and anything else that serves
//! `POST {base}/chat/completions` and `GET {base}/models`. Replies in the
//! inline `[TOOL_CALLS]name[ARGS]{...}` format some local models fall back
//! to are converted into structured tool calls before the orchestrator sees
//! them.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::prompts::junior_prompt_for_model;
use super::sse::{SseDecoder, SseEvent};
use super::tuning::ModelTuning;
use super::{Agent, ChatResponse, ChunkStream, Provider, ToolAgent};
use crate::error::AgentError;
use crate::parser::{
    code_from_tool_calls, extract_code, is_inline_tool_call_format, normalize_tool_calls,
};
use crate::{Message, ToolCall, ToolDef};

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection and generation settings for a [`JuniorClient`].
#[derive(Debug, Clone)]
pub struct JuniorConfig {
    /// Base URL including the API prefix, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    pub model: String,
    pub context_limit: usize,
    pub system_prompt: String,
    pub tuning: ModelTuning,
    /// Send tool definitions with `chat_with_tools`.
    pub tools_enabled: bool,
}

impl JuniorConfig {
    /// Settings for `model` with its tuning and prompt from the built-in
    /// tables.
    pub fn for_model(
        base_url: impl Into<String>,
        model: impl Into<String>,
        context_limit: usize,
    ) -> Self {
        let model = model.into();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            system_prompt: junior_prompt_for_model(&model).to_string(),
            tuning: ModelTuning::for_model(&model),
            model,
            context_limit,
            tools_enabled: true,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolDef],
}

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: CompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

// ── Client ──────────────────────────────────────────────────────────

/// HTTP client for one Junior model.
pub struct JuniorClient {
    client: reqwest::Client,
    config: JuniorConfig,
}

impl JuniorClient {
    pub fn new(config: JuniorConfig) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(config.tuning.timeout)
            .build()
            .map_err(|e| AgentError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &JuniorConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn system_prompt(&self) -> &str {
        &self.config.system_prompt
    }

    fn request<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolDef],
        stream: bool,
    ) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.tuning.max_tokens,
            temperature: self.config.tuning.temperature,
            stream,
            tools,
        }
    }

    /// POST a completion request, racing it against `cancel`. Non-2xx
    /// responses become [`AgentError::Api`].
    async fn send(
        &self,
        body: &CompletionRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, AgentError> {
        debug!(
            "Junior request: model={}, messages={}, tools={}, max_tokens={}, temp={}, stream={}",
            body.model,
            body.messages.len(),
            body.tools.len(),
            body.max_tokens,
            body.temperature,
            body.stream,
        );

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .json(body);
        if body.stream {
            req = req.header("Accept", "text/event-stream");
        }

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            resp = req.send() => resp?,
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(resp)
    }

    /// One non-streaming completion, returned as the server sent it.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError> {
        let start = Instant::now();
        let body = self.request(messages, tools, false);
        let resp = self.send(&body, cancel).await?;

        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            text = resp.text() => text?,
        };
        debug!(
            "Junior response in {:.1}s ({} bytes)",
            start.elapsed().as_secs_f64(),
            text.len()
        );
        trace!("Junior raw response: {text}");

        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| AgentError::Malformed(format!("failed to parse response: {e}")))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Malformed("no choices in response".into()))?;

        let mut tool_calls = choice.message.tool_calls.unwrap_or_default();
        for (i, call) in tool_calls.iter_mut().enumerate() {
            if call.id.is_empty() {
                call.id = format!("call-{i}");
            }
        }

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl Agent for JuniorClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn provider(&self) -> Provider {
        Provider::Local
    }

    fn context_limit(&self) -> usize {
        self.config.context_limit
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.config.base_url);
        match self
            .client
            .get(&url)
            .timeout(AVAILABILITY_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                debug!("Junior availability check failed: {e}");
                false
            }
        }
    }

    /// Plain chat without tools. An inline tool call in the reply is
    /// reduced to the code it carries, and a reply that only consists of
    /// structured tool calls yields their `content` argument.
    async fn chat(
        &self,
        message: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let messages = self.build_messages(message, history);
        let resp = self.complete(&messages, &[], cancel).await?;
        if resp.is_truncated() {
            warn!("Junior reply hit max_tokens ({})", self.config.tuning.max_tokens);
        }

        if is_inline_tool_call_format(&resp.content) {
            return Ok(extract_code(&resp.content));
        }
        if resp.content.trim().is_empty()
            && let Some(code) = code_from_tool_calls(&resp.tool_calls)
        {
            return Ok(code);
        }
        Ok(resp.content)
    }

    async fn chat_stream(
        &self,
        message: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<ChunkStream, AgentError> {
        let messages = self.build_messages(message, history);
        let body = self.request(&messages, &[], true);
        let resp = self.send(&body, cancel).await?;

        let state = StreamState {
            resp,
            decoder: SseDecoder::new(),
            cancel: cancel.clone(),
            eof: false,
            stopped: false,
        };
        Ok(stream::unfold(state, next_text).boxed())
    }

    fn set_system_prompt(&mut self, prompt: String) {
        self.config.system_prompt = prompt;
    }

    fn as_tool_agent(&self) -> Option<&dyn ToolAgent> {
        Some(self)
    }
}

#[async_trait]
impl ToolAgent for JuniorClient {
    fn tools_enabled(&self) -> bool {
        self.config.tools_enabled
    }

    fn build_messages(&self, message: &str, history: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if !self.config.system_prompt.is_empty() {
            messages.push(Message::system(&self.config.system_prompt));
        }
        messages.extend_from_slice(history);
        messages.push(Message::user(message));
        messages
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError> {
        let tools = if self.config.tools_enabled { tools } else { &[] };
        let resp = self.complete(messages, tools, cancel).await?;
        if resp.is_truncated() {
            warn!(
                "Junior reply hit max_tokens ({}); tool arguments may be cut off",
                self.config.tuning.max_tokens
            );
        }

        let had_structured = resp.has_tool_calls();
        let (content, tool_calls) = normalize_tool_calls(&resp.content, resp.tool_calls);
        if !had_structured && !tool_calls.is_empty() {
            debug!("Recovered {} inline tool call(s) from Junior", tool_calls.len());
        }
        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason: resp.finish_reason,
        })
    }
}

// ── Streaming ───────────────────────────────────────────────────────

struct StreamState {
    resp: reqwest::Response,
    decoder: SseDecoder,
    cancel: CancellationToken,
    eof: bool,
    stopped: bool,
}

/// Next text delta from the SSE body, reading more chunks as needed.
async fn next_text(mut st: StreamState) -> Option<(Result<String, AgentError>, StreamState)> {
    if st.stopped {
        return None;
    }
    loop {
        while let Some(event) = st.decoder.next_event() {
            if let SseEvent::Text(text) = event {
                return Some((Ok(text), st));
            }
        }
        if st.eof || st.decoder.is_done() {
            return None;
        }

        let next = tokio::select! {
            biased;
            _ = st.cancel.cancelled() => None,
            chunk = st.resp.chunk() => Some(chunk),
        };
        match next {
            None => {
                st.stopped = true;
                return Some((Err(AgentError::Cancelled), st));
            }
            Some(Ok(Some(bytes))) => st.decoder.push(&bytes),
            Some(Ok(None)) => {
                st.decoder.finish();
                st.eof = true;
            }
            Some(Err(e)) => {
                st.stopped = true;
                return Some((Err(e.into()), st));
            }
        }
    }
}
