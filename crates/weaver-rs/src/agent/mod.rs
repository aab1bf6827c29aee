//! Agent abstraction: the two conversational backends the orchestrator drives.
//!
//! - [`Agent`]: anything that can answer a message given a history. Senior and
//!   Junior are both agents.
//! - [`ToolAgent`]: the function-calling capability. Only agents that return
//!   `Some` from [`Agent::as_tool_agent`] get Junior's tool loop.
//! - [`JuniorClient`]: OpenAI-compatible chat completions over HTTP (Ollama,
//!   LM Studio, vLLM), with SSE streaming and inline tool-call recovery.
//! - [`ClaudeCli`]: Senior backed by the `claude` command-line tool.
//! - [`tuning`]: per-model generation settings.
//! - [`prompts`]: system prompts and inter-agent message templates.

pub mod junior;
pub mod prompts;
pub mod senior;
mod sse;
pub mod tuning;

pub use junior::{JuniorClient, JuniorConfig};
pub use senior::ClaudeCli;
pub use tuning::ModelTuning;

use std::fmt;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::{Message, ToolCall, ToolDef};

/// Incremental text from a streaming agent call.
pub type ChunkStream = BoxStream<'static, Result<String, AgentError>>;

/// Where an agent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    ClaudeCode,
    Local,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::ClaudeCode => write!(f, "claude_code"),
            Provider::Local => write!(f, "local"),
        }
    }
}

/// Which seat an agent occupies in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Senior,
    Junior,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRole::Senior => write!(f, "senior"),
            AgentRole::Junior => write!(f, "junior"),
        }
    }
}

/// Snapshot of one agent, as reported by `list_agents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub role: AgentRole,
    pub provider: Provider,
    pub name: String,
    pub available: bool,
}

/// One reply from a function-calling chat request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    /// `"stop"`, `"tool_calls"`, `"length"`, ... as reported by the server.
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The model ran out of output tokens.
    pub fn is_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

/// A conversational backend.
///
/// `history` is the conversation so far, not including `message`. Calls
/// must return [`AgentError::Cancelled`] promptly once `cancel` fires.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn provider(&self) -> Provider;

    /// Context window in tokens.
    fn context_limit(&self) -> usize;

    async fn is_available(&self) -> bool;

    async fn chat(
        &self,
        message: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String, AgentError>;

    /// Stream the reply. The default runs [`chat`](Agent::chat) and yields the
    /// whole reply as a single chunk.
    async fn chat_stream(
        &self,
        message: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<ChunkStream, AgentError> {
        let reply = self.chat(message, history, cancel).await?;
        Ok(stream::once(async move { Ok(reply) }).boxed())
    }

    /// Replace the system prompt. Agents without one ignore this.
    fn set_system_prompt(&mut self, _prompt: String) {}

    /// Function-calling capability, if this agent has it.
    fn as_tool_agent(&self) -> Option<&dyn ToolAgent> {
        None
    }
}

/// Function-calling capability of an [`Agent`].
#[async_trait]
pub trait ToolAgent: Send + Sync {
    /// Whether tool definitions should be sent at all.
    fn tools_enabled(&self) -> bool;

    /// Full request transcript: system prompt, `history`, then `message`.
    fn build_messages(&self, message: &str, history: &[Message]) -> Vec<Message>;

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Agent for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn provider(&self) -> Provider {
            Provider::Local
        }
        fn context_limit(&self) -> usize {
            1000
        }
        async fn is_available(&self) -> bool {
            true
        }
        async fn chat(
            &self,
            message: &str,
            _history: &[Message],
            _cancel: &CancellationToken,
        ) -> Result<String, AgentError> {
            Ok(format!("echo: {message}"))
        }
    }

    #[tokio::test]
    async fn default_stream_yields_whole_reply() {
        let agent = Echo;
        let chunks: Vec<_> = agent
            .chat_stream("hi", &[], &CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), "echo: hi");
        assert!(agent.as_tool_agent().is_none());
    }

    #[test]
    fn truncation_flag() {
        let resp = ChatResponse {
            finish_reason: Some("length".into()),
            ..Default::default()
        };
        assert!(resp.is_truncated());
        assert!(!resp.has_tool_calls());
        assert!(!ChatResponse::default().is_truncated());
    }

    #[test]
    fn labels() {
        assert_eq!(Provider::ClaudeCode.to_string(), "claude_code");
        assert_eq!(AgentRole::Junior.to_string(), "junior");
    }
}
