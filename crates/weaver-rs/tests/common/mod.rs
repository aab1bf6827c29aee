//! Scripted agents shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use weaver_rs::prelude::*;

/// One recorded call: the outgoing message and the history it came with.
#[derive(Clone, Debug)]
pub struct Call {
    pub message: String,
    pub history: Vec<Message>,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Agent that answers from a fixed script, repeating the last reply once the
/// script runs out.
pub struct ScriptedAgent {
    name: String,
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    available: bool,
    calls: CallLog,
}

impl ScriptedAgent {
    pub fn new(name: &str, replies: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            last: Mutex::new(None),
            available: true,
            calls: Arc::default(),
        }
    }

    pub fn unavailable(name: &str) -> Self {
        Self {
            available: false,
            ..Self::new(name, &[])
        }
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> Provider {
        Provider::Local
    }

    fn context_limit(&self) -> usize {
        100_000
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn chat(
        &self,
        message: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        self.calls.lock().unwrap().push(Call {
            message: message.to_string(),
            history: history.to_vec(),
        });
        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                Ok(reply)
            }
            None => last
                .clone()
                .ok_or_else(|| AgentError::Request(format!("{} has no reply", self.name))),
        }
    }
}

/// Function-calling Junior that replays scripted responses and records each
/// transcript it was sent.
pub struct ToolScriptedJunior {
    responses: Mutex<VecDeque<ChatResponse>>,
    transcripts: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ToolScriptedJunior {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            transcripts: Arc::default(),
        }
    }

    pub fn transcripts(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        self.transcripts.clone()
    }
}

#[async_trait]
impl Agent for ToolScriptedJunior {
    fn name(&self) -> &str {
        "tool-junior"
    }

    fn provider(&self) -> Provider {
        Provider::Local
    }

    fn context_limit(&self) -> usize {
        32_768
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn chat(
        &self,
        _message: &str,
        _history: &[Message],
        _cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        Err(AgentError::Request("plain chat is not scripted".into()))
    }

    fn as_tool_agent(&self) -> Option<&dyn ToolAgent> {
        Some(self)
    }
}

#[async_trait]
impl ToolAgent for ToolScriptedJunior {
    fn tools_enabled(&self) -> bool {
        true
    }

    fn build_messages(&self, message: &str, history: &[Message]) -> Vec<Message> {
        let mut messages = vec![Message::system("You are Junior.")];
        messages.extend_from_slice(history);
        messages.push(Message::user(message));
        messages
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        _tools: &[ToolDef],
        _cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError> {
        self.transcripts.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Request("tool script exhausted".into()))
    }
}

pub fn orchestrator(
    config: WeaverConfig,
    senior: impl Agent + 'static,
    junior: impl Agent + 'static,
) -> DelegationOrchestrator {
    DelegationOrchestrator::new(
        config,
        Box::new(senior),
        Box::new(junior),
        Arc::new(SharedNotes::in_memory()),
    )
}

/// Config with tools off, for tests that only exercise plain chat.
pub fn plain_config() -> WeaverConfig {
    WeaverConfig::default().with_tools(false)
}
