//! The delegation engine.
//!
//! [`DelegationOrchestrator`] drives one conversation between a Senior and a
//! Junior agent. Every user message goes to Senior first. When Senior's reply
//! contains a `/local <task>` directive, the task goes to Junior (through the
//! tool loop when Junior supports function calling), Junior's answer is sent
//! back to Senior for review, and the review is scanned for another
//! directive. The loop is bounded by `max_delegations`.
//!
//! A turn produces either one string ([`chat`](DelegationOrchestrator::chat))
//! or a sequence of attributed [`OutputChunk`]s
//! ([`chat_stream`](DelegationOrchestrator::chat_stream),
//! [`spawn_chat_stream`]).
//!
//! Senior failing on the first call of a turn is the only hard error. Later
//! failures end the delegation loop and keep the output produced so far.

mod stream;

pub use stream::{OutputChunk, STREAM_CAPACITY, Speaker, assemble_turns, spawn_chat_stream};

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Message;
use crate::agent::prompts::{junior_task, review_prompt, with_digest};
use crate::agent::{
    Agent, AgentRole, AgentStatus, ClaudeCli, JuniorClient, JuniorConfig, ToolAgent,
};
use crate::config::WeaverConfig;
use crate::context::{ContextConfig, ContextManager};
use crate::error::{AgentError, Result, WeaverError};
use crate::notes::SharedNotes;
use crate::parser::extract_delegation;
use crate::tools::ToolSet;

/// Notes included in the digest sent to Senior.
const SENIOR_DIGEST_NOTES: usize = 10;
/// Notes included in the digest sent to Junior.
const JUNIOR_DIGEST_NOTES: usize = 5;

const JUNIOR_HEADER: &str = "\n\n---\n**Junior:**\n";
const REVIEW_HEADER: &str = "\n\n---\n**Senior (review):**\n";
const TURN_CANCELLED: &str = "[Turn cancelled]";

/// Largest tool result quoted in the tool log handed to Senior.
const TOOL_LOG_RESULT_CHARS: usize = 500;

// ── Turn output ─────────────────────────────────────────────────────

/// Where the delegation loop writes: one accumulated string or a chunk
/// channel.
enum TurnOutput<'a> {
    Text(String),
    Chunks(&'a mpsc::Sender<OutputChunk>),
}

impl TurnOutput<'_> {
    /// `false` once a streaming consumer has gone away.
    async fn emit(&mut self, speaker: Speaker, header: &str, text: &str) -> bool {
        match self {
            TurnOutput::Text(out) => {
                out.push_str(header);
                out.push_str(text);
                true
            }
            TurnOutput::Chunks(tx) => {
                tx.send(OutputChunk::text(speaker, text)).await.is_ok()
                    && tx.send(OutputChunk::done(speaker)).await.is_ok()
            }
        }
    }

    async fn junior(&mut self, text: &str) -> bool {
        self.emit(Speaker::Junior, JUNIOR_HEADER, text).await
    }

    async fn review(&mut self, text: &str) -> bool {
        self.emit(Speaker::Senior, REVIEW_HEADER, text).await
    }

    async fn notice(&mut self, text: &str) -> bool {
        self.emit(Speaker::System, "\n\n", text).await
    }
}

// ── Orchestrator ────────────────────────────────────────────────────

/// Coordinates one Senior/Junior conversation.
///
/// One instance holds one conversation; turns must not overlap. Wrap it in
/// an `Arc<tokio::sync::Mutex<_>>` to stream turns from a background task.
pub struct DelegationOrchestrator {
    config: WeaverConfig,
    senior: Box<dyn Agent>,
    junior: Box<dyn Agent>,
    senior_ctx: ContextManager,
    junior_ctx: ContextManager,
    notes: Arc<SharedNotes>,
    tools: Option<ToolSet>,
    current_agent: Option<AgentRole>,
}

impl DelegationOrchestrator {
    /// Assemble an orchestrator from ready-made agents. Junior's tool set is
    /// built only when `config.enable_tools` is set.
    pub fn new(
        config: WeaverConfig,
        senior: Box<dyn Agent>,
        junior: Box<dyn Agent>,
        notes: Arc<SharedNotes>,
    ) -> Self {
        let tools = config
            .enable_tools
            .then(|| config.build_tool_set(notes.clone()));
        Self {
            senior_ctx: ContextManager::new(ContextConfig::senior_with_limit(
                config.senior_context_limit,
            )),
            junior_ctx: ContextManager::new(ContextConfig::local(config.junior_context_limit)),
            config,
            senior,
            junior,
            notes,
            tools,
            current_agent: None,
        }
    }

    /// Build the `claude` CLI Senior, the HTTP Junior and the notes store
    /// described by `config`.
    pub fn from_config(config: WeaverConfig) -> Result<Self> {
        let notes = match config.notes_path.clone().or_else(SharedNotes::default_path) {
            Some(path) => SharedNotes::open(path),
            None => {
                warn!("No home directory; shared notes will not be persisted");
                SharedNotes::in_memory()
            }
        };

        let senior = ClaudeCli::new(config.senior_prompt.clone())
            .with_bin(config.senior_bin.clone())
            .with_timeout(config.senior_timeout)
            .with_context_limit(config.senior_context_limit);
        let junior = JuniorClient::new(Self::junior_client_config(&config))
            .map_err(|e| WeaverError::Config(e.to_string()))?;

        info!(
            junior_url = %config.junior_url,
            junior_model = %config.junior_model,
            tools = config.enable_tools,
            "Weaver initialized"
        );
        Ok(Self::new(
            config,
            Box::new(senior),
            Box::new(junior),
            Arc::new(notes),
        ))
    }

    fn junior_client_config(config: &WeaverConfig) -> JuniorConfig {
        let junior = config.junior_config().with_tools(config.enable_tools);
        match &config.junior_prompt {
            Some(prompt) => junior.with_system_prompt(prompt.clone()),
            None => junior,
        }
    }

    // ── Turns ───────────────────────────────────────────────────────

    /// Run one user turn and return the combined output: Senior's reply,
    /// then each Junior answer and Senior review under their own headers.
    pub async fn chat(&mut self, message: &str, cancel: &CancellationToken) -> Result<String> {
        self.compact_senior(cancel).await;

        let outgoing = with_digest(&self.notes.format_for_prompt(SENIOR_DIGEST_NOTES), message);
        let history = self.senior_ctx.messages().to_vec();
        let response = self
            .senior
            .chat(&outgoing, &history, cancel)
            .await
            .map_err(WeaverError::Senior)?;
        self.record_senior(message, &response);

        let mut out = TurnOutput::Text(response.clone());
        self.delegation_loop(response, cancel, &mut out).await;
        match out {
            TurnOutput::Text(text) => Ok(text),
            TurnOutput::Chunks(_) => Ok(String::new()),
        }
    }

    /// Run one user turn, sending attributed chunks to `tx` as they are
    /// produced. Senior's first reply is forwarded incrementally; Junior
    /// answers and reviews arrive as one chunk each. Every speaker change is
    /// preceded by a `done` marker.
    pub async fn chat_stream(
        &mut self,
        message: &str,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<OutputChunk>,
    ) -> Result<()> {
        self.compact_senior(cancel).await;

        let outgoing = with_digest(&self.notes.format_for_prompt(SENIOR_DIGEST_NOTES), message);
        let history = self.senior_ctx.messages().to_vec();
        let mut chunks = self
            .senior
            .chat_stream(&outgoing, &history, cancel)
            .await
            .map_err(WeaverError::Senior)?;

        let mut response = String::new();
        while let Some(item) = chunks.next().await {
            let text = item.map_err(WeaverError::Senior)?;
            response.push_str(&text);
            if tx.send(OutputChunk::text(Speaker::Senior, text)).await.is_err() {
                debug!("Stream consumer went away during Senior reply");
                return Ok(());
            }
        }
        self.record_senior(message, &response);
        if tx.send(OutputChunk::done(Speaker::Senior)).await.is_err() {
            return Ok(());
        }

        let mut out = TurnOutput::Chunks(tx);
        self.delegation_loop(response, cancel, &mut out).await;
        Ok(())
    }

    fn record_senior(&mut self, message: &str, response: &str) {
        self.senior_ctx.add(Message::user(message));
        self.senior_ctx.add(Message::assistant_text(response));
        self.current_agent = Some(AgentRole::Senior);
    }

    /// Follow directives in `response` until none remain, the cap is hit, or
    /// something fails.
    async fn delegation_loop(
        &mut self,
        mut response: String,
        cancel: &CancellationToken,
        out: &mut TurnOutput<'_>,
    ) {
        let max = self.config.max_delegations;
        let mut rounds = 0;

        while let Some(task) = extract_delegation(&response) {
            if rounds == max {
                debug!(max, "Delegation cap reached; ignoring further directives");
                return;
            }
            rounds += 1;
            if cancel.is_cancelled() {
                out.notice(TURN_CANCELLED).await;
                return;
            }
            info!(round = rounds, task_len = task.len(), "Senior delegated to Junior");

            let junior_reply = match self.delegate_to_junior(&task, cancel).await {
                Ok(reply) => reply,
                Err(e) if e.is_cancelled() => {
                    out.notice(TURN_CANCELLED).await;
                    return;
                }
                Err(e) => {
                    warn!("Junior delegation failed: {e}");
                    out.notice(&format!("[Junior unavailable: {e}]")).await;
                    return;
                }
            };
            if !out.junior(&junior_reply).await {
                return;
            }

            response = match self.senior_review(&junior_reply, cancel).await {
                Ok(review) => review,
                Err(e) if e.is_cancelled() => {
                    out.notice(TURN_CANCELLED).await;
                    return;
                }
                Err(e) => {
                    warn!("Senior review failed: {e}");
                    return;
                }
            };
            if !out.review(&response).await {
                return;
            }
        }
    }

    /// Hand `task` to Junior and return its answer. Only the raw task and
    /// the answer are recorded in Junior's history.
    async fn delegate_to_junior(
        &mut self,
        task: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, AgentError> {
        self.ensure_junior_available(cancel).await?;
        self.prepare_junior_context(cancel).await;

        let outgoing = junior_task(task, &self.notes.format_for_prompt(JUNIOR_DIGEST_NOTES));
        let history = self.junior_ctx.messages().to_vec();

        let tool_agent = self.junior.as_tool_agent().filter(|t| t.tools_enabled());
        let reply = match (tool_agent, &self.tools) {
            (Some(agent), Some(tools)) => {
                run_tool_loop(
                    agent,
                    tools,
                    self.config.max_tool_rounds,
                    &outgoing,
                    &history,
                    cancel,
                )
                .await?
            }
            _ => self.junior.chat(&outgoing, &history, cancel).await?,
        };

        self.junior_ctx.add(Message::user(task));
        self.junior_ctx.add(Message::assistant_text(&reply));
        self.current_agent = Some(AgentRole::Junior);
        Ok(reply)
    }

    async fn ensure_junior_available(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), AgentError> {
        let available = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            available = self.junior.is_available() => available,
        };
        if available {
            Ok(())
        } else {
            Err(AgentError::Unavailable("junior model not available".into()))
        }
    }

    async fn senior_review(
        &mut self,
        junior_reply: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, AgentError> {
        let prompt = review_prompt(junior_reply);
        let history = self.senior_ctx.messages().to_vec();
        let review = self.senior.chat(&prompt, &history, cancel).await?;
        self.senior_ctx.add(Message::user(prompt));
        self.senior_ctx.add(Message::assistant_text(&review));
        self.current_agent = Some(AgentRole::Senior);
        Ok(review)
    }

    // ── Context policies ────────────────────────────────────────────

    async fn compact_senior(&mut self, cancel: &CancellationToken) {
        if !self.senior_ctx.should_compact() {
            return;
        }
        let before = self.senior_ctx.estimated_tokens();
        let history = self.senior_ctx.messages().to_vec();
        let prompt = self.senior_ctx.compaction_prompt();
        match self.senior.chat(prompt, &history, cancel).await {
            Ok(summary) => {
                self.senior_ctx.reset_with_summary(&summary);
                info!(
                    before,
                    after = self.senior_ctx.estimated_tokens(),
                    "Compacted Senior context"
                );
            }
            Err(e) => warn!("Senior context compaction failed: {e}"),
        }
    }

    /// Truncate small Junior windows, compact large ones.
    async fn prepare_junior_context(&mut self, cancel: &CancellationToken) {
        if self.junior_ctx.should_truncate() {
            let before = self.junior_ctx.len();
            self.junior_ctx.truncate();
            info!(
                dropped = before - self.junior_ctx.len(),
                "Truncated Junior context"
            );
        } else if self.junior_ctx.should_compact() {
            let history = self.junior_ctx.messages().to_vec();
            let prompt = self.junior_ctx.compaction_prompt();
            match self.junior.chat(prompt, &history, cancel).await {
                Ok(summary) => {
                    self.junior_ctx.reset_with_summary(&summary);
                    info!("Compacted Junior context");
                }
                Err(e) => warn!("Junior context compaction failed: {e}"),
            }
        }
    }

    // ── Administration ──────────────────────────────────────────────

    pub fn clear_context(&mut self) {
        self.senior_ctx.clear();
        self.junior_ctx.clear();
    }

    pub fn clear_senior(&mut self) {
        self.senior_ctx.clear();
    }

    pub fn clear_junior(&mut self) {
        self.junior_ctx.clear();
    }

    /// Talk to Junior without going through Senior. The notes digest and
    /// Junior's context policies still apply; tools are not offered.
    pub async fn chat_junior_direct(
        &mut self,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.ensure_junior_available(cancel)
            .await
            .map_err(WeaverError::Junior)?;
        self.prepare_junior_context(cancel).await;

        let outgoing = with_digest(&self.notes.format_for_prompt(JUNIOR_DIGEST_NOTES), message);
        let history = self.junior_ctx.messages().to_vec();
        let reply = self
            .junior
            .chat(&outgoing, &history, cancel)
            .await
            .map_err(WeaverError::Junior)?;

        self.junior_ctx.add(Message::user(message));
        self.junior_ctx.add(Message::assistant_text(&reply));
        self.current_agent = Some(AgentRole::Junior);
        Ok(reply)
    }

    /// Switch Junior to another model or server. The client is rebuilt with
    /// that model's tuning and prompt (unless a prompt override is
    /// configured), and Junior's context is resized, keeping its history.
    pub fn update_junior_model(
        &mut self,
        url: impl Into<String>,
        model: impl Into<String>,
        context_limit: usize,
    ) -> Result<()> {
        self.config.junior_url = url.into();
        self.config.junior_model = model.into();
        self.config.junior_context_limit = context_limit;

        let client = JuniorClient::new(Self::junior_client_config(&self.config))
            .map_err(|e| WeaverError::Config(e.to_string()))?;
        self.junior = Box::new(client);
        self.junior_ctx
            .reconfigure(ContextConfig::local(context_limit));
        info!(
            model = %self.config.junior_model,
            url = %self.config.junior_url,
            context_limit,
            "Junior model updated"
        );
        Ok(())
    }

    /// Replace Junior's system prompt, keeping it across model switches.
    pub fn update_junior_prompt(&mut self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.config.junior_prompt = Some(prompt.clone());
        self.junior.set_system_prompt(prompt);
    }

    pub async fn list_agents(&self) -> Vec<AgentStatus> {
        let (senior_available, junior_available) =
            tokio::join!(self.senior.is_available(), self.junior.is_available());
        vec![
            AgentStatus {
                role: AgentRole::Senior,
                provider: self.senior.provider(),
                name: self.senior.name().to_string(),
                available: senior_available,
            },
            AgentStatus {
                role: AgentRole::Junior,
                provider: self.junior.provider(),
                name: self.junior.name().to_string(),
                available: junior_available,
            },
        ]
    }

    /// Agent that produced the most recent reply.
    pub fn current_agent(&self) -> Option<AgentRole> {
        self.current_agent
    }

    pub fn notes(&self) -> &Arc<SharedNotes> {
        &self.notes
    }

    /// Junior gets the tool loop on delegation.
    pub fn tools_enabled(&self) -> bool {
        self.tools.is_some()
            && self
                .junior
                .as_tool_agent()
                .is_some_and(|t| t.tools_enabled())
    }

    pub fn config(&self) -> &WeaverConfig {
        &self.config
    }

    pub fn senior_context(&self) -> &ContextManager {
        &self.senior_ctx
    }

    pub fn junior_context(&self) -> &ContextManager {
        &self.junior_ctx
    }

    pub fn junior_name(&self) -> &str {
        self.junior.name()
    }
}

// ── Tool loop ───────────────────────────────────────────────────────

/// Let Junior work through up to `max_rounds` rounds of tool calls.
///
/// Each round's text is accumulated. Tool calls are replayed to Junior as an
/// assistant message followed by one tool-result message per call, in call
/// order. If Junior never says anything, a log of the tool calls stands in
/// for its answer so Senior has something to review.
async fn run_tool_loop(
    agent: &dyn ToolAgent,
    tools: &ToolSet,
    max_rounds: usize,
    task: &str,
    history: &[Message],
    cancel: &CancellationToken,
) -> std::result::Result<String, AgentError> {
    let definitions = tools.definitions();
    let mut messages = agent.build_messages(task, history);
    let mut reply = String::new();
    let mut tool_log = String::new();

    for round in 1..=max_rounds {
        let resp = agent.chat_with_tools(&messages, &definitions, cancel).await?;
        let content = resp.content.trim();
        if !content.is_empty() {
            if !reply.is_empty() {
                reply.push_str("\n\n");
            }
            reply.push_str(content);
        }
        if resp.tool_calls.is_empty() {
            break;
        }
        debug!(round, calls = resp.tool_calls.len(), "Junior requested tools");

        messages.push(Message::assistant_tool_calls(
            resp.content.clone(),
            resp.tool_calls.clone(),
        ));
        for call in &resp.tool_calls {
            let result = tools
                .execute(&call.function.name, &call.function.arguments, cancel)
                .await;
            tool_log.push_str(&format!(
                "\n[TOOL CALL] {}\nArguments: {}\nResult: {}\n",
                call.function.name,
                call.function.arguments,
                clip_chars(&result, TOOL_LOG_RESULT_CHARS)
            ));
            messages.push(Message::tool_result(call.id.clone(), result));
        }
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        if round == max_rounds {
            debug!(max_rounds, "Tool round cap reached");
        }
    }

    if reply.is_empty() && !tool_log.is_empty() {
        reply = format!("--- TOOL EXECUTION LOG ---{tool_log}--- END TOOL LOG ---");
    }
    Ok(reply)
}

fn clip_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}... (truncated)", s.get(..cut).unwrap_or(s)),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ChatResponse, Provider};
    use crate::{ToolCall, ToolDef};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Agent answering from a script and recording what it was sent.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<String>>,
        seen: Arc<Mutex<Vec<(String, usize)>>>,
        available: bool,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                seen: Arc::default(),
                available: true,
            }
        }
    }

    #[async_trait]
    impl Agent for Scripted {
        fn name(&self) -> &str {
            "scripted"
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
            _cancel: &CancellationToken,
        ) -> std::result::Result<String, AgentError> {
            self.seen
                .lock()
                .unwrap()
                .push((message.to_string(), history.len()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Request("script exhausted".into()))
        }
    }

    /// Tool-capable Junior returning scripted responses.
    struct ToolScripted {
        responses: Mutex<VecDeque<ChatResponse>>,
        transcripts: Arc<Mutex<Vec<Vec<Message>>>>,
    }

    #[async_trait]
    impl Agent for ToolScripted {
        fn name(&self) -> &str {
            "tool-scripted"
        }
        fn provider(&self) -> Provider {
            Provider::Local
        }
        fn context_limit(&self) -> usize {
            100_000
        }
        async fn is_available(&self) -> bool {
            true
        }
        async fn chat(
            &self,
            _message: &str,
            _history: &[Message],
            _cancel: &CancellationToken,
        ) -> std::result::Result<String, AgentError> {
            Err(AgentError::Request("plain chat not scripted".into()))
        }
        fn as_tool_agent(&self) -> Option<&dyn ToolAgent> {
            Some(self)
        }
    }

    #[async_trait]
    impl ToolAgent for ToolScripted {
        fn tools_enabled(&self) -> bool {
            true
        }
        fn build_messages(&self, message: &str, history: &[Message]) -> Vec<Message> {
            let mut messages = history.to_vec();
            messages.push(Message::user(message));
            messages
        }
        async fn chat_with_tools(
            &self,
            messages: &[Message],
            _tools: &[ToolDef],
            _cancel: &CancellationToken,
        ) -> std::result::Result<ChatResponse, AgentError> {
            self.transcripts.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Request("script exhausted".into()))
        }
    }

    fn orchestrator(
        config: WeaverConfig,
        senior: Scripted,
        junior: impl Agent + 'static,
    ) -> DelegationOrchestrator {
        DelegationOrchestrator::new(
            config,
            Box::new(senior),
            Box::new(junior),
            Arc::new(SharedNotes::in_memory()),
        )
    }

    #[tokio::test]
    async fn no_directive_returns_senior_reply() {
        let mut weaver = orchestrator(
            WeaverConfig::default().with_tools(false),
            Scripted::new(&["Just an answer"]),
            Scripted::new(&[]),
        );
        let out = weaver.chat("hi", &CancellationToken::new()).await.unwrap();
        assert_eq!(out, "Just an answer");
        assert_eq!(weaver.senior_context().len(), 2);
        assert_eq!(weaver.current_agent(), Some(AgentRole::Senior));
    }

    #[tokio::test]
    async fn review_loop_concatenates_sections() {
        let senior = Scripted::new(&["On it. /local write f", "Looks good."]);
        let senior_seen = senior.seen.clone();
        let junior = Scripted::new(&["def f(): pass"]);
        let junior_seen = junior.seen.clone();
        let mut weaver = orchestrator(WeaverConfig::default().with_tools(false), senior, junior);

        let out = weaver.chat("make f", &CancellationToken::new()).await.unwrap();
        assert_eq!(
            out,
            "On it. /local write f\n\n---\n**Junior:**\ndef f(): pass\n\n---\n**Senior (review):**\nLooks good."
        );

        let junior_seen = junior_seen.lock().unwrap();
        assert_eq!(junior_seen.len(), 1);
        assert_eq!(junior_seen[0].0, "Task from Senior Engineer: write f");

        let senior_seen = senior_seen.lock().unwrap();
        assert!(senior_seen[1].0.contains("## Junior's Response:\ndef f(): pass"));
        assert_eq!(senior_seen[1].1, 2);
        assert_eq!(weaver.junior_context().messages()[0].text(), "write f");
    }

    #[tokio::test]
    async fn senior_failure_is_hard_error() {
        let mut weaver = orchestrator(
            WeaverConfig::default().with_tools(false),
            Scripted::new(&[]),
            Scripted::new(&[]),
        );
        let err = weaver.chat("hi", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, WeaverError::Senior(_)));
        assert!(weaver.senior_context().is_empty());
    }

    #[tokio::test]
    async fn failed_review_keeps_junior_output() {
        let mut weaver = orchestrator(
            WeaverConfig::default().with_tools(false),
            Scripted::new(&["/local do it"]),
            Scripted::new(&["done"]),
        );
        let out = weaver.chat("go", &CancellationToken::new()).await.unwrap();
        assert_eq!(out, "/local do it\n\n---\n**Junior:**\ndone");
    }

    #[tokio::test]
    async fn cancelled_turn_is_labelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut weaver = orchestrator(
            WeaverConfig::default().with_tools(false),
            Scripted::new(&["/local x"]),
            Scripted::new(&["never"]),
        );
        let out = weaver.chat("go", &cancel).await.unwrap();
        assert_eq!(out, "/local x\n\n[Turn cancelled]");
    }

    #[tokio::test]
    async fn tool_loop_orders_results_after_calls() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = Arc::new(Mutex::new(Vec::new()));
        let junior = ToolScripted {
            responses: Mutex::new(VecDeque::from([
                ChatResponse {
                    content: String::new(),
                    tool_calls: vec![
                        ToolCall::new("a", "write_file", r#"{"path":"out.txt","content":"hi"}"#),
                        ToolCall::new("b", "read_file", r#"{"path":"out.txt"}"#),
                    ],
                    finish_reason: Some("tool_calls".into()),
                },
                ChatResponse {
                    content: "Wrote out.txt".into(),
                    ..Default::default()
                },
            ])),
            transcripts: transcripts.clone(),
        };
        let mut weaver = orchestrator(
            WeaverConfig::default().with_workspace_root(dir.path()),
            Scripted::new(&["/local write it", "ok"]),
            junior,
        );
        assert!(weaver.tools_enabled());

        let out = weaver.chat("go", &CancellationToken::new()).await.unwrap();
        assert!(out.contains("**Junior:**\nWrote out.txt"));
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hi");

        let transcripts = transcripts.lock().unwrap();
        let second = &transcripts[1];
        let n = second.len();
        assert_eq!(second[n - 3].tool_calls.as_ref().unwrap().len(), 2);
        assert_eq!(second[n - 2].tool_call_id.as_deref(), Some("a"));
        assert_eq!(second[n - 2].text(), "Successfully wrote 2 bytes to out.txt");
        assert_eq!(second[n - 1].tool_call_id.as_deref(), Some("b"));
        assert_eq!(second[n - 1].text(), "hi");
    }

    #[tokio::test]
    async fn silent_tool_use_yields_tool_log() {
        let dir = tempfile::tempdir().unwrap();
        let junior = ToolScripted {
            responses: Mutex::new(VecDeque::from([
                ChatResponse {
                    tool_calls: vec![ToolCall::new("a", "list_directory", "{}")],
                    ..Default::default()
                },
                ChatResponse::default(),
            ])),
            transcripts: Arc::default(),
        };
        let mut weaver = orchestrator(
            WeaverConfig::default().with_workspace_root(dir.path()),
            Scripted::new(&["/local look", "ok"]),
            junior,
        );
        let out = weaver.chat("go", &CancellationToken::new()).await.unwrap();
        assert!(out.contains("--- TOOL EXECUTION LOG ---\n[TOOL CALL] list_directory\n"));
    }

    #[tokio::test]
    async fn update_junior_model_resizes_context() {
        let mut weaver = orchestrator(
            WeaverConfig::default().with_tools(false),
            Scripted::new(&[]),
            Scripted::new(&[]),
        );
        weaver
            .update_junior_model("http://localhost:1234/v1", "devstral-small", 16_000)
            .unwrap();
        assert_eq!(weaver.junior_name(), "devstral-small");
        assert_eq!(weaver.junior_context().config().max_tokens, 16_000);
        assert_eq!(weaver.config().junior_url, "http://localhost:1234/v1");
    }

    #[test]
    fn clip_chars_marks_truncation() {
        assert_eq!(clip_chars("abc", 5), "abc");
        assert_eq!(clip_chars("abcdef", 3), "abc... (truncated)");
    }
}
