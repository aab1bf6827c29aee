//! Convenience re-exports for common `weaver-rs` types.
//!
//! Meant to be glob-imported by programs that drive a conversation:
//!
//! ```ignore
//! use weaver_rs::prelude::*;
//! ```
//!
//! Parser helpers, process plumbing and the individual tool types stay in
//! their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{Message, MessageRole, ToolCall, ToolDef, json_schema_for};

// ── Agents ──────────────────────────────────────────────────────────
pub use crate::agent::{
    Agent, AgentRole, AgentStatus, ChatResponse, ChunkStream, ClaudeCli, JuniorClient,
    JuniorConfig, ModelTuning, Provider, ToolAgent,
};

// ── Orchestration ───────────────────────────────────────────────────
pub use crate::config::WeaverConfig;
pub use crate::error::{AgentError, WeaverError};
pub use crate::orchestrator::{
    DelegationOrchestrator, OutputChunk, Speaker, assemble_turns, spawn_chat_stream,
};

// ── Context & notes ─────────────────────────────────────────────────
pub use crate::context::{ContextConfig, ContextManager};
pub use crate::notes::{Note, NoteAuthor, SharedNotes};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{Sandbox, Tool, ToolFuture, ToolSet, parse_tool_args};

pub use tokio_util::sync::CancellationToken;
