//! Senior/Junior delegation engine for pairing a strong agent with a local model.
//!
//! `weaver-rs` routes every user message to a high-capability **Senior** agent.
//! Senior can hand a well-defined sub-task to a resource-constrained **Junior**
//! agent (usually a local model behind an OpenAI-compatible server) by writing
//! a `/local <task>` directive. Junior's answer, optionally produced through
//! several rounds of sandboxed tool calls, is sent back to Senior for review
//! before anything reaches the user. The core abstraction is the
//! [`DelegationOrchestrator`](orchestrator::DelegationOrchestrator).
//!
//! # Getting started
//!
//! ```ignore
//! use weaver_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WeaverError> {
//!     let config = WeaverConfig::default()
//!         .with_junior_model("devstral-small-2")
//!         .with_workspace_root("/path/to/project");
//!
//!     let mut weaver = DelegationOrchestrator::from_config(config)?;
//!     let cancel = CancellationToken::new();
//!
//!     let reply = weaver.chat("Write a fizzbuzz function", &cancel).await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Drive a conversation:** [`DelegationOrchestrator::chat`](orchestrator::DelegationOrchestrator::chat)
//!   for a single final string, or
//!   [`spawn_chat_stream`](orchestrator::spawn_chat_stream) for attributed
//!   [`OutputChunk`](orchestrator::OutputChunk)s.
//! - **Plug in a model:** implement [`Agent`](agent::Agent), and
//!   [`ToolAgent`](agent::ToolAgent) if the model supports function calling.
//!   [`JuniorClient`](agent::JuniorClient) and [`ClaudeCli`](agent::ClaudeCli)
//!   are the built-in backends.
//! - **Context budgets:** [`ContextManager`](context::ContextManager) decides
//!   between compaction (summarize) and truncation (drop oldest).
//! - **Parsing model output:** [`parser`] finds delegation directives and
//!   recovers inline or truncated tool calls.
//! - **Junior's tools:** [`tools`] holds the [`Tool`](tools::Tool) trait, the
//!   [`ToolSet`](tools::ToolSet) dispatcher and the sandboxed catalog.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`orchestrator`] | Delegation state machine, Junior tool loop, streaming output |
//! | [`agent`] | Agent traits, Junior HTTP client, Senior CLI adapter, prompts, model tuning |
//! | [`context`] | Per-agent history with token estimate, compaction and truncation policy |
//! | [`parser`] | `/local` extraction, inline tool-call normalization, partial JSON recovery |
//! | [`tools`] | Tool trait, dispatch, sandbox path resolution, file/command/search/note tools |
//! | [`notes`] | Shared note log visible to both agents |
//! | [`process`] | Subprocess execution with timeout and cancellation |

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod notes;
pub mod orchestrator;
pub mod parser;
pub mod prelude;
pub mod process;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Re-export schemars for downstream tool authors.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate function-calling parameters from a type that implements
/// `schemars::JsonSchema`.
///
/// The raw schemars output is flattened to the shape local inference servers
/// handle reliably: `{type: "object", properties: {name: {type, description}},
/// required: [...]}`. Optional fields (`Option<T>`) keep their inner type.
///
/// # Example
///
/// ```
/// use weaver_rs::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct SearchArgs {
///     /// Pattern to search for.
///     pattern: String,
///     #[serde(default)]
///     path: Option<String>,
/// }
///
/// let schema = json_schema_for::<SearchArgs>();
/// assert_eq!(schema["type"], "object");
/// assert_eq!(schema["properties"]["path"]["type"], "string");
/// assert_eq!(schema["required"], serde_json::json!(["pattern"]));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let raw = serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({}));
    flatten_parameters(&raw)
}

fn flatten_parameters(raw: &Value) -> Value {
    let mut properties = serde_json::Map::new();
    if let Some(props) = raw.get("properties").and_then(Value::as_object) {
        for (name, prop) in props {
            let ty = match prop.get("type") {
                Some(Value::String(t)) => t.clone(),
                Some(Value::Array(types)) => types
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|t| *t != "null")
                    .unwrap_or("string")
                    .to_string(),
                _ => "string".to_string(),
            };
            let mut entry = serde_json::Map::new();
            entry.insert("type".into(), Value::String(ty));
            if let Some(desc) = prop.get("description").and_then(Value::as_str) {
                entry.insert("description".into(), Value::String(desc.to_string()));
            }
            properties.insert(name.clone(), Value::Object(entry));
        }
    }
    let required = raw
        .get("required")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation, in OpenAI chat-completions shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant turn that requested tool calls. Empty text is omitted so the
    /// message serializes without a `content` field.
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let content = content.into();
        Self {
            role: MessageRole::Assistant,
            content: (!content.is_empty()).then_some(content),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    /// Text content, or `""` for content-less messages.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the model (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Names of the declared parameters, in schema order.
    pub fn parameter_names(&self) -> Vec<String> {
        self.function
            .parameters
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub enum CallType {
    #[default]
    #[serde(rename = "function")]
    Function,
}

/// A tool call requested by the model.
///
/// Some OpenAI-compatible servers omit `id` or `type`; both default so the
/// call still deserializes. Callers fill in missing ids.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FunctionCallData {
    pub name: String,
    /// Raw JSON text as produced by the model. May be malformed.
    #[serde(default)]
    pub arguments: String,
}
