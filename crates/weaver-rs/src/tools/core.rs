//! Tool abstraction for Junior's function calls.
//!
//! The [`Tool`] trait defines the interface every tool implements: a static
//! API definition (name, description, JSON schema) and an async `execute`
//! method. Tools are collected into a [`ToolSet`] which handles dispatch,
//! argument repair, validation, timeouts and result truncation.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::ToolDef;
use crate::config::DEFAULT_ALLOWED_COMMANDS;
use crate::notes::SharedNotes;
use crate::parser::salvage_arguments;
use crate::tools::command::{ExecuteCommand, SearchFiles};
use crate::tools::fs::{ListDirectory, ReadFile, WriteFile};
use crate::tools::notes::{ContextRead, ContextWrite};
use crate::tools::sandbox::Sandbox;

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Default timeout for one tool call.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = String> + Send + 'a>>;

// ── JuniorToolsConfig ──────────────────────────────────────────────

/// Limits for the built-in catalog registered by
/// [`ToolSet::with_junior_tools`].
#[derive(Debug, Clone)]
pub struct JuniorToolsConfig {
    /// Timeout for `execute_command` and `search_files`.
    pub command_timeout: Duration,
    /// Largest file `read_file` will return.
    pub max_read_bytes: u64,
    /// Program names `execute_command` may run.
    pub allowed_commands: Vec<String>,
}

impl Default for JuniorToolsConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            max_read_bytes: 1024 * 1024,
            allowed_commands: DEFAULT_ALLOWED_COMMANDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool Junior can invoke via function calling.
///
/// # Example
///
/// ```ignore
/// struct Pwd { sandbox: Sandbox }
///
/// impl Tool for Pwd {
///     fn definition(&self) -> ToolDef {
///         ToolDef::new("pwd", "Print the workspace root", json_schema_for::<NoArgs>())
///     }
///
///     fn execute(&self, _arguments: &str, _cancel: &CancellationToken) -> ToolFuture<'_> {
///         Box::pin(async move { self.sandbox.root().display().to_string() })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDef;

    /// Run the tool with raw JSON arguments.
    ///
    /// Failures are returned as `"Error: ..."` strings, never panics: the
    /// string goes back to the model as the tool result either way.
    /// Long-running tools should stop when `cancel` fires.
    fn execute(&self, arguments: &str, cancel: &CancellationToken) -> ToolFuture<'_>;

    fn name(&self) -> String {
        self.definition().function.name
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

/// A collection of tools dispatched by name.
///
/// # Example
///
/// ```ignore
/// let tools = ToolSet::new()
///     .with_arg_validation(true)
///     .with_junior_tools(Sandbox::new("/path/to/project"), notes, &JuniorToolsConfig::default());
///
/// let defs = tools.definitions();
/// let result = tools.execute("list_directory", r#"{"path": "."}"#, &cancel).await;
/// ```
pub struct ToolSet {
    tools: HashMap<String, Box<dyn Tool>>,
    max_result_bytes: usize,
    validate_args: bool,
    /// `None` disables the per-call timeout.
    default_timeout: Option<Duration>,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolSet")
            .field("tools", &names)
            .field("max_result_bytes", &self.max_result_bytes)
            .finish()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: false,
            default_timeout: Some(DEFAULT_TOOL_TIMEOUT),
        }
    }

    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Validate arguments against each tool's JSON Schema before running it.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Register Junior's full catalog: file, command, search and shared-note
    /// tools, all confined to `sandbox`.
    pub fn with_junior_tools(
        self,
        sandbox: Sandbox,
        notes: Arc<SharedNotes>,
        config: &JuniorToolsConfig,
    ) -> Self {
        self.with(ReadFile::new(sandbox.clone()).max_bytes(config.max_read_bytes))
            .with(WriteFile::new(sandbox.clone()))
            .with(ListDirectory::new(sandbox.clone()))
            .with(
                ExecuteCommand::new(sandbox.clone())
                    .allowed_commands(config.allowed_commands.clone())
                    .timeout(config.command_timeout),
            )
            .with(SearchFiles::new(sandbox).timeout(config.command_timeout))
            .with(ContextWrite::new(notes.clone()))
            .with(ContextRead::new(notes))
    }

    /// Tool definitions for the API, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDef> {
        let mut defs: Vec<ToolDef> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call by name and return its (possibly truncated)
    /// result.
    ///
    /// Empty arguments mean `{}`. Arguments that are not valid JSON, usually
    /// because the model ran out of tokens, are rebuilt from whichever of the
    /// tool's declared string fields can still be read. Every failure comes
    /// back as an `"Error: ..."` string.
    pub async fn execute(&self, name: &str, arguments: &str, cancel: &CancellationToken) -> String {
        let Some(tool) = self.tools.get(name) else {
            return format!("Error: unknown tool '{name}'");
        };

        let arguments = match prepare_arguments(tool.as_ref(), arguments) {
            Ok(a) => a,
            Err(e) => return e,
        };

        if self.validate_args
            && let Some(error) = validate_tool_arguments(tool.as_ref(), &arguments)
        {
            return error;
        }

        log_tool_call(name, &arguments);
        let start = Instant::now();

        let run = tool.execute(&arguments, cancel);
        let result = tokio::select! {
            result = async {
                match self.default_timeout {
                    Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| limit),
                    None => Ok(run.await),
                }
            } => match result {
                Ok(r) => r,
                Err(limit) => {
                    info!(
                        "Tool {name} timed out after {:.1}s (limit: {:.0}s)",
                        start.elapsed().as_secs_f64(),
                        limit.as_secs_f64(),
                    );
                    format!(
                        "Error: tool '{name}' timed out after {:.0} seconds.",
                        limit.as_secs_f64()
                    )
                }
            },
            () = cancel.cancelled() => {
                debug!("Tool {name} cancelled");
                format!("Error: tool '{name}' cancelled")
            }
        };

        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes)",
            start.elapsed().as_secs_f64() * 1000.0,
            result.len()
        );
        trace!(
            "Tool {name} result preview: {}",
            result.chars().take(300).collect::<String>()
        );

        truncate_result(result, self.max_result_bytes)
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn prepare_arguments(tool: &dyn Tool, raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok("{}".to_string());
    }
    if serde_json::from_str::<serde_json::Value>(raw).is_ok() {
        return Ok(raw.to_string());
    }

    let def = tool.definition();
    match salvage_arguments(raw, &def.parameter_names()) {
        Some(value) => {
            warn!(
                "Executing {} with arguments recovered from malformed JSON",
                def.function.name
            );
            Ok(value.to_string())
        }
        None => Err(format!(
            "Error: invalid JSON arguments for tool '{}'. \
             Please provide valid JSON matching the tool's parameter schema.",
            def.function.name
        )),
    }
}

/// Validate tool arguments against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or an error string the model can act on.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Option<String> {
    let args_value: serde_json::Value = match serde_json::from_str(arguments) {
        Ok(v) => v,
        Err(e) => {
            return Some(format!(
                "Error: invalid JSON arguments for tool '{}': {e}. \
                 Please provide valid JSON matching the tool's parameter schema.",
                tool.name()
            ));
        }
    };

    let schema = tool.definition().function.parameters;
    let Ok(validator) = jsonschema::validator_for(&schema) else {
        return None;
    };

    let errors: Vec<String> = validator
        .iter_errors(&args_value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: argument validation failed for tool '{}':\n{}\n\
             Please fix the arguments and try again.",
            tool.name(),
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    debug!("[tool] {name} full args ({} bytes)", arguments.len());
    trace!("[tool] {name} arguments: {arguments}");
}

/// Truncate to at most `max` bytes on a char boundary, appending a notice.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let cut = s.floor_char_boundary(max);
    format!(
        "{}...\n[truncated: {} bytes total]",
        s.get(..cut).unwrap_or_default(),
        s.len()
    )
}

/// Parse raw JSON arguments into a typed struct, or an error string ready to
/// return from [`Tool::execute`].
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| {
        format!(
            "Error: invalid tool arguments: {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        )
    })
}
