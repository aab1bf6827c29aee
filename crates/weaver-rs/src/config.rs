//! Orchestrator configuration with sensible defaults.
//!
//! [`WeaverConfig`] captures everything needed to wire a Senior agent, a
//! Junior agent and Junior's tool sandbox, and converts it into the pieces the
//! orchestrator uses via [`build_tool_set`](WeaverConfig::build_tool_set) and
//! [`junior_config`](WeaverConfig::junior_config).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::JuniorConfig;
use crate::agent::prompts::SENIOR_PROMPT;
use crate::notes::SharedNotes;
use crate::tools::{JuniorToolsConfig, Sandbox, ToolSet};

/// Commands Junior may run through `execute_command`, matched on the
/// basename of the first token.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    "ls", "cat", "head", "tail", "grep", "find", "wc", "go", "python", "python3", "node", "npm",
    "cargo", "make", "git", "pwd", "echo", "date", "which", "file", "diff",
];

/// Configuration for a delegation session.
#[derive(Debug, Clone)]
pub struct WeaverConfig {
    /// System prompt for Senior. Default: the built-in delegation prompt.
    pub senior_prompt: String,
    /// Senior CLI executable. Default: `"claude"`.
    pub senior_bin: String,
    /// Per-call Senior timeout. Default: 10 minutes.
    pub senior_timeout: Duration,
    /// Senior context window in tokens. Default: `200_000`.
    pub senior_context_limit: usize,
    /// OpenAI-compatible base URL for Junior. Default: `"http://localhost:11434/v1"`.
    pub junior_url: String,
    /// Junior model identifier. Default: `"gpt-oss:20b"`.
    pub junior_model: String,
    /// Junior context window in tokens. Default: `131_072`.
    pub junior_context_limit: usize,
    /// Junior system prompt override. `None` picks a prompt for the model.
    pub junior_prompt: Option<String>,
    /// Give Junior the sandboxed tool catalog. Default: `true`.
    pub enable_tools: bool,
    /// Root directory Junior's tools are confined to. Default: `"."`.
    pub workspace_root: PathBuf,
    /// Shared notes file. `None` uses `~/.weaver/shared.json`.
    pub notes_path: Option<PathBuf>,
    /// Maximum Junior delegations per user turn. Default: `50`.
    pub max_delegations: usize,
    /// Maximum tool rounds per Junior delegation. Default: `10`.
    pub max_tool_rounds: usize,
    /// Timeout for `execute_command` and `search_files`. Default: 30 seconds.
    pub command_timeout: Duration,
    /// Largest file `read_file` will return. Default: 1 MiB.
    pub max_read_bytes: u64,
    /// Allow-list for `execute_command`.
    pub allowed_commands: Vec<String>,
    /// Validate tool arguments against their schema. Default: `true`.
    pub validate_args: bool,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            senior_prompt: SENIOR_PROMPT.to_string(),
            senior_bin: "claude".to_string(),
            senior_timeout: Duration::from_secs(600),
            senior_context_limit: 200_000,
            junior_url: "http://localhost:11434/v1".to_string(),
            junior_model: "gpt-oss:20b".to_string(),
            junior_context_limit: 131_072,
            junior_prompt: None,
            enable_tools: true,
            workspace_root: PathBuf::from("."),
            notes_path: None,
            max_delegations: 50,
            max_tool_rounds: 10,
            command_timeout: Duration::from_secs(30),
            max_read_bytes: 1024 * 1024,
            allowed_commands: DEFAULT_ALLOWED_COMMANDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            validate_args: true,
        }
    }
}

impl WeaverConfig {
    pub fn with_senior_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.senior_prompt = prompt.into();
        self
    }

    pub fn with_senior_bin(mut self, bin: impl Into<String>) -> Self {
        self.senior_bin = bin.into();
        self
    }

    pub fn with_senior_timeout(mut self, timeout: Duration) -> Self {
        self.senior_timeout = timeout;
        self
    }

    pub fn with_senior_context_limit(mut self, tokens: usize) -> Self {
        self.senior_context_limit = tokens;
        self
    }

    pub fn with_junior_url(mut self, url: impl Into<String>) -> Self {
        self.junior_url = url.into();
        self
    }

    pub fn with_junior_model(mut self, model: impl Into<String>) -> Self {
        self.junior_model = model.into();
        self
    }

    pub fn with_junior_context_limit(mut self, tokens: usize) -> Self {
        self.junior_context_limit = tokens;
        self
    }

    pub fn with_junior_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.junior_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.enable_tools = enabled;
        self
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn with_notes_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.notes_path = Some(path.into());
        self
    }

    pub fn with_max_delegations(mut self, max: usize) -> Self {
        self.max_delegations = max;
        self
    }

    pub fn with_max_tool_rounds(mut self, max: usize) -> Self {
        self.max_tool_rounds = max;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Junior HTTP client settings derived from the model name.
    pub fn junior_config(&self) -> JuniorConfig {
        JuniorConfig::for_model(
            self.junior_url.clone(),
            self.junior_model.clone(),
            self.junior_context_limit,
        )
    }

    /// Settings for the sandboxed tool catalog.
    pub fn tools_config(&self) -> JuniorToolsConfig {
        JuniorToolsConfig {
            command_timeout: self.command_timeout,
            max_read_bytes: self.max_read_bytes,
            allowed_commands: self.allowed_commands.clone(),
        }
    }

    /// Build Junior's [`ToolSet`], rooted at `workspace_root`.
    pub fn build_tool_set(&self, notes: Arc<SharedNotes>) -> ToolSet {
        ToolSet::new()
            .with_arg_validation(self.validate_args)
            .with_junior_tools(Sandbox::new(&self.workspace_root), notes, &self.tools_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WeaverConfig::default();
        assert_eq!(config.max_delegations, 50);
        assert_eq!(config.max_tool_rounds, 10);
        assert_eq!(config.senior_context_limit, 200_000);
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert_eq!(config.max_read_bytes, 1_048_576);
        assert!(config.enable_tools);
        assert!(config.allowed_commands.iter().any(|c| c == "git"));
        assert!(!config.allowed_commands.iter().any(|c| c == "rm"));
    }

    #[test]
    fn builders_override_defaults() {
        let config = WeaverConfig::default()
            .with_junior_model("devstral-small-2")
            .with_junior_context_limit(32_768)
            .with_max_delegations(3)
            .with_tools(false);
        assert_eq!(config.junior_model, "devstral-small-2");
        assert_eq!(config.junior_config().context_limit, 32_768);
        assert_eq!(config.max_delegations, 3);
        assert!(!config.enable_tools);
    }

    #[test]
    fn build_tool_set_registers_junior_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let config = WeaverConfig::default().with_workspace_root(dir.path());
        let tools = config.build_tool_set(Arc::new(SharedNotes::in_memory()));
        let names: Vec<String> = tools
            .definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "context_read",
                "context_write",
                "execute_command",
                "list_directory",
                "read_file",
                "search_files",
                "write_file",
            ]
        );
    }
}
