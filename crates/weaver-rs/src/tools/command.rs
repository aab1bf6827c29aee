//! Process-backed tools: `execute_command` and `search_files`.
//!
//! Both run with the sandbox root as working directory, under a timeout, and
//! are killed when the turn is cancelled.

use std::path::{Component, Path};
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::ToolDef;
use crate::config::DEFAULT_ALLOWED_COMMANDS;
use crate::process::{ProcessError, run_process, shell_command};
use crate::tools::core::{Tool, ToolFuture, parse_tool_args};
use crate::tools::names;
use crate::tools::sandbox::Sandbox;
use crate::tools::spec::ToolSpec;

/// File types `search_files` looks at.
pub const SEARCH_INCLUDES: &[&str] = &[
    "*.go", "*.py", "*.js", "*.ts", "*.md", "*.yaml", "*.json", "*.rs",
];

/// Largest `search_files` output returned, in bytes.
pub const MAX_SEARCH_OUTPUT: usize = 10_000;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters that chain, substitute or redirect under `sh -c`.
const SHELL_OPERATORS: &[char] = &[';', '&', '|', '$', '`', '<', '>', '(', ')', '\n', '\r'];

#[derive(Deserialize, JsonSchema)]
pub struct ExecuteCommandArgs {
    /// Command to execute (e.g. 'go build', 'python script.py').
    pub command: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct SearchFilesArgs {
    /// Pattern to search for.
    pub pattern: String,
    /// Path to search in (defaults to '.').
    #[serde(default)]
    pub path: Option<String>,
}

fn describe_failure(what: &str, err: ProcessError) -> String {
    match err {
        ProcessError::TimedOut(limit) => format!("Error: {what} timed out after {limit:?}"),
        ProcessError::Cancelled => format!("Error: {what} cancelled"),
        other => format!("Error: {what} failed: {other}"),
    }
}

// ── ExecuteCommand ──────────────────────────────────────────────────

/// Run an allow-listed shell command in the sandbox root.
///
/// The allow-list matches the basename of the first word, so
/// `/usr/bin/git status` passes as `git`. The command must be a single
/// program invocation: shell operators are refused, and so are arguments
/// that name absolute, home-relative or parent-directory paths.
pub struct ExecuteCommand {
    sandbox: Sandbox,
    allowed: Vec<String>,
    timeout: Duration,
}

impl ExecuteCommand {
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox,
            allowed: DEFAULT_ALLOWED_COMMANDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn allowed_commands(mut self, commands: Vec<String>) -> Self {
        self.allowed = commands;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn check_allowed(&self, command: &str) -> Result<(), String> {
        if let Some(op) = command.chars().find(|c| SHELL_OPERATORS.contains(c)) {
            return Err(format!(
                "Error: shell operator '{}' is not allowed; run one command per call",
                op.escape_default()
            ));
        }
        let mut words = command.split_whitespace();
        let Some(first) = words.next() else {
            return Err("Error: empty command".to_string());
        };
        let base = Path::new(first)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !self.allowed.iter().any(|a| *a == base) {
            return Err(format!(
                "Error: command not allowed: {base} (allowed: {})",
                self.allowed.join(", ")
            ));
        }
        match words.find(|w| escapes_workspace(w)) {
            Some(arg) => Err(format!("Error: argument '{arg}' reaches outside the workspace")),
            None => Ok(()),
        }
    }
}

/// An argument, or the value of a `--flag=value` argument, that is absolute,
/// starts at `~`, or climbs with `..`.
fn escapes_workspace(word: &str) -> bool {
    let word = word.trim_matches(|c| c == '\'' || c == '"');
    let value = word.split_once('=').map_or(word, |(_, v)| v);
    let value = value.trim_matches(|c| c == '\'' || c == '"');
    value.starts_with('/')
        || value.starts_with('~')
        || Path::new(value)
            .components()
            .any(|c| c == Component::ParentDir)
}

impl Tool for ExecuteCommand {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::EXECUTE_COMMAND)
            .purpose("Execute a shell command in the workspace. Only allowed commands are permitted")
            .when_to_use("You need to build, run or test code, or inspect the repository with git")
            .when_not_to_use("You only need file contents, use read_file")
            .parameters_for::<ExecuteCommandArgs>()
            .example("execute_command(command='python3 fizzbuzz.py')", "program output")
            .output_format("Combined stdout and stderr")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str, cancel: &CancellationToken) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<ExecuteCommandArgs>(arguments);
        let cancel = cancel.clone();
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            let command = args.command.trim();
            if command.is_empty() {
                return "Error: command is required".to_string();
            }
            if let Err(e) = self.check_allowed(command) {
                return e;
            }

            let cmd = shell_command(command, self.sandbox.root());
            match run_process(cmd, None, self.timeout, &cancel).await {
                Ok(out) if out.success() => out.combined(),
                Ok(out) => format!(
                    "Error: command failed with exit code {}\nOutput: {}",
                    out.exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "none (killed by signal)".to_string()),
                    out.combined()
                ),
                Err(e) => describe_failure("command", e),
            }
        })
    }
}

// ── SearchFiles ─────────────────────────────────────────────────────

/// Recursive `grep` over source and doc files inside the sandbox.
pub struct SearchFiles {
    sandbox: Sandbox,
    timeout: Duration,
}

impl SearchFiles {
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Tool for SearchFiles {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::SEARCH_FILES)
            .purpose("Search for a pattern in workspace files using grep")
            .when_to_use("You need to find where something is defined or used")
            .when_not_to_use("You already know which file to look at, use read_file")
            .parameters_for::<SearchFilesArgs>()
            .example("search_files(pattern='func main')", "cmd/app/main.go:12:func main() {")
            .output_format("path:line:match, one per line")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str, cancel: &CancellationToken) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<SearchFilesArgs>(arguments);
        let cancel = cancel.clone();
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.pattern.is_empty() {
                return "Error: pattern is required".to_string();
            }
            let rel = args
                .path
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| ".".to_string());
            let target = match self.sandbox.resolve(&rel) {
                Ok(p) => self.sandbox.relative(&p),
                Err(e) => return format!("Error: {e}"),
            };

            let mut cmd = Command::new("grep");
            cmd.arg("-rn");
            for include in SEARCH_INCLUDES {
                cmd.arg(format!("--include={include}"));
            }
            cmd.arg("-e")
                .arg(&args.pattern)
                .arg(&target)
                .current_dir(self.sandbox.root());

            match run_process(cmd, None, self.timeout, &cancel).await {
                Ok(out) if out.exit_code == Some(1) => "No matches found".to_string(),
                Ok(out) if out.success() => clip_search_output(out.stdout),
                Ok(out) => format!("Error: search failed: {}", out.combined().trim()),
                Err(e) => describe_failure("search", e),
            }
        })
    }
}

fn clip_search_output(output: String) -> String {
    if output.len() <= MAX_SEARCH_OUTPUT {
        return output;
    }
    let cut = output.floor_char_boundary(MAX_SEARCH_OUTPUT);
    format!("{}\n... (truncated)", output.get(..cut).unwrap_or_default())
}
