//! File tools: `read_file`, `write_file`, `list_directory`.

use chrono::{DateTime, Local};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::ToolDef;
use crate::tools::core::{Tool, ToolFuture, parse_tool_args};
use crate::tools::names;
use crate::tools::sandbox::Sandbox;
use crate::tools::spec::ToolSpec;

#[derive(Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// Relative path to the file.
    pub path: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// Relative path to the file.
    pub path: String,
    /// Content to write.
    pub content: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct ListDirectoryArgs {
    /// Relative path to list (use '.' for the workspace root).
    #[serde(default)]
    pub path: Option<String>,
}

// ── ReadFile ────────────────────────────────────────────────────────

/// Read a file inside the sandbox, refusing files above a size cap.
pub struct ReadFile {
    sandbox: Sandbox,
    max_bytes: u64,
}

impl ReadFile {
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox,
            max_bytes: 1024 * 1024,
        }
    }

    pub fn max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = max;
        self
    }
}

impl Tool for ReadFile {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::READ_FILE)
            .purpose("Read the contents of a file from the workspace")
            .when_to_use("You need the exact contents of a file whose path you know")
            .when_not_to_use("You are looking for text across many files, use search_files")
            .parameters_for::<ReadFileArgs>()
            .example("read_file(path='src/main.go')", "full file text")
            .output_format("Raw file content")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str, _cancel: &CancellationToken) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<ReadFileArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            let path = match self.sandbox.resolve(&args.path) {
                Ok(p) => p,
                Err(e) => return format!("Error: {e}"),
            };

            let meta = match fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) => return format!("Error: cannot access file '{}': {e}", args.path),
            };
            if meta.is_dir() {
                return format!(
                    "Error: '{}' is a directory, not a file. Use list_directory to browse it.",
                    args.path
                );
            }
            if meta.len() > self.max_bytes {
                return format!(
                    "Error: file too large: {} bytes (max {})",
                    meta.len(),
                    self.max_bytes
                );
            }

            match fs::read(&path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => format!("Error: failed to read file '{}': {e}", args.path),
            }
        })
    }
}

// ── WriteFile ───────────────────────────────────────────────────────

/// Create or overwrite a file inside the sandbox, creating parent
/// directories.
pub struct WriteFile {
    sandbox: Sandbox,
}

impl WriteFile {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

impl Tool for WriteFile {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::WRITE_FILE)
            .purpose("Write content to a file in the workspace, creating parent directories if needed")
            .when_to_use("You have produced code or text that should be saved to disk")
            .when_not_to_use("You only want to show code to Senior, put it in your reply instead")
            .parameters_for::<WriteFileArgs>()
            .example(
                "write_file(path='fizzbuzz.py', content='...')",
                "Successfully wrote 120 bytes to fizzbuzz.py",
            )
            .output_format("Confirmation with the number of bytes written")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str, _cancel: &CancellationToken) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<WriteFileArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            let path = match self.sandbox.resolve(&args.path) {
                Ok(p) => p,
                Err(e) => return format!("Error: {e}"),
            };

            if let Some(parent) = path.parent()
                && let Err(e) = fs::create_dir_all(parent).await
            {
                return format!("Error: failed to create directories: {e}");
            }
            match fs::write(&path, args.content.as_bytes()).await {
                Ok(()) => format!(
                    "Successfully wrote {} bytes to {}",
                    args.content.len(),
                    args.path
                ),
                Err(e) => format!("Error: failed to write file '{}': {e}", args.path),
            }
        })
    }
}

// ── ListDirectory ───────────────────────────────────────────────────

/// List a directory inside the sandbox, one entry per line, sorted by name.
///
/// Each line is `d|-`, the size right-aligned to eight columns, the
/// modification time (`Jan 02 15:04`) and the entry name.
pub struct ListDirectory {
    sandbox: Sandbox,
}

impl ListDirectory {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

impl Tool for ListDirectory {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::LIST_DIRECTORY)
            .purpose("List files and directories in a path")
            .when_to_use("You need to discover what exists in a directory")
            .when_not_to_use("You already know the file path, use read_file")
            .parameters_for::<ListDirectoryArgs>()
            .example("list_directory(path='.')", "d     4096 Jan 02 15:04 src")
            .output_format("One entry per line: type, size, modified time, name")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str, _cancel: &CancellationToken) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<ListDirectoryArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            let rel = args
                .path
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| ".".to_string());
            let path = match self.sandbox.resolve(&rel) {
                Ok(p) => p,
                Err(e) => return format!("Error: {e}"),
            };

            let mut dir = match fs::read_dir(&path).await {
                Ok(d) => d,
                Err(e) => return format!("Error: failed to read directory '{rel}': {e}"),
            };

            let mut entries = Vec::new();
            loop {
                match dir.next_entry().await {
                    Ok(Some(entry)) => {
                        let Ok(meta) = entry.metadata().await else {
                            continue;
                        };
                        let kind = if meta.is_dir() { 'd' } else { '-' };
                        let modified = meta
                            .modified()
                            .map(|t| DateTime::<Local>::from(t).format("%b %d %H:%M").to_string())
                            .unwrap_or_else(|_| "-".repeat(12));
                        let name = entry.file_name().to_string_lossy().into_owned();
                        entries.push((name, kind, meta.len(), modified));
                    }
                    Ok(None) => break,
                    Err(e) => return format!("Error: failed to read directory '{rel}': {e}"),
                }
            }
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            entries
                .into_iter()
                .map(|(name, kind, size, modified)| format!("{kind} {size:>8} {modified} {name}\n"))
                .collect()
        })
    }
}
