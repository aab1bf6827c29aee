//! Shared-note tools: `context_write` and `context_read`.
//!
//! These give Junior a channel to Senior that survives between delegations:
//! anything written here shows up in the digest prepended to Senior's next
//! message.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::ToolDef;
use crate::notes::{NoteAuthor, SharedNotes};
use crate::tools::core::{Tool, ToolFuture, parse_tool_args};
use crate::tools::names;
use crate::tools::spec::ToolSpec;

const DEFAULT_READ_LIMIT: usize = 10;

#[derive(Deserialize, JsonSchema)]
pub struct ContextWriteArgs {
    /// Content to add to shared context.
    pub content: String,
    /// Comma-separated tags for organization (optional).
    #[serde(default)]
    pub tags: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ContextReadArgs {
    /// Maximum entries to return (default 10).
    #[serde(default)]
    pub limit: Option<u32>,
    /// Filter by tag (optional).
    #[serde(default)]
    pub tag: Option<String>,
}

fn split_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

// ── ContextWrite ────────────────────────────────────────────────────

pub struct ContextWrite {
    notes: Arc<SharedNotes>,
}

impl ContextWrite {
    pub fn new(notes: Arc<SharedNotes>) -> Self {
        Self { notes }
    }
}

impl Tool for ContextWrite {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::CONTEXT_WRITE)
            .purpose(
                "Write to shared context, a space visible to both you and Senior. \
                 Use it to share findings, ask questions, report status or leave notes for review",
            )
            .when_to_use("Senior should know something that does not belong in your final answer")
            .when_not_to_use("You are writing code to a file, use write_file")
            .parameters_for::<ContextWriteArgs>()
            .example(
                "context_write(content='tests pass on go 1.22', tags='status')",
                "Added to shared context (ID: 3f9c2a1b7d4e). Senior will see this.",
            )
            .to_tool_def()
    }

    fn execute(&self, arguments: &str, _cancel: &CancellationToken) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<ContextWriteArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.content.trim().is_empty() {
                return "Error: content is required".to_string();
            }
            let tags = split_tags(args.tags.as_deref());
            let id = self.notes.write(NoteAuthor::Junior, args.content, tags);
            format!("Added to shared context (ID: {id}). Senior will see this.")
        })
    }
}

// ── ContextRead ─────────────────────────────────────────────────────

pub struct ContextRead {
    notes: Arc<SharedNotes>,
}

impl ContextRead {
    pub fn new(notes: Arc<SharedNotes>) -> Self {
        Self { notes }
    }
}

impl Tool for ContextRead {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::CONTEXT_READ)
            .purpose(
                "Read from shared context. Returns recent entries that you or Senior have written",
            )
            .when_to_use("You want to see what Senior has communicated or review your own notes")
            .parameters_for::<ContextReadArgs>()
            .output_format("Entries newest first, each with id, author and time")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str, _cancel: &CancellationToken) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<ContextReadArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            let limit = args.limit.map_or(DEFAULT_READ_LIMIT, |l| l as usize);
            let tags = split_tags(args.tag.as_deref());
            let notes = self.notes.list(limit, None, &tags);

            if notes.is_empty() {
                return "Shared context is empty".to_string();
            }

            let mut out = String::from("=== Shared Context ===\n\n");
            for note in notes {
                let author = match note.author {
                    NoteAuthor::Senior => "Senior",
                    NoteAuthor::Junior => "You (Junior)",
                    NoteAuthor::User => "User",
                };
                out.push_str(&format!(
                    "--- [{}] {author} at {} ---\n",
                    note.id,
                    note.created_at.format("%Y-%m-%d %H:%M:%S")
                ));
                if !note.tags.is_empty() {
                    out.push_str(&format!("Tags: {}\n", note.tags.join(", ")));
                }
                out.push_str(&note.content);
                out.push_str("\n\n");
            }
            out
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_records_junior_note() {
        let notes = Arc::new(SharedNotes::in_memory());
        let result = ContextWrite::new(notes.clone())
            .execute(
                r#"{"content": "found the bug", "tags": "bug, parser"}"#,
                &CancellationToken::new(),
            )
            .await;
        assert!(result.starts_with("Added to shared context (ID: "));
        assert!(result.ends_with("). Senior will see this."));

        let stored = notes.list(10, None, &[]);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].author, NoteAuthor::Junior);
        assert_eq!(stored[0].tags, vec!["bug", "parser"]);
    }

    #[tokio::test]
    async fn read_empty() {
        let notes = Arc::new(SharedNotes::in_memory());
        let result = ContextRead::new(notes)
            .execute("{}", &CancellationToken::new())
            .await;
        assert_eq!(result, "Shared context is empty");
    }

    #[tokio::test]
    async fn read_lists_newest_first_with_labels() {
        let notes = Arc::new(SharedNotes::in_memory());
        notes.write(NoteAuthor::Senior, "use go 1.22", vec!["env".into()]);
        notes.write(NoteAuthor::Junior, "done", Vec::new());

        let result = ContextRead::new(notes.clone())
            .execute("{}", &CancellationToken::new())
            .await;
        assert!(result.starts_with("=== Shared Context ===\n\n--- ["));
        let junior_at = result.find("You (Junior) at").unwrap();
        let senior_at = result.find("] Senior at").unwrap();
        assert!(junior_at < senior_at);
        assert!(result.contains("Tags: env\nuse go 1.22\n\n"));

        let filtered = ContextRead::new(notes)
            .execute(r#"{"tag": "env", "limit": 5}"#, &CancellationToken::new())
            .await;
        assert!(filtered.contains("use go 1.22"));
        assert!(!filtered.contains("done"));
    }
}
