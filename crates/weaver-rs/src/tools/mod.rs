//! Junior's tools.
//!
//! Every capability Junior has (reading and writing files, running commands,
//! searching, leaving notes for Senior) is a [`Tool`] implementor. Tools are
//! collected into a [`ToolSet`] which handles dispatch, argument repair,
//! validation, truncation and timeouts.
//!
//! All path arguments go through [`Sandbox::resolve`] before any filesystem
//! access, so a tool can never reach outside the workspace root.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolSet`], dispatch helpers.
//! - [`sandbox`]: lexical path confinement.
//! - [`fs`]: `read_file`, `write_file`, `list_directory`.
//! - [`command`]: `execute_command` (allow-listed) and `search_files`.
//! - [`notes`]: `context_write` and `context_read` over [`SharedNotes`](crate::notes::SharedNotes).
//! - [`spec`]: [`ToolSpec`](spec::ToolSpec) builder for structured descriptions.
//! - [`names`]: tool name constants.

pub mod command;
pub mod core;
pub mod fs;
pub mod names;
pub mod notes;
pub mod sandbox;
pub mod spec;

pub use command::{ExecuteCommand, SearchFiles};
pub use core::{
    DEFAULT_MAX_RESULT_BYTES, DEFAULT_TOOL_TIMEOUT, JuniorToolsConfig, Tool, ToolFuture, ToolSet,
    log_tool_call, parse_tool_args, truncate_result, validate_tool_arguments,
};
pub use fs::{ListDirectory, ReadFile, WriteFile};
pub use notes::{ContextRead, ContextWrite};
pub use sandbox::{Sandbox, SandboxError, clean_path};
