//! Parsing of free-form model output.
//!
//! - [`delegation`] finds the `/local <task>` directive in Senior's replies.
//! - [`tool_calls`] turns Junior's replies into structured tool calls, including
//!   the inline `[TOOL_CALLS]name[ARGS]{...}` format some local models emit
//!   and argument objects cut off by the token limit.
//!
//! Nothing here fails: malformed input degrades to "no directive" or to the
//! best partial value that can be recovered.

pub mod delegation;
pub mod tool_calls;

pub use delegation::{DELEGATION_MARKER, extract_delegation};
pub use tool_calls::{
    code_from_tool_calls, extract_code, extract_json_object, extract_string_field,
    is_inline_tool_call_format, normalize_tool_calls, parse_inline_tool_calls, salvage_arguments,
};
