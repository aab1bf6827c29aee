//! Tool-call recovery from local model output.
//!
//! Some models (Devstral and other Mistral derivatives) do not use the
//! structured `tool_calls` field. They write calls inline in the message text:
//!
//! ```text
//! [TOOL_CALLS]write_file[ARGS]{"path": "fizz.py", "content": "print(1)"}
//! ```
//!
//! When the reply hits the token limit the argument object is often cut off
//! mid-string. The helpers here parse the inline format, scan JSON objects
//! with a string-aware brace counter, and pull individual string fields out of
//! truncated text so that a partial `write_file` still lands on disk.

use serde_json::Value;
use tracing::warn;

use crate::ToolCall;
use crate::tools::names;

/// Marker that starts an inline tool call.
pub const TOOL_CALLS_MARKER: &str = "[TOOL_CALLS]";

/// Marker that separates the function name from its arguments.
pub const ARGS_MARKER: &str = "[ARGS]";

pub fn is_inline_tool_call_format(content: &str) -> bool {
    content.contains(TOOL_CALLS_MARKER)
}

/// Parse every inline call in `content`.
///
/// Returns the calls, with ids `mistral-0`, `mistral-1`, ..., and whatever
/// text follows the last complete argument object. Text before a marker is
/// discarded. A marker without `[ARGS]` ends parsing. An argument object that
/// never closes is taken verbatim and consumes the rest of the input.
pub fn parse_inline_tool_calls(content: &str) -> (Vec<ToolCall>, String) {
    if !is_inline_tool_call_format(content) {
        return (Vec::new(), content.to_string());
    }

    let mut calls = Vec::new();
    let mut remaining = content;

    while let Some((_, after_marker)) = remaining.split_once(TOOL_CALLS_MARKER) {
        remaining = after_marker;
        let Some((name, after_args)) = remaining.split_once(ARGS_MARKER) else {
            break;
        };

        let (json, rest, complete) = extract_json_object(after_args);
        let (arguments, rest) = if complete {
            (json, rest)
        } else {
            (after_args.trim(), "")
        };

        calls.push(ToolCall::new(
            format!("mistral-{}", calls.len()),
            name.trim(),
            arguments,
        ));
        remaining = rest;
    }

    (calls, remaining.trim().to_string())
}

/// Split a JSON object off the start of `s`.
///
/// Returns `(object, rest, complete)`. Braces inside string literals and
/// escaped quotes are ignored. If the object never closes the whole
/// (left-trimmed) input is returned with `complete == false`. Input that does
/// not start with `{` yields an empty object slice.
///
/// ```
/// use weaver_rs::parser::extract_json_object;
///
/// let (json, rest, complete) = extract_json_object(r#"{"a": "}"} tail"#);
/// assert_eq!(json, r#"{"a": "}"}"#);
/// assert_eq!(rest, " tail");
/// assert!(complete);
/// ```
pub fn extract_json_object(s: &str) -> (&str, &str, bool) {
    let s = s.trim_start();
    if !s.starts_with('{') {
        return ("", s, false);
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let (object, rest) = s.split_at(i + 1);
                    return (object, rest, true);
                }
            }
            _ => {}
        }
    }

    (s, "", false)
}

/// Read the string value of `field` from possibly truncated JSON text.
///
/// Copies the value up to its closing quote, or to the end of the input when
/// the quote never arrives, and unescapes it. Returns `None` if the field is
/// missing or its value is not a string.
///
/// ```
/// use weaver_rs::parser::extract_string_field;
///
/// let cut = r#"{"path": "a.py", "content": "partial tex"#;
/// assert_eq!(extract_string_field(cut, "content").as_deref(), Some("partial tex"));
/// ```
pub fn extract_string_field(args: &str, field: &str) -> Option<String> {
    let needle = format!("\"{field}\"");
    let mut search = args;

    while let Some(pos) = search.find(&needle) {
        let after = search.get(pos + needle.len()..)?;
        if let Some(value) = after.trim_start().strip_prefix(':') {
            let body = value.trim_start().strip_prefix('"')?;
            return Some(read_json_string(body));
        }
        search = after;
    }
    None
}

/// Unescape a JSON string body up to its closing quote or end of input.
fn read_json_string(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('/') => out.push('/'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                // Cut off right after a backslash.
                None => break,
            },
            _ => out.push(c),
        }
    }
    out
}

/// Prefer structured calls; otherwise parse inline calls out of `content`.
///
/// Returns the text content to keep and the calls to execute.
pub fn normalize_tool_calls(content: &str, structured: Vec<ToolCall>) -> (String, Vec<ToolCall>) {
    if !structured.is_empty() {
        return (content.to_string(), structured);
    }
    if !is_inline_tool_call_format(content) {
        return (content.to_string(), Vec::new());
    }
    let (calls, remaining) = parse_inline_tool_calls(content);
    (remaining, calls)
}

/// Pull code out of a plain-chat reply that was written as an inline
/// `write_file` call.
///
/// Returns `content` unchanged when it is not in the inline format or no
/// `content` field can be recovered.
pub fn extract_code(content: &str) -> String {
    if !is_inline_tool_call_format(content) {
        return content.to_string();
    }

    let (calls, _) = parse_inline_tool_calls(content);
    let from_calls = calls
        .iter()
        .filter(|c| c.function.name == names::WRITE_FILE)
        .find_map(|c| extract_string_field(&c.function.arguments, "content"))
        .filter(|code| !code.is_empty());

    from_calls
        .or_else(|| extract_string_field(content, "content").filter(|code| !code.is_empty()))
        .unwrap_or_else(|| content.to_string())
}

/// Recover reply text from structured calls when a plain chat reply came back
/// with empty content. Prefers `write_file` content, then `context_write`.
pub fn code_from_tool_calls(calls: &[ToolCall]) -> Option<String> {
    [names::WRITE_FILE, names::CONTEXT_WRITE]
        .iter()
        .find_map(|wanted| {
            calls
                .iter()
                .filter(|c| c.function.name == *wanted)
                .find_map(|c| extract_string_field(&c.function.arguments, "content"))
        })
        .filter(|s| !s.is_empty())
}

/// Rebuild an argument object from unparseable JSON text.
///
/// Each name in `fields` is looked up with [`extract_string_field`]; the ones
/// found become string properties. Returns `None` when nothing is recovered.
/// Values may be cut short if the text was truncated.
pub fn salvage_arguments(raw: &str, fields: &[String]) -> Option<Value> {
    let recovered: serde_json::Map<String, Value> = fields
        .iter()
        .filter_map(|f| extract_string_field(raw, f).map(|v| (f.clone(), Value::String(v))))
        .collect();

    if recovered.is_empty() {
        return None;
    }
    warn!(
        "Recovered {} field(s) from malformed tool arguments ({} bytes)",
        recovered.len(),
        raw.len()
    );
    Some(Value::Object(recovered))
}
