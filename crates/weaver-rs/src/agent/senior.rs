//! Senior backed by the `claude` command-line tool.
//!
//! Each call runs the CLI in print mode with the rendered conversation on
//! stdin. The CLI keeps no state between calls, so the whole history is sent
//! every time as `User:` / `Assistant:` turns.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Agent, ChunkStream, Provider};
use crate::error::AgentError;
use crate::process::{ProcessError, ProcessLines, run_process, spawn_lines};
use crate::{Message, MessageRole};

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Senior agent that shells out to `claude -p`.
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    bin: String,
    system_prompt: String,
    timeout: Duration,
    context_limit: usize,
    skip_permissions: bool,
}

impl ClaudeCli {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            bin: "claude".to_string(),
            system_prompt: system_prompt.into(),
            timeout: Duration::from_secs(600),
            context_limit: 200_000,
            skip_permissions: false,
        }
    }

    /// Executable to run instead of `claude` on `PATH`.
    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_context_limit(mut self, tokens: usize) -> Self {
        self.context_limit = tokens;
        self
    }

    /// Pass `--dangerously-skip-permissions` so the CLI can use its own
    /// tools without prompting.
    pub fn with_skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    fn command(&self, streaming: bool) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-p");
        if streaming {
            cmd.args(["--verbose", "--output-format", "stream-json"]);
        } else {
            cmd.args(["--output-format", "json"]);
        }
        if self.skip_permissions {
            cmd.arg("--dangerously-skip-permissions");
        }
        if !self.system_prompt.is_empty() {
            cmd.arg("--system-prompt").arg(&self.system_prompt);
        }
        cmd
    }

    fn process_error(&self, err: ProcessError) -> AgentError {
        match err {
            ProcessError::TimedOut(limit) => AgentError::Timeout(limit),
            ProcessError::Cancelled => AgentError::Cancelled,
            ProcessError::Spawn(e) if e.kind() == std::io::ErrorKind::NotFound => {
                AgentError::Unavailable(format!("{} not found on PATH", self.bin))
            }
            other => AgentError::Process(other.to_string()),
        }
    }
}

/// Render `history` and `message` as a plain-text transcript ending with an
/// open `Assistant:` turn.
pub fn build_prompt(message: &str, history: &[Message]) -> String {
    let mut parts: Vec<String> = history
        .iter()
        .filter_map(|m| match m.role {
            MessageRole::System => Some(format!("System: {}", m.text())),
            MessageRole::User => Some(format!("User: {}", m.text())),
            MessageRole::Assistant => Some(format!("Assistant: {}", m.text())),
            MessageRole::Tool => None,
        })
        .collect();
    parts.push(format!("User: {message}"));
    parts.push("Assistant:".to_string());
    parts.join("\n\n")
}

#[derive(Deserialize)]
struct CliResult {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    is_error: bool,
}

/// Reply text from `--output-format json` output. Output that is not the
/// expected JSON object is returned as-is, trimmed.
pub fn parse_cli_output(stdout: &str) -> Result<String, AgentError> {
    match serde_json::from_str::<CliResult>(stdout.trim()) {
        Ok(CliResult {
            result: Some(result),
            is_error: true,
        }) => Err(AgentError::Process(format!("claude reported an error: {result}"))),
        Ok(CliResult {
            result: Some(result),
            ..
        }) => Ok(result),
        _ => Ok(stdout.trim().to_string()),
    }
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    result: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

/// Text carried by one `stream-json` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamText {
    /// Incremental text, or a non-JSON line passed through unchanged.
    Delta(String),
    /// The full reply from the closing `result` event.
    Final(String),
}

/// Text carried by one `stream-json` line, if any.
///
/// `content_block_delta` events give incremental text, the final event
/// carries `result`, and lines that are not JSON pass through unchanged.
pub fn parse_stream_line(line: &str) -> Option<StreamText> {
    if line.trim().is_empty() {
        return None;
    }
    let Ok(event) = serde_json::from_str::<StreamEvent>(line) else {
        return Some(StreamText::Delta(line.to_string()));
    };
    match event.event_type.as_str() {
        "content_block_delta" => event
            .delta
            .and_then(|d| d.text)
            .filter(|t| !t.is_empty())
            .map(StreamText::Delta),
        "message_delta" => None,
        _ => event
            .result
            .filter(|r| !r.is_empty())
            .map(StreamText::Final),
    }
}

#[async_trait]
impl Agent for ClaudeCli {
    fn name(&self) -> &str {
        "Claude Code"
    }

    fn provider(&self) -> Provider {
        Provider::ClaudeCode
    }

    fn context_limit(&self) -> usize {
        self.context_limit
    }

    async fn is_available(&self) -> bool {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--version");
        match run_process(cmd, None, AVAILABILITY_TIMEOUT, &CancellationToken::new()).await {
            Ok(out) => out.success(),
            Err(e) => {
                debug!("{} --version failed: {e}", self.bin);
                false
            }
        }
    }

    async fn chat(
        &self,
        message: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let prompt = build_prompt(message, history);
        debug!(
            "Senior request: history={}, prompt_bytes={}",
            history.len(),
            prompt.len()
        );

        let out = run_process(self.command(false), Some(prompt), self.timeout, cancel)
            .await
            .map_err(|e| self.process_error(e))?;
        if !out.success() {
            return Err(AgentError::Process(format!(
                "claude exited with {:?}: {}",
                out.exit_code,
                out.stderr.trim()
            )));
        }
        trace!("Senior raw output: {}", out.stdout);
        parse_cli_output(&out.stdout)
    }

    async fn chat_stream(
        &self,
        message: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<ChunkStream, AgentError> {
        let prompt = build_prompt(message, history);
        debug!(
            "Senior streaming request: history={}, prompt_bytes={}",
            history.len(),
            prompt.len()
        );

        let proc = spawn_lines(self.command(true), Some(prompt), self.timeout, cancel)
            .map_err(|e| self.process_error(e))?;
        let state = CliStream {
            proc: Some(proc),
            cli: self.clone(),
            streamed: false,
        };
        Ok(stream::unfold(state, next_chunk).boxed())
    }

    fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = prompt;
    }
}

struct CliStream {
    proc: Option<ProcessLines>,
    cli: ClaudeCli,
    /// Deltas were forwarded, so the closing `result` repeats them.
    streamed: bool,
}

async fn next_chunk(mut st: CliStream) -> Option<(Result<String, AgentError>, CliStream)> {
    loop {
        let proc = st.proc.as_mut()?;
        match proc.next_line().await {
            Ok(Some(line)) => {
                match parse_stream_line(&line) {
                    Some(StreamText::Delta(text)) => {
                        st.streamed = true;
                        return Some((Ok(text), st));
                    }
                    Some(StreamText::Final(text)) if !st.streamed => {
                        return Some((Ok(text), st));
                    }
                    _ => {}
                }
            }
            Ok(None) => {
                let proc = st.proc.take()?;
                return match proc.finish().await {
                    Ok(out) if out.success() => None,
                    Ok(out) => Some((
                        Err(AgentError::Process(format!(
                            "claude exited with {:?}: {}",
                            out.exit_code,
                            out.stderr.trim()
                        ))),
                        st,
                    )),
                    Err(e) => {
                        let err = st.cli.process_error(e);
                        Some((Err(err), st))
                    }
                };
            }
            Err(e) => {
                st.proc = None;
                let err = st.cli.process_error(e);
                return Some((Err(err), st));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write an executable shell script standing in for the CLI.
    fn fake_cli(dir: &tempfile::TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("fake-claude");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn prompt_rendering() {
        let history = vec![
            Message::system("## Previous Session Summary"),
            Message::user("hi"),
            Message::assistant_text("hello"),
        ];
        assert_eq!(
            build_prompt("next", &history),
            "System: ## Previous Session Summary\n\nUser: hi\n\nAssistant: hello\n\nUser: next\n\nAssistant:"
        );
        assert_eq!(build_prompt("only", &[]), "User: only\n\nAssistant:");
    }

    #[test]
    fn cli_output_parsing() {
        assert_eq!(
            parse_cli_output(r#"{"type":"result","result":"done"}"#).unwrap(),
            "done"
        );
        assert_eq!(parse_cli_output("  plain text \n").unwrap(), "plain text");
        assert!(parse_cli_output(r#"{"result":"quota","is_error":true}"#).is_err());
    }

    #[test]
    fn stream_line_parsing() {
        assert_eq!(
            parse_stream_line(r#"{"type":"content_block_delta","delta":{"text":"Hi"}}"#),
            Some(StreamText::Delta("Hi".into()))
        );
        assert_eq!(parse_stream_line(r#"{"type":"message_delta","result":"x"}"#), None);
        assert_eq!(
            parse_stream_line(r#"{"type":"result","result":"final"}"#),
            Some(StreamText::Final("final".into()))
        );
        assert_eq!(parse_stream_line(r#"{"type":"system","subtype":"init"}"#), None);
        assert_eq!(
            parse_stream_line("not json"),
            Some(StreamText::Delta("not json".into()))
        );
        assert_eq!(parse_stream_line(""), None);
    }

    #[test]
    fn command_flags() {
        let cli = ClaudeCli::new("be brief").with_skip_permissions(true);
        let cmd = cli.command(true);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-p",
                "--verbose",
                "--output-format",
                "stream-json",
                "--dangerously-skip-permissions",
                "--system-prompt",
                "be brief"
            ]
        );
    }

    #[tokio::test]
    async fn chat_reads_stdin_and_parses_result() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(
            &dir,
            r#"input=$(cat); printf '{"result": "%s"}' "$(echo "$input" | head -n 1)""#,
        );
        let cli = ClaudeCli::new("").with_bin(bin);
        let reply = cli
            .chat("ping", &[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply, "User: ping");
    }

    #[tokio::test]
    async fn chat_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(&dir, "echo 'not logged in' >&2; exit 1");
        let err = ClaudeCli::new("")
            .with_bin(bin)
            .chat("ping", &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not logged in"));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let cli = ClaudeCli::new("").with_bin("/nonexistent/claude-for-weaver");
        assert!(!cli.is_available().await);
        let err = cli
            .chat("x", &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Unavailable(_)));
    }

    #[tokio::test]
    async fn stream_emits_deltas_then_result() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(
            &dir,
            r#"cat > /dev/null
echo '{"type":"system","subtype":"init"}'
echo '{"type":"content_block_delta","delta":{"text":"Hel"}}'
echo '{"type":"content_block_delta","delta":{"text":"lo"}}'
echo '{"type":"message_delta"}'"#,
        );
        let chunks: Vec<String> = ClaudeCli::new("")
            .with_bin(bin)
            .chat_stream("hi", &[], &CancellationToken::new())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn stream_skips_result_after_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(
            &dir,
            r#"cat > /dev/null
echo '{"type":"content_block_delta","delta":{"text":"Hel"}}'
echo '{"type":"content_block_delta","delta":{"text":"lo"}}'
echo '{"type":"result","result":"Hello"}'"#,
        );
        let text: String = ClaudeCli::new("")
            .with_bin(bin)
            .chat_stream("hi", &[], &CancellationToken::new())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect::<Vec<_>>()
            .await
            .concat();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn stream_uses_result_without_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(
            &dir,
            r#"cat > /dev/null
echo '{"type":"system","subtype":"init"}'
echo '{"type":"result","result":"Whole reply"}'"#,
        );
        let chunks: Vec<String> = ClaudeCli::new("")
            .with_bin(bin)
            .chat_stream("hi", &[], &CancellationToken::new())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["Whole reply"]);
    }

    #[tokio::test]
    async fn stream_reports_exit_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(&dir, "cat > /dev/null; echo partial; exit 3");
        let items: Vec<Result<String, AgentError>> = ClaudeCli::new("")
            .with_bin(bin)
            .chat_stream("hi", &[], &CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(items[1].is_err());
    }
}
