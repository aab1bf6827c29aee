//! Server-Sent Events decoding for streamed chat completions.
//!
//! The response body is read with `reqwest::Response::chunk()` and fed into
//! [`SseDecoder`], which buffers partial lines and yields one event per
//! complete `data:` line. Each payload is an OpenAI-style completion chunk;
//! only `choices[0].delta.content` is of interest here.

use std::collections::VecDeque;

use serde::Deserialize;
use tracing::{trace, warn};

/// One decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseEvent {
    /// A text delta from `choices[0].delta.content`.
    Text(String),
    /// `data: [DONE]`.
    Done,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

/// Incremental line buffer for an SSE body.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: String,
    events: VecDeque<SseEvent>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw body bytes and decode every complete line.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        while !self.done
            && let Some(newline_pos) = self.buffer.find('\n')
        {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            self.decode_line(line.trim());
        }
    }

    /// Decode whatever is left after the body ends without a newline.
    pub fn finish(&mut self) {
        let rest = std::mem::take(&mut self.buffer);
        if !self.done {
            self.decode_line(rest.trim());
        }
    }

    pub fn next_event(&mut self) -> Option<SseEvent> {
        self.events.pop_front()
    }

    /// `[DONE]` has been seen; nothing after it is decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &str) {
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
            return;
        };
        if data == "[DONE]" {
            self.done = true;
            self.events.push_back(SseEvent::Done);
            return;
        }
        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => {
                let text = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta)
                    .and_then(|d| d.content)
                    .filter(|t| !t.is_empty());
                if let Some(text) = text {
                    trace!(len = text.len(), "SSE text delta");
                    self.events.push_back(SseEvent::Text(text));
                }
            }
            Err(e) => warn!("Skipping unparseable SSE payload: {e}"),
        }
    }
}
