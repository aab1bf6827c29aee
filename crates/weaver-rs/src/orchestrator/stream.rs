//! Attributed output chunks for streamed turns.
//!
//! A streamed turn is a sequence of [`OutputChunk`]s. Each agent's text
//! arrives as one or more content chunks followed by a `done` marker when
//! control passes to another speaker. [`spawn_chat_stream`] runs a turn on a
//! background task and hands back the receiving end of a bounded channel.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::DelegationOrchestrator;
use crate::error::Result;

/// Capacity of the chunk channel used by [`spawn_chat_stream`].
pub const STREAM_CAPACITY: usize = 100;

/// Who produced a chunk. `System` carries notices from the orchestrator
/// itself, such as an unreachable Junior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Senior,
    Junior,
    System,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Senior => write!(f, "senior"),
            Speaker::Junior => write!(f, "junior"),
            Speaker::System => write!(f, "system"),
        }
    }
}

/// A piece of streamed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputChunk {
    pub agent: Speaker,
    pub content: String,
    /// `agent` has finished speaking; `content` is empty.
    pub done: bool,
}

impl OutputChunk {
    pub fn text(agent: Speaker, content: impl Into<String>) -> Self {
        Self {
            agent,
            content: content.into(),
            done: false,
        }
    }

    pub fn done(agent: Speaker) -> Self {
        Self {
            agent,
            content: String::new(),
            done: true,
        }
    }
}

/// Run one streamed turn on a background task.
///
/// The task holds the orchestrator lock for the whole turn and is the only
/// producer on the returned channel, which closes when the turn ends. The
/// join handle yields the turn's result.
pub fn spawn_chat_stream(
    orchestrator: Arc<Mutex<DelegationOrchestrator>>,
    message: impl Into<String>,
    cancel: CancellationToken,
) -> (mpsc::Receiver<OutputChunk>, JoinHandle<Result<()>>) {
    let message = message.into();
    let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut orchestrator = orchestrator.lock().await;
        orchestrator.chat_stream(&message, &cancel, &tx).await
    });
    (rx, handle)
}

/// Rebuild each speaker's full text from a chunk sequence.
///
/// Content is concatenated until the next `done` marker. Text left over
/// without a marker (a turn that ended early) is still returned.
pub fn assemble_turns(chunks: &[OutputChunk]) -> Vec<(Speaker, String)> {
    let mut turns = Vec::new();
    let mut current: Option<(Speaker, String)> = None;

    for chunk in chunks {
        if chunk.done {
            match current.take() {
                Some((speaker, text)) if speaker == chunk.agent => turns.push((speaker, text)),
                Some(other) => {
                    turns.push(other);
                    turns.push((chunk.agent, String::new()));
                }
                None => turns.push((chunk.agent, String::new())),
            }
            continue;
        }
        match current.as_mut() {
            Some((speaker, text)) if *speaker == chunk.agent => text.push_str(&chunk.content),
            _ => {
                if let Some(prev) = current.replace((chunk.agent, chunk.content.clone())) {
                    turns.push(prev);
                }
            }
        }
    }
    if let Some(rest) = current {
        turns.push(rest);
    }
    turns
}
