//! Streamed turn: print each agent's output as it arrives.
//!
//! Needs the `claude` CLI on PATH and a local OpenAI-compatible server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example stream_turn -- "Write a fizzbuzz function in Python"
//! ```

use std::io::Write;
use std::sync::Arc;

use tokio::sync::Mutex;
use weaver_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<(), WeaverError> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter("weaver_rs=info")
        .init();

    let message = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Write a fizzbuzz function in Python".to_string());

    let config = WeaverConfig::default()
        .with_junior_url("http://localhost:1234/v1")
        .with_junior_model("devstral-small-2")
        .with_junior_context_limit(32_768);
    let weaver = Arc::new(Mutex::new(DelegationOrchestrator::from_config(config)?));

    for agent in weaver.lock().await.list_agents().await {
        eprintln!("{} ({}): available={}", agent.role, agent.name, agent.available);
    }

    let (mut rx, handle) = spawn_chat_stream(weaver, message, CancellationToken::new());
    let mut current = None;
    while let Some(chunk) = rx.recv().await {
        if chunk.done {
            current = None;
            println!();
            continue;
        }
        if current != Some(chunk.agent) {
            println!("── {} ──", chunk.agent);
            current = Some(chunk.agent);
        }
        print!("{}", chunk.content);
        let _ = std::io::stdout().flush();
    }

    handle
        .await
        .map_err(|e| WeaverError::Config(format!("stream task failed: {e}")))?
}
