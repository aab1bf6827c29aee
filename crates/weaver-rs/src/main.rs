//! Talk to a Senior agent that can delegate work to a local Junior model.
//!
//! Senior runs through the `claude` CLI; Junior is any OpenAI-compatible
//! server (Ollama, LM Studio, llama.cpp).
//!
//! # Examples
//!
//! ```sh
//! # One-shot
//! weaver --prompt "Write a fizzbuzz function in Python"
//!
//! # Interactive, streaming, against LM Studio
//! weaver --stream --junior-url http://localhost:1234/v1 \
//!   --junior-model devstral-small-2 --junior-context 32768
//!
//! # Junior without tools, confined to another project
//! weaver --workdir ~/src/project --no-tools
//! ```
//!
//! In interactive mode, `/local <message>` talks to Junior directly, `/agents`
//! shows availability, `/notes` prints the shared notes, `/clear` resets both
//! histories and `/quit` exits. Ctrl-C cancels the running turn.

use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use weaver_rs::prelude::*;

/// Senior/Junior delegation from the terminal.
#[derive(Parser)]
#[command(name = "weaver")]
struct Cli {
    /// Run a single turn with this message and exit
    #[arg(long)]
    prompt: Option<String>,

    // ── Junior ─────────────────────────────────────────────────
    /// Base URL of the OpenAI-compatible Junior server
    #[arg(long, default_value = "http://localhost:11434/v1")]
    junior_url: String,

    /// Junior model name
    #[arg(long, default_value = "gpt-oss:20b")]
    junior_model: String,

    /// Junior context window in tokens
    #[arg(long, default_value_t = 131_072)]
    junior_context: usize,

    /// Do not give Junior file and command tools
    #[arg(long)]
    no_tools: bool,

    // ── Senior ─────────────────────────────────────────────────
    /// Senior CLI binary
    #[arg(long, default_value = "claude")]
    senior_bin: String,

    /// Maximum Junior delegations per turn
    #[arg(long, default_value_t = 50)]
    max_delegations: usize,

    // ── Environment ────────────────────────────────────────────
    /// Directory Junior's tools are confined to (default: current directory)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Shared notes file (default: ~/.weaver/shared.json)
    #[arg(long)]
    notes: Option<PathBuf>,

    /// Print output as it is produced, attributed per agent
    #[arg(long)]
    stream: bool,
}

impl Cli {
    fn config(&self) -> Result<WeaverConfig, String> {
        let workdir = match &self.workdir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()
                .map_err(|e| format!("cannot determine working directory: {e}"))?,
        };
        let workdir = std::fs::canonicalize(&workdir)
            .map_err(|e| format!("invalid workdir '{}': {e}", workdir.display()))?;

        let mut config = WeaverConfig::default()
            .with_junior_url(&self.junior_url)
            .with_junior_model(&self.junior_model)
            .with_junior_context_limit(self.junior_context)
            .with_senior_bin(&self.senior_bin)
            .with_max_delegations(self.max_delegations)
            .with_tools(!self.no_tools)
            .with_workspace_root(workdir);
        if let Some(path) = &self.notes {
            config = config.with_notes_path(path);
        }
        Ok(config)
    }
}

// ── Turns ───────────────────────────────────────────────────────────

/// Run one turn, cancelling it on Ctrl-C.
async fn run_turn(
    weaver: &Arc<Mutex<DelegationOrchestrator>>,
    message: &str,
    stream: bool,
) -> Result<(), WeaverError> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n  [cancelling]");
                cancel.cancel();
            }
        })
    };

    let result = if stream {
        stream_turn(weaver, message, cancel).await
    } else {
        let reply = weaver.lock().await.chat(message, &cancel).await;
        reply.map(|text| println!("{text}"))
    };
    watcher.abort();
    result
}

async fn stream_turn(
    weaver: &Arc<Mutex<DelegationOrchestrator>>,
    message: &str,
    cancel: CancellationToken,
) -> Result<(), WeaverError> {
    let (mut rx, handle) = spawn_chat_stream(weaver.clone(), message, cancel);
    let mut speaking: Option<Speaker> = None;
    let mut stdout = std::io::stdout();

    while let Some(chunk) = rx.recv().await {
        if chunk.done {
            speaking = None;
            println!();
            continue;
        }
        if speaking != Some(chunk.agent) {
            println!("\n[{}]", chunk.agent);
            speaking = Some(chunk.agent);
        }
        print!("{}", chunk.content);
        let _ = stdout.flush();
    }

    match handle.await {
        Ok(result) => result,
        Err(e) => Err(WeaverError::Config(format!("stream task failed: {e}"))),
    }
}

/// Handle an interactive command. Returns `false` to exit.
async fn command(weaver: &Arc<Mutex<DelegationOrchestrator>>, line: &str) -> bool {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    match cmd {
        "/quit" | "/exit" => return false,
        "/clear" => {
            weaver.lock().await.clear_context();
            println!("Context cleared.");
        }
        "/agents" => {
            for agent in weaver.lock().await.list_agents().await {
                let status = if agent.available { "available" } else { "unavailable" };
                println!(
                    "  {:<7} {:<12} {} ({status})",
                    agent.role.to_string(),
                    agent.provider.to_string(),
                    agent.name
                );
            }
        }
        "/notes" => {
            let digest = weaver.lock().await.notes().format_for_prompt(20);
            if digest.is_empty() {
                println!("No shared notes.");
            } else {
                print!("{digest}");
            }
        }
        "/local" if !rest.trim().is_empty() => {
            let cancel = CancellationToken::new();
            let reply = weaver.lock().await.chat_junior_direct(rest.trim(), &cancel).await;
            match reply {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("Error: {e}"),
            }
        }
        _ => println!("Commands: /local <message>, /agents, /notes, /clear, /quit"),
    }
    true
}

async fn interactive(weaver: Arc<Mutex<DelegationOrchestrator>>, stream: bool) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: failed to read input: {e}");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('/') {
            if !command(&weaver, line).await {
                break;
            }
            continue;
        }
        if let Err(e) = run_turn(&weaver, line, stream).await {
            eprintln!("Error: {e}");
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match cli.config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };
    let weaver = match DelegationOrchestrator::from_config(config) {
        Ok(w) => Arc::new(Mutex::new(w)),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    match &cli.prompt {
        Some(prompt) => {
            if let Err(e) = run_turn(&weaver, prompt, cli.stream).await {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
        None => interactive(weaver, cli.stream).await,
    }
}
