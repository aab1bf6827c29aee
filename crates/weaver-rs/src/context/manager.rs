//! Per-agent conversation history with a running token estimate.
//!
//! Each agent owns one [`ContextManager`]. When the estimate crosses
//! `compact_at * max_tokens`, the manager reports whether the history should
//! be **compacted** (the agent summarizes it and the summary replaces it) or
//! **truncated** (oldest non-system messages are dropped). Models whose window
//! is smaller than `min_tokens_for_compaction` are truncated, since asking
//! them for a useful summary of a nearly full window rarely works.

use crate::{Message, MessageRole};

/// Fraction of `max_tokens` that [`ContextManager::truncate`] trims down to.
const TRUNCATE_TARGET: f64 = 0.6;

/// Non-system messages kept by truncation no matter how large they are.
const MIN_KEPT_MESSAGES: usize = 2;

const SUMMARY_HEADER: &str = "## Previous Session Summary\n\n";
const SUMMARY_FOOTER: &str = "\n\n---\nContinuing conversation...";

const COMPACTION_PROMPT: &str = "\
Summarize this conversation so far. Preserve:
- Key decisions made
- Current task state
- Important code/file references
- File paths mentioned
- Any errors or issues encountered
- Notes for the Junior/Senior Engineer

Keep it dense but complete. This summary will start the next conversation.";

/// Rough token count: four characters per token.
pub fn estimate_tokens(s: &str) -> usize {
    s.chars().count() / 4
}

/// Token estimate for one message, including any tool-call arguments.
pub fn message_tokens(message: &Message) -> usize {
    let calls = message
        .tool_calls
        .iter()
        .flatten()
        .map(|c| estimate_tokens(&c.function.arguments))
        .sum::<usize>();
    estimate_tokens(message.text()) + calls
}

/// Thresholds for one agent's context window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextConfig {
    /// Model context limit in tokens.
    pub max_tokens: usize,
    /// Fraction of `max_tokens` at which to compact or truncate.
    pub compact_at: f64,
    /// Windows smaller than this are truncated instead of compacted.
    pub min_tokens_for_compaction: usize,
}

impl ContextConfig {
    /// Senior preset: 200k window, always compacts.
    pub fn senior() -> Self {
        Self::senior_with_limit(200_000)
    }

    pub fn senior_with_limit(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            compact_at: 0.8,
            min_tokens_for_compaction: 0,
        }
    }

    /// Local-model preset: compacts only when the window is at least 32k.
    pub fn local(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            compact_at: 0.8,
            min_tokens_for_compaction: 32_000,
        }
    }

    fn threshold(&self) -> f64 {
        self.max_tokens as f64 * self.compact_at
    }
}

/// Ordered message history for one agent.
#[derive(Debug, Clone)]
pub struct ContextManager {
    config: ContextConfig,
    messages: Vec<Message>,
    estimated_tokens: usize,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            messages: Vec::new(),
            estimated_tokens: 0,
        }
    }

    pub fn add(&mut self, message: Message) {
        self.estimated_tokens += message_tokens(&message);
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn estimated_tokens(&self) -> usize {
        self.estimated_tokens
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Swap thresholds while keeping the history, e.g. after a model change.
    pub fn reconfigure(&mut self, config: ContextConfig) {
        self.config = config;
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn should_compact(&self) -> bool {
        if self.config.max_tokens < self.config.min_tokens_for_compaction {
            return false;
        }
        self.estimated_tokens as f64 > self.config.threshold()
    }

    pub fn should_truncate(&self) -> bool {
        if self.config.max_tokens >= self.config.min_tokens_for_compaction {
            return false;
        }
        self.estimated_tokens as f64 > self.config.threshold()
    }

    /// Drop the oldest non-system messages until the estimate is at or below
    /// 60% of the window, always keeping the two most recent. System messages
    /// move to the front in their original order.
    pub fn truncate(&mut self) {
        let target = (self.config.max_tokens as f64 * TRUNCATE_TARGET) as usize;
        let (system, mut other): (Vec<Message>, Vec<Message>) = std::mem::take(&mut self.messages)
            .into_iter()
            .partition(|m| m.role == MessageRole::System);

        let mut drop = 0;
        while self.estimated_tokens > target && other.len() - drop > MIN_KEPT_MESSAGES {
            self.estimated_tokens -= message_tokens(&other[drop]);
            drop += 1;
        }
        other.drain(..drop);

        self.messages = system;
        self.messages.extend(other);
    }

    /// Replace the whole history with a single system message carrying
    /// `summary`.
    pub fn reset_with_summary(&mut self, summary: &str) {
        let message = Message::system(format!("{SUMMARY_HEADER}{summary}{SUMMARY_FOOTER}"));
        self.estimated_tokens = message_tokens(&message);
        self.messages = vec![message];
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.estimated_tokens = 0;
    }

    pub fn compaction_prompt(&self) -> &'static str {
        COMPACTION_PROMPT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recount(ctx: &ContextManager) -> usize {
        ctx.messages().iter().map(message_tokens).sum()
    }

    #[test]
    fn estimate_is_four_chars_per_token() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }

    #[test]
    fn add_tracks_estimate() {
        let mut ctx = ContextManager::new(ContextConfig::senior());
        ctx.add(Message::user("x".repeat(40)));
        ctx.add(Message::assistant_text("y".repeat(80)));
        assert_eq!(ctx.estimated_tokens(), 30);
        assert_eq!(ctx.estimated_tokens(), recount(&ctx));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn compact_and_truncate_are_exclusive() {
        let mut big = ContextManager::new(ContextConfig::local(64_000));
        big.add(Message::user("x".repeat(4 * 60_000)));
        assert!(big.should_compact());
        assert!(!big.should_truncate());

        let mut small = ContextManager::new(ContextConfig::local(8_000));
        small.add(Message::user("x".repeat(4 * 7_000)));
        assert!(small.should_truncate());
        assert!(!small.should_compact());
    }

    #[test]
    fn below_threshold_does_nothing() {
        let mut ctx = ContextManager::new(ContextConfig::local(8_000));
        ctx.add(Message::user("x".repeat(4 * 6_000)));
        assert!(!ctx.should_truncate());
        assert!(!ctx.should_compact());
    }

    #[test]
    fn truncate_drops_oldest_and_moves_system_first() {
        let mut ctx = ContextManager::new(ContextConfig::local(1_000));
        ctx.add(Message::user("a".repeat(1_600)));
        ctx.add(Message::system("rules"));
        ctx.add(Message::assistant_text("b".repeat(1_600)));
        ctx.add(Message::user("c".repeat(400)));
        ctx.add(Message::assistant_text("d".repeat(400)));
        assert!(ctx.should_truncate());

        ctx.truncate();

        let texts: Vec<&str> = ctx.messages().iter().map(|m| m.text()).collect();
        assert_eq!(texts[0], "rules");
        assert_eq!(ctx.messages()[0].role, MessageRole::System);
        assert_eq!(ctx.len(), 3);
        assert!(ctx.estimated_tokens() <= 600);
        assert_eq!(ctx.estimated_tokens(), recount(&ctx));
    }

    #[test]
    fn truncate_keeps_two_newest_even_over_target() {
        let mut ctx = ContextManager::new(ContextConfig::local(100));
        for _ in 0..5 {
            ctx.add(Message::user("z".repeat(4_000)));
        }
        ctx.truncate();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.estimated_tokens(), 2_000);
    }

    #[test]
    fn reset_with_summary_replaces_history() {
        let mut ctx = ContextManager::new(ContextConfig::senior());
        for i in 0..10 {
            ctx.add(Message::user(format!("message {i}")));
        }
        ctx.reset_with_summary("we built fizzbuzz");

        assert_eq!(ctx.len(), 1);
        let only = &ctx.messages()[0];
        assert_eq!(only.role, MessageRole::System);
        assert!(only.text().starts_with("## Previous Session Summary\n\n"));
        assert!(only.text().contains("we built fizzbuzz"));
        assert!(only.text().ends_with("Continuing conversation..."));
        assert_eq!(ctx.estimated_tokens(), recount(&ctx));
        let overhead = ctx.estimated_tokens() - estimate_tokens("we built fizzbuzz");
        assert!((15..=16).contains(&overhead));
    }

    #[test]
    fn clear_resets_estimate() {
        let mut ctx = ContextManager::new(ContextConfig::senior());
        ctx.add(Message::user("hello world!"));
        ctx.clear();
        assert!(ctx.is_empty());
        assert_eq!(ctx.estimated_tokens(), 0);
    }

    #[test]
    fn reconfigure_keeps_history() {
        let mut ctx = ContextManager::new(ContextConfig::local(131_072));
        ctx.add(Message::user("x".repeat(4 * 10_000)));
        ctx.reconfigure(ContextConfig::local(8_192));
        assert_eq!(ctx.len(), 1);
        assert!(ctx.should_truncate());
    }

    #[test]
    fn compaction_prompt_asks_to_preserve_state() {
        let ctx = ContextManager::new(ContextConfig::senior());
        let prompt = ctx.compaction_prompt();
        assert!(prompt.contains("Key decisions"));
        assert!(prompt.contains("File paths"));
    }
}
