//! Context window management for the two agents.
//!
//! Senior and Junior keep separate histories with separate limits. The
//! [`manager`] module tracks each history's estimated size and decides whether
//! it should be compacted into a summary or truncated by dropping old turns.
//! The orchestrator acts on those decisions before every agent call.

pub mod manager;

pub use manager::{ContextConfig, ContextManager, estimate_tokens, message_tokens};
