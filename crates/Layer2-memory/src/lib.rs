//! # retain-memory
//!
//! 대화 세션별 메모리 - 최근 메시지는 원문 그대로, 오래된 메시지는 요약으로 유지
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Recent messages (full text)            │  last R messages
//! ├─────────────────────────────────────────┤
//! │  Summaries (head [...] tail)            │  at most S, most important kept
//! ├─────────────────────────────────────────┤
//! │  Forgotten                              │  importance ≤ retention threshold
//! └─────────────────────────────────────────┘
//! ```
//!
//! Compression runs when the recent window grows past the compression
//! threshold T. [`ContextBuilder`] renders a session for prompt injection and
//! falls back to a compact form when the estimate exceeds the token budget.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use retain_memory::{ConversationMemory, Role};
//! use retain_foundation::MemoryConfig;
//!
//! let memory = ConversationMemory::new(MemoryConfig::default())?;
//! memory.add_message("abc123", Role::User, "What is Python?");
//! memory.add_message("abc123", Role::Assistant, "A programming language.");
//!
//! let context = memory.get_context("abc123");
//! ```

pub mod context;
pub mod manager;
pub mod message;
pub mod scoring;
pub mod session;
pub mod snapshot;

pub use context::{estimate_tokens, ContextBuilder};
pub use manager::{ConversationMemory, SessionActivity, SessionAnalytics, SessionInfo};
pub use message::{summarize, Message, MessageSummary, Role};
pub use scoring::{extract_keywords, importance_score};
pub use session::{CompressionOutcome, SessionMemory, SessionMetadata};
pub use snapshot::{SessionSnapshot, SESSIONS_DIR};
