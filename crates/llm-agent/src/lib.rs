//! `llm-agent`: chat-completion and web-search clients for ideaflow.
//!
//! Every agent talks to a model through the [`ChatClient`] trait so the
//! pipeline can run against a real endpoint, a deterministic offline
//! backend, or a scripted sequence of replies in tests.
//!
//! ```text
//! CompletionRequest { messages, options }
//!     │
//!     ▼
//! dyn ChatClient ── OpenAiClient    POST <base>/chat/completions (JSON or SSE)
//!                ├─ OfflineClient   deterministic markdown, no network
//!                └─ ScriptedClient  queued replies, records requests
//!     │
//!     ▼
//! Completion { content, finish_reason, model, usage }
//! ```
//!
//! ```rust,ignore
//! use llm_agent::{ChatClient, ChatMessage, CompletionOptions, CompletionRequest, OpenAiClient};
//!
//! let client = OpenAiClient::new("https://api.openai.com/v1", Some(key));
//! let reply = client
//!     .complete(CompletionRequest::new(
//!         vec![ChatMessage::user("Summarize this idea")],
//!         CompletionOptions::default(),
//!     ))
//!     .await?;
//! println!("{}", reply.content);
//! ```

pub mod client;
pub mod error;
pub mod offline;
pub mod openai;
pub mod scripted;
pub mod search;
pub mod sse;
pub mod types;

pub use client::{ChatClient, DeltaSink};
pub use error::LlmError;
pub use offline::OfflineClient;
pub use openai::{OpenAiClient, DEFAULT_BASE_URL};
pub use scripted::ScriptedClient;
pub use search::{format_results, SearchClient, SearchResult};
pub use types::{ChatMessage, Completion, CompletionOptions, CompletionRequest, Role, TokenUsage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, LlmError>;
