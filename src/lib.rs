//! DebateIQ - AI Debate Arena backend
//!
//! A web service that lets a user converse with, or watch, LLM-backed personas
//! of historical figures in a structured debate format.
//!
//! ## Features
//!
//! - **Two debate modes:** user-vs-persona conversations and fully automatic
//!   persona-vs-persona exchanges
//! - **Judge scoring:** per-exchange evaluation across five criteria with
//!   fact-check records and running cumulative scores
//! - **Custom personas:** user-created figures grounded in Wikipedia extracts
//!   via a lightweight retrieval context
//! - **Live delivery:** identical event payloads over Server-Sent Events and
//!   WebSocket channels
//! - **Optional speech:** cached text-to-speech audio for persona replies
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the API server on the default bind address
//! debateiq serve
//!
//! # Custom bind/port
//! debateiq serve --bind 0.0.0.0 --port 8000
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod judge;
pub mod live;
pub mod orchestrator;
pub mod personas;
pub mod server;
pub mod speech;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use error::{ArenaError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
