//! # Travel Advisor
//!
//! A conversational travel assistant that routes queries to semantic search
//! over Mark Twain's "The Innocents Abroad", to a live weather lookup, or to
//! both, and composes one coherent answer.
//!
//! This library provides:
//! - An HTTP API for conversations and messages
//! - A query-routing agent loop over an injected reasoning capability
//! - A read-only semantic passage index and an OpenWeatherMap client
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a user message plus recent conversation history via the API
//! 2. Hand the context and tool schemas to the reasoning capability
//! 3. Execute proposed tool calls, feed results (or degradation notes) back
//! 4. Repeat until a final answer or the iteration cap forces synthesis
//!
//! The passage index is a prebuilt artifact produced by the `build-index`
//! binary; the server consumes it read-only.

pub mod agent;
pub mod api;
pub mod config;
pub mod format;
pub mod index;
pub mod llm;
pub mod store;
pub mod tools;
pub mod weather;

pub use config::Config;
