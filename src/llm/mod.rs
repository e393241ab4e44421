//! Oracle client layer
//!
//! - types: request/response/usage types
//! - client: the LlmClient trait and MockLlmClient
//! - anthropic: AnthropicClient over the messages API

pub mod anthropic;
pub mod client;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, MockLlmClient};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, Usage};
