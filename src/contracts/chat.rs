use async_trait::async_trait;

use crate::error::Result;

/// A single-turn chat request: one system instruction and one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
  pub model: String,
  pub system: String,
  pub user: String,
  pub temperature: f32,
  pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
  /// Raw model output, not yet trimmed.
  Text(String),
  /// The provider refused to answer. `reason` is whatever the provider said, if anything.
  Blocked { reason: Option<String> },
}

/// One wire dialect for talking to a text generation provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
  async fn complete(&self, request: &ChatRequest) -> Result<Completion>;
}
