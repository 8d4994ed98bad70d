/// Collaborator contracts the coordinator consumes.
///
/// All three are implemented outside this crate. The coordinator holds
/// them behind optional slots and degrades gracefully when one is
/// absent: missing display falls back to logging, missing approval
/// denies by default.
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use modkit_core::types::MessageLevel;
use modkit_hooks::ApprovalRequest;

/// A message forwarded to the context manager, with provenance metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Conversation history owner. Must not reorder messages relative to
/// insertion.
#[async_trait]
pub trait ContextManager: Send + Sync {
    async fn add_message(&self, message: ContextMessage) -> Result<()>;
}

/// User approval prompt owner. Must return one of the request's options
/// within its timeout, or apply its default.
#[async_trait]
pub trait ApprovalSystem: Send + Sync {
    async fn request_approval(&self, request: &ApprovalRequest) -> Result<String>;
}

/// User-facing notice sink. Fire-and-forget; failures stay inside the
/// implementation.
#[async_trait]
pub trait DisplaySystem: Send + Sync {
    async fn show_message(&self, text: &str, level: MessageLevel);
}
