//! Port for the SQS-shaped long-poll message queue (§4.6).

use crate::error::WorkerResult;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub receipt_handle: String,
    pub body: String,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-polls up to `max_messages`, waiting up to `wait` for at least one.
    async fn receive_messages(&self, max_messages: u32, wait: Duration) -> WorkerResult<Vec<QueuedMessage>>;

    /// Renews a message's visibility timeout; called by the per-message
    /// extender at `visibility_timeout * 0.5` intervals (§4.6, P6).
    async fn change_message_visibility(&self, receipt_handle: &str, new_timeout: Duration) -> WorkerResult<()>;

    /// Removed only after the orchestrator reports success or a durably
    /// recorded terminal failure (§4.6).
    async fn delete_message(&self, receipt_handle: &str) -> WorkerResult<()>;
}
