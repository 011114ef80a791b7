// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Message-Queue Adapter
//!
//! Long-poll receive, visibility-timeout extension, and delete against an
//! SQS-shaped queue (§4.6).

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use episode_pipeline_domain::error::{WorkerError, WorkerResult};
use episode_pipeline_domain::services::message_queue::QueuedMessage;
use episode_pipeline_domain::services::MessageQueue;
use std::time::Duration;

pub struct SqsMessageQueue {
    client: Client,
    queue_url: String,
}

impl SqsMessageQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl MessageQueue for SqsMessageQueue {
    async fn receive_messages(&self, max_messages: u32, wait: Duration) -> WorkerResult<Vec<QueuedMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.min(10) as i32)
            .wait_time_seconds(wait.as_secs().min(20) as i32)
            .send()
            .await
            .map_err(|e| WorkerError::QueueError(format!("receive_message failed: {e}")))?;

        let messages = output
            .messages()
            .iter()
            .filter_map(|m| {
                let receipt_handle = m.receipt_handle()?.to_string();
                let body = m.body()?.to_string();
                Some(QueuedMessage { receipt_handle, body })
            })
            .collect();

        Ok(messages)
    }

    async fn change_message_visibility(&self, receipt_handle: &str, new_timeout: Duration) -> WorkerResult<()> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(new_timeout.as_secs() as i32)
            .send()
            .await
            .map_err(|e| WorkerError::QueueError(format!("change_message_visibility failed: {e}")))?;
        Ok(())
    }

    async fn delete_message(&self, receipt_handle: &str) -> WorkerResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| WorkerError::QueueError(format!("delete_message failed: {e}")))?;
        Ok(())
    }
}
