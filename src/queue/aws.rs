//! SQS implementation of the queue port.
//!
//! Thin wrapper over `aws-sdk-sqs`: receives with system attributes so the
//! delivery count and enqueue time survive the trip, deletes by receipt
//! handle, and exposes the producer-side send that the receiving front doors
//! use to hand work to the worker.

use std::{future::Future, pin::Pin};

use aws_sdk_sqs::types::{Message, MessageSystemAttributeName, QueueAttributeName};
use chrono::{DateTime, Utc};

use crate::{
    error::Error,
    message::QueuedMessage,
    models::{BackupResultIdentifier, QueuedBackupResult},
    queue::QueuePort,
};

#[derive(Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Queue a received backup result for ingestion. Producer side of the
    /// queue contract, called by the HTTP-post front door.
    pub async fn send_received_backup_result(
        &self,
        identifier: BackupResultIdentifier,
        backup_id: impl Into<String>,
    ) -> Result<String, Error> {
        let body = serde_json::to_string(&QueuedBackupResult::new(identifier, backup_id))
            .map_err(Error::internal)?;

        let out = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(Error::queue)?;

        Ok(out.message_id.unwrap_or_default())
    }

    fn convert(message: Message) -> Option<QueuedMessage> {
        let (Some(id), Some(ack_token)) = (message.message_id, message.receipt_handle) else {
            tracing::warn!("received SQS message without id or receipt handle, skipping");
            return None;
        };

        let attributes = message.attributes.unwrap_or_default();

        let receive_count = attributes
            .get(&MessageSystemAttributeName::ApproximateReceiveCount)
            .and_then(|count| count.parse().ok())
            .unwrap_or(1);

        let enqueued_at = attributes
            .get(&MessageSystemAttributeName::SentTimestamp)
            .and_then(|millis| millis.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        Some(QueuedMessage {
            id,
            body: message.body.unwrap_or_default(),
            receive_count,
            enqueued_at,
            ack_token,
        })
    }
}

impl QueuePort for SqsQueue {
    fn receive(
        &self,
        max: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<QueuedMessage>, Error>> + Send>> {
        let client = self.client.clone();
        let queue_url = self.queue_url.clone();

        Box::pin(async move {
            let out = client
                .receive_message()
                .queue_url(queue_url)
                .max_number_of_messages(max as i32)
                .message_system_attribute_names(MessageSystemAttributeName::All)
                .send()
                .await
                .map_err(Error::queue)?;

            Ok(out
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(Self::convert)
                .collect())
        })
    }

    fn acknowledge(
        &self,
        message: &QueuedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send>> {
        let client = self.client.clone();
        let queue_url = self.queue_url.clone();
        let receipt_handle = message.ack_token.clone();

        Box::pin(async move {
            client
                .delete_message()
                .queue_url(queue_url)
                .receipt_handle(receipt_handle)
                .send()
                .await
                .map_err(Error::queue)?;

            Ok(())
        })
    }

    fn count_available(&self) -> Pin<Box<dyn Future<Output = Result<u64, Error>> + Send>> {
        let client = self.client.clone();
        let queue_url = self.queue_url.clone();

        Box::pin(async move {
            let out = client
                .get_queue_attributes()
                .queue_url(queue_url)
                .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
                .send()
                .await
                .map_err(Error::queue)?;

            Ok(out
                .attributes
                .unwrap_or_default()
                .get(&QueueAttributeName::ApproximateNumberOfMessages)
                .and_then(|count| count.parse().ok())
                .unwrap_or(0))
        })
    }
}
