//! The queue-delivered message type consumed by the ingestion worker.
//!
//! Messages are produced by the receiving front doors (HTTP post, inbound
//! email) and delivered at-least-once by the queue. A message is removed from
//! the queue only by acknowledging it with its delivery-scoped `ack_token`;
//! until then the queue's visibility timeout governs when it is delivered
//! again and `receive_count` grows by one per delivery.

use chrono::{DateTime, Utc};

/// One delivery of a queued backup result notification.
///
/// The worker never inspects `body` itself; interpreting it is the ingest
/// port's job. The delivery attributes (`receive_count`, `enqueued_at`) drive
/// the retry ceiling and log correlation.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    /// Queue-assigned message identifier, stable across redeliveries.
    pub id: String,
    /// Raw encoded payload, as produced by one of the front doors.
    pub body: String,
    /// How many times the queue has delivered this message without it being
    /// acknowledged. Starts at 1.
    pub receive_count: u32,
    /// When the producer enqueued the message.
    pub enqueued_at: DateTime<Utc>,
    /// Opaque handle required to delete this delivery from the queue.
    pub ack_token: String,
}

impl QueuedMessage {
    /// Stable ingestion id derived from the queue message id, used for log
    /// correlation and idempotent downstream writes. The queue does not
    /// guarantee exactly-once delivery, so this id does not enforce
    /// deduplication by itself.
    pub fn ingest_id(&self) -> String {
        format!("sqs:MessageId:{}", self.id)
    }
}
