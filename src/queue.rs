//! The receive-queue contract consumed by the ingestion worker.
//!
//! The underlying queue delivers at-least-once: the same message can be
//! handed to two invocations under visibility-timeout expiry, and ingestion
//! must tolerate that. The worker holds at most one message in flight per
//! invocation and deletes a message only by acknowledging it.

use std::{future::Future, pin::Pin};

use crate::{error::Error, message::QueuedMessage};

pub mod aws;

pub trait QueuePort: Send + Sync {
    /// Request up to `max` messages. May return fewer, including none, even
    /// when messages exist.
    fn receive(
        &self,
        max: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<QueuedMessage>, Error>> + Send>>;

    /// Delete one delivery from the queue. After this the message is gone
    /// for good; never call it for a transiently failed message below the
    /// retry ceiling.
    fn acknowledge(
        &self,
        message: &QueuedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;

    /// Approximate backlog depth, for monitoring. Not used by the drain loop.
    fn count_available(&self) -> Pin<Box<dyn Future<Output = Result<u64, Error>> + Send>>;
}
