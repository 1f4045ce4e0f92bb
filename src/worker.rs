//! The ingestion drain loop.
//!
//! One invocation drains the receive queue message by message, at most one
//! in flight, until the queue is empty, the time budget runs out, or a
//! transient failure leaves a message that must be redelivered. The host is
//! expected to re-invoke the worker to continue; nothing carries over
//! between invocations.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{error::Error, ingest::IngestPort, queue::QueuePort};

/// Minimum remaining budget required to attempt another dequeue. Below this
/// the loop yields so the host can resume draining in a fresh invocation.
pub const MIN_REMAINING_MS: i64 = 4000;

/// Deliveries after which a transiently failing message is given up on and
/// deleted instead of left for redelivery.
pub const MAX_RECEIVE_COUNT: u32 = 5;

/// Remaining execution time before the hosting invocation is forcibly
/// terminated.
pub trait BudgetClock: Send + Sync {
    fn remaining_ms(&self) -> i64;
}

/// Budget clock counting down from a fixed allotment starting now.
pub struct InvocationBudget {
    deadline: Instant,
}

impl InvocationBudget {
    pub fn starting_now(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
        }
    }
}

impl BudgetClock for InvocationBudget {
    fn remaining_ms(&self) -> i64 {
        self.deadline
            .saturating_duration_since(Instant::now())
            .as_millis() as i64
    }
}

/// Why a drain invocation stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStop {
    /// The queue returned no messages. Terminal success.
    QueueEmpty,
    /// Remaining budget fell below [`MIN_REMAINING_MS`]. Cooperative yield;
    /// the host should re-invoke to continue.
    BudgetExhausted,
    /// A dequeue attempt failed. Logged and not surfaced as an invocation
    /// failure; the backlog is untouched and a later invocation will retry.
    ReceiveFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    /// Messages removed from the queue this invocation (ingested, poison, or
    /// retry-exhausted).
    pub processed: u64,
    pub stopped: DrainStop,
}

pub struct IngestWorker {
    queue: Arc<dyn QueuePort>,
    ingest: Arc<dyn IngestPort>,
}

impl IngestWorker {
    pub fn new(queue: Arc<dyn QueuePort>, ingest: Arc<dyn IngestPort>) -> Self {
        Self { queue, ingest }
    }

    /// Drain the queue until one of the exit conditions holds.
    ///
    /// Returns `Err` only for a transient ingest failure below the retry
    /// ceiling: the message is deliberately NOT acknowledged so the queue
    /// redelivers it, and the host observes a failed invocation. Invalid
    /// payloads and retry-exhausted messages are handled locally and deleted
    /// so they cannot block the queue.
    pub async fn drain(&self, clock: &dyn BudgetClock) -> Result<DrainSummary, Error> {
        let mut processed = 0u64;

        loop {
            let remaining_ms = clock.remaining_ms();
            if remaining_ms < MIN_REMAINING_MS {
                tracing::debug!(
                    remaining_ms,
                    threshold_ms = MIN_REMAINING_MS,
                    "not enough remaining time to ingest more"
                );
                return Ok(DrainSummary {
                    processed,
                    stopped: DrainStop::BudgetExhausted,
                });
            }

            tracing::debug!("dequeuing message");
            let started = Instant::now();

            let messages = match self.queue.receive(1).await {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::error!(%err, "failed to dequeue received backup result");
                    return Ok(DrainSummary {
                        processed,
                        stopped: DrainStop::ReceiveFailed,
                    });
                }
            };

            let Some(message) = messages.into_iter().next() else {
                tracing::debug!("nothing returned from queue");
                return Ok(DrainSummary {
                    processed,
                    stopped: DrainStop::QueueEmpty,
                });
            };

            let ingest_id = message.ingest_id();

            tracing::debug!(
                %ingest_id,
                enqueued_at = %message.enqueued_at,
                receive_count = message.receive_count,
                "dequeued message"
            );

            match self.ingest.ingest(&ingest_id, &message).await {
                Ok(meta) => {
                    tracing::info!(
                        %ingest_id,
                        ingest_duration_ms = started.elapsed().as_millis() as u64,
                        ?meta,
                        "ingested message"
                    );
                }
                Err(err) if err.is_invalid_payload() => {
                    tracing::error!(
                        %err,
                        %ingest_id,
                        "dequeued message has invalid backup result payload"
                    );
                }
                Err(err) if message.receive_count >= MAX_RECEIVE_COUNT => {
                    tracing::error!(
                        %err,
                        %ingest_id,
                        enqueued_at = %message.enqueued_at,
                        receive_count = message.receive_count,
                        "dequeued message failed too many times"
                    );
                }
                // Transient failure below the ceiling: leave the message on
                // the queue and surface the failure to the host.
                Err(err) => return Err(err),
            }

            if let Err(err) = self.queue.acknowledge(&message).await {
                // The message will come back; ingestion is re-enterable.
                tracing::error!(%err, %ingest_id, "failed to acknowledge message");
            }

            processed += 1;
        }
    }
}
