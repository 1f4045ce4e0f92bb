use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};

use backup_console::{
    error::Error,
    ingest::IngestPort,
    message::QueuedMessage,
    models::{BackupResultMeta, DeliveryType},
    queue::QueuePort,
    worker::{BudgetClock, DrainStop, IngestWorker},
};
use chrono::Utc;

fn message(id: &str, receive_count: u32) -> QueuedMessage {
    QueuedMessage {
        id: id.to_owned(),
        body: "{}".to_owned(),
        receive_count,
        enqueued_at: Utc::now(),
        ack_token: format!("ack-{id}"),
    }
}

fn meta(backup_id: &str) -> BackupResultMeta {
    BackupResultMeta {
        delivery_type: DeliveryType::HttpPost,
        client_id: "client-a".to_owned(),
        client_key: "key".to_owned(),
        backup_type: "json".to_owned(),
        backup_id: backup_id.to_owned(),
    }
}

fn transient() -> Error {
    Error::internal(eyre::eyre!("backing store unavailable"))
}

#[derive(Default)]
struct FakeQueue {
    messages: Mutex<VecDeque<QueuedMessage>>,
    acked: Mutex<Vec<String>>,
    receive_calls: Mutex<u64>,
    fail_receive: bool,
    fail_acknowledge: bool,
}

impl FakeQueue {
    fn with_messages(messages: impl IntoIterator<Item = QueuedMessage>) -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(messages.into_iter().collect()),
            ..Self::default()
        })
    }

    fn acked(&self) -> Vec<String> {
        self.acked.lock().unwrap().clone()
    }

    fn receive_calls(&self) -> u64 {
        *self.receive_calls.lock().unwrap()
    }
}

impl QueuePort for FakeQueue {
    fn receive(
        &self,
        max: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<QueuedMessage>, Error>> + Send>> {
        *self.receive_calls.lock().unwrap() += 1;

        let result = if self.fail_receive {
            Err(Error::queue(eyre::eyre!("queue unavailable")))
        } else {
            let mut messages = self.messages.lock().unwrap();
            Ok((0..max).filter_map(|_| messages.pop_front()).collect())
        };

        Box::pin(async move { result })
    }

    fn acknowledge(
        &self,
        message: &QueuedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send>> {
        let result = if self.fail_acknowledge {
            Err(Error::queue(eyre::eyre!("delete failed")))
        } else {
            self.acked.lock().unwrap().push(message.id.clone());
            Ok(())
        };

        Box::pin(async move { result })
    }

    fn count_available(&self) -> Pin<Box<dyn Future<Output = Result<u64, Error>> + Send>> {
        let count = self.messages.lock().unwrap().len() as u64;
        Box::pin(async move { Ok(count) })
    }
}

/// Scripted ingest port: pops one prepared outcome per call, defaulting to
/// success.
#[derive(Default)]
struct FakeIngest {
    outcomes: Mutex<VecDeque<Result<BackupResultMeta, Error>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeIngest {
    fn with_outcomes(
        outcomes: impl IntoIterator<Item = Result<BackupResultMeta, Error>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: Mutex::default(),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl IngestPort for FakeIngest {
    fn ingest(
        &self,
        ingest_id: &str,
        message: &QueuedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<BackupResultMeta, Error>> + Send>> {
        self.calls.lock().unwrap().push(ingest_id.to_owned());

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(meta(&message.id)));

        Box::pin(async move { outcome })
    }
}

/// Budget clock returning a scripted sequence of remaining times, then a
/// fixed default.
struct FakeClock {
    values: Mutex<VecDeque<i64>>,
    default: i64,
}

impl FakeClock {
    fn unlimited() -> Self {
        Self::with_values([])
    }

    fn with_values(values: impl IntoIterator<Item = i64>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            default: 600_000,
        }
    }
}

impl BudgetClock for FakeClock {
    fn remaining_ms(&self) -> i64 {
        self.values
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default)
    }
}

#[tokio::test]
async fn drains_queue_to_empty() {
    let queue = FakeQueue::with_messages([message("m1", 1), message("m2", 1), message("m3", 1)]);
    let ingest = Arc::new(FakeIngest::default());

    let worker = IngestWorker::new(queue.clone(), ingest.clone());
    let summary = worker.drain(&FakeClock::unlimited()).await.unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.stopped, DrainStop::QueueEmpty);
    assert_eq!(queue.acked(), vec!["m1", "m2", "m3"]);
    assert_eq!(
        ingest.calls(),
        vec![
            "sqs:MessageId:m1",
            "sqs:MessageId:m2",
            "sqs:MessageId:m3",
        ]
    );
}

#[tokio::test]
async fn invalid_payload_is_discarded_after_one_attempt() {
    // Receive count well past the ceiling: invalid payloads are discarded
    // regardless of it.
    let queue = FakeQueue::with_messages([message("poison", 7)]);
    let ingest = FakeIngest::with_outcomes([Err(Error::invalid_payload("not json"))]);

    let worker = IngestWorker::new(queue.clone(), ingest.clone());
    let summary = worker.drain(&FakeClock::unlimited()).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.stopped, DrainStop::QueueEmpty);
    assert_eq!(queue.acked(), vec!["poison"]);
    assert_eq!(ingest.calls().len(), 1);
}

#[tokio::test]
async fn transient_failure_below_ceiling_is_not_acknowledged() {
    let queue = FakeQueue::with_messages([message("m1", 2)]);
    let ingest = FakeIngest::with_outcomes([Err(transient())]);

    let worker = IngestWorker::new(queue.clone(), ingest.clone());
    let result = worker.drain(&FakeClock::unlimited()).await;

    assert!(result.is_err());
    assert!(queue.acked().is_empty());
    // The loop stops on the unresolved failure: no further dequeues.
    assert_eq!(queue.receive_calls(), 1);
}

#[tokio::test]
async fn transient_failure_at_ceiling_is_discarded() {
    let queue = FakeQueue::with_messages([message("m1", 5)]);
    let ingest = FakeIngest::with_outcomes([Err(transient())]);

    let worker = IngestWorker::new(queue.clone(), ingest.clone());
    let summary = worker.drain(&FakeClock::unlimited()).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.stopped, DrainStop::QueueEmpty);
    assert_eq!(queue.acked(), vec!["m1"]);
}

#[tokio::test]
async fn yields_before_dequeue_when_budget_low() {
    let queue = FakeQueue::with_messages([message("m1", 1)]);
    let ingest = Arc::new(FakeIngest::default());

    let worker = IngestWorker::new(queue.clone(), ingest.clone());
    let summary = worker
        .drain(&FakeClock::with_values([1000]))
        .await
        .unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.stopped, DrainStop::BudgetExhausted);
    assert_eq!(queue.receive_calls(), 0);
    assert!(ingest.calls().is_empty());
}

#[tokio::test]
async fn budget_is_checked_before_every_dequeue() {
    let queue = FakeQueue::with_messages([message("m1", 1), message("m2", 1)]);
    let ingest = Arc::new(FakeIngest::default());

    let worker = IngestWorker::new(queue.clone(), ingest.clone());
    let summary = worker
        .drain(&FakeClock::with_values([10_000, 1000]))
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.stopped, DrainStop::BudgetExhausted);
    assert_eq!(queue.acked(), vec!["m1"]);
}

#[tokio::test]
async fn receive_failure_stops_without_failing_the_invocation() {
    let queue = Arc::new(FakeQueue {
        fail_receive: true,
        ..FakeQueue::default()
    });
    let ingest = Arc::new(FakeIngest::default());

    let worker = IngestWorker::new(queue.clone(), ingest.clone());
    let summary = worker.drain(&FakeClock::unlimited()).await.unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.stopped, DrainStop::ReceiveFailed);
}

#[tokio::test]
async fn acknowledge_failure_does_not_stop_the_drain() {
    let queue = Arc::new(FakeQueue {
        messages: Mutex::new([message("m1", 1), message("m2", 1)].into_iter().collect()),
        fail_acknowledge: true,
        ..FakeQueue::default()
    });
    let ingest = Arc::new(FakeIngest::default());

    let worker = IngestWorker::new(queue.clone(), ingest.clone());
    let summary = worker.drain(&FakeClock::unlimited()).await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.stopped, DrainStop::QueueEmpty);
    assert!(queue.acked().is_empty());
}
