use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};

use backup_console::{
    error::Error, metrics::MetricsBatch, models::BackupResultMetrics, store::MetricsStore,
};
use serde_json::json;

#[derive(Default)]
struct FakeMetricsStore {
    applied: Mutex<Vec<(String, Vec<BackupResultMetrics>)>>,
    attempted: Mutex<Vec<String>>,
    fail_for: Option<String>,
}

impl FakeMetricsStore {
    fn failing_for(client_id: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_for: Some(client_id.to_owned()),
            ..Self::default()
        })
    }

    fn applied(&self) -> Vec<(String, Vec<BackupResultMetrics>)> {
        self.applied.lock().unwrap().clone()
    }

    fn attempted(&self) -> Vec<String> {
        let mut attempted = self.attempted.lock().unwrap().clone();
        attempted.sort();
        attempted
    }
}

impl MetricsStore for FakeMetricsStore {
    fn increment(
        &self,
        client_id: &str,
        batch: &[BackupResultMetrics],
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send>> {
        self.attempted.lock().unwrap().push(client_id.to_owned());

        let result = if self.fail_for.as_deref() == Some(client_id) {
            Err(Error::internal(eyre::eyre!("conditional write failed")))
        } else {
            self.applied
                .lock()
                .unwrap()
                .push((client_id.to_owned(), batch.to_vec()));
            Ok(())
        };

        Box::pin(async move { result })
    }
}

fn record(client_id: &str, total_bytes: f64) -> serde_json::Value {
    json!({
        "clientId": client_id,
        "backupDate": "2024-05-01T06:30:00Z",
        "totalBytes": total_bytes,
        "totalItems": 12.0,
        "errorCount": 0.0,
    })
}

#[tokio::test]
async fn failed_increment_does_not_abort_the_batch() {
    let batch = MetricsBatch::collect(&[record("client-a", 10.0), record("client-b", 20.0)]);
    let store = FakeMetricsStore::failing_for("client-a");

    batch.apply(store.as_ref()).await;

    assert_eq!(store.attempted(), vec!["client-a", "client-b"]);

    let applied = store.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].0, "client-b");
    assert_eq!(applied[0].1[0].total_bytes, 20.0);
}

#[tokio::test]
async fn malformed_records_are_skipped() {
    let records = [
        record("client-a", 10.0),
        json!({ "backupDate": "2024-05-01T06:30:00Z", "totalBytes": 1.0 }),
        json!({ "clientId": "", "backupDate": "2024-05-01T06:30:00Z",
                "totalBytes": 1.0, "totalItems": 1.0, "errorCount": 0.0 }),
        json!({ "clientId": "client-b", "backupDate": "not a date",
                "totalBytes": 1.0, "totalItems": 1.0, "errorCount": 0.0 }),
    ];

    let batch = MetricsBatch::collect(&records);
    assert_eq!(batch.valid_records(), 1);

    let store = Arc::new(FakeMetricsStore::default());
    batch.apply(store.as_ref()).await;

    assert_eq!(store.attempted(), vec!["client-a"]);
}

#[tokio::test]
async fn arrival_order_is_preserved_within_a_client() {
    let batch = MetricsBatch::collect(&[
        record("client-a", 1.0),
        record("client-b", 2.0),
        record("client-a", 3.0),
    ]);
    assert_eq!(batch.valid_records(), 3);

    let store = Arc::new(FakeMetricsStore::default());
    batch.apply(store.as_ref()).await;

    let applied = store.applied();
    let (_, client_a) = applied
        .iter()
        .find(|(client_id, _)| client_id == "client-a")
        .unwrap();

    let bytes: Vec<f64> = client_a.iter().map(|m| m.total_bytes).collect();
    assert_eq!(bytes, vec![1.0, 3.0]);
}

#[tokio::test]
async fn empty_batch_applies_nothing() {
    let batch = MetricsBatch::collect(&[]);
    assert!(batch.is_empty());
    assert_eq!(batch.valid_records(), 0);

    let store = Arc::new(FakeMetricsStore::default());
    batch.apply(store.as_ref()).await;

    assert!(store.attempted().is_empty());
}
