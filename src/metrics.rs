//! Per-client fan-out of backup result metrics.
//!
//! Consumes a batch of "backup result stored" change events, groups them by
//! client, and applies one aggregation update per client. Metrics are
//! derived, best-effort data: a malformed event or a failed increment is
//! logged and skipped, never propagated, because the underlying backup
//! records were durably stored before this runs and must not be redelivered
//! over a metrics problem.

use std::collections::HashMap;

use itertools::Itertools as _;
use serde::Deserialize;

use crate::{models::BackupResultMetrics, store::MetricsStore};

/// One "backup result stored" change event as emitted by the backup table's
/// change stream.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeRecord {
    client_id: String,
    #[serde(flatten)]
    metrics: BackupResultMetrics,
}

/// Per-backup metrics for one batch of change events, keyed by client.
#[derive(Debug, Default)]
pub struct MetricsBatch {
    by_client: HashMap<String, Vec<BackupResultMetrics>>,
    valid_records: usize,
    total_records: usize,
}

impl MetricsBatch {
    /// Validate and group a batch of raw change events.
    ///
    /// Events that fail to deserialize or carry an empty client id are
    /// logged and skipped; they never abort the batch. Arrival order is
    /// preserved within each client's group.
    pub fn collect(records: &[serde_json::Value]) -> Self {
        let valid: Vec<(String, BackupResultMetrics)> = records
            .iter()
            .filter_map(|record| {
                let parsed: ChangeRecord = match serde_json::from_value(record.clone()) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        tracing::error!(%err, %record, "invalid metrics change record");
                        return None;
                    }
                };

                if parsed.client_id.is_empty() {
                    tracing::error!(%record, "invalid metrics change record (empty clientId)");
                    return None;
                }

                Some((parsed.client_id, parsed.metrics))
            })
            .collect();

        let valid_records = valid.len();

        Self {
            by_client: valid.into_iter().into_group_map(),
            valid_records,
            total_records: records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_client.is_empty()
    }

    pub fn valid_records(&self) -> usize {
        self.valid_records
    }

    /// Apply the batch, one client at a time.
    ///
    /// Clients are updated sequentially to bound concurrent writes against
    /// the backing store. A failed increment is logged and lost; the
    /// remaining clients still get theirs, and the call itself never fails.
    pub async fn apply(self, store: &dyn MetricsStore) {
        for (client_id, batch) in self.by_client {
            tracing::debug!(
                %client_id,
                backups = batch.len(),
                "incrementing backup result metrics for client"
            );

            if let Err(err) = store.increment(&client_id, &batch).await {
                tracing::error!(%err, %client_id, "failed to increment client metrics");
            }
        }

        tracing::debug!(
            valid = self.valid_records,
            total = self.total_records,
            "processed metrics change records"
        );
    }
}
