//! Durable-store ports consumed by ingestion and the metrics fan-out.
//!
//! All durable state lives behind these ports; the worker itself keeps
//! nothing across invocations. Concurrency safety is delegated to the
//! backing store's conditional operations.

use std::{future::Future, pin::Pin};

use crate::{
    error::Error,
    models::{BackupResultMeta, BackupResultMetrics},
};

pub mod aws;

pub trait RecordStore: Send + Sync {
    /// Durably record one backup result. Must be re-enterable: recording the
    /// same backup id twice (duplicate queue delivery) is not an error.
    fn add_backup_result(
        &self,
        meta: &BackupResultMeta,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;
}

pub trait MetricsStore: Send + Sync {
    /// Apply a batch of per-backup metrics to one client's aggregates.
    ///
    /// Not required to be idempotent. Callers treat metrics as best-effort
    /// derived data and do not retry a failed increment.
    fn increment(
        &self,
        client_id: &str,
        batch: &[BackupResultMetrics],
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;
}
