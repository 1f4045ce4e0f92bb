//! Turning one queued message into a durably recorded backup result.
//!
//! The ingest port is the seam between the drain loop and everything
//! downstream of it. Its error classification is what the loop's retry
//! policy keys off: `Error::InvalidPayload` means the message is poison and
//! gets discarded after one attempt, anything else counts against the
//! receive-count ceiling.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{
    error::Error, message::QueuedMessage, models::BackupResultMeta, store::RecordStore,
};

pub mod payload;

pub trait IngestPort: Send + Sync {
    /// Ingest one queued message. `ingest_id` is stable across redeliveries
    /// of the same message; implementations must be safe to call again for a
    /// message that was already ingested.
    fn ingest(
        &self,
        ingest_id: &str,
        message: &QueuedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<BackupResultMeta, Error>> + Send>>;
}

/// Settings for recognizing the email-notification producer format.
#[derive(Debug, Clone, Default)]
pub struct EmailSettings {
    /// Expected notification topic. When set, payloads from any other topic
    /// are rejected.
    pub topic_arn: Option<String>,
    /// Required prefix of the recipient local part, e.g. `backup-`.
    pub prefix: String,
    /// Receiving domain. When set, recipients on other domains are ignored.
    pub domain: Option<String>,
}

/// Default ingest port: extracts the backup result meta from the queue
/// payload and records it through the store port.
///
/// Recording uses a conditional write keyed on the backup id, so a
/// redelivered message that was already ingested lands as a no-op.
pub struct BackupResultIngestor {
    store: Arc<dyn RecordStore>,
    email: EmailSettings,
}

impl BackupResultIngestor {
    pub fn new(store: Arc<dyn RecordStore>, email: EmailSettings) -> Self {
        Self { store, email }
    }
}

impl IngestPort for BackupResultIngestor {
    fn ingest(
        &self,
        ingest_id: &str,
        message: &QueuedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<BackupResultMeta, Error>> + Send>> {
        let store = self.store.clone();
        let email = self.email.clone();
        let ingest_id = ingest_id.to_owned();
        let body = message.body.clone();

        Box::pin(async move {
            let queue_payload = payload::parse_queue_payload(&body)?;
            let meta = payload::extract_meta(&email, &queue_payload)?;

            tracing::debug!(%ingest_id, ?meta, "extracted backup result meta");

            store.add_backup_result(&meta).await?;

            Ok(meta)
        })
    }
}
