use serde::{Deserialize, Serialize};

/// How a backup result reached the system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryType {
    Email,
    HttpPost,
}

/// Identity a producer attaches to a backup result before it is verified.
///
/// Verification of the id/key pair against the client store happens outside
/// this crate; here the triple is only carried along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResultIdentifier {
    pub client_id: String,
    pub client_key: String,
    pub backup_type: String,
}

/// Describes a durably recorded backup result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResultMeta {
    pub delivery_type: DeliveryType,
    pub client_id: String,
    pub client_key: String,
    pub backup_type: String,
    pub backup_id: String,
}

impl BackupResultMeta {
    pub fn new(
        delivery_type: DeliveryType,
        identifier: BackupResultIdentifier,
        backup_id: impl Into<String>,
    ) -> Self {
        Self {
            delivery_type,
            client_id: identifier.client_id,
            client_key: identifier.client_key,
            backup_type: identifier.backup_type,
            backup_id: backup_id.into(),
        }
    }
}

/// Per-backup metric record extracted from one stored backup result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResultMetrics {
    pub backup_date: chrono::DateTime<chrono::Utc>,
    pub total_bytes: f64,
    pub total_items: f64,
    pub error_count: f64,
}

/// Wire format the HTTP-post front door uses when queueing a received backup
/// result. The ingest side parses queue bodies back into this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedBackupResult {
    #[serde(rename = "type")]
    pub kind: String,
    pub backup_id: String,
    pub identifier: BackupResultIdentifier,
}

impl QueuedBackupResult {
    pub const KIND: &'static str = "BackupResult";

    pub fn new(identifier: BackupResultIdentifier, backup_id: impl Into<String>) -> Self {
        Self {
            kind: Self::KIND.to_owned(),
            backup_id: backup_id.into(),
            identifier,
        }
    }
}
