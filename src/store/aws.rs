//! DynamoDB implementation of the record and metrics store ports.
//!
//! Backup results land in the backup table with a conditional put keyed on
//! the backup id, so a redelivered message that was already ingested is a
//! no-op rather than a duplicate row. Client metric totals are applied with
//! an atomic `ADD` update against the client table.

use std::{future::Future, pin::Pin};

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;

use crate::{
    config::Config,
    error::Error,
    models::{BackupResultMeta, BackupResultMetrics},
    store::{MetricsStore, RecordStore},
};

#[derive(Clone)]
pub struct DynamoStore {
    client: aws_sdk_dynamodb::Client,
    backup_table: String,
    client_table: String,
}

impl DynamoStore {
    pub fn new(client: aws_sdk_dynamodb::Client, config: &Config) -> Self {
        Self {
            client,
            backup_table: config.backup_table().to_owned(),
            client_table: config.client_table().to_owned(),
        }
    }
}

impl RecordStore for DynamoStore {
    fn add_backup_result(
        &self,
        meta: &BackupResultMeta,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send>> {
        let client = self.client.clone();
        let table = self.backup_table.clone();
        let meta = meta.clone();

        Box::pin(async move {
            let result = client
                .put_item()
                .table_name(table)
                .item("clientId", AttributeValue::S(meta.client_id.clone()))
                .item("backupId", AttributeValue::S(meta.backup_id.clone()))
                .item("createdDate", AttributeValue::S(Utc::now().to_rfc3339()))
                .item("backupType", AttributeValue::S(meta.backup_type.clone()))
                .item(
                    "deliveryType",
                    AttributeValue::S(meta.delivery_type.to_string()),
                )
                .condition_expression("attribute_not_exists(backupId)")
                .send()
                .await;

            match result {
                Ok(_) => Ok(()),
                // Already recorded by an earlier delivery of the same
                // message. The write is re-enterable, not a failure.
                Err(err)
                    if err
                        .as_service_error()
                        .is_some_and(|e| e.is_conditional_check_failed_exception()) =>
                {
                    tracing::debug!(
                        backup_id = %meta.backup_id,
                        "backup result already recorded, skipping"
                    );
                    Ok(())
                }
                Err(err) => Err(Error::internal(err)),
            }
        })
    }
}

impl MetricsStore for DynamoStore {
    fn increment(
        &self,
        client_id: &str,
        batch: &[BackupResultMetrics],
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send>> {
        let client = self.client.clone();
        let table = self.client_table.clone();
        let client_id = client_id.to_owned();

        let backup_count = batch.len() as f64;
        let total_bytes: f64 = batch.iter().map(|m| m.total_bytes).sum();
        let total_items: f64 = batch.iter().map(|m| m.total_items).sum();
        let error_count: f64 = batch.iter().map(|m| m.error_count).sum();

        Box::pin(async move {
            client
                .update_item()
                .table_name(table)
                .key("clientId", AttributeValue::S(client_id))
                .condition_expression("attribute_exists(clientId)")
                .update_expression(
                    "ADD backupCount :bc, totalBytes :tb, totalItems :ti, errorCount :ec",
                )
                .expression_attribute_values(":bc", AttributeValue::N(backup_count.to_string()))
                .expression_attribute_values(":tb", AttributeValue::N(total_bytes.to_string()))
                .expression_attribute_values(":ti", AttributeValue::N(total_items.to_string()))
                .expression_attribute_values(":ec", AttributeValue::N(error_count.to_string()))
                .send()
                .await
                .map_err(Error::internal)?;

            Ok(())
        })
    }
}
