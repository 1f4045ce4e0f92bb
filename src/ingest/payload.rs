//! Extraction of backup result meta from queued message bodies.
//!
//! Two producer formats are recognized:
//!
//! - the direct HTTP-post wrapper queued by the receiving front door
//!   (`{"type":"BackupResult","backupId":…,"identifier":{…}}`), and
//! - the notification wrapper produced by inbound email receiving, where the
//!   identifier is encoded in the recipient address.
//!
//! A body that is not valid JSON, not an object, or matches neither format
//! is permanently invalid: redelivering it cannot help, so the caller
//! discards it instead of retrying.

use serde::Deserialize;

use crate::{
    error::Error,
    ingest::EmailSettings,
    models::{BackupResultIdentifier, BackupResultMeta, DeliveryType, QueuedBackupResult},
};

/// Parse the raw queue message body as a JSON object.
pub fn parse_queue_payload(body: &str) -> Result<serde_json::Value, Error> {
    let payload: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::invalid_payload(format!("invalid queue JSON ({e})")))?;

    if !payload.is_object() {
        return Err(Error::invalid_payload("invalid queue JSON (non-object)"));
    }

    Ok(payload)
}

/// Match the payload against the known producer formats.
///
/// Tries the HTTP-post wrapper first, then the email-notification wrapper.
/// Only when both extractors reject does the payload classify as permanently
/// invalid.
pub fn extract_meta(
    settings: &EmailSettings,
    payload: &serde_json::Value,
) -> Result<BackupResultMeta, Error> {
    let http_err = match extract_meta_http_post(payload) {
        Ok(meta) => return Ok(meta),
        Err(e) => e,
    };

    let email_err = match extract_meta_email(settings, payload) {
        Ok(meta) => return Ok(meta),
        Err(e) => e,
    };

    Err(Error::invalid_payload(format!(
        "unrecognized producer format (httppost: {http_err}; email: {email_err})"
    )))
}

fn extract_meta_http_post(payload: &serde_json::Value) -> Result<BackupResultMeta, Error> {
    let result: QueuedBackupResult = serde_json::from_value(payload.clone())
        .map_err(|e| Error::extract(format!("not an HTTP-post wrapper ({e})")))?;

    if result.kind != QueuedBackupResult::KIND {
        return Err(Error::extract(format!(
            "expected \"type\" {:?} to be {:?}",
            result.kind,
            QueuedBackupResult::KIND
        )));
    }

    if result.backup_id.is_empty() {
        return Err(Error::extract("expected \"backupId\" to be non-empty"));
    }

    Ok(BackupResultMeta::new(
        DeliveryType::HttpPost,
        result.identifier,
        result.backup_id,
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NotificationEnvelope {
    r#type: String,
    topic_arn: Option<String>,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceivedMailNotification {
    notification_type: String,
    mail: ReceivedMail,
    receipt: MailReceipt,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceivedMail {
    message_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MailReceipt {
    recipients: Vec<String>,
}

fn extract_meta_email(
    settings: &EmailSettings,
    payload: &serde_json::Value,
) -> Result<BackupResultMeta, Error> {
    let envelope: NotificationEnvelope = serde_json::from_value(payload.clone())
        .map_err(|e| Error::extract(format!("not a notification wrapper ({e})")))?;

    if envelope.r#type != "Notification" {
        return Err(Error::extract(format!(
            "expected \"Type\" {:?} to be \"Notification\"",
            envelope.r#type
        )));
    }

    if let Some(expected) = &settings.topic_arn {
        if envelope.topic_arn.as_deref() != Some(expected.as_str()) {
            return Err(Error::extract(format!(
                "expected \"TopicArn\" {:?} to be {expected:?}",
                envelope.topic_arn
            )));
        }
    }

    let notification: ReceivedMailNotification = serde_json::from_str(&envelope.message)
        .map_err(|e| Error::extract(format!("parse notification \"Message\" JSON: {e}")))?;

    if notification.notification_type != "Received" {
        return Err(Error::extract(format!(
            "expected \"notificationType\" {:?} to be \"Received\"",
            notification.notification_type
        )));
    }

    if notification.mail.message_id.is_empty() {
        return Err(Error::extract("expected \"mail.messageId\" to be non-empty"));
    }

    let mut valid = parse_email_recipients(&notification.receipt.recipients, settings);

    if valid.is_empty() {
        return Err(Error::extract("no valid recipients"));
    }

    if valid.len() > 1 {
        tracing::warn!(
            matching = valid.len(),
            "more than one matching recipient, using first"
        );
    }

    Ok(BackupResultMeta::new(
        DeliveryType::Email,
        valid.remove(0),
        format!("email/{}", notification.mail.message_id),
    ))
}

/// Parse identifiers out of recipient addresses of the form
/// `<prefix><clientId>-<clientKey>-<backupType>@<domain>`. Recipients that do
/// not match the configured prefix/domain are skipped.
pub fn parse_email_recipients(
    recipients: &[String],
    settings: &EmailSettings,
) -> Vec<BackupResultIdentifier> {
    recipients
        .iter()
        .filter_map(|recipient| {
            let recipient = recipient.trim().to_ascii_lowercase();
            let (local, domain) = recipient.rsplit_once('@')?;

            if let Some(expected) = &settings.domain {
                if !domain.eq_ignore_ascii_case(expected) {
                    return None;
                }
            }

            let identifier = local.strip_prefix(settings.prefix.as_str())?;

            let mut parts = identifier.splitn(3, '-');
            let (client_id, client_key, backup_type) =
                (parts.next()?, parts.next()?, parts.next()?);

            if client_id.is_empty() || client_key.is_empty() || backup_type.is_empty() {
                return None;
            }

            Some(BackupResultIdentifier {
                client_id: client_id.to_owned(),
                client_key: client_key.to_owned(),
                backup_type: backup_type.to_owned(),
            })
        })
        .collect()
}
