use std::time::Duration;

use serde::Deserialize;

use crate::ingest::EmailSettings;

/// Runtime configuration, loaded from `BACKUP_CONSOLE_`-prefixed environment
/// variables. Only the receive queue URL is required; everything else falls
/// back to a documented default.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// URL of the queue that backup result notifications arrive on.
    pub queue_url: String,

    pub region: Option<String>,
    /// Override for non-AWS endpoints (local stacks, SQS-compatible servers).
    pub endpoint_url: Option<String>,

    pub backup_table: Option<String>,
    pub client_table: Option<String>,

    /// Total execution-time allotment for one worker invocation, in
    /// milliseconds.
    pub budget_ms: Option<u64>,

    pub email_topic_arn: Option<String>,
    pub email_prefix: Option<String>,
    pub email_domain: Option<String>,
}

impl Config {
    pub fn load() -> eyre::Result<Self> {
        Ok(envy::prefixed("BACKUP_CONSOLE_").from_env::<Self>()?)
    }

    pub fn backup_table(&self) -> &str {
        self.backup_table
            .as_ref()
            .map(|s| s.as_str())
            .unwrap_or("backup-results")
    }

    pub fn client_table(&self) -> &str {
        self.client_table
            .as_ref()
            .map(|s| s.as_str())
            .unwrap_or("backup-clients")
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms.unwrap_or(300_000))
    }

    pub fn email_settings(&self) -> EmailSettings {
        EmailSettings {
            topic_arn: self.email_topic_arn.clone(),
            prefix: self.email_prefix.clone().unwrap_or_default(),
            domain: self.email_domain.clone(),
        }
    }
}
