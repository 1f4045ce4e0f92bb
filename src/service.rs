use std::{sync::Arc, time::Duration};

use aws_config::{BehaviorVersion, Region};

use crate::{
    config::Config,
    error::Error,
    ingest::BackupResultIngestor,
    models::BackupResultIdentifier,
    queue::{aws::SqsQueue, QueuePort},
    store::RecordStore,
    worker::{BudgetClock, DrainSummary, IngestWorker, InvocationBudget},
};

/// Build the shared AWS SDK config, honoring the region and endpoint
/// overrides from [`Config`].
pub async fn sdk_config(config: &Config) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}

/// Wires the queue adapter, the ingestor, and the drain loop together.
///
/// Collaborators are injected, not discovered: the record store comes from
/// the caller so tests and alternative hosts can substitute their own.
pub struct Service {
    config: Config,
    queue: Arc<SqsQueue>,
    worker: IngestWorker,
}

impl Service {
    pub async fn connect_with(config: Config, store: Arc<dyn RecordStore>) -> eyre::Result<Self> {
        let sdk = sdk_config(&config).await;
        Ok(Self::with_sdk_config(config, &sdk, store))
    }

    pub fn with_sdk_config(
        config: Config,
        sdk: &aws_config::SdkConfig,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        let queue = Arc::new(SqsQueue::new(
            aws_sdk_sqs::Client::new(sdk),
            config.queue_url.clone(),
        ));

        let ingest = Arc::new(BackupResultIngestor::new(store, config.email_settings()));

        let worker = IngestWorker::new(queue.clone(), ingest);

        Self {
            config,
            queue,
            worker,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one drain invocation with a fresh budget.
    pub async fn drain(&self, budget: Duration) -> Result<DrainSummary, Error> {
        let clock = InvocationBudget::starting_now(budget);
        self.drain_with(&clock).await
    }

    pub async fn drain_with(&self, clock: &dyn BudgetClock) -> Result<DrainSummary, Error> {
        self.worker.drain(clock).await
    }

    /// Queue a received backup result for ingestion (producer side).
    pub async fn submit_backup_result(
        &self,
        identifier: BackupResultIdentifier,
        backup_id: &str,
    ) -> Result<String, Error> {
        self.queue
            .send_received_backup_result(identifier, backup_id)
            .await
    }

    /// Approximate number of backup results waiting to be ingested.
    pub async fn pending_backup_results(&self) -> Result<u64, Error> {
        self.queue.count_available().await
    }
}
