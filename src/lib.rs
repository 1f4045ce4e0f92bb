use std::{future::Future, sync::Arc, time::Duration};

use config::Config;
use error::Error;
use service::Service;
use store::RecordStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, FmtSubscriber};
use worker::DrainSummary;

pub mod config;
pub mod error;
pub mod ingest;
pub mod message;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod service;
pub mod store;
pub mod worker;

/// Returns a builder for one worker invocation: initializes logging, loads
/// configuration, wires the service, and drains the queue until the budget
/// runs out or the queue is empty.
#[bon::builder(finish_fn = start)]
pub async fn run<S, F, R>(store_factory: S, budget: Option<Duration>) -> eyre::Result<DrainSummary>
where
    S: FnOnce(aws_config::SdkConfig, Config) -> F,
    F: Future<Output = Result<R, Error>>,
    R: RecordStore + 'static,
{
    #[cfg(debug_assertions)]
    FmtSubscriber::builder()
        .pretty()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("BACKUP_CONSOLE_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    #[cfg(not(debug_assertions))]
    FmtSubscriber::builder()
        .json()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("BACKUP_CONSOLE_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    let config = Config::load()?;

    let sdk = service::sdk_config(&config).await;

    let store = store_factory(sdk.clone(), config.clone()).await?;

    let service = Service::with_sdk_config(config.clone(), &sdk, Arc::new(store));

    let budget = budget.unwrap_or_else(|| config.budget());

    Ok(service.drain(budget).await?)
}
