use backup_console::{error::Error, store::aws::DynamoStore};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let summary = backup_console::run()
        .store_factory(|sdk, config| async move {
            Ok::<_, Error>(DynamoStore::new(aws_sdk_dynamodb::Client::new(&sdk), &config))
        })
        .start()
        .await?;

    tracing::info!(
        processed = summary.processed,
        stopped = ?summary.stopped,
        "drain invocation finished"
    );

    Ok(())
}
