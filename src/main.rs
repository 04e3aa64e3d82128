use std::sync::Arc;

use anyhow::Context;
use authlog_etl::config::Config;
use authlog_etl::database;
use authlog_etl::services::pipeline::{Pipeline, RunOptions};
use authlog_etl::services::writer::SqlSink;
use authlog_etl::tasks::scheduler::start_ingest_task;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let db = database::create_pool(&config.database_url())
        .await
        .context("Unable to establish database connection")?;

    tracing::info!("Database connected");

    let pipeline = Arc::new(Pipeline::new(
        config.log_path.clone(),
        SqlSink::new(db.clone()),
        RunOptions::from(&config),
    ));

    if config.run_on_start {
        match pipeline.run().await {
            Ok(report) => tracing::info!("Startup ingest run completed: {}", report),
            Err(e) => tracing::error!("Startup ingest run aborted: {}", e),
        }
    }

    tracing::info!(
        "[ETL] Ingesting {} on schedule {:?}",
        pipeline.source().display(),
        config.schedule
    );
    let task = start_ingest_task(pipeline, config.schedule);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down");
    task.abort();
    db.close().await;

    Ok(())
}
