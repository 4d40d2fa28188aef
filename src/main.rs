mod aggregator;
mod comparator;
mod compiler;
mod config;
mod core;
mod dispatcher;
mod error;
mod executer;
mod models;
mod preprocessor;
mod redis_manager;
mod registry;
mod reporter;
mod runner;
mod workspace;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::comparator::ByteComparator;
use crate::config::JudgerConfig;
use crate::dispatcher::Dispatcher;
use crate::executer::ProcessExecuter;
use crate::redis_manager::RedisManager;
use crate::registry::{Catalog, RedisRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("judger=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = JudgerConfig::from_env();
    info!("Starting Judger Worker...");

    // Load language and verdict catalog
    let catalog = Catalog::load(&config.catalog_path)?;
    info!("Loaded catalog from {:?}", config.catalog_path);
    for language in &catalog.languages {
        info!(
            "Language #{} {}: compile `{}`, run `{}`",
            language.language_id, language.name, language.compile_command, language.run_command
        );
    }

    let mut manager = RedisManager::connect(&config.redis_url, config.submission_queue.clone()).await?;
    let registry = Arc::new(RedisRegistry::new(manager.connection(), catalog));
    let sink = Arc::new(manager.event_sink(config.event_queue.clone()).await?);

    match &config.execution_user {
        Some(user) => info!("Submitted programs run as {}", user),
        None => info!("Submitted programs run as the worker user"),
    }

    let dispatcher = Dispatcher::new(
        &config,
        registry,
        Arc::new(ProcessExecuter::new()),
        Arc::new(ByteComparator),
        sink,
    );

    info!("Waiting for submissions on {}...", config.submission_queue);

    loop {
        let submission_id = tokio::select! {
            result = manager.pop_submission() => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping worker");
                break;
            }
        };

        info!("Received submission #{}", submission_id);
        dispatcher.on_submission_created(submission_id).await;
    }

    Ok(())
}
