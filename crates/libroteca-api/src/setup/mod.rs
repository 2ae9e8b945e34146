//! Application wiring: configuration, stores, source adapters, queue
//! consumer and router, assembled in dependency order.

pub mod routes;
pub mod server;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use libroteca_core::{Config, DocumentSource, Inference};
use libroteca_db::{
    setup_database, BookRepository, DetailRepository, KeywordRepository, UploaderRepository,
};
use libroteca_extract::{DetailExtractor, Downloader, PdftoppmRasterizer};
use libroteca_services::{DiscordSource, GithubSource, ImageHostClient, OpenAiClient};
use libroteca_worker::{JobHandlerContext, JobQueue, JobQueueConfig};

use crate::services::{LibraryService, UploaderRegistry};
use crate::state::{AppState, DbState};

/// Builds the application state, starts the queue consumer and returns the
/// router ready to serve.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry();
    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated"
    );

    let pool = setup_database(&config).await?;
    let db = DbState {
        books: BookRepository::new(pool.clone()),
        details: DetailRepository::new(pool.clone()),
        uploaders: UploaderRepository::new(pool.clone()),
        keywords: KeywordRepository::new(pool),
    };

    let chat: Arc<dyn DocumentSource> = Arc::new(DiscordSource::new(&config)?);
    let repository: Option<Arc<dyn DocumentSource>> = GithubSource::from_config(&config)?
        .map(|source| Arc::new(source) as Arc<dyn DocumentSource>);

    let mut sources = vec![chat.clone()];
    if let Some(repository) = repository.clone() {
        sources.push(repository);
    }

    let inference: Arc<dyn Inference> = Arc::new(OpenAiClient::new(&config)?);
    let extractor = DetailExtractor::new(
        Downloader::new(config.scratch_dir.clone()),
        Arc::new(PdftoppmRasterizer::new(&config.pdftoppm_path)),
        Arc::new(ImageHostClient::new(&config)?),
        inference.clone(),
        config.call_timeout(),
    );

    let queue = JobQueue::connect(&config.amqp_url, JobQueueConfig::from(&config))
        .await
        .context("Failed to connect to the message broker")?;

    let uploader_registry =
        UploaderRegistry::new(db.uploaders.clone(), sources.clone(), config.call_timeout());
    let library = LibraryService::new(
        db.books.clone(),
        uploader_registry.clone(),
        queue.clone(),
        chat,
        repository,
        Arc::new(AtomicBool::new(false)),
        config.call_timeout(),
    );

    let state = Arc::new(AppState {
        config,
        db,
        queue,
        sources,
        extractor,
        inference,
        library,
        uploader_registry,
    });

    // The consumer only holds a weak handle; the allocation behind it is the
    // state itself, so the consumer dies with the application.
    let context: Arc<dyn JobHandlerContext> = state.clone();
    state
        .queue
        .start_consumer(Arc::downgrade(&context))
        .await
        .context("Failed to start the job consumer")?;

    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
