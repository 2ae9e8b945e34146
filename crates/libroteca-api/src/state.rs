//! Application state.
//!
//! `AppState` aggregates the repositories, queue client, and collaborator
//! clients behind one `Arc` handed to every axum handler. The queue consumer
//! holds only a `Weak` reference to it, so dropping the state also stops job
//! processing.

use std::sync::Arc;

use libroteca_core::models::UploaderSource;
use libroteca_core::{Config, DocumentSource, Inference};
use libroteca_db::{BookRepository, DetailRepository, KeywordRepository, UploaderRepository};
use libroteca_extract::DetailExtractor;
use libroteca_worker::JobQueue;

use crate::services::{LibraryService, UploaderRegistry};

/// The repositories, all sharing one connection pool.
#[derive(Clone)]
pub struct DbState {
    pub books: BookRepository,
    pub details: DetailRepository,
    pub uploaders: UploaderRepository,
    pub keywords: KeywordRepository,
}

/// Main application state, shared by the HTTP handlers and the job handlers.
pub struct AppState {
    pub config: Config,
    pub db: DbState,
    pub queue: JobQueue,
    pub sources: Vec<Arc<dyn DocumentSource>>,
    pub extractor: DetailExtractor,
    pub inference: Arc<dyn Inference>,
    pub library: LibraryService,
    pub uploader_registry: UploaderRegistry,
}

impl AppState {
    /// The registered source adapter for an uploader namespace, if any.
    pub fn source_for(&self, kind: UploaderSource) -> Option<&Arc<dyn DocumentSource>> {
        self.sources.iter().find(|source| source.kind() == kind)
    }
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
