//! Libroteca Database Layer
//!
//! This crate provides the sqlx/Postgres repositories backing the ingestion
//! pipeline, plus pool/migration setup.

pub mod db;
pub mod setup;

pub use db::{BookRepository, DetailRepository, KeywordRepository, UploaderRepository};
pub use setup::setup_database;
