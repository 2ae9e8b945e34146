//! Libroteca Core Library
//!
//! This crate provides the domain models, error types, collaborator traits,
//! and configuration shared across all libroteca components.

pub mod collaborators;
pub mod config;
pub mod constants;
pub mod error;
pub mod job_error;
pub mod models;

// Re-export commonly used types
pub use collaborators::{
    BibliographicFields, CoverHost, DocumentSource, Inference, PageRasterizer, UploaderProfile,
};
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use job_error::{JobError, JobResultExt};
