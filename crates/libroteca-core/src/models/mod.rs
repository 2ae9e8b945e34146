//! Data models for the application
//!
//! Each sub-module covers one domain area: ingested books and their
//! enrichment details, uploaders, the keyword vocabulary, and queue jobs.

mod book;
mod job;
mod keyword;
mod uploader;

// Re-export all models for convenient imports
pub use book::*;
pub use job::*;
pub use keyword::*;
pub use uploader::*;
