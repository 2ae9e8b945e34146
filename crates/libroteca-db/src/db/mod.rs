//! Database repositories for the data access layer
//!
//! Each repository owns one table (plus its immediate joins) and exposes the
//! operations the pipeline needs, nothing more. Uniqueness constraints and
//! single-row upserts carry the concurrency-safety load; there is no
//! application-level locking here.

pub mod book;
pub mod detail;
pub mod keyword;
pub mod uploader;

pub use book::BookRepository;
pub use detail::DetailRepository;
pub use keyword::KeywordRepository;
pub use uploader::UploaderRepository;
