//! HTTP handlers.

pub mod books;
pub mod health;
pub mod library;
