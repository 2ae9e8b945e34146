//! # Libroteca Worker
//!
//! AMQP client for the book enrichment queue and the single-consumer
//! worker loop that drains it. Jobs are published as persistent JSON
//! messages; the consumer dispatches each one to a [`JobHandlerContext`]
//! implemented by the application crate, with a per-job timeout and a
//! bounded retry / dead-letter policy.

pub mod context;
pub mod queue;

pub use context::{empty_context_weak, JobHandlerContext};
pub use queue::{JobQueue, JobQueueConfig, RETRY_COUNT_HEADER};
