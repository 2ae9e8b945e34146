//! Queue dispatch.
//!
//! `AppState` implements the worker's dispatch trait, routing each decoded
//! job to its handler. Ratings/reviews are reserved wire values with no
//! action; they are acked with a skipped outcome so an old producer cannot
//! wedge the queue.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use libroteca_core::models::{Job, JobOutcome, JobType, SkipReason};
use libroteca_worker::JobHandlerContext;

use crate::job_handlers;
use crate::state::AppState;

#[async_trait]
impl JobHandlerContext for AppState {
    #[tracing::instrument(
        skip(self, job),
        fields(job.id = job.id, job.type = %job.job_type, job.status = tracing::field::Empty)
    )]
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<JobOutcome> {
        let start = std::time::Instant::now();

        let result = match job.job_type {
            JobType::Health => {
                tracing::info!("Queue health probe received");
                Ok(JobOutcome::Completed)
            }
            JobType::Details | JobType::AiDetails => {
                job_handlers::details::run(&self, job.id).await
            }
            JobType::AiDescription => job_handlers::description::run(&self, job.id).await,
            JobType::AiKeywords => job_handlers::keywords::run(&self, job.id).await,
            JobType::Uploader => job_handlers::uploaders::run(&self).await,
            JobType::Ratings | JobType::Reviews => {
                tracing::info!("Reserved job type, acknowledging without action");
                Ok(JobOutcome::Skipped(SkipReason::Unsupported))
            }
        };

        let elapsed = start.elapsed();
        match &result {
            Ok(outcome) => {
                tracing::Span::current().record("job.status", "success");
                tracing::info!(
                    outcome = %outcome,
                    duration_ms = elapsed.as_millis() as u64,
                    "Job handled"
                );
            }
            Err(e) => {
                tracing::Span::current().record("job.status", "failed");
                tracing::warn!(
                    error = %e,
                    recoverable = e.is_recoverable(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Job handler failed"
                );
            }
        }

        result.map_err(anyhow::Error::from)
    }
}
