use std::sync::{Arc, Weak};

use anyhow::Result;
use async_trait::async_trait;
use libroteca_core::models::{Job, JobOutcome};

/// Dispatch surface the queue consumer calls for every decoded job.
///
/// Implemented by the application state, which owns the repositories and
/// service clients the handlers need. The consumer holds a [`Weak`]
/// reference so that dropping the application state stops job processing
/// instead of keeping the whole state graph alive.
#[async_trait]
pub trait JobHandlerContext: Send + Sync {
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<JobOutcome>;
}

struct NoopContext;

#[async_trait]
impl JobHandlerContext for NoopContext {
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<JobOutcome> {
        Err(anyhow::anyhow!(
            "no job handler context registered, dropping {job}"
        ))
    }
}

/// A context handle that never upgrades. Useful as a placeholder before
/// the real application state exists, and in tests.
pub fn empty_context_weak() -> Weak<dyn JobHandlerContext> {
    let noop: Arc<dyn JobHandlerContext> = Arc::new(NoopContext);
    Arc::downgrade(&noop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_never_upgrades() {
        let weak = empty_context_weak();
        assert!(weak.upgrade().is_none());
    }
}
