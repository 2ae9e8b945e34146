//! Library ingestion orchestration.
//!
//! One service drives both manual ingestion passes: `refresh` pulls new
//! documents from the chat channel, `sync_repository` walks the configured
//! repository tree. Both share a non-reentrant refresh flag, so only one
//! ingestion runs per process at a time.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use libroteca_core::models::{Job, JobType, SourceCandidate};
use libroteca_core::{AppError, DocumentSource};
use libroteca_db::BookRepository;
use libroteca_worker::JobQueue;
use serde::Serialize;

use super::uploaders::UploaderRegistry;
use super::with_call_timeout;

/// Closed result of one ingestion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Another pass holds the refresh flag; nothing was read or written.
    AlreadyRunning,
    /// The pass ran but no enrichment work was left to enqueue.
    UpToDate,
    /// Detail jobs were enqueued for records still missing details.
    Enqueued { jobs: usize },
}

/// Counts of AI jobs enqueued by the maintenance fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrichSummary {
    pub descriptions: usize,
    pub keywords: usize,
}

/// Holds the refresh flag for the duration of one ingestion pass.
///
/// Acquisition is a compare-exchange, so two concurrent passes cannot both
/// win. The flag clears on drop, which covers every exit path including
/// errors.
struct RefreshGuard {
    flag: Arc<AtomicBool>,
}

impl RefreshGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Collapse candidates sharing a file locator, first occurrence wins,
/// relative order preserved. No storage reads here; the existing-locator
/// filter is a separate step.
fn collapse_candidates(candidates: Vec<SourceCandidate>) -> Vec<SourceCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.file.clone()))
        .collect()
}

#[derive(Clone)]
pub struct LibraryService {
    books: BookRepository,
    uploader_registry: UploaderRegistry,
    queue: JobQueue,
    chat: Arc<dyn DocumentSource>,
    repository: Option<Arc<dyn DocumentSource>>,
    refresh_flag: Arc<AtomicBool>,
    call_timeout: Duration,
}

impl LibraryService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        books: BookRepository,
        uploader_registry: UploaderRegistry,
        queue: JobQueue,
        chat: Arc<dyn DocumentSource>,
        repository: Option<Arc<dyn DocumentSource>>,
        refresh_flag: Arc<AtomicBool>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            books,
            uploader_registry,
            queue,
            chat,
            repository,
            refresh_flag,
            call_timeout,
        }
    }

    /// Pull new documents from the chat channel. Returns `AlreadyRunning`
    /// without touching storage when the flag is held.
    pub async fn refresh(&self) -> Result<RefreshOutcome, AppError> {
        let Some(_guard) = RefreshGuard::try_acquire(&self.refresh_flag) else {
            tracing::info!("Refresh already running, skipping");
            return Ok(RefreshOutcome::AlreadyRunning);
        };
        self.ingest_from(self.chat.as_ref()).await
    }

    /// Walk the configured repository tree for documents. Shares the refresh
    /// flag with [`LibraryService::refresh`].
    pub async fn sync_repository(&self) -> Result<RefreshOutcome, AppError> {
        let Some(repository) = self.repository.clone() else {
            return Err(AppError::InvalidInput(
                "Repository source is not configured".to_string(),
            ));
        };
        let Some(_guard) = RefreshGuard::try_acquire(&self.refresh_flag) else {
            tracing::info!("Refresh already running, skipping");
            return Ok(RefreshOutcome::AlreadyRunning);
        };
        self.ingest_from(repository.as_ref()).await
    }

    /// One ingestion pass: fetch candidates newer than the latest stored
    /// record, dedupe against the batch and storage, register uploaders,
    /// save, then enqueue a detail job for every record still missing
    /// details. The fan-out covers stragglers from earlier failed passes,
    /// not just this batch.
    async fn ingest_from(&self, source: &dyn DocumentSource) -> Result<RefreshOutcome, AppError> {
        let since = self.books.latest_date().await?;
        let candidates = with_call_timeout(
            self.call_timeout,
            "fetching source candidates",
            source.fetch_candidates(since),
        )
        .await?;
        tracing::info!(
            source = %source.kind(),
            fetched = candidates.len(),
            "Fetched candidate documents"
        );

        let candidates = collapse_candidates(candidates);
        let files: Vec<String> = candidates.iter().map(|c| c.file.clone()).collect();
        let known = self.books.existing_files(&files).await?;
        let fresh: Vec<SourceCandidate> = candidates
            .into_iter()
            .filter(|candidate| !known.contains(&candidate.file))
            .collect();

        if !fresh.is_empty() {
            self.uploader_registry.ensure_known(&fresh).await?;
            let saved = self.books.save_books(&fresh).await?;
            tracing::info!(saved, "Stored new document records");
        }

        let pending = self.books.find_missing_details().await?;
        let jobs: Vec<Job> = pending.iter().map(|book| Job::details(book.id)).collect();
        let enqueued = self
            .queue
            .publish_jobs(&jobs)
            .await
            .map_err(|e| AppError::Queue(format!("{e:#}")))?;

        if enqueued == 0 {
            Ok(RefreshOutcome::UpToDate)
        } else {
            tracing::info!(jobs = enqueued, "Enqueued detail jobs");
            Ok(RefreshOutcome::Enqueued { jobs: enqueued })
        }
    }

    /// Maintenance fan-out: description jobs for detail rows whose subject
    /// and description are both still empty, keyword jobs for records with
    /// no associations. Both feeds require non-empty title/author. Not
    /// gated by the refresh flag.
    pub async fn enrich(&self) -> Result<EnrichSummary, AppError> {
        let undescribed = self.books.find_undescribed().await?;
        let description_jobs: Vec<Job> = undescribed
            .iter()
            .map(|&id| Job::new(id, JobType::AiDescription))
            .collect();
        let descriptions = self
            .queue
            .publish_jobs(&description_jobs)
            .await
            .map_err(|e| AppError::Queue(format!("{e:#}")))?;

        let untagged = self.books.find_untagged().await?;
        let keyword_jobs: Vec<Job> = untagged
            .iter()
            .map(|&id| Job::new(id, JobType::AiKeywords))
            .collect();
        let keywords = self
            .queue
            .publish_jobs(&keyword_jobs)
            .await
            .map_err(|e| AppError::Queue(format!("{e:#}")))?;

        tracing::info!(descriptions, keywords, "Enqueued AI enrichment jobs");
        Ok(EnrichSummary {
            descriptions,
            keywords,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use libroteca_core::models::UploaderSource;

    fn candidate(uploader_id: &str, file: &str) -> SourceCandidate {
        SourceCandidate {
            uploader_id: uploader_id.to_string(),
            file: file.to_string(),
            origin_ref: None,
            date: Utc::now(),
            source: UploaderSource::Discord,
        }
    }

    #[test]
    fn test_collapse_keeps_first_occurrence_in_order() {
        let collapsed = collapse_candidates(vec![
            candidate("u1", "a.pdf"),
            candidate("u2", "a.pdf"),
            candidate("u3", "b.pdf"),
        ]);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].file, "a.pdf");
        assert_eq!(collapsed[0].uploader_id, "u1");
        assert_eq!(collapsed[1].file, "b.pdf");
    }

    #[test]
    fn test_collapse_passes_unique_batch_through() {
        let collapsed = collapse_candidates(vec![
            candidate("u1", "a.pdf"),
            candidate("u1", "b.pdf"),
        ]);
        assert_eq!(collapsed.len(), 2);
        assert!(collapse_candidates(vec![]).is_empty());
    }

    #[test]
    fn test_refresh_guard_is_exclusive_and_clears_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));

        let guard = RefreshGuard::try_acquire(&flag);
        assert!(guard.is_some());
        assert!(flag.load(Ordering::Acquire));
        assert!(RefreshGuard::try_acquire(&flag).is_none());

        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(RefreshGuard::try_acquire(&flag).is_some());
    }

    #[test]
    fn test_refresh_outcome_wire_shape() {
        assert_eq!(
            serde_json::to_value(RefreshOutcome::AlreadyRunning).unwrap(),
            serde_json::json!({"status": "already_running"})
        );
        assert_eq!(
            serde_json::to_value(RefreshOutcome::UpToDate).unwrap(),
            serde_json::json!({"status": "up_to_date"})
        );
        assert_eq!(
            serde_json::to_value(RefreshOutcome::Enqueued { jobs: 3 }).unwrap(),
            serde_json::json!({"status": "enqueued", "jobs": 3})
        );
    }
}
