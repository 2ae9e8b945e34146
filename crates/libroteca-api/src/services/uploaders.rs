//! Uploader registry.
//!
//! Keeps the uploaders table in step with the identities attached to incoming
//! candidates, and re-checks stored avatars on demand. Profile fetches go
//! through the source adapter that owns the identity's namespace.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use libroteca_core::models::{NewUploader, SourceCandidate, UploaderSource};
use libroteca_core::{AppError, DocumentSource};
use libroteca_db::UploaderRepository;

use super::with_call_timeout;

/// Distinct `(identity, namespace)` pairs from a candidate batch, first
/// occurrence wins, relative order preserved.
fn distinct_identities(candidates: &[SourceCandidate]) -> Vec<(String, UploaderSource)> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|candidate| seen.insert(candidate.uploader_id.clone()))
        .map(|candidate| (candidate.uploader_id.clone(), candidate.source))
        .collect()
}

#[derive(Clone)]
pub struct UploaderRegistry {
    uploaders: UploaderRepository,
    sources: Vec<Arc<dyn DocumentSource>>,
    call_timeout: Duration,
}

impl UploaderRegistry {
    pub fn new(
        uploaders: UploaderRepository,
        sources: Vec<Arc<dyn DocumentSource>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            uploaders,
            sources,
            call_timeout,
        }
    }

    fn source_for(&self, kind: UploaderSource) -> Option<&Arc<dyn DocumentSource>> {
        self.sources.iter().find(|source| source.kind() == kind)
    }

    /// Make sure every identity attached to `candidates` has an uploader row.
    /// Display profiles are fetched for the unknown subset only. Returns how
    /// many rows were inserted.
    pub async fn ensure_known(&self, candidates: &[SourceCandidate]) -> Result<usize, AppError> {
        let identities = distinct_identities(candidates);
        if identities.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = identities.iter().map(|(id, _)| id.clone()).collect();
        let existing = self.uploaders.existing_ids(&ids).await?;

        let mut new_uploaders = Vec::new();
        for (uploader_id, source) in &identities {
            if existing.contains(uploader_id) {
                continue;
            }
            new_uploaders.push(self.resolve_profile(uploader_id, *source).await);
        }
        if new_uploaders.is_empty() {
            return Ok(0);
        }

        let saved = self.uploaders.save_uploaders(&new_uploaders).await?;
        tracing::info!(saved, "Stored new uploaders");
        Ok(saved as usize)
    }

    /// Resolve a display profile for a new identity. Ingestion never aborts
    /// over one unresolvable account: any failure degrades to a placeholder
    /// row that a later avatar refresh can heal.
    async fn resolve_profile(&self, uploader_id: &str, source: UploaderSource) -> NewUploader {
        let Some(adapter) = self.source_for(source) else {
            tracing::warn!(
                uploader_id,
                source = %source,
                "No source adapter registered, storing placeholder"
            );
            return NewUploader::placeholder(uploader_id, source);
        };
        match with_call_timeout(
            self.call_timeout,
            "fetching uploader profile",
            adapter.fetch_profile(uploader_id),
        )
        .await
        {
            Ok(Some(profile)) => NewUploader {
                uploader_id: profile.uploader_id,
                name: profile.name,
                avatar: profile.avatar,
                source,
            },
            Ok(None) => {
                tracing::warn!(uploader_id, source = %source, "Profile not found, storing placeholder");
                NewUploader::placeholder(uploader_id, source)
            }
            Err(e) => {
                tracing::warn!(
                    uploader_id,
                    source = %source,
                    error = %e,
                    "Profile fetch failed, storing placeholder"
                );
                NewUploader::placeholder(uploader_id, source)
            }
        }
    }

    /// Re-fetch every known uploader's profile and update rows whose avatar
    /// changed. Individual fetch failures are logged and skipped. Returns the
    /// number of rows updated.
    pub async fn refresh_avatars(&self) -> Result<usize, AppError> {
        let uploaders = self.uploaders.all().await?;
        let total = uploaders.len();
        let mut updated = 0;

        for row in uploaders {
            let Some(adapter) = self.source_for(row.source) else {
                tracing::debug!(
                    uploader_id = %row.uploader_id,
                    source = %row.source,
                    "No source adapter registered, skipping"
                );
                continue;
            };
            let profile = match with_call_timeout(
                self.call_timeout,
                "fetching uploader profile",
                adapter.fetch_profile(&row.uploader_id),
            )
            .await
            {
                Ok(Some(profile)) => profile,
                Ok(None) => {
                    tracing::debug!(uploader_id = %row.uploader_id, "Profile gone, keeping stored avatar");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(uploader_id = %row.uploader_id, error = %e, "Profile fetch failed, skipping");
                    continue;
                }
            };
            if profile.avatar == row.avatar {
                continue;
            }
            if self
                .uploaders
                .update_avatar(&row.uploader_id, &profile.avatar)
                .await?
            {
                updated += 1;
            }
        }

        tracing::info!(total, updated, "Avatar refresh finished");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(uploader_id: &str, file: &str, source: UploaderSource) -> SourceCandidate {
        SourceCandidate {
            uploader_id: uploader_id.to_string(),
            file: file.to_string(),
            origin_ref: None,
            date: Utc::now(),
            source,
        }
    }

    #[test]
    fn test_distinct_identities_first_wins() {
        let candidates = vec![
            candidate("u1", "a.pdf", UploaderSource::Discord),
            candidate("u2", "b.pdf", UploaderSource::Discord),
            candidate("u1", "c.pdf", UploaderSource::Discord),
        ];
        let identities = distinct_identities(&candidates);
        assert_eq!(
            identities,
            vec![
                ("u1".to_string(), UploaderSource::Discord),
                ("u2".to_string(), UploaderSource::Discord),
            ]
        );
    }

    #[test]
    fn test_distinct_identities_empty_batch() {
        assert!(distinct_identities(&[]).is_empty());
    }
}
