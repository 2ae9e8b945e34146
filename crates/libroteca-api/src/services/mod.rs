//! Ingestion-side services: library refresh orchestration and the uploader
//! registry.

mod library;
mod uploaders;

pub use library::{EnrichSummary, LibraryService, RefreshOutcome};
pub use uploaders::UploaderRegistry;

use std::future::Future;
use std::time::Duration;

use libroteca_core::AppError;

/// Run a collaborator call under the per-call timeout. An elapse surfaces as
/// the transient [`AppError::Timeout`].
pub(crate) async fn with_call_timeout<T>(
    call_timeout: Duration,
    operation: &str,
    fut: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(call_timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            operation: operation.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_call_timeout_passes_result_through() {
        let ok = with_call_timeout(Duration::from_secs(1), "noop", async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<i32, AppError> =
            with_call_timeout(Duration::from_secs(1), "noop", async {
                Err(AppError::Download("410 gone".to_string()))
            })
            .await;
        assert!(matches!(err, Err(AppError::Download(_))));
    }

    #[tokio::test]
    async fn test_with_call_timeout_names_the_operation() {
        let result: Result<(), AppError> =
            with_call_timeout(Duration::from_millis(5), "fetching uploader profile", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        match result {
            Err(AppError::Timeout { operation }) => {
                assert_eq!(operation, "fetching uploader profile")
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
