use std::path::{Path, PathBuf};

use futures::StreamExt;
use libroteca_core::AppError;
use tokio::io::AsyncWriteExt;

/// Streams source files into the per-record scratch directory.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    scratch_dir: PathBuf,
}

impl Downloader {
    pub fn new(scratch_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            scratch_dir,
        }
    }

    /// Scratch location for a record's source file. One path per record id,
    /// so a file left behind by a crashed attempt is simply overwritten.
    pub fn scratch_path(&self, book_id: i64) -> PathBuf {
        self.scratch_dir.join(format!("{book_id}.pdf"))
    }

    /// Stream the file at `url` to the record's scratch path without holding
    /// the whole body in memory.
    pub async fn download_to_scratch(&self, url: &str, book_id: i64) -> Result<PathBuf, AppError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let path = self.scratch_path(book_id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Download(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(AppError::Download(format!(
                "unexpected status {} fetching source file",
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| AppError::Download(format!("body stream failed: {e}")))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(
            book_id,
            bytes = written,
            path = %path.display(),
            "Downloaded source file"
        );
        Ok(path)
    }

    /// Best-effort scratch cleanup. A missing file is fine, the download may
    /// have failed before creating one.
    pub async fn remove_scratch(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_path_is_per_record() {
        let downloader = Downloader::new(PathBuf::from("/tmp/libroteca"));
        assert_eq!(
            downloader.scratch_path(42),
            PathBuf::from("/tmp/libroteca/42.pdf")
        );
        assert_ne!(downloader.scratch_path(1), downloader.scratch_path(2));
    }

    #[tokio::test]
    async fn test_remove_scratch_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new(dir.path().to_path_buf());
        downloader.remove_scratch(&downloader.scratch_path(7)).await;
    }

    #[tokio::test]
    async fn test_download_unreachable_host_is_a_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new(dir.path().to_path_buf());
        // Port 1 is never listening.
        let result = downloader
            .download_to_scratch("http://127.0.0.1:1/book.pdf", 3)
            .await;
        assert!(matches!(result, Err(AppError::Download(_))));
    }
}
