use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use libroteca_core::models::{Book, BookDetail};
use libroteca_core::{AppError, BibliographicFields, CoverHost, Inference, PageRasterizer};

use crate::download::Downloader;
use crate::pdf::{self, PdfSummary};

/// Orchestrates the per-record extraction sequence.
///
/// Download and parse failures abort the attempt. Cover rendering, cover
/// upload and field inference are soft failures: the detail row is still
/// produced from whatever survived. The scratch file is removed no matter
/// how the attempt ends. Every collaborator call runs under the per-call
/// timeout, and a timeout surfaces as the transient [`AppError::Timeout`].
pub struct DetailExtractor {
    downloader: Downloader,
    rasterizer: Arc<dyn PageRasterizer>,
    cover_host: Arc<dyn CoverHost>,
    inference: Arc<dyn Inference>,
    call_timeout: Duration,
}

impl DetailExtractor {
    pub fn new(
        downloader: Downloader,
        rasterizer: Arc<dyn PageRasterizer>,
        cover_host: Arc<dyn CoverHost>,
        inference: Arc<dyn Inference>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            downloader,
            rasterizer,
            cover_host,
            inference,
            call_timeout,
        }
    }

    /// Produce a full detail row for `book` from the file at `url`.
    pub async fn extract(&self, book: &Book, url: &str) -> Result<BookDetail, AppError> {
        let scratch = self.downloader.scratch_path(book.id);
        let result = self.extract_inner(book, url, &scratch).await;
        // The scratch file never outlives the attempt, including partial
        // downloads left by a failed transfer.
        self.downloader.remove_scratch(&scratch).await;
        result
    }

    async fn extract_inner(
        &self,
        book: &Book,
        url: &str,
        scratch: &Path,
    ) -> Result<BookDetail, AppError> {
        self.with_timeout(
            "downloading source file",
            self.downloader.download_to_scratch(url, book.id),
        )
        .await?;

        let summary = pdf::summarize(scratch, book.id).await?;
        let cover_image = self.render_cover(book.id, scratch).await;
        let fields = self.infer_fields(book.id, &summary.excerpt).await;

        Ok(merge_detail(book.id, fields, &summary, cover_image))
    }

    /// Infer bibliographic fields from the text excerpt. Inference failures,
    /// including unusable replies, are soft: the merge falls back to the
    /// metadata embedded in the file.
    async fn infer_fields(&self, book_id: i64, excerpt: &str) -> BibliographicFields {
        match self
            .with_timeout(
                "inferring bibliographic fields",
                self.inference.infer_bibliographic_fields(excerpt),
            )
            .await
        {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(
                    book_id,
                    error = %e,
                    "Field inference failed, falling back to embedded metadata"
                );
                BibliographicFields::default()
            }
        }
    }

    /// Render and upload the cover. Any failure here downgrades to a warning
    /// and an empty cover so the record still gets its details.
    async fn render_cover(&self, book_id: i64, scratch: &Path) -> String {
        let png = match self
            .with_timeout(
                "rasterizing cover page",
                self.rasterizer.rasterize_first_page(scratch),
            )
            .await
        {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(book_id, error = %e, "Cover rasterization failed, continuing without cover");
                return String::new();
            }
        };
        match self
            .with_timeout("uploading cover image", self.cover_host.upload_image(&png))
            .await
        {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(book_id, error = %e, "Cover upload failed, continuing without cover");
                String::new()
            }
        }
    }

    async fn with_timeout<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout {
                operation: operation.to_string(),
            }),
        }
    }
}

/// Inferred fields win; embedded PDF metadata fills whatever the model left
/// blank. The description loses its newlines so list views render it as a
/// single line.
fn merge_detail(
    book_id: i64,
    fields: BibliographicFields,
    summary: &PdfSummary,
    cover_image: String,
) -> BookDetail {
    BookDetail {
        book_id,
        title: pick(fields.title, summary.title.clone()),
        author: pick(fields.author, summary.author.clone()),
        subject: fields.subject.trim().to_string(),
        description: normalize_description(&fields.description),
        cover_image,
    }
}

fn pick(primary: String, fallback: Option<String>) -> String {
    let primary = primary.trim();
    if !primary.is_empty() {
        return primary.to_string();
    }
    fallback.map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Flatten a model-written description to one line.
pub fn normalize_description(raw: &str) -> String {
    raw.replace("\r\n", " ")
        .replace('\n', " ")
        .replace('\r', " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FailingRasterizer;

    #[async_trait]
    impl PageRasterizer for FailingRasterizer {
        async fn rasterize_first_page(&self, _pdf_path: &Path) -> Result<Vec<u8>, AppError> {
            Err(AppError::Rasterize("render failed".to_string()))
        }
    }

    struct FixedRasterizer;

    #[async_trait]
    impl PageRasterizer for FixedRasterizer {
        async fn rasterize_first_page(&self, _pdf_path: &Path) -> Result<Vec<u8>, AppError> {
            Ok(vec![0x89, 0x50, 0x4E, 0x47])
        }
    }

    struct FixedCoverHost;

    #[async_trait]
    impl CoverHost for FixedCoverHost {
        async fn upload_image(&self, _png: &[u8]) -> Result<String, AppError> {
            Ok("https://covers.example/abc.png".to_string())
        }
    }

    struct FailingCoverHost;

    #[async_trait]
    impl CoverHost for FailingCoverHost {
        async fn upload_image(&self, _png: &[u8]) -> Result<String, AppError> {
            Err(AppError::ImageHost("503".to_string()))
        }
    }

    struct UnusedInference;

    #[async_trait]
    impl Inference for UnusedInference {
        async fn infer_bibliographic_fields(
            &self,
            _excerpt: &str,
        ) -> Result<BibliographicFields, AppError> {
            Err(AppError::Inference("unused".to_string()))
        }
        async fn describe(&self, _title: &str, _author: &str) -> Result<String, AppError> {
            Err(AppError::Inference("unused".to_string()))
        }
        async fn subject(&self, _title: &str, _author: &str) -> Result<String, AppError> {
            Err(AppError::Inference("unused".to_string()))
        }
        async fn keywords(
            &self,
            _title: &str,
            _author: &str,
            _vocabulary: &[String],
        ) -> Result<Vec<String>, AppError> {
            Err(AppError::Inference("unused".to_string()))
        }
    }

    fn extractor(
        rasterizer: Arc<dyn PageRasterizer>,
        cover_host: Arc<dyn CoverHost>,
    ) -> DetailExtractor {
        DetailExtractor::new(
            Downloader::new(std::env::temp_dir().join("libroteca-pipeline-test")),
            rasterizer,
            cover_host,
            Arc::new(UnusedInference),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_render_cover_happy_path() {
        let extractor = extractor(Arc::new(FixedRasterizer), Arc::new(FixedCoverHost));
        let url = extractor.render_cover(1, Path::new("/tmp/1.pdf")).await;
        assert_eq!(url, "https://covers.example/abc.png");
    }

    #[tokio::test]
    async fn test_render_cover_rasterize_failure_is_soft() {
        let extractor = extractor(Arc::new(FailingRasterizer), Arc::new(FixedCoverHost));
        let url = extractor.render_cover(1, Path::new("/tmp/1.pdf")).await;
        assert_eq!(url, "");
    }

    #[tokio::test]
    async fn test_render_cover_upload_failure_is_soft() {
        let extractor = extractor(Arc::new(FixedRasterizer), Arc::new(FailingCoverHost));
        let url = extractor.render_cover(1, Path::new("/tmp/1.pdf")).await;
        assert_eq!(url, "");
    }

    #[tokio::test]
    async fn test_inference_failure_falls_back_to_empty_fields() {
        let extractor = extractor(Arc::new(FixedRasterizer), Arc::new(FixedCoverHost));
        let fields = extractor.infer_fields(1, "some excerpt").await;
        assert_eq!(fields, BibliographicFields::default());
    }

    #[test]
    fn test_merge_prefers_inferred_fields() {
        let summary = PdfSummary {
            page_count: 10,
            excerpt: "...".to_string(),
            title: Some("Embedded Title".to_string()),
            author: Some("Embedded Author".to_string()),
        };
        let fields = BibliographicFields {
            title: "Inferred Title".to_string(),
            author: "Inferred Author".to_string(),
            description: "Line one.\nLine two.".to_string(),
            subject: " Fiction ".to_string(),
        };
        let detail = merge_detail(9, fields, &summary, "https://covers.example/x.png".into());
        assert_eq!(detail.book_id, 9);
        assert_eq!(detail.title, "Inferred Title");
        assert_eq!(detail.author, "Inferred Author");
        assert_eq!(detail.description, "Line one. Line two.");
        assert_eq!(detail.subject, "Fiction");
        assert_eq!(detail.cover_image, "https://covers.example/x.png");
    }

    #[test]
    fn test_merge_falls_back_to_embedded_metadata() {
        let summary = PdfSummary {
            page_count: 1,
            excerpt: String::new(),
            title: Some("Embedded Title".to_string()),
            author: None,
        };
        let fields = BibliographicFields {
            title: "   ".to_string(),
            ..Default::default()
        };
        let detail = merge_detail(3, fields, &summary, String::new());
        assert_eq!(detail.title, "Embedded Title");
        assert_eq!(detail.author, "");
        assert_eq!(detail.cover_image, "");
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description("a\nb"), "a b");
        assert_eq!(normalize_description("a\r\nb\rc"), "a b c");
        assert_eq!(normalize_description("  padded  "), "padded");
        assert_eq!(normalize_description("one line"), "one line");
        assert_eq!(normalize_description(""), "");
    }
}
