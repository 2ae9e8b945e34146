use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use libroteca_core::constants::{COVER_HEIGHT, COVER_WIDTH};
use libroteca_core::{AppError, PageRasterizer};
use tokio::process::Command;

/// Renders covers by shelling out to poppler's `pdftoppm`.
///
/// With `-f 1 -l 1` and no output root the tool writes a single rendered
/// page to stdout, which avoids a second scratch file.
#[derive(Clone)]
pub struct PdftoppmRasterizer {
    binary: String,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize_first_page(&self, pdf_path: &Path) -> Result<Vec<u8>, AppError> {
        let output = Command::new(&self.binary)
            .arg("-png")
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg("1")
            .arg("-scale-to-x")
            .arg(COVER_WIDTH.to_string())
            .arg("-scale-to-y")
            .arg(COVER_HEIGHT.to_string())
            .arg(pdf_path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AppError::Rasterize(format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Rasterize(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(AppError::Rasterize(
                "no image data produced for first page".to_string(),
            ));
        }

        tracing::debug!(
            path = %pdf_path.display(),
            bytes = output.stdout.len(),
            "Rasterized cover page"
        );
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_a_rasterize_error() {
        let rasterizer = PdftoppmRasterizer::new("libroteca-no-such-binary");
        let err = rasterizer
            .rasterize_first_page(Path::new("/tmp/whatever.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Rasterize(_)));
    }
}
