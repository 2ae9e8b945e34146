//! Cover upload client for an imgbb-style image host.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use libroteca_core::{AppError, Config, CoverHost};
use serde::Deserialize;

const HTTP_TIMEOUT_SECS: u64 = 60;

pub struct ImageHostClient {
    http_client: reqwest::Client,
    upload_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: UploadData,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    #[serde(default)]
    url: String,
}

impl ImageHostClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build image host client: {e}")))?;
        Ok(Self {
            http_client,
            upload_url: config.image_host_url.clone(),
            api_key: config.image_host_api_key.clone(),
        })
    }
}

#[async_trait]
impl CoverHost for ImageHostClient {
    async fn upload_image(&self, png: &[u8]) -> Result<String, AppError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png);
        let response = self
            .http_client
            .post(&self.upload_url)
            .form(&[("key", self.api_key.as_str()), ("image", encoded.as_str())])
            .send()
            .await
            .map_err(|e| AppError::ImageHost(format!("upload request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ImageHost(format!(
                "upload failed: {status} - {error_text}"
            )));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::ImageHost(format!("failed to decode upload response: {e}")))?;
        if parsed.data.url.is_empty() {
            return Err(AppError::ImageHost(
                "upload response carried no image URL".to_string(),
            ));
        }

        tracing::debug!(url = %parsed.data.url, bytes = png.len(), "Uploaded cover image");
        Ok(parsed.data.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_response_shape() {
        let parsed: UploadResponse = serde_json::from_str(
            r#"{"data": {"url": "https://i.example/abc.png", "id": "abc"}, "success": true}"#,
        )
        .unwrap();
        assert_eq!(parsed.data.url, "https://i.example/abc.png");
    }

    #[test]
    fn test_upload_response_missing_url_is_empty() {
        let parsed: UploadResponse = serde_json::from_str(r#"{"data": {}}"#).unwrap();
        assert_eq!(parsed.data.url, "");
    }
}
