//! HTTP ingestion transport
//!
//! Posts the recording as a multipart form with a single `file` field.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::client::{IngestTransport, UploadAck, UploadError, UploadPayload};
use crate::settings::RecorderSettings;

/// Error body shapes commonly returned by ingestion services
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error", alias = "detail")]
    message: String,
}

pub struct HttpIngestTransport {
    client: Client,
    endpoint: String,
}

impl HttpIngestTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_settings(settings: &RecorderSettings) -> Result<Self, UploadError> {
        Self::new(
            settings.upload_url(),
            Duration::from_secs(settings.upload_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl IngestTransport for HttpIngestTransport {
    async fn send(&self, payload: UploadPayload) -> Result<UploadAck, UploadError> {
        let file_part = Part::bytes(payload.bytes)
            .file_name(payload.file_name)
            .mime_str(&payload.mime_type)
            .map_err(|e| UploadError::InvalidPayload(e.to_string()))?;

        let form = Form::new().part("file", file_part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(UploadAck {
                status: status.as_u16(),
                body,
            })
        } else {
            let message = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(error_body) => error_body.message,
                Err(_) => body,
            };
            log::error!("Ingestion endpoint error ({}): {}", status.as_u16(), message);
            Err(UploadError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}
