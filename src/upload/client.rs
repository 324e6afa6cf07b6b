//! Upload client
//!
//! Packages a finalized recording into a single blob and hands it to an
//! ingestion transport. No retries happen here; the caller re-submits the
//! same finalized recording.

use std::sync::Arc;

use async_trait::async_trait;

use crate::session::FinalizedRecording;

/// Errors that can occur while handing a recording to the ingestion endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Network/HTTP transport error
    NetworkError(String),
    /// Endpoint answered with a non-2xx status
    Rejected { status: u16, message: String },
    /// Blob could not be packaged (e.g. invalid MIME type)
    InvalidPayload(String),
    /// HTTP client could not be constructed
    ClientBuild(String),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::NetworkError(e) => write!(f, "Network error: {}", e),
            UploadError::Rejected { status, message } => {
                write!(f, "Upload rejected ({}): {}", status, message)
            }
            UploadError::InvalidPayload(e) => write!(f, "Invalid upload payload: {}", e),
            UploadError::ClientBuild(e) => write!(f, "Failed to build HTTP client: {}", e),
        }
    }
}

impl std::error::Error for UploadError {}

/// The blob as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Endpoint acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAck {
    pub status: u16,
    pub body: String,
}

/// Delivers one payload to the ingestion collaborator.
#[async_trait]
pub trait IngestTransport: Send + Sync {
    async fn send(&self, payload: UploadPayload) -> Result<UploadAck, UploadError>;
}

/// Lets the host keep its own handle on a shared transport.
#[async_trait]
impl<T: IngestTransport + ?Sized> IngestTransport for Arc<T> {
    async fn send(&self, payload: UploadPayload) -> Result<UploadAck, UploadError> {
        (**self).send(payload).await
    }
}

pub struct UploadClient<T> {
    transport: T,
    file_stem: String,
}

impl<T: IngestTransport> UploadClient<T> {
    pub fn new(transport: T, file_stem: impl Into<String>) -> Self {
        Self {
            transport,
            file_stem: file_stem.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the payload: fragments concatenated in order, MIME type and
    /// file extension taken from the recording's format.
    pub fn package(&self, recording: &FinalizedRecording) -> UploadPayload {
        UploadPayload {
            file_name: format!(
                "{}.{}",
                self.file_stem,
                recording.format.file_extension()
            ),
            mime_type: recording.format.mime_type().to_string(),
            bytes: recording.to_blob(),
        }
    }

    /// Upload one finalized recording.
    ///
    /// The recording must contain at least one fragment; the session only
    /// hands out non-empty recordings.
    pub async fn upload(&self, recording: FinalizedRecording) -> Result<UploadAck, UploadError> {
        debug_assert!(
            !recording.fragments.is_empty(),
            "upload called with an empty recording"
        );

        let payload = self.package(&recording);
        log::info!(
            "Uploading recording {}: {} ({} bytes, {}, {} fragments{})",
            recording.recording_id,
            payload.file_name,
            payload.bytes.len(),
            payload.mime_type,
            recording.fragments.len(),
            if recording.partial { ", partial" } else { "" }
        );

        match self.transport.send(payload).await {
            Ok(ack) => {
                log::info!(
                    "Recording {} uploaded (status {})",
                    recording.recording_id,
                    ack.status
                );
                Ok(ack)
            }
            Err(e) => {
                log::error!("Recording {} upload failed: {}", recording.recording_id, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::EncodingFormat;
    use chrono::Utc;
    use parking_lot::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<UploadPayload>>,
    }

    #[async_trait]
    impl IngestTransport for RecordingTransport {
        async fn send(&self, payload: UploadPayload) -> Result<UploadAck, UploadError> {
            self.sent.lock().push(payload);
            Ok(UploadAck {
                status: 201,
                body: String::new(),
            })
        }
    }

    fn recording(mime: &str, fragments: Vec<Vec<u8>>) -> FinalizedRecording {
        FinalizedRecording {
            recording_id: Uuid::new_v4(),
            format: EncodingFormat::new(mime),
            fragments,
            partial: false,
            finalized_at: Utc::now(),
        }
    }

    #[test]
    fn mp4_recording_gets_mp4_name() {
        let client = UploadClient::new(RecordingTransport::default(), "recording");
        let payload = client.package(&recording("video/mp4", vec![vec![1]]));
        assert_eq!(payload.file_name, "recording.mp4");
        assert_eq!(payload.mime_type, "video/mp4");
    }

    #[test]
    fn webm_variants_keep_codec_in_mime_but_use_webm_extension() {
        let client = UploadClient::new(RecordingTransport::default(), "clip");
        let payload = client.package(&recording("video/webm;codecs=h264", vec![vec![1]]));
        assert_eq!(payload.file_name, "clip.webm");
        assert_eq!(payload.mime_type, "video/webm;codecs=h264");
    }

    #[tokio::test]
    async fn upload_sends_concatenated_blob() {
        let client = UploadClient::new(RecordingTransport::default(), "recording");
        let ack = client
            .upload(recording("video/webm", vec![vec![1, 2], vec![3], vec![4, 5]]))
            .await
            .unwrap();
        assert_eq!(ack.status, 201);

        let sent = client.transport().sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bytes, vec![1, 2, 3, 4, 5]);
        assert_eq!(sent[0].file_name, "recording.webm");
    }

    #[tokio::test]
    async fn shared_transport_stays_observable() {
        let transport = Arc::new(RecordingTransport::default());
        let client = UploadClient::new(Arc::clone(&transport), "recording");
        client
            .upload(recording("video/mp4", vec![vec![7; 4]]))
            .await
            .unwrap();

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].file_name, "recording.mp4");
    }

    #[test]
    fn rejected_display_includes_status() {
        let err = UploadError::Rejected {
            status: 413,
            message: "too large".to_string(),
        };
        assert!(err.to_string().contains("413"));
        assert!(err.to_string().contains("too large"));
    }
}
