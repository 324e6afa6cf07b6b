//! Recorder error taxonomy
//!
//! Every failure ends up in widget state as a user-visible message; only
//! [`RecorderError::NotReady`] signals a caller bug.

use crate::permission::PermissionError;
use crate::upload::UploadError;

/// Sequencing violations. These do not happen when the controller is driven
/// through the widget contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotReadyError {
    /// No capture stream (permission not granted yet, or widget closed)
    NoActiveStream,
    AlreadyRecording,
    /// The operation is not allowed while a recording is running
    RecordingInProgress,
    /// The operation is not allowed while an upload is in flight
    UploadInProgress,
    /// Nothing finalized to upload
    NothingToUpload,
    UnknownDevice(String),
}

impl std::fmt::Display for NotReadyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotReadyError::NoActiveStream => write!(f, "No active capture stream"),
            NotReadyError::AlreadyRecording => write!(f, "A recording is already running"),
            NotReadyError::RecordingInProgress => {
                write!(f, "Operation not allowed while recording")
            }
            NotReadyError::UploadInProgress => write!(f, "Operation not allowed while uploading"),
            NotReadyError::NothingToUpload => write!(f, "No finished recording to upload"),
            NotReadyError::UnknownDevice(id) => write!(f, "Unknown capture device: {}", id),
        }
    }
}

impl std::error::Error for NotReadyError {}

#[derive(Debug)]
pub enum RecorderError {
    Permission(PermissionError),
    NotReady(NotReadyError),
    /// Mid-recording capture failure; collected fragments are kept
    HardwareFault(String),
    Upload(UploadError),
}

impl RecorderError {
    /// True only for caller bugs that no user action can fix.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, RecorderError::NotReady(_))
    }

    /// Text placed in widget state.
    pub fn user_message(&self) -> String {
        match self {
            RecorderError::Permission(e) => e.message.clone(),
            RecorderError::NotReady(e) => e.to_string(),
            RecorderError::HardwareFault(e) => {
                format!("Recording stopped unexpectedly: {}. The captured part can still be uploaded.", e)
            }
            RecorderError::Upload(e) => format!("Upload failed: {}. Please try again.", e),
        }
    }
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::Permission(e) => write!(f, "Permission error: {}", e),
            RecorderError::NotReady(e) => write!(f, "Not ready: {}", e),
            RecorderError::HardwareFault(e) => write!(f, "Hardware fault: {}", e),
            RecorderError::Upload(e) => write!(f, "Upload error: {}", e),
        }
    }
}

impl std::error::Error for RecorderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecorderError::Permission(e) => Some(e),
            RecorderError::NotReady(e) => Some(e),
            RecorderError::HardwareFault(_) => None,
            RecorderError::Upload(e) => Some(e),
        }
    }
}

impl From<PermissionError> for RecorderError {
    fn from(e: PermissionError) -> Self {
        RecorderError::Permission(e)
    }
}

impl From<NotReadyError> for RecorderError {
    fn from(e: NotReadyError) -> Self {
        RecorderError::NotReady(e)
    }
}

impl From<UploadError> for RecorderError {
    fn from(e: UploadError) -> Self {
        RecorderError::Upload(e)
    }
}
