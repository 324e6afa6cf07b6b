//! Trait implemented by platform capture layers

use async_trait::async_trait;

use super::types::{AccessFailure, ActiveStream, MediaDeviceInfo, RecorderHandle, StreamConstraints};
use crate::format::EncodingFormat;

/// The hardware-facing collaborator of the recorder.
///
/// Acquisition and enumeration suspend on the OS; everything else answers
/// immediately. Recorder output is delivered through the channel inside the
/// returned [`RecorderHandle`], never through callbacks.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Request combined audio+video access.
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<ActiveStream, AccessFailure>;

    /// List every media device the platform knows about (all kinds).
    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, AccessFailure>;

    /// Whether the platform recorder can encode `mime_type`.
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Start a recorder on `stream` producing `format`.
    fn start_recorder(
        &self,
        stream: &ActiveStream,
        format: &EncodingFormat,
    ) -> Result<RecorderHandle, String>;

    /// Give the stream back to the platform (stops all tracks).
    fn release(&self, stream: ActiveStream);
}
