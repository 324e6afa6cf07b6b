//! Capture permission gate
//!
//! Acquires the combined audio+video stream and tracks the widget's readiness
//! flag. Failures are terminal: there is no retry loop, the caller re-triggers
//! acquisition once the user has fixed hardware or OS settings.

use serde::Serialize;

use crate::capture::{AccessFailure, ActiveStream, CaptureBackend, StreamConstraints, VideoConstraints};

/// Shown when the widget cannot get a camera on open.
pub const OPEN_FAILURE_MESSAGE: &str =
    "Camera permission denied or no camera found. Please check your camera settings.";

/// Shown when re-acquiring a stream (e.g. after a device switch) fails.
pub const STREAM_FAILURE_MESSAGE: &str =
    "Failed to access camera. Please ensure camera permissions are granted and try refreshing the page.";

/// Readiness sub-state of the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Loading,
    Ready,
    Error,
}

/// Which user flow triggered an acquisition; selects the message shown on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquirePurpose {
    Open,
    DeviceSwitch,
}

/// Hardware access was denied or is unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionError {
    pub failure: AccessFailure,
    pub message: String,
}

impl PermissionError {
    pub fn new(failure: AccessFailure, purpose: AcquirePurpose) -> Self {
        let message = match purpose {
            AcquirePurpose::Open => OPEN_FAILURE_MESSAGE,
            AcquirePurpose::DeviceSwitch => STREAM_FAILURE_MESSAGE,
        };
        Self {
            failure,
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for PermissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.failure)
    }
}

impl std::error::Error for PermissionError {}

#[derive(Debug)]
pub struct PermissionGate {
    readiness: Readiness,
    ideal_width: u32,
    ideal_height: u32,
}

impl PermissionGate {
    pub fn new(ideal_width: u32, ideal_height: u32) -> Self {
        Self {
            readiness: Readiness::Loading,
            ideal_width,
            ideal_height,
        }
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// Back to not-ready, e.g. after the stream was released.
    pub fn reset(&mut self) {
        self.readiness = Readiness::Loading;
    }

    /// Access was granted but the platform failed right after (e.g. device
    /// enumeration); the widget is not usable.
    pub fn mark_failed(&mut self) {
        self.readiness = Readiness::Error;
    }

    pub fn constraints_for(&self, device_id: Option<&str>) -> StreamConstraints {
        StreamConstraints {
            audio: true,
            video: VideoConstraints {
                device_id: device_id.map(str::to_string),
                ideal_width: self.ideal_width,
                ideal_height: self.ideal_height,
            },
        }
    }

    /// Request audio+video access, optionally pinned to one device.
    pub async fn acquire<C>(
        &mut self,
        capture: &C,
        device_id: Option<&str>,
        purpose: AcquirePurpose,
    ) -> Result<ActiveStream, PermissionError>
    where
        C: CaptureBackend + ?Sized,
    {
        self.readiness = Readiness::Loading;
        let constraints = self.constraints_for(device_id);

        match capture.acquire(&constraints).await {
            Ok(stream) => {
                log::info!(
                    "Capture stream {} acquired (device {:?})",
                    stream.id(),
                    stream.device_id()
                );
                self.readiness = Readiness::Ready;
                Ok(stream)
            }
            Err(failure) => {
                log::warn!("Capture access failed: {}", failure);
                self.readiness = Readiness::Error;
                Err(PermissionError::new(failure, purpose))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MediaDeviceInfo, SyntheticCapture};

    #[tokio::test]
    async fn granted_access_marks_ready() {
        let capture = SyntheticCapture::new().with_devices(vec![MediaDeviceInfo::video("cam-a", "A")]);
        let mut gate = PermissionGate::new(1280, 720);
        assert_eq!(gate.readiness(), Readiness::Loading);

        let stream = gate
            .acquire(&capture, None, AcquirePurpose::Open)
            .await
            .unwrap();
        assert_eq!(stream.device_id(), Some("cam-a"));
        assert_eq!(gate.readiness(), Readiness::Ready);

        let constraints = capture.last_constraints().unwrap();
        assert!(constraints.audio);
        assert_eq!(constraints.video.device_id, None);
        assert_eq!(constraints.video.ideal_width, 1280);
        assert_eq!(constraints.video.ideal_height, 720);
    }

    #[tokio::test]
    async fn denial_marks_error_with_open_message() {
        let capture = SyntheticCapture::new().with_devices(vec![MediaDeviceInfo::video("cam-a", "A")]);
        capture.deny_access(AccessFailure::Denied);
        let mut gate = PermissionGate::new(1280, 720);

        let err = gate
            .acquire(&capture, None, AcquirePurpose::Open)
            .await
            .unwrap_err();
        assert_eq!(err.failure, AccessFailure::Denied);
        assert_eq!(err.message, OPEN_FAILURE_MESSAGE);
        assert_eq!(gate.readiness(), Readiness::Error);
    }

    #[tokio::test]
    async fn no_camera_is_a_permission_error() {
        let capture = SyntheticCapture::new();
        let mut gate = PermissionGate::new(640, 480);

        let err = gate
            .acquire(&capture, Some("gone"), AcquirePurpose::DeviceSwitch)
            .await
            .unwrap_err();
        assert_eq!(err.failure, AccessFailure::NoDevice);
        assert_eq!(err.message, STREAM_FAILURE_MESSAGE);
    }
}
