//! Data types exchanged with the capture subsystem

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Kind of a platform media device, as reported by enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    #[serde(rename = "videoinput")]
    VideoInput,
    #[serde(rename = "audioinput")]
    AudioInput,
    #[serde(rename = "audiooutput")]
    AudioOutput,
}

/// One entry of the platform's device listing (all kinds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDeviceInfo {
    pub device_id: String,
    /// Empty until access has been granted on most platforms
    pub label: String,
    pub kind: DeviceKind,
}

impl MediaDeviceInfo {
    pub fn video(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
            kind: DeviceKind::VideoInput,
        }
    }

    pub fn audio(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
            kind: DeviceKind::AudioInput,
        }
    }
}

/// Why the platform refused to hand out a capture stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessFailure {
    Denied,
    NoDevice,
    DeviceInUse,
    Other(String),
}

impl std::fmt::Display for AccessFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessFailure::Denied => write!(f, "access denied"),
            AccessFailure::NoDevice => write!(f, "no capture device present"),
            AccessFailure::DeviceInUse => write!(f, "capture device in use"),
            AccessFailure::Other(e) => write!(f, "{}", e),
        }
    }
}

/// Video part of an acquisition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    /// Exact device to open; `None` lets the platform pick its default
    pub device_id: Option<String>,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

/// Combined audio+video acquisition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConstraints {
    pub audio: bool,
    pub video: VideoConstraints,
}

/// Live audio+video capture handle bound to one device.
///
/// Deliberately not `Clone`: exactly one owner holds it and gives it back
/// through [`CaptureBackend::release`](super::CaptureBackend::release).
#[derive(Debug, PartialEq, Eq)]
pub struct ActiveStream {
    id: Uuid,
    device_id: Option<String>,
}

impl ActiveStream {
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }
}

/// Events emitted by the platform recorder primitive, in capture order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// One encoded fragment (may be zero-length)
    Data(Vec<u8>),
    /// Irrecoverable recorder failure
    Fault(String),
    /// Recorder confirmed that it has ceased producing data
    Stopped,
}

/// Control side of a running platform recorder.
pub trait RecorderControl: Send {
    /// Ask the recorder to cease. Fragments already in flight still arrive
    /// before the `Stopped` confirmation.
    fn request_stop(&mut self);
}

/// A running recorder: its event channel plus its control.
pub struct RecorderHandle {
    pub events: mpsc::UnboundedReceiver<CaptureEvent>,
    pub control: Box<dyn RecorderControl>,
}

impl std::fmt::Debug for RecorderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderHandle").finish_non_exhaustive()
    }
}
