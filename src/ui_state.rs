//! Widget-facing state snapshot
//!
//! Serialized in camelCase; the session view is a tagged union:
//! `{ "status": "idle" }` or `{ "status": "recording", "elapsedSecs": 5, ... }`.

use serde::Serialize;

use crate::devices::DeviceInventory;
use crate::permission::Readiness;
use crate::session::RecordingSession;
use crate::state_machine::SessionState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceOption {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SessionView {
    Idle,
    Recording {
        #[serde(rename = "elapsedSecs")]
        elapsed_secs: u64,
        fragments: usize,
        bytes: usize,
    },
    Stopped {
        fragments: usize,
        bytes: usize,
        fault: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetState {
    pub readiness: Readiness,
    pub devices: Vec<DeviceOption>,
    pub selected_device_id: Option<String>,
    pub session: SessionView,
    pub error: Option<String>,
    pub can_start: bool,
    pub can_upload: bool,
    pub uploading: bool,
}

impl Default for WidgetState {
    fn default() -> Self {
        Self {
            readiness: Readiness::Loading,
            devices: Vec::new(),
            selected_device_id: None,
            session: SessionView::Idle,
            error: None,
            can_start: false,
            can_upload: false,
            uploading: false,
        }
    }
}

pub fn session_view(session: &RecordingSession) -> SessionView {
    let buffer = session.buffer();
    match session.state() {
        SessionState::Idle => SessionView::Idle,
        SessionState::Recording { started_at, .. } => SessionView::Recording {
            elapsed_secs: started_at.elapsed().as_secs(),
            fragments: buffer.len(),
            bytes: buffer.total_bytes(),
        },
        SessionState::Stopped { fault, .. } => SessionView::Stopped {
            fragments: buffer.len(),
            bytes: buffer.total_bytes(),
            fault: fault.clone(),
        },
    }
}

/// Assemble the full widget snapshot.
pub fn widget_state(
    readiness: Readiness,
    inventory: &DeviceInventory,
    session: &RecordingSession,
    error: Option<&str>,
    uploading: bool,
) -> WidgetState {
    let recording = session.is_recording();
    WidgetState {
        readiness,
        devices: inventory
            .devices()
            .iter()
            .map(|d| DeviceOption {
                id: d.id.clone(),
                label: d.display_label(),
            })
            .collect(),
        selected_device_id: inventory.selected_id().map(str::to_string),
        session: session_view(session),
        error: error.map(str::to_string),
        can_start: readiness == Readiness::Ready && !recording && !uploading,
        can_upload: !recording && !uploading && !session.buffer().is_empty(),
        uploading,
    }
}
