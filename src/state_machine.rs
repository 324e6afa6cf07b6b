//! Recording session state machine
//!
//! All session transitions go through `reduce()`, which returns the next
//! state and the effects the session must execute (buffer mutations and
//! recorder control). The reducer itself never touches the buffer.

use std::time::Instant;
use uuid::Uuid;

use crate::format::EncodingFormat;

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording {
        recording_id: Uuid,
        format: EncodingFormat,
        started_at: Instant,
        /// Stop was requested; waiting for the recorder to confirm
        stop_requested: bool,
    },
    Stopped {
        recording_id: Uuid,
        format: EncodingFormat,
        /// Set when the recording ended because of a hardware fault
        fault: Option<String>,
    },
}

impl SessionState {
    pub fn recording_id(&self) -> Option<Uuid> {
        match self {
            SessionState::Idle => None,
            SessionState::Recording { recording_id, .. } => Some(*recording_id),
            SessionState::Stopped { recording_id, .. } => Some(*recording_id),
        }
    }

    pub fn format(&self) -> Option<&EncodingFormat> {
        match self {
            SessionState::Idle => None,
            SessionState::Recording { format, .. } => Some(format),
            SessionState::Stopped { format, .. } => Some(format),
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, SessionState::Stopped { .. })
    }
}

/// Inputs to the session: caller requests and recorder output.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Start {
        recording_id: Uuid,
        format: EncodingFormat,
    },
    Fragment {
        data: Vec<u8>,
    },
    StopRequested,
    RecorderStopped,
    RecorderFault {
        message: String,
    },
    /// Widget closed or upload finished: drop everything
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    ClearBuffer,
    Append { data: Vec<u8> },
    StopRecorder,
    ReleaseRecorder,
}

/// Reducer function: (state, event) -> (next_state, effects)
///
/// Key rules:
/// - Fragments are appended only while recording, including the window
///   between a stop request and the recorder's confirmation
/// - Zero-length fragments are dropped
/// - Stop is idempotent
/// - A fault finalizes the recording with whatever was collected
pub fn reduce(state: &SessionState, event: SessionEvent) -> (SessionState, Vec<SessionEffect>) {
    use SessionEffect::*;
    use SessionEvent::*;
    use SessionState::*;

    match (state, event) {
        // -----------------
        // Start (fresh buffer every time)
        // -----------------
        (Idle | Stopped { .. }, Start { recording_id, format }) => (
            Recording {
                recording_id,
                format,
                started_at: Instant::now(),
                stop_requested: false,
            },
            vec![ClearBuffer],
        ),
        (Recording { recording_id, .. }, Start { .. }) => {
            log::warn!("Start ignored: recording {} already running", recording_id);
            (state.clone(), vec![])
        }

        // -----------------
        // Fragments
        // -----------------
        (Recording { .. }, Fragment { data }) if data.is_empty() => (state.clone(), vec![]),
        (Recording { .. }, Fragment { data }) => (state.clone(), vec![Append { data }]),
        (_, Fragment { data }) => {
            log::debug!("Dropping {}-byte fragment outside of a recording", data.len());
            (state.clone(), vec![])
        }

        // -----------------
        // Stop
        // -----------------
        (
            Recording {
                recording_id,
                format,
                started_at,
                stop_requested: false,
            },
            StopRequested,
        ) => (
            Recording {
                recording_id: *recording_id,
                format: format.clone(),
                started_at: *started_at,
                stop_requested: true,
            },
            vec![StopRecorder],
        ),
        (_, StopRequested) => (state.clone(), vec![]),

        (
            Recording {
                recording_id,
                format,
                ..
            },
            RecorderStopped,
        ) => (
            Stopped {
                recording_id: *recording_id,
                format: format.clone(),
                fault: None,
            },
            vec![ReleaseRecorder],
        ),
        (_, RecorderStopped) => (state.clone(), vec![]),

        // -----------------
        // Hardware fault: keep the partial buffer
        // -----------------
        (
            Recording {
                recording_id,
                format,
                stop_requested,
                ..
            },
            RecorderFault { message },
        ) => {
            log::error!("Recording {} faulted: {}", recording_id, message);
            let mut effects = Vec::new();
            if !stop_requested {
                effects.push(StopRecorder);
            }
            effects.push(ReleaseRecorder);
            (
                Stopped {
                    recording_id: *recording_id,
                    format: format.clone(),
                    fault: Some(message),
                },
                effects,
            )
        }
        (_, RecorderFault { message }) => {
            log::warn!("Ignoring recorder fault outside of a recording: {}", message);
            (state.clone(), vec![])
        }

        // -----------------
        // Reset
        // -----------------
        (Recording { stop_requested, .. }, Reset) => {
            let mut effects = Vec::new();
            if !stop_requested {
                effects.push(StopRecorder);
            }
            effects.push(ReleaseRecorder);
            effects.push(ClearBuffer);
            (Idle, effects)
        }
        (Stopped { .. }, Reset) => (Idle, vec![ClearBuffer]),
        (Idle, Reset) => (Idle, vec![]),
    }
}
