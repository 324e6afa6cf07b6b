//! Recording session
//!
//! Owns the recording buffer and the receiving end of the recorder's
//! fragment channel. It is the single consumer of that channel, so arrival
//! order is preserved. State changes go through
//! [`reduce`](crate::state_machine::reduce); this type only executes the
//! effects it returns.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TryRecvError;
use uuid::Uuid;

use crate::capture::{ActiveStream, CaptureBackend, CaptureEvent, RecorderHandle};
use crate::errors::{NotReadyError, RecorderError};
use crate::format::EncodingFormat;
use crate::state_machine::{reduce, SessionEffect, SessionEvent, SessionState};

/// Append-only list of fragments for one recording attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingBuffer {
    fragments: Vec<Vec<u8>>,
}

impl RecordingBuffer {
    fn push(&mut self, fragment: Vec<u8>) {
        self.fragments.push(fragment);
    }

    fn clear(&mut self) {
        self.fragments.clear();
    }

    pub fn fragments(&self) -> &[Vec<u8>] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.fragments.iter().map(Vec::len).sum()
    }
}

/// A frozen copy of a stopped recording, handed to the upload client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedRecording {
    pub recording_id: Uuid,
    pub format: EncodingFormat,
    pub fragments: Vec<Vec<u8>>,
    /// The recording ended with a hardware fault
    pub partial: bool,
    pub finalized_at: DateTime<Utc>,
}

impl FinalizedRecording {
    pub fn total_bytes(&self) -> usize {
        self.fragments.iter().map(Vec::len).sum()
    }

    /// Fragments concatenated in delivery order.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(self.total_bytes());
        for fragment in &self.fragments {
            blob.extend_from_slice(fragment);
        }
        blob
    }
}

pub struct RecordingSession {
    state: SessionState,
    buffer: RecordingBuffer,
    recorder: Option<RecorderHandle>,
    stop_timeout: Duration,
}

impl RecordingSession {
    pub fn new(stop_timeout: Duration) -> Self {
        Self {
            state: SessionState::Idle,
            buffer: RecordingBuffer::default(),
            recorder: None,
            stop_timeout,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn buffer(&self) -> &RecordingBuffer {
        &self.buffer
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    /// Begin a new recording into a fresh buffer.
    pub fn start<C>(
        &mut self,
        stream: Option<&ActiveStream>,
        format: EncodingFormat,
        capture: &C,
    ) -> Result<Uuid, RecorderError>
    where
        C: CaptureBackend + ?Sized,
    {
        if self.state.is_recording() {
            return Err(NotReadyError::AlreadyRecording.into());
        }
        let stream = stream.ok_or(NotReadyError::NoActiveStream)?;

        let handle = capture
            .start_recorder(stream, &format)
            .map_err(RecorderError::HardwareFault)?;

        let recording_id = Uuid::new_v4();
        self.apply(SessionEvent::Start {
            recording_id,
            format,
        });
        self.recorder = Some(handle);
        Ok(recording_id)
    }

    /// Drain every fragment already delivered, without waiting.
    ///
    /// Returns the number of events consumed. A fault is applied (keeping
    /// the partial buffer) and then reported.
    pub fn pump(&mut self) -> Result<usize, RecorderError> {
        let mut consumed = 0;
        loop {
            let next = match self.recorder.as_mut() {
                Some(handle) => handle.events.try_recv(),
                None => return Ok(consumed),
            };
            match next {
                Ok(event) => {
                    consumed += 1;
                    self.handle_capture_event(event)?;
                }
                Err(TryRecvError::Empty) => return Ok(consumed),
                Err(TryRecvError::Disconnected) => {
                    self.handle_disconnect()?;
                    return Ok(consumed);
                }
            }
        }
    }

    /// Ask the recorder to stop and consume everything it still delivers
    /// until it confirms. A no-op unless recording.
    pub async fn stop(&mut self) -> Result<(), RecorderError> {
        if !self.state.is_recording() {
            log::debug!("Stop ignored: no recording running");
            return Ok(());
        }

        self.apply(SessionEvent::StopRequested);

        let timeout = self.stop_timeout;
        let outcome = tokio::time::timeout(timeout, self.await_confirmation()).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                let message = format!("recorder did not confirm stop within {:?}", timeout);
                self.apply(SessionEvent::RecorderFault {
                    message: message.clone(),
                });
                Err(RecorderError::HardwareFault(message))
            }
        }
    }

    async fn await_confirmation(&mut self) -> Result<(), RecorderError> {
        while self.state.is_recording() {
            let next = match self.recorder.as_mut() {
                Some(handle) => handle.events.recv().await,
                None => None,
            };
            match next {
                Some(event) => self.handle_capture_event(event)?,
                None => self.handle_disconnect()?,
            }
        }
        Ok(())
    }

    /// Drop the recording entirely; forcibly stops a running recorder.
    pub fn reset(&mut self) {
        self.apply(SessionEvent::Reset);
    }

    /// Frozen copy of the buffer, available once stopped with data.
    pub fn finalized(&self) -> Option<FinalizedRecording> {
        match &self.state {
            SessionState::Stopped {
                recording_id,
                format,
                fault,
            } if !self.buffer.is_empty() => Some(FinalizedRecording {
                recording_id: *recording_id,
                format: format.clone(),
                fragments: self.buffer.fragments.clone(),
                partial: fault.is_some(),
                finalized_at: Utc::now(),
            }),
            _ => None,
        }
    }

    fn handle_capture_event(&mut self, event: CaptureEvent) -> Result<(), RecorderError> {
        match event {
            CaptureEvent::Data(data) => self.apply(SessionEvent::Fragment { data }),
            CaptureEvent::Stopped => self.apply(SessionEvent::RecorderStopped),
            CaptureEvent::Fault(message) => {
                let was_recording = self.state.is_recording();
                self.apply(SessionEvent::RecorderFault {
                    message: message.clone(),
                });
                if was_recording {
                    return Err(RecorderError::HardwareFault(message));
                }
            }
        }
        Ok(())
    }

    /// The recorder went away without a confirmation.
    fn handle_disconnect(&mut self) -> Result<(), RecorderError> {
        let stop_requested = match &self.state {
            SessionState::Recording { stop_requested, .. } => Some(*stop_requested),
            _ => None,
        };
        match stop_requested {
            Some(true) => {
                self.apply(SessionEvent::RecorderStopped);
                Ok(())
            }
            Some(false) => {
                let message = "capture ended unexpectedly".to_string();
                self.apply(SessionEvent::RecorderFault {
                    message: message.clone(),
                });
                Err(RecorderError::HardwareFault(message))
            }
            None => {
                self.recorder = None;
                Ok(())
            }
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        let old_discriminant = std::mem::discriminant(&self.state);
        let (next, effects) = reduce(&self.state, event);
        if old_discriminant != std::mem::discriminant(&next) {
            log::info!("Session transition: {:?} -> {:?}", self.state, next);
        }
        self.state = next;

        for effect in effects {
            match effect {
                SessionEffect::ClearBuffer => self.buffer.clear(),
                SessionEffect::Append { data } => {
                    log::debug!(
                        "Fragment {} appended ({} bytes)",
                        self.buffer.len(),
                        data.len()
                    );
                    self.buffer.push(data);
                }
                SessionEffect::StopRecorder => {
                    if let Some(handle) = self.recorder.as_mut() {
                        handle.control.request_stop();
                    }
                }
                SessionEffect::ReleaseRecorder => self.recorder = None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MediaDeviceInfo, SyntheticCapture};
    use proptest::prelude::*;

    fn setup() -> (SyntheticCapture, ActiveStream, RecordingSession) {
        let capture = SyntheticCapture::new().with_devices(vec![MediaDeviceInfo::video("cam", "Cam")]);
        let stream = ActiveStream::new(Some("cam".to_string()));
        (capture, stream, RecordingSession::new(Duration::from_millis(200)))
    }

    #[test]
    fn start_without_stream_is_not_ready() {
        let (capture, _, mut session) = setup();
        let err = session
            .start(None, EncodingFormat::baseline(), &capture)
            .unwrap_err();
        assert!(matches!(
            err,
            RecorderError::NotReady(NotReadyError::NoActiveStream)
        ));
        assert!(matches!(session.state(), SessionState::Idle));
    }

    #[test]
    fn recorder_start_failure_is_a_hardware_fault() {
        let (capture, stream, mut session) = setup();
        capture.fail_recorder("encoder busy");
        let err = session
            .start(Some(&stream), EncodingFormat::baseline(), &capture)
            .unwrap_err();
        assert!(matches!(err, RecorderError::HardwareFault(ref m) if m == "encoder busy"));
        assert!(matches!(session.state(), SessionState::Idle));
    }

    #[tokio::test]
    async fn fragments_keep_delivery_order_and_drop_empties() {
        let (capture, stream, mut session) = setup();
        session
            .start(Some(&stream), EncodingFormat::baseline(), &capture)
            .unwrap();
        let feed = capture.feed().unwrap();

        feed.push(vec![1, 2, 3]);
        feed.push(Vec::new());
        feed.push(vec![4]);
        assert_eq!(session.pump().unwrap(), 3);
        feed.push(vec![5, 6]);
        feed.push(Vec::new());

        session.stop().await.unwrap();
        let recording = session.finalized().unwrap();
        assert_eq!(recording.fragments, vec![vec![1, 2, 3], vec![4], vec![5, 6]]);
        assert_eq!(recording.to_blob(), vec![1, 2, 3, 4, 5, 6]);
        assert!(!recording.partial);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (capture, stream, mut session) = setup();
        session
            .start(Some(&stream), EncodingFormat::baseline(), &capture)
            .unwrap();
        capture.feed().unwrap().push(vec![7]);

        session.stop().await.unwrap();
        let first = session.finalized().unwrap();
        session.stop().await.unwrap();
        session.stop().await.unwrap();
        assert!(session.state().is_stopped());
        assert_eq!(session.finalized().unwrap().fragments, first.fragments);
    }

    #[tokio::test]
    async fn stop_from_idle_is_a_no_op() {
        let (_, _, mut session) = setup();
        session.stop().await.unwrap();
        assert!(matches!(session.state(), SessionState::Idle));
        assert!(session.finalized().is_none());
    }

    #[tokio::test]
    async fn in_flight_fragments_arrive_before_confirmation() {
        let (capture, stream, mut session) = setup();
        capture.set_auto_confirm_stop(false);
        session
            .start(Some(&stream), EncodingFormat::baseline(), &capture)
            .unwrap();
        let feed = capture.feed().unwrap();
        feed.push(vec![1]);

        let producer = feed.clone();
        let late = tokio::spawn(async move {
            tokio::task::yield_now().await;
            producer.push(vec![2]);
            producer.confirm_stop();
        });

        session.stop().await.unwrap();
        late.await.unwrap();
        assert!(feed.stop_requested());
        assert_eq!(session.buffer().fragments(), &[vec![1], vec![2]]);
    }

    #[tokio::test]
    async fn missing_confirmation_times_out_as_fault() {
        let (capture, stream, mut session) = setup();
        capture.set_auto_confirm_stop(false);
        session
            .start(Some(&stream), EncodingFormat::baseline(), &capture)
            .unwrap();
        let feed = capture.feed().unwrap();
        feed.push(vec![3, 3]);

        let err = session.stop().await.unwrap_err();
        assert!(matches!(err, RecorderError::HardwareFault(_)));
        let recording = session.finalized().unwrap();
        assert!(recording.partial);
        assert_eq!(recording.total_bytes(), 2);
    }

    #[tokio::test]
    async fn fault_preserves_partial_recording() {
        let (capture, stream, mut session) = setup();
        session
            .start(Some(&stream), EncodingFormat::baseline(), &capture)
            .unwrap();
        let feed = capture.feed().unwrap();
        feed.push(vec![1; 10]);
        feed.fault("camera unplugged");
        feed.push(vec![2; 10]);

        let err = session.pump().unwrap_err();
        assert!(matches!(err, RecorderError::HardwareFault(ref m) if m == "camera unplugged"));
        assert!(matches!(
            session.state(),
            SessionState::Stopped { fault: Some(_), .. }
        ));

        let recording = session.finalized().unwrap();
        assert!(recording.partial);
        assert_eq!(recording.fragments, vec![vec![1; 10]]);
    }

    #[tokio::test]
    async fn dropped_recorder_is_a_fault() {
        let (capture, stream, mut session) = setup();
        session
            .start(Some(&stream), EncodingFormat::baseline(), &capture)
            .unwrap();
        capture.feed().unwrap().push(vec![8]);
        capture.unplug();

        let err = session.pump().unwrap_err();
        assert!(matches!(err, RecorderError::HardwareFault(_)));
        assert_eq!(session.finalized().unwrap().fragments, vec![vec![8]]);
    }

    #[tokio::test]
    async fn new_start_discards_previous_buffer() {
        let (capture, stream, mut session) = setup();
        session
            .start(Some(&stream), EncodingFormat::baseline(), &capture)
            .unwrap();
        capture.feed().unwrap().push(vec![1]);
        session.stop().await.unwrap();
        assert_eq!(session.buffer().len(), 1);

        session
            .start(Some(&stream), EncodingFormat::new("video/mp4"), &capture)
            .unwrap();
        assert!(session.buffer().is_empty());
        assert!(session.finalized().is_none());
        assert_eq!(
            session.state().format(),
            Some(&EncodingFormat::new("video/mp4"))
        );
    }

    #[tokio::test]
    async fn reset_stops_running_recorder() {
        let (capture, stream, mut session) = setup();
        session
            .start(Some(&stream), EncodingFormat::baseline(), &capture)
            .unwrap();
        let feed = capture.feed().unwrap();
        feed.push(vec![1]);

        session.reset();
        assert!(feed.stop_requested());
        assert!(matches!(session.state(), SessionState::Idle));
        assert!(session.buffer().is_empty());
    }

    proptest! {
        #[test]
        fn finalized_blob_is_ordered_concatenation_of_non_empty_fragments(
            fragments in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..24),
            pump_every in 1usize..6,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let (capture, stream, mut session) = setup();
            session
                .start(Some(&stream), EncodingFormat::baseline(), &capture)
                .unwrap();
            let feed = capture.feed().unwrap();

            for (i, fragment) in fragments.iter().enumerate() {
                feed.push(fragment.clone());
                if (i + 1) % pump_every == 0 {
                    session.pump().unwrap();
                }
            }
            runtime.block_on(session.stop()).unwrap();

            let stored = session.buffer().fragments();
            prop_assert!(stored.iter().all(|f| !f.is_empty()));
            prop_assert_eq!(stored.len(), fragments.iter().filter(|f| !f.is_empty()).count());

            let expected: Vec<u8> = fragments.iter().flatten().copied().collect();
            match session.finalized() {
                Some(recording) => {
                    prop_assert!(!recording.partial);
                    prop_assert_eq!(recording.to_blob(), expected);
                }
                None => {
                    prop_assert!(expected.is_empty());
                }
            }
        }
    }
}
