//! Recorder controller
//!
//! The widget contract: `open`, `select_device`, `start`, `pump`, `stop`,
//! `submit`, `close`. The controller is the only owner of the capture stream
//! and of all widget state; every operation ends by publishing a fresh
//! [`WidgetState`] snapshot.
//!
//! Operations take `&mut self`, so two enumerations or two uploads can never
//! run at the same time on one controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::capture::{ActiveStream, CaptureBackend};
use crate::devices::DeviceInventory;
use crate::errors::{NotReadyError, RecorderError};
use crate::format::FormatNegotiator;
use crate::permission::{AcquirePurpose, PermissionError, PermissionGate, Readiness};
use crate::session::RecordingSession;
use crate::settings::RecorderSettings;
use crate::ui_state::{widget_state, WidgetState};
use crate::upload::{IngestTransport, UploadAck, UploadClient};

pub struct RecorderController<C: CaptureBackend, T: IngestTransport> {
    capture: C,
    gate: PermissionGate,
    inventory: DeviceInventory,
    negotiator: FormatNegotiator,
    session: RecordingSession,
    uploader: UploadClient<T>,
    stream: Option<ActiveStream>,
    error: Option<String>,
    uploading: Arc<AtomicBool>,
    ui_tx: watch::Sender<WidgetState>,
}

impl<C: CaptureBackend, T: IngestTransport> RecorderController<C, T> {
    pub fn new(capture: C, transport: T, settings: &RecorderSettings) -> Self {
        let (ui_tx, _) = watch::channel(WidgetState::default());
        Self {
            capture,
            gate: PermissionGate::new(settings.ideal_width, settings.ideal_height),
            inventory: DeviceInventory::new(),
            negotiator: FormatNegotiator::from_mime_types(&settings.format_candidates),
            session: RecordingSession::new(Duration::from_millis(settings.stop_timeout_ms)),
            uploader: UploadClient::new(transport, settings.file_stem.clone()),
            stream: None,
            error: None,
            uploading: Arc::new(AtomicBool::new(false)),
            ui_tx,
        }
    }

    /// Receive every published widget snapshot.
    pub fn subscribe(&self) -> watch::Receiver<WidgetState> {
        self.ui_tx.subscribe()
    }

    pub fn snapshot(&self) -> WidgetState {
        widget_state(
            self.gate.readiness(),
            &self.inventory,
            &self.session,
            self.error.as_deref(),
            self.is_uploading(),
        )
    }

    pub fn inventory(&self) -> &DeviceInventory {
        &self.inventory
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::SeqCst)
    }

    /// Mount the widget: acquire access, then enumerate cameras.
    ///
    /// Calling it again after a failure is the retry entry point. Rejected
    /// while recording, since the recorder is bound to the current stream.
    pub async fn open(&mut self) -> Result<(), RecorderError> {
        let result = self.open_inner().await;
        self.finish(result)
    }

    async fn open_inner(&mut self) -> Result<(), RecorderError> {
        if self.session.is_recording() {
            return Err(NotReadyError::RecordingInProgress.into());
        }
        self.release_stream();

        let selected = self.inventory.selected_id().map(str::to_string);
        let stream = self
            .gate
            .acquire(&self.capture, selected.as_deref(), AcquirePurpose::Open)
            .await?;
        self.stream = Some(stream);
        self.error = None;
        self.enumerate().await
    }

    /// Re-enumerate cameras (e.g. after hotplug). Requires granted access.
    pub async fn refresh_devices(&mut self) -> Result<(), RecorderError> {
        let result = self.enumerate().await;
        self.finish(result)
    }

    async fn enumerate(&mut self) -> Result<(), RecorderError> {
        if self.stream.is_none() {
            return Err(NotReadyError::NoActiveStream.into());
        }
        let listed = self.inventory.enumerate(&self.capture).await.map(|_| ());
        if let Err(failure) = listed {
            // A stream without a device list is not usable. A running
            // recorder keeps its stream until it is stopped.
            if !self.session.is_recording() {
                self.release_stream();
                self.gate.mark_failed();
            }
            return Err(PermissionError::new(failure, AcquirePurpose::Open).into());
        }
        Ok(())
    }

    /// Switch cameras. Rejected while recording; otherwise the current
    /// stream is released and a new one is acquired for the chosen device.
    pub async fn select_device(&mut self, device_id: Option<&str>) -> Result<(), RecorderError> {
        let result = self.select_device_inner(device_id).await;
        self.finish(result)
    }

    async fn select_device_inner(&mut self, device_id: Option<&str>) -> Result<(), RecorderError> {
        if self.session.is_recording() {
            return Err(NotReadyError::RecordingInProgress.into());
        }
        if self.stream.is_some() && self.inventory.selected_id() == device_id {
            return Ok(());
        }

        self.inventory.select(device_id)?;
        self.release_stream();
        let stream = self
            .gate
            .acquire(&self.capture, device_id, AcquirePurpose::DeviceSwitch)
            .await?;
        self.stream = Some(stream);
        self.error = None;
        Ok(())
    }

    /// Start recording with a format negotiated against the current stream.
    pub fn start(&mut self) -> Result<Uuid, RecorderError> {
        let result = self.start_inner();
        if result.is_ok() {
            self.error = None;
        }
        self.finish(result)
    }

    fn start_inner(&mut self) -> Result<Uuid, RecorderError> {
        if self.is_uploading() {
            return Err(NotReadyError::UploadInProgress.into());
        }
        if self.stream.is_none() {
            return Err(NotReadyError::NoActiveStream.into());
        }
        let format = self.negotiator.negotiate_with(&self.capture);
        let recording_id = self
            .session
            .start(self.stream.as_ref(), format, &self.capture)?;
        log::info!("Recording {} started", recording_id);
        Ok(recording_id)
    }

    /// Pull in every fragment delivered so far without waiting.
    pub fn pump(&mut self) -> Result<usize, RecorderError> {
        let result = self.session.pump();
        self.finish(result)
    }

    /// Stop recording and wait for the recorder to confirm. Idempotent.
    pub async fn stop(&mut self) -> Result<(), RecorderError> {
        let result = self.session.stop().await;
        self.finish(result)
    }

    /// Upload the finished recording. On success the session is cleared
    /// back to idle; on failure the recording stays intact for a retry.
    pub async fn submit(&mut self) -> Result<UploadAck, RecorderError> {
        let result = self.submit_inner().await;
        self.finish(result)
    }

    async fn submit_inner(&mut self) -> Result<UploadAck, RecorderError> {
        if self.session.is_recording() {
            return Err(NotReadyError::RecordingInProgress.into());
        }
        let recording = self
            .session
            .finalized()
            .ok_or(NotReadyError::NothingToUpload)?;

        let _uploading = UploadingFlag::raise(&self.uploading);
        self.publish();
        let ack = self.uploader.upload(recording).await?;
        self.session.reset();
        self.error = None;
        Ok(ack)
    }

    /// Unmount the widget: stop any recording without confirmation, drop
    /// the buffer and release the stream.
    pub fn close(&mut self) {
        if self.session.is_recording() {
            log::warn!("Closing recorder while recording; discarding the recording");
        }
        self.session.reset();
        self.release_stream();
        self.inventory.clear();
        self.error = None;
        self.uploading.store(false, Ordering::SeqCst);
        self.publish();
        log::info!("Recorder closed");
    }

    fn release_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            log::info!("Releasing capture stream {}", stream.id());
            self.capture.release(stream);
        }
        self.gate.reset();
    }

    /// Record a failure in widget state, then publish.
    fn finish<R>(&mut self, result: Result<R, RecorderError>) -> Result<R, RecorderError> {
        if let Err(e) = &result {
            if e.is_contract_violation() {
                log::warn!("Recorder contract violation: {}", e);
            } else {
                log::error!("Recorder error: {}", e);
            }
            self.error = Some(e.user_message());
        }
        self.publish();
        result
    }

    fn publish(&self) {
        let state = self.snapshot();
        log::debug!("Widget state: {:?}", state);
        self.ui_tx.send_replace(state);
    }

    pub fn readiness(&self) -> Readiness {
        self.gate.readiness()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Keeps the uploading flag raised until dropped, including when the
/// `submit` future is cancelled.
struct UploadingFlag(Arc<AtomicBool>);

impl UploadingFlag {
    fn raise(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for UploadingFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<C: CaptureBackend, T: IngestTransport> Drop for RecorderController<C, T> {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.capture.release(stream);
        }
    }
}
