//! Scripted capture backend
//!
//! Behaves like a well-mannered platform: it hands out streams unless told to
//! refuse, lists whatever devices it was given, and exposes each recorder it
//! starts as a [`RecorderFeed`] so the caller decides which fragments arrive
//! and when.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::backend::CaptureBackend;
use super::types::{
    AccessFailure, ActiveStream, CaptureEvent, DeviceKind, MediaDeviceInfo, RecorderControl,
    RecorderHandle, StreamConstraints,
};
use crate::format::{EncodingFormat, BASELINE_MIME_TYPE};

struct SyntheticState {
    devices: Vec<MediaDeviceInfo>,
    access_failure: Option<AccessFailure>,
    enumeration_failure: Option<AccessFailure>,
    recorder_failure: Option<String>,
    supported: Vec<String>,
    auto_confirm_stop: bool,
    live_streams: usize,
    acquisitions: Vec<StreamConstraints>,
    feeds: Vec<RecorderFeed>,
}

/// Cloneable handle; all clones share the same scripted platform.
#[derive(Clone)]
pub struct SyntheticCapture {
    inner: Arc<Mutex<SyntheticState>>,
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticCapture {
    /// A platform with no devices that supports only the baseline format
    /// and confirms stop requests immediately.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SyntheticState {
                devices: Vec::new(),
                access_failure: None,
                enumeration_failure: None,
                recorder_failure: None,
                supported: vec![BASELINE_MIME_TYPE.to_string()],
                auto_confirm_stop: true,
                live_streams: 0,
                acquisitions: Vec::new(),
                feeds: Vec::new(),
            })),
        }
    }

    pub fn with_devices(self, devices: Vec<MediaDeviceInfo>) -> Self {
        self.set_devices(devices);
        self
    }

    /// Replace the device list (simulates hotplug).
    pub fn set_devices(&self, devices: Vec<MediaDeviceInfo>) {
        self.inner.lock().devices = devices;
    }

    pub fn deny_access(&self, failure: AccessFailure) {
        self.inner.lock().access_failure = Some(failure);
    }

    /// Streams are still handed out, but listing devices fails.
    pub fn fail_enumeration(&self, failure: AccessFailure) {
        self.inner.lock().enumeration_failure = Some(failure);
    }

    pub fn grant_access(&self) {
        let mut state = self.inner.lock();
        state.access_failure = None;
        state.enumeration_failure = None;
    }

    /// Make the next `start_recorder` calls fail with `message`.
    pub fn fail_recorder(&self, message: impl Into<String>) {
        self.inner.lock().recorder_failure = Some(message.into());
    }

    pub fn set_supported(&self, mime_types: &[&str]) {
        self.inner.lock().supported = mime_types.iter().map(|m| m.to_string()).collect();
    }

    /// When disabled, stop requests are only confirmed through
    /// [`RecorderFeed::confirm_stop`].
    pub fn set_auto_confirm_stop(&self, enabled: bool) {
        self.inner.lock().auto_confirm_stop = enabled;
    }

    /// Streams handed out and not yet released.
    pub fn live_streams(&self) -> usize {
        self.inner.lock().live_streams
    }

    /// Constraints of the most recent successful acquisition.
    pub fn last_constraints(&self) -> Option<StreamConstraints> {
        self.inner.lock().acquisitions.last().cloned()
    }

    /// Feed of the most recently started recorder.
    pub fn feed(&self) -> Option<RecorderFeed> {
        self.inner.lock().feeds.last().cloned()
    }

    pub fn recorders_started(&self) -> usize {
        self.inner.lock().feeds.len()
    }

    /// Forget every recorder feed held by the platform. Once callers drop
    /// their own feeds, the recorders' channels close without a `Stopped`
    /// confirmation, like a camera yanked mid-recording.
    pub fn unplug(&self) {
        self.inner.lock().feeds.clear();
    }
}

#[async_trait]
impl CaptureBackend for SyntheticCapture {
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<ActiveStream, AccessFailure> {
        let mut state = self.inner.lock();
        if let Some(failure) = state.access_failure.clone() {
            return Err(failure);
        }

        let mut cameras = state
            .devices
            .iter()
            .filter(|d| d.kind == DeviceKind::VideoInput);
        let device_id = match &constraints.video.device_id {
            Some(wanted) => cameras
                .find(|d| &d.device_id == wanted)
                .map(|d| d.device_id.clone())
                .ok_or(AccessFailure::NoDevice)?,
            None => cameras
                .next()
                .map(|d| d.device_id.clone())
                .ok_or(AccessFailure::NoDevice)?,
        };

        state.live_streams += 1;
        state.acquisitions.push(constraints.clone());
        Ok(ActiveStream::new(Some(device_id)))
    }

    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, AccessFailure> {
        let state = self.inner.lock();
        match &state.enumeration_failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(state.devices.clone()),
        }
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.inner.lock().supported.iter().any(|m| m == mime_type)
    }

    fn start_recorder(
        &self,
        _stream: &ActiveStream,
        format: &EncodingFormat,
    ) -> Result<RecorderHandle, String> {
        let mut state = self.inner.lock();
        if let Some(message) = state.recorder_failure.clone() {
            return Err(message);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let feed = RecorderFeed {
            tx,
            stop_requested: Arc::new(AtomicBool::new(false)),
            format: format.clone(),
        };
        state.feeds.push(feed.clone());

        Ok(RecorderHandle {
            events: rx,
            control: Box::new(SyntheticControl {
                tx: feed.tx.downgrade(),
                stop_requested: feed.stop_requested.clone(),
                auto_confirm: state.auto_confirm_stop,
            }),
        })
    }

    fn release(&self, stream: ActiveStream) {
        let mut state = self.inner.lock();
        state.live_streams = state.live_streams.saturating_sub(1);
        log::debug!("Synthetic stream {} released", stream.id());
    }
}

/// Producer side of one synthetic recorder.
#[derive(Clone)]
pub struct RecorderFeed {
    tx: mpsc::UnboundedSender<CaptureEvent>,
    stop_requested: Arc<AtomicBool>,
    format: EncodingFormat,
}

impl RecorderFeed {
    /// Deliver one fragment. Returns false once the consumer is gone.
    pub fn push(&self, data: impl Into<Vec<u8>>) -> bool {
        self.tx.send(CaptureEvent::Data(data.into())).is_ok()
    }

    pub fn fault(&self, message: impl Into<String>) -> bool {
        self.tx.send(CaptureEvent::Fault(message.into())).is_ok()
    }

    pub fn confirm_stop(&self) -> bool {
        self.tx.send(CaptureEvent::Stopped).is_ok()
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn format(&self) -> &EncodingFormat {
        &self.format
    }
}

struct SyntheticControl {
    tx: mpsc::WeakUnboundedSender<CaptureEvent>,
    stop_requested: Arc<AtomicBool>,
    auto_confirm: bool,
}

impl RecorderControl for SyntheticControl {
    fn request_stop(&mut self) {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.auto_confirm {
            return;
        }
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(CaptureEvent::Stopped);
        }
    }
}
