//! Video capture and upload core of the wellness companion recorder widget.
//!
//! The [`RecorderController`] is the widget contract. It coordinates the
//! capture hardware (behind [`CaptureBackend`]), the recording session state
//! machine and the upload to the media ingestion endpoint (behind
//! [`IngestTransport`]).

pub mod capture;
pub mod controller;
pub mod devices;
pub mod errors;
pub mod format;
pub mod permission;
pub mod session;
pub mod settings;
pub mod state_machine;
pub mod ui_state;
pub mod upload;

pub use capture::{CaptureBackend, SyntheticCapture};
pub use controller::RecorderController;
pub use errors::{NotReadyError, RecorderError};
pub use format::{EncodingFormat, FormatNegotiator};
pub use permission::{PermissionError, Readiness};
pub use settings::RecorderSettings;
pub use ui_state::WidgetState;
pub use upload::{HttpIngestTransport, IngestTransport, UploadAck, UploadError};

/// Install an `env_logger` backend at `level`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .is_test(cfg!(test))
        .try_init();
}
