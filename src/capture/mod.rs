//! Capture subsystem seam
//!
//! The recorder never talks to hardware directly. A platform layer implements
//! [`CaptureBackend`]; [`SyntheticCapture`] is a scripted implementation for
//! tests and hosts without a camera.

mod backend;
pub mod synthetic;
mod types;

pub use backend::CaptureBackend;
pub use synthetic::{RecorderFeed, SyntheticCapture};
pub use types::{
    AccessFailure, ActiveStream, CaptureEvent, DeviceKind, MediaDeviceInfo, RecorderControl,
    RecorderHandle, StreamConstraints, VideoConstraints,
};
