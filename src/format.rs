//! Encoding format negotiation
//!
//! Candidates are tried strictly in priority order against the platform
//! recorder. Negotiation never fails: when nothing is supported the baseline
//! WebM format is used.

use crate::capture::CaptureBackend;

/// Terminal fallback when no candidate is supported.
pub const BASELINE_MIME_TYPE: &str = "video/webm";

/// Default preference order, most widely playable container first.
pub const DEFAULT_CANDIDATES: [&str; 3] = ["video/mp4", "video/webm;codecs=h264", "video/webm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    WebM,
}

impl Container {
    pub fn file_extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
        }
    }
}

/// A recorder MIME type such as `video/webm;codecs=h264`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodingFormat {
    mime_type: String,
}

impl EncodingFormat {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }

    pub fn baseline() -> Self {
        Self::new(BASELINE_MIME_TYPE)
    }

    /// Full MIME string including codec parameters.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn container(&self) -> Container {
        if self.mime_type.to_ascii_lowercase().contains("mp4") {
            Container::Mp4
        } else {
            Container::WebM
        }
    }

    pub fn file_extension(&self) -> &'static str {
        self.container().file_extension()
    }
}

impl std::fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mime_type)
    }
}

/// Ordered list of candidate formats.
#[derive(Debug, Clone)]
pub struct FormatNegotiator {
    candidates: Vec<EncodingFormat>,
}

impl Default for FormatNegotiator {
    fn default() -> Self {
        Self::new(DEFAULT_CANDIDATES.iter().map(|m| EncodingFormat::new(*m)).collect())
    }
}

impl FormatNegotiator {
    pub fn new(candidates: Vec<EncodingFormat>) -> Self {
        Self { candidates }
    }

    pub fn from_mime_types<S: AsRef<str>>(mime_types: &[S]) -> Self {
        Self::new(
            mime_types
                .iter()
                .map(|m| EncodingFormat::new(m.as_ref()))
                .collect(),
        )
    }

    pub fn candidates(&self) -> &[EncodingFormat] {
        &self.candidates
    }

    /// First candidate accepted by `is_supported`, else the baseline.
    pub fn negotiate<F>(&self, is_supported: F) -> EncodingFormat
    where
        F: Fn(&str) -> bool,
    {
        self.candidates
            .iter()
            .find(|candidate| is_supported(candidate.mime_type()))
            .cloned()
            .unwrap_or_else(EncodingFormat::baseline)
    }

    /// Negotiate against the platform recorder of `capture`.
    pub fn negotiate_with<C>(&self, capture: &C) -> EncodingFormat
    where
        C: CaptureBackend + ?Sized,
    {
        let format = self.negotiate(|mime| capture.is_type_supported(mime));
        log::info!("Negotiated recording format: {}", format);
        format
    }
}
