use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::format::DEFAULT_CANDIDATES;

const SETTINGS_DIR_NAME: &str = "wellness-recorder";
const SETTINGS_FILE_NAME: &str = "recorder.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Scheme, host and port of the media ingestion service.
    pub ingest_base_url: String,

    /// Path of the multipart upload route on the ingestion service.
    pub upload_path: String,

    /// Whole-request timeout for one upload attempt.
    pub upload_timeout_secs: u64,

    /// How long `stop` waits for the recorder to confirm before the
    /// recording is finalized as faulted.
    pub stop_timeout_ms: u64,

    /// Recorder MIME types in preference order.
    pub format_candidates: Vec<String>,

    pub ideal_width: u32,
    pub ideal_height: u32,

    /// Uploaded file name without extension.
    pub file_stem: String,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            ingest_base_url: "http://localhost:5000".to_string(),
            upload_path: "/upload/video".to_string(),
            upload_timeout_secs: 60,
            stop_timeout_ms: 5000,
            format_candidates: DEFAULT_CANDIDATES.iter().map(|m| m.to_string()).collect(),
            ideal_width: 1280,
            ideal_height: 720,
            file_stem: "recording".to_string(),
        }
    }
}

impl RecorderSettings {
    /// Full URL of the upload route.
    pub fn upload_url(&self) -> String {
        format!(
            "{}/{}",
            self.ingest_base_url.trim_end_matches('/'),
            self.upload_path.trim_start_matches('/')
        )
    }
}

/// `<config dir>/wellness-recorder/recorder.json`, when a config dir exists.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
}

pub fn load_settings(path: &Path) -> RecorderSettings {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<RecorderSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                RecorderSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => RecorderSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            RecorderSettings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &RecorderSettings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory {:?}: {}", parent, e))?;
    }

    let contents =
        serde_json::to_string_pretty(settings).map_err(|e| format!("Serialize settings: {}", e))?;

    // Write to a sibling temp file, then rename over the target.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents)
        .map_err(|e| format!("Write temp settings {:?}: {}", tmp_path, e))?;

    // rename() does not replace an existing file on Windows
    if cfg!(windows) && path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(format!("Remove existing settings file {:?}: {}", path, e));
            }
        }
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("Rename temp settings {:?} to {:?}: {}", tmp_path, path, e))?;
    Ok(())
}
