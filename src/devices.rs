//! Capture device inventory
//!
//! Holds the most recent snapshot of video-input devices and the current
//! selection. Each enumeration replaces the whole list; the selection is only
//! ever filled in automatically when nothing is selected. A selected id that
//! disappears from a later snapshot is kept as-is (dangling).

use serde::Serialize;

use crate::capture::{AccessFailure, CaptureBackend, DeviceKind, MediaDeviceInfo};
use crate::errors::NotReadyError;

/// A video-input device from one enumeration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDevice {
    pub id: String,
    pub label: Option<String>,
}

impl CaptureDevice {
    /// Platform label, or a short id-based name when the label is missing.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => {
                let short: String = self.id.chars().take(8).collect();
                format!("Camera {}...", short)
            }
        }
    }
}

impl From<MediaDeviceInfo> for CaptureDevice {
    fn from(info: MediaDeviceInfo) -> Self {
        let label = if info.label.is_empty() {
            None
        } else {
            Some(info.label)
        };
        Self {
            id: info.device_id,
            label,
        }
    }
}

#[derive(Debug, Default)]
pub struct DeviceInventory {
    devices: Vec<CaptureDevice>,
    selected: Option<String>,
}

impl DeviceInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[CaptureDevice] {
        &self.devices
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The selected device, if it is still part of the current snapshot.
    pub fn selected_device(&self) -> Option<&CaptureDevice> {
        let id = self.selected.as_deref()?;
        self.devices.iter().find(|d| d.id == id)
    }

    /// Whether the selection points at a device missing from the snapshot.
    pub fn is_selection_dangling(&self) -> bool {
        self.selected.is_some() && self.selected_device().is_none()
    }

    /// Replace the snapshot with the video inputs of `listing`.
    pub fn replace(&mut self, listing: Vec<MediaDeviceInfo>) -> &[CaptureDevice] {
        self.devices = listing
            .into_iter()
            .filter(|d| d.kind == DeviceKind::VideoInput)
            .map(CaptureDevice::from)
            .collect();

        if self.selected.is_none() {
            if let Some(first) = self.devices.first() {
                log::info!("Auto-selecting capture device {}", first.id);
                self.selected = Some(first.id.clone());
            }
        } else if self.is_selection_dangling() {
            log::warn!(
                "Selected capture device {:?} is no longer listed",
                self.selected
            );
        }

        log::debug!("Device inventory now holds {} camera(s)", self.devices.len());
        &self.devices
    }

    /// Enumerate through `capture` and replace the snapshot.
    pub async fn enumerate<C>(&mut self, capture: &C) -> Result<&[CaptureDevice], AccessFailure>
    where
        C: CaptureBackend + ?Sized,
    {
        let listing = capture.enumerate_devices().await?;
        Ok(self.replace(listing))
    }

    /// Select a device from the current snapshot; `None` clears the selection.
    pub fn select(&mut self, id: Option<&str>) -> Result<(), NotReadyError> {
        match id {
            None => {
                self.selected = None;
                Ok(())
            }
            Some(id) if self.devices.iter().any(|d| d.id == id) => {
                self.selected = Some(id.to_string());
                Ok(())
            }
            Some(id) => Err(NotReadyError::UnknownDevice(id.to_string())),
        }
    }

    /// Forget everything (widget closed).
    pub fn clear(&mut self) {
        self.devices.clear();
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_device_is_auto_selected() {
        let mut inventory = DeviceInventory::new();
        inventory.replace(vec![
            MediaDeviceInfo::video("d1", "Front"),
            MediaDeviceInfo::video("d2", "Back"),
        ]);
        assert_eq!(inventory.selected_id(), Some("d1"));
        assert_eq!(inventory.devices().len(), 2);
    }

    #[test]
    fn stale_selection_is_not_corrected() {
        let mut inventory = DeviceInventory::new();
        inventory.replace(vec![
            MediaDeviceInfo::video("d1", "Front"),
            MediaDeviceInfo::video("d2", "Back"),
        ]);
        inventory.select(Some("d2")).unwrap();

        inventory.replace(vec![MediaDeviceInfo::video("d1", "Front")]);
        assert_eq!(inventory.selected_id(), Some("d2"));
        assert!(inventory.is_selection_dangling());
        assert!(inventory.selected_device().is_none());
    }

    #[test]
    fn non_video_devices_are_filtered_out() {
        let mut inventory = DeviceInventory::new();
        let devices = inventory.replace(vec![
            MediaDeviceInfo::audio("mic", "Mic"),
            MediaDeviceInfo::video("cam", "Cam"),
        ]);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "cam");
        assert_eq!(inventory.selected_id(), Some("cam"));
    }

    #[test]
    fn reenumeration_replaces_instead_of_merging() {
        let mut inventory = DeviceInventory::new();
        inventory.replace(vec![MediaDeviceInfo::video("d1", "One")]);
        inventory.replace(vec![MediaDeviceInfo::video("d3", "Three")]);
        let ids: Vec<_> = inventory.devices().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d3"]);
    }

    #[test]
    fn empty_listing_leaves_selection_empty() {
        let mut inventory = DeviceInventory::new();
        inventory.replace(vec![]);
        assert_eq!(inventory.selected_id(), None);
    }

    #[test]
    fn unknown_device_cannot_be_selected() {
        let mut inventory = DeviceInventory::new();
        inventory.replace(vec![MediaDeviceInfo::video("d1", "One")]);
        assert_eq!(
            inventory.select(Some("nope")),
            Err(NotReadyError::UnknownDevice("nope".to_string()))
        );
        assert_eq!(inventory.selected_id(), Some("d1"));

        inventory.select(None).unwrap();
        assert_eq!(inventory.selected_id(), None);
    }

    #[test]
    fn missing_label_falls_back_to_short_id() {
        let device = CaptureDevice::from(MediaDeviceInfo::video("0123456789abcdef", ""));
        assert_eq!(device.label, None);
        assert_eq!(device.display_label(), "Camera 01234567...");

        let labelled = CaptureDevice::from(MediaDeviceInfo::video("x", "Studio Cam"));
        assert_eq!(labelled.display_label(), "Studio Cam");
    }
}
