//! Controller-owned shared state mutated only by bus handlers.

use serde::Deserialize;
use serde_json::{Map as JsonMap, Value};
use std::path::PathBuf;

/// Default seconds before an unanswered screenshot preview fail-opens to accept.
pub const DEFAULT_SCREENSHOT_PREVIEW_SECS: u64 = 15;

/// Process-wide tracking state. A single instance is created at controller
/// start, injected into the coordination loop and lives until process exit;
/// surfaces never touch it directly and instead go through bus messages.
#[derive(Debug, Clone)]
pub struct ProcessSharedState {
    pub tracking: bool,
    pub uploading: bool,
    pub last_screenshot_path: Option<PathBuf>,
    pub last_screenshot_thumb_path: Option<PathBuf>,
    pub screenshot_preview_timeout_secs: u64,
    pub native_notifications_enabled: bool,
    pub idle_accumulated_seconds: u64,
    pub idle_session_details: JsonMap<String, Value>,
}

impl Default for ProcessSharedState {
    fn default() -> Self {
        Self {
            tracking: false,
            uploading: false,
            last_screenshot_path: None,
            last_screenshot_thumb_path: None,
            screenshot_preview_timeout_secs: DEFAULT_SCREENSHOT_PREVIEW_SECS,
            native_notifications_enabled: false,
            idle_accumulated_seconds: 0,
            idle_session_details: JsonMap::new(),
        }
    }
}

/// Partial update sent by surfaces over `sync-shared-state`. Only fields that
/// are present are applied; everything else keeps its current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedStatePatch {
    pub tracking: Option<bool>,
    pub uploading: Option<bool>,
    pub last_screenshot_path: Option<String>,
    pub last_screenshot_thumb_path: Option<String>,
    pub screenshot_preview_timeout_secs: Option<u64>,
    pub native_notifications_enabled: Option<bool>,
    pub idle_accumulated_seconds: Option<u64>,
    pub idle_session_details: Option<JsonMap<String, Value>>,
}

impl ProcessSharedState {
    /// Quit deferral is active exactly while tracking or uploading is in flight.
    pub fn quit_deferral_active(&self) -> bool {
        self.tracking || self.uploading
    }

    /// Applies a partial patch, returning true when the tracking/uploading
    /// activity flags changed and the tray needs a resync.
    pub fn apply_patch(&mut self, patch: SharedStatePatch) -> bool {
        let was_active = self.quit_deferral_active();

        if let Some(tracking) = patch.tracking {
            self.tracking = tracking;
        }
        if let Some(uploading) = patch.uploading {
            self.uploading = uploading;
        }
        if let Some(path) = patch.last_screenshot_path {
            self.last_screenshot_path = non_empty_path(path);
        }
        if let Some(path) = patch.last_screenshot_thumb_path {
            self.last_screenshot_thumb_path = non_empty_path(path);
        }
        if let Some(secs) = patch.screenshot_preview_timeout_secs {
            self.screenshot_preview_timeout_secs = secs;
        }
        if let Some(enabled) = patch.native_notifications_enabled {
            self.native_notifications_enabled = enabled;
        }
        if let Some(seconds) = patch.idle_accumulated_seconds {
            self.idle_accumulated_seconds = seconds;
        }
        if let Some(details) = patch.idle_session_details {
            self.idle_session_details = details;
        }

        was_active != self.quit_deferral_active()
    }

    /// Drops the capture paths once a screenshot decision has been reached.
    pub fn clear_screenshot_paths(&mut self) {
        self.last_screenshot_path = None;
        self.last_screenshot_thumb_path = None;
    }
}

fn non_empty_path(value: String) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}
