//! Tray menu model recomputed from tracking and issue-selection state.

pub const MENU_SELECTED_LABEL_ID: &str = "tray_selected_label";
pub const MENU_START_ID: &str = "tray_start";
pub const MENU_STOP_ID: &str = "tray_stop";
pub const MENU_SETTINGS_ID: &str = "tray_settings";
pub const MENU_QUIT_ID: &str = "tray_quit";

/// One entry of the rebuilt context menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayMenuEntry {
    pub id: &'static str,
    pub label: String,
    pub enabled: bool,
    pub separator: bool,
}

impl TrayMenuEntry {
    fn item(id: &'static str, label: impl Into<String>, enabled: bool) -> Self {
        Self {
            id,
            label: label.into(),
            enabled,
            separator: false,
        }
    }

    fn separator() -> Self {
        Self {
            id: "",
            label: String::new(),
            enabled: false,
            separator: true,
        }
    }
}

/// Reactive tray state. No history is kept; every transition recomputes the
/// full menu model and the caller atomically replaces the platform menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrayState {
    selected_issue: Option<String>,
    start_enabled: bool,
    stop_enabled: bool,
}

impl TrayState {
    pub fn on_tracking_started(&mut self) {
        self.start_enabled = false;
        self.stop_enabled = true;
    }

    pub fn on_tracking_stopped(&mut self) {
        self.start_enabled = true;
        self.stop_enabled = false;
    }

    /// Records the selected issue. Start is re-enabled only while Stop is not
    /// enabled, preserving the documented precedence over a plain mutual
    /// exclusion rule.
    pub fn on_issue_selected(&mut self, issue_key: &str) {
        self.selected_issue = Some(issue_key.to_string());
        if !self.stop_enabled {
            self.start_enabled = true;
        }
    }

    pub fn selected_issue(&self) -> Option<&str> {
        self.selected_issue.as_deref()
    }

    pub fn start_enabled(&self) -> bool {
        self.start_enabled
    }

    pub fn stop_enabled(&self) -> bool {
        self.stop_enabled
    }

    /// Recomputes the ordered menu model from current state.
    pub fn menu_model(&self) -> Vec<TrayMenuEntry> {
        let label = match &self.selected_issue {
            Some(key) => format!("Selected issue: {key}"),
            None => "No selected issue".to_string(),
        };

        vec![
            TrayMenuEntry::item(MENU_SELECTED_LABEL_ID, label, false),
            TrayMenuEntry::separator(),
            TrayMenuEntry::item(MENU_START_ID, "Start", self.start_enabled),
            TrayMenuEntry::item(MENU_STOP_ID, "Stop", self.stop_enabled),
            TrayMenuEntry::separator(),
            TrayMenuEntry::item(MENU_SETTINGS_ID, "Settings", true),
            TrayMenuEntry::item(MENU_QUIT_ID, "Quit", true),
        ]
    }
}
