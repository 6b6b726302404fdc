//! Seam between the controller and the desktop shell.
//!
//! Everything with a real side effect (window creation, tray menus,
//! notifications, clipboard, dialogs, timers) goes through [`Platform`] so the
//! coordination logic runs unchanged against the recording doubles in tests.

use std::path::PathBuf;

use crate::error::Result;
use crate::geometry::WindowGeometry;
use crate::tray::TrayMenuEntry;
use crate::windows::{Surface, SurfaceKind};

/// Timer completion routed back into the controller. Stale completions are
/// discarded by idempotency guards rather than cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledMessage {
    ScreenshotTimeout { capture_id: u64 },
    AuthProbe,
}

/// Native notification request for a pending screenshot decision.
#[derive(Debug, Clone)]
pub struct ScreenshotNotification {
    pub title: String,
    pub body: String,
    pub image_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

/// Desktop-shell operations the controller depends on.
pub trait Platform {
    type Surface: Surface;

    /// Builds the underlying window for a surface kind. `target_url` carries
    /// the external address for the authorization browser.
    fn create_surface(&self, kind: SurfaceKind, target_url: Option<&str>) -> Result<Self::Surface>;

    /// Atomically replaces the tray context menu and swaps the status icon.
    fn apply_tray(&self, entries: &[TrayMenuEntry], tracking: bool);

    /// Shows a native notification for the screenshot workflow.
    fn notify(&self, notification: &ScreenshotNotification) -> Result<()>;

    /// True when native notifications can carry explicit Reject/Show-preview
    /// actions routed back into the bus. Without them a native preview would
    /// only ever resolve through the fail-open timeout, so the controller
    /// falls back to the popup.
    fn supports_notification_actions(&self) -> bool;

    fn write_clipboard(&self, text: &str) -> Result<()>;

    /// Opens a save dialog and writes the contents to the chosen file.
    /// Completion is asynchronous; failures are logged, never surfaced.
    fn save_text_file(&self, suggested_name: &str, contents: String);

    /// Persists window geometry off the coordination thread; failures are
    /// logged and never block a close decision.
    fn persist_geometry(&self, geometry: WindowGeometry);

    /// Arms a one-shot timer delivered back via `Controller::on_scheduled`.
    fn schedule(&self, delay_ms: u64, message: ScheduledMessage);

    /// Requests process exit (quit decisions only).
    fn request_exit(&self);

    /// True on the primary desktop-shell platform (macOS convention).
    fn is_primary_platform(&self) -> bool;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::error::ControllerError;

    #[derive(Default)]
    struct SurfaceLogInner {
        emitted: Vec<(String, Value)>,
        evals: Vec<String>,
        shown: usize,
        hidden: usize,
        closed: usize,
    }

    /// Shared recorder observed by tests after the surface is consumed.
    #[derive(Clone, Default)]
    pub struct SurfaceLog {
        inner: Arc<Mutex<SurfaceLogInner>>,
    }

    impl SurfaceLog {
        pub fn emitted(&self) -> Vec<(String, Value)> {
            self.inner.lock().unwrap().emitted.clone()
        }

        pub fn evals(&self) -> Vec<String> {
            self.inner.lock().unwrap().evals.clone()
        }

        pub fn shown(&self) -> usize {
            self.inner.lock().unwrap().shown
        }

        pub fn hidden(&self) -> usize {
            self.inner.lock().unwrap().hidden
        }

        pub fn closed(&self) -> usize {
            self.inner.lock().unwrap().closed
        }
    }

    /// Surface double recording every operation.
    pub struct TestSurface {
        #[allow(dead_code)]
        kind: SurfaceKind,
        log: SurfaceLog,
    }

    impl TestSurface {
        pub fn new(kind: SurfaceKind, log: &SurfaceLog) -> Self {
            Self {
                kind,
                log: log.clone(),
            }
        }
    }

    impl Surface for TestSurface {
        fn emit(&self, channel: &str, payload: &Value) -> Result<()> {
            self.log
                .inner
                .lock()
                .unwrap()
                .emitted
                .push((channel.to_string(), payload.clone()));
            Ok(())
        }

        fn show(&self) -> Result<()> {
            self.log.inner.lock().unwrap().shown += 1;
            Ok(())
        }

        fn hide(&self) -> Result<()> {
            self.log.inner.lock().unwrap().hidden += 1;
            Ok(())
        }

        fn close(&self) -> Result<()> {
            self.log.inner.lock().unwrap().closed += 1;
            Ok(())
        }

        fn eval(&self, script: &str) -> Result<()> {
            self.log.inner.lock().unwrap().evals.push(script.to_string());
            Ok(())
        }

        fn minimize(&self) -> Result<()> {
            Ok(())
        }

        fn maximize(&self) -> Result<()> {
            Ok(())
        }

        fn unmaximize(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct PlatformLogInner {
        created: Vec<(SurfaceKind, Option<String>)>,
        tray_applied: Vec<(Vec<TrayMenuEntry>, bool)>,
        notifications: Vec<ScreenshotNotification>,
        clipboard: Option<String>,
        saved_files: Vec<(String, String)>,
        geometry: Vec<WindowGeometry>,
        scheduled: Vec<(u64, ScheduledMessage)>,
        exit_requests: usize,
        fail_surface_creation: bool,
    }

    /// Platform double; surfaces created through it share per-kind logs.
    #[derive(Clone)]
    pub struct TestPlatform {
        primary: bool,
        notification_actions: bool,
        inner: Arc<Mutex<PlatformLogInner>>,
        surface_logs: Arc<Mutex<HashMap<SurfaceKind, SurfaceLog>>>,
    }

    impl TestPlatform {
        pub fn new(primary: bool) -> Self {
            Self {
                primary,
                notification_actions: true,
                inner: Arc::new(Mutex::new(PlatformLogInner::default())),
                surface_logs: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        pub fn without_notification_actions(mut self) -> Self {
            self.notification_actions = false;
            self
        }

        pub fn fail_surface_creation(&self) {
            self.inner.lock().unwrap().fail_surface_creation = true;
        }

        pub fn surface_log(&self, kind: SurfaceKind) -> SurfaceLog {
            self.surface_logs
                .lock()
                .unwrap()
                .entry(kind)
                .or_default()
                .clone()
        }

        pub fn created(&self) -> Vec<(SurfaceKind, Option<String>)> {
            self.inner.lock().unwrap().created.clone()
        }

        pub fn tray_applications(&self) -> Vec<(Vec<TrayMenuEntry>, bool)> {
            self.inner.lock().unwrap().tray_applied.clone()
        }

        pub fn notifications(&self) -> Vec<ScreenshotNotification> {
            self.inner.lock().unwrap().notifications.clone()
        }

        pub fn clipboard(&self) -> Option<String> {
            self.inner.lock().unwrap().clipboard.clone()
        }

        pub fn saved_files(&self) -> Vec<(String, String)> {
            self.inner.lock().unwrap().saved_files.clone()
        }

        pub fn persisted_geometry(&self) -> Vec<WindowGeometry> {
            self.inner.lock().unwrap().geometry.clone()
        }

        pub fn scheduled(&self) -> Vec<(u64, ScheduledMessage)> {
            self.inner.lock().unwrap().scheduled.clone()
        }

        pub fn exit_requests(&self) -> usize {
            self.inner.lock().unwrap().exit_requests
        }
    }

    impl Platform for TestPlatform {
        type Surface = TestSurface;

        fn create_surface(
            &self,
            kind: SurfaceKind,
            target_url: Option<&str>,
        ) -> Result<Self::Surface> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_surface_creation {
                return Err(ControllerError::Window("creation disabled".to_string()));
            }
            inner
                .created
                .push((kind, target_url.map(str::to_string)));
            drop(inner);
            Ok(TestSurface::new(kind, &self.surface_log(kind)))
        }

        fn apply_tray(&self, entries: &[TrayMenuEntry], tracking: bool) {
            self.inner
                .lock()
                .unwrap()
                .tray_applied
                .push((entries.to_vec(), tracking));
        }

        fn notify(&self, notification: &ScreenshotNotification) -> Result<()> {
            self.inner
                .lock()
                .unwrap()
                .notifications
                .push(notification.clone());
            Ok(())
        }

        fn supports_notification_actions(&self) -> bool {
            self.notification_actions
        }

        fn write_clipboard(&self, text: &str) -> Result<()> {
            self.inner.lock().unwrap().clipboard = Some(text.to_string());
            Ok(())
        }

        fn save_text_file(&self, suggested_name: &str, contents: String) {
            self.inner
                .lock()
                .unwrap()
                .saved_files
                .push((suggested_name.to_string(), contents));
        }

        fn persist_geometry(&self, geometry: WindowGeometry) {
            self.inner.lock().unwrap().geometry.push(geometry);
        }

        fn schedule(&self, delay_ms: u64, message: ScheduledMessage) {
            self.inner
                .lock()
                .unwrap()
                .scheduled
                .push((delay_ms, message));
        }

        fn request_exit(&self) {
            self.inner.lock().unwrap().exit_requests += 1;
        }

        fn is_primary_platform(&self) -> bool {
            self.primary
        }
    }
}
