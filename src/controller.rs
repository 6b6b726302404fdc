//! Background controller: owns process-shared state, the window registry, the
//! tray model and the quit coordinator, and handles every bus channel.
//!
//! All handlers run with exclusive access to this struct on the coordination
//! thread; surfaces never mutate shared state directly.

use log::{debug, warn};
use serde_json::Value;

use crate::auth::{self, AuthSession, ProbeOutcome};
use crate::bridge::{
    self, CredentialsError, CredentialsPayload, CredentialsQuery, DebugMessage, IssueCreatedEntry,
    StoredCredentials,
};
use crate::bus::MessageBus;
use crate::error::ControllerError;
use crate::geometry::WindowGeometry;
use crate::platform::{Platform, ScheduledMessage, ScreenshotNotification};
use crate::quit::{CloseDecision, QuitCoordinator};
use crate::screenshot::{pick_delivery, Delivery, Resolution, ScreenshotWorkflow};
use crate::secrets::SecretsManager;
use crate::state::{ProcessSharedState, SharedStatePatch};
use crate::tray::{self, TrayState};
use crate::windows::{Surface, SurfaceKind, WindowRegistry};

/// What the window-event hook should do with a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseRequestOutcome {
    Proceed,
    Prevent,
    PreventAndHide,
}

pub struct Controller<P: Platform> {
    pub platform: P,
    pub state: ProcessSharedState,
    pub tray: TrayState,
    pub quit: QuitCoordinator,
    pub windows: WindowRegistry<P::Surface>,
    pub screenshot: ScreenshotWorkflow,
    pub auth: Option<AuthSession>,
    pub secrets: SecretsManager,
}

impl<P: Platform> Controller<P> {
    pub fn new(platform: P, secrets: SecretsManager) -> Self {
        let quit = QuitCoordinator::new(platform.is_primary_platform());
        Self {
            platform,
            state: ProcessSharedState::default(),
            tray: TrayState::default(),
            quit,
            windows: WindowRegistry::default(),
            screenshot: ScreenshotWorkflow::default(),
            auth: None,
            secrets,
        }
    }

    /// Registers every channel handler. Called exactly once at startup; the
    /// bus itself guards against accidental re-registration.
    pub fn register_channels(bus: &mut MessageBus<Self>) {
        bus.register("store-credentials", |ctl, payload| {
            Some(ctl.handle_store_credentials(payload))
        });
        bus.register("get-credentials", |ctl, payload| {
            Some(ctl.handle_get_credentials(payload))
        });
        bus.register("get-auth-header", |ctl, payload| {
            Some(ctl.handle_get_auth_header(payload))
        });
        bus.register("start-timer", |ctl, _| {
            ctl.handle_start_timer();
            None
        });
        bus.register("stop-timer", |ctl, _| {
            ctl.handle_stop_timer();
            None
        });
        bus.register("select-issue", |ctl, payload| {
            ctl.handle_select_issue(payload);
            None
        });
        bus.register("issue-created", |ctl, payload| {
            ctl.handle_issue_created(payload);
            None
        });
        bus.register("issue-refetch", |ctl, payload| {
            ctl.emit_to_main("reFetchIssue", payload);
            None
        });
        bus.register("save-login-debug", |ctl, payload| {
            ctl.handle_save_login_debug(payload);
            None
        });
        bus.register("copy-login-debug", |ctl, payload| {
            ctl.handle_copy_login_debug(payload);
            None
        });
        bus.register("load-issue-window", |ctl, payload| {
            ctl.handle_load_issue_window(payload);
            None
        });
        bus.register("show-issue-window", |ctl, payload| {
            ctl.windows
                .deliver(SurfaceKind::Issue, "showForm", payload);
            ctl.windows.show(SurfaceKind::Issue);
            None
        });
        bus.register("close-issue-window", |ctl, _| {
            ctl.windows.hide(SurfaceKind::Issue);
            None
        });
        bus.register("page-fully-loaded", |ctl, _| {
            ctl.windows
                .deliver(SurfaceKind::Issue, "page-fully-loaded", Value::Null);
            None
        });
        bus.register("open-oauth-url", |ctl, payload| {
            ctl.handle_open_oauth_url(payload);
            None
        });
        bus.register("oauth-response", |ctl, payload| {
            ctl.handle_oauth_response(payload);
            None
        });
        bus.register("oauth-denied", |ctl, _| {
            ctl.handle_oauth_denied();
            None
        });
        bus.register("show-idle-popup", |ctl, _| {
            ctl.open_popup(SurfaceKind::IdlePopup);
            None
        });
        bus.register("dismiss-idle-time", |ctl, payload| {
            ctl.emit_to_main("dismiss-idle-time", payload);
            ctl.windows.destroy(SurfaceKind::IdlePopup);
            None
        });
        bus.register("keep-idle-time", |ctl, _| {
            ctl.emit_to_main("keep-idle-time", Value::Null);
            ctl.windows.destroy(SurfaceKind::IdlePopup);
            None
        });
        bus.register("show-screenshot-popup", |ctl, _| {
            ctl.handle_show_screenshot_popup();
            None
        });
        bus.register("screenshot-accept", |ctl, _| {
            ctl.resolve_screenshot_current(Resolution::Accept);
            None
        });
        bus.register("screenshot-reject", |ctl, _| {
            ctl.resolve_screenshot_current(Resolution::Reject);
            None
        });
        bus.register("screenshot-preview", |ctl, _| {
            ctl.open_popup(SurfaceKind::ScreenshotPopup);
            None
        });
        bus.register("sync-shared-state", |ctl, payload| {
            ctl.handle_sync_shared_state(payload);
            None
        });
        bus.register("set-should-quit", |ctl, _| {
            ctl.quit.set_should_quit();
            None
        });
        bus.register("ready-to-quit", |ctl, _| {
            ctl.quit.set_should_quit();
            ctl.platform.request_exit();
            None
        });
        bus.register("minimize", |ctl, _| {
            ctl.with_main(|surface| surface.minimize());
            None
        });
        bus.register("maximize", |ctl, _| {
            ctl.with_main(|surface| surface.maximize());
            None
        });
        bus.register("unmaximize", |ctl, _| {
            ctl.with_main(|surface| surface.unmaximize());
            None
        });
    }

    /// Broadcasts a message to the main surface.
    pub fn emit_to_main(&mut self, channel: &str, payload: Value) {
        self.windows.deliver(SurfaceKind::Main, channel, payload);
    }

    /// Recomputes the tray model and atomically replaces the platform menu.
    pub fn sync_tray(&mut self) {
        self.platform
            .apply_tray(&self.tray.menu_model(), self.state.tracking);
    }

    fn with_main(&mut self, op: impl FnOnce(&P::Surface) -> crate::error::Result<()>) {
        if let Some(Err(err)) = self.windows.with_surface(SurfaceKind::Main, op) {
            warn!("Main window operation failed: {err}");
        }
    }

    // ─── Credentials ─────────────────────────────────────────────────

    fn handle_store_credentials(&mut self, payload: Value) -> Value {
        let credentials: CredentialsPayload = match serde_json::from_value(payload) {
            Ok(credentials) => credentials,
            Err(err) => {
                warn!("Malformed store-credentials payload: {err}");
                return Value::Bool(false);
            }
        };
        if let Err(err) = self
            .secrets
            .store_password(&credentials.username, &credentials.password)
        {
            warn!("Failed to store credentials: {err}");
            return Value::Bool(false);
        }
        self.secrets.register_host_auth(
            &credentials.host,
            &credentials.username,
            &credentials.password,
        );
        Value::Bool(true)
    }

    fn handle_get_credentials(&mut self, payload: Value) -> Value {
        let query: CredentialsQuery = match serde_json::from_value(payload) {
            Ok(query) => query,
            Err(err) => return credentials_error_reply(err.to_string()),
        };

        match self.secrets.get_password(&query.username) {
            Ok(Some(password)) => {
                self.secrets
                    .register_host_auth(&query.host, &query.username, &password);
                let credentials = StoredCredentials {
                    username: query.username,
                    password,
                };
                serde_json::json!({ "credentials": credentials })
            }
            Ok(None) => credentials_error_reply(format!(
                "no stored credentials for '{}'",
                query.username
            )),
            Err(err) => credentials_error_reply(err.to_string()),
        }
    }

    fn handle_get_auth_header(&mut self, payload: Value) -> Value {
        let host = payload.as_str().unwrap_or_default();
        match self.secrets.auth_header_for(host) {
            Some(header) => Value::String(header),
            None => Value::Null,
        }
    }

    // ─── Tracking / tray ─────────────────────────────────────────────

    fn handle_start_timer(&mut self) {
        self.state.tracking = true;
        self.tray.on_tracking_started();
        self.sync_tray();
    }

    fn handle_stop_timer(&mut self) {
        self.state.tracking = false;
        self.tray.on_tracking_stopped();
        self.sync_tray();
    }

    fn handle_select_issue(&mut self, payload: Value) {
        let Some(issue_key) = payload.as_str() else {
            warn!("select-issue payload is not a string");
            return;
        };
        self.tray.on_issue_selected(issue_key);
        self.sync_tray();
    }

    /// Forwards tray menu clicks to the main surface.
    pub fn on_tray_menu_click(&mut self, id: &str) {
        match id {
            tray::MENU_START_ID => {
                self.windows.show(SurfaceKind::Main);
                self.emit_to_main("tray-start-click", Value::Null);
            }
            tray::MENU_STOP_ID => {
                self.windows.show(SurfaceKind::Main);
                self.emit_to_main("tray-stop-click", Value::Null);
            }
            tray::MENU_SETTINGS_ID => {
                self.windows.show(SurfaceKind::Main);
                self.emit_to_main("tray-settings-click", Value::Null);
            }
            tray::MENU_QUIT_ID => {
                self.quit.set_should_quit();
                self.platform.request_exit();
            }
            _ => {}
        }
    }

    // ─── Issue relays / debug log ────────────────────────────────────

    fn handle_issue_created(&mut self, payload: Value) {
        let entries: Vec<IssueCreatedEntry> = match serde_json::from_value(payload) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Malformed issue-created payload: {err}");
                return;
            }
        };
        for entry in entries {
            self.emit_to_main("newIssue", Value::String(entry.issue_key));
        }
    }

    fn decode_debug_messages(payload: Value) -> Vec<DebugMessage> {
        serde_json::from_value(payload).unwrap_or_else(|err| {
            warn!("Malformed login-debug payload: {err}");
            Vec::new()
        })
    }

    fn handle_save_login_debug(&mut self, payload: Value) {
        let messages = Self::decode_debug_messages(payload);
        let formatted = bridge::format_debug_messages(&messages);
        self.platform
            .save_text_file(&bridge::debug_log_file_name(), formatted);
    }

    fn handle_copy_login_debug(&mut self, payload: Value) {
        let messages = Self::decode_debug_messages(payload);
        let formatted = bridge::format_debug_messages(&messages);
        if let Err(err) = self.platform.write_clipboard(&formatted) {
            warn!("Failed to copy login debug log: {err}");
        }
    }

    // ─── Issue window ────────────────────────────────────────────────

    fn handle_load_issue_window(&mut self, payload: Value) {
        let Some(url) = payload.as_str().map(str::to_string) else {
            warn!("load-issue-window payload is not a string");
            return;
        };
        let platform = &self.platform;
        if let Err(err) = self
            .windows
            .ensure(SurfaceKind::Issue, || {
                platform.create_surface(SurfaceKind::Issue, None)
            })
        {
            warn!("Failed to create issue window: {err}");
            return;
        }
        self.windows
            .deliver(SurfaceKind::Issue, "url", Value::String(url));
    }

    /// Surface finished loading; flush anything queued while it was Creating.
    pub fn on_page_ready(&mut self, kind: SurfaceKind) {
        self.windows.mark_ready(kind);
    }

    // ─── Authorization flow ──────────────────────────────────────────

    fn handle_open_oauth_url(&mut self, payload: Value) {
        let Some(url) = payload.as_str() else {
            warn!("open-oauth-url payload is not a string");
            return;
        };
        // A fresh request always starts a fresh session.
        self.close_auth_session();

        let platform = &self.platform;
        match self.windows.ensure(SurfaceKind::AuthBrowser, || {
            platform.create_surface(SurfaceKind::AuthBrowser, Some(url))
        }) {
            Ok(_) => {
                // External page; nothing is queued for it.
                self.windows.mark_ready(SurfaceKind::AuthBrowser);
                self.windows.show(SurfaceKind::AuthBrowser);
                self.auth = Some(AuthSession::default());
            }
            Err(err) => warn!("Failed to open authorization window: {err}"),
        }
    }

    /// Navigation observed on the authorization surface.
    pub fn on_auth_navigation(&mut self, url: &str) {
        let Some(session) = self.auth.as_mut() else {
            return;
        };
        if auth::is_callback_url(url) && session.arm_probe() {
            self.platform
                .schedule(auth::PROBE_SETTLE_MS, ScheduledMessage::AuthProbe);
        }
    }

    fn handle_oauth_response(&mut self, payload: Value) {
        if self.auth.is_none() {
            debug!("Ignoring oauth-response without an active session");
            return;
        }
        let text = payload.as_str().unwrap_or_default();
        match auth::classify_probe(text) {
            Ok(ProbeOutcome::Authorized { token }) => {
                self.emit_to_main("oauth-accepted", Value::String(token));
                self.close_auth_session();
            }
            Ok(ProbeOutcome::Denied) => self.handle_oauth_denied(),
            Ok(ProbeOutcome::Indeterminate) => {
                if let Some(session) = self.auth.as_mut() {
                    session.reset_probe();
                }
            }
            Err(err @ ControllerError::ProbeParse(_)) => {
                warn!("Authorization probe failed: {err}");
                if let Some(session) = self.auth.as_mut() {
                    session.reset_probe();
                }
            }
            Err(err) => warn!("Authorization probe failed: {err}"),
        }
    }

    fn handle_oauth_denied(&mut self) {
        if self.auth.is_none() {
            return;
        }
        self.emit_to_main("oauth-denied", Value::Null);
        self.close_auth_session();
    }

    fn close_auth_session(&mut self) {
        self.windows.destroy(SurfaceKind::AuthBrowser);
        self.auth = None;
    }

    // ─── Screenshot workflow ─────────────────────────────────────────

    fn handle_show_screenshot_popup(&mut self) {
        let capture_id = self.screenshot.begin();
        let timeout_secs = self.state.screenshot_preview_timeout_secs;
        let mut delivery = pick_delivery(
            self.state.native_notifications_enabled,
            self.platform.is_primary_platform(),
            self.state.native_notifications_enabled,
        );
        // Reject and Show-preview must stay reachable; a notification that
        // cannot carry those actions degrades to the popup.
        if delivery == Delivery::NativeNotification
            && !self.platform.supports_notification_actions()
        {
            delivery = Delivery::Popup;
        }

        match delivery {
            Delivery::NativeNotification => {
                let notification = ScreenshotNotification {
                    title: "Screenshot preview".to_string(),
                    body: "Accept or Reject this screenshot".to_string(),
                    image_path: self.state.last_screenshot_path.clone(),
                    timeout_secs,
                };
                if let Err(err) = self.platform.notify(&notification) {
                    warn!("Native notification failed, falling back to popup: {err}");
                    self.open_popup(SurfaceKind::ScreenshotPopup);
                }
            }
            Delivery::Popup => self.open_popup(SurfaceKind::ScreenshotPopup),
        }

        self.platform.schedule(
            timeout_secs.saturating_mul(1000),
            ScheduledMessage::ScreenshotTimeout { capture_id },
        );
    }

    fn open_popup(&mut self, kind: SurfaceKind) {
        let platform = &self.platform;
        match self
            .windows
            .ensure(kind, || platform.create_surface(kind, None))
        {
            Ok(_) => {
                self.windows.mark_ready(kind);
                self.windows.show(kind);
            }
            Err(err) => warn!("Failed to open {kind:?}: {err}"),
        }
    }

    fn resolve_screenshot_current(&mut self, resolution: Resolution) {
        if let Some(resolved) = self.screenshot.try_resolve_current(resolution) {
            self.finish_screenshot(resolved);
        }
    }

    fn finish_screenshot(&mut self, resolution: Resolution) {
        self.emit_to_main(resolution.channel(), Value::Null);
        self.windows.destroy(SurfaceKind::ScreenshotPopup);
        self.state.clear_screenshot_paths();
    }

    // ─── Shared state / timers / close requests ──────────────────────

    fn handle_sync_shared_state(&mut self, payload: Value) {
        let patch: SharedStatePatch = match serde_json::from_value(payload) {
            Ok(patch) => patch,
            Err(err) => {
                warn!("Malformed sync-shared-state payload: {err}");
                return;
            }
        };
        let was_tracking = self.state.tracking;
        self.state.apply_patch(patch);
        if self.state.tracking != was_tracking {
            if self.state.tracking {
                self.tray.on_tracking_started();
            } else {
                self.tray.on_tracking_stopped();
            }
            self.sync_tray();
        }
    }

    /// One-shot timer completion; stale completions fall through the
    /// idempotency guards.
    pub fn on_scheduled(&mut self, message: ScheduledMessage) {
        match message {
            ScheduledMessage::ScreenshotTimeout { capture_id } => {
                // Fail-open: an unanswered preview counts as accepted.
                if let Some(resolved) =
                    self.screenshot.try_resolve(capture_id, Resolution::Accept)
                {
                    self.finish_screenshot(resolved);
                }
            }
            ScheduledMessage::AuthProbe => {
                if self.auth.is_none() {
                    return;
                }
                if let Some(Err(err)) = self
                    .windows
                    .with_surface(SurfaceKind::AuthBrowser, |surface| {
                        surface.eval(auth::PROBE_SCRIPT)
                    })
                {
                    warn!("Failed to inject authorization probe: {err}");
                }
                if let Some(session) = self.auth.as_mut() {
                    session.reset_probe();
                }
            }
        }
    }

    /// Evaluates a user/system close request for a surface.
    pub fn on_close_requested(
        &mut self,
        kind: SurfaceKind,
        content_size: Option<WindowGeometry>,
    ) -> CloseRequestOutcome {
        match kind {
            SurfaceKind::Main => {
                if let Some(geometry) = content_size {
                    if !geometry.is_trivial() {
                        self.platform.persist_geometry(geometry);
                    }
                }
                match self.quit.evaluate_close(self.state.quit_deferral_active()) {
                    CloseDecision::Deferred { send_force_save } => {
                        if send_force_save {
                            self.emit_to_main("force-save", Value::Null);
                        }
                        CloseRequestOutcome::Prevent
                    }
                    CloseDecision::Hidden => CloseRequestOutcome::PreventAndHide,
                    CloseDecision::Closed => {
                        // Main going down for real takes the issue window with it.
                        self.windows.destroy(SurfaceKind::Issue);
                        CloseRequestOutcome::Proceed
                    }
                }
            }
            SurfaceKind::Issue => CloseRequestOutcome::PreventAndHide,
            SurfaceKind::AuthBrowser => {
                self.windows.forget(SurfaceKind::AuthBrowser);
                self.auth = None;
                CloseRequestOutcome::Proceed
            }
            SurfaceKind::IdlePopup | SurfaceKind::ScreenshotPopup => {
                self.windows.forget(kind);
                CloseRequestOutcome::Proceed
            }
        }
    }

    /// Process-level exit request. An explicit exit was already approved by a
    /// quit decision; an OS- or menu-initiated one marks quit intent but is
    /// still deferred while activity is in flight. Returns false to veto.
    pub fn on_exit_requested(&mut self, explicit: bool) -> bool {
        if explicit {
            return true;
        }
        match self.quit.evaluate_close(self.state.quit_deferral_active()) {
            CloseDecision::Deferred { send_force_save } => {
                if send_force_save {
                    self.emit_to_main("force-save", Value::Null);
                }
                false
            }
            CloseDecision::Hidden | CloseDecision::Closed => {
                self.quit.set_should_quit();
                true
            }
        }
    }

    /// The platform destroyed a window underneath us.
    pub fn on_surface_destroyed(&mut self, kind: SurfaceKind) {
        self.windows.forget(kind);
        if kind == SurfaceKind::AuthBrowser {
            self.auth = None;
        }
    }
}

fn credentials_error_reply(err: String) -> Value {
    let error = CredentialsError {
        err,
        platform: std::env::consts::OS.to_string(),
    };
    serde_json::json!({ "error": error })
}
