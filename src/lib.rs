//! Desktop shell wiring for the Chronos background controller.
//!
//! The coordination logic lives in [`controller`] behind the [`Platform`] and
//! [`Surface`](windows::Surface) seams; this module binds those seams to the
//! Tauri runtime and exposes the two webview commands (`bus_send`,
//! `bus_send_sync`) every surface talks through.

use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tauri::image::Image;
use tauri::menu::{Menu, MenuItem, PredefinedMenuItem};
use tauri::tray::TrayIconBuilder;
use tauri::webview::PageLoadEvent;
use tauri::{
    AppHandle, Emitter, Manager, RunEvent, Runtime, WebviewUrl, WebviewWindow,
    WebviewWindowBuilder,
};
use tauri_plugin_clipboard_manager::ClipboardExt;
use tauri_plugin_dialog::DialogExt;
use tauri_plugin_notification::NotificationExt;
use tokio::{fs as async_fs, time::sleep};

mod auth;
mod bridge;
mod bus;
mod controller;
mod error;
mod geometry;
mod platform;
mod quit;
mod screenshot;
mod secrets;
mod state;
mod tray;
mod windows;

use bus::MessageBus;
use controller::{CloseRequestOutcome, Controller};
use error::ControllerError;
use geometry::{GeometryStore, WindowGeometry};
use platform::{Platform, ScheduledMessage, ScreenshotNotification};
use secrets::SecretsManager;
use tray::TrayMenuEntry;
use windows::{Surface, SurfaceKind};

const TRAY_ID: &str = "Chronos";

const TRAY_ICON_IDLE: &[u8] = include_bytes!("../icons/icon.png");
const TRAY_ICON_ACTIVE: &[u8] = include_bytes!("../icons/icon-active.png");

const ISSUE_WINDOW_SIZE: (f64, f64) = (810.0, 675.0);
const IDLE_POPUP_SIZE: (f64, f64) = (460.0, 130.0);
const SCREENSHOT_POPUP_SIZE: (f64, f64) = (218.0, 240.0);
const SCREENSHOT_POPUP_MARGIN: f64 = 16.0;
const AUTH_WINDOW_SIZE: (f64, f64) = (800.0, 700.0);

fn window_err(err: tauri::Error) -> ControllerError {
    ControllerError::Window(err.to_string())
}

/// Webview window behind the controller's surface seam.
pub struct TauriSurface {
    window: WebviewWindow,
}

impl TauriSurface {
    fn new(window: WebviewWindow) -> Self {
        Self { window }
    }
}

impl Surface for TauriSurface {
    fn emit(&self, channel: &str, payload: &Value) -> error::Result<()> {
        self.window.emit(channel, payload).map_err(window_err)
    }

    fn show(&self) -> error::Result<()> {
        self.window.show().map_err(window_err)?;
        self.window.set_focus().map_err(window_err)
    }

    fn hide(&self) -> error::Result<()> {
        self.window.hide().map_err(window_err)
    }

    // Deferred so a handler holding the controller lock never runs window
    // teardown (and its Destroyed event) re-entrantly.
    fn close(&self) -> error::Result<()> {
        let window = self.window.clone();
        tauri::async_runtime::spawn(async move {
            if let Err(err) = window.destroy() {
                debug!("Window destroy reported: {err}");
            }
        });
        Ok(())
    }

    fn eval(&self, script: &str) -> error::Result<()> {
        self.window.eval(script).map_err(window_err)
    }

    fn minimize(&self) -> error::Result<()> {
        self.window.minimize().map_err(window_err)
    }

    fn maximize(&self) -> error::Result<()> {
        self.window.maximize().map_err(window_err)
    }

    fn unmaximize(&self) -> error::Result<()> {
        self.window.unmaximize().map_err(window_err)
    }
}

/// Binds the platform seam to the Tauri app handle.
pub struct TauriPlatform {
    app: AppHandle,
}

impl TauriPlatform {
    fn new(app: AppHandle) -> Self {
        Self { app }
    }

    /// Bottom-right corner of the primary work area for the screenshot popup;
    /// the work area excludes the taskbar/dock.
    fn screenshot_popup_position(&self) -> Option<(f64, f64)> {
        let monitor = self.app.primary_monitor().ok().flatten()?;
        let scale = monitor.scale_factor();
        let area = monitor.work_area();
        let size = area.size.to_logical::<f64>(scale);
        let origin = area.position.to_logical::<f64>(scale);
        Some((
            origin.x + size.width - SCREENSHOT_POPUP_SIZE.0 - SCREENSHOT_POPUP_MARGIN,
            origin.y + size.height - SCREENSHOT_POPUP_SIZE.1 - SCREENSHOT_POPUP_MARGIN,
        ))
    }
}

impl Platform for TauriPlatform {
    type Surface = TauriSurface;

    fn create_surface(
        &self,
        kind: SurfaceKind,
        target_url: Option<&str>,
    ) -> error::Result<TauriSurface> {
        let window = match kind {
            SurfaceKind::Main => {
                return Err(ControllerError::Window(
                    "main window is created by the shell".to_string(),
                ))
            }
            SurfaceKind::Issue => {
                WebviewWindowBuilder::new(&self.app, kind.label(), WebviewUrl::App("issue.html".into()))
                    .title("Create issue")
                    .inner_size(ISSUE_WINDOW_SIZE.0, ISSUE_WINDOW_SIZE.1)
                    .visible(false)
                    .center()
                    .build()
                    .map_err(window_err)?
            }
            SurfaceKind::IdlePopup => {
                WebviewWindowBuilder::new(&self.app, kind.label(), WebviewUrl::App("idle.html".into()))
                    .title("Idle time")
                    .inner_size(IDLE_POPUP_SIZE.0, IDLE_POPUP_SIZE.1)
                    .resizable(false)
                    .decorations(false)
                    .always_on_top(true)
                    .skip_taskbar(true)
                    .visible(false)
                    .center()
                    .build()
                    .map_err(window_err)?
            }
            SurfaceKind::ScreenshotPopup => {
                let mut builder = WebviewWindowBuilder::new(
                    &self.app,
                    kind.label(),
                    WebviewUrl::App("screenshot.html".into()),
                )
                .title("Screenshot preview")
                .inner_size(SCREENSHOT_POPUP_SIZE.0, SCREENSHOT_POPUP_SIZE.1)
                .resizable(false)
                .decorations(false)
                .always_on_top(true)
                .skip_taskbar(true)
                .visible(false);
                if let Some((x, y)) = self.screenshot_popup_position() {
                    builder = builder.position(x, y);
                }
                builder.build().map_err(window_err)?
            }
            SurfaceKind::AuthBrowser => {
                let url = target_url.ok_or_else(|| {
                    ControllerError::Window("authorization url missing".to_string())
                })?;
                let external = url.parse().map_err(|err| {
                    ControllerError::Window(format!("invalid authorization url: {err}"))
                })?;
                let app = self.app.clone();
                WebviewWindowBuilder::new(&self.app, kind.label(), WebviewUrl::External(external))
                    .title("Authorize Chronos")
                    .inner_size(AUTH_WINDOW_SIZE.0, AUTH_WINDOW_SIZE.1)
                    .center()
                    .on_navigation(move |url| {
                        let app = app.clone();
                        let url = url.to_string();
                        tauri::async_runtime::spawn(async move {
                            let runtime = app.state::<ControllerRuntime>();
                            runtime.with_controller(|ctl| ctl.on_auth_navigation(&url));
                        });
                        true
                    })
                    .build()
                    .map_err(window_err)?
            }
        };
        Ok(TauriSurface::new(window))
    }

    fn apply_tray(&self, entries: &[TrayMenuEntry], tracking: bool) {
        let Some(tray) = self.app.tray_by_id(TRAY_ID) else {
            return;
        };
        match build_tray_menu(&self.app, entries) {
            Ok(menu) => {
                if let Err(err) = tray.set_menu(Some(menu)) {
                    warn!("Failed to replace tray menu: {err}");
                }
            }
            Err(err) => warn!("Failed to rebuild tray menu: {err}"),
        }

        // The status icon tracks the active/idle state.
        if let Some(icon) = tray_icon(tracking) {
            if let Err(err) = tray.set_icon(Some(icon)) {
                debug!("Failed to swap tray icon: {err}");
            }
        }

        let title = if tracking { "Chronos — tracking" } else { "Chronos" };
        if let Err(err) = tray.set_title(Some(title)) {
            debug!("Failed to set tray title: {err}");
        }
    }

    fn notify(&self, notification: &ScreenshotNotification) -> error::Result<()> {
        let mut builder = self
            .app
            .notification()
            .builder()
            .title(&notification.title)
            .body(&notification.body);
        if let Some(path) = &notification.image_path {
            builder = builder.icon(path.display().to_string());
        }
        builder
            .show()
            .map_err(|err| ControllerError::Window(err.to_string()))
    }

    // The desktop notification plugin exposes no action or close callbacks,
    // so Reject/Show-preview cannot be routed back; the controller falls
    // back to the popup for screenshot confirmations.
    fn supports_notification_actions(&self) -> bool {
        false
    }

    fn write_clipboard(&self, text: &str) -> error::Result<()> {
        self.app
            .clipboard()
            .write_text(text.to_string())
            .map_err(|err| ControllerError::Window(err.to_string()))
    }

    fn save_text_file(&self, suggested_name: &str, contents: String) {
        self.app
            .dialog()
            .file()
            .set_file_name(suggested_name)
            .save_file(move |picked| {
                let Some(picked) = picked else {
                    return;
                };
                let path = match picked.into_path() {
                    Ok(path) => path,
                    Err(err) => {
                        warn!("Rejecting dialog selection: {err}");
                        return;
                    }
                };
                tauri::async_runtime::spawn(async move {
                    if let Err(err) = async_fs::write(&path, contents.as_bytes()).await {
                        warn!("Failed to write login debug log: {err}");
                    }
                });
            });
    }

    fn persist_geometry(&self, geometry: WindowGeometry) {
        tauri::async_runtime::spawn_blocking(move || match GeometryStore::new() {
            Ok(store) => {
                if let Err(err) = store.save(geometry) {
                    warn!("Failed to persist window geometry: {err}");
                }
            }
            Err(err) => warn!("Geometry store unavailable: {err}"),
        });
    }

    fn schedule(&self, delay_ms: u64, message: ScheduledMessage) {
        let app = self.app.clone();
        tauri::async_runtime::spawn(async move {
            sleep(Duration::from_millis(delay_ms)).await;
            let runtime = app.state::<ControllerRuntime>();
            runtime.with_controller(|ctl| ctl.on_scheduled(message));
        });
    }

    fn request_exit(&self) {
        self.app.exit(0);
    }

    fn is_primary_platform(&self) -> bool {
        cfg!(target_os = "macos")
    }
}

/// Decodes the embedded tray icon for the given tracking state.
fn tray_icon(tracking: bool) -> Option<Image<'static>> {
    let bytes: &'static [u8] = if tracking {
        TRAY_ICON_ACTIVE
    } else {
        TRAY_ICON_IDLE
    };
    match Image::from_bytes(bytes) {
        Ok(icon) => Some(icon),
        Err(err) => {
            warn!("Failed to decode tray icon: {err}");
            None
        }
    }
}

fn build_tray_menu<R: Runtime>(
    app: &AppHandle<R>,
    entries: &[TrayMenuEntry],
) -> tauri::Result<Menu<R>> {
    let menu = Menu::new(app)?;
    for entry in entries {
        if entry.separator {
            menu.append(&PredefinedMenuItem::separator(app)?)?;
        } else {
            menu.append(&MenuItem::with_id(
                app,
                entry.id,
                &entry.label,
                entry.enabled,
                None::<&str>,
            )?)?;
        }
    }
    Ok(menu)
}

/// Managed state joining the immutable channel table with the controller.
pub struct ControllerRuntime {
    bus: MessageBus<Controller<TauriPlatform>>,
    controller: Mutex<Controller<TauriPlatform>>,
}

impl ControllerRuntime {
    fn with_controller<T>(&self, op: impl FnOnce(&mut Controller<TauriPlatform>) -> T) -> T {
        let mut guard = self.controller.lock().unwrap();
        op(&mut guard)
    }

    fn dispatch(&self, channel: &str, payload: Value) {
        self.with_controller(|ctl| self.bus.send(ctl, channel, payload));
    }

    fn dispatch_sync(&self, channel: &str, payload: Value) -> error::Result<Value> {
        self.with_controller(|ctl| self.bus.send_sync(ctl, channel, payload))
    }
}

/// Fire-and-forget bridge call from a surface.
#[tauri::command]
fn bus_send(runtime: tauri::State<'_, ControllerRuntime>, channel: String, payload: Option<Value>) {
    runtime.dispatch(&channel, payload.unwrap_or(Value::Null));
}

/// Request/reply bridge call; fails loudly when no handler is registered.
#[tauri::command]
fn bus_send_sync(
    runtime: tauri::State<'_, ControllerRuntime>,
    channel: String,
    payload: Option<Value>,
) -> Result<Value, String> {
    runtime
        .dispatch_sync(&channel, payload.unwrap_or(Value::Null))
        .map_err(|err| err.to_string())
}

fn content_geometry(window: &tauri::Window) -> Option<WindowGeometry> {
    let size = window.inner_size().ok()?;
    let scale = window.scale_factor().unwrap_or(1.0);
    let logical = size.to_logical::<u32>(scale);
    Some(WindowGeometry {
        width: logical.width,
        height: logical.height,
    })
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .try_init();

    info!("Starting Chronos background controller");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_notification::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_process::init())
        .plugin(tauri_plugin_clipboard_manager::init())
        .setup(|app| {
            let app_handle = app.handle().clone();
            let platform = TauriPlatform::new(app_handle.clone());
            let mut controller = Controller::new(platform, SecretsManager::new());

            if let Some(window) = app.get_webview_window(SurfaceKind::Main.label()) {
                if let Ok(store) = GeometryStore::new() {
                    if let Some(geometry) = store.load() {
                        let _ = window.set_size(tauri::LogicalSize::new(
                            geometry.width as f64,
                            geometry.height as f64,
                        ));
                    }
                }
                controller
                    .windows
                    .adopt(SurfaceKind::Main, TauriSurface::new(window));
            }

            let initial_menu = build_tray_menu(&app_handle, &controller.tray.menu_model())?;

            let mut bus = MessageBus::default();
            Controller::register_channels(&mut bus);
            app.manage(ControllerRuntime {
                bus,
                controller: Mutex::new(controller),
            });

            let mut tray_builder = TrayIconBuilder::with_id(TRAY_ID)
                .menu(&initial_menu)
                .on_menu_event(|app, event| {
                    let runtime = app.state::<ControllerRuntime>();
                    runtime.with_controller(|ctl| ctl.on_tray_menu_click(event.id.as_ref()));
                });
            if let Some(icon) = tray_icon(false) {
                tray_builder = tray_builder.icon(icon);
            }
            let _tray = tray_builder.build(app)?;

            app_handle
                .state::<ControllerRuntime>()
                .with_controller(|ctl| ctl.sync_tray());

            Ok(())
        })
        .on_page_load(|webview, payload| {
            if !matches!(payload.event(), PageLoadEvent::Finished) {
                return;
            }
            let Some(kind) = SurfaceKind::from_label(webview.label()) else {
                return;
            };
            let app = webview.app_handle().clone();
            tauri::async_runtime::spawn(async move {
                let runtime = app.state::<ControllerRuntime>();
                runtime.with_controller(|ctl| ctl.on_page_ready(kind));
            });
        })
        .on_window_event(|window, event| {
            let Some(kind) = SurfaceKind::from_label(window.label()) else {
                return;
            };
            match event {
                tauri::WindowEvent::CloseRequested { api, .. } => {
                    let content_size = (kind == SurfaceKind::Main)
                        .then(|| content_geometry(window))
                        .flatten();
                    let runtime = window.app_handle().state::<ControllerRuntime>();
                    let outcome =
                        runtime.with_controller(|ctl| ctl.on_close_requested(kind, content_size));
                    match outcome {
                        CloseRequestOutcome::Proceed => {}
                        CloseRequestOutcome::Prevent => api.prevent_close(),
                        CloseRequestOutcome::PreventAndHide => {
                            api.prevent_close();
                            if let Err(err) = window.hide() {
                                warn!("Failed to hide {kind:?}: {err}");
                            }
                        }
                    }
                }
                tauri::WindowEvent::Destroyed => {
                    let runtime = window.app_handle().state::<ControllerRuntime>();
                    runtime.with_controller(|ctl| ctl.on_surface_destroyed(kind));
                }
                _ => {}
            }
        })
        .invoke_handler(tauri::generate_handler![bus_send, bus_send_sync])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let RunEvent::ExitRequested { api, code, .. } = event {
                // An explicit exit code means a quit decision already ran;
                // OS- or menu-initiated requests go through quit evaluation
                // and may be deferred while work is in flight.
                let runtime = app.state::<ControllerRuntime>();
                let allow = runtime.with_controller(|ctl| ctl.on_exit_requested(code.is_some()));
                if !allow {
                    api.prevent_exit();
                }
            }
        });
}
