//! Registry tracking the lifecycle of every named UI surface.

use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;

/// Named surfaces the controller manages. At most one live instance exists per
/// kind; popups are ephemeral and unregistered after their single use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    Main,
    Issue,
    IdlePopup,
    ScreenshotPopup,
    AuthBrowser,
}

impl SurfaceKind {
    /// Window label used by the platform layer.
    pub fn label(&self) -> &'static str {
        match self {
            SurfaceKind::Main => "main",
            SurfaceKind::Issue => "issue",
            SurfaceKind::IdlePopup => "idle-popup",
            SurfaceKind::ScreenshotPopup => "screenshot-popup",
            SurfaceKind::AuthBrowser => "auth",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "main" => Some(SurfaceKind::Main),
            "issue" => Some(SurfaceKind::Issue),
            "idle-popup" => Some(SurfaceKind::IdlePopup),
            "screenshot-popup" => Some(SurfaceKind::ScreenshotPopup),
            "auth" => Some(SurfaceKind::AuthBrowser),
            _ => None,
        }
    }
}

/// Lifecycle of a registered surface; an unregistered kind is Absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Creating,
    Visible,
    Hidden,
    Closing,
}

/// Minimal operations a surface exposes to the controller. The production
/// implementation wraps a webview window; tests substitute a recording stub.
pub trait Surface {
    fn emit(&self, channel: &str, payload: &Value) -> Result<()>;
    fn show(&self) -> Result<()>;
    fn hide(&self) -> Result<()>;
    fn close(&self) -> Result<()>;
    fn eval(&self, script: &str) -> Result<()>;
    fn minimize(&self) -> Result<()>;
    fn maximize(&self) -> Result<()>;
    fn unmaximize(&self) -> Result<()>;
}

struct Entry<S> {
    surface: S,
    lifecycle: Lifecycle,
    queued: Vec<(String, Value)>,
}

/// Tracks zero-or-one instance of each surface kind. Messages delivered while
/// a surface is still Creating are queued and flushed FIFO once it reports
/// ready, so a burst of requests reuses the in-flight instance instead of
/// spawning duplicates.
pub struct WindowRegistry<S> {
    entries: HashMap<SurfaceKind, Entry<S>>,
}

impl<S> Default for WindowRegistry<S> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<S: Surface> WindowRegistry<S> {
    /// Ensures a surface exists, invoking the factory only when no live handle
    /// is registered. Returns true when a new surface was created.
    pub fn ensure<F>(&mut self, kind: SurfaceKind, factory: F) -> Result<bool>
    where
        F: FnOnce() -> Result<S>,
    {
        if self.entries.contains_key(&kind) {
            return Ok(false);
        }
        let surface = factory()?;
        self.entries.insert(
            kind,
            Entry {
                surface,
                lifecycle: Lifecycle::Creating,
                queued: Vec::new(),
            },
        );
        Ok(true)
    }

    /// Registers an externally created surface as already visible (Main).
    pub fn adopt(&mut self, kind: SurfaceKind, surface: S) {
        self.entries.insert(
            kind,
            Entry {
                surface,
                lifecycle: Lifecycle::Visible,
                queued: Vec::new(),
            },
        );
    }

    /// Sends a channel message to a surface, queueing while it is Creating.
    /// Messages to an absent surface are dropped with a log line.
    pub fn deliver(&mut self, kind: SurfaceKind, channel: &str, payload: Value) {
        let Some(entry) = self.entries.get_mut(&kind) else {
            debug!(
                "Dropping '{channel}' for absent surface {:?}",
                kind
            );
            return;
        };
        if entry.lifecycle == Lifecycle::Creating {
            entry.queued.push((channel.to_string(), payload));
            return;
        }
        if let Err(err) = entry.surface.emit(channel, &payload) {
            warn!("Failed to deliver '{channel}' to {:?}: {err}", kind);
        }
    }

    /// Transitions a Creating surface to Visible and flushes queued messages
    /// in arrival order.
    pub fn mark_ready(&mut self, kind: SurfaceKind) {
        let Some(entry) = self.entries.get_mut(&kind) else {
            return;
        };
        if entry.lifecycle != Lifecycle::Creating {
            return;
        }
        entry.lifecycle = Lifecycle::Visible;
        for (channel, payload) in entry.queued.drain(..) {
            if let Err(err) = entry.surface.emit(&channel, &payload) {
                warn!("Failed to flush '{channel}' to {:?}: {err}", kind);
            }
        }
    }

    /// Shows the surface; no-op when absent.
    pub fn show(&mut self, kind: SurfaceKind) {
        if let Some(entry) = self.entries.get_mut(&kind) {
            if let Err(err) = entry.surface.show() {
                warn!("Failed to show {:?}: {err}", kind);
                return;
            }
            if entry.lifecycle == Lifecycle::Hidden {
                entry.lifecycle = Lifecycle::Visible;
            }
        }
    }

    /// Hides the surface; no-op when absent.
    pub fn hide(&mut self, kind: SurfaceKind) {
        if let Some(entry) = self.entries.get_mut(&kind) {
            if let Err(err) = entry.surface.hide() {
                warn!("Failed to hide {:?}: {err}", kind);
                return;
            }
            if entry.lifecycle == Lifecycle::Visible {
                entry.lifecycle = Lifecycle::Hidden;
            }
        }
    }

    /// Tears the surface down and removes the handle; idempotent.
    pub fn destroy(&mut self, kind: SurfaceKind) {
        if let Some(mut entry) = self.entries.remove(&kind) {
            entry.lifecycle = Lifecycle::Closing;
            if let Err(err) = entry.surface.close() {
                debug!("Close of {:?} reported: {err}", kind);
            }
        }
    }

    /// Drops the handle without asking the surface to close (used when the
    /// platform already destroyed the window underneath us).
    pub fn forget(&mut self, kind: SurfaceKind) {
        self.entries.remove(&kind);
    }

    pub fn lifecycle(&self, kind: SurfaceKind) -> Option<Lifecycle> {
        self.entries.get(&kind).map(|entry| entry.lifecycle)
    }

    /// Runs an operation against a registered surface.
    pub fn with_surface<R>(&self, kind: SurfaceKind, op: impl FnOnce(&S) -> R) -> Option<R> {
        self.entries.get(&kind).map(|entry| op(&entry.surface))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{SurfaceLog, TestSurface};
    use serde_json::json;

    fn registry_with_log() -> (WindowRegistry<TestSurface>, SurfaceLog) {
        (WindowRegistry::default(), SurfaceLog::default())
    }

    #[test]
    fn ensure_creates_once_and_reuses_inflight_handle() {
        let (mut registry, log) = registry_with_log();
        let mut created = 0;

        for _ in 0..2 {
            registry
                .ensure(SurfaceKind::Issue, || {
                    created += 1;
                    Ok(TestSurface::new(SurfaceKind::Issue, &log))
                })
                .expect("factory succeeds");
        }

        assert_eq!(created, 1);
        assert_eq!(
            registry.lifecycle(SurfaceKind::Issue),
            Some(Lifecycle::Creating)
        );
    }

    #[test]
    fn urls_sent_during_creation_reach_the_single_instance_in_order() {
        let (mut registry, log) = registry_with_log();
        registry
            .ensure(SurfaceKind::Issue, || {
                Ok(TestSurface::new(SurfaceKind::Issue, &log))
            })
            .expect("factory succeeds");

        registry.deliver(SurfaceKind::Issue, "url", json!("https://a.example/1"));
        registry
            .ensure(SurfaceKind::Issue, || {
                panic!("second ensure must not construct")
            })
            .expect("reuse succeeds");
        registry.deliver(SurfaceKind::Issue, "url", json!("https://a.example/2"));

        assert!(log.emitted().is_empty());
        registry.mark_ready(SurfaceKind::Issue);

        let emitted = log.emitted();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0], ("url".to_string(), json!("https://a.example/1")));
        assert_eq!(emitted[1], ("url".to_string(), json!("https://a.example/2")));
    }

    #[test]
    fn deliver_after_ready_emits_directly() {
        let (mut registry, log) = registry_with_log();
        registry
            .ensure(SurfaceKind::Issue, || {
                Ok(TestSurface::new(SurfaceKind::Issue, &log))
            })
            .expect("factory succeeds");
        registry.mark_ready(SurfaceKind::Issue);

        registry.deliver(SurfaceKind::Issue, "showForm", json!({ "mode": "edit" }));
        assert_eq!(log.emitted().len(), 1);
    }

    #[test]
    fn deliver_to_absent_surface_is_dropped() {
        let (mut registry, log) = registry_with_log();
        registry.deliver(SurfaceKind::IdlePopup, "anything", json!(null));
        assert!(log.emitted().is_empty());
    }

    #[test]
    fn hide_then_show_tracks_lifecycle() {
        let (mut registry, log) = registry_with_log();
        registry.adopt(SurfaceKind::Main, TestSurface::new(SurfaceKind::Main, &log));

        registry.hide(SurfaceKind::Main);
        assert_eq!(
            registry.lifecycle(SurfaceKind::Main),
            Some(Lifecycle::Hidden)
        );
        registry.show(SurfaceKind::Main);
        assert_eq!(
            registry.lifecycle(SurfaceKind::Main),
            Some(Lifecycle::Visible)
        );
    }

    #[test]
    fn destroy_is_idempotent() {
        let (mut registry, log) = registry_with_log();
        registry.adopt(
            SurfaceKind::ScreenshotPopup,
            TestSurface::new(SurfaceKind::ScreenshotPopup, &log),
        );

        registry.destroy(SurfaceKind::ScreenshotPopup);
        registry.destroy(SurfaceKind::ScreenshotPopup);
        assert_eq!(registry.lifecycle(SurfaceKind::ScreenshotPopup), None);
        assert_eq!(log.closed(), 1);
    }

    #[test]
    fn labels_round_trip() {
        for kind in [
            SurfaceKind::Main,
            SurfaceKind::Issue,
            SurfaceKind::IdlePopup,
            SurfaceKind::ScreenshotPopup,
            SurfaceKind::AuthBrowser,
        ] {
            assert_eq!(SurfaceKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(SurfaceKind::from_label("unknown"), None);
    }
}
