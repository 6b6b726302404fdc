//! Screenshot confirm/reject workflow with a fail-open timeout.

/// Terminal outcome of one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Accept,
    Reject,
}

impl Resolution {
    /// Channel name broadcast to Main for this outcome.
    pub fn channel(&self) -> &'static str {
        match self {
            Resolution::Accept => "screenshot-accept",
            Resolution::Reject => "screenshot-reject",
        }
    }
}

/// Where the confirmation request is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    NativeNotification,
    Popup,
}

/// Picks the confirmation route: native notifications must be enabled, and on
/// the primary desktop platform additionally explicitly enabled by the user.
pub fn pick_delivery(
    native_enabled: bool,
    primary_platform: bool,
    explicitly_enabled_on_primary: bool,
) -> Delivery {
    if native_enabled && (!primary_platform || explicitly_enabled_on_primary) {
        Delivery::NativeNotification
    } else {
        Delivery::Popup
    }
}

/// Tracks the capture currently awaiting a decision. Capture ids are
/// monotonically increasing so a timeout firing for a superseded capture is
/// discarded by the id check rather than a cancellation token.
#[derive(Debug, Default)]
pub struct ScreenshotWorkflow {
    next_id: u64,
    pending: Option<PendingCapture>,
}

#[derive(Debug)]
struct PendingCapture {
    id: u64,
    resolved: bool,
}

impl ScreenshotWorkflow {
    /// Opens a new capture, superseding any unresolved one, and returns its id.
    pub fn begin(&mut self) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.pending = Some(PendingCapture {
            id,
            resolved: false,
        });
        id
    }

    /// Resolves the capture exactly once. Stale ids and duplicate resolutions
    /// return None so a timeout racing an explicit action has no second effect.
    pub fn try_resolve(&mut self, capture_id: u64, resolution: Resolution) -> Option<Resolution> {
        let pending = self.pending.as_mut()?;
        if pending.id != capture_id || pending.resolved {
            return None;
        }
        pending.resolved = true;
        Some(resolution)
    }

    /// Resolves whichever capture is currently pending (explicit user action).
    pub fn try_resolve_current(&mut self, resolution: Resolution) -> Option<Resolution> {
        let id = self.pending.as_ref().map(|pending| pending.id)?;
        self.try_resolve(id, resolution)
    }

    /// Id of the unresolved capture, if any.
    pub fn pending_id(&self) -> Option<u64> {
        self.pending
            .as_ref()
            .filter(|pending| !pending.resolved)
            .map(|pending| pending.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_action_race_resolves_once() {
        let mut workflow = ScreenshotWorkflow::default();
        let id = workflow.begin();

        assert_eq!(
            workflow.try_resolve_current(Resolution::Reject),
            Some(Resolution::Reject)
        );
        // Late timeout for the same capture is suppressed.
        assert_eq!(workflow.try_resolve(id, Resolution::Accept), None);
    }

    #[test]
    fn stale_timeout_for_superseded_capture_is_ignored() {
        let mut workflow = ScreenshotWorkflow::default();
        let first = workflow.begin();
        let second = workflow.begin();

        assert_eq!(workflow.try_resolve(first, Resolution::Accept), None);
        assert_eq!(
            workflow.try_resolve(second, Resolution::Accept),
            Some(Resolution::Accept)
        );
    }

    #[test]
    fn resolve_without_pending_capture_is_noop() {
        let mut workflow = ScreenshotWorkflow::default();
        assert_eq!(workflow.try_resolve_current(Resolution::Accept), None);
        assert_eq!(workflow.try_resolve(42, Resolution::Reject), None);
    }

    #[test]
    fn pending_id_clears_after_resolution() {
        let mut workflow = ScreenshotWorkflow::default();
        let id = workflow.begin();
        assert_eq!(workflow.pending_id(), Some(id));
        workflow.try_resolve(id, Resolution::Accept);
        assert_eq!(workflow.pending_id(), None);
    }

    #[test]
    fn delivery_routes_per_platform_rules() {
        assert_eq!(
            pick_delivery(true, false, false),
            Delivery::NativeNotification
        );
        assert_eq!(
            pick_delivery(true, true, true),
            Delivery::NativeNotification
        );
        assert_eq!(pick_delivery(true, true, false), Delivery::Popup);
        assert_eq!(pick_delivery(false, false, false), Delivery::Popup);
    }

    #[test]
    fn resolution_channels_match_wire_names() {
        assert_eq!(Resolution::Accept.channel(), "screenshot-accept");
        assert_eq!(Resolution::Reject.channel(), "screenshot-reject");
    }
}
