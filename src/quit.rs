//! Close/quit evaluation for the main window.
//!
//! Process termination is deferred while tracking or uploading is active; on
//! the primary desktop platform (macOS convention) a plain close hides the
//! window and keeps the process resident until an in-app action sets
//! should-quit.

/// Outcome of evaluating one close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Active work: veto the close. `send_force_save` is true on the first
    /// deferral of an attempt so Main flushes pending work exactly once.
    Deferred { send_force_save: bool },
    /// Primary-platform convention: window hides, process stays alive.
    Hidden,
    /// Close proceeds; process may terminate.
    Closed,
}

/// State machine guarding window close and process quit.
#[derive(Debug, Clone)]
pub struct QuitCoordinator {
    primary_platform: bool,
    should_quit: bool,
    force_save_sent: bool,
}

impl QuitCoordinator {
    /// Off the primary platform a close terminates by default; on it, quitting
    /// requires an explicit in-app action.
    pub fn new(primary_platform: bool) -> Self {
        Self {
            primary_platform,
            should_quit: !primary_platform,
            force_save_sent: false,
        }
    }

    /// Evaluates a user/system close request against current activity.
    pub fn evaluate_close(&mut self, activity_in_flight: bool) -> CloseDecision {
        if activity_in_flight {
            let send_force_save = !self.force_save_sent;
            self.force_save_sent = true;
            self.should_quit = false;
            return CloseDecision::Deferred { send_force_save };
        }

        // Attempt resolved; a future deferred attempt may force-save again.
        self.force_save_sent = false;

        if !self.primary_platform || self.should_quit {
            CloseDecision::Closed
        } else {
            CloseDecision::Hidden
        }
    }

    /// `set-should-quit` / `ready-to-quit`: the next clean evaluation closes.
    pub fn set_should_quit(&mut self) {
        self.should_quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }
}
