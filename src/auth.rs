//! Embedded authorization flow: callback detection and probe classification.
//!
//! The third-party consent page offers no formal callback, so the controller
//! watches navigation events on the sandboxed browser surface and, after the
//! page settles, injects a probe that reads the outcome paragraph. The probe
//! text is classified here, keeping the flow testable without a webview.

use crate::error::{ControllerError, Result};

/// Address fragment identifying the authorization callback page.
pub const AUTH_CALLBACK_FRAGMENT: &str = "plugins/servlet/oauth/authorize";

/// Delay before probing, giving the callback page time to finish rendering.
pub const PROBE_SETTLE_MS: u64 = 500;

const AUTHORIZED_MARKER: &str = "You have successfully authorized";
const DENIED_MARKER: &str = "You have denied";

/// Script injected into the authorization surface. Reads the outcome paragraph
/// and reports it back over the bus; silent when the fragment is absent so the
/// probe re-arms on the next qualifying navigation.
pub const PROBE_SCRIPT: &str = r#"
(function () {
  var node = document.querySelector('#content p');
  if (!node) { return; }
  var text = node.textContent;
  if (text.indexOf('You have successfully authorized') !== -1) {
    window.__TAURI__.core.invoke('bus_send', { channel: 'oauth-response', payload: text });
  } else if (text.indexOf('You have denied') !== -1) {
    window.__TAURI__.core.invoke('bus_send', { channel: 'oauth-denied', payload: text });
  }
})();
"#;

/// Classified result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Authorization granted; carries the verification token scraped from the
    /// outcome text.
    Authorized { token: String },
    Denied,
    /// Neither marker present; the flow stays pending.
    Indeterminate,
}

/// True when a navigated address is the authorization callback page.
pub fn is_callback_url(url: &str) -> bool {
    url.contains(AUTH_CALLBACK_FRAGMENT)
}

/// Classifies probe text. A success marker with a malformed token body is a
/// `ProbeParse` error: the caller logs it and leaves the surface open.
pub fn classify_probe(text: &str) -> Result<ProbeOutcome> {
    if text.contains(AUTHORIZED_MARKER) {
        let token = extract_token(text)?;
        return Ok(ProbeOutcome::Authorized { token });
    }
    if text.contains(DENIED_MARKER) {
        return Ok(ProbeOutcome::Denied);
    }
    Ok(ProbeOutcome::Indeterminate)
}

/// Pulls the verification token out of the outcome text: second sentence,
/// second single-quoted field.
fn extract_token(text: &str) -> Result<String> {
    let sentence = text
        .split('.')
        .nth(1)
        .ok_or_else(|| ControllerError::ProbeParse("missing token sentence".to_string()))?;
    sentence
        .split('\'')
        .nth(1)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ControllerError::ProbeParse("missing quoted token".to_string()))
}

/// Ephemeral session for one authorization attempt. Holding the session means
/// the AuthBrowser surface is owned by this flow; dropping it lets the next
/// `open-oauth-url` start fresh.
#[derive(Debug, Default)]
pub struct AuthSession {
    probe_scheduled: bool,
}

impl AuthSession {
    /// Marks a probe as scheduled for the current navigation; returns false
    /// when one is already in flight so the settle timer is not doubled.
    pub fn arm_probe(&mut self) -> bool {
        if self.probe_scheduled {
            return false;
        }
        self.probe_scheduled = true;
        true
    }

    /// Re-arms the probe after an indeterminate or failed classification.
    pub fn reset_probe(&mut self) {
        self.probe_scheduled = false;
    }
}
