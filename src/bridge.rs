//! Bus payload shapes exchanged with the UI surfaces.
//!
//! This module defines the serialized payloads carried over bus channels
//! between the controller and the webview surfaces.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Credentials submitted over `store-credentials`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CredentialsPayload {
    pub username: String,
    pub password: String,
    pub host: String,
}

/// Lookup request carried by `get-credentials`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CredentialsQuery {
    pub username: String,
    pub host: String,
}

/// Successful `get-credentials` reply body.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredCredentials {
    pub username: String,
    pub password: String,
}

/// Structured error reply for credential lookups; carries the platform name so
/// the surface can render a platform-aware message instead of crashing.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CredentialsError {
    pub err: String,
    pub platform: String,
}

/// One `issue-created` entry; each is rebroadcast to Main as `newIssue`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IssueCreatedEntry {
    pub issue_key: String,
}

/// One login-debug line: either a literal string or a structured value that is
/// pretty-printed when formatted.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DebugMessage {
    pub string: Option<String>,
    pub json: Option<Value>,
}

/// Joins debug messages into the newline-separated log body written to a file
/// or the clipboard.
pub fn format_debug_messages(messages: &[DebugMessage]) -> String {
    messages
        .iter()
        .map(|message| match (&message.string, &message.json) {
            (Some(text), _) => text.clone(),
            (None, Some(value)) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            (None, None) => String::new(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default file name offered by the `save-login-debug` dialog.
pub fn debug_log_file_name() -> String {
    format!("chronos-{}-auth-debug.log", env!("CARGO_PKG_VERSION"))
}
