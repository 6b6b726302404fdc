//! Keyring-backed credential store and per-host basic-auth registry.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use keyring::{Entry, Error as KeyringError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{ControllerError, Result};

const KEYRING_SERVICE: &str = "Chronos";

/// Shared handle over the OS secret store plus the in-memory map of hosts whose
/// web traffic gets a Basic authorization header attached.
#[derive(Clone)]
pub struct SecretsManager {
    inner: Arc<SecretsInner>,
}

struct SecretsInner {
    keyring_service: String,
    host_auth: Mutex<HashMap<String, String>>,
}

impl SecretsManager {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    fn with_service(service: &str) -> Self {
        SecretsManager {
            inner: Arc::new(SecretsInner {
                keyring_service: service.to_string(),
                host_auth: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Stores the password for a username under the fixed service name.
    pub fn store_password(&self, username: &str, password: &str) -> Result<()> {
        let entry = self.password_entry(username)?;
        entry
            .set_password(password)
            .map_err(|err| ControllerError::SecretStore(err.to_string()))
    }

    /// Reads the stored password for a username; None when no entry exists.
    pub fn get_password(&self, username: &str) -> Result<Option<String>> {
        let entry = self.password_entry(username)?;
        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(ControllerError::SecretStore(err.to_string())),
        }
    }

    /// Registers the Basic authorization header attached to web traffic for
    /// the given host (media requests rendered inside the webview).
    pub fn register_host_auth(&self, host: &str, username: &str, password: &str) {
        let trimmed = host.trim();
        if trimmed.is_empty() {
            return;
        }
        let header = basic_auth_header(username, password);
        self.inner
            .host_auth
            .lock()
            .unwrap()
            .insert(trimmed.to_string(), header);
    }

    /// Header previously registered for a host, if any.
    pub fn auth_header_for(&self, host: &str) -> Option<String> {
        self.inner.host_auth.lock().unwrap().get(host.trim()).cloned()
    }

    fn password_entry(&self, username: &str) -> Result<Entry> {
        Entry::new(&self.inner.keyring_service, username)
            .map_err(|err| ControllerError::SecretStore(err.to_string()))
    }
}

/// Builds the `Basic` authorization header value for a credential pair.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    let encoded = BASE64_STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header_encodes_credentials() {
        assert_eq!(
            basic_auth_header("bob", "hunter2"),
            "Basic Ym9iOmh1bnRlcjI="
        );
    }

    #[test]
    fn host_auth_registry_round_trips() {
        let secrets = SecretsManager::with_service("chronos-tests");
        secrets.register_host_auth("team.example.com", "bob", "hunter2");

        assert_eq!(
            secrets.auth_header_for("team.example.com").as_deref(),
            Some("Basic Ym9iOmh1bnRlcjI=")
        );
        assert!(secrets.auth_header_for("other.example.com").is_none());
    }

    #[test]
    fn blank_host_is_not_registered() {
        let secrets = SecretsManager::with_service("chronos-tests");
        secrets.register_host_auth("   ", "bob", "hunter2");
        assert!(secrets.auth_header_for("").is_none());
    }

    #[test]
    fn host_lookup_trims_whitespace() {
        let secrets = SecretsManager::with_service("chronos-tests");
        secrets.register_host_auth(" team.example.com ", "bob", "pw");
        assert!(secrets.auth_header_for("team.example.com").is_some());
    }
}
