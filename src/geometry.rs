//! File-backed store for the main window's last known geometry.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::{ControllerError, Result};

/// Fixed key the geometry record is persisted under.
const GEOMETRY_KEY: &str = "lastWindowSize";

/// Content size below which a window is treated as not worth persisting.
const MIN_TRACKED_DIMENSION: u32 = 1;

/// Main window content size persisted across sessions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub width: u32,
    pub height: u32,
}

impl WindowGeometry {
    /// Rejects degenerate sizes reported by a window that never laid out.
    pub fn is_trivial(&self) -> bool {
        self.width < MIN_TRACKED_DIMENSION || self.height < MIN_TRACKED_DIMENSION
    }
}

/// Manages the JSON key-value file holding window geometry in the
/// platform-specific config directory.
pub struct GeometryStore {
    path: PathBuf,
}

impl GeometryStore {
    /// Creates a store bound to the platform-specific app config path.
    pub fn new() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("io", "chronos", "chronos")
            .ok_or_else(|| ControllerError::Storage("config directory unavailable".to_string()))?;
        let path = dirs.config_dir().join("window-state.json");
        Ok(Self { path })
    }

    #[cfg(test)]
    fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the persisted geometry, returning None when the record is missing
    /// or unreadable. Read failures fall back to defaults, never surface.
    pub fn load(&self) -> Option<WindowGeometry> {
        let content = fs::read_to_string(&self.path).ok()?;
        let records: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&content).ok()?;
        let record = records.get(GEOMETRY_KEY)?;
        match serde_json::from_value(record.clone()) {
            Ok(geometry) => Some(geometry),
            Err(err) => {
                debug!("Discarding malformed geometry record: {err}");
                None
            }
        }
    }

    /// Persists the geometry record, creating parent directories when needed.
    pub fn save(&self, geometry: WindowGeometry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut records: serde_json::Map<String, serde_json::Value> = self
            .path
            .exists()
            .then(|| fs::read_to_string(&self.path).ok())
            .flatten()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        records.insert(GEOMETRY_KEY.to_string(), serde_json::to_value(geometry)?);
        let content = serde_json::to_string_pretty(&records)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        env::temp_dir().join(format!("chronos-tests-{name}-{nanos}/window-state.json"))
    }

    #[test]
    fn load_missing_file_returns_none() {
        let store = GeometryStore::at(unique_path("missing"));
        assert!(store.load().is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = unique_path("roundtrip");
        let parent = path.parent().map(ToOwned::to_owned);
        let store = GeometryStore::at(path);

        let geometry = WindowGeometry {
            width: 1040,
            height: 800,
        };
        store.save(geometry).expect("save should succeed");
        assert_eq!(store.load(), Some(geometry));

        if let Some(parent) = parent {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn corrupt_file_falls_back_to_none() {
        let path = unique_path("corrupt");
        let parent = path.parent().expect("parent must exist").to_owned();
        fs::create_dir_all(&parent).expect("create temp directory");
        fs::write(&path, "not-valid-json").expect("write corrupt store");

        let store = GeometryStore::at(path);
        assert!(store.load().is_none());

        let _ = fs::remove_dir_all(parent);
    }

    #[test]
    fn trivial_sizes_are_flagged() {
        assert!(WindowGeometry {
            width: 0,
            height: 600
        }
        .is_trivial());
        assert!(!WindowGeometry {
            width: 1040,
            height: 800
        }
        .is_trivial());
    }
}
