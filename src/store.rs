//! Durable storage for the last-known capture status.
//!
//! The store holds a single string entry under [`STATUS_KEY`]. It is read
//! once when the controller is built and written on every transition.
//! Metadata and stream handles are never persisted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::status::CaptureStatus;

/// Key of the persisted status entry.
pub const STATUS_KEY: &str = "screen_share_status";

/// Persistence adapter for the controller's status.
///
/// `save` is best-effort: implementations log failures instead of
/// returning them, and never retry.
pub trait StatusStore {
    /// Last-known status, or [`CaptureStatus::Idle`] when nothing usable is stored.
    fn load(&self) -> CaptureStatus;

    /// Record `status` as the last-known status.
    fn save(&mut self, status: CaptureStatus);
}

/// Errors from the file-backed store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access status file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse status file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize status: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Status store backed by a small TOML file.
///
/// File content is a single line: `screen_share_status = "granted"`.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    path: PathBuf,
}

impl FileStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw stored string, if any.
    pub fn read_raw(&self) -> Result<Option<String>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let mut entries: BTreeMap<String, String> =
            toml::from_str(&content).map_err(|e| StoreError::Parse {
                path: self.path.clone(),
                source: e,
            })?;
        Ok(entries.remove(STATUS_KEY))
    }

    /// Write `value` as the stored string, creating parent directories.
    pub fn write_raw(&self, value: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let mut entries = BTreeMap::new();
        entries.insert(STATUS_KEY.to_string(), value.to_string());
        let content = toml::to_string(&entries)?;
        std::fs::write(&self.path, content).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl StatusStore for FileStatusStore {
    fn load(&self) -> CaptureStatus {
        match self.read_raw() {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
                log::warn!("Ignoring stored status: {}", e);
                CaptureStatus::Idle
            }),
            Ok(None) => CaptureStatus::Idle,
            Err(e) => {
                log::warn!("{}", e);
                CaptureStatus::Idle
            }
        }
    }

    fn save(&mut self, status: CaptureStatus) {
        if let Err(e) = self.write_raw(status.as_str()) {
            log::warn!("Could not persist status '{}': {}", status, e);
        }
    }
}

/// In-memory status store.
///
/// Clones share the same slot, so a test can hand one clone to a
/// controller and inspect or reuse the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    slot: Arc<Mutex<Option<CaptureStatus>>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `status`.
    pub fn with_status(status: CaptureStatus) -> Self {
        let store = Self::new();
        if let Ok(mut slot) = store.slot.lock() {
            *slot = Some(status);
        }
        store
    }

    /// The stored value, without the `idle` fallback.
    pub fn stored(&self) -> Option<CaptureStatus> {
        self.slot.lock().ok().and_then(|slot| *slot)
    }
}

impl StatusStore for MemoryStatusStore {
    fn load(&self) -> CaptureStatus {
        self.stored().unwrap_or_default()
    }

    fn save(&mut self, status: CaptureStatus) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(status);
        }
    }
}

/// Default status file: `<data dir>/screenshare-probe/status.toml`.
pub fn default_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("screenshare-probe")
        .join("status.toml")
}
