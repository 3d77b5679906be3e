//! Single-slot persistence of the last successful fetch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
    process,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::{debug, warn};

use crate::{error::CacheError, model::CachedBundle};

/// Bumped whenever the stored layout changes; older files read as empty.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// One stored slot, always overwritten, never versioned by history.
pub trait BundleStore: Send + Sync + Debug {
    fn save(&self, bundle: &CachedBundle) -> Result<(), CacheError>;

    /// The stored bundle, or why there is none.
    fn try_load(&self) -> Result<CachedBundle, CacheError>;

    fn clear(&self) -> Result<(), CacheError>;

    /// Missing and unreadable data both mean "nothing".
    fn load(&self) -> Option<CachedBundle> {
        match self.try_load() {
            Ok(bundle) => Some(bundle),
            Err(CacheError::Miss) => {
                debug!("No cached weather data");
                None
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unusable weather cache");
                None
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<B> {
    version: u32,
    saved_at: DateTime<Utc>,
    bundle: B,
}

/// Peeks at the version before decoding the bundle itself.
#[derive(Debug, Deserialize)]
struct VersionTag {
    version: u32,
}

fn encode(bundle: &CachedBundle) -> Result<String, CacheError> {
    let envelope = Envelope { version: CACHE_FORMAT_VERSION, saved_at: Utc::now(), bundle };
    serde_json::to_string(&envelope).map_err(|e| CacheError::Corrupt(e.to_string()))
}

fn decode(raw: &str) -> Result<CachedBundle, CacheError> {
    let tag: VersionTag =
        serde_json::from_str(raw).map_err(|e| CacheError::Corrupt(e.to_string()))?;
    if tag.version != CACHE_FORMAT_VERSION {
        return Err(CacheError::UnsupportedVersion(tag.version));
    }

    let envelope: Envelope<CachedBundle> =
        serde_json::from_str(raw).map_err(|e| CacheError::Corrupt(e.to_string()))?;
    Ok(envelope.bundle)
}

/// Distinguishes temp files of saves running at the same time.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(format!(".{}.{seq}.tmp", process::id()));
        self.path.with_file_name(name)
    }
}

impl BundleStore for FileStore {
    fn save(&self, bundle: &CachedBundle) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write-then-rename: readers never see a half-written slot.
        let tmp = self.temp_path();
        fs::write(&tmp, encode(bundle)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "Saved weather cache");
        Ok(())
    }

    fn try_load(&self) -> Result<CachedBundle, CacheError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(CacheError::Miss),
            Err(e) => return Err(e.into()),
        };
        decode(&raw)
    }

    fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process slot holding the serialized form, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text as if it had been written by someone else.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { slot: Mutex::new(Some(raw.into())) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BundleStore for MemoryStore {
    fn save(&self, bundle: &CachedBundle) -> Result<(), CacheError> {
        let raw = encode(bundle)?;
        *self.lock() = Some(raw);
        Ok(())
    }

    fn try_load(&self) -> Result<CachedBundle, CacheError> {
        match self.lock().as_deref() {
            Some(raw) => decode(raw),
            None => Err(CacheError::Miss),
        }
    }

    fn clear(&self) -> Result<(), CacheError> {
        *self.lock() = None;
        Ok(())
    }
}
