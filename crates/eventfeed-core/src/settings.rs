//! Persistent key/value settings store.
//!
//! Holds the admin-managed source settings and the two ICS cache slots.
//! The `SettingsStore` trait is injected everywhere so tests can use the
//! in-memory store.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::config::SourceSeed;
use crate::error::StoreError;

/// Result type for settings store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Keys persisted in the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    IcsUrl,
    GoogleApiKey,
    GoogleCalendarId,
    FeatureSwitch,
    IcsCache,
    IcsCacheTimestamp,
}

impl SettingKey {
    pub const ALL: [SettingKey; 6] = [
        SettingKey::IcsUrl,
        SettingKey::GoogleApiKey,
        SettingKey::GoogleCalendarId,
        SettingKey::FeatureSwitch,
        SettingKey::IcsCache,
        SettingKey::IcsCacheTimestamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::IcsUrl => "ics_url",
            SettingKey::GoogleApiKey => "google_api_key",
            SettingKey::GoogleCalendarId => "google_calendar_id",
            SettingKey::FeatureSwitch => "feature_switch",
            SettingKey::IcsCache => "ics_cache",
            SettingKey::IcsCacheTimestamp => "ics_cache_timestamp",
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for settings storage backends.
///
/// Implementations serialize access internally; callers share them behind `Arc`.
pub trait SettingsStore: Send + Sync {
    /// Read a value. Returns `None` if the key was never set or was deleted.
    fn get(&self, key: SettingKey) -> StoreResult<Option<String>>;

    /// Insert or overwrite a value.
    fn set(&self, key: SettingKey, value: &str) -> StoreResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn delete(&self, key: SettingKey) -> StoreResult<()>;
}

/// In-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<SettingKey, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: SettingKey) -> StoreResult<Option<String>> {
        Ok(self.values.lock().get(&key).cloned())
    }

    fn set(&self, key: SettingKey, value: &str) -> StoreResult<()> {
        self.values.lock().insert(key, value.to_string());
        Ok(())
    }

    fn delete(&self, key: SettingKey) -> StoreResult<()> {
        self.values.lock().remove(&key);
        Ok(())
    }
}

/// Settings store backed by a JSON object file.
///
/// The whole file is rewritten on every `set`/`delete`; reads are served from memory.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettingsStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let json = std::fs::read_to_string(&path).map_err(|e| StoreError::Io(e.to_string()))?;
            if json.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&json).map_err(|e| StoreError::Corrupt(e.to_string()))?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Opened settings store at {:?} ({} keys)", path, values.len());

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let json =
            serde_json::to_string_pretty(values).map_err(|e| StoreError::Serialize(e.to_string()))?;

        // Atomic replace via rename.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: SettingKey) -> StoreResult<Option<String>> {
        Ok(self.values.lock().get(key.as_str()).cloned())
    }

    fn set(&self, key: SettingKey, value: &str) -> StoreResult<()> {
        let mut values = self.values.lock();
        values.insert(key.as_str().to_string(), value.to_string());
        self.persist(&values)
    }

    fn delete(&self, key: SettingKey) -> StoreResult<()> {
        let mut values = self.values.lock();
        if values.remove(key.as_str()).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}

/// Which calendar backend serves `/events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSwitch {
    #[default]
    Google,
    Nextcloud,
}

impl FeatureSwitch {
    /// Parse a stored value. Anything but `nextcloud` selects Google.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("nextcloud") => FeatureSwitch::Nextcloud,
            _ => FeatureSwitch::Google,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSwitch::Google => "google",
            FeatureSwitch::Nextcloud => "nextcloud",
        }
    }
}

/// Source settings as read on each request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSettings {
    pub ics_url: Option<String>,
    pub google_api_key: Option<String>,
    pub google_calendar_id: Option<String>,
    pub feature: FeatureSwitch,
}

impl SourceSettings {
    /// Read the source settings. Empty strings count as unset.
    pub fn load(store: &dyn SettingsStore) -> StoreResult<Self> {
        let non_empty = |key: SettingKey| -> StoreResult<Option<String>> {
            Ok(store
                .get(key)?
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()))
        };

        Ok(Self {
            ics_url: non_empty(SettingKey::IcsUrl)?,
            google_api_key: non_empty(SettingKey::GoogleApiKey)?,
            google_calendar_id: non_empty(SettingKey::GoogleCalendarId)?,
            feature: FeatureSwitch::from_stored(store.get(SettingKey::FeatureSwitch)?.as_deref()),
        })
    }

    /// Copy seed values into the store for every key that is not set yet.
    ///
    /// Returns the number of keys written.
    pub fn seed_missing(store: &dyn SettingsStore, seed: &SourceSeed) -> StoreResult<usize> {
        let pairs = [
            (SettingKey::IcsUrl, &seed.ics_url),
            (SettingKey::GoogleApiKey, &seed.google_api_key),
            (SettingKey::GoogleCalendarId, &seed.google_calendar_id),
            (SettingKey::FeatureSwitch, &seed.feature),
        ];

        let mut written = 0;
        for (key, value) in pairs {
            if let Some(value) = value {
                if store.get(key)?.is_none() {
                    store.set(key, value)?;
                    written += 1;
                }
            }
        }

        if written > 0 {
            tracing::info!("Seeded {} source settings from config", written);
        }
        Ok(written)
    }
}
