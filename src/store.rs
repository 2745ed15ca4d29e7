//! Persistent per-day reading history.
//!
//! The whole history lives in one JSON blob stored under the key
//! [`HISTORY_KEY`] of a [`KeyValueStore`]:
//!
//! ```json
//! { "2023-11-14": { "timestamps": [..], "temperature": [..], "humidity": [..] } }
//! ```
//!
//! Loading never fails: a missing or unreadable blob yields an empty store,
//! and individual buckets that do not match the schema are dropped.
//!
//! Writes run on tokio's blocking pool. The caller keeps the store locked
//! until the write finishes, so blobs land in append order.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::models::{DateKey, DayHistory, Reading};

// ---

pub const HISTORY_KEY: &str = "history";

/// String-keyed blob storage. Handles are cheap to clone and share the
/// same underlying entries.
pub trait KeyValueStore: Clone + Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-process store, used by tests and throwaway runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<StdMutex<HashMap<String, String>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory.
///
/// Writes go to a uniquely named temp file first and are renamed into place,
/// so a crash mid-write leaves the previous blob intact.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    // ---
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // ---
        let tmp = self.dir.join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, value)?;
        if let Err(e) = fs::rename(&tmp, self.path_for(key)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Persisted shape of one bucket. The date is the map key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDay {
    timestamps: Vec<i64>,
    temperature: Vec<f64>,
    humidity: Vec<f64>,
}

/// Date-keyed history backed by a [`KeyValueStore`].
#[derive(Debug)]
pub struct HistoryStore<K> {
    // ---
    kv: K,
    days: BTreeMap<DateKey, DayHistory>,
    /// Number of calendar days to keep, newest first. `0` keeps everything.
    retention_days: u32,
}

/// Store shared between the live updater (writer) and local queries (reader).
pub type SharedHistory<K> = Arc<Mutex<HistoryStore<K>>>;

impl<K: KeyValueStore> HistoryStore<K> {
    // ---
    /// Load the history blob from `kv`. Absent or corrupt data yields an
    /// empty store; this never fails.
    pub fn load(kv: K, retention_days: u32) -> Self {
        // ---
        let days = match kv.get(HISTORY_KEY) {
            Ok(Some(blob)) => parse_blob(&blob),
            Ok(None) => {
                tracing::debug!("No stored history, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "History storage unreadable, starting empty");
                BTreeMap::new()
            }
        };

        let mut store = Self {
            kv,
            days,
            retention_days,
        };
        store.apply_retention();

        tracing::info!(
            days = store.days.len(),
            retention_days,
            "History store loaded"
        );
        store
    }

    pub fn into_shared(self) -> SharedHistory<K> {
        Arc::new(Mutex::new(self))
    }

    /// Append `reading` to the bucket for `date` and persist the whole store.
    ///
    /// A date older than the retention window is rejected with
    /// [`StorageError::OutsideRetention`] and nothing changes. The in-memory
    /// append stands even if persisting fails.
    pub async fn append(&mut self, date: DateKey, reading: &Reading) -> Result<(), StorageError> {
        // ---
        if let Some(cutoff) = self.oldest_kept() {
            if date < cutoff {
                return Err(StorageError::OutsideRetention { date, cutoff });
            }
        }

        self.days
            .entry(date)
            .or_insert_with(|| DayHistory::new(date))
            .push(reading);
        self.apply_retention();
        self.persist().await
    }

    /// Bucket for `date`, or `None` when nothing was recorded that day.
    pub fn query(&self, date: DateKey) -> Option<&DayHistory> {
        self.days.get(&date)
    }

    pub fn dates(&self) -> impl Iterator<Item = DateKey> + '_ {
        self.days.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Serialize the whole store and write it under [`HISTORY_KEY`].
    pub async fn persist(&self) -> Result<(), StorageError> {
        // ---
        let stored: BTreeMap<String, StoredDay> = self
            .days
            .iter()
            .map(|(date, day)| {
                (
                    date.to_string(),
                    StoredDay {
                        timestamps: day.timestamps().to_vec(),
                        temperature: day.temperature().to_vec(),
                        humidity: day.humidity().to_vec(),
                    },
                )
            })
            .collect();

        let blob = serde_json::to_string(&stored)?;
        let kv = self.kv.clone();
        tokio::task::spawn_blocking(move || kv.set(HISTORY_KEY, &blob)).await?
    }

    /// Oldest date inside the retention window, counted back from the
    /// newest bucket. `None` when retention is off or the store is empty.
    pub fn oldest_kept(&self) -> Option<DateKey> {
        // ---
        if self.retention_days == 0 {
            return None;
        }
        let newest = self.days.keys().next_back()?;
        newest
            .date()
            .checked_sub_days(chrono::Days::new(u64::from(self.retention_days) - 1))
            .map(DateKey::new)
    }

    fn apply_retention(&mut self) {
        // ---
        let Some(cutoff) = self.oldest_kept() else {
            return;
        };
        let before = self.days.len();
        self.days = self.days.split_off(&cutoff);

        let dropped = before - self.days.len();
        if dropped > 0 {
            tracing::debug!(dropped, %cutoff, "Pruned history older than retention window");
        }
    }
}

/// Parse a stored blob, dropping anything that does not match the schema.
fn parse_blob(blob: &str) -> BTreeMap<DateKey, DayHistory> {
    // ---
    let raw: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(blob) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(error = %e, "Stored history is not a JSON object, discarding");
            return BTreeMap::new();
        }
    };

    let mut days = BTreeMap::new();
    for (key, value) in raw {
        let date: DateKey = match key.parse() {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding history bucket with bad key");
                continue;
            }
        };
        let stored: StoredDay = match serde_json::from_value(value) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(%date, error = %e, "Discarding malformed history bucket");
                continue;
            }
        };
        match DayHistory::from_series(date, stored.timestamps, stored.temperature, stored.humidity)
        {
            Some(day) => {
                days.insert(date, day);
            }
            None => {
                tracing::warn!(%date, "Discarding history bucket with misaligned series");
            }
        }
    }
    days
}
