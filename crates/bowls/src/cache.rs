//! Fingerprint-keyed result cache with age and size eviction.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bowls_measure::MeasurementResult;
use serde::{Deserialize, Serialize};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Identity of a source image: file name plus modification time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(name: &str, mtime_ms: u64) -> Self {
        Self(format!("{name}@{mtime_ms}"))
    }

    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let mtime_ms = fs::metadata(path)?
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(Self::new(&name, mtime_ms))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cached result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub stored_at_ms: u64,
    pub result: MeasurementResult,
}

impl CacheEntry {
    /// Serialized size, the unit of the size budget.
    pub fn size_bytes(&self) -> u64 {
        serde_json::to_vec(self).map(|v| v.len() as u64).unwrap_or(0)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Backing storage of the cache.
pub trait CacheStore: Send {
    /// Entry for `key`; unreadable entries are misses.
    fn load(&mut self, key: &str) -> Option<CacheEntry>;
    fn store(&mut self, entry: &CacheEntry) -> Result<(), CacheError>;
    fn remove(&mut self, key: &str);
    fn keys(&self) -> Vec<String>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryCacheStore {
    entries: HashMap<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).cloned()
    }

    fn store(&mut self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// One JSON file per key. Writes go to a temporary file that is renamed
/// into place, so a reader never sees a partial entry.
#[derive(Clone, Debug)]
pub struct FsCacheStore {
    dir: PathBuf,
}

fn hex_encode(s: &str) -> String {
    s.bytes().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<String> {
    if s.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

impl FsCacheStore {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex_encode(key)))
    }
}

impl CacheStore for FsCacheStore {
    fn load(&mut self, key: &str) -> Option<CacheEntry> {
        let path = self.path_for(key);
        let raw = fs::read(&path).ok()?;
        match serde_json::from_slice::<CacheEntry>(&raw) {
            Ok(entry) if entry.key == key => Some(entry),
            Ok(_) | Err(_) => {
                log::warn!("dropping corrupt cache entry {}", path.display());
                self.remove(key);
                None
            }
        }
    }

    fn store(&mut self, entry: &CacheEntry) -> Result<(), CacheError> {
        let json = serde_json::to_vec(entry)?;
        let path = self.path_for(&entry.key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }

    fn keys(&self) -> Vec<String> {
        let Ok(dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        dir.filter_map(Result::ok)
            .filter_map(|e| {
                let name = e.file_name().into_string().ok()?;
                hex_decode(name.strip_suffix(".json")?)
            })
            .collect()
    }
}

/// Age and size ceilings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    pub max_age_ms: u64,
    pub max_total_bytes: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age_ms: 7 * DAY_MS,
            max_total_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Counts of one eviction pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub expired: usize,
    pub over_budget: usize,
}

/// Result cache over a [`CacheStore`].
pub struct ResultCache {
    store: Box<dyn CacheStore>,
    policy: CachePolicy,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    pub fn new(store: Box<dyn CacheStore>, policy: CachePolicy) -> Self {
        Self { store, policy }
    }

    pub fn in_memory(policy: CachePolicy) -> Self {
        Self::new(Box::new(MemoryCacheStore::new()), policy)
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    fn is_expired(&self, entry: &CacheEntry, now: u64) -> bool {
        now.saturating_sub(entry.stored_at_ms) > self.policy.max_age_ms
    }

    pub fn get(&mut self, key: &str) -> Option<MeasurementResult> {
        self.get_at(key, now_ms())
    }

    /// Valid entry for `key` at time `now`; expired entries are removed.
    pub fn get_at(&mut self, key: &str, now: u64) -> Option<MeasurementResult> {
        let entry = self.store.load(key)?;
        if self.is_expired(&entry, now) {
            log::debug!("cache entry {key} expired");
            self.store.remove(key);
            return None;
        }
        Some(entry.result)
    }

    pub fn put(&mut self, key: &str, result: &MeasurementResult) {
        self.put_at(key, result, now_ms());
    }

    /// Store, then evict. Storage failures only cost a future recompute.
    pub fn put_at(&mut self, key: &str, result: &MeasurementResult, now: u64) {
        let entry = CacheEntry {
            key: key.to_string(),
            stored_at_ms: now,
            result: result.clone(),
        };
        if let Err(e) = self.store.store(&entry) {
            log::warn!("could not cache result {key}: {e}");
            return;
        }
        self.evict_at(now);
    }

    /// Drop expired entries, then the oldest until the size budget holds.
    pub fn evict_at(&mut self, now: u64) -> EvictionReport {
        let mut report = EvictionReport::default();
        let mut live: Vec<(String, u64, u64)> = Vec::new();

        for key in self.store.keys() {
            let Some(entry) = self.store.load(&key) else {
                continue;
            };
            if self.is_expired(&entry, now) {
                self.store.remove(&key);
                report.expired += 1;
            } else {
                live.push((key, entry.stored_at_ms, entry.size_bytes()));
            }
        }

        live.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let mut total: u64 = live.iter().map(|e| e.2).sum();
        for (key, _, size) in &live {
            if total <= self.policy.max_total_bytes {
                break;
            }
            self.store.remove(key);
            total -= size;
            report.over_budget += 1;
        }

        if report != EvictionReport::default() {
            log::debug!(
                "cache eviction: {} expired, {} over budget",
                report.expired,
                report.over_budget
            );
        }
        report
    }

    pub fn len(&self) -> usize {
        self.store.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
