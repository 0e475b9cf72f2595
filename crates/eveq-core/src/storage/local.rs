use super::error::StoreError;
use super::keys::KeyStrategy;
use super::records::{RecordKind, StoredData};
use crate::core::identity::canonical_key;
use crate::core::models::IdentityError;
use crate::core::models::conditions::PhysicalConditions;
use crate::core::models::property::PhysicalProperty;
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const INDEX_SUFFIX: &str = ".index.json";
const RECORD_SUFFIX: &str = ".json";
const PARTIAL_SUFFIX: &str = ".partial";
const PREVIOUS_SUFFIX: &str = ".previous";
const LOCK_FILE: &str = ".store.lock";
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);
const LOCK_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_KEY_ATTEMPTS: usize = 16;

#[derive(Debug, Clone)]
struct StoredEntry {
    data: StoredData,
    ancillary: Option<PathBuf>,
}

/// What a call to [`LocalStore::store`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted,
    Replaced,
    /// The resident record was kept and the offered one discarded.
    Kept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    Existing,
    Incoming,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub kept: usize,
}

impl MergeSummary {
    fn record(&mut self, outcome: StoreOutcome) {
        match outcome {
            StoreOutcome::Inserted => self.inserted += 1,
            StoreOutcome::Replaced => self.replaced += 1,
            StoreOutcome::Kept => self.kept += 1,
        }
    }
}

/// Picks the record to keep when two records share a key: the lower statistical
/// inefficiency wins and ties keep the resident record.
pub fn prefer(
    key: &str,
    existing: &StoredData,
    incoming: &StoredData,
) -> Result<Preference, StoreError> {
    if existing == incoming {
        return Ok(Preference::Existing);
    }
    let (Some(current), Some(offered)) = (
        existing.statistical_inefficiency(),
        incoming.statistical_inefficiency(),
    ) else {
        return Err(StoreError::UnresolvableMerge {
            key: key.to_string(),
            reason: "records carry no statistical inefficiency".to_string(),
        });
    };
    match offered.partial_cmp(&current) {
        Some(Ordering::Less) => Ok(Preference::Incoming),
        Some(_) => Ok(Preference::Existing),
        None => Err(StoreError::UnresolvableMerge {
            key: key.to_string(),
            reason: format!(
                "statistical inefficiencies {} and {} are not comparable",
                current, offered
            ),
        }),
    }
}

/// A content-addressed record store rooted in a local directory.
///
/// Layout: `<key>.json` per record, a `<key>/` directory of ancillary files for
/// kinds that carry them, and one `<TypeName>.index.json` per record kind.
///
/// Several handles, in one process or many, may share a root. Reads go through
/// the in-memory map and never block. Writes hold the handle's mutex and the
/// root's `.store.lock` file; under the lock the on-disk index and the record at
/// the target key are re-read, so collisions are decided against what other
/// writers have already committed.
pub struct LocalStore {
    root: PathBuf,
    entries: DashMap<String, StoredEntry>,
    index: Mutex<BTreeMap<RecordKind, BTreeSet<String>>>,
}

impl LocalStore {
    /// Opens the store at `root`, creating it if needed and reloading every
    /// indexed record.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;

        let entries = DashMap::new();
        let mut index = BTreeMap::new();
        for kind in RecordKind::ALL {
            let keys = read_index(&root, kind)?;
            for key in &keys {
                entries.insert(key.clone(), load_entry(&root, key)?);
            }
            index.insert(kind, keys);
        }

        debug!(root = %root.display(), records = entries.len(), "Opened store");
        Ok(Self {
            root,
            entries,
            index: Mutex::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn retrieve(&self, key: &str) -> Option<(StoredData, Option<PathBuf>)> {
        self.entries
            .get(key)
            .map(|entry| (entry.data.clone(), entry.ancillary.clone()))
    }

    pub fn keys_of(&self, kind: RecordKind) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.data.kind() == kind)
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn contains_box(&self, conditions: &PhysicalConditions) -> bool {
        self.contains_key(&canonical_key(conditions).storage_key())
    }

    /// Whether every box derived from `property` has already been stored.
    pub fn contains_all_boxes(
        &self,
        property: &PhysicalProperty,
        n_molecules: u64,
    ) -> Result<bool, IdentityError> {
        Ok(property
            .to_boxes(n_molecules)?
            .iter()
            .all(|conditions| self.contains_box(conditions)))
    }

    pub fn store(&self, data: StoredData, ancillary: Option<&Path>) -> Result<String, StoreError> {
        self.store_with_outcome(data, ancillary).map(|(key, _)| key)
    }

    /// Decodes and stores a raw JSON record.
    pub fn store_json(&self, value: Value, ancillary: Option<&Path>) -> Result<String, StoreError> {
        self.store(StoredData::from_json_value(value)?, ancillary)
    }

    pub fn store_with_outcome(
        &self,
        data: StoredData,
        ancillary: Option<&Path>,
    ) -> Result<(String, StoreOutcome), StoreError> {
        data.validate()?;
        let kind = data.kind();
        let ancillary = if kind.has_ancillary_data() {
            let path = ancillary.ok_or(StoreError::MissingAncillaryData(kind.type_name()))?;
            if !path.is_dir() {
                return Err(StoreError::AncillaryNotFound(path.display().to_string()));
            }
            Some(path)
        } else {
            None
        };

        let mut index = self.index.lock().map_err(|_| StoreError::LockPoisoned)?;
        let _lock = StoreLock::acquire(&self.root)?;
        self.sync_index(kind, &mut index)?;

        let strategy = kind.key_strategy();
        let (key, outcome) = if strategy.is_deterministic() {
            let key = strategy.derive(&data)?;
            match self.resident(&key)? {
                None => (key, StoreOutcome::Inserted),
                Some(_) if !kind.is_replaceable() => {
                    debug!(key = %key, "Record already stored");
                    return Ok((key, StoreOutcome::Kept));
                }
                Some(existing) => match prefer(&key, &existing, &data)? {
                    Preference::Existing => {
                        info!(
                            key = %key,
                            resident = ?existing.statistical_inefficiency(),
                            offered = ?data.statistical_inefficiency(),
                            "Keeping resident record"
                        );
                        return Ok((key, StoreOutcome::Kept));
                    }
                    Preference::Incoming => {
                        info!(
                            key = %key,
                            resident = ?existing.statistical_inefficiency(),
                            offered = ?data.statistical_inefficiency(),
                            "Replacing resident record"
                        );
                        (key, StoreOutcome::Replaced)
                    }
                },
            }
        } else {
            if let Some(key) = self.find_equal(&data) {
                debug!(key = %key, "Identical record already stored");
                return Ok((key, StoreOutcome::Kept));
            }
            let key = self.allocate_key(|| strategy.derive(&data))?;
            (key, StoreOutcome::Inserted)
        };

        let ancillary = self.commit(&key, &data, ancillary)?;

        let keys = index.entry(kind).or_default();
        if keys.insert(key.clone()) {
            self.flush_index(kind, keys)?;
        }
        self.entries.insert(key.clone(), StoredEntry { data, ancillary });

        Ok((key, outcome))
    }

    /// Applies the store rules to every record of `other`, in key order.
    #[instrument(skip_all, name = "store_merge")]
    pub fn merge(&self, other: &LocalStore) -> Result<MergeSummary, StoreError> {
        let mut keys: Vec<String> = other.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();

        info!(
            incoming = keys.len(),
            resident = self.len(),
            "Merging stores"
        );
        let mut summary = MergeSummary::default();
        for key in keys {
            let Some((data, ancillary)) = other.retrieve(&key) else {
                continue;
            };
            let (_, outcome) = self.store_with_outcome(data, ancillary.as_deref())?;
            summary.record(outcome);
        }
        info!(
            inserted = summary.inserted,
            replaced = summary.replaced,
            kept = summary.kept,
            total = self.len(),
            "Merge complete"
        );
        Ok(summary)
    }

    /// Pulls in keys that other writers added to the on-disk index of `kind`.
    fn sync_index(
        &self,
        kind: RecordKind,
        index: &mut BTreeMap<RecordKind, BTreeSet<String>>,
    ) -> Result<(), StoreError> {
        let keys = index.entry(kind).or_default();
        for key in read_index(&self.root, kind)? {
            if !self.entries.contains_key(&key) {
                self.entries.insert(key.clone(), load_entry(&self.root, &key)?);
            }
            keys.insert(key);
        }
        Ok(())
    }

    /// The record currently committed at `key`, read from disk.
    fn resident(&self, key: &str) -> Result<Option<StoredData>, StoreError> {
        if !record_file(&self.root, key).exists() {
            self.entries.remove(key);
            return Ok(None);
        }
        let entry = load_entry(&self.root, key)?;
        let data = entry.data.clone();
        self.entries.insert(key.to_string(), entry);
        Ok(Some(data))
    }

    fn find_equal(&self, data: &StoredData) -> Option<String> {
        self.entries
            .iter()
            .find(|entry| entry.data == *data)
            .map(|entry| entry.key().clone())
    }

    fn allocate_key(
        &self,
        mut next: impl FnMut() -> Result<String, StoreError>,
    ) -> Result<String, StoreError> {
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = next()?;
            if !self.entries.contains_key(&key) && !record_file(&self.root, &key).exists() {
                return Ok(key);
            }
            debug!(key = %key, "Key already taken, deriving another");
        }
        Err(StoreError::KeyExhausted("fallback"))
    }

    /// Writes the record and its ancillary directory. Renaming the staged record
    /// into place is the commit point: any failure before it leaves the resident
    /// record and ancillary directory as they were.
    fn commit(
        &self,
        key: &str,
        data: &StoredData,
        ancillary: Option<&Path>,
    ) -> Result<Option<PathBuf>, StoreError> {
        let record_path = record_file(&self.root, key);
        let staged_record = partial_path(&record_path);
        let bytes =
            serde_json::to_vec_pretty(data).map_err(|e| StoreError::malformed(&record_path, e))?;
        fs::write(&staged_record, &bytes).map_err(|e| StoreError::io(&staged_record, e))?;

        let result = match ancillary {
            None => fs::rename(&staged_record, &record_path)
                .map(|_| None)
                .map_err(|e| StoreError::io(&record_path, e)),
            Some(source) => self
                .swap_ancillary(key, source, &staged_record, &record_path)
                .map(Some),
        };
        if result.is_err() && staged_record.is_file() {
            let _ = fs::remove_file(&staged_record);
        }
        result
    }

    fn swap_ancillary(
        &self,
        key: &str,
        source: &Path,
        staged_record: &Path,
        record_path: &Path,
    ) -> Result<PathBuf, StoreError> {
        let target = self.root.join(key);
        let staging = self.root.join(format!("{key}{PARTIAL_SUFFIX}"));
        let previous = self.root.join(format!("{key}{PREVIOUS_SUFFIX}"));

        remove_dir_if_present(&staging)?;
        if let Err(e) = copy_dir(source, &staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
        remove_dir_if_present(&previous)?;

        let had_previous = target.exists();
        if had_previous {
            fs::rename(&target, &previous).map_err(|e| StoreError::io(&target, e))?;
        }
        let restore = || {
            let _ = fs::remove_dir_all(&target);
            if had_previous {
                let _ = fs::rename(&previous, &target);
            }
        };

        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_dir_all(&staging);
            restore();
            return Err(StoreError::io(&staging, e));
        }
        if let Err(e) = fs::rename(staged_record, record_path) {
            restore();
            return Err(StoreError::io(record_path, e));
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&previous) {
                warn!(
                    path = %previous.display(),
                    error = %e,
                    "Failed to remove replaced ancillary data"
                );
            }
        }
        Ok(target)
    }

    fn flush_index(&self, kind: RecordKind, keys: &BTreeSet<String>) -> Result<(), StoreError> {
        let path = index_file(&self.root, kind);
        let bytes = serde_json::to_vec_pretty(keys).map_err(|e| StoreError::malformed(&path, e))?;
        write_atomic(&path, &bytes)
    }
}

/// Cross-process write lock on a store root, released on drop.
#[derive(Debug)]
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    fn acquire(root: &Path) -> Result<Self, StoreError> {
        let path = root.join(LOCK_FILE);
        let started = Instant::now();
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if started.elapsed() >= LOCK_TIMEOUT {
                        return Err(StoreError::Locked(path.display().to_string()));
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

pub(crate) fn is_index_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(INDEX_SUFFIX))
}

fn index_file(root: &Path, kind: RecordKind) -> PathBuf {
    root.join(format!("{}{}", kind.type_name(), INDEX_SUFFIX))
}

fn record_file(root: &Path, key: &str) -> PathBuf {
    root.join(format!("{key}{RECORD_SUFFIX}"))
}

fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_os_string();
    partial.push(PARTIAL_SUFFIX);
    PathBuf::from(partial)
}

fn read_index(root: &Path, kind: RecordKind) -> Result<BTreeSet<String>, StoreError> {
    let path = index_file(root, kind);
    if !path.exists() {
        return Ok(BTreeSet::new());
    }
    let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
    serde_json::from_str(&text).map_err(|e| StoreError::malformed(&path, e))
}

fn load_entry(root: &Path, key: &str) -> Result<StoredEntry, StoreError> {
    let record_path = record_file(root, key);
    if !record_path.exists() {
        return Err(StoreError::MissingRecord(key.to_string()));
    }
    let text = fs::read_to_string(&record_path).map_err(|e| StoreError::io(&record_path, e))?;
    let value: Value =
        serde_json::from_str(&text).map_err(|e| StoreError::malformed(&record_path, e))?;
    let data = StoredData::from_json_value(value)?;
    let ancillary_dir = root.join(key);
    let ancillary =
        (data.kind().has_ancillary_data() && ancillary_dir.is_dir()).then_some(ancillary_dir);
    Ok(StoredEntry { data, ancillary })
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let partial = partial_path(path);
    fs::write(&partial, contents).map_err(|e| StoreError::io(&partial, e))?;
    fs::rename(&partial, path).map_err(|e| StoreError::io(path, e))
}

fn remove_dir_if_present(path: &Path) -> Result<(), StoreError> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| StoreError::io(path, e))?;
    }
    Ok(())
}

fn copy_dir(source: &Path, target: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(target).map_err(|e| StoreError::io(target, e))?;
    let entries = fs::read_dir(source).map_err(|e| StoreError::io(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(source, e))?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| StoreError::io(&from, e))?;
        if file_type.is_dir() {
            copy_dir(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| StoreError::io(&from, e))?;
        }
    }
    Ok(())
}
