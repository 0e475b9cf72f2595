use super::error::StoreError;
use super::local::{LocalStore, Preference, is_index_file, prefer};
use super::records::StoredData;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Record files found in the legacy store.
    pub scanned: usize,
    /// Equilibration records written after deduplication.
    pub equilibration: usize,
    /// Equilibration records dropped in favour of a better duplicate.
    pub duplicates: usize,
    /// Other supported records carried over.
    pub other: usize,
    /// Bookkeeping entries, null records and unsupported record types.
    pub skipped: usize,
    /// Records that were malformed, described an invalid box or could not be
    /// stored.
    pub failed: usize,
}

/// Rebuilds a store from a legacy key/value directory that mixes record types.
///
/// Equilibration records are re-keyed by box identity; when several map to the
/// same key the one with the lowest statistical inefficiency is kept. Other
/// supported records are stored unchanged and everything else is skipped.
#[instrument(skip_all, name = "legacy_import")]
pub fn import_legacy(
    legacy_root: &Path,
    new_root: &Path,
) -> Result<(LocalStore, ImportSummary), StoreError> {
    let mut files: Vec<PathBuf> = fs::read_dir(legacy_root)
        .map_err(|e| StoreError::io(legacy_root, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .filter(|p| !is_index_file(p))
        .collect();
    files.sort();

    let store = LocalStore::open(new_root)?;
    let mut summary = ImportSummary::default();
    let mut best: BTreeMap<String, (StoredData, Option<PathBuf>)> = BTreeMap::new();

    for path in files {
        summary.scanned += 1;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read legacy entry");
                summary.failed += 1;
                continue;
            }
        };
        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable legacy entry");
                summary.skipped += 1;
                continue;
            }
        };
        let data = match StoredData::from_json_value(value) {
            Ok(data) => data,
            Err(e @ (StoreError::NullRecord | StoreError::UnsupportedRecordType(_))) => {
                debug!(path = %path.display(), reason = %e, "Skipping legacy entry");
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping malformed legacy record");
                summary.failed += 1;
                continue;
            }
        };

        let ancillary = path
            .file_stem()
            .map(|stem| legacy_root.join(stem))
            .filter(|dir| dir.is_dir());

        match &data {
            StoredData::Equilibration(record) => {
                let key = match record.box_key() {
                    Ok(key) => key.storage_key(),
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "Skipping legacy record with invalid box"
                        );
                        summary.failed += 1;
                        continue;
                    }
                };
                match best.get(&key) {
                    Some((resident, _)) => match prefer(&key, resident, &data) {
                        Ok(preference) => {
                            summary.duplicates += 1;
                            if preference == Preference::Incoming {
                                best.insert(key, (data, ancillary));
                            }
                        }
                        Err(e) => {
                            warn!(
                                path = %path.display(),
                                error = %e,
                                "Skipping unresolvable legacy duplicate"
                            );
                            summary.failed += 1;
                        }
                    },
                    None => {
                        best.insert(key, (data, ancillary));
                    }
                }
            }
            _ => match store.store(data, ancillary.as_deref()) {
                Ok(_) => summary.other += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to import legacy record");
                    summary.failed += 1;
                }
            },
        }
    }

    for (key, (data, ancillary)) in best {
        match store.store(data, ancillary.as_deref()) {
            Ok(_) => summary.equilibration += 1,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to import equilibration record");
                summary.failed += 1;
            }
        }
    }

    info!(
        scanned = summary.scanned,
        equilibration = summary.equilibration,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        failed = summary.failed,
        "Legacy import complete"
    );
    Ok((store, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::canonical_key;
    use crate::storage::records::RecordKind;
    use crate::storage::records::fixtures::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_entry(root: &Path, name: &str, value: &Value, with_ancillary: bool) {
        fs::write(root.join(format!("{name}.json")), value.to_string()).unwrap();
        if with_ancillary {
            let dir = root.join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("output.pdb"), format!("REMARK {name}\n")).unwrap();
        }
    }

    #[test]
    fn import_filters_and_keeps_best_duplicate() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("old_stored_data");
        fs::create_dir_all(&legacy).unwrap();

        let water = water_box(1000);
        let worse = StoredData::from(equilibration(&water, 4.0));
        let better = StoredData::from(equilibration(&water, 1.5));
        write_entry(&legacy, "a1", &serde_json::to_value(&worse).unwrap(), true);
        write_entry(&legacy, "b2", &serde_json::to_value(&better).unwrap(), true);
        write_entry(
            &legacy,
            "c3",
            &serde_json::to_value(StoredData::from(equilibration(&water_box(500), 2.0))).unwrap(),
            true,
        );
        write_entry(
            &legacy,
            "sim",
            &serde_json::to_value(StoredData::from(simulation(1.0))).unwrap(),
            true,
        );
        write_entry(
            &legacy,
            "object_keys",
            &json!({"@type": "_ObjectKeyData", "keys": ["a1", "b2"]}),
            false,
        );
        write_entry(&legacy, "empty", &Value::Null, false);

        let (store, summary) = import_legacy(&legacy, &dir.path().join("stored_data")).unwrap();
        assert_eq!(summary.scanned, 6);
        assert_eq!(summary.equilibration, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.other, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 0);

        let key = canonical_key(&water).storage_key();
        let (data, ancillary) = store.retrieve(&key).unwrap();
        assert_eq!(data, better);
        let copied = fs::read_to_string(ancillary.unwrap().join("output.pdb")).unwrap();
        assert_eq!(copied, "REMARK b2\n");
        assert_eq!(store.keys_of(RecordKind::Simulation).len(), 1);
    }

    #[test]
    fn records_without_ancillary_data_are_counted_as_failed() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("legacy");
        fs::create_dir_all(&legacy).unwrap();
        let data = StoredData::from(equilibration(&water_box(10), 1.0));
        write_entry(&legacy, "lonely", &serde_json::to_value(&data).unwrap(), false);

        let (store, summary) = import_legacy(&legacy, &dir.path().join("new")).unwrap();
        assert_eq!(summary.failed, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn broken_records_are_counted_and_the_rest_imported() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("legacy");
        fs::create_dir_all(&legacy).unwrap();

        let good = StoredData::from(equilibration(&water_box(1000), 1.0));
        write_entry(&legacy, "good", &serde_json::to_value(&good).unwrap(), true);
        write_entry(
            &legacy,
            "missing_fields",
            &json!({"@type": "StoredEquilibrationData", "substance": {"entries": []}}),
            true,
        );
        let mut empty_box = serde_json::to_value(&good).unwrap();
        empty_box["number_of_molecules"] = json!(0);
        write_entry(&legacy, "empty_box", &empty_box, true);

        let (store, summary) = import_legacy(&legacy, &dir.path().join("new")).unwrap();
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.equilibration, 1);
        assert_eq!(store.len(), 1);
        let key = canonical_key(&water_box(1000)).storage_key();
        assert_eq!(store.retrieve(&key).unwrap().0, good);
    }
}
