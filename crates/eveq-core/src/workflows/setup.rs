use crate::core::identity::{CanonicalKey, canonical_key};
use crate::core::models::IdentityError;
use crate::core::models::conditions::PhysicalConditions;
use crate::core::models::property::PropertyDataSet;
use crate::engine::error::EngineError;
use crate::engine::run::{read_to_string, write_atomic};
use crate::storage::LocalStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

const BOX_FILE_EXTENSION: &str = "json";

/// The boxes a data set needs, after removing duplicates and boxes already in
/// the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxPlan {
    /// Boxes derived from every property, duplicates included.
    pub total: usize,
    pub unique: usize,
    /// Unique boxes already present in the store.
    pub stored: usize,
    /// Unique boxes still to be equilibrated, ordered by key.
    pub pending: Vec<(CanonicalKey, PhysicalConditions)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coverage {
    pub properties: usize,
    /// Properties whose every box is in the store.
    pub complete: usize,
}

/// Derives the boxes of every property in `dataset` and keeps the ones that
/// still need equilibrating.
#[instrument(skip_all, name = "setup_workflow")]
pub fn plan_boxes(
    dataset: &PropertyDataSet,
    store: Option<&LocalStore>,
    n_molecules: u64,
) -> Result<BoxPlan, IdentityError> {
    let mut unique = BTreeMap::new();
    let mut total = 0;
    for property in &dataset.properties {
        for conditions in property.to_boxes(n_molecules)? {
            total += 1;
            unique.entry(canonical_key(&conditions)).or_insert(conditions);
        }
    }

    let n_unique = unique.len();
    let pending: Vec<_> = unique
        .into_iter()
        .filter(|(_, conditions)| !store.is_some_and(|s| s.contains_box(conditions)))
        .collect();

    let plan = BoxPlan {
        total,
        unique: n_unique,
        stored: n_unique - pending.len(),
        pending,
    };
    info!(
        properties = dataset.len(),
        boxes = plan.total,
        unique = plan.unique,
        stored = plan.stored,
        pending = plan.pending.len(),
        "Planned simulation boxes"
    );
    Ok(plan)
}

/// How many properties of `dataset` the store can already serve.
pub fn coverage(
    dataset: &PropertyDataSet,
    store: &LocalStore,
    n_molecules: u64,
) -> Result<Coverage, IdentityError> {
    let mut complete = 0;
    for property in &dataset.properties {
        if store.contains_all_boxes(property, n_molecules)? {
            complete += 1;
        }
    }
    Ok(Coverage {
        properties: dataset.len(),
        complete,
    })
}

/// Writes one `<key>.json` file per pending box into `output_dir`.
pub fn write_box_files(plan: &BoxPlan, output_dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    fs::create_dir_all(output_dir).map_err(|e| EngineError::io(output_dir, e))?;
    let mut written = Vec::with_capacity(plan.pending.len());
    for (key, conditions) in &plan.pending {
        let path = output_dir.join(format!("{}.{}", key.storage_key(), BOX_FILE_EXTENSION));
        let bytes = serde_json::to_vec_pretty(conditions)
            .map_err(|e| EngineError::serialization(&path, e))?;
        write_atomic(&path, &bytes)?;
        written.push(path);
    }
    Ok(written)
}

pub fn read_box_file(path: &Path) -> Result<PhysicalConditions, EngineError> {
    let text = read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| EngineError::serialization(path, e))
}

/// Box files in `dir`, sorted so that an index into the list is stable.
pub fn list_box_files(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| EngineError::io(dir, e))? {
        let path = entry.map_err(|e| EngineError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == BOX_FILE_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
