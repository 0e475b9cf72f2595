use crate::cli::SaveArgs;
use crate::error::Result;
use eveq::engine::run::{RESULT_FILE, RunDirectory};
use eveq::storage::records::ForceFieldData;
use eveq::storage::{LocalStore, StoreOutcome};
use eveq::workflows::equilibrate::read_result_file;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Default, PartialEq, Eq)]
struct SaveSummary {
    found: usize,
    inserted: usize,
    replaced: usize,
    kept: usize,
    unconverged: usize,
}

pub fn run(args: SaveArgs) -> Result<()> {
    let store = LocalStore::open(&args.storage)?;

    let force_field_id = match (&args.force_field_id, &args.force_field_source) {
        (Some(id), _) => Some(id.clone()),
        (None, Some(path)) => Some(store_force_field(&store, path)?),
        (None, None) => None,
    };

    let summary = save_runs(&args.input, &store, force_field_id.as_deref())?;
    println!(
        "Found {} finished run(s): {} inserted, {} replaced, {} kept.",
        summary.found, summary.inserted, summary.replaced, summary.kept
    );
    if summary.unconverged > 0 {
        println!(
            "Warning: {} saved record(s) are flagged as unconverged.",
            summary.unconverged
        );
    }
    Ok(())
}

fn store_force_field(store: &LocalStore, path: &Path) -> Result<String> {
    let source = fs::read_to_string(path)?;
    let key = store.store(
        ForceFieldData {
            force_field_source: source,
        }
        .into(),
        None,
    )?;
    info!(key = %key, "Stored force field source from {:?}", path);
    Ok(key)
}

/// Stores the result of every finished run directory directly under `input`.
fn save_runs(input: &Path, store: &LocalStore, force_field_id: Option<&str>) -> Result<SaveSummary> {
    let mut run_dirs: Vec<PathBuf> = fs::read_dir(input)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.join(RESULT_FILE).is_file())
        .collect();
    run_dirs.sort();

    let mut summary = SaveSummary::default();
    for dir in run_dirs {
        let run = RunDirectory::open(&dir);
        let mut record = read_result_file(&run.result_file())?;
        summary.found += 1;

        if let Some(id) = force_field_id {
            record.force_field_id = id.to_string();
        }
        if !record.converged {
            warn!("Saving unconverged result from {:?}", &dir);
            summary.unconverged += 1;
        }

        let (key, outcome) = store.store_with_outcome(record.into(), Some(&run.output_dir()))?;
        info!(key = %key, outcome = ?outcome, "Saved result from {:?}", &dir);
        match outcome {
            StoreOutcome::Inserted => summary.inserted += 1,
            StoreOutcome::Replaced => summary.replaced += 1,
            StoreOutcome::Kept => summary.kept += 1,
        }
    }
    Ok(summary)
}
