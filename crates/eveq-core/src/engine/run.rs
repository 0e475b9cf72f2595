//! Layout and crash-safe bookkeeping of one box's working directory.
//!
//! Every iteration is committed in two phases. Its coordinate file, the grown
//! statistics table, the checkpoint and the system snapshot are first written
//! under staging names; renaming `equilibrated_box_<N>.pdb.tmp` into place is
//! the commit point, after which the remaining staged files are renamed too.
//! [`RunDirectory::recover`] completes or discards whatever an interruption
//! left behind, so the committed files always describe whole iterations.

use super::error::EngineError;
use super::simulation::{Checkpoint, Snapshot};
use crate::core::identity::CanonicalKey;
use crate::core::io::statistics::StatisticsTable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BOX_FILE: &str = "box.json";
const SYSTEM_FILE: &str = "system.json";
const PACKED_FILE: &str = "input_packed_box.pdb";
const MINIMIZED_FILE: &str = "minimized_box.pdb";
const ITERATION_PREFIX: &str = "equilibrated_box_";
const ITERATION_SUFFIX: &str = ".pdb";
const STATISTICS_FILE: &str = "statistics.csv";
const TMP_STATISTICS_FILE: &str = "tmp_statistics.csv";
const CHECKPOINT_FILE: &str = "checkpoint.dat";
const DIAGNOSTICS_FILE: &str = "diagnostics.json";
const OUTPUT_DIR: &str = "output";
const OUTPUT_COORDINATES: &str = "output.pdb";
pub const RESULT_FILE: &str = "stored_equilibration_data.json";

const STAGING_SUFFIX: &str = "tmp";
const PARTIAL_SUFFIX: &str = "partial";

/// How far a working directory has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Unpacked,
    Packed,
    Minimized,
    Iterating { completed: usize },
    Terminal,
}

/// What [`RunDirectory::recover`] found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Clean,
    /// An uncommitted iteration was thrown away.
    DiscardedIteration(usize),
    /// Staged files of a committed iteration were moved into place.
    RolledForward(usize),
}

#[derive(Serialize, Deserialize)]
struct SystemFile {
    n_molecules: u64,
    system: String,
}

#[derive(Debug, Clone)]
pub struct RunDirectory {
    root: PathBuf,
}

impl RunDirectory {
    /// The directory for `key` under `working_root`.
    pub fn for_key(working_root: &Path, key: &CanonicalKey) -> Self {
        Self {
            root: working_root.join(key.storage_key()),
        }
    }

    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn create(&self) -> Result<(), EngineError> {
        fs::create_dir_all(&self.root).map_err(|e| EngineError::io(&self.root, e))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn box_file(&self) -> PathBuf {
        self.root.join(BOX_FILE)
    }
    pub fn system_file(&self) -> PathBuf {
        self.root.join(SYSTEM_FILE)
    }
    pub fn packed_file(&self) -> PathBuf {
        self.root.join(PACKED_FILE)
    }
    pub fn minimized_file(&self) -> PathBuf {
        self.root.join(MINIMIZED_FILE)
    }
    pub fn iteration_file(&self, iteration: usize) -> PathBuf {
        self.root
            .join(format!("{ITERATION_PREFIX}{iteration}{ITERATION_SUFFIX}"))
    }
    pub fn statistics_file(&self) -> PathBuf {
        self.root.join(STATISTICS_FILE)
    }
    pub fn checkpoint_file(&self) -> PathBuf {
        self.root.join(CHECKPOINT_FILE)
    }
    pub fn diagnostics_file(&self) -> PathBuf {
        self.root.join(DIAGNOSTICS_FILE)
    }
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }
    pub fn output_coordinates(&self) -> PathBuf {
        self.output_dir().join(OUTPUT_COORDINATES)
    }
    pub fn result_file(&self) -> PathBuf {
        self.root.join(RESULT_FILE)
    }

    fn staged_iteration_file(&self, iteration: usize) -> PathBuf {
        staged(&self.iteration_file(iteration))
    }
    fn staged_statistics_file(&self) -> PathBuf {
        self.root.join(TMP_STATISTICS_FILE)
    }
    fn staged_checkpoint_file(&self) -> PathBuf {
        staged(&self.checkpoint_file())
    }
    fn staged_system_file(&self) -> PathBuf {
        staged(&self.system_file())
    }

    /// Highest iteration whose coordinate file has been committed.
    pub fn completed_iterations(&self) -> Result<usize, EngineError> {
        if !self.root.exists() {
            return Ok(0);
        }
        let entries = fs::read_dir(&self.root).map_err(|e| EngineError::io(&self.root, e))?;
        let mut completed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(&self.root, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let iteration = name
                .strip_prefix(ITERATION_PREFIX)
                .and_then(|rest| rest.strip_suffix(ITERATION_SUFFIX))
                .and_then(|n| n.parse::<usize>().ok());
            if let Some(n) = iteration {
                completed = completed.max(n);
            }
        }
        Ok(completed)
    }

    pub fn stage(&self) -> Result<RunStage, EngineError> {
        if self.result_file().exists() {
            return Ok(RunStage::Terminal);
        }
        let completed = self.completed_iterations()?;
        if completed > 0 {
            return Ok(RunStage::Iterating { completed });
        }
        if !self.system_file().exists() {
            return Ok(RunStage::Unpacked);
        }
        if self.minimized_file().exists() {
            Ok(RunStage::Minimized)
        } else if self.packed_file().exists() {
            Ok(RunStage::Packed)
        } else {
            Ok(RunStage::Unpacked)
        }
    }

    /// Brings the directory back to a state made only of whole iterations.
    pub fn recover(&self) -> Result<Recovery, EngineError> {
        let completed = self.completed_iterations()?;
        let pending = completed + 1;
        let others = [
            self.staged_statistics_file(),
            self.staged_checkpoint_file(),
            self.staged_system_file(),
        ];

        let recovery = if self.staged_iteration_file(pending).exists() {
            remove_if_exists(&self.staged_iteration_file(pending))?;
            for path in &others {
                remove_if_exists(path)?;
            }
            info!(iteration = pending, "Discarded uncommitted iteration");
            Recovery::DiscardedIteration(pending)
        } else if others.iter().any(|p| p.exists()) {
            self.finish_commit()?;
            info!(iteration = completed, "Completed interrupted commit");
            Recovery::RolledForward(completed)
        } else {
            Recovery::Clean
        };

        self.remove_partial_files()?;
        Ok(recovery)
    }

    fn remove_partial_files(&self) -> Result<(), EngineError> {
        if !self.root.exists() {
            return Ok(());
        }
        let entries = fs::read_dir(&self.root).map_err(|e| EngineError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(&self.root, e))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == PARTIAL_SUFFIX) {
                debug!(path = %path.display(), "Removing partial file");
                remove_if_exists(&path)?;
            }
        }
        Ok(())
    }

    fn finish_commit(&self) -> Result<(), EngineError> {
        rename_if_exists(&self.staged_statistics_file(), &self.statistics_file())?;
        rename_if_exists(&self.staged_checkpoint_file(), &self.checkpoint_file())?;
        rename_if_exists(&self.staged_system_file(), &self.system_file())?;
        Ok(())
    }

    /// Persists one finished iteration using the staging protocol.
    pub fn commit_iteration(
        &self,
        iteration: usize,
        snapshot: &Snapshot,
        checkpoint: &Checkpoint,
        table: &StatisticsTable,
    ) -> Result<(), EngineError> {
        let staged_pdb = self.staged_iteration_file(iteration);
        write_file(&staged_pdb, snapshot.coordinates.as_bytes())?;
        table.write_to_path(self.staged_statistics_file())?;
        write_file(&self.staged_checkpoint_file(), checkpoint.0.as_bytes())?;
        write_file(&self.staged_system_file(), &encode_system(snapshot, &self.system_file())?)?;

        rename(&staged_pdb, &self.iteration_file(iteration))?;
        self.finish_commit()?;
        debug!(iteration, rows = table.len(), "Committed iteration");
        Ok(())
    }

    pub fn save_packed(&self, snapshot: &Snapshot) -> Result<(), EngineError> {
        write_atomic(&self.packed_file(), snapshot.coordinates.as_bytes())?;
        write_atomic(&self.system_file(), &encode_system(snapshot, &self.system_file())?)
    }

    pub fn save_minimized(&self, snapshot: &Snapshot) -> Result<(), EngineError> {
        write_atomic(&self.system_file(), &encode_system(snapshot, &self.system_file())?)?;
        write_atomic(&self.minimized_file(), snapshot.coordinates.as_bytes())
    }

    /// The latest committed snapshot: system from `system.json`, coordinates
    /// from the newest of the iteration, minimized and packed files.
    pub fn load_snapshot(&self) -> Result<Snapshot, EngineError> {
        let path = self.system_file();
        let text = read_to_string(&path)?;
        let system: SystemFile =
            serde_json::from_str(&text).map_err(|e| EngineError::serialization(&path, e))?;

        let completed = self.completed_iterations()?;
        let coordinates_path = if completed > 0 {
            self.iteration_file(completed)
        } else if self.minimized_file().exists() {
            self.minimized_file()
        } else {
            self.packed_file()
        };
        Ok(Snapshot {
            system: system.system,
            coordinates: read_to_string(&coordinates_path)?,
            n_molecules: system.n_molecules,
        })
    }

    pub fn load_checkpoint(&self) -> Result<Option<Checkpoint>, EngineError> {
        let path = self.checkpoint_file();
        if !path.exists() {
            return Ok(None);
        }
        read_to_string(&path).map(|s| Some(Checkpoint(s)))
    }

    pub fn load_statistics(&self) -> Result<StatisticsTable, EngineError> {
        Ok(StatisticsTable::read_or_default(self.statistics_file())?)
    }

    /// Copies the latest committed coordinates into the output directory.
    pub fn publish_output(&self, iteration: usize) -> Result<PathBuf, EngineError> {
        let output_dir = self.output_dir();
        fs::create_dir_all(&output_dir).map_err(|e| EngineError::io(&output_dir, e))?;
        let target = self.output_coordinates();
        let source = self.iteration_file(iteration);
        fs::copy(&source, &target).map_err(|e| EngineError::io(&source, e))?;
        Ok(output_dir)
    }

    /// Reopens a terminal directory for further iterations.
    pub fn clear_result(&self) -> Result<(), EngineError> {
        remove_if_exists(&self.result_file())?;
        let output_dir = self.output_dir();
        if output_dir.exists() {
            fs::remove_dir_all(&output_dir).map_err(|e| EngineError::io(&output_dir, e))?;
        }
        Ok(())
    }
}

fn encode_system(snapshot: &Snapshot, path: &Path) -> Result<Vec<u8>, EngineError> {
    let file = SystemFile {
        n_molecules: snapshot.n_molecules,
        system: snapshot.system.clone(),
    };
    serde_json::to_vec(&file).map_err(|e| EngineError::serialization(path, e))
}

fn staged(path: &Path) -> PathBuf {
    with_suffix(path, STAGING_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

pub(crate) fn read_to_string(path: &Path) -> Result<String, EngineError> {
    fs::read_to_string(path).map_err(|e| EngineError::io(path, e))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), EngineError> {
    fs::write(path, contents).map_err(|e| EngineError::io(path, e))
}

/// Writes through a `.partial` sibling so readers never see a torn file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), EngineError> {
    let partial = with_suffix(path, PARTIAL_SUFFIX);
    write_file(&partial, contents)?;
    rename(&partial, path)
}

fn rename(from: &Path, to: &Path) -> Result<(), EngineError> {
    fs::rename(from, to).map_err(|e| EngineError::io(from, e))
}

fn rename_if_exists(from: &Path, to: &Path) -> Result<(), EngineError> {
    if from.exists() { rename(from, to) } else { Ok(()) }
}

fn remove_if_exists(path: &Path) -> Result<(), EngineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EngineError::io(path, e)),
    }
}
