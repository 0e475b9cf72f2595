use crate::core::identity::{CanonicalKey, canonical_key};
use crate::core::io::statistics::StatisticsTable;
use crate::core::models::conditions::PhysicalConditions;
use crate::core::timeseries::Estimator;
use crate::engine::config::EquilibrationConfig;
use crate::engine::convergence::{ConvergenceDetector, RunVerdict};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::run::{Recovery, RunDirectory, RunStage, read_to_string, write_atomic};
use crate::engine::simulation::{AdvanceRequest, SimulationEngine, Snapshot};
use crate::storage::records::{
    DEFAULT_COORDINATE_FILE, EQUILIBRATION_LAYER, StoredData, StoredEquilibrationData,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Converged,
    /// The iteration budget ran out first.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub key: CanonicalKey,
    pub status: RunStatus,
    pub completed_iterations: usize,
    /// `None` only when the run never produced a sample.
    pub record: Option<StoredEquilibrationData>,
    pub working_directory: PathBuf,
    /// Directory to store alongside the record.
    pub ancillary_directory: Option<PathBuf>,
}

/// Drives one box through pack, minimize and repeated advance-and-evaluate
/// iterations until every tracked observable has converged or the iteration
/// budget is spent.
///
/// All progress lives in the box's [`RunDirectory`]. Constructing a loop over a
/// directory left behind by an interrupted run picks up after the last committed
/// iteration, and re-running a finished directory returns its recorded result.
/// A directory must not be driven by two loops at once.
pub struct EquilibrationLoop<'a, E: SimulationEngine, S: Estimator> {
    conditions: PhysicalConditions,
    key: CanonicalKey,
    engine: &'a E,
    detector: ConvergenceDetector<S>,
    config: &'a EquilibrationConfig,
    run_dir: RunDirectory,
    reporter: &'a ProgressReporter<'a>,
}

impl<'a, E: SimulationEngine, S: Estimator> EquilibrationLoop<'a, E, S> {
    pub fn new(
        conditions: PhysicalConditions,
        engine: &'a E,
        estimator: S,
        config: &'a EquilibrationConfig,
        working_root: &Path,
        reporter: &'a ProgressReporter<'a>,
    ) -> Result<Self, EngineError> {
        let key = canonical_key(&conditions);
        let run_dir = RunDirectory::for_key(working_root, &key);
        run_dir.create()?;
        ensure_box_file(&run_dir, &conditions, &key)?;

        match run_dir.recover()? {
            Recovery::Clean => {}
            Recovery::DiscardedIteration(n) => {
                warn!(key = %key, iteration = n, "Discarded interrupted iteration")
            }
            Recovery::RolledForward(n) => {
                info!(key = %key, iteration = n, "Completed interrupted iteration commit")
            }
        }

        Ok(Self {
            conditions,
            key,
            engine,
            detector: ConvergenceDetector::new(estimator, config.convergence.clone()),
            config,
            run_dir,
            reporter,
        })
    }

    pub fn key(&self) -> &CanonicalKey {
        &self.key
    }

    pub fn working_directory(&self) -> &Path {
        self.run_dir.root()
    }

    #[instrument(skip_all, name = "equilibration_loop", fields(key = %self.key))]
    pub fn run(&self) -> Result<RunOutcome, EngineError> {
        if let Some(outcome) = self.recorded_outcome()? {
            info!(status = ?outcome.status, "Run already finished");
            return Ok(outcome);
        }

        let max_iterations = self.config.max_iterations;
        let mut completed = self.run_dir.completed_iterations()?;
        if completed == 0 && max_iterations == 0 {
            warn!("Iteration budget is zero, nothing to equilibrate");
            return Ok(self.outcome(RunStatus::Exhausted, 0, None, None));
        }

        let mut snapshot = self.prepare()?;
        let mut table = self.run_dir.load_statistics()?;
        let mut verdict = if completed > 0 {
            info!(completed, samples = table.len(), "Resuming from committed iterations");
            Some(self.evaluate(&table)?)
        } else {
            None
        };

        self.reporter.report(Progress::PhaseStart {
            name: "Equilibration",
        });
        self.reporter.report(Progress::TaskStart {
            total_steps: max_iterations.saturating_sub(completed) as u64,
        });

        let request = AdvanceRequest {
            steps: self.config.simulation.steps_per_iteration,
            timestep_fs: self.config.simulation.timestep_fs,
            report_interval: self.config.simulation.report_interval,
            thermodynamic_state: *self.conditions.thermodynamic_state(),
        };

        while !verdict.as_ref().is_some_and(|v| v.converged) && completed < max_iterations {
            let iteration = completed + 1;
            info!(iteration, max_iterations, "Starting equilibration iteration");

            let checkpoint = self.run_dir.load_checkpoint()?;
            let output = self.engine.advance(&snapshot, &request, checkpoint.as_ref())?;
            table.append(output.samples.iter().copied());
            self.run_dir
                .commit_iteration(iteration, &output.snapshot, &output.checkpoint, &table)?;
            snapshot = output.snapshot;
            completed = iteration;

            let current = self.evaluate(&table)?;
            self.reporter.report(Progress::IterationFinish {
                iteration,
                n_samples: table.len(),
                converged: current.converged,
            });
            self.reporter.report(Progress::TaskIncrement);
            verdict = Some(current);
        }

        self.reporter.report(Progress::TaskFinish);
        self.reporter.report(Progress::PhaseFinish);

        self.finish(completed, &snapshot, &table, verdict)
    }

    /// Brings the directory to the minimized stage and returns the latest
    /// snapshot.
    fn prepare(&self) -> Result<Snapshot, EngineError> {
        match self.run_dir.stage()? {
            RunStage::Unpacked => {
                self.reporter.report(Progress::PhaseStart { name: "Packing" });
                let packed = self.engine.pack(&self.conditions)?;
                self.run_dir.save_packed(&packed)?;
                info!(path = %self.run_dir.packed_file().display(), "Packed box saved");
                self.reporter.report(Progress::PhaseFinish);
                self.minimize(&packed)
            }
            RunStage::Packed => {
                let packed = self.run_dir.load_snapshot()?;
                self.minimize(&packed)
            }
            RunStage::Minimized | RunStage::Iterating { .. } => self.run_dir.load_snapshot(),
            RunStage::Terminal => Err(EngineError::Internal(
                "a finished run cannot be prepared again".to_string(),
            )),
        }
    }

    fn minimize(&self, packed: &Snapshot) -> Result<Snapshot, EngineError> {
        self.reporter.report(Progress::PhaseStart { name: "Minimization" });
        let minimized = self.engine.minimize(packed)?;
        self.run_dir.save_minimized(&minimized)?;
        info!(path = %self.run_dir.minimized_file().display(), "Minimized box saved");
        self.reporter.report(Progress::PhaseFinish);
        Ok(minimized)
    }

    fn evaluate(&self, table: &StatisticsTable) -> Result<RunVerdict, EngineError> {
        let verdict = self.detector.evaluate_table(table)?;
        let path = self.run_dir.diagnostics_file();
        let bytes =
            serde_json::to_vec_pretty(&verdict).map_err(|e| EngineError::serialization(&path, e))?;
        write_atomic(&path, &bytes)?;
        Ok(verdict)
    }

    fn finish(
        &self,
        completed: usize,
        snapshot: &Snapshot,
        table: &StatisticsTable,
        verdict: Option<RunVerdict>,
    ) -> Result<RunOutcome, EngineError> {
        let verdict = match verdict {
            Some(v) if completed > 0 && !table.is_empty() => v,
            _ => {
                warn!(completed, "Run produced no samples");
                return Ok(self.outcome(RunStatus::Exhausted, completed, None, None));
            }
        };

        let status = if verdict.converged {
            info!(
                completed,
                statistical_inefficiency = verdict.statistical_inefficiency,
                "Equilibration converged"
            );
            RunStatus::Converged
        } else {
            warn!(
                completed,
                statistical_inefficiency = verdict.statistical_inefficiency,
                "Equilibration did not converge within the iteration budget"
            );
            RunStatus::Exhausted
        };

        if snapshot.n_molecules != self.conditions.n_molecules() {
            warn!(
                packed = snapshot.n_molecules,
                requested = self.conditions.n_molecules(),
                "Engine packed a different number of molecules than requested"
            );
        }

        let ancillary = self.run_dir.publish_output(completed)?;
        let record = StoredEquilibrationData {
            substance: self.conditions.substance().clone(),
            thermodynamic_state: *self.conditions.thermodynamic_state(),
            property_phase: self.conditions.phase(),
            source_calculation_id: self.config.source_calculation_id.clone(),
            force_field_id: self.engine.force_field_id().to_string(),
            coordinate_file_name: DEFAULT_COORDINATE_FILE.to_string(),
            statistical_inefficiency: verdict.statistical_inefficiency,
            number_of_molecules: self.conditions.n_molecules(),
            max_number_of_molecules: self.conditions.max_molecules(),
            calculation_layer: EQUILIBRATION_LAYER.to_string(),
            converged: verdict.converged,
        };

        let path = self.run_dir.result_file();
        let bytes = serde_json::to_vec_pretty(&StoredData::from(record.clone()))
            .map_err(|e| EngineError::serialization(&path, e))?;
        write_atomic(&path, &bytes)?;
        info!(path = %path.display(), "Result record written");

        Ok(self.outcome(status, completed, Some(record), Some(ancillary)))
    }

    /// The outcome stored by a previous run, unless that run was exhausted and
    /// the budget has since been raised.
    fn recorded_outcome(&self) -> Result<Option<RunOutcome>, EngineError> {
        let path = self.run_dir.result_file();
        if !path.exists() {
            return Ok(None);
        }
        let record = read_result_file(&path)?;
        let completed = self.run_dir.completed_iterations()?;

        if !record.converged && completed < self.config.max_iterations {
            info!(
                completed,
                max_iterations = self.config.max_iterations,
                "Extending previously exhausted run"
            );
            self.run_dir.clear_result()?;
            return Ok(None);
        }

        let status = if record.converged {
            RunStatus::Converged
        } else {
            RunStatus::Exhausted
        };
        let ancillary = Some(self.run_dir.output_dir()).filter(|p| p.is_dir());
        Ok(Some(self.outcome(status, completed, Some(record), ancillary)))
    }

    fn outcome(
        &self,
        status: RunStatus,
        completed_iterations: usize,
        record: Option<StoredEquilibrationData>,
        ancillary_directory: Option<PathBuf>,
    ) -> RunOutcome {
        RunOutcome {
            key: self.key.clone(),
            status,
            completed_iterations,
            record,
            working_directory: self.run_dir.root().to_path_buf(),
            ancillary_directory,
        }
    }
}

/// Reads the result record a finished run leaves in its working directory.
pub fn read_result_file(path: &Path) -> Result<StoredEquilibrationData, EngineError> {
    let text = read_to_string(path)?;
    match serde_json::from_str::<StoredData>(&text) {
        Ok(StoredData::Equilibration(record)) => Ok(record),
        Ok(other) => Err(EngineError::Internal(format!(
            "'{}' holds a {} record instead of an equilibration result",
            path.display(),
            other.kind().type_name()
        ))),
        Err(e) => Err(EngineError::serialization(path, e)),
    }
}

fn ensure_box_file(
    run_dir: &RunDirectory,
    conditions: &PhysicalConditions,
    key: &CanonicalKey,
) -> Result<(), EngineError> {
    let path = run_dir.box_file();
    if path.exists() {
        let text = read_to_string(&path)?;
        let existing: PhysicalConditions =
            serde_json::from_str(&text).map_err(|e| EngineError::serialization(&path, e))?;
        if canonical_key(&existing) != *key {
            return Err(EngineError::Internal(format!(
                "working directory '{}' belongs to a different box",
                run_dir.root().display()
            )));
        }
        return Ok(());
    }
    let bytes =
        serde_json::to_vec_pretty(conditions).map_err(|e| EngineError::serialization(&path, e))?;
    write_atomic(&path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::statistics::{Observable, StatisticsRow};
    use crate::core::models::phase::PropertyPhase;
    use crate::core::models::state::{Pressure, Temperature, ThermodynamicState};
    use crate::core::models::substance::{Component, ComponentRole, Substance};
    use crate::core::timeseries::{Estimate, EstimationError, EstimatorStrategy};
    use crate::engine::config::EquilibrationConfigBuilder;
    use crate::engine::simulation::{AdvanceOutput, Checkpoint};
    use crate::storage::LocalStore;
    use std::fs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Deterministic engine: samples depend only on the global step number,
    /// which travels in the checkpoint.
    #[derive(Default)]
    struct FakeEngine {
        packs: AtomicUsize,
        advances: AtomicUsize,
        fail_minimize: bool,
        fail_at_iteration: Option<u64>,
        seen_checkpoints: Mutex<Vec<Option<String>>>,
    }

    impl SimulationEngine for FakeEngine {
        fn force_field_id(&self) -> &str {
            "fake-ff.offxml"
        }

        fn pack(&self, conditions: &PhysicalConditions) -> Result<Snapshot, EngineError> {
            self.packs.fetch_add(1, Ordering::SeqCst);
            Ok(Snapshot {
                system: format!("system for {}", conditions),
                coordinates: "PACKED\nEND\n".to_string(),
                n_molecules: conditions.n_molecules(),
            })
        }

        fn minimize(&self, snapshot: &Snapshot) -> Result<Snapshot, EngineError> {
            if self.fail_minimize {
                return Err(EngineError::Simulation {
                    stage: "minimize",
                    message: "overlapping atoms".to_string(),
                });
            }
            Ok(Snapshot {
                coordinates: "MINIMIZED\nEND\n".to_string(),
                ..snapshot.clone()
            })
        }

        fn advance(
            &self,
            snapshot: &Snapshot,
            request: &AdvanceRequest,
            resume: Option<&Checkpoint>,
        ) -> Result<AdvanceOutput, EngineError> {
            self.seen_checkpoints
                .lock()
                .unwrap()
                .push(resume.map(|c| c.0.clone()));
            let iteration = resume.map(|c| c.0.parse::<u64>().unwrap()).unwrap_or(0) + 1;
            if self.fail_at_iteration == Some(iteration) {
                return Err(EngineError::Simulation {
                    stage: "advance",
                    message: "node preempted".to_string(),
                });
            }
            self.advances.fetch_add(1, Ordering::SeqCst);
            let per_iteration = request.steps / request.report_interval;
            let samples = (1..=per_iteration)
                .map(|i| {
                    let step = (iteration - 1) * request.steps + i * request.report_interval;
                    let x = ((step * 7919) % 1000) as f64 / 1000.0;
                    StatisticsRow {
                        step,
                        potential_energy: -100.0 + x,
                        kinetic_energy: 50.0,
                        total_energy: -50.0 + x,
                        temperature: 298.0,
                        volume: 30.0,
                        density: 1.0 + x / 100.0,
                        speed: 100.0,
                    }
                })
                .collect();
            Ok(AdvanceOutput {
                snapshot: Snapshot {
                    coordinates: format!("ITERATION {iteration}\nEND\n"),
                    ..snapshot.clone()
                },
                checkpoint: Checkpoint(iteration.to_string()),
                samples,
            })
        }
    }

    /// Treats every sample as independent, with a fixed inefficiency.
    struct FixedInefficiency(f64);

    impl Estimator for FixedInefficiency {
        fn estimate(
            &self,
            series: &[f64],
            _strategy: EstimatorStrategy,
        ) -> Result<Estimate, EstimationError> {
            Ok(Estimate {
                equilibration_index: 0,
                statistical_inefficiency: self.0,
                effective_sample_size: series.len() as f64 / self.0,
            })
        }
    }

    fn water() -> PhysicalConditions {
        let water = Substance::from_component(Component::new("O", ComponentRole::Solvent));
        let state =
            ThermodynamicState::new(Temperature::kelvin(298.0), Some(Pressure::atmospheres(1.0)));
        PhysicalConditions::for_box(&water, 1000, state, PropertyPhase::Liquid).unwrap()
    }

    /// 10 samples per iteration; with inefficiency 1 the run converges once
    /// `required_samples` samples exist.
    fn config(max_iterations: usize, required_samples: f64) -> EquilibrationConfig {
        EquilibrationConfigBuilder::new()
            .max_iterations(max_iterations)
            .required_samples(required_samples)
            .strategies(EstimatorStrategy::ALL.to_vec())
            .observables(vec![Observable::PotentialEnergy, Observable::Density])
            .steps_per_iteration(100)
            .timestep_fs(2.0)
            .report_interval(10)
            .build()
            .unwrap()
    }

    fn run_once(
        engine: &FakeEngine,
        estimator: FixedInefficiency,
        config: &EquilibrationConfig,
        root: &Path,
    ) -> Result<RunOutcome, EngineError> {
        let reporter = ProgressReporter::new();
        EquilibrationLoop::new(water(), engine, estimator, config, root, &reporter)?.run()
    }

    #[test]
    fn converges_and_publishes_result() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::default();
        let config = config(10, 35.0);
        let outcome = run_once(&engine, FixedInefficiency(1.0), &config, dir.path()).unwrap();

        assert_eq!(outcome.status, RunStatus::Converged);
        assert_eq!(outcome.completed_iterations, 4);
        assert_eq!(engine.advances.load(Ordering::SeqCst), 4);
        assert_eq!(
            outcome.working_directory,
            dir.path().join(canonical_key(&water()).storage_key())
        );

        let record = outcome.record.unwrap();
        assert!(record.converged);
        assert_eq!(record.statistical_inefficiency, 1.0);
        assert_eq!(record.force_field_id, "fake-ff.offxml");
        assert_eq!(record.box_key().unwrap(), outcome.key);

        let output = outcome.ancillary_directory.unwrap();
        assert_eq!(
            fs::read_to_string(output.join("output.pdb")).unwrap(),
            "ITERATION 4\nEND\n"
        );
        let run = RunDirectory::open(&outcome.working_directory);
        assert_eq!(run.load_statistics().unwrap().len(), 40);
        assert!(run.diagnostics_file().exists());
        assert_eq!(read_result_file(&run.result_file()).unwrap(), record);
    }

    #[test]
    fn checkpoints_chain_between_iterations() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::default();
        run_once(&engine, FixedInefficiency(1.0), &config(3, 1000.0), dir.path()).unwrap();
        assert_eq!(
            *engine.seen_checkpoints.lock().unwrap(),
            vec![None, Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[test]
    fn finished_run_is_not_simulated_again() {
        let dir = tempdir().unwrap();
        let config = config(10, 35.0);
        let first = run_once(&FakeEngine::default(), FixedInefficiency(1.0), &config, dir.path())
            .unwrap();

        let engine = FakeEngine::default();
        let second = run_once(&engine, FixedInefficiency(1.0), &config, dir.path()).unwrap();
        assert_eq!(engine.packs.load(Ordering::SeqCst), 0);
        assert_eq!(engine.advances.load(Ordering::SeqCst), 0);
        assert_eq!(second.status, RunStatus::Converged);
        assert_eq!(second.record, first.record);
        assert_eq!(second.completed_iterations, 4);
    }

    #[test]
    fn zero_budget_reports_exhausted_without_simulating() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::default();
        let outcome = run_once(&engine, FixedInefficiency(1.0), &config(0, 10.0), dir.path()).unwrap();
        assert_eq!(outcome.status, RunStatus::Exhausted);
        assert_eq!(outcome.completed_iterations, 0);
        assert!(outcome.record.is_none());
        assert_eq!(engine.packs.load(Ordering::SeqCst), 0);
        assert_eq!(engine.advances.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exhausted_run_still_emits_flagged_record() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::default();
        let outcome = run_once(&engine, FixedInefficiency(1.0), &config(2, 35.0), dir.path()).unwrap();
        assert_eq!(outcome.status, RunStatus::Exhausted);
        assert_eq!(outcome.completed_iterations, 2);
        let record = outcome.record.unwrap();
        assert!(!record.converged);
        assert!(outcome.ancillary_directory.is_some());
    }

    #[test]
    fn resumed_run_matches_uninterrupted_run() {
        let config_full = config(10, 55.0);

        let straight = tempdir().unwrap();
        let expected =
            run_once(&FakeEngine::default(), FixedInefficiency(1.0), &config_full, straight.path())
                .unwrap();
        assert_eq!(expected.completed_iterations, 6);

        // First attempt exhausts a smaller budget, second attempt crashes in
        // iteration 5, third attempt finishes.
        let split = tempdir().unwrap();
        let partial =
            run_once(&FakeEngine::default(), FixedInefficiency(1.0), &config(3, 55.0), split.path())
                .unwrap();
        assert_eq!(partial.status, RunStatus::Exhausted);

        let crashing = FakeEngine {
            fail_at_iteration: Some(5),
            ..FakeEngine::default()
        };
        let crashed = run_once(&crashing, FixedInefficiency(1.0), &config_full, split.path());
        assert!(matches!(crashed, Err(EngineError::Simulation { stage: "advance", .. })));

        let engine = FakeEngine::default();
        let resumed = run_once(&engine, FixedInefficiency(1.0), &config_full, split.path()).unwrap();
        assert_eq!(engine.packs.load(Ordering::SeqCst), 0);
        assert_eq!(engine.advances.load(Ordering::SeqCst), 2);
        assert_eq!(resumed.status, RunStatus::Converged);
        assert_eq!(resumed.completed_iterations, 6);
        assert_eq!(resumed.record, expected.record);

        let a = RunDirectory::open(&expected.working_directory).load_statistics().unwrap();
        let b = RunDirectory::open(&resumed.working_directory).load_statistics().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn minimization_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine {
            fail_minimize: true,
            ..FakeEngine::default()
        };
        let result = run_once(&engine, FixedInefficiency(1.0), &config(5, 10.0), dir.path());
        assert!(matches!(result, Err(EngineError::Simulation { stage: "minimize", .. })));
        assert_eq!(engine.advances.load(Ordering::SeqCst), 0);

        let run = RunDirectory::for_key(dir.path(), &canonical_key(&water()));
        assert_eq!(run.stage().unwrap(), RunStage::Packed);
    }

    #[test]
    fn working_directory_of_another_box_is_rejected() {
        let dir = tempdir().unwrap();
        let key = canonical_key(&water());
        let run = RunDirectory::for_key(dir.path(), &key);
        run.create().unwrap();
        let other = PhysicalConditions::for_box(
            &Substance::from_component(Component::new("O", ComponentRole::Solvent)),
            10,
            *water().thermodynamic_state(),
            PropertyPhase::Gas,
        )
        .unwrap();
        let written = serde_json::to_string(&other).unwrap();
        fs::write(run.box_file(), &written).unwrap();

        let engine = FakeEngine::default();
        let result = run_once(&engine, FixedInefficiency(1.0), &config(1, 1.0), dir.path());
        assert!(matches!(result, Err(EngineError::Internal(_))));
        assert_eq!(engine.packs.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read_to_string(run.box_file()).unwrap(), written);
    }

    #[test]
    fn identical_submissions_share_one_stored_record() {
        let dir = tempdir().unwrap();
        let config = config(10, 35.0);
        let first = run_once(
            &FakeEngine::default(),
            FixedInefficiency(2.0),
            &config,
            &dir.path().join("run_a"),
        )
        .unwrap();
        let second = run_once(
            &FakeEngine::default(),
            FixedInefficiency(1.5),
            &config,
            &dir.path().join("run_b"),
        )
        .unwrap();
        assert_eq!(first.key, second.key);

        let store = LocalStore::open(dir.path().join("stored_data")).unwrap();
        for outcome in [&first, &second] {
            store
                .store(
                    outcome.record.clone().unwrap().into(),
                    outcome.ancillary_directory.as_deref(),
                )
                .unwrap();
        }
        assert_eq!(store.len(), 1);
        let (data, _) = store.retrieve(&first.key.storage_key()).unwrap();
        assert_eq!(data.statistical_inefficiency(), Some(1.5));
    }
}
