use crate::cli::EquilibrateArgs;
use crate::config::build_config;
use crate::engine::CommandEngine;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use eveq::core::timeseries::BuiltinEstimator;
use eveq::engine::progress::ProgressReporter;
use eveq::storage::{LocalStore, StoreOutcome};
use eveq::workflows::equilibrate::{EquilibrationLoop, RunOutcome, RunStatus};
use eveq::workflows::setup;
use std::path::PathBuf;
use tracing::{info, warn};

pub fn run(args: EquilibrateArgs) -> Result<()> {
    let app = build_config(&args)?;

    let box_path = resolve_box_file(&args)?;
    info!("Loading box from {:?}", &box_path);
    let conditions = setup::read_box_file(&box_path)?;

    let engine = CommandEngine::new(app.engine);
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Equilibrating {} ...", conditions);
    let eq_loop = EquilibrationLoop::new(
        conditions,
        &engine,
        BuiltinEstimator::default(),
        &app.core_config,
        &args.working_dir,
        &reporter,
    )?;
    info!("Working directory: {:?}", eq_loop.working_directory());
    let outcome = eq_loop.run()?;

    print_outcome(&outcome);

    if let Some(storage) = &args.storage {
        store_outcome(&outcome, storage)?;
    }
    Ok(())
}

fn resolve_box_file(args: &EquilibrateArgs) -> Result<PathBuf> {
    if let Some(path) = &args.selection.box_file {
        return Ok(path.clone());
    }
    let (Some(dir), Some(index)) = (&args.selection.boxes_dir, args.index) else {
        return Err(CliError::Argument(
            "Either --box or --boxes-dir together with --index is required.".to_string(),
        ));
    };
    let files = setup::list_box_files(dir)?;
    files.get(index).cloned().ok_or_else(|| {
        CliError::Argument(format!(
            "Index {} is out of range: {} holds {} box file(s).",
            index,
            dir.display(),
            files.len()
        ))
    })
}

fn print_outcome(outcome: &RunOutcome) {
    match (&outcome.status, &outcome.record) {
        (RunStatus::Converged, Some(record)) => println!(
            "✓ Converged after {} iteration(s), statistical inefficiency {:.3}.",
            outcome.completed_iterations, record.statistical_inefficiency
        ),
        (RunStatus::Exhausted, Some(record)) => {
            warn!("Run {} did not converge", outcome.key);
            println!(
                "Warning: not converged after {} iteration(s), statistical inefficiency {:.3}. The record is flagged as unconverged.",
                outcome.completed_iterations, record.statistical_inefficiency
            );
        }
        (_, None) => println!(
            "Warning: no samples were produced after {} iteration(s); nothing to store.",
            outcome.completed_iterations
        ),
    }
    println!("Result key: {}", outcome.key.storage_key());
    println!("Working directory: {}", outcome.working_directory.display());
}

fn store_outcome(outcome: &RunOutcome, storage: &std::path::Path) -> Result<()> {
    let Some(record) = &outcome.record else {
        return Ok(());
    };
    let store = LocalStore::open(storage)?;
    let (key, stored) =
        store.store_with_outcome(record.clone().into(), outcome.ancillary_directory.as_deref())?;
    match stored {
        StoreOutcome::Inserted => println!("Stored new record {}", key),
        StoreOutcome::Replaced => println!("Replaced stored record {} with a better one", key),
        StoreOutcome::Kept => println!("Store already holds an equal or better record {}", key),
    }
    Ok(())
}
