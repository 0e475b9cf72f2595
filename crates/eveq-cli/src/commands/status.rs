use crate::cli::StatusArgs;
use crate::config::defaults::DefaultsConfig;
use crate::error::Result;
use eveq::core::models::property::PropertyDataSet;
use eveq::storage::{LocalStore, RecordKind};
use eveq::workflows::setup;

pub fn run(args: StatusArgs) -> Result<()> {
    let n_molecules = args
        .n_molecules
        .unwrap_or(DefaultsConfig::default().n_molecules);

    let dataset = PropertyDataSet::load(&args.dataset)?;
    let store = LocalStore::open(&args.storage)?;

    let plan = setup::plan_boxes(&dataset, Some(&store), n_molecules)?;
    let coverage = setup::coverage(&dataset, &store, n_molecules)?;

    println!("Store: {}", store.root().display());
    for kind in RecordKind::ALL {
        println!("  {:<26} {}", kind.type_name(), store.keys_of(kind).len());
    }
    println!(
        "Boxes: {} unique, {} stored, {} pending",
        plan.unique,
        plan.stored,
        plan.pending.len()
    );
    println!(
        "Properties with every box stored: {}/{}",
        coverage.complete, coverage.properties
    );
    Ok(())
}
