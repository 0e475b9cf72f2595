use crate::cli::SetupArgs;
use crate::config::defaults::DefaultsConfig;
use crate::error::Result;
use eveq::core::models::property::PropertyDataSet;
use eveq::storage::LocalStore;
use eveq::workflows::setup;
use tracing::info;

pub fn run(args: SetupArgs) -> Result<()> {
    let n_molecules = args
        .n_molecules
        .unwrap_or(DefaultsConfig::default().n_molecules);

    info!("Loading property data set from {:?}", &args.dataset);
    let dataset = PropertyDataSet::load(&args.dataset)?;

    let store = match &args.storage {
        Some(path) => {
            info!("Opening store at {:?}", path);
            Some(LocalStore::open(path)?)
        }
        None => None,
    };

    let plan = setup::plan_boxes(&dataset, store.as_ref(), n_molecules)?;
    let written = setup::write_box_files(&plan, &args.output)?;

    println!(
        "{} properties need {} boxes ({} unique, {} already stored).",
        dataset.len(),
        plan.total,
        plan.unique,
        plan.stored
    );
    println!(
        "Wrote {} box file(s) to {}",
        written.len(),
        args.output.display()
    );
    Ok(())
}
