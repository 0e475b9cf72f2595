use crate::cli::MergeArgs;
use crate::error::{CliError, Result};
use eveq::storage::LocalStore;
use tracing::info;

pub fn run(args: MergeArgs) -> Result<()> {
    if !args.source.is_dir() {
        return Err(CliError::Argument(format!(
            "Source store does not exist: {}",
            args.source.display()
        )));
    }
    info!("Merging {:?} into {:?}", &args.source, &args.target);
    let source = LocalStore::open(&args.source)?;
    let target = LocalStore::open(&args.target)?;
    let summary = target.merge(&source)?;

    println!(
        "Merged {} record(s): {} inserted, {} replaced, {} kept.",
        source.len(),
        summary.inserted,
        summary.replaced,
        summary.kept
    );
    Ok(())
}
