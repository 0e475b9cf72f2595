use crate::cli::ImportLegacyArgs;
use crate::error::{CliError, Result};
use eveq::storage::legacy::import_legacy;
use tracing::warn;

pub fn run(args: ImportLegacyArgs) -> Result<()> {
    if !args.legacy.is_dir() {
        return Err(CliError::Argument(format!(
            "Legacy store does not exist: {}",
            args.legacy.display()
        )));
    }
    let (store, summary) = import_legacy(&args.legacy, &args.output)?;

    println!(
        "Scanned {} legacy record(s): {} equilibration, {} other, {} duplicate(s) dropped, {} skipped.",
        summary.scanned, summary.equilibration, summary.other, summary.duplicates, summary.skipped
    );
    if summary.failed > 0 {
        warn!(failed = summary.failed, "Some legacy records could not be imported");
        println!("Warning: {} record(s) failed to import.", summary.failed);
    }
    println!("New store at {} holds {} record(s).", store.root().display(), store.len());
    Ok(())
}
