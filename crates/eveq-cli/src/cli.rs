use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "EVEQ Developers",
    version,
    about = "EVEQ CLI - Equilibrate molecular simulation boxes and keep the results in a deduplicating, content-addressed store.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive the boxes a property data set needs and write one box file per box not yet stored.
    Setup(SetupArgs),
    /// Run the equilibration loop for one box.
    Equilibrate(EquilibrateArgs),
    /// Store the results of finished equilibration runs.
    Save(SaveArgs),
    /// Merge one store into another, keeping the better record on collisions.
    Merge(MergeArgs),
    /// Rebuild a store from a legacy store directory.
    ImportLegacy(ImportLegacyArgs),
    /// Report how much of a property data set a store already covers.
    Status(StatusArgs),
}

/// Arguments for the `setup` subcommand.
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Path to the property data set (JSON).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub dataset: PathBuf,

    /// Existing store; boxes already in it are skipped.
    #[arg(short, long, value_name = "DIR")]
    pub storage: Option<PathBuf>,

    /// Directory that receives one `<key>.json` box file per pending box.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Number of molecules per box.
    #[arg(short, long, value_name = "INT")]
    pub n_molecules: Option<u64>,
}

/// Selects the box to equilibrate, either directly or by position in a box directory.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct BoxSelection {
    /// Path to a single box file written by `setup`.
    #[arg(long = "box", value_name = "PATH")]
    pub box_file: Option<PathBuf>,

    /// Directory of box files written by `setup`; requires --index.
    #[arg(long, value_name = "DIR", requires = "index")]
    pub boxes_dir: Option<PathBuf>,
}

/// Arguments for the `equilibrate` subcommand.
#[derive(Args, Debug)]
pub struct EquilibrateArgs {
    #[command(flatten)]
    pub selection: BoxSelection,

    /// Zero-based position of the box in the sorted contents of --boxes-dir.
    #[arg(long, value_name = "INT")]
    pub index: Option<usize>,

    /// Root under which each box gets its own working directory.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub working_dir: PathBuf,

    /// Path to the configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Driver program implementing the engine protocol.
    #[arg(short, long, value_name = "PROGRAM")]
    pub engine: Option<PathBuf>,

    /// Extra argument passed to the driver program. Can be used multiple times.
    #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Override the maximum number of iterations.
    #[arg(short, long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Store the result in this store once the run finishes.
    #[arg(short, long, value_name = "DIR")]
    pub storage: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S convergence.required-samples=200
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `save` subcommand.
#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Working root whose finished runs should be stored.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub input: PathBuf,

    /// Target store.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub storage: PathBuf,

    /// Replace the force field identifier of every saved record.
    #[arg(long, value_name = "ID")]
    pub force_field_id: Option<String>,

    /// Store this force field file and use its record key as the identifier.
    #[arg(long, value_name = "PATH", conflicts_with = "force_field_id")]
    pub force_field_source: Option<PathBuf>,
}

/// Arguments for the `merge` subcommand.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Store whose records are merged in.
    #[arg(long, required = true, value_name = "DIR")]
    pub source: PathBuf,

    /// Store that receives the records.
    #[arg(long, required = true, value_name = "DIR")]
    pub target: PathBuf,
}

/// Arguments for the `import-legacy` subcommand.
#[derive(Args, Debug)]
pub struct ImportLegacyArgs {
    /// Legacy store directory.
    #[arg(long, required = true, value_name = "DIR")]
    pub legacy: PathBuf,

    /// Root of the new store.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,
}

/// Arguments for the `status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Path to the property data set (JSON).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub dataset: PathBuf,

    /// Store to check against.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub storage: PathBuf,

    /// Number of molecules per box.
    #[arg(short, long, value_name = "INT")]
    pub n_molecules: Option<u64>,
}
