pub mod equilibrate;
pub mod import;
pub mod merge;
pub mod save;
pub mod setup;
pub mod status;
