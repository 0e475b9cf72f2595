//! Provides input/output for the per-run observable statistics table.
//!
//! The table is a CSV file with a fixed column schema that grows by one block of
//! rows per equilibration iteration. It is the only source from which observable
//! series are rebuilt when a run is resumed.

pub mod statistics;
