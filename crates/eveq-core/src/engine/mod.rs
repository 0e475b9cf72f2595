//! # Engine Module
//!
//! The logic that sits between the physical models and the public workflows.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Iteration budget, simulation lengths and the
//!   convergence policy, assembled through a validating builder
//! - **Simulation Interface** ([`simulation`]) - The `SimulationEngine` trait that
//!   packs, minimizes and advances boxes
//! - **Convergence** ([`convergence`]) - Combines the estimator strategies into one
//!   verdict per observable and per run
//! - **Run Directories** ([`run`]) - File layout, staged iteration commits and
//!   crash recovery of a box's working directory
//! - **Progress Monitoring** ([`progress`]) - Callback based progress events
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod config;
pub mod convergence;
pub mod error;
pub mod progress;
pub mod run;
pub mod simulation;
