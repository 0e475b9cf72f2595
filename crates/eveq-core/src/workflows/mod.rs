//! # Workflows Module
//!
//! High-level entry points that tie the models, the engine layer and the store
//! together.
//!
//! ## Architecture
//!
//! - **Box Setup** ([`setup`]) - Derives the boxes a property data set needs,
//!   deduplicates them by canonical key and drops the ones already stored
//! - **Equilibration Loop** ([`equilibrate`]) - The resumable
//!   pack, minimize, advance and evaluate cycle for a single box, producing the
//!   record that goes into the store
//!
//! Workflows never talk to a simulation package directly. They drive whatever
//! implements [`crate::engine::simulation::SimulationEngine`] and report progress
//! through a [`crate::engine::progress::ProgressReporter`].

pub mod equilibrate;
pub mod setup;
