//! # EVEQ Core Library
//!
//! Drives molecular simulation boxes to equilibrium and keeps the equilibrated
//! results in a deduplicating, content-addressed store.
//!
//! ## Architectural Philosophy
//!
//! The library follows a layered architecture so that the physics, the control
//! logic and the persistence each stay independently testable.
//!
//! - **[`core`]: The Foundation.** Stateless models of what is being simulated
//!   (`Substance`, `ThermodynamicState`, `PhysicalConditions`), the canonical
//!   identity scheme that decides when two boxes are "the same box", the
//!   observable statistics table and the built-in statistical estimators.
//!
//! - **[`engine`]: The Logic Core.** Configuration, error types, progress
//!   reporting, the `SimulationEngine` collaborator interface, the
//!   `ConvergenceDetector` and the per-run working directory layout.
//!
//! - **[`storage`]: The Result Store.** Tagged stored-record variants, key
//!   derivation, the on-disk content-addressed store with its
//!   keep-the-better-record replacement policy, store merging and legacy import.
//!
//! - **[`workflows`]: The Public API.** The resumable equilibration loop and the
//!   box setup planner that tie the other layers together.

pub mod core;
pub mod engine;
pub mod storage;
pub mod workflows;
