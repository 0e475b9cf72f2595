//! # Core Module
//!
//! Stateless building blocks shared by every other layer.
//!
//! - **Physical Models** ([`models`]) - Substances, thermodynamic states, phases,
//!   the conditions that define a simulation box and the physical properties
//!   that boxes are derived from
//! - **Identity** ([`identity`]) - Canonical serialization and hashing of
//!   simulation conditions into order-independent keys
//! - **File I/O** ([`io`]) - The append-only observable statistics table
//! - **Time Series Analysis** ([`timeseries`]) - Observable series, the estimator
//!   interface and a built-in implementation of the equilibration detection
//!   strategies

pub mod identity;
pub mod io;
pub mod models;
pub mod timeseries;
