//! Physical models describing what a simulation box contains and under which
//! conditions it is simulated.

pub mod conditions;
pub mod phase;
pub mod property;
pub mod state;
pub mod substance;

use thiserror::Error;

/// Errors raised when simulation conditions are malformed or incomplete.
///
/// These are always fatal and are reported before any simulation work starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdentityError {
    #[error("Substance has no components")]
    EmptySubstance,

    #[error("Component has an empty SMILES pattern")]
    EmptySmiles,

    #[error("Component '{0}' appears more than once in the substance")]
    DuplicateComponent(String),

    #[error("Invalid mole fraction {value} for component '{component}'")]
    InvalidMoleFraction { component: String, value: f64 },

    #[error("Mole fractions sum to {0}, expected 1")]
    MoleFractionSum(f64),

    #[error("Exact amounts require {exact} molecules but the box only holds {maximum}")]
    TooManyExactMolecules { exact: u64, maximum: u64 },

    #[error("Invalid molecule count: {0}")]
    InvalidMoleculeCount(String),

    #[error("Invalid thermodynamic state: {0}")]
    InvalidState(String),
}
