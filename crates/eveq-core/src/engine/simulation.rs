use super::error::EngineError;
use crate::core::io::statistics::StatisticsRow;
use crate::core::models::conditions::PhysicalConditions;
use crate::core::models::state::ThermodynamicState;
use serde::{Deserialize, Serialize};

/// The engine's view of a box at one point in time.
///
/// `system` is the engine's opaque parameterized topology and is only ever
/// written back to the engine; `coordinates` is PDB text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub system: String,
    pub coordinates: String,
    pub n_molecules: u64,
}

/// Opaque, engine-serialized integrator state used to continue a trajectory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvanceRequest {
    pub steps: u64,
    pub timestep_fs: f64,
    pub report_interval: u64,
    pub thermodynamic_state: ThermodynamicState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceOutput {
    pub snapshot: Snapshot,
    pub checkpoint: Checkpoint,
    pub samples: Vec<StatisticsRow>,
}

/// The physical simulation collaborator.
///
/// Calls are blocking and may take hours. An `Err` from `pack` or `minimize`
/// is fatal to the run and is never retried.
pub trait SimulationEngine {
    /// Identifier of the force field used to parameterize boxes.
    fn force_field_id(&self) -> &str;

    fn pack(&self, conditions: &PhysicalConditions) -> Result<Snapshot, EngineError>;

    fn minimize(&self, snapshot: &Snapshot) -> Result<Snapshot, EngineError>;

    /// Simulates `request.steps` steps starting from `snapshot`, continuing the
    /// trajectory in `resume` when given. `samples` holds only the rows produced
    /// by this call.
    fn advance(
        &self,
        snapshot: &Snapshot,
        request: &AdvanceRequest,
        resume: Option<&Checkpoint>,
    ) -> Result<AdvanceOutput, EngineError>;
}
