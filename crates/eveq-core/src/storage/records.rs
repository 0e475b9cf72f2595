use super::error::StoreError;
use super::keys::KeyStrategy;
use crate::core::identity::{CanonicalKey, canonical_key};
use crate::core::models::IdentityError;
use crate::core::models::conditions::PhysicalConditions;
use crate::core::models::phase::PropertyPhase;
use crate::core::models::state::ThermodynamicState;
use crate::core::models::substance::Substance;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TYPE_TAG: &str = "@type";
pub const EQUILIBRATION_LAYER: &str = "EquilibrationLayer";
pub const DEFAULT_COORDINATE_FILE: &str = "output.pdb";

/// The closed set of record types the store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Equilibration,
    ForceField,
    Simulation,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::Equilibration,
        RecordKind::ForceField,
        RecordKind::Simulation,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            RecordKind::Equilibration => "StoredEquilibrationData",
            RecordKind::ForceField => "ForceFieldData",
            RecordKind::Simulation => "StoredSimulationData",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_name() == name)
    }

    pub fn has_ancillary_data(&self) -> bool {
        matches!(self, RecordKind::Equilibration | RecordKind::Simulation)
    }

    /// Whether the storage key is a pure function of the record content.
    pub fn is_hashable(&self) -> bool {
        self.key_strategy().is_deterministic()
    }

    /// Whether a colliding record may supersede the resident one.
    pub fn is_replaceable(&self) -> bool {
        matches!(self, RecordKind::Equilibration)
    }

    pub fn key_strategy(&self) -> KeyStrategy {
        match self {
            RecordKind::Equilibration => KeyStrategy::BoxIdentity,
            RecordKind::ForceField => KeyStrategy::ContentDigest,
            RecordKind::Simulation => KeyStrategy::Random,
        }
    }
}

/// Result of equilibrating one box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEquilibrationData {
    pub substance: Substance,
    pub thermodynamic_state: ThermodynamicState,
    pub property_phase: PropertyPhase,
    pub source_calculation_id: String,
    pub force_field_id: String,
    pub coordinate_file_name: String,
    /// Worst inefficiency over the tracked observables.
    pub statistical_inefficiency: f64,
    pub number_of_molecules: u64,
    pub max_number_of_molecules: u64,
    pub calculation_layer: String,
    /// `false` when the iteration budget ran out before convergence.
    #[serde(default = "default_converged")]
    pub converged: bool,
}

fn default_converged() -> bool {
    true
}

impl StoredEquilibrationData {
    pub fn conditions(&self) -> Result<PhysicalConditions, IdentityError> {
        PhysicalConditions::new(
            self.substance.clone(),
            self.number_of_molecules,
            self.max_number_of_molecules,
            self.thermodynamic_state,
            self.property_phase,
        )
    }

    pub fn box_key(&self) -> Result<CanonicalKey, IdentityError> {
        self.conditions().map(|c| canonical_key(&c))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceFieldData {
    pub force_field_source: String,
}

/// A production simulation result. Not deduplicated by content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSimulationData {
    pub substance: Substance,
    pub thermodynamic_state: ThermodynamicState,
    pub property_phase: PropertyPhase,
    pub source_calculation_id: String,
    pub force_field_id: String,
    pub coordinate_file_name: String,
    pub trajectory_file_name: String,
    pub statistics_file_name: String,
    pub statistical_inefficiency: f64,
    pub number_of_molecules: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum StoredData {
    #[serde(rename = "StoredEquilibrationData")]
    Equilibration(StoredEquilibrationData),
    #[serde(rename = "ForceFieldData")]
    ForceField(ForceFieldData),
    #[serde(rename = "StoredSimulationData")]
    Simulation(StoredSimulationData),
}

impl From<StoredEquilibrationData> for StoredData {
    fn from(data: StoredEquilibrationData) -> Self {
        StoredData::Equilibration(data)
    }
}

impl From<ForceFieldData> for StoredData {
    fn from(data: ForceFieldData) -> Self {
        StoredData::ForceField(data)
    }
}

impl From<StoredSimulationData> for StoredData {
    fn from(data: StoredSimulationData) -> Self {
        StoredData::Simulation(data)
    }
}

impl StoredData {
    pub fn kind(&self) -> RecordKind {
        match self {
            StoredData::Equilibration(_) => RecordKind::Equilibration,
            StoredData::ForceField(_) => RecordKind::ForceField,
            StoredData::Simulation(_) => RecordKind::Simulation,
        }
    }

    /// Decodes a record, distinguishing null and unknown types from malformed
    /// records of a known type.
    pub fn from_json_value(value: Value) -> Result<Self, StoreError> {
        if value.is_null() {
            return Err(StoreError::NullRecord);
        }
        let type_name = value
            .get(TYPE_TAG)
            .and_then(Value::as_str)
            .map(str::to_string);
        match type_name.as_deref().and_then(RecordKind::from_type_name) {
            Some(_) => serde_json::from_value(value).map_err(|e| StoreError::Malformed {
                context: type_name.unwrap_or_default(),
                source: e,
            }),
            None => Err(StoreError::UnsupportedRecordType(
                type_name.unwrap_or_else(|| "<untagged>".to_string()),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            StoredData::Equilibration(data) => {
                data.conditions()?;
                require_non_empty("coordinate_file_name", &data.coordinate_file_name)?;
                require_non_empty("force_field_id", &data.force_field_id)?;
            }
            StoredData::ForceField(data) => {
                require_non_empty("force_field_source", &data.force_field_source)?;
            }
            StoredData::Simulation(data) => {
                data.substance.validate()?;
                data.thermodynamic_state.validate()?;
                require_non_empty("coordinate_file_name", &data.coordinate_file_name)?;
                require_non_empty("trajectory_file_name", &data.trajectory_file_name)?;
                require_non_empty("statistics_file_name", &data.statistics_file_name)?;
            }
        }
        Ok(())
    }

    /// The merge rule's quality measure. Lower is better.
    pub fn statistical_inefficiency(&self) -> Option<f64> {
        match self {
            StoredData::Equilibration(data) => Some(data.statistical_inefficiency),
            StoredData::Simulation(data) => Some(data.statistical_inefficiency),
            StoredData::ForceField(_) => None,
        }
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        Err(StoreError::InvalidRecord(format!("'{}' must not be empty", field)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::core::models::state::{Pressure, Temperature};
    use crate::core::models::substance::{Component, ComponentRole};

    pub fn ambient() -> ThermodynamicState {
        ThermodynamicState::new(Temperature::kelvin(298.0), Some(Pressure::atmospheres(1.0)))
    }

    pub fn water_box(n_molecules: u64) -> PhysicalConditions {
        let water = Substance::from_component(Component::new("O", ComponentRole::Solvent));
        PhysicalConditions::for_box(&water, n_molecules, ambient(), PropertyPhase::Liquid).unwrap()
    }

    pub fn equilibration(conditions: &PhysicalConditions, g: f64) -> StoredEquilibrationData {
        StoredEquilibrationData {
            substance: conditions.substance().clone(),
            thermodynamic_state: *conditions.thermodynamic_state(),
            property_phase: conditions.phase(),
            source_calculation_id: "eveq".to_string(),
            force_field_id: "openff-2.1.0.offxml".to_string(),
            coordinate_file_name: DEFAULT_COORDINATE_FILE.to_string(),
            statistical_inefficiency: g,
            number_of_molecules: conditions.n_molecules(),
            max_number_of_molecules: conditions.max_molecules(),
            calculation_layer: EQUILIBRATION_LAYER.to_string(),
            converged: true,
        }
    }

    pub fn simulation(g: f64) -> StoredSimulationData {
        let conditions = water_box(100);
        StoredSimulationData {
            substance: conditions.substance().clone(),
            thermodynamic_state: ambient(),
            property_phase: PropertyPhase::Liquid,
            source_calculation_id: "eveq".to_string(),
            force_field_id: "openff-2.1.0.offxml".to_string(),
            coordinate_file_name: "output.pdb".to_string(),
            trajectory_file_name: "trajectory.dcd".to_string(),
            statistics_file_name: "statistics.csv".to_string(),
            statistical_inefficiency: g,
            number_of_molecules: 100,
        }
    }
}
