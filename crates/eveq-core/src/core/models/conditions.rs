use super::IdentityError;
use super::phase::PropertyPhase;
use super::state::ThermodynamicState;
use super::substance::Substance;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// The complete physical description of one simulation box.
///
/// Instances are validated on construction and immutable afterwards, so any
/// `PhysicalConditions` value can be hashed into a canonical key without
/// further checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConditions", into = "RawConditions")]
pub struct PhysicalConditions {
    substance: Substance,
    n_molecules: u64,
    max_molecules: u64,
    thermodynamic_state: ThermodynamicState,
    phase: PropertyPhase,
}

#[derive(Serialize, Deserialize)]
struct RawConditions {
    substance: Substance,
    n_molecules: u64,
    max_molecules: u64,
    thermodynamic_state: ThermodynamicState,
    phase: PropertyPhase,
}

impl TryFrom<RawConditions> for PhysicalConditions {
    type Error = IdentityError;

    fn try_from(raw: RawConditions) -> Result<Self, Self::Error> {
        Self::new(
            raw.substance,
            raw.n_molecules,
            raw.max_molecules,
            raw.thermodynamic_state,
            raw.phase,
        )
    }
}

impl From<PhysicalConditions> for RawConditions {
    fn from(c: PhysicalConditions) -> Self {
        Self {
            substance: c.substance,
            n_molecules: c.n_molecules,
            max_molecules: c.max_molecules,
            thermodynamic_state: c.thermodynamic_state,
            phase: c.phase,
        }
    }
}

impl PhysicalConditions {
    pub fn new(
        substance: Substance,
        n_molecules: u64,
        max_molecules: u64,
        thermodynamic_state: ThermodynamicState,
        phase: PropertyPhase,
    ) -> Result<Self, IdentityError> {
        substance.validate()?;
        thermodynamic_state.validate()?;
        if n_molecules == 0 {
            return Err(IdentityError::InvalidMoleculeCount(
                "a box must contain at least one molecule".to_string(),
            ));
        }
        if n_molecules > max_molecules {
            return Err(IdentityError::InvalidMoleculeCount(format!(
                "{} molecules exceed the maximum of {}",
                n_molecules, max_molecules
            )));
        }
        Ok(Self {
            substance,
            n_molecules,
            max_molecules,
            thermodynamic_state,
            phase,
        })
    }

    /// A box whose target and maximum molecule counts are both `n_molecules`.
    ///
    /// The substance is first converted into exact molecule counts so that the
    /// box identity reflects the composition that will actually be packed.
    pub fn for_box(
        substance: &Substance,
        n_molecules: u64,
        thermodynamic_state: ThermodynamicState,
        phase: PropertyPhase,
    ) -> Result<Self, IdentityError> {
        let boxed = substance.to_substance_n_molecules(n_molecules)?;
        Self::new(boxed, n_molecules, n_molecules, thermodynamic_state, phase)
    }

    pub fn substance(&self) -> &Substance {
        &self.substance
    }

    pub fn n_molecules(&self) -> u64 {
        self.n_molecules
    }

    pub fn max_molecules(&self) -> u64 {
        self.max_molecules
    }

    pub fn thermodynamic_state(&self) -> &ThermodynamicState {
        &self.thermodynamic_state
    }

    pub fn phase(&self) -> PropertyPhase {
        self.phase
    }

    pub fn canonical_value(&self) -> Value {
        json!({
            "substance": self.substance.canonical_value(),
            "n_molecules": self.n_molecules,
            "max_molecules": self.max_molecules,
            "thermodynamic_state": self.thermodynamic_state.canonical_value(),
            "property_phase": self.phase.as_str(),
        })
    }
}

impl fmt::Display for PhysicalConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Box(substance={}, n_molecules={}, {}, phase={})",
            self.substance, self.n_molecules, self.thermodynamic_state, self.phase
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::state::{Pressure, Temperature};
    use crate::core::models::substance::{Component, ComponentRole};

    fn ambient() -> ThermodynamicState {
        ThermodynamicState::new(Temperature::kelvin(298.15), Some(Pressure::atmospheres(1.0)))
    }

    #[test]
    fn for_box_converts_fractions_to_counts() {
        let water = Substance::from_component(Component::new("O", ComponentRole::Solvent));
        let conditions =
            PhysicalConditions::for_box(&water, 1000, ambient(), PropertyPhase::Liquid).unwrap();
        assert_eq!(conditions.n_molecules(), 1000);
        assert_eq!(conditions.max_molecules(), 1000);
        assert_eq!(conditions.substance().to_string(), "O:n=1000");
    }

    #[test]
    fn new_rejects_zero_and_oversized_counts() {
        let water = Substance::from_component(Component::new("O", ComponentRole::Solvent));
        assert!(PhysicalConditions::new(water.clone(), 0, 10, ambient(), PropertyPhase::Liquid).is_err());
        assert!(PhysicalConditions::new(water, 11, 10, ambient(), PropertyPhase::Liquid).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let json = r#"{
            "substance": {"entries": []},
            "n_molecules": 10,
            "max_molecules": 10,
            "thermodynamic_state": {"temperature": {"value": 300.0, "unit": "K"}},
            "phase": "liquid"
        }"#;
        let result: Result<PhysicalConditions, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn serde_round_trip_preserves_conditions() {
        let water = Substance::from_component(Component::new("O", ComponentRole::Solvent));
        let conditions =
            PhysicalConditions::for_box(&water, 500, ambient(), PropertyPhase::Gas).unwrap();
        let json = serde_json::to_string(&conditions).unwrap();
        let back: PhysicalConditions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, conditions);
    }
}
