use super::IdentityError;
use super::conditions::PhysicalConditions;
use super::phase::PropertyPhase;
use super::state::ThermodynamicState;
use super::substance::Substance;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_BOX_MOLECULES: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyKind {
    Density,
    DielectricConstant,
    EnthalpyOfMixing,
    ExcessMolarVolume,
    EnthalpyOfVaporization,
    SolvationFreeEnergy,
}

impl PropertyKind {
    /// Excess properties are estimated relative to the pure components, so each
    /// component needs its own box in addition to the mixture.
    pub fn is_excess(&self) -> bool {
        matches!(
            self,
            PropertyKind::EnthalpyOfMixing | PropertyKind::ExcessMolarVolume
        )
    }

    pub fn is_vaporization(&self) -> bool {
        matches!(self, PropertyKind::EnthalpyOfVaporization)
    }
}

/// A measured physical property whose estimation needs one or more
/// equilibrated boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalProperty {
    #[serde(default)]
    pub id: Option<String>,
    pub kind: PropertyKind,
    pub substance: Substance,
    pub thermodynamic_state: ThermodynamicState,
    pub phase: PropertyPhase,
}

impl PhysicalProperty {
    /// Derives every box this property requires.
    ///
    /// - vaporization properties: the mixture as a liquid and as a gas;
    /// - excess properties: the mixture plus one pure box per component;
    /// - everything else: the mixture alone, in the property's phase.
    pub fn to_boxes(&self, n_molecules: u64) -> Result<Vec<PhysicalConditions>, IdentityError> {
        let state = self.thermodynamic_state;

        if self.kind.is_vaporization() {
            return Ok(vec![
                PhysicalConditions::for_box(&self.substance, n_molecules, state, PropertyPhase::Liquid)?,
                PhysicalConditions::for_box(&self.substance, n_molecules, state, PropertyPhase::Gas)?,
            ]);
        }

        let mut boxes = vec![PhysicalConditions::for_box(
            &self.substance,
            n_molecules,
            state,
            self.phase,
        )?];
        if self.kind.is_excess() {
            for component in self.substance.components() {
                let pure = Substance::from_component(component.clone());
                boxes.push(PhysicalConditions::for_box(&pure, n_molecules, state, self.phase)?);
            }
        }
        Ok(boxes)
    }
}

#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON parsing error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDataSet {
    pub properties: Vec<PhysicalProperty>,
}

impl PropertyDataSet {
    pub fn load(path: &Path) -> Result<Self, DatasetLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| DatasetLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| DatasetLoadError::Json {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::state::{Pressure, Temperature};
    use crate::core::models::substance::{Amount, Component, ComponentRole};
    use std::fs;
    use tempfile::tempdir;

    fn binary_mixture() -> Substance {
        Substance::from_entries([
            (Component::new("O", ComponentRole::Solvent), Amount::MoleFraction(0.5)),
            (Component::new("CCO", ComponentRole::Solvent), Amount::MoleFraction(0.5)),
        ])
        .unwrap()
    }

    fn property(kind: PropertyKind) -> PhysicalProperty {
        PhysicalProperty {
            id: None,
            kind,
            substance: binary_mixture(),
            thermodynamic_state: ThermodynamicState::new(
                Temperature::kelvin(298.15),
                Some(Pressure::atmospheres(1.0)),
            ),
            phase: PropertyPhase::Liquid,
        }
    }

    #[test]
    fn plain_property_derives_single_mixture_box() {
        let boxes = property(PropertyKind::Density).to_boxes(1000).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].substance().len(), 2);
        assert_eq!(boxes[0].phase(), PropertyPhase::Liquid);
    }

    #[test]
    fn excess_property_adds_one_pure_box_per_component() {
        let boxes = property(PropertyKind::EnthalpyOfMixing).to_boxes(1000).unwrap();
        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[1].substance().len(), 1);
        assert_eq!(boxes[2].substance().len(), 1);
        assert_eq!(boxes[1].n_molecules(), 1000);
    }

    #[test]
    fn vaporization_derives_liquid_and_gas_boxes() {
        let boxes = property(PropertyKind::EnthalpyOfVaporization)
            .to_boxes(1000)
            .unwrap();
        let phases: Vec<_> = boxes.iter().map(|b| b.phase()).collect();
        assert_eq!(phases, vec![PropertyPhase::Liquid, PropertyPhase::Gas]);
        assert_eq!(boxes[0].substance(), boxes[1].substance());
    }

    #[test]
    fn dataset_loads_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        let dataset = PropertyDataSet {
            properties: vec![property(PropertyKind::Density)],
        };
        fs::write(&path, serde_json::to_string(&dataset).unwrap()).unwrap();
        assert_eq!(PropertyDataSet::load(&path).unwrap(), dataset);
    }

    #[test]
    fn dataset_load_reports_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PropertyDataSet::load(&path),
            Err(DatasetLoadError::Json { .. })
        ));
    }
}
