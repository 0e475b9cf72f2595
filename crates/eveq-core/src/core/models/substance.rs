use super::IdentityError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

const MOLE_FRACTION_TOLERANCE: f64 = 1e-6;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentRole {
    #[default]
    Solvent,
    Solute,
    Ligand,
    Receptor,
}

impl ComponentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentRole::Solvent => "solvent",
            ComponentRole::Solute => "solute",
            ComponentRole::Ligand => "ligand",
            ComponentRole::Receptor => "receptor",
        }
    }
}

/// A single chemical species in a substance, identified by its SMILES pattern
/// and the role it plays in the box.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    pub smiles: String,
    #[serde(default)]
    pub role: ComponentRole,
}

impl Component {
    pub fn new(smiles: impl Into<String>, role: ComponentRole) -> Self {
        Self {
            smiles: smiles.into(),
            role,
        }
    }

    /// Stable identifier used for ordering components in canonical form.
    pub fn identifier(&self) -> String {
        format!("{}{{{}}}", self.smiles, self.role.as_str())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// How much of a component a substance contains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Amount {
    MoleFraction(f64),
    ExactAmount(u64),
}

impl Amount {
    fn canonical_value(&self) -> Value {
        match self {
            Amount::MoleFraction(x) => json!({
                "type": "mole-fraction",
                "value": format!("{:.9}", x),
            }),
            Amount::ExactAmount(n) => json!({
                "type": "exact-amount",
                "value": n,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstanceEntry {
    pub component: Component,
    pub amount: Amount,
}

/// A chemical composition: a set of components, each with one amount.
///
/// The in-memory order of components carries no meaning; two substances that
/// list the same components in a different order describe the same mixture.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Substance {
    entries: Vec<SubstanceEntry>,
}

impl Substance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = (Component, Amount)>,
    ) -> Result<Self, IdentityError> {
        let mut substance = Self::new();
        for (component, amount) in entries {
            substance.add_component(component, amount)?;
        }
        Ok(substance)
    }

    /// A pure substance made only of `component`.
    pub fn from_component(component: Component) -> Self {
        Self {
            entries: vec![SubstanceEntry {
                component,
                amount: Amount::MoleFraction(1.0),
            }],
        }
    }

    pub fn add_component(
        &mut self,
        component: Component,
        amount: Amount,
    ) -> Result<(), IdentityError> {
        if component.smiles.trim().is_empty() {
            return Err(IdentityError::EmptySmiles);
        }
        if self.entries.iter().any(|e| e.component == component) {
            return Err(IdentityError::DuplicateComponent(component.identifier()));
        }
        self.entries.push(SubstanceEntry { component, amount });
        Ok(())
    }

    pub fn entries(&self) -> &[SubstanceEntry] {
        &self.entries
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.entries.iter().map(|e| &e.component)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.entries.is_empty() {
            return Err(IdentityError::EmptySubstance);
        }

        let mut seen = Vec::with_capacity(self.entries.len());
        let mut fraction_sum = 0.0;
        let mut has_fractions = false;
        for entry in &self.entries {
            if entry.component.smiles.trim().is_empty() {
                return Err(IdentityError::EmptySmiles);
            }
            let identifier = entry.component.identifier();
            if seen.contains(&identifier) {
                return Err(IdentityError::DuplicateComponent(identifier));
            }
            match entry.amount {
                Amount::MoleFraction(x) => {
                    if !x.is_finite() || x <= 0.0 || x > 1.0 + MOLE_FRACTION_TOLERANCE {
                        return Err(IdentityError::InvalidMoleFraction {
                            component: identifier,
                            value: x,
                        });
                    }
                    has_fractions = true;
                    fraction_sum += x;
                }
                Amount::ExactAmount(0) => {
                    return Err(IdentityError::InvalidMoleculeCount(format!(
                        "component '{}' has an exact amount of zero",
                        identifier
                    )));
                }
                Amount::ExactAmount(_) => {}
            }
            seen.push(identifier);
        }

        if has_fractions && (fraction_sum - 1.0).abs() > MOLE_FRACTION_TOLERANCE {
            return Err(IdentityError::MoleFractionSum(fraction_sum));
        }
        Ok(())
    }

    fn total_exact_molecules(&self) -> u64 {
        self.entries
            .iter()
            .filter_map(|e| match e.amount {
                Amount::ExactAmount(n) => Some(n),
                Amount::MoleFraction(_) => None,
            })
            .sum()
    }

    /// Number of molecules of each component (keyed by identifier) in a box
    /// holding at most `max_molecules` molecules.
    ///
    /// Exact amounts are taken as-is; the remaining capacity is split between the
    /// mole-fraction components by largest-remainder apportionment, so the
    /// fraction-derived counts always sum to the remaining capacity.
    pub fn molecules_per_component(
        &self,
        max_molecules: u64,
    ) -> Result<BTreeMap<String, u64>, IdentityError> {
        self.validate()?;
        if max_molecules == 0 {
            return Err(IdentityError::InvalidMoleculeCount(
                "a box must hold at least one molecule".to_string(),
            ));
        }

        let exact = self.total_exact_molecules();
        if exact > max_molecules {
            return Err(IdentityError::TooManyExactMolecules {
                exact,
                maximum: max_molecules,
            });
        }
        let capacity = max_molecules - exact;

        let mut counts = BTreeMap::new();
        let mut remainders = Vec::new();
        let mut allocated = 0u64;
        for entry in &self.entries {
            let identifier = entry.component.identifier();
            match entry.amount {
                Amount::ExactAmount(n) => {
                    counts.insert(identifier, n);
                }
                Amount::MoleFraction(x) => {
                    let raw = x * capacity as f64;
                    // Fractions may overshoot 1 within tolerance.
                    let floor = (raw.floor() as u64).min(capacity - allocated);
                    allocated += floor;
                    remainders.push((raw - floor as f64, identifier.clone()));
                    counts.insert(identifier, floor);
                }
            }
        }

        // Largest fractional part first; identifier order breaks ties.
        remainders.sort_by(|(ra, ia), (rb, ib)| {
            rb.partial_cmp(ra).unwrap_or(Ordering::Equal).then_with(|| ia.cmp(ib))
        });
        let mut missing = capacity - allocated;
        for (_, identifier) in remainders.iter().cycle() {
            if missing == 0 {
                break;
            }
            if let Some(count) = counts.get_mut(identifier) {
                *count += 1;
                missing -= 1;
            }
        }

        Ok(counts)
    }

    /// Converts every amount into an exact molecule count for a box of
    /// `n_molecules`. Components that end up with no molecules are dropped.
    pub fn to_substance_n_molecules(&self, n_molecules: u64) -> Result<Substance, IdentityError> {
        let counts = self.molecules_per_component(n_molecules)?;
        let entries = self
            .entries
            .iter()
            .filter_map(|entry| {
                let count = counts
                    .get(&entry.component.identifier())
                    .copied()
                    .unwrap_or(0);
                (count > 0).then(|| SubstanceEntry {
                    component: entry.component.clone(),
                    amount: Amount::ExactAmount(count),
                })
            })
            .collect();
        Ok(Substance { entries })
    }

    /// Order-independent representation: entries sorted by component identifier,
    /// amounts rendered with a fixed textual precision.
    pub fn canonical_value(&self) -> Value {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.component.identifier());
        Value::Array(
            entries
                .into_iter()
                .map(|e| {
                    json!({
                        "identifier": e.component.identifier(),
                        "smiles": e.component.smiles,
                        "role": e.component.role.as_str(),
                        "amount": e.amount.canonical_value(),
                    })
                })
                .collect(),
        )
    }
}

impl fmt::Display for Substance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|e| match e.amount {
                Amount::MoleFraction(x) => format!("{}:x={:.4}", e.component.smiles, x),
                Amount::ExactAmount(n) => format!("{}:n={}", e.component.smiles, n),
            })
            .collect();
        write!(f, "{}", parts.join("|"))
    }
}
