use super::IdentityError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

const CELSIUS_OFFSET: f64 = 273.15;
const KPA_PER_ATM: f64 = 101.325;
const KPA_PER_BAR: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[serde(rename = "K")]
    Kelvin,
    #[serde(rename = "degC")]
    Celsius,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureUnit {
    #[serde(rename = "atm")]
    Atmosphere,
    #[serde(rename = "bar")]
    Bar,
    #[serde(rename = "kPa")]
    Kilopascal,
    #[serde(rename = "Pa")]
    Pascal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub value: f64,
    pub unit: TemperatureUnit,
}

impl Temperature {
    pub fn kelvin(value: f64) -> Self {
        Self {
            value,
            unit: TemperatureUnit::Kelvin,
        }
    }

    pub fn to_kelvin(&self) -> f64 {
        match self.unit {
            TemperatureUnit::Kelvin => self.value,
            TemperatureUnit::Celsius => self.value + CELSIUS_OFFSET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pressure {
    pub value: f64,
    pub unit: PressureUnit,
}

impl Pressure {
    pub fn atmospheres(value: f64) -> Self {
        Self {
            value,
            unit: PressureUnit::Atmosphere,
        }
    }

    pub fn to_kilopascal(&self) -> f64 {
        match self.unit {
            PressureUnit::Atmosphere => self.value * KPA_PER_ATM,
            PressureUnit::Bar => self.value * KPA_PER_BAR,
            PressureUnit::Kilopascal => self.value,
            PressureUnit::Pascal => self.value / 1000.0,
        }
    }
}

/// Temperature and (optionally) pressure at which a box is simulated.
///
/// A missing pressure denotes a constant-volume ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermodynamicState {
    pub temperature: Temperature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<Pressure>,
}

impl ThermodynamicState {
    pub fn new(temperature: Temperature, pressure: Option<Pressure>) -> Self {
        Self {
            temperature,
            pressure,
        }
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        let kelvin = self.temperature.to_kelvin();
        if !kelvin.is_finite() || kelvin <= 0.0 {
            return Err(IdentityError::InvalidState(format!(
                "temperature must be positive, got {} K",
                kelvin
            )));
        }
        if let Some(pressure) = self.pressure {
            let kpa = pressure.to_kilopascal();
            if !kpa.is_finite() || kpa <= 0.0 {
                return Err(IdentityError::InvalidState(format!(
                    "pressure must be positive, got {} kPa",
                    kpa
                )));
            }
        }
        Ok(())
    }

    /// Unit-normalized textual form: kelvin and kilopascal, six decimals.
    pub fn canonical_value(&self) -> Value {
        json!({
            "temperature": format!("{:.6} K", self.temperature.to_kelvin()),
            "pressure": self
                .pressure
                .map(|p| format!("{:.6} kPa", p.to_kilopascal())),
        })
    }
}

impl fmt::Display for ThermodynamicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T={:.2} K", self.temperature.to_kelvin())?;
        if let Some(p) = self.pressure {
            write!(f, ", P={:.3} kPa", p.to_kilopascal())?;
        }
        Ok(())
    }
}
