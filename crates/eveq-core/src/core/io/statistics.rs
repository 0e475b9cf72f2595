use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// One reporter sample, in the column order of the statistics table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRow {
    #[serde(rename = "Step")]
    pub step: u64,
    #[serde(rename = "Potential Energy (kJ/mole)")]
    pub potential_energy: f64,
    #[serde(rename = "Kinetic Energy (kJ/mole)")]
    pub kinetic_energy: f64,
    #[serde(rename = "Total Energy (kJ/mole)")]
    pub total_energy: f64,
    #[serde(rename = "Temperature (K)")]
    pub temperature: f64,
    #[serde(rename = "Box Volume (nm^3)")]
    pub volume: f64,
    #[serde(rename = "Density (g/mL)")]
    pub density: f64,
    #[serde(rename = "Speed (ns/day)")]
    pub speed: f64,
}

/// A tracked column of the statistics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Observable {
    PotentialEnergy,
    KineticEnergy,
    TotalEnergy,
    Temperature,
    Volume,
    Density,
}

impl Observable {
    pub fn extract(&self, row: &StatisticsRow) -> f64 {
        match self {
            Observable::PotentialEnergy => row.potential_energy,
            Observable::KineticEnergy => row.kinetic_energy,
            Observable::TotalEnergy => row.total_energy,
            Observable::Temperature => row.temperature,
            Observable::Volume => row.volume,
            Observable::Density => row.density,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Observable::PotentialEnergy => "potential-energy",
            Observable::KineticEnergy => "kinetic-energy",
            Observable::TotalEnergy => "total-energy",
            Observable::Temperature => "temperature",
            Observable::Volume => "volume",
            Observable::Density => "density",
        }
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("I/O error for statistics file '{path}': {source}")]
    Io { path: String, source: io::Error },
    #[error("Malformed statistics table '{path}': {source}")]
    Csv { path: String, source: csv::Error },
}

/// The append-only table of reporter samples collected over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsTable {
    rows: Vec<StatisticsRow>,
}

impl StatisticsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<StatisticsRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[StatisticsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn append(&mut self, rows: impl IntoIterator<Item = StatisticsRow>) {
        self.rows.extend(rows);
    }

    /// The samples of one observable, in step order.
    pub fn series(&self, observable: Observable) -> Vec<f64> {
        self.rows.iter().map(|r| observable.extract(r)).collect()
    }

    pub fn read_from(reader: impl Read) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let rows = rdr.deserialize().collect::<Result<Vec<StatisticsRow>, _>>()?;
        Ok(Self { rows })
    }

    pub fn write_to(&self, writer: impl Write) -> Result<(), csv::Error> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(writer);
        if self.rows.is_empty() {
            wtr.write_record(HEADERS)?;
        }
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, StatisticsError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| StatisticsError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::read_from(file).map_err(|e| StatisticsError::Csv {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reads the table if the file exists, otherwise returns an empty table.
    pub fn read_or_default<P: AsRef<Path>>(path: P) -> Result<Self, StatisticsError> {
        if path.as_ref().exists() {
            Self::read_from_path(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), StatisticsError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| StatisticsError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        self.write_to(BufWriter::new(file))
            .map_err(|e| StatisticsError::Csv {
                path: path.display().to_string(),
                source: e,
            })
    }
}

const HEADERS: [&str; 8] = [
    "Step",
    "Potential Energy (kJ/mole)",
    "Kinetic Energy (kJ/mole)",
    "Total Energy (kJ/mole)",
    "Temperature (K)",
    "Box Volume (nm^3)",
    "Density (g/mL)",
    "Speed (ns/day)",
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(step: u64, potential: f64, density: f64) -> StatisticsRow {
        StatisticsRow {
            step,
            potential_energy: potential,
            kinetic_energy: 10.0,
            total_energy: potential + 10.0,
            temperature: 298.0,
            volume: 30.0,
            density,
            speed: 120.0,
        }
    }

    #[test]
    fn write_emits_fixed_header() {
        let table = StatisticsTable::from_rows(vec![row(1000, -5.0, 0.99)]);
        let mut buffer = Vec::new();
        table.write_to(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with(&HEADERS.join(",")));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn empty_table_still_has_header() {
        let mut buffer = Vec::new();
        StatisticsTable::new().write_to(&mut buffer).unwrap();
        let back = StatisticsTable::read_from(buffer.as_slice()).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn append_and_reload_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statistics.csv");
        let mut table = StatisticsTable::read_or_default(&path).unwrap();
        assert!(table.is_empty());
        table.append([row(1000, -5.0, 0.99), row(2000, -6.0, 1.01)]);
        table.write_to_path(&path).unwrap();

        let mut reloaded = StatisticsTable::read_from_path(&path).unwrap();
        assert_eq!(reloaded, table);
        reloaded.append([row(3000, -7.0, 1.0)]);
        assert_eq!(reloaded.series(Observable::PotentialEnergy), vec![-5.0, -6.0, -7.0]);
        assert_eq!(reloaded.series(Observable::Density), vec![0.99, 1.01, 1.0]);
    }

    #[test]
    fn malformed_rows_are_reported_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statistics.csv");
        std::fs::write(&path, format!("{}\n1000,abc,1,2,3,4,5,6\n", HEADERS.join(","))).unwrap();
        assert!(matches!(
            StatisticsTable::read_from_path(&path),
            Err(StatisticsError::Csv { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            StatisticsTable::read_from_path(dir.path().join("absent.csv")),
            Err(StatisticsError::Io { .. })
        ));
    }
}
