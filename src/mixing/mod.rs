pub mod counts;
pub mod join;
pub mod neighbors;
pub mod ratio;
pub mod table;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

pub use counts::NeighborhoodCounts;
pub use join::{assign_nearest_neighborhoods, NearestAssignment};
pub use neighbors::{NeighborIndex, NeighborPair};
pub use ratio::mixing_ratios;
pub use table::{CellAssignment, CellTable};

/// Neighborhood label assigned by the upstream clustering
pub type Neighborhood = i64;

/// Cell identifier used by the neighbor-index arrays
pub type CellId = u64;

/// Neighborhood of a cell's nearest neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NearestNeighborhood {
    /// No neighbor row names this cell as its origin
    Unassigned,
    /// Nearest neighbor belongs to this neighborhood
    Label(Neighborhood),
}

impl std::fmt::Display for NearestNeighborhood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NearestNeighborhood::Unassigned => write!(f, "unassigned"),
            NearestNeighborhood::Label(n) => write!(f, "{}", n),
        }
    }
}

/// (group, patient) pair that mixing ratios are reported for
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub group: String,
    pub patient: String,
}

impl GroupKey {
    pub fn new(group: impl Into<String>, patient: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            patient: patient.into(),
        }
    }
}

/// Mixing calculation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixingConfig {
    /// First neighborhood of interest
    pub neigh1: Neighborhood,
    /// Second neighborhood of interest
    pub neigh2: Neighborhood,
    /// Column holding neighborhood labels
    pub neighborhood_column: String,
    /// Column holding group labels
    pub group_column: String,
    /// Column holding patient labels
    pub patient_column: String,
    /// Column holding cell identifiers; row position when unset
    pub id_column: Option<String>,
}

impl Default for MixingConfig {
    fn default() -> Self {
        Self {
            neigh1: 4,
            neigh2: 0,
            neighborhood_column: "neighborhood10".to_string(),
            group_column: "groups".to_string(),
            patient_column: "patients".to_string(),
            id_column: None,
        }
    }
}

impl MixingConfig {
    /// Load configuration from a JSON file; missing keys take defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config: {:?}", path))
    }
}

/// Mixing ratio for one (group, patient)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixingRow {
    pub group: String,
    pub patient: String,
    /// Mean of the directional adjacency counts between the two neighborhoods
    pub intersection: f64,
    /// Combined population of the two neighborhoods
    pub whole: usize,
    pub ratio: f64,
    /// Ratio above 1; reported as computed, never clamped
    pub exceeds_unit: bool,
}

/// Mixing ratios for a pair of neighborhoods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixingResult {
    pub neigh1: Neighborhood,
    pub neigh2: Neighborhood,
    pub rows: Vec<MixingRow>,
}

impl MixingResult {
    /// Rows whose ratio exceeds 1
    pub fn flagged(&self) -> impl Iterator<Item = &MixingRow> {
        self.rows.iter().filter(|r| r.exceeds_unit)
    }

    /// Write rows as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        if self.rows.is_empty() {
            csv_writer.write_record(["group", "patient", "intersection", "whole", "ratio", "exceeds_unit"])?;
        }
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Save rows to a CSV or JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P, format: &str) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {:?}", path))?;
        let mut writer = BufWriter::new(file);

        match format {
            "csv" => self.write_csv(&mut writer)?,
            "json" => {
                serde_json::to_writer_pretty(&mut writer, self)?;
                writer.flush()?;
            }
            _ => anyhow::bail!("Unsupported output format: {}", format),
        }

        info!("Saved {} mixing rows to {:?}", self.rows.len(), path);
        Ok(())
    }

    /// Print result table to stdout
    pub fn print(&self) {
        println!("\n=== Neighborhood Mixing ({} vs {}) ===", self.neigh1, self.neigh2);
        println!("{:<16} {:<16} {:>12} {:>8} {:>8}", "group", "patient", "intersection", "whole", "ratio");
        for row in &self.rows {
            println!(
                "{:<16} {:<16} {:>12.1} {:>8} {:>8.4}{}",
                row.group,
                row.patient,
                row.intersection,
                row.whole,
                row.ratio,
                if row.exceeds_unit { " *" } else { "" }
            );
        }
        println!("======================================\n");
    }
}

/// Join neighbor indices to the cell table, count, and compute ratios
pub fn compute_mixing(
    table: &CellTable,
    regions: &[NeighborIndex],
    config: &MixingConfig,
) -> Result<(NeighborhoodCounts, MixingResult)> {
    let assignment = assign_nearest_neighborhoods(table, regions)?;
    let counts = NeighborhoodCounts::compute(table, &assignment);
    let rows = mixing_ratios(&counts, config.neigh1, config.neigh2);

    Ok((
        counts,
        MixingResult {
            neigh1: config.neigh1,
            neigh2: config.neigh2,
            rows,
        },
    ))
}
