use crate::mixing::join::NearestAssignment;
use crate::mixing::table::CellTable;
use crate::mixing::{GroupKey, NearestNeighborhood, Neighborhood};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

type Adjacency = BTreeMap<NearestNeighborhood, usize>;

/// Per (group, patient, neighborhood) population and neighbor counts
#[derive(Debug, Clone, Default)]
pub struct NeighborhoodCounts {
    population: BTreeMap<GroupKey, BTreeMap<Neighborhood, usize>>,
    adjacency: BTreeMap<GroupKey, BTreeMap<Neighborhood, Adjacency>>,
}

impl NeighborhoodCounts {
    /// Count cells and their nearest-neighbor neighborhoods
    pub fn compute(table: &CellTable, assignment: &NearestAssignment) -> Self {
        let mut counts = Self::default();

        for (cell, &nearest) in table.cells().iter().zip(&assignment.nearest) {
            let key = cell.group_key();

            *counts
                .population
                .entry(key.clone())
                .or_default()
                .entry(cell.neighborhood)
                .or_default() += 1;

            *counts
                .adjacency
                .entry(key)
                .or_default()
                .entry(cell.neighborhood)
                .or_default()
                .entry(nearest)
                .or_default() += 1;
        }

        counts
    }

    /// All (group, patient) pairs, sorted
    pub fn group_keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.population.keys()
    }

    /// Distinct neighborhoods across all groups
    pub fn neighborhoods(&self) -> BTreeSet<Neighborhood> {
        self.population
            .values()
            .flat_map(|m| m.keys().copied())
            .collect()
    }

    /// Number of cells of `neighborhood` in this group; `None` if absent
    pub fn population(&self, key: &GroupKey, neighborhood: Neighborhood) -> Option<usize> {
        self.population.get(key)?.get(&neighborhood).copied()
    }

    /// Number of `neighborhood` cells whose nearest neighbor is in `nearest`.
    ///
    /// `None` when `neighborhood` has no cells in this group; `Some(0)` when it
    /// has cells but none touch `nearest`.
    pub fn adjacency(
        &self,
        key: &GroupKey,
        neighborhood: Neighborhood,
        nearest: NearestNeighborhood,
    ) -> Option<usize> {
        let touching = self.adjacency.get(key)?.get(&neighborhood)?;
        Some(touching.get(&nearest).copied().unwrap_or(0))
    }

    /// Write population as long-format CSV
    pub fn write_population<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["group", "patient", "neighborhood", "count"])?;
        for (key, by_neighborhood) in &self.population {
            for (neighborhood, count) in by_neighborhood {
                csv_writer.write_record([
                    key.group.as_str(),
                    key.patient.as_str(),
                    neighborhood.to_string().as_str(),
                    count.to_string().as_str(),
                ])?;
            }
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write adjacency as long-format CSV
    pub fn write_adjacency<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["group", "patient", "neighborhood", "nearest_neighborhood", "count"])?;
        for (key, by_neighborhood) in &self.adjacency {
            for (neighborhood, touching) in by_neighborhood {
                for (nearest, count) in touching {
                    csv_writer.write_record([
                        key.group.as_str(),
                        key.patient.as_str(),
                        neighborhood.to_string().as_str(),
                        nearest.to_string().as_str(),
                        count.to_string().as_str(),
                    ])?;
                }
            }
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Save `population.csv` and `adjacency.csv` into a directory
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        crate::utils::ensure_dir(dir)?;

        let population_path = dir.join("population.csv");
        let file = File::create(&population_path)
            .with_context(|| format!("Failed to create {:?}", population_path))?;
        self.write_population(BufWriter::new(file))?;

        let adjacency_path = dir.join("adjacency.csv");
        let file = File::create(&adjacency_path)
            .with_context(|| format!("Failed to create {:?}", adjacency_path))?;
        self.write_adjacency(BufWriter::new(file))?;

        info!("Saved count tables to {:?}", dir);
        Ok(())
    }
}
