use crate::tiles::loader::Conversion;
use crate::utils::format_number;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Conversion summary statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConversionSummary {
    /// Total cells extracted
    pub total_cells: usize,
    /// Number of distinct tiles contributing cells
    pub unique_tiles: usize,
    /// Number of distinct cluster names
    pub unique_types: usize,
    /// Cells per cluster name, most frequent first
    pub type_distribution: Vec<(String, usize)>,
    /// Tiles skipped for a missing "nuc" field
    pub skipped_tiles: usize,
    /// Cells skipped for missing centroid or type
    pub skipped_cells: usize,
}

impl ConversionSummary {
    /// Create summary from a conversion
    pub fn from_conversion(conversion: &Conversion) -> Self {
        let records = &conversion.records;

        let tiles: HashSet<&str> = records.iter().map(|r| r.file_name.as_str()).collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in records {
            *counts.entry(record.cluster_name.as_str()).or_default() += 1;
        }

        let mut type_distribution: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        type_distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            total_cells: records.len(),
            unique_tiles: tiles.len(),
            unique_types: type_distribution.len(),
            type_distribution,
            skipped_tiles: conversion.skipped_tiles.len(),
            skipped_cells: conversion.skipped_cells,
        }
    }

    /// Print summary to stdout
    pub fn print(&self) {
        println!("\n=== Conversion Summary ===");
        println!("Total cells extracted: {}", format_number(self.total_cells));
        println!("Unique tiles: {}", self.unique_tiles);
        println!("Unique cell types: {}", self.unique_types);
        println!("Tiles skipped: {}", self.skipped_tiles);
        println!("Cells skipped: {}", self.skipped_cells);
        println!("\nCell type distribution:");
        for (name, count) in &self.type_distribution {
            println!("  {:<32} {}", name, format_number(*count));
        }
        println!("==========================\n");
    }
}
