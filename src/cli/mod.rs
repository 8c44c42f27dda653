use crate::mixing::MixingConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// nucmix: nuclear tile conversion and neighborhood mixing
#[derive(Parser, Debug)]
#[command(name = "nucmix")]
#[command(about = "Convert segmentation tiles to a cell table and compute neighborhood mixing")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert per-tile JSON into a single cell table
    Convert(ConvertArgs),

    /// Compute the mixing ratio between two neighborhoods
    Mix(MixArgs),
}

/// Conversion arguments
#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Directory containing tile JSON files
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Output CSV file
    #[arg(short, long, default_value = "main_fcs_csv.csv")]
    pub output: PathBuf,

    /// Also save a gzip snapshot of the table
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Tile file name prefix
    #[arg(long, default_value = "tile_")]
    pub prefix: String,
}

/// Mixing arguments
#[derive(Parser, Debug)]
pub struct MixArgs {
    /// Cell table with group, patient, and neighborhood columns (CSV or TSV)
    #[arg(long, required = true)]
    pub cells: PathBuf,

    /// Per-region neighbor-index arrays (.npy or CSV), in region order
    #[arg(long, required = true, num_args = 1..)]
    pub regions: Vec<PathBuf>,

    /// Mixing configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// First neighborhood of interest
    #[arg(long)]
    pub neigh1: Option<i64>,

    /// Second neighborhood of interest
    #[arg(long)]
    pub neigh2: Option<i64>,

    /// Neighborhood column name
    #[arg(long)]
    pub neighborhood_column: Option<String>,

    /// Group column name
    #[arg(long)]
    pub group_column: Option<String>,

    /// Patient column name
    #[arg(long)]
    pub patient_column: Option<String>,

    /// Cell identifier column referenced by the neighbor arrays (default: row position)
    #[arg(long)]
    pub id_column: Option<String>,

    /// Output file for mixing ratios
    #[arg(short, long, default_value = "mixing.csv")]
    pub output: PathBuf,

    /// Output format (csv, json)
    #[arg(short, long, default_value = "csv")]
    pub format: String,

    /// Directory for population and adjacency count tables
    #[arg(long)]
    pub counts_dir: Option<PathBuf>,
}

impl MixArgs {
    /// Mixing configuration: config file (or defaults) overridden by flags
    pub fn mixing_config(&self) -> Result<MixingConfig> {
        let mut config = match &self.config {
            Some(path) => MixingConfig::from_file(path)?,
            None => MixingConfig::default(),
        };

        if let Some(n) = self.neigh1 {
            config.neigh1 = n;
        }
        if let Some(n) = self.neigh2 {
            config.neigh2 = n;
        }
        if let Some(col) = &self.neighborhood_column {
            config.neighborhood_column = col.clone();
        }
        if let Some(col) = &self.group_column {
            config.group_column = col.clone();
        }
        if let Some(col) = &self.patient_column {
            config.patient_column = col.clone();
        }
        if self.id_column.is_some() {
            config.id_column = self.id_column.clone();
        }

        Ok(config)
    }
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_args() {
        let cli = Cli::parse_from(["nucmix", "convert", "-i", "json"]);

        match cli.command {
            Commands::Convert(args) => {
                assert_eq!(args.input, PathBuf::from("json"));
                assert_eq!(args.output, PathBuf::from("main_fcs_csv.csv"));
                assert_eq!(args.prefix, "tile_");
                assert!(args.snapshot.is_none());
            }
            _ => panic!("Expected Convert command"),
        }
    }

    #[test]
    fn test_mix_args() {
        let cli = Cli::parse_from([
            "nucmix", "-v", "mix",
            "--cells", "cells.csv",
            "--regions", "r0.npy", "r1.npy",
            "--neigh1", "2",
            "-f", "json",
        ]);

        assert!(cli.verbose);
        match cli.command {
            Commands::Mix(args) => {
                assert_eq!(args.cells, PathBuf::from("cells.csv"));
                assert_eq!(args.regions.len(), 2);
                assert_eq!(args.neigh1, Some(2));
                assert_eq!(args.neigh2, None);
                assert_eq!(args.format, "json");
                assert_eq!(args.output, PathBuf::from("mixing.csv"));

                let config = args.mixing_config().unwrap();
                assert_eq!(config.neigh1, 2);
                assert_eq!(config.neigh2, 0);
                assert_eq!(config.group_column, "groups");
            }
            _ => panic!("Expected Mix command"),
        }
    }
}
