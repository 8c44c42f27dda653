//! # nucmix: tile conversion and neighborhood mixing
//!
//! Two independent steps of a spatial tissue-analysis workflow:
//!
//! - **Tile conversion**: per-tile nuclear segmentation JSON (`tile_*.json`)
//!   is flattened into one cell table with centroid, mapped cell type, type
//!   probability, and display color.
//! - **Neighborhood mixing**: given per-region nearest-neighbor index arrays
//!   and a cell table annotated with group, patient, and neighborhood, compute
//!   how much two neighborhoods border each other per patient.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use nucmix::mixing::{compute_mixing, neighbors::load_regions, CellTable, MixingConfig};
//! use nucmix::tiles::{loader::convert_tiles, writer::write_csv};
//!
//! // Convert tiles
//! let conversion = convert_tiles("json/").unwrap();
//! write_csv(&conversion.records, "main_fcs_csv.csv").unwrap();
//!
//! // Mixing between neighborhoods 4 and 0
//! let config = MixingConfig::default();
//! let table = CellTable::load("cells.csv", &config).unwrap();
//! let regions = load_regions(&["region_0.npy", "region_1.npy"]).unwrap();
//! let (_counts, result) = compute_mixing(&table, &regions, &config).unwrap();
//! result.print();
//! ```

pub mod cli;
pub mod mixing;
pub mod tiles;
pub mod utils;

/// Re-export commonly used types
pub use mixing::{MixingConfig, MixingResult, MixingRow};
pub use tiles::{CellRecord, CellType, ConvertConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - segmentation tile conversion and neighborhood mixing",
        NAME, VERSION
    )
}
