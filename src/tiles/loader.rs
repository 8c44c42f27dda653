use crate::tiles::{CellRecord, CellType, ConvertConfig, NucleusEntry};
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Cells extracted from a single tile file
#[derive(Debug, Clone, Default)]
pub struct TileExtraction {
    /// Tile name (file stem)
    pub tile_name: String,
    /// Valid cells in file order
    pub cells: Vec<CellRecord>,
    /// Cells dropped for missing centroid or type
    pub skipped_cells: usize,
    /// Distinct unknown type codes seen in this tile
    pub unknown_types: Vec<i64>,
    /// Whether the tile had no "nuc" field
    pub missing_nuc: bool,
}

/// Result of converting a whole tile directory
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    /// All valid cells, tile by tile
    pub records: Vec<CellRecord>,
    /// Tiles skipped because "nuc" was absent
    pub skipped_tiles: Vec<String>,
    /// Total cells dropped across all tiles
    pub skipped_cells: usize,
    /// Number of tile files read
    pub tiles_read: usize,
}

/// Loader for per-tile segmentation JSON
pub struct TileLoader {
    config: ConvertConfig,
}

impl TileLoader {
    /// Create new tile loader with default config
    pub fn new() -> Self {
        Self {
            config: ConvertConfig::default(),
        }
    }

    /// Create new tile loader with custom config
    pub fn with_config(config: ConvertConfig) -> Self {
        Self { config }
    }

    /// Whether a file name matches the tile pattern (`<prefix>*.<extension>`)
    fn is_tile_file(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };
        let ext_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.config.extension);
        name.starts_with(&self.config.prefix) && ext_ok
    }

    /// List tile files in a directory, sorted by path
    pub fn find_tile_files<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read tile directory: {:?}", dir))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.context("Failed to read directory entry")?.path();
            if path.is_file() && self.is_tile_file(&path) {
                files.push(path);
            }
        }

        if files.is_empty() {
            bail!(
                "No tile JSON files found in {:?} (pattern {}*.{})",
                dir,
                self.config.prefix,
                self.config.extension
            );
        }

        files.sort();
        info!("Found {} tile files", files.len());
        Ok(files)
    }

    /// Load a single tile file
    pub fn load_tile<P: AsRef<Path>>(&self, path: P) -> Result<TileExtraction> {
        let path = path.as_ref();
        let tile_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Invalid tile file name: {:?}", path))?
            .to_string();

        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        self.parse_tile(BufReader::new(file), tile_name)
            .with_context(|| format!("Failed to parse tile {:?}", path))
    }

    /// Parse tile JSON from a reader
    fn parse_tile<R: Read>(&self, reader: R, tile_name: String) -> Result<TileExtraction> {
        debug!("Processing {}...", tile_name);

        let mut document: Map<String, Value> = serde_json::from_reader(reader)?;

        let nuc = match document.remove("nuc") {
            Some(Value::Object(nuc)) => nuc,
            Some(Value::Null) | None => {
                warn!("No 'nuc' field in {}, skipping", tile_name);
                return Ok(TileExtraction {
                    tile_name,
                    missing_nuc: true,
                    ..TileExtraction::default()
                });
            }
            Some(other) => bail!("'nuc' field is not an object: {}", other),
        };

        let mut extraction = TileExtraction {
            tile_name,
            ..TileExtraction::default()
        };

        for (cell_id, value) in nuc {
            let entry: NucleusEntry = serde_json::from_value(value)
                .with_context(|| format!("Invalid nucleus entry {}", cell_id))?;

            let (x, y, code) = match (entry.position(), entry.cell_type) {
                (Some((x, y)), Some(code)) => (x, y, code),
                _ => {
                    extraction.skipped_cells += 1;
                    continue;
                }
            };

            let cell_type = CellType::from_code(code);
            if !cell_type.known && !extraction.unknown_types.contains(&code) {
                warn!("Unknown cell type {} in {}", code, extraction.tile_name);
                extraction.unknown_types.push(code);
            }

            let type_prob = entry.type_prob.unwrap_or(0.0);
            extraction
                .cells
                .push(CellRecord::new(&extraction.tile_name, x, y, &cell_type, type_prob));
        }

        if extraction.skipped_cells > 0 {
            debug!(
                "Skipped {} cells without centroid or type in {}",
                extraction.skipped_cells, extraction.tile_name
            );
        }
        debug!("Extracted {} cells from {}", extraction.cells.len(), extraction.tile_name);

        Ok(extraction)
    }

    /// Convert every tile file in a directory into one table
    pub fn convert_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Conversion> {
        let files = self.find_tile_files(dir)?;

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner} [{bar:40}] {pos}/{len} tiles {msg}")?
                .progress_chars("=> "),
        );

        let mut conversion = Conversion::default();
        for path in &files {
            let extraction = self.load_tile(path)?;
            pb.set_message(extraction.tile_name.clone());
            pb.inc(1);

            conversion.tiles_read += 1;
            conversion.skipped_cells += extraction.skipped_cells;
            if extraction.missing_nuc {
                conversion.skipped_tiles.push(extraction.tile_name);
                continue;
            }
            conversion.records.extend(extraction.cells);
        }
        pb.finish_and_clear();

        info!(
            "Extracted {} cells from {} tiles ({} skipped)",
            conversion.records.len(),
            conversion.tiles_read,
            conversion.skipped_tiles.len()
        );
        if conversion.skipped_cells > 0 {
            info!("Skipped {} cells without centroid or type", conversion.skipped_cells);
        }

        Ok(conversion)
    }
}

impl Default for TileLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a tile directory using the default tile pattern
pub fn convert_tiles<P: AsRef<Path>>(dir: P) -> Result<Conversion> {
    TileLoader::new().convert_dir(dir)
}
