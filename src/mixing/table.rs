use crate::mixing::{CellId, GroupKey, MixingConfig, Neighborhood};
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Supported table formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Tsv,
    GzippedCsv,
    GzippedTsv,
}

impl FileFormat {
    /// Detect file format from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str());
        let stem = path.file_stem().and_then(|s| s.to_str());

        match (ext, stem) {
            (Some("gz"), Some(stem)) => {
                if stem.ends_with(".csv") {
                    Ok(FileFormat::GzippedCsv)
                } else if stem.ends_with(".tsv") || stem.ends_with(".txt") {
                    Ok(FileFormat::GzippedTsv)
                } else {
                    Err(anyhow::anyhow!("Cannot determine format of gzipped file {:?}", path))
                }
            }
            (Some("csv"), _) => Ok(FileFormat::Csv),
            (Some("tsv"), _) | (Some("txt"), _) => Ok(FileFormat::Tsv),
            _ => Err(anyhow::anyhow!("Unsupported file format: {:?}", path)),
        }
    }

    /// Get delimiter character
    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv | FileFormat::GzippedCsv => b',',
            FileFormat::Tsv | FileFormat::GzippedTsv => b'\t',
        }
    }

    /// Check if format is gzipped
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedCsv | FileFormat::GzippedTsv)
    }

    /// Open a file as a reader, decompressing if needed
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn Read>> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        if self.is_gzipped() {
            Ok(Box::new(BufReader::new(GzDecoder::new(file))))
        } else {
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

/// Neighborhood allocation of a single cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellAssignment {
    pub id: CellId,
    pub group: String,
    pub patient: String,
    pub neighborhood: Neighborhood,
}

impl CellAssignment {
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(self.group.clone(), self.patient.clone())
    }
}

/// Cell table annotated with group, patient, and neighborhood.
///
/// Cells are addressed by identifier, never by row position alone, so a
/// neighbor index that points outside the table is caught at join time.
#[derive(Debug, Clone)]
pub struct CellTable {
    cells: Vec<CellAssignment>,
    positions: HashMap<CellId, usize>,
}

impl CellTable {
    /// Build a table, rejecting duplicate identifiers
    pub fn new(cells: Vec<CellAssignment>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(cells.len());
        for (pos, cell) in cells.iter().enumerate() {
            if let Some(first) = positions.insert(cell.id, pos) {
                bail!(
                    "Duplicate cell identifier {} at rows {} and {}",
                    cell.id,
                    first,
                    pos
                );
            }
        }
        Ok(Self { cells, positions })
    }

    /// Load cell table from a CSV/TSV file (optionally gzipped)
    pub fn load<P: AsRef<Path>>(path: P, config: &MixingConfig) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading cell table from {:?}", path);

        let format = FileFormat::from_path(path)?;
        debug!("Detected file format: {:?}", format);

        let table = Self::from_reader(format.open(path)?, format, config)
            .with_context(|| format!("Failed to load cell table from {:?}", path))?;

        info!("Loaded {} cells", table.len());
        Ok(table)
    }

    /// Parse cell table from reader
    pub fn from_reader<R: Read>(reader: R, format: FileFormat, config: &MixingConfig) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        debug!("Headers: {:?}", headers);

        let column = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .with_context(|| format!("Missing required column: {}", name))
        };

        let group_idx = column(&config.group_column)?;
        let patient_idx = column(&config.patient_column)?;
        let neighborhood_idx = column(&config.neighborhood_column)?;
        let id_idx = config.id_column.as_deref().map(column).transpose()?;

        let mut cells = Vec::new();
        for (row, result) in csv_reader.records().enumerate() {
            let record = result.context("Failed to parse CSV record")?;
            let line = row + 2;
            let field = |idx: usize| record.get(idx).unwrap_or("").trim();

            let id = match id_idx {
                Some(idx) => field(idx)
                    .parse::<CellId>()
                    .with_context(|| format!("Invalid cell identifier at line {}", line))?,
                None => row as CellId,
            };
            let neighborhood = parse_label(field(neighborhood_idx))
                .with_context(|| format!("Invalid neighborhood label at line {}", line))?;

            cells.push(CellAssignment {
                id,
                group: field(group_idx).to_string(),
                patient: field(patient_idx).to_string(),
                neighborhood,
            });
        }

        Self::new(cells)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[CellAssignment] {
        &self.cells
    }

    /// Row position of a cell identifier
    pub fn position(&self, id: CellId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Cell with the given identifier
    pub fn get(&self, id: CellId) -> Option<&CellAssignment> {
        self.position(id).map(|pos| &self.cells[pos])
    }
}

/// Parse an integer neighborhood label, accepting integral floats such as `4.0`
fn parse_label(s: &str) -> Result<Neighborhood> {
    if let Ok(v) = s.parse::<Neighborhood>() {
        return Ok(v);
    }
    let v: f64 = s.parse().with_context(|| format!("not a number: {:?}", s))?;
    if v.fract() != 0.0 || !v.is_finite() {
        bail!("not an integer label: {:?}", s);
    }
    Ok(v as Neighborhood)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_file_format_detection() {
        assert_eq!(FileFormat::from_path("cells.csv").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path("cells.tsv").unwrap(), FileFormat::Tsv);
        assert_eq!(FileFormat::from_path("cells.csv.gz").unwrap(), FileFormat::GzippedCsv);
        assert_eq!(FileFormat::from_path("cells.tsv.gz").unwrap(), FileFormat::GzippedTsv);
        assert!(FileFormat::from_path("cells.pkl").is_err());
    }

    #[test]
    fn test_positional_ids() {
        let csv_data = "X:X,groups,patients,neighborhood10\n1.0,A,P1,4\n2.0,A,P1,0.0\n3.0,B,P2,4";
        let table =
            CellTable::from_reader(Cursor::new(csv_data), FileFormat::Csv, &MixingConfig::default()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(1).unwrap().neighborhood, 0);
        assert_eq!(table.get(2).unwrap().group_key(), GroupKey::new("B", "P2"));
        assert!(table.get(3).is_none());
    }

    #[test]
    fn test_explicit_id_column() {
        let config = MixingConfig {
            id_column: Some("cell".to_string()),
            ..MixingConfig::default()
        };
        let tsv_data = "cell\tgroups\tpatients\tneighborhood10\n100\tA\tP1\t4\n7\tA\tP1\t1";
        let table = CellTable::from_reader(Cursor::new(tsv_data), FileFormat::Tsv, &config).unwrap();

        assert_eq!(table.position(100), Some(0));
        assert_eq!(table.position(7), Some(1));
        assert_eq!(table.position(0), None);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let config = MixingConfig {
            id_column: Some("cell".to_string()),
            ..MixingConfig::default()
        };
        let csv_data = "cell,groups,patients,neighborhood10\n1,A,P1,4\n1,A,P1,0";
        let err = CellTable::from_reader(Cursor::new(csv_data), FileFormat::Csv, &config).unwrap_err();
        assert!(err.to_string().contains("Duplicate cell identifier"));
    }

    #[test]
    fn test_missing_column() {
        let csv_data = "groups,patients\nA,P1";
        let err = CellTable::from_reader(Cursor::new(csv_data), FileFormat::Csv, &MixingConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("neighborhood10"));
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("4").unwrap(), 4);
        assert_eq!(parse_label("4.0").unwrap(), 4);
        assert!(parse_label("4.5").is_err());
        assert!(parse_label("").is_err());
    }
}
