use crate::mixing::table::FileFormat;
use crate::mixing::CellId;
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use ndarray::{Array2, ArrayView2};
use ndarray_npy::ReadNpyExt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// A cell and its nearest neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborPair {
    pub origin: CellId,
    pub neighbor: CellId,
}

/// Nearest-neighbor index array of one region.
///
/// Column 0 of the source array is the origin cell, column 1 its nearest
/// neighbor; further neighbor columns are ignored.
#[derive(Debug, Clone)]
pub struct NeighborIndex {
    /// Region name (file stem when loaded from disk)
    pub region: String,
    pub pairs: Vec<NeighborPair>,
}

impl NeighborIndex {
    /// Build from explicit (origin, neighbor) pairs
    pub fn from_pairs(region: impl Into<String>, pairs: &[(CellId, CellId)]) -> Self {
        Self {
            region: region.into(),
            pairs: pairs
                .iter()
                .map(|&(origin, neighbor)| NeighborPair { origin, neighbor })
                .collect(),
        }
    }

    /// Build from a (cells × k) integer array
    pub fn from_array(region: impl Into<String>, array: ArrayView2<'_, i64>) -> Result<Self> {
        let region = region.into();
        if array.ncols() < 2 {
            bail!(
                "Region {}: neighbor array needs at least 2 columns, got {}",
                region,
                array.ncols()
            );
        }

        let mut pairs = Vec::with_capacity(array.nrows());
        for (row, values) in array.outer_iter().enumerate() {
            let origin = to_cell_id(values[0])
                .with_context(|| format!("Region {}: invalid origin at row {}", region, row))?;
            let neighbor = to_cell_id(values[1])
                .with_context(|| format!("Region {}: invalid neighbor at row {}", region, row))?;
            pairs.push(NeighborPair { origin, neighbor });
        }

        Ok(Self { region, pairs })
    }

    /// Load a region array from `.npy` or a headerless CSV/TSV of integers
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let region = region_name(path);

        let array = if path.extension().and_then(|e| e.to_str()) == Some("npy") {
            read_npy(path)?
        } else {
            let format = FileFormat::from_path(path)?;
            read_delimited(format.open(path)?, format)
                .with_context(|| format!("Failed to parse neighbor array {:?}", path))?
        };

        debug!("Region {}: {} x {} neighbor array", region, array.nrows(), array.ncols());
        Self::from_array(region, array.view())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Load every region array in order
pub fn load_regions<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<NeighborIndex>> {
    let regions = paths
        .iter()
        .map(|p| NeighborIndex::load(p))
        .collect::<Result<Vec<_>>>()?;

    let total: usize = regions.iter().map(NeighborIndex::len).sum();
    info!("Loaded {} regions with {} neighbor rows", regions.len(), total);
    Ok(regions)
}

/// Flatten region arrays into a single sequence of pairs
pub fn flatten(regions: &[NeighborIndex]) -> impl Iterator<Item = (&str, NeighborPair)> + '_ {
    regions
        .iter()
        .flat_map(|r| r.pairs.iter().map(move |&p| (r.region.as_str(), p)))
}

fn to_cell_id(value: i64) -> Result<CellId> {
    CellId::try_from(value).map_err(|_| anyhow::anyhow!("negative cell index {}", value))
}

fn region_name(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    name.split('.').next().unwrap_or(name).to_string()
}

/// Read a `.npy` array, accepting 64- or 32-bit signed integers
fn read_npy(path: &Path) -> Result<Array2<i64>> {
    let open = || File::open(path).with_context(|| format!("Failed to open {:?}", path));

    match Array2::<i64>::read_npy(BufReader::new(open()?)) {
        Ok(array) => Ok(array),
        Err(wide_err) => {
            debug!("{:?} is not int64 ({}), trying int32", path, wide_err);
            let narrow = Array2::<i32>::read_npy(BufReader::new(open()?))
                .with_context(|| format!("Failed to read npy array {:?}: {}", path, wide_err))?;
            Ok(narrow.mapv(i64::from))
        }
    }
}

fn read_delimited<R: Read>(reader: R, format: FileFormat) -> Result<Array2<i64>> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(format.delimiter())
        .has_headers(false)
        .flexible(false)
        .from_reader(reader);

    let mut values = Vec::new();
    let mut ncols = 0;
    let mut nrows = 0;
    for result in csv_reader.records() {
        let record = result.context("Failed to parse CSV record")?;
        ncols = record.len();
        for field in record.iter() {
            let v = field
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Invalid index {:?} at row {}", field, nrows))?;
            values.push(v);
        }
        nrows += 1;
    }

    Array2::from_shape_vec((nrows, ncols), values).context("Ragged neighbor array")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::WriteNpyExt;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_from_array_uses_first_two_columns() {
        let a = array![[0i64, 3, 5], [1, 2, 4]];
        let index = NeighborIndex::from_array("r0", a.view()).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.pairs[0], NeighborPair { origin: 0, neighbor: 3 });
        assert_eq!(index.pairs[1], NeighborPair { origin: 1, neighbor: 2 });
    }

    #[test]
    fn test_from_array_rejects_bad_shapes() {
        let narrow = array![[0i64], [1]];
        assert!(NeighborIndex::from_array("r0", narrow.view()).is_err());

        let negative = array![[0i64, -1]];
        assert!(NeighborIndex::from_array("r0", negative.view()).is_err());
    }

    #[test]
    fn test_read_delimited() {
        let data = "0,1,2\n1,0,2\n2,1,0\n";
        let array = read_delimited(Cursor::new(data), FileFormat::Csv).unwrap();
        assert_eq!(array.shape(), &[3, 3]);
        assert_eq!(array[[2, 1]], 1);

        let ragged = "0,1\n1\n";
        assert!(read_delimited(Cursor::new(ragged), FileFormat::Csv).is_err());
    }

    #[test]
    fn test_load_npy_and_csv() {
        let dir = TempDir::new().unwrap();

        let npy_path = dir.path().join("region_a.npy");
        let a = array![[0i64, 1], [1, 0]];
        a.write_npy(File::create(&npy_path).unwrap()).unwrap();

        let npy32_path = dir.path().join("region_b.npy");
        let b = array![[2i32, 3], [3, 2]];
        b.write_npy(File::create(&npy32_path).unwrap()).unwrap();

        let csv_path = dir.path().join("region_c.csv");
        std::fs::write(&csv_path, "4,5\n5,4\n").unwrap();

        let regions = load_regions(&[npy_path, npy32_path, csv_path]).unwrap();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].region, "region_a");
        assert_eq!(regions[1].pairs[0], NeighborPair { origin: 2, neighbor: 3 });
        assert_eq!(regions[2].pairs[1], NeighborPair { origin: 5, neighbor: 4 });

        let flat: Vec<_> = flatten(&regions).collect();
        assert_eq!(flat.len(), 6);
        assert_eq!(flat[4].0, "region_c");
    }
}
