use crate::tiles::CellRecord;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Column order of the converted cell table
pub const CELL_TABLE_COLUMNS: [&str; 10] = [
    "X:X", "Y:Y", "File Name", "ClusterName", "type", "type_prob", "tile",
    "color_R", "color_G", "color_B",
];

/// Write cell records as CSV to any writer
pub fn write_records<W: Write>(records: &[CellRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    if records.is_empty() {
        csv_writer.write_record(CELL_TABLE_COLUMNS)?;
    }
    for record in records {
        csv_writer.serialize(record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Save cell records to a CSV file
pub fn write_csv<P: AsRef<Path>>(records: &[CellRecord], path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {:?}", path))?;

    write_records(records, BufWriter::new(file))
        .with_context(|| format!("Failed to write CSV: {:?}", path))?;

    info!("Saved {} rows to {:?}", records.len(), path);
    Ok(())
}

/// Save a gzip-compressed JSON snapshot of the table
pub fn write_snapshot<P: AsRef<Path>>(records: &[CellRecord], path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create snapshot: {:?}", path))?;

    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, records).context("Failed to serialize snapshot")?;
    encoder
        .finish()
        .and_then(|mut w| w.flush())
        .context("Failed to finish snapshot")?;

    info!("Also saved snapshot: {:?}", path);
    Ok(())
}

/// Load a snapshot written by [`write_snapshot`]
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Vec<CellRecord>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open snapshot: {:?}", path))?;

    let records = serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
        .with_context(|| format!("Failed to read snapshot: {:?}", path))?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::CellType;
    use tempfile::TempDir;

    fn sample_records() -> Vec<CellRecord> {
        vec![
            CellRecord::new("tile_1_1", 10.5, 20.25, &CellType::from_code(1), 0.8),
            CellRecord::new("tile_1_1", 30.0, 40.0, &CellType::from_code(12), 0.0),
        ]
    }

    #[test]
    fn test_csv_header_and_rows() {
        let mut buffer = Vec::new();
        write_records(&sample_records(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();

        assert_eq!(lines.next().unwrap(), CELL_TABLE_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "10.5,20.25,tile_1_1,Epithelium (PD-L1lo/ki67lo),1,0.8,tile_1_1,56,127,57"
        );
        assert_eq!(
            lines.next().unwrap(),
            "30.0,40.0,tile_1_1,Unknown_Type_12,12,0.0,tile_1_1,128,128,128"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let mut buffer = Vec::new();
        write_records(&[], &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.trim_end(), CELL_TABLE_COLUMNS.join(","));
    }

    #[test]
    fn test_snapshot_restores_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main_fcs.json.gz");
        let records = sample_records();

        write_snapshot(&records, &path).unwrap();
        let restored = read_snapshot(&path).unwrap();

        assert_eq!(restored, records);
    }
}
