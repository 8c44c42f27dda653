pub mod loader;
pub mod summary;
pub mod writer;

use serde::{Deserialize, Serialize};

/// Number of cell types with a fixed name and color
pub const NUM_KNOWN_TYPES: usize = 7;

/// Color used for type codes outside the lookup table
pub const UNKNOWN_COLOR: Rgb = Rgb(128, 128, 128);

/// Cell type lookup: numeric type code -> (name, color)
pub static CELL_TYPES: [(&str, Rgb); NUM_KNOWN_TYPES] = [
    ("Undefined", Rgb(0, 0, 0)),
    ("Epithelium (PD-L1lo/ki67lo)", Rgb(56, 127, 57)),
    ("Epithelium (PD-L1hi/ki67hi)", Rgb(0, 255, 0)),
    ("Macrophage", Rgb(252, 141, 98)),
    ("Lymphocyte", Rgb(255, 217, 47)),
    ("Vascular", Rgb(69, 53, 193)),
    ("Fibroblast/Stroma", Rgb(23, 190, 207)),
];

/// RGB color triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Cell type resolved from a numeric code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellType {
    /// Numeric code as written by the segmentation model
    pub code: i64,
    /// Human-readable cluster name
    pub name: String,
    /// Display color
    pub color: Rgb,
    /// Whether the code was found in the lookup table
    pub known: bool,
}

impl CellType {
    /// Map a numeric type code to its name and color
    pub fn from_code(code: i64) -> Self {
        match usize::try_from(code).ok().and_then(|i| CELL_TYPES.get(i)) {
            Some(&(name, color)) => Self {
                code,
                name: name.to_string(),
                color,
                known: true,
            },
            None => Self {
                code,
                name: format!("Unknown_Type_{}", code),
                color: UNKNOWN_COLOR,
                known: false,
            },
        }
    }
}

/// One row of the converted cell table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    #[serde(rename = "X:X")]
    pub x: f64,
    #[serde(rename = "Y:Y")]
    pub y: f64,
    /// Region identifier consumed by the neighborhood scripts
    #[serde(rename = "File Name")]
    pub file_name: String,
    #[serde(rename = "ClusterName")]
    pub cluster_name: String,
    #[serde(rename = "type")]
    pub cell_type: i64,
    pub type_prob: f64,
    pub tile: String,
    #[serde(rename = "color_R")]
    pub color_r: u8,
    #[serde(rename = "color_G")]
    pub color_g: u8,
    #[serde(rename = "color_B")]
    pub color_b: u8,
}

impl CellRecord {
    /// Build a record for a cell found in `tile`
    pub fn new(tile: &str, x: f64, y: f64, cell_type: &CellType, type_prob: f64) -> Self {
        let Rgb(r, g, b) = cell_type.color;
        Self {
            x,
            y,
            file_name: tile.to_string(),
            cluster_name: cell_type.name.clone(),
            cell_type: cell_type.code,
            type_prob,
            tile: tile.to_string(),
            color_r: r,
            color_g: g,
            color_b: b,
        }
    }
}

/// Nucleus entry inside a tile's "nuc" mapping.
///
/// Every field is optional so that incomplete detections can be skipped
/// instead of failing the whole tile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NucleusEntry {
    #[serde(default)]
    pub centroid: Option<Vec<Option<f64>>>,
    #[serde(default, rename = "type")]
    pub cell_type: Option<i64>,
    #[serde(default)]
    pub type_prob: Option<f64>,
}

impl NucleusEntry {
    /// Centroid as (x, y) if both coordinates are present
    pub fn position(&self) -> Option<(f64, f64)> {
        match self.centroid.as_deref() {
            Some([Some(x), Some(y), ..]) => Some((*x, *y)),
            _ => None,
        }
    }
}

/// Conversion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// File name prefix of tile files
    pub prefix: String,
    /// File extension of tile files
    pub extension: String,
    /// Output CSV path
    pub output: std::path::PathBuf,
    /// Optional gzip snapshot path
    pub snapshot: Option<std::path::PathBuf>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            prefix: "tile_".to_string(),
            extension: "json".to_string(),
            output: "main_fcs_csv.csv".into(),
            snapshot: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_types() {
        let expected = [
            (0, "Undefined", Rgb(0, 0, 0)),
            (1, "Epithelium (PD-L1lo/ki67lo)", Rgb(56, 127, 57)),
            (2, "Epithelium (PD-L1hi/ki67hi)", Rgb(0, 255, 0)),
            (3, "Macrophage", Rgb(252, 141, 98)),
            (4, "Lymphocyte", Rgb(255, 217, 47)),
            (5, "Vascular", Rgb(69, 53, 193)),
            (6, "Fibroblast/Stroma", Rgb(23, 190, 207)),
        ];

        for (code, name, color) in expected {
            let ct = CellType::from_code(code);
            assert!(ct.known);
            assert_eq!(ct.name, name);
            assert_eq!(ct.color, color);
        }
    }

    #[test]
    fn test_unknown_type() {
        let ct = CellType::from_code(9);
        assert!(!ct.known);
        assert_eq!(ct.name, "Unknown_Type_9");
        assert_eq!(ct.color, Rgb(128, 128, 128));

        let negative = CellType::from_code(-1);
        assert_eq!(negative.name, "Unknown_Type_-1");
        assert_eq!(negative.color, UNKNOWN_COLOR);
    }

    #[test]
    fn test_nucleus_position() {
        let entry: NucleusEntry =
            serde_json::from_str(r#"{"centroid": [10.5, 20.0], "type": 3}"#).unwrap();
        assert_eq!(entry.position(), Some((10.5, 20.0)));
        assert_eq!(entry.type_prob, None);

        let partial: NucleusEntry =
            serde_json::from_str(r#"{"centroid": [null, 2.0], "type": 1}"#).unwrap();
        assert_eq!(partial.position(), None);

        let short: NucleusEntry = serde_json::from_str(r#"{"centroid": [1.0]}"#).unwrap();
        assert_eq!(short.position(), None);
    }

    #[test]
    fn test_record_from_type() {
        let ct = CellType::from_code(4);
        let record = CellRecord::new("tile_1_2", 1.0, 2.0, &ct, 0.75);
        assert_eq!(record.file_name, "tile_1_2");
        assert_eq!(record.tile, "tile_1_2");
        assert_eq!(record.cluster_name, "Lymphocyte");
        assert_eq!((record.color_r, record.color_g, record.color_b), (255, 217, 47));
    }
}
