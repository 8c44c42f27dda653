use crate::mixing::neighbors::{flatten, NeighborIndex};
use crate::mixing::table::CellTable;
use crate::mixing::NearestNeighborhood;
use anyhow::{bail, Result};
use tracing::{debug, warn};

/// Nearest-neighbor neighborhood of every cell, in table row order
#[derive(Debug, Clone)]
pub struct NearestAssignment {
    pub nearest: Vec<NearestNeighborhood>,
    /// Cells named as an origin at least once
    pub assigned: usize,
    /// Origin rows that overwrote an earlier assignment
    pub reassigned: usize,
}

impl NearestAssignment {
    pub fn unassigned(&self) -> usize {
        self.nearest.len() - self.assigned
    }
}

/// Give each origin cell the neighborhood of its nearest neighbor.
///
/// Indices resolve through the table's identifiers; an index with no
/// matching cell fails the join. When an origin appears more than once the
/// last row wins.
pub fn assign_nearest_neighborhoods(
    table: &CellTable,
    regions: &[NeighborIndex],
) -> Result<NearestAssignment> {
    let cells = table.cells();
    let mut nearest = vec![NearestNeighborhood::Unassigned; cells.len()];
    let mut seen = vec![false; cells.len()];
    let mut assigned = 0;
    let mut reassigned = 0;

    for (region, pair) in flatten(regions) {
        let origin = match table.position(pair.origin) {
            Some(pos) => pos,
            None => bail!(
                "Region {}: origin index {} matches no cell in the table ({} cells)",
                region,
                pair.origin,
                cells.len()
            ),
        };
        let neighbor = match table.position(pair.neighbor) {
            Some(pos) => pos,
            None => bail!(
                "Region {}: neighbor index {} matches no cell in the table ({} cells)",
                region,
                pair.neighbor,
                cells.len()
            ),
        };

        nearest[origin] = NearestNeighborhood::Label(cells[neighbor].neighborhood);
        if seen[origin] {
            reassigned += 1;
        } else {
            seen[origin] = true;
            assigned += 1;
        }
    }

    if reassigned > 0 {
        warn!("{} origin cells appeared more than once; last neighbor kept", reassigned);
    }
    debug!(
        "Assigned nearest neighborhood to {} of {} cells",
        assigned,
        cells.len()
    );

    Ok(NearestAssignment {
        nearest,
        assigned,
        reassigned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixing::table::CellAssignment;

    fn table(neighborhoods: &[(u64, i64)]) -> CellTable {
        CellTable::new(
            neighborhoods
                .iter()
                .map(|&(id, neighborhood)| CellAssignment {
                    id,
                    group: "g".to_string(),
                    patient: "p".to_string(),
                    neighborhood,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_assign_by_identifier() {
        let table = table(&[(10, 1), (20, 2), (30, 3)]);
        let regions = vec![NeighborIndex::from_pairs("r0", &[(10, 30), (30, 20)])];

        let result = assign_nearest_neighborhoods(&table, &regions).unwrap();

        assert_eq!(
            result.nearest,
            vec![
                NearestNeighborhood::Label(3),
                NearestNeighborhood::Unassigned,
                NearestNeighborhood::Label(2),
            ]
        );
        assert_eq!(result.assigned, 2);
        assert_eq!(result.unassigned(), 1);
    }

    #[test]
    fn test_unknown_index_rejected() {
        let table = table(&[(0, 1), (1, 1)]);

        let bad_neighbor = vec![NeighborIndex::from_pairs("r0", &[(0, 2)])];
        let err = assign_nearest_neighborhoods(&table, &bad_neighbor).unwrap_err();
        assert!(err.to_string().contains("neighbor index 2"));

        let bad_origin = vec![NeighborIndex::from_pairs("r1", &[(5, 0)])];
        let err = assign_nearest_neighborhoods(&table, &bad_origin).unwrap_err();
        assert!(err.to_string().contains("Region r1"));
    }

    #[test]
    fn test_last_duplicate_wins() {
        let table = table(&[(0, 1), (1, 2), (2, 3)]);
        let regions = vec![
            NeighborIndex::from_pairs("r0", &[(0, 1)]),
            NeighborIndex::from_pairs("r1", &[(0, 2)]),
        ];

        let result = assign_nearest_neighborhoods(&table, &regions).unwrap();
        assert_eq!(result.nearest[0], NearestNeighborhood::Label(3));
        assert_eq!(result.assigned, 1);
        assert_eq!(result.reassigned, 1);
    }
}
