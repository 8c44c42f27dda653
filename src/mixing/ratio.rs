use crate::mixing::counts::NeighborhoodCounts;
use crate::mixing::{MixingRow, NearestNeighborhood, Neighborhood};
use tracing::{debug, warn};

/// Mixing ratio between neighborhoods `a` and `b` for every (group, patient).
///
/// The intersection is the mean of the directional counts a→b and b→a that
/// exist for the patient (a direction exists only if its origin neighborhood
/// has cells there). The whole is the combined population of `a` and `b`.
/// Patients with neither neighborhood are dropped.
pub fn mixing_ratios(counts: &NeighborhoodCounts, a: Neighborhood, b: Neighborhood) -> Vec<MixingRow> {
    let mut rows = Vec::new();

    for key in counts.group_keys() {
        let directional: Vec<usize> = [
            counts.adjacency(key, a, NearestNeighborhood::Label(b)),
            counts.adjacency(key, b, NearestNeighborhood::Label(a)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if directional.is_empty() {
            debug!("{} / {}: neither {} nor {} present", key.group, key.patient, a, b);
            continue;
        }

        let intersection = directional.iter().sum::<usize>() as f64 / directional.len() as f64;
        let whole = counts.population(key, a).unwrap_or(0) + counts.population(key, b).unwrap_or(0);
        let ratio = intersection / whole as f64;
        let exceeds_unit = ratio > 1.0;

        if exceeds_unit {
            warn!(
                "{} / {}: mixing ratio {:.4} exceeds 1 (intersection {}, whole {})",
                key.group, key.patient, ratio, intersection, whole
            );
        }

        rows.push(MixingRow {
            group: key.group.clone(),
            patient: key.patient.clone(),
            intersection,
            whole,
            ratio,
            exceeds_unit,
        });
    }

    rows
}
