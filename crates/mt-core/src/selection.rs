//! Per-event stages ahead of emission: selection, ordering, vertex context.

use crate::event::{Muon, Vertex};
use crate::quality::{Quality, QualitySelector};

/// Why candidates were dropped during selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub candidates: usize,
    pub dangling: usize,
    pub no_track: usize,
    /// NaN or infinite pt; such muons cannot be ordered.
    pub bad_pt: usize,
    pub below_quality: usize,
    pub selected: usize,
}

/// Keep muons that are present, carry an inner-detector track, have a
/// finite pt and reach `min_quality`. Container order is preserved.
pub fn select_muons<'e>(
    candidates: &'e [Option<Muon>],
    selector: &dyn QualitySelector,
    min_quality: Quality,
) -> (Vec<&'e Muon>, SelectionStats) {
    let mut stats = SelectionStats {
        candidates: candidates.len(),
        ..SelectionStats::default()
    };
    let mut selected = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let Some(muon) = candidate else {
            stats.dangling += 1;
            continue;
        };
        if muon.track().is_none() {
            stats.no_track += 1;
            continue;
        }
        if !muon.pt.is_finite() {
            stats.bad_pt += 1;
            tracing::debug!(pt = muon.pt, "skipping muon with non-finite pt");
            continue;
        }
        if selector.quality(muon) < min_quality {
            stats.below_quality += 1;
            continue;
        }
        selected.push(muon);
    }

    stats.selected = selected.len();
    (selected, stats)
}

/// Order by descending pt. The sort is stable: exactly equal pt keeps
/// selection order.
pub fn sort_by_pt_desc(muons: &mut [&Muon]) {
    muons.sort_by(|a, b| b.pt.total_cmp(&a.pt));
}

/// Longitudinal position of every primary vertex, in container order.
pub fn extract_vertex_z(vertices: &[Vertex]) -> Vec<f32> {
    vertices.iter().map(|v| v.z).collect()
}
