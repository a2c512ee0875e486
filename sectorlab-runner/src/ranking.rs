//! Sector ranking and cross-sector average.

use crate::record::SectorCell;

/// Sectors with data, best first.
///
/// The sort is stable, so equal returns keep sector-definition order.
pub fn rank(cells: &[SectorCell]) -> Vec<&SectorCell> {
    let mut ranked: Vec<&SectorCell> = cells.iter().filter(|c| c.value.is_some()).collect();
    ranked.sort_by(|a, b| {
        let (a, b) = (a.value.unwrap_or(f64::NEG_INFINITY), b.value.unwrap_or(f64::NEG_INFINITY));
        b.total_cmp(&a)
    });
    ranked
}

/// Names of the best and second-best sectors. Either is `None` when fewer
/// sectors have data.
pub fn top_two(cells: &[SectorCell]) -> (Option<String>, Option<String>) {
    let ranked = rank(cells);
    let mut names = ranked.into_iter().map(|c| c.sector.clone());
    (names.next(), names.next())
}

/// Mean over sectors with data only; `None` when no sector has data.
pub fn average(cells: &[SectorCell]) -> Option<f64> {
    let values: Vec<f64> = cells.iter().filter_map(|c| c.value).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
