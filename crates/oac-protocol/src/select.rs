//! Row selection directives: `closest`, `item` and `first`.

use crate::arguments::Directives;
use crate::types::Observation;

/// How surviving rows of one quantity are narrowed.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Keep every row.
    All,

    /// Keep only the n-th row (0-indexed).
    Item(usize),

    /// For each `(attribute, target)` keep the row nearest the target.
    Closest(Vec<(String, f64)>),
}

impl Selection {
    /// Pick the selection for an event.
    ///
    /// Priority is `closest` > `item` > `first`. `closest` without any
    /// numeric target has no effect and falls through to the next one.
    pub fn choose(directives: &Directives, closest_targets: Vec<(String, f64)>) -> Self {
        if directives.closest && !closest_targets.is_empty() {
            Selection::Closest(closest_targets)
        } else if let Some(n) = directives.item {
            Selection::Item(n)
        } else if directives.first {
            Selection::Item(0)
        } else {
            Selection::All
        }
    }

    /// Apply to rows in source order.
    pub fn apply<'e>(&self, rows: &[&'e Observation]) -> Vec<&'e Observation> {
        match self {
            Selection::All => rows.to_vec(),
            Selection::Item(n) => rows.get(*n).copied().into_iter().collect(),
            Selection::Closest(targets) => {
                let mut picks: Vec<usize> = targets
                    .iter()
                    .filter_map(|(key, target)| closest_index(rows, key, *target))
                    .collect();
                picks.sort_unstable();
                picks.dedup();
                picks.into_iter().map(|i| rows[i]).collect()
            }
        }
    }
}

/// Index of the row whose `key` is numerically nearest `target`.
///
/// List values use their mean. Rows without a numeric value are skipped;
/// ties go to the earliest row.
pub fn closest_index(rows: &[&Observation], key: &str, target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, obs) in rows.iter().enumerate() {
        let Some(value) = obs.get(key).and_then(|v| v.numeric_mean()) else {
            continue;
        };
        let distance = (value - target).abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}
