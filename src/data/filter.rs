use std::collections::{BTreeMap, BTreeSet};

use super::model::{LightCurveSet, MetaValue};

// ---------------------------------------------------------------------------
// Filter predicate: which unique values are selected per metadata column
// ---------------------------------------------------------------------------

/// Per-column selection state: column name → set of selected values.
/// A column missing from the map imposes no constraint; an empty set
/// means "nothing selected" and hides every curve.
pub type FilterState = BTreeMap<String, BTreeSet<MetaValue>>;

/// Initialise a [`FilterState`] with every value selected (show all).
pub fn init_filter_state(set: &LightCurveSet) -> FilterState {
    set.unique_values
        .iter()
        .map(|(col, vals)| (col.clone(), vals.clone()))
        .collect()
}

/// Return indices of curves passing all active filters.
///
/// A curve passes a column filter when:
/// * the column is absent from `filters` → passes (no constraint)
/// * the selected set is empty → fails (nothing selected)
/// * the curve's value for that column is in the selected set → passes
/// * the curve lacks the column → passes only if `Null` is selected
pub fn filtered_indices(set: &LightCurveSet, filters: &FilterState) -> Vec<usize> {
    set.curves
        .iter()
        .enumerate()
        .filter(|(_, curve)| {
            filters
                .iter()
                .all(|(col, selected)| column_allows(set, selected, curve.metadata.get(col), col))
        })
        .map(|(i, _)| i)
        .collect()
}

/// Does one column's selection admit a curve carrying `value` there?
fn column_allows(
    set: &LightCurveSet,
    selected: &BTreeSet<MetaValue>,
    value: Option<&MetaValue>,
    col: &str,
) -> bool {
    if selected.is_empty() {
        return false;
    }
    // A selection covering every known value imposes no constraint, which
    // also admits curves that predate the column.
    let full = set
        .unique_values
        .get(col)
        .is_some_and(|all| all.iter().all(|v| selected.contains(v)));
    if full {
        return true;
    }
    match value {
        Some(val) => selected.contains(val),
        None => selected.contains(&MetaValue::Null),
    }
}
