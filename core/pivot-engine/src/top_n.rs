//! FILENAME: core/pivot-engine/src/top_n.rs
//! Top-N reduction of a materialized result for display.
//!
//! Groups on an axis are ranked by magnitude, the sum of their numeric
//! leaves (cells, or the axis totals when the other axis has no keys). The
//! N largest are kept in descending order; the rest collapse into a single
//! trailing "Others" group whose leaves are the numeric sums of the
//! collapsed ones. An axis with N or fewer groups is returned unchanged.
//! If a retained group is itself keyed "Others", the synthetic group takes
//! the first free label of "Others (2)", "Others (3)" and so on.

use std::collections::BTreeMap;

use smallvec::smallvec;

use crate::aggregator::AggregateValue;
use crate::definition::Axis;
use crate::engine::AxisKey;
use crate::format::NumberFormat;
use crate::log_debug;
use crate::result::{Leaf, PivotResult};

pub const OTHERS_LABEL: &str = "Others";

/// Reduces rows, then columns, to at most `n` named groups each.
pub fn reduce(result: &PivotResult, n: usize) -> PivotResult {
    let rows = reduce_axis(result, Axis::Rows, n);
    reduce_axis(&rows, Axis::Cols, n)
}

pub fn reduce_axis(result: &PivotResult, axis: Axis, n: usize) -> PivotResult {
    match axis {
        Axis::Rows => reduce_rows(result, n),
        Axis::Cols => transpose(&reduce_rows(&transpose(result), n)),
    }
}

/// Magnitude of every group on `axis`, aligned with that axis' keys.
pub fn axis_magnitudes(result: &PivotResult, axis: Axis) -> Vec<f64> {
    match axis {
        Axis::Rows => row_magnitudes(result),
        Axis::Cols => row_magnitudes(&transpose(result)),
    }
}

fn numeric_sum(leaves: &[Leaf]) -> f64 {
    leaves.iter().filter_map(|leaf| leaf.value.as_number()).sum()
}

fn row_magnitudes(result: &PivotResult) -> Vec<f64> {
    (0..result.row_keys.len())
        .map(|r| {
            if result.col_keys.is_empty() {
                result.row_totals.get(r).map_or(0.0, |leaves| numeric_sum(leaves))
            } else {
                result
                    .tree
                    .get(&r)
                    .map_or(0.0, |cols| cols.values().map(|leaves| numeric_sum(leaves)).sum())
            }
        })
        .collect()
}

/// Per-aggregator running sums for the Others group. `None` until a
/// numeric leaf is seen.
fn accumulate(sums: &mut [Option<f64>], leaves: &[Leaf]) {
    for (sum, leaf) in sums.iter_mut().zip(leaves) {
        if let Some(x) = leaf.value.as_number() {
            *sum = Some(sum.unwrap_or(0.0) + x);
        }
    }
}

fn to_leaves(sums: Vec<Option<f64>>) -> Vec<Leaf> {
    let fmt = NumberFormat::us();
    sums.into_iter()
        .map(|sum| {
            let value = sum.map_or(AggregateValue::Null, AggregateValue::number);
            let formatted = value.render(&fmt);
            Leaf { value, formatted }
        })
        .collect()
}

/// Single-part key for the collapsed group, distinct from every kept key.
fn others_key(kept: &[AxisKey]) -> AxisKey {
    let taken = |label: &str| kept.iter().any(|k| k.len() == 1 && k[0] == label);
    let mut label = OTHERS_LABEL.to_string();
    let mut suffix = 2;
    while taken(&label) {
        label = format!("{} ({})", OTHERS_LABEL, suffix);
        suffix += 1;
    }
    smallvec![label]
}

fn reduce_rows(result: &PivotResult, n: usize) -> PivotResult {
    let count = result.row_keys.len();
    if count <= n {
        return result.clone();
    }

    let magnitudes = row_magnitudes(result);
    let mut order: Vec<usize> = (0..count).collect();
    // Stable: equal magnitudes keep their existing order.
    order.sort_by(|&a, &b| magnitudes[b].total_cmp(&magnitudes[a]));
    let (kept, dropped) = order.split_at(n);
    let width = result.aggregator_names.len();

    let mut row_keys: Vec<AxisKey> = kept.iter().map(|&r| result.row_keys[r].clone()).collect();
    let others = others_key(&row_keys);
    row_keys.push(others.clone());

    let mut tree: BTreeMap<usize, BTreeMap<usize, Vec<Leaf>>> = BTreeMap::new();
    for (new_r, old_r) in kept.iter().enumerate() {
        if let Some(cols) = result.tree.get(old_r) {
            tree.insert(new_r, cols.clone());
        }
    }

    let mut others_cells: BTreeMap<usize, Vec<Option<f64>>> = BTreeMap::new();
    let mut others_total = vec![None; width];
    for old_r in dropped {
        if let Some(cols) = result.tree.get(old_r) {
            for (&c, leaves) in cols {
                accumulate(others_cells.entry(c).or_insert_with(|| vec![None; width]), leaves);
            }
        }
        if let Some(leaves) = result.row_totals.get(*old_r) {
            accumulate(&mut others_total, leaves);
        }
    }
    if !others_cells.is_empty() {
        let cells = others_cells
            .into_iter()
            .map(|(c, sums)| (c, to_leaves(sums)))
            .collect();
        tree.insert(n, cells);
    }

    let mut row_totals: Vec<Vec<Leaf>> = kept
        .iter()
        .map(|&r| result.row_totals.get(r).cloned().unwrap_or_default())
        .collect();
    row_totals.push(to_leaves(others_total));

    log_debug!(
        "TOPN",
        "kept {} of {} groups, {} collapsed into {}",
        n,
        count,
        dropped.len(),
        others[0]
    );

    PivotResult {
        row_keys,
        col_keys: result.col_keys.clone(),
        aggregator_names: result.aggregator_names.clone(),
        tree,
        row_totals,
        col_totals: result.col_totals.clone(),
        grand_total: result.grand_total.clone(),
    }
}

/// Swaps the axes so column reduction can reuse the row path.
fn transpose(result: &PivotResult) -> PivotResult {
    let mut tree: BTreeMap<usize, BTreeMap<usize, Vec<Leaf>>> = BTreeMap::new();
    for (&r, cols) in &result.tree {
        for (&c, leaves) in cols {
            tree.entry(c).or_default().insert(r, leaves.clone());
        }
    }
    PivotResult {
        row_keys: result.col_keys.clone(),
        col_keys: result.row_keys.clone(),
        aggregator_names: result.aggregator_names.clone(),
        tree,
        row_totals: result.col_totals.clone(),
        col_totals: result.row_totals.clone(),
        grand_total: result.grand_total.clone(),
    }
}
