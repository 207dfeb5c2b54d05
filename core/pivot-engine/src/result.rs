//! FILENAME: core/pivot-engine/src/result.rs
//! Materialized Result - a plain, serializable snapshot of a computed tree.
//!
//! This is the only payload that crosses the offload boundary and the only
//! thing the result cache stores. Leaves are aligned with
//! `aggregator_names`; the cell tree is sparse and indexed by the position
//! of each key in `row_keys` / `col_keys`.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::aggregator::AggregateValue;
use crate::definition::PivotConfig;
use crate::engine::{AxisKey, PivotData};
use crate::error::{panic_message, PivotError};
use crate::value::Record;
use crate::{log_debug, log_error};

/// One aggregator's value at one coordinate, with its display string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub value: AggregateValue,
    pub formatted: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotResult {
    pub row_keys: Vec<AxisKey>,
    pub col_keys: Vec<AxisKey>,
    pub aggregator_names: Vec<String>,
    /// Row index -> column index -> leaves. Only populated cells appear.
    pub tree: BTreeMap<usize, BTreeMap<usize, Vec<Leaf>>>,
    /// Aligned with `row_keys`.
    pub row_totals: Vec<Vec<Leaf>>,
    /// Aligned with `col_keys`.
    pub col_totals: Vec<Vec<Leaf>>,
    pub grand_total: Vec<Leaf>,
}

impl PivotResult {
    pub fn row_index(&self, key: &[String]) -> Option<usize> {
        self.row_keys.iter().position(|k| k.as_slice() == key)
    }

    pub fn col_index(&self, key: &[String]) -> Option<usize> {
        self.col_keys.iter().position(|k| k.as_slice() == key)
    }

    pub fn aggregator_index(&self, name: &str) -> Option<usize> {
        self.aggregator_names.iter().position(|n| n == name)
    }

    /// Leaves at a coordinate; empty keys address margins and the grand
    /// total the same way `PivotData::get_aggregator` does.
    pub fn leaves(&self, row_key: &[String], col_key: &[String]) -> Option<&[Leaf]> {
        match (row_key.is_empty(), col_key.is_empty()) {
            (true, true) => Some(&self.grand_total),
            (false, true) => self.row_total(row_key),
            (true, false) => self.col_total(col_key),
            (false, false) => {
                let r = self.row_index(row_key)?;
                let c = self.col_index(col_key)?;
                self.tree.get(&r)?.get(&c).map(Vec::as_slice)
            }
        }
    }

    pub fn cell(&self, row_key: &[String], col_key: &[String], name: &str) -> Option<&Leaf> {
        let i = self.aggregator_index(name)?;
        self.leaves(row_key, col_key)?.get(i)
    }

    pub fn row_total(&self, row_key: &[String]) -> Option<&[Leaf]> {
        let r = self.row_index(row_key)?;
        self.row_totals.get(r).map(Vec::as_slice)
    }

    pub fn col_total(&self, col_key: &[String]) -> Option<&[Leaf]> {
        let c = self.col_index(col_key)?;
        self.col_totals.get(c).map(Vec::as_slice)
    }

    /// Grand-total leaf for `name`.
    pub fn grand(&self, name: &str) -> Option<&Leaf> {
        let i = self.aggregator_index(name)?;
        self.grand_total.get(i)
    }
}

// ============================================================================
// MATERIALIZATION
// ============================================================================

fn leaves_at(data: &PivotData, names: &[String], row_key: &[String], col_key: &[String]) -> Vec<Leaf> {
    names
        .iter()
        .map(|name| {
            let agg = data.get_aggregator(row_key, col_key, name);
            let value = agg.value();
            let formatted = agg.format(&value);
            Leaf { value, formatted }
        })
        .collect()
}

/// Snapshots every populated coordinate of `data`. Seals it.
pub fn materialize(data: &PivotData) -> PivotResult {
    let start = Instant::now();
    let names = data.aggregator_names().to_vec();
    let row_keys = data.row_keys().to_vec();
    let col_keys = data.col_keys().to_vec();

    let mut tree: BTreeMap<usize, BTreeMap<usize, Vec<Leaf>>> = BTreeMap::new();
    for (r, row_key) in row_keys.iter().enumerate() {
        for (c, col_key) in col_keys.iter().enumerate() {
            // Only coordinates that received a record are stored.
            let populated = names
                .first()
                .map_or(false, |name| data.get_aggregator(row_key, col_key, name).has_accumulator());
            if populated {
                tree.entry(r)
                    .or_default()
                    .insert(c, leaves_at(data, &names, row_key, col_key));
            }
        }
    }

    let row_totals = row_keys
        .iter()
        .map(|key| leaves_at(data, &names, key, &[]))
        .collect();
    let col_totals = col_keys
        .iter()
        .map(|key| leaves_at(data, &names, &[], key))
        .collect();
    let grand_total = leaves_at(data, &names, &[], &[]);

    log_debug!(
        "PIVOT",
        "materialized {}x{} result, {} cells in {:?}",
        row_keys.len(),
        col_keys.len(),
        tree.values().map(BTreeMap::len).sum::<usize>(),
        start.elapsed()
    );

    PivotResult {
        row_keys,
        col_keys,
        aggregator_names: names,
        tree,
        row_totals,
        col_totals,
        grand_total,
    }
}

/// Groups, aggregates and materializes `records` in one call. Panics from
/// caller closures (sorters, derivations) become `PivotError::Computation`.
pub fn compute(records: &[Record], config: &PivotConfig) -> Result<PivotResult, PivotError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        let data = PivotData::from_records(config, records);
        materialize(&data)
    }))
    .map_err(|payload| {
        let message = panic_message(payload.as_ref());
        log_error!("PIVOT", "computation panicked: {}", message);
        PivotError::Computation(message)
    })
}
