//! FILENAME: core/pivot-pipeline/src/fingerprint.rs
//! Structural cache keys.
//!
//! Both fingerprints are canonical JSON strings, so equality is exact
//! and there is no hash collision to reason about. Closures enter the
//! signature by pointer identity: the same `Arc` fingerprints equal,
//! two distinct closures never do.

use std::collections::{BTreeMap, BTreeSet};

use pivot_engine::{AxisOrder, Derivation, PivotConfig, RecordSource, Value};
use serde::Serialize;

use crate::error::PipelineError;

fn derivation_signatures(derived: &BTreeMap<String, Derivation>) -> BTreeMap<&str, String> {
    derived.iter().map(|(name, d)| (name.as_str(), d.signature())).collect()
}

// ============================================================================
// INPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputFingerprint(String);

#[derive(Serialize)]
struct InputSignature<'a> {
    identity: u64,
    len: Option<usize>,
    first: Option<BTreeMap<&'a str, &'a Value>>,
    last: Option<BTreeMap<&'a str, &'a Value>>,
    derived: BTreeMap<&'a str, String>,
}

impl InputFingerprint {
    /// `identity` changes whenever the pipeline is handed a new source.
    pub fn of(
        source: &RecordSource,
        identity: u64,
        derived: &BTreeMap<String, Derivation>,
    ) -> Result<Self, PipelineError> {
        let (first, last) = source.boundary_records();
        let signature = InputSignature {
            identity,
            len: source.len_hint(),
            first: first.as_ref().map(|r| r.canonical()),
            last: last.as_ref().map(|r| r.canonical()),
            derived: derivation_signatures(derived),
        };
        Ok(InputFingerprint(serde_json::to_string(&signature)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultFingerprint(String);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultSignature<'a> {
    records: usize,
    rows: &'a [String],
    cols: &'a [String],
    /// Effective aggregators with their resolved value bindings.
    aggregators: Vec<(String, &'a [String])>,
    value_filter: &'a BTreeMap<String, BTreeSet<String>>,
    row_order: AxisOrder,
    col_order: AxisOrder,
    sorters: BTreeMap<&'a str, String>,
    derived: BTreeMap<&'a str, String>,
}

impl ResultFingerprint {
    pub fn of(record_count: usize, config: &PivotConfig) -> Result<Self, PipelineError> {
        let aggregators = config
            .effective_aggregators()
            .into_iter()
            .map(|name| {
                let vals = config.vals_for(&name);
                (name, vals)
            })
            .collect();
        let signature = ResultSignature {
            records: record_count,
            rows: &config.rows,
            cols: &config.cols,
            aggregators,
            value_filter: &config.value_filter,
            row_order: config.row_order,
            col_order: config.col_order,
            sorters: config.sorters.iter().map(|(a, s)| (a.as_str(), s.signature())).collect(),
            derived: derivation_signatures(&config.derived_attributes),
        };
        Ok(ResultFingerprint(serde_json::to_string(&signature)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
