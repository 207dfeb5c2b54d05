//! FILENAME: core/pivot-engine/src/definition.rs
//! Pivot Definition - The configuration that describes a pivot.
//!
//! This module contains the types needed to DESCRIBE a pivot:
//! - Row and column attributes (the grouping axes)
//! - Aggregator names and the value attributes bound to each of them
//! - Value filters, per-axis order modes, per-attribute sorters
//! - Derived attributes computed from each input record
//!
//! A definition is serializable as long as it holds no caller closures;
//! `is_transferable()` reports that, and only transferable definitions may
//! cross into the offload worker.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ordering::Sorter;
use crate::value::{Record, Value};

// ============================================================================
// AXES AND ORDER
// ============================================================================

/// One of the two grouping axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Rows,
    Cols,
}

/// How the keys of one axis are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AxisOrder {
    /// Attribute by attribute with each attribute's sorter.
    #[default]
    #[serde(rename = "key")]
    Key,
    /// By the first aggregator's value at the axis margin, ascending.
    #[serde(rename = "value-asc")]
    ValueAsc,
    /// By the first aggregator's value at the axis margin, descending.
    #[serde(rename = "value-desc")]
    ValueDesc,
}

// ============================================================================
// DERIVED ATTRIBUTES
// ============================================================================

pub type DeriveFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Computes an extra attribute from each input record.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Derivation {
    /// Numeric bin: `x - x % width`. Non-numeric input derives nothing.
    Bin { attr: String, width: f64 },

    /// Caller closure. Never serialized.
    #[serde(skip)]
    Custom(DeriveFn),
}

impl Derivation {
    pub fn bin(attr: impl Into<String>, width: f64) -> Self {
        Derivation::Bin {
            attr: attr.into(),
            width,
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        Derivation::Custom(Arc::new(f))
    }

    /// Derives the value for `record`. `Value::Null` means "leave the
    /// record's existing value in place".
    pub fn derive(&self, record: &Record) -> Value {
        match self {
            Derivation::Bin { attr, width } => {
                match record.get(attr).and_then(Value::as_number) {
                    Some(x) if *width != 0.0 => Value::Number(x - x % width),
                    _ => Value::Null,
                }
            }
            Derivation::Custom(f) => f(record),
        }
    }

    pub fn is_transferable(&self) -> bool {
        !matches!(self, Derivation::Custom(_))
    }

    /// Stable identity string: structural for built-ins, pointer identity
    /// for closures.
    pub fn signature(&self) -> String {
        match self {
            Derivation::Bin { attr, width } => format!("bin:{:?}:{}", attr, width),
            Derivation::Custom(f) => format!("custom@{:p}", Arc::as_ptr(f)),
        }
    }
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Derivation::Bin { attr, width } => f
                .debug_struct("Bin")
                .field("attr", attr)
                .field("width", width)
                .finish(),
            Derivation::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ============================================================================
// PIVOT CONFIG
// ============================================================================

/// Default aggregator when none is named.
pub const DEFAULT_AGGREGATOR: &str = "Count";

/// Full pivot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PivotConfig {
    /// Attributes forming row keys, outermost first.
    pub rows: Vec<String>,

    /// Attributes forming column keys, outermost first.
    pub cols: Vec<String>,

    /// Value attributes shared by aggregators without their own binding.
    pub vals: Vec<String>,

    /// Aggregator names, in display order. Duplicates are ignored.
    pub aggregator_names: Vec<String>,

    /// Per-aggregator value attributes, overriding `vals`.
    pub aggregator_vals: BTreeMap<String, Vec<String>>,

    /// Attribute to the set of normalized values that exclude a record.
    /// On the wire this is `{attr: {value: true}}`; `false` entries are
    /// ignored.
    #[serde(with = "value_filter_map")]
    pub value_filter: BTreeMap<String, BTreeSet<String>>,

    pub row_order: AxisOrder,
    pub col_order: AxisOrder,

    /// Per-attribute sorters. Attributes without one sort naturally.
    pub sorters: BTreeMap<String, Sorter>,

    /// Attributes computed from each record before filtering and grouping.
    pub derived_attributes: BTreeMap<String, Derivation>,
}

mod value_filter_map {
    use std::collections::{BTreeMap, BTreeSet};

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    type Filter = BTreeMap<String, BTreeSet<String>>;

    pub fn serialize<S: Serializer>(filter: &Filter, serializer: S) -> Result<S::Ok, S::Error> {
        let wire: BTreeMap<&str, BTreeMap<&str, bool>> = filter
            .iter()
            .map(|(attr, values)| {
                (attr.as_str(), values.iter().map(|v| (v.as_str(), true)).collect())
            })
            .collect();
        wire.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Filter, D::Error> {
        let wire = BTreeMap::<String, BTreeMap<String, bool>>::deserialize(deserializer)?;
        Ok(wire
            .into_iter()
            .map(|(attr, values)| {
                let excluded: BTreeSet<String> = values
                    .into_iter()
                    .filter_map(|(value, on)| on.then_some(value))
                    .collect();
                (attr, excluded)
            })
            .filter(|(_, excluded)| !excluded.is_empty())
            .collect())
    }
}

impl PivotConfig {
    pub fn new() -> Self {
        PivotConfig::default()
    }

    pub fn with_rows<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows = attrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cols<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cols = attrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_vals<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vals = attrs.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an aggregator bound to its own value attributes. An empty list
    /// falls back to the shared `vals`.
    pub fn with_aggregator<I, S>(mut self, name: impl Into<String>, vals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let vals: Vec<String> = vals.into_iter().map(Into::into).collect();
        if !vals.is_empty() {
            self.aggregator_vals.insert(name.clone(), vals);
        }
        self.aggregator_names.push(name);
        self
    }

    /// Excludes records whose normalized `attr` equals `value`.
    pub fn exclude(mut self, attr: impl Into<String>, value: impl Into<String>) -> Self {
        self.value_filter
            .entry(attr.into())
            .or_default()
            .insert(value.into());
        self
    }

    pub fn with_row_order(mut self, order: AxisOrder) -> Self {
        self.row_order = order;
        self
    }

    pub fn with_col_order(mut self, order: AxisOrder) -> Self {
        self.col_order = order;
        self
    }

    pub fn with_sorter(mut self, attr: impl Into<String>, sorter: Sorter) -> Self {
        self.sorters.insert(attr.into(), sorter);
        self
    }

    pub fn with_derived(mut self, attr: impl Into<String>, derivation: Derivation) -> Self {
        self.derived_attributes.insert(attr.into(), derivation);
        self
    }

    /// Aggregator names with duplicates removed, first occurrence wins.
    /// An empty list means a single `Count`.
    pub fn effective_aggregators(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let names: Vec<String> = self
            .aggregator_names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();
        if names.is_empty() {
            vec![DEFAULT_AGGREGATOR.to_string()]
        } else {
            names
        }
    }

    /// Value attributes bound to `name`.
    pub fn vals_for(&self, name: &str) -> &[String] {
        match self.aggregator_vals.get(name) {
            Some(vals) if !vals.is_empty() => vals,
            _ => &self.vals,
        }
    }

    pub fn order_for(&self, axis: Axis) -> AxisOrder {
        match axis {
            Axis::Rows => self.row_order,
            Axis::Cols => self.col_order,
        }
    }

    pub fn attrs_for(&self, axis: Axis) -> &[String] {
        match axis {
            Axis::Rows => &self.rows,
            Axis::Cols => &self.cols,
        }
    }

    /// True when no sorter or derivation is a caller closure.
    pub fn is_transferable(&self) -> bool {
        self.sorters.values().all(Sorter::is_transferable)
            && self.derived_attributes.values().all(Derivation::is_transferable)
    }

    /// The serializable projection, or `None` when a closure is present.
    pub fn to_transferable(&self) -> Option<TransferableConfig> {
        if self.is_transferable() {
            Some(TransferableConfig(self.clone()))
        } else {
            None
        }
    }
}

/// A `PivotConfig` known to hold no closures. Always serializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferableConfig(PivotConfig);

impl TransferableConfig {
    pub fn as_config(&self) -> &PivotConfig {
        &self.0
    }

    pub fn into_config(self) -> PivotConfig {
        self.0
    }
}
