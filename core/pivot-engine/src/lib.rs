//! FILENAME: core/pivot-engine/src/lib.rs
//! Pivot aggregation engine.
//!
//! Groups a stream of attribute records along row and column attributes
//! and computes pluggable aggregates for every cell, margin and the grand
//! total. Everything here is synchronous and single-threaded; the
//! `pivot-pipeline` crate adds caching, offloading and debouncing on top.
//!
//! Layers:
//! - `value` / `source`: Records and where they come from (WHAT goes in)
//! - `definition`: Serializable configuration (what the pivot IS)
//! - `aggregator` / `ordering`: Accumulators and key comparators
//! - `engine`: The grouping tree (HOW we calculate)
//! - `result` / `top_n`: Materialized snapshot and its display reduction

pub mod logging;
pub mod error;
pub mod value;
pub mod source;
pub mod definition;
pub mod format;
pub mod ordering;
pub mod aggregator;
pub mod engine;
pub mod result;
pub mod top_n;

pub use aggregator::{AggregateValue, AggregatorKind, FractionBase, FractionScope};
pub use definition::*;
pub use engine::{AggregatorRef, AxisKey, Phase, PivotData};
pub use error::{panic_message, PivotError};
pub use format::NumberFormat;
pub use ordering::{natural_cmp, Sorter};
pub use result::{compute, materialize, Leaf, PivotResult};
pub use source::{AttributeInventory, NormalizedInput, RecordSource};
pub use top_n::{reduce, reduce_axis, OTHERS_LABEL};
pub use value::{normalize, Record, Value, NULL_KEY};
