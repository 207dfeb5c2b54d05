//! FILENAME: core/pivot-engine/src/engine.rs
//! Pivot Engine - Groups records into a two-axis tree of accumulators.
//!
//! A `PivotData` has two phases:
//! - Accumulating: `push` routes each record into the grand total, its row
//!   margin, its column margin and (when both keys are non-empty) its cell
//! - Sealed: the first read of row or column keys sorts and caches them;
//!   further pushes are rejected
//!
//! Aggregator lookups work in either phase and never sort anything.

use std::cell::OnceCell;
use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::aggregator::{
    Accumulator, AggregateValue, AggregatorKind, AggregatorTemplate, BindContext,
};
use crate::definition::{Axis, AxisOrder, PivotConfig};
use crate::error::PivotError;
use crate::ordering::{compare_aggregates, compare_keys};
use crate::source::RecordSource;
use crate::value::{normalize, Record};
use crate::{log_debug, log_info};

/// Ordered tuple of normalized attribute values. Empty means the axis total.
pub type AxisKey = SmallVec<[String; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accumulating,
    Sealed,
}

/// One accumulator per active aggregator, aligned with the aggregator names.
#[derive(Debug, Clone)]
struct Collection {
    slots: SmallVec<[Accumulator; 2]>,
}

impl Collection {
    fn new(templates: &[AggregatorTemplate], ctx: &BindContext<'_>) -> Self {
        Collection {
            slots: templates.iter().map(|t| t.bind(ctx)).collect(),
        }
    }

    fn push(&mut self, record: &Record) {
        for slot in &mut self.slots {
            slot.push(record);
        }
    }
}

#[derive(Debug)]
struct SortedKeys {
    rows: Vec<AxisKey>,
    cols: Vec<AxisKey>,
}

// ============================================================================
// PIVOT DATA
// ============================================================================

pub struct PivotData {
    config: PivotConfig,
    names: Vec<String>,
    templates: Vec<AggregatorTemplate>,

    tree: FxHashMap<AxisKey, FxHashMap<AxisKey, Collection>>,
    row_totals: FxHashMap<AxisKey, Collection>,
    col_totals: FxHashMap<AxisKey, Collection>,
    all_total: Collection,

    /// Keys in first-seen order.
    row_keys: Vec<AxisKey>,
    col_keys: Vec<AxisKey>,

    sorted: OnceCell<SortedKeys>,

    pushed: usize,
    filtered: usize,
}

impl PivotData {
    /// An empty tree in the accumulating phase.
    pub fn new(config: &PivotConfig) -> Self {
        let names = config.effective_aggregators();
        let templates: Vec<AggregatorTemplate> = names
            .iter()
            .map(|name| {
                let kind = AggregatorKind::from_name(name);
                if kind == AggregatorKind::Null {
                    log_debug!("PIVOT", "unknown aggregator '{}' reports null", name);
                }
                let template = kind.template(config.vals_for(name));
                if kind != AggregatorKind::Null && template.kind() == AggregatorKind::Null {
                    log_debug!("PIVOT", "aggregator '{}' has no value attribute bound", name);
                }
                template
            })
            .collect();

        let all_total = Collection::new(&templates, &BindContext { sorters: &config.sorters });

        PivotData {
            config: config.clone(),
            names,
            templates,
            tree: FxHashMap::default(),
            row_totals: FxHashMap::default(),
            col_totals: FxHashMap::default(),
            all_total,
            row_keys: Vec::new(),
            col_keys: Vec::new(),
            sorted: OnceCell::new(),
            pushed: 0,
            filtered: 0,
        }
    }

    /// Builds a tree from records that already carry derived attributes.
    pub fn from_records(config: &PivotConfig, records: &[Record]) -> Self {
        let mut data = PivotData::new(config);
        for record in records {
            data.absorb(record);
        }
        data
    }

    /// Builds a tree from a source, applying the config's derived
    /// attributes on the way in.
    pub fn from_source(config: &PivotConfig, source: &RecordSource) -> Self {
        let mut data = PivotData::new(config);
        source.for_each(&config.derived_attributes, |record| data.absorb(&record));
        data
    }

    pub fn config(&self) -> &PivotConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        if self.sorted.get().is_some() {
            Phase::Sealed
        } else {
            Phase::Accumulating
        }
    }

    /// Records routed into the tree.
    pub fn record_count(&self) -> usize {
        self.pushed
    }

    /// Records dropped by the value filter.
    pub fn filtered_count(&self) -> usize {
        self.filtered
    }

    /// Absorbs one record. Fails once keys have been read.
    pub fn push(&mut self, record: &Record) -> Result<(), PivotError> {
        if self.phase() == Phase::Sealed {
            return Err(PivotError::Sealed);
        }
        self.absorb(record);
        Ok(())
    }

    fn absorb(&mut self, record: &Record) {
        if self.is_filtered_out(record) {
            self.filtered += 1;
            return;
        }
        self.pushed += 1;

        let row_key = axis_key(record, &self.config.rows);
        let col_key = axis_key(record, &self.config.cols);
        let ctx = BindContext { sorters: &self.config.sorters };
        let templates = &self.templates;

        self.all_total.push(record);

        if !row_key.is_empty() {
            let collection = match self.row_totals.entry(row_key.clone()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    self.row_keys.push(row_key.clone());
                    e.insert(Collection::new(templates, &ctx))
                }
            };
            collection.push(record);
        }

        if !col_key.is_empty() {
            let collection = match self.col_totals.entry(col_key.clone()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    self.col_keys.push(col_key.clone());
                    e.insert(Collection::new(templates, &ctx))
                }
            };
            collection.push(record);
        }

        if !row_key.is_empty() && !col_key.is_empty() {
            self.tree
                .entry(row_key)
                .or_default()
                .entry(col_key)
                .or_insert_with(|| Collection::new(templates, &ctx))
                .push(record);
        }
    }

    /// Any excluded value on any filtered attribute drops the record.
    fn is_filtered_out(&self, record: &Record) -> bool {
        self.config
            .value_filter
            .iter()
            .any(|(attr, excluded)| !excluded.is_empty() && excluded.contains(&normalize(record.get(attr))))
    }

    // ========================================================================
    // KEYS
    // ========================================================================

    pub fn aggregator_names(&self) -> &[String] {
        &self.names
    }

    /// Sorted row keys. Seals the tree.
    pub fn row_keys(&self) -> &[AxisKey] {
        &self.sorted().rows
    }

    /// Sorted column keys. Seals the tree.
    pub fn col_keys(&self) -> &[AxisKey] {
        &self.sorted().cols
    }

    fn sorted(&self) -> &SortedKeys {
        self.sorted.get_or_init(|| {
            let mut rows = self.row_keys.clone();
            let mut cols = self.col_keys.clone();
            self.sort_axis_keys(Axis::Rows, &mut rows);
            self.sort_axis_keys(Axis::Cols, &mut cols);
            log_info!(
                "PIVOT",
                "sealed: {} records, {} filtered, {} row keys, {} col keys",
                self.pushed,
                self.filtered,
                rows.len(),
                cols.len()
            );
            SortedKeys { rows, cols }
        })
    }

    /// Sorts `keys` by the axis order mode. Stable, so sorting an already
    /// sorted list leaves it unchanged.
    pub fn sort_axis_keys(&self, axis: Axis, keys: &mut Vec<AxisKey>) {
        let attrs = self.config.attrs_for(axis);
        let order = self.config.order_for(axis);
        let primary = match (order, self.names.first()) {
            (AxisOrder::Key, _) | (_, None) => {
                keys.sort_by(|a, b| compare_keys(a, b, attrs, &self.config.sorters));
                return;
            }
            (_, Some(name)) => name,
        };

        let mut decorated: Vec<(AggregateValue, AxisKey)> = keys
            .drain(..)
            .map(|key| {
                let value = match axis {
                    Axis::Rows => self.get_aggregator(&key, &[], primary).value(),
                    Axis::Cols => self.get_aggregator(&[], &key, primary).value(),
                };
                (value, key)
            })
            .collect();
        decorated.sort_by(|(a, _), (b, _)| {
            let ord = compare_aggregates(a, b);
            if order == AxisOrder::ValueDesc {
                ord.reverse()
            } else {
                ord
            }
        });
        keys.extend(decorated.into_iter().map(|(_, key)| key));
    }

    // ========================================================================
    // AGGREGATOR LOOKUP
    // ========================================================================

    fn collection(&self, row_key: &[String], col_key: &[String]) -> Option<&Collection> {
        match (row_key.is_empty(), col_key.is_empty()) {
            (true, true) => Some(&self.all_total),
            (false, true) => self.row_totals.get(row_key),
            (true, false) => self.col_totals.get(col_key),
            (false, false) => self.tree.get(row_key).and_then(|cols| cols.get(col_key)),
        }
    }

    fn accumulator(&self, row_key: &[String], col_key: &[String], slot: usize) -> Option<&Accumulator> {
        self.collection(row_key, col_key)
            .and_then(|collection| collection.slots.get(slot))
    }

    /// The accumulator for `name` at a coordinate. Missing coordinates and
    /// unknown names yield a handle that reports null.
    pub fn get_aggregator<'a>(
        &'a self,
        row_key: &'a [String],
        col_key: &'a [String],
        name: &str,
    ) -> AggregatorRef<'a> {
        let slot = self.names.iter().position(|n| n == name);
        let kind = slot
            .and_then(|s| self.templates.get(s))
            .map_or(AggregatorKind::Null, AggregatorTemplate::kind);
        let acc = slot.and_then(|s| self.accumulator(row_key, col_key, s));
        AggregatorRef {
            data: self,
            row_key,
            col_key,
            slot,
            acc,
            kind,
        }
    }

    /// Shortcut for `get_aggregator(..).value()`.
    pub fn value(&self, row_key: &[String], col_key: &[String], name: &str) -> AggregateValue {
        self.get_aggregator(row_key, col_key, name).value()
    }
}

fn axis_key(record: &Record, attrs: &[String]) -> AxisKey {
    attrs.iter().map(|attr| normalize(record.get(attr))).collect()
}

// ============================================================================
// AGGREGATOR HANDLE
// ============================================================================

/// Read handle for one aggregator at one coordinate.
pub struct AggregatorRef<'a> {
    data: &'a PivotData,
    row_key: &'a [String],
    col_key: &'a [String],
    slot: Option<usize>,
    acc: Option<&'a Accumulator>,
    kind: AggregatorKind,
}

impl AggregatorRef<'_> {
    pub fn kind(&self) -> AggregatorKind {
        self.kind
    }

    pub fn num_inputs(&self) -> usize {
        self.kind.num_inputs()
    }

    /// False for coordinates that never received a record.
    pub fn has_accumulator(&self) -> bool {
        self.acc.is_some()
    }

    pub fn value(&self) -> AggregateValue {
        let Some(acc) = self.acc else {
            return AggregateValue::Null;
        };
        let Some(fraction) = acc.as_fraction() else {
            return acc.value();
        };

        let Some(numerator) = fraction.numerator().as_number() else {
            return AggregateValue::Null;
        };
        let (row, col) = fraction.scope().margin(self.row_key, self.col_key);
        // Denominator: the same-named aggregator at the margin; its value
        // is the unwrapped numerator of that margin.
        let denominator = self
            .slot
            .and_then(|slot| self.data.accumulator(row, col, slot))
            .and_then(|margin| margin.value().as_number());
        match denominator {
            Some(d) if d != 0.0 => AggregateValue::number(numerator / d),
            _ => AggregateValue::Number(0.0),
        }
    }

    pub fn format(&self, value: &AggregateValue) -> String {
        value.render(&self.kind.formatter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::Sorter;
    use crate::record;
    use crate::value::Value;

    fn key(parts: &[&str]) -> AxisKey {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn create_test_records() -> Vec<Record> {
        vec![
            record! { "c" => "blue", "s" => "circle", "n" => 10 },
            record! { "c" => "red", "s" => "square", "n" => 3 },
            record! { "c" => "blue", "s" => "circle", "n" => 5 },
        ]
    }

    fn sum_config() -> PivotConfig {
        PivotConfig::new()
            .with_rows(["c"])
            .with_cols(["s"])
            .with_aggregator("Sum", ["n"])
    }

    #[test]
    fn test_sum_cell_and_grand_total() {
        let data = PivotData::from_records(&sum_config(), &create_test_records());
        assert_eq!(data.value(&key(&["blue"]), &key(&["circle"]), "Sum"), AggregateValue::Number(15.0));
        assert_eq!(data.value(&[], &[], "Sum"), AggregateValue::Number(18.0));
    }

    #[test]
    fn test_count_cell_and_grand_total() {
        let config = PivotConfig::new().with_rows(["c"]).with_cols(["s"]);
        let data = PivotData::from_records(&config, &create_test_records());
        assert_eq!(data.value(&key(&["blue"]), &key(&["circle"]), "Count"), AggregateValue::Number(2.0));
        assert_eq!(data.value(&[], &[], "Count"), AggregateValue::Number(3.0));
    }

    #[test]
    fn test_null_group() {
        let mut records = create_test_records();
        records.push(record! { "c" => Value::Null, "s" => "square", "n" => 1 });
        let data = PivotData::from_records(&sum_config(), &records);

        assert!(data.row_keys().contains(&key(&["null"])));
        assert_eq!(data.row_keys()[0], key(&["null"]));
        assert_eq!(data.value(&[], &[], "Sum"), AggregateValue::Number(19.0));
    }

    #[test]
    fn test_missing_and_null_group_identically() {
        let config = PivotConfig::new().with_rows(["c"]);
        let explicit = PivotData::from_records(&config, &[record! { "c" => Value::Null }]);
        let missing = PivotData::from_records(&config, &[record! { "x" => 1 }]);
        assert_eq!(explicit.row_keys(), missing.row_keys());
    }

    #[test]
    fn test_value_filter_excludes_records_entirely() {
        let config = sum_config().exclude("c", "blue");
        let data = PivotData::from_records(&config, &create_test_records());
        assert_eq!(data.value(&[], &[], "Sum"), AggregateValue::Number(3.0));
        assert_eq!(data.row_keys(), &[key(&["red"])]);
        assert!(!data.col_keys().contains(&key(&["circle"])));
        assert_eq!(data.filtered_count(), 2);
    }

    #[test]
    fn test_push_after_seal_fails() {
        let mut data = PivotData::new(&sum_config());
        data.push(&record! { "c" => "blue", "s" => "circle", "n" => 1 }).unwrap();
        assert_eq!(data.phase(), Phase::Accumulating);
        assert_eq!(data.row_keys().len(), 1);
        assert_eq!(data.phase(), Phase::Sealed);
        assert_eq!(data.push(&record! { "c" => "red" }), Err(PivotError::Sealed));
    }

    #[test]
    fn test_cells_only_with_both_keys() {
        let config = PivotConfig::new().with_rows(["c"]).with_aggregator("Sum", ["n"]);
        let data = PivotData::from_records(&config, &create_test_records());
        assert!(data.col_keys().is_empty());
        assert_eq!(data.value(&key(&["blue"]), &[], "Sum"), AggregateValue::Number(15.0));
        assert!(data.tree.is_empty());
    }

    #[test]
    fn test_missing_coordinate_and_unknown_name_are_null() {
        let data = PivotData::from_records(&sum_config(), &create_test_records());
        let row = key(&["red"]);
        let col = key(&["circle"]);
        let agg = data.get_aggregator(&row, &col, "Sum");
        assert_eq!(agg.value(), AggregateValue::Null);
        assert_eq!(agg.format(&agg.value()), "");
        assert_eq!(data.value(&[], &[], "Median"), AggregateValue::Null);
    }

    #[test]
    fn test_unknown_aggregator_in_config_reports_null() {
        let config = sum_config().with_aggregator("Nonsense", Vec::<String>::new());
        let data = PivotData::from_records(&config, &create_test_records());
        assert_eq!(data.aggregator_names(), &["Sum".to_string(), "Nonsense".to_string()]);
        assert_eq!(data.value(&[], &[], "Nonsense"), AggregateValue::Null);
        assert_eq!(data.value(&[], &[], "Sum"), AggregateValue::Number(18.0));
    }

    #[test]
    fn test_key_order_uses_sorters() {
        let config = PivotConfig::new()
            .with_rows(["c"])
            .with_sorter("c", Sorter::explicit(["red", "blue"]));
        let data = PivotData::from_records(&config, &create_test_records());
        assert_eq!(data.row_keys(), &[key(&["red"]), key(&["blue"])]);
    }

    #[test]
    fn test_value_order() {
        let records = vec![
            record! { "c" => "a", "n" => 5 },
            record! { "c" => "b", "n" => 50 },
            record! { "c" => "c", "n" => 20 },
        ];
        let asc = PivotConfig::new()
            .with_rows(["c"])
            .with_aggregator("Sum", ["n"])
            .with_row_order(AxisOrder::ValueAsc);
        let data = PivotData::from_records(&asc, &records);
        assert_eq!(data.row_keys(), &[key(&["a"]), key(&["c"]), key(&["b"])]);

        let desc = asc.clone().with_row_order(AxisOrder::ValueDesc);
        let data = PivotData::from_records(&desc, &records);
        assert_eq!(data.row_keys(), &[key(&["b"]), key(&["c"]), key(&["a"])]);

        let mut again = data.row_keys().to_vec();
        data.sort_axis_keys(Axis::Rows, &mut again);
        assert_eq!(again, data.row_keys());
    }

    #[test]
    fn test_fraction_of_total_rows_columns() {
        let config = PivotConfig::new()
            .with_rows(["c"])
            .with_cols(["s"])
            .with_aggregator("Sum as Fraction of Total", ["n"])
            .with_aggregator("Sum as Fraction of Rows", ["n"])
            .with_aggregator("Sum as Fraction of Columns", ["n"]);
        let mut records = create_test_records();
        records.push(record! { "c" => "red", "s" => "circle", "n" => 5 });
        let data = PivotData::from_records(&config, &records);

        let (blue, red) = (key(&["blue"]), key(&["red"]));
        let circle = key(&["circle"]);

        assert_eq!(data.value(&blue, &circle, "Sum as Fraction of Total"), AggregateValue::Number(15.0 / 23.0));
        assert_eq!(data.value(&red, &circle, "Sum as Fraction of Rows"), AggregateValue::Number(5.0 / 8.0));
        assert_eq!(data.value(&red, &circle, "Sum as Fraction of Columns"), AggregateValue::Number(0.25));
        assert_eq!(data.value(&[], &[], "Sum as Fraction of Total"), AggregateValue::Number(1.0));

        let agg = data.get_aggregator(&red, &circle, "Sum as Fraction of Columns");
        assert_eq!(agg.format(&agg.value()), "25.0%");
        assert_eq!(agg.num_inputs(), 0);
    }

    #[test]
    fn test_fraction_with_zero_denominator() {
        let config = PivotConfig::new()
            .with_rows(["c"])
            .with_aggregator("Sum as Fraction of Total", ["n"]);
        let data = PivotData::from_records(&config, &[record! { "c" => "x", "n" => 0 }]);
        assert_eq!(data.value(&key(&["x"]), &[], "Sum as Fraction of Total"), AggregateValue::Number(0.0));
    }

    #[test]
    fn test_from_source_applies_derived_attributes() {
        use crate::definition::Derivation;
        let config = PivotConfig::new()
            .with_rows(["decade"])
            .with_derived("decade", Derivation::bin("age", 10.0));
        let source = RecordSource::Records(vec![
            record! { "age" => 21 },
            record! { "age" => 29 },
            record! { "age" => 35 },
        ]);
        let data = PivotData::from_source(&config, &source);
        assert_eq!(data.row_keys(), &[key(&["20"]), key(&["30"])]);
        assert_eq!(data.value(&key(&["20"]), &[], "Count"), AggregateValue::Number(2.0));
    }
}
