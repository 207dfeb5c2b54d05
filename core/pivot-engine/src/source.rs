//! FILENAME: core/pivot-engine/src/source.rs
//! Record sources and input normalization.
//!
//! Input arrives as a record list, a header-plus-rows table, or a producer
//! closure that pushes records into a sink. Iteration applies derived
//! attributes to a copy of each record; the source itself is never
//! mutated.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::definition::Derivation;
use crate::value::{normalize, Record, Value, NULL_KEY};

pub type ProduceFn = Arc<dyn Fn(&mut dyn FnMut(Record)) + Send + Sync>;

#[derive(Clone)]
pub enum RecordSource {
    Records(Vec<Record>),
    /// Rows are positional against `header`; missing trailing cells are
    /// absent attributes.
    Table {
        header: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// Pull-style producer invoked with a sink.
    Producer(ProduceFn),
}

impl fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSource::Records(records) => write!(f, "Records({} records)", records.len()),
            RecordSource::Table { header, rows } => {
                write!(f, "Table({} columns, {} rows)", header.len(), rows.len())
            }
            RecordSource::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl From<Vec<Record>> for RecordSource {
    fn from(records: Vec<Record>) -> Self {
        RecordSource::Records(records)
    }
}

impl RecordSource {
    pub fn table(header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        RecordSource::Table { header, rows }
    }

    pub fn producer<F>(f: F) -> Self
    where
        F: Fn(&mut dyn FnMut(Record)) + Send + Sync + 'static,
    {
        RecordSource::Producer(Arc::new(f))
    }

    /// Record count when known without running a producer.
    pub fn len_hint(&self) -> Option<usize> {
        match self {
            RecordSource::Records(records) => Some(records.len()),
            RecordSource::Table { rows, .. } => Some(rows.len()),
            RecordSource::Producer(_) => None,
        }
    }

    /// First and last raw records, when cheaply reachable.
    pub fn boundary_records(&self) -> (Option<Record>, Option<Record>) {
        match self {
            RecordSource::Records(records) => (records.first().cloned(), records.last().cloned()),
            RecordSource::Table { header, rows } => (
                rows.first().map(|row| table_record(header, row)),
                rows.last().map(|row| table_record(header, row)),
            ),
            RecordSource::Producer(_) => (None, None),
        }
    }

    /// Feeds every record, with derived attributes applied, to `f`.
    pub fn for_each<F>(&self, derived: &BTreeMap<String, Derivation>, mut f: F)
    where
        F: FnMut(Record),
    {
        match self {
            RecordSource::Records(records) => {
                for record in records {
                    f(apply_derived(record.clone(), derived));
                }
            }
            RecordSource::Table { header, rows } => {
                for row in rows {
                    f(apply_derived(table_record(header, row), derived));
                }
            }
            RecordSource::Producer(produce) => {
                let mut sink = |record: Record| f(apply_derived(record, derived));
                produce(&mut sink);
            }
        }
    }

    /// Collects the derived records together with their attribute
    /// inventory.
    pub fn materialize(&self, derived: &BTreeMap<String, Derivation>) -> NormalizedInput {
        let mut records = Vec::with_capacity(self.len_hint().unwrap_or(0));
        let mut inventory = AttributeInventory::default();
        self.for_each(derived, |record| {
            inventory.observe(&record);
            records.push(record);
        });
        NormalizedInput { records, inventory }
    }
}

fn table_record(header: &[String], row: &[Value]) -> Record {
    header
        .iter()
        .zip(row.iter())
        .map(|(attr, value)| (attr.clone(), value.clone()))
        .collect()
}

/// Derivations read the original record; a null result keeps whatever the
/// record already holds under that name.
fn apply_derived(record: Record, derived: &BTreeMap<String, Derivation>) -> Record {
    if derived.is_empty() {
        return record;
    }
    let computed: Vec<(&String, Value)> = derived
        .iter()
        .map(|(name, derivation)| (name, derivation.derive(&record)))
        .collect();
    let mut record = record;
    for (name, value) in computed {
        if !value.is_null() {
            record.insert(name.clone(), value);
        }
    }
    record
}

// ============================================================================
// ATTRIBUTE INVENTORY
// ============================================================================

/// Per-attribute frequency of each normalized value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeInventory {
    values: BTreeMap<String, BTreeMap<String, usize>>,
    records: usize,
}

impl AttributeInventory {
    pub fn observe(&mut self, record: &Record) {
        for (attr, _) in record.attributes() {
            if !self.values.contains_key(attr) {
                let mut counts = BTreeMap::new();
                // Every earlier record lacked this attribute.
                if self.records > 0 {
                    counts.insert(NULL_KEY.to_string(), self.records);
                }
                self.values.insert(attr.to_string(), counts);
            }
        }
        for (attr, counts) in self.values.iter_mut() {
            *counts.entry(normalize(record.get(attr))).or_insert(0) += 1;
        }
        self.records += 1;
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Value frequencies for `attr`.
    pub fn values(&self, attr: &str) -> Option<&BTreeMap<String, usize>> {
        self.values.get(attr)
    }

    pub fn count(&self, attr: &str, value: &str) -> usize {
        self.values
            .get(attr)
            .and_then(|counts| counts.get(value))
            .copied()
            .unwrap_or(0)
    }
}

/// Derived records plus their inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedInput {
    pub records: Vec<Record>,
    pub inventory: AttributeInventory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn test_table_source_missing_cells_are_absent() {
        let source = RecordSource::table(
            vec!["c".into(), "n".into()],
            vec![vec!["red".into(), 1.into()], vec!["blue".into()]],
        );
        let input = source.materialize(&BTreeMap::new());
        assert_eq!(input.records.len(), 2);
        assert!(input.records[1].get("n").is_none());
        assert_eq!(input.inventory.count("n", "null"), 1);
    }

    #[test]
    fn test_producer_source() {
        let source = RecordSource::producer(|sink| {
            for i in 0..3 {
                sink(record! { "i" => i });
            }
        });
        assert_eq!(source.len_hint(), None);
        let input = source.materialize(&BTreeMap::new());
        assert_eq!(input.records.len(), 3);
        assert_eq!(input.inventory.count("i", "2"), 1);
    }

    #[test]
    fn test_derived_attributes_do_not_touch_source() {
        let records = vec![record! { "age" => 23 }, record! { "age" => 37 }];
        let source = RecordSource::Records(records.clone());
        let mut derived = BTreeMap::new();
        derived.insert("decade".to_string(), Derivation::bin("age", 10.0));

        let input = source.materialize(&derived);
        assert_eq!(input.records[0].get("decade"), Some(&Value::Number(20.0)));
        assert_eq!(input.records[1].get("decade"), Some(&Value::Number(30.0)));
        match &source {
            RecordSource::Records(original) => assert_eq!(original, &records),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_null_derivation_keeps_existing_value() {
        let source = RecordSource::Records(vec![record! { "tag" => "keep" }]);
        let mut derived = BTreeMap::new();
        derived.insert("tag".to_string(), Derivation::custom(|_| Value::Null));
        let input = source.materialize(&derived);
        assert_eq!(input.records[0].get("tag"), Some(&Value::from("keep")));
    }

    #[test]
    fn test_inventory_late_attribute_backfills_nulls() {
        let mut inventory = AttributeInventory::default();
        inventory.observe(&record! { "a" => 1 });
        inventory.observe(&record! { "a" => 1 });
        inventory.observe(&record! { "a" => 2, "b" => "x" });

        assert_eq!(inventory.records(), 3);
        assert_eq!(inventory.count("a", "1"), 2);
        assert_eq!(inventory.count("b", "null"), 2);
        assert_eq!(inventory.count("b", "x"), 1);
        assert_eq!(inventory.attributes().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
