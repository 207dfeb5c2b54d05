//! FILENAME: tests/common/mod.rs
//! Fixtures and assertion helpers for pivot-engine integration tests.

#![allow(dead_code)]

use pivot_engine::{record, AggregateValue, AxisKey, PivotData, Record, RecordSource, Value};

// ============================================================================
// TEST DATA FIXTURES
// ============================================================================

/// The three-record color/shape set.
pub struct ShapesFixture;

impl ShapesFixture {
    pub fn records() -> Vec<Record> {
        vec![
            record! { "c" => "blue", "s" => "circle", "n" => 10 },
            record! { "c" => "red", "s" => "square", "n" => 3 },
            record! { "c" => "blue", "s" => "circle", "n" => 5 },
        ]
    }
}

/// Regional sales as a header-plus-rows table.
pub struct SalesFixture;

impl SalesFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["Region", "Product", "Quarter", "Sales", "Quantity"]
    }

    pub fn data() -> Vec<(&'static str, &'static str, &'static str, f64, f64)> {
        vec![
            ("North", "Widget", "Q1", 10000.0, 100.0),
            ("North", "Widget", "Q2", 12000.0, 120.0),
            ("North", "Gadget", "Q1", 8000.0, 80.0),
            ("North", "Gadget", "Q2", 9000.0, 90.0),
            ("South", "Widget", "Q1", 15000.0, 150.0),
            ("South", "Widget", "Q2", 14000.0, 140.0),
            ("South", "Gadget", "Q1", 11000.0, 110.0),
            ("South", "Gadget", "Q2", 13000.0, 130.0),
            ("East", "Widget", "Q1", 9000.0, 90.0),
            ("East", "Widget", "Q2", 11000.0, 110.0),
            ("East", "Gadget", "Q1", 7000.0, 70.0),
            ("East", "Gadget", "Q2", 8500.0, 85.0),
        ]
    }

    pub fn source() -> RecordSource {
        let header = Self::headers().into_iter().map(String::from).collect();
        let rows = Self::data()
            .into_iter()
            .map(|(region, product, quarter, sales, quantity)| {
                vec![
                    Value::from(region),
                    Value::from(product),
                    Value::from(quarter),
                    Value::from(sales),
                    Value::from(quantity),
                ]
            })
            .collect();
        RecordSource::table(header, rows)
    }
}

/// `groups` row groups where group `i` (1-based) sums to `i`.
pub fn ranked_groups(groups: usize) -> Vec<Record> {
    (1..=groups)
        .map(|i| record! { "g" => format!("g{:02}", i), "n" => i as f64 })
        .collect()
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

pub fn key(parts: &[&str]) -> AxisKey {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Assert a numeric aggregate at a coordinate.
pub fn assert_number(data: &PivotData, row: &[&str], col: &[&str], name: &str, expected: f64) {
    let value = data.value(&key(row), &key(col), name);
    assert_eq!(
        value,
        AggregateValue::Number(expected),
        "{} at {:?}/{:?}",
        name,
        row,
        col
    );
}
