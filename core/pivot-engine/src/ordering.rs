//! FILENAME: core/pivot-engine/src/ordering.rs
//! Key ordering: natural comparison, explicit orders, composite keys.
//!
//! Natural order is total:
//! 1. the null sentinel first
//! 2. numeric strings, numerically
//! 3. everything else, with digit runs compared by magnitude
//!    (`"item2" < "item10"`)

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregator::AggregateValue;
use crate::value::NULL_KEY;

pub type SortFn = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

// ============================================================================
// SORTER
// ============================================================================

/// Comparator for one attribute's normalized values.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Sorter {
    #[default]
    Natural,

    /// Listed values first in list order, then case-insensitive matches
    /// in list order, then the rest naturally.
    Explicit(Vec<String>),

    /// Caller closure. Never serialized.
    #[serde(skip)]
    Custom(SortFn),
}

impl Sorter {
    pub fn explicit<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Sorter::Explicit(order.into_iter().map(Into::into).collect())
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> Ordering + Send + Sync + 'static,
    {
        Sorter::Custom(Arc::new(f))
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            Sorter::Natural => natural_cmp(a, b),
            Sorter::Explicit(order) => explicit_cmp(order, a, b),
            Sorter::Custom(f) => f(a, b),
        }
    }

    pub fn is_transferable(&self) -> bool {
        !matches!(self, Sorter::Custom(_))
    }

    /// Stable identity string: structural for built-ins, pointer identity
    /// for closures.
    pub fn signature(&self) -> String {
        match self {
            Sorter::Natural => "natural".to_string(),
            Sorter::Explicit(order) => format!("explicit:{:?}", order),
            Sorter::Custom(f) => format!("custom@{:p}", Arc::as_ptr(f)),
        }
    }
}

impl fmt::Debug for Sorter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sorter::Natural => f.write_str("Natural"),
            Sorter::Explicit(order) => f.debug_tuple("Explicit").field(order).finish(),
            Sorter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn explicit_cmp(order: &[String], a: &str, b: &str) -> Ordering {
    let exact = |x: &str| order.iter().position(|o| o == x);
    match (exact(a), exact(b)) {
        (Some(i), Some(j)) => return i.cmp(&j),
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (None, None) => {}
    }

    let folded = |x: &str| {
        let lower = x.to_lowercase();
        order.iter().position(|o| o.to_lowercase() == lower)
    };
    match (folded(a), folded(b)) {
        (Some(i), Some(j)) => i.cmp(&j).then_with(|| natural_cmp(a, b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => natural_cmp(a, b),
    }
}

// ============================================================================
// NATURAL ORDER
// ============================================================================

fn parse_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Total natural order over normalized key parts.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (a == NULL_KEY, b == NULL_KEY) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    match (parse_numeric(a), parse_numeric(b)) {
        (Some(x), Some(y)) => match x.partial_cmp(&y) {
            Some(Ordering::Equal) | None => {}
            Some(ord) => return ord,
        },
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (None, None) => {}
    }

    if a == b {
        return Ordering::Equal;
    }
    chunked_cmp(a, b)
}

/// Compares alternating digit and non-digit runs; digit runs by magnitude.
fn chunked_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = if is_digits(x) && is_digits(y) {
                    digit_run_cmp(x, y)
                } else {
                    x.cmp(y)
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().next().map_or(false, |b| b.is_ascii_digit())
}

fn digit_run_cmp(x: &str, y: &str) -> Ordering {
    let xs = x.trim_start_matches('0');
    let ys = y.trim_start_matches('0');
    xs.len()
        .cmp(&ys.len())
        .then_with(|| xs.cmp(ys))
        // Same magnitude: fewer leading zeros first.
        .then_with(|| x.len().cmp(&y.len()))
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Chunks { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map_or(self.rest.len(), |(i, _)| i);
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}

// ============================================================================
// COMPOSITE KEYS AND VALUES
// ============================================================================

/// Sorter registered for `attr`, or natural order.
pub fn sorter_for<'a>(sorters: &'a BTreeMap<String, Sorter>, attr: &str) -> &'a Sorter {
    static NATURAL: Sorter = Sorter::Natural;
    sorters.get(attr).unwrap_or(&NATURAL)
}

/// Compares two axis keys attribute by attribute.
pub fn compare_keys(
    a: &[String],
    b: &[String],
    attrs: &[String],
    sorters: &BTreeMap<String, Sorter>,
) -> Ordering {
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let ord = match attrs.get(i) {
            Some(attr) => sorter_for(sorters, attr).compare(x, y),
            None => natural_cmp(x, y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Orders aggregate values: null first, then numbers, then text naturally.
pub fn compare_aggregates(a: &AggregateValue, b: &AggregateValue) -> Ordering {
    use AggregateValue::*;
    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Number(x), Number(y)) => x.total_cmp(y),
        (Number(_), Text(_)) => Ordering::Less,
        (Text(_), Number(_)) => Ordering::Greater,
        (Text(x), Text(y)) => natural_cmp(x, y),
    }
}
