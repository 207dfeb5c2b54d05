//! FILENAME: core/pivot-engine/src/aggregator.rs
//! Aggregator framework.
//!
//! Every aggregator is built in two stages:
//! 1. `AggregatorKind::template(vals)` binds the value attribute(s) it reads
//! 2. `AggregatorTemplate::bind(ctx)` produces a fresh `Accumulator` for one
//!    tree coordinate (cell, row margin, column margin or grand total)
//!
//! Accumulators absorb records with `push`, report with `value` and render
//! with `format`. Fraction accumulators only hold their numerator; the
//! engine divides by the matching margin when the value is read.

use std::collections::BTreeMap;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::format::NumberFormat;
use crate::ordering::{natural_cmp, sorter_for, Sorter};
use crate::value::{Record, Value};

// ============================================================================
// AGGREGATE VALUE
// ============================================================================

/// The scalar reported by an accumulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl AggregateValue {
    /// Wraps a number; non-finite numbers become `Null`.
    pub fn number(n: f64) -> Self {
        if n.is_finite() {
            AggregateValue::Number(n)
        } else {
            AggregateValue::Null
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AggregateValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AggregateValue::Null)
    }

    /// Display string using `fmt` for numbers.
    pub fn render(&self, fmt: &NumberFormat) -> String {
        match self {
            AggregateValue::Null => String::new(),
            AggregateValue::Number(n) => fmt.format(*n),
            AggregateValue::Text(s) => s.clone(),
        }
    }
}

// ============================================================================
// AGGREGATOR KINDS
// ============================================================================

/// Numerator wrapped by a fraction aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FractionBase {
    Sum,
    Count,
}

/// Which margin a fraction aggregator divides by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FractionScope {
    /// Grand total: both keys empty.
    Total,
    /// Row margin: column key empty.
    Row,
    /// Column margin: row key empty.
    Column,
}

impl FractionScope {
    /// The coordinate of the denominator for a cell at (`row`, `col`).
    pub fn margin<'a>(&self, row: &'a [String], col: &'a [String]) -> (&'a [String], &'a [String]) {
        match self {
            FractionScope::Total => (&[], &[]),
            FractionScope::Row => (row, &[]),
            FractionScope::Column => (&[], col),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregatorKind {
    Count,
    CountUniqueValues,
    ListUniqueValues,
    Sum,
    IntegerSum,
    Average,
    Median,
    SampleVariance,
    SampleStdDev,
    Minimum,
    Maximum,
    First,
    Last,
    SumOverSum,
    Fraction { base: FractionBase, scope: FractionScope },
    /// Unknown name or unbound value attribute. Never reports a value.
    Null,
}

const AGGREGATORS: &[(&str, AggregatorKind)] = &[
    ("Count", AggregatorKind::Count),
    ("Count Unique Values", AggregatorKind::CountUniqueValues),
    ("List Unique Values", AggregatorKind::ListUniqueValues),
    ("Sum", AggregatorKind::Sum),
    ("Integer Sum", AggregatorKind::IntegerSum),
    ("Average", AggregatorKind::Average),
    ("Median", AggregatorKind::Median),
    ("Sample Variance", AggregatorKind::SampleVariance),
    ("Sample Standard Deviation", AggregatorKind::SampleStdDev),
    ("Minimum", AggregatorKind::Minimum),
    ("Maximum", AggregatorKind::Maximum),
    ("First", AggregatorKind::First),
    ("Last", AggregatorKind::Last),
    ("Sum over Sum", AggregatorKind::SumOverSum),
    (
        "Sum as Fraction of Total",
        AggregatorKind::Fraction { base: FractionBase::Sum, scope: FractionScope::Total },
    ),
    (
        "Sum as Fraction of Rows",
        AggregatorKind::Fraction { base: FractionBase::Sum, scope: FractionScope::Row },
    ),
    (
        "Sum as Fraction of Columns",
        AggregatorKind::Fraction { base: FractionBase::Sum, scope: FractionScope::Column },
    ),
    (
        "Count as Fraction of Total",
        AggregatorKind::Fraction { base: FractionBase::Count, scope: FractionScope::Total },
    ),
    (
        "Count as Fraction of Rows",
        AggregatorKind::Fraction { base: FractionBase::Count, scope: FractionScope::Row },
    ),
    (
        "Count as Fraction of Columns",
        AggregatorKind::Fraction { base: FractionBase::Count, scope: FractionScope::Column },
    ),
];

impl AggregatorKind {
    /// Looks up a kind by display name. Unknown names map to `Null`.
    pub fn from_name(name: &str) -> Self {
        AGGREGATORS
            .iter()
            .find(|(n, _)| *n == name)
            .map_or(AggregatorKind::Null, |(_, kind)| *kind)
    }

    /// All known aggregator names, in display order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        AGGREGATORS.iter().map(|(n, _)| *n)
    }

    /// Value-attribute slots the aggregator exposes to a selection UI.
    pub fn num_inputs(&self) -> usize {
        match self {
            AggregatorKind::SumOverSum => 2,
            AggregatorKind::Fraction { base, .. } => base.kind().num_inputs(),
            _ => 0,
        }
    }

    /// Value attributes that must be bound for the aggregator to work.
    pub fn required_attributes(&self) -> usize {
        match self {
            AggregatorKind::Count | AggregatorKind::Null => 0,
            AggregatorKind::SumOverSum => 2,
            AggregatorKind::Fraction { base, .. } => base.kind().required_attributes(),
            _ => 1,
        }
    }

    /// Stage one: bind value attributes. Too few attributes yields a
    /// `Null` template.
    pub fn template(self, vals: &[String]) -> AggregatorTemplate {
        let needed = self.required_attributes();
        if vals.len() < needed {
            return AggregatorTemplate {
                kind: AggregatorKind::Null,
                attrs: SmallVec::new(),
            };
        }
        AggregatorTemplate {
            kind: self,
            attrs: vals[..needed].iter().cloned().collect(),
        }
    }

    pub fn formatter(&self) -> NumberFormat {
        match self {
            AggregatorKind::Count
            | AggregatorKind::CountUniqueValues
            | AggregatorKind::IntegerSum => NumberFormat::us_int(),
            AggregatorKind::Fraction { .. } => NumberFormat::us_pct(),
            _ => NumberFormat::us(),
        }
    }
}

impl FractionBase {
    pub fn kind(&self) -> AggregatorKind {
        match self {
            FractionBase::Sum => AggregatorKind::Sum,
            FractionBase::Count => AggregatorKind::Count,
        }
    }
}

// ============================================================================
// TEMPLATE AND CONTEXT
// ============================================================================

/// Tree-wide context handed to stage two.
#[derive(Debug, Clone, Copy)]
pub struct BindContext<'a> {
    pub sorters: &'a BTreeMap<String, Sorter>,
}

/// An aggregator with its value attributes bound.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorTemplate {
    kind: AggregatorKind,
    attrs: SmallVec<[String; 2]>,
}

impl AggregatorTemplate {
    pub fn kind(&self) -> AggregatorKind {
        self.kind
    }

    pub fn attrs(&self) -> &[String] {
        &self.attrs
    }

    /// Stage two: a fresh accumulator for one tree coordinate.
    pub fn bind(&self, ctx: &BindContext<'_>) -> Accumulator {
        let attr = || self.attrs.first().cloned().unwrap_or_default();
        match self.kind {
            AggregatorKind::Null => Accumulator::Null,
            AggregatorKind::Count => Accumulator::Count(0),
            AggregatorKind::Sum => Accumulator::Sum(SumState::new(attr(), false)),
            AggregatorKind::IntegerSum => Accumulator::Sum(SumState::new(attr(), true)),
            AggregatorKind::Average => Accumulator::Stat(RunningStat::new(attr(), StatMode::Mean)),
            AggregatorKind::SampleVariance => {
                Accumulator::Stat(RunningStat::new(attr(), StatMode::Variance))
            }
            AggregatorKind::SampleStdDev => {
                Accumulator::Stat(RunningStat::new(attr(), StatMode::StdDev))
            }
            AggregatorKind::Median => Accumulator::Quantile(QuantileState::new(attr(), 0.5)),
            AggregatorKind::Minimum => Accumulator::Extreme(ExtremeState::new(attr(), Extreme::Min, None)),
            AggregatorKind::Maximum => Accumulator::Extreme(ExtremeState::new(attr(), Extreme::Max, None)),
            AggregatorKind::First | AggregatorKind::Last => {
                let which = if self.kind == AggregatorKind::First {
                    Extreme::First
                } else {
                    Extreme::Last
                };
                let a = attr();
                let sorter = sorter_for(ctx.sorters, &a).clone();
                Accumulator::Extreme(ExtremeState::new(a, which, Some(sorter)))
            }
            AggregatorKind::CountUniqueValues => {
                Accumulator::Uniques(UniqueState::new(attr(), UniqueMode::Count))
            }
            AggregatorKind::ListUniqueValues => {
                Accumulator::Uniques(UniqueState::new(attr(), UniqueMode::List))
            }
            AggregatorKind::SumOverSum => Accumulator::Ratio(RatioState {
                num_attr: attr(),
                den_attr: self.attrs.get(1).cloned().unwrap_or_default(),
                num: 0.0,
                den: 0.0,
            }),
            AggregatorKind::Fraction { base, scope } => {
                let inner = AggregatorTemplate {
                    kind: base.kind(),
                    attrs: self.attrs.clone(),
                };
                Accumulator::Fraction(FractionState {
                    scope,
                    inner: Box::new(inner.bind(ctx)),
                })
            }
        }
    }
}

// ============================================================================
// ACCUMULATORS
// ============================================================================

#[derive(Debug, Clone)]
pub struct SumState {
    attr: String,
    integer: bool,
    sum: f64,
}

impl SumState {
    fn new(attr: String, integer: bool) -> Self {
        SumState { attr, integer, sum: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatMode {
    Mean,
    Variance,
    StdDev,
}

/// Welford's online mean/variance.
#[derive(Debug, Clone)]
pub struct RunningStat {
    attr: String,
    mode: StatMode,
    n: u64,
    mean: f64,
    m2: f64,
}

/// Degrees of freedom for the sample variance.
const DDOF: u64 = 1;

impl RunningStat {
    fn new(attr: String, mode: StatMode) -> Self {
        RunningStat { attr, mode, n: 0, mean: 0.0, m2: 0.0 }
    }

    fn add_number(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn value(&self) -> AggregateValue {
        match self.mode {
            StatMode::Mean if self.n == 0 => AggregateValue::Null,
            StatMode::Mean => AggregateValue::number(self.mean),
            _ if self.n <= DDOF => AggregateValue::Number(0.0),
            StatMode::Variance => AggregateValue::number(self.m2 / (self.n - DDOF) as f64),
            StatMode::StdDev => AggregateValue::number((self.m2 / (self.n - DDOF) as f64).sqrt()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
    First,
    Last,
}

#[derive(Debug, Clone)]
pub struct ExtremeState {
    attr: String,
    which: Extreme,
    sorter: Option<Sorter>,
    best: Option<Value>,
}

impl ExtremeState {
    fn new(attr: String, which: Extreme, sorter: Option<Sorter>) -> Self {
        ExtremeState { attr, which, sorter, best: None }
    }

    fn push(&mut self, record: &Record) {
        let Some(candidate) = record.get(&self.attr) else {
            return;
        };
        match self.which {
            Extreme::Min | Extreme::Max => {
                let Some(x) = candidate.as_number() else {
                    return;
                };
                let replace = match self.best.as_ref().and_then(Value::as_number) {
                    None => true,
                    Some(cur) if self.which == Extreme::Min => x < cur,
                    Some(cur) => x > cur,
                };
                if replace {
                    self.best = Some(Value::Number(x));
                }
            }
            Extreme::First | Extreme::Last => {
                if candidate.is_null() {
                    return;
                }
                let replace = match &self.best {
                    None => true,
                    Some(cur) => {
                        let ord = self.compare(candidate, cur);
                        if self.which == Extreme::First {
                            ord != Ordering::Greater
                        } else {
                            ord != Ordering::Less
                        }
                    }
                };
                if replace {
                    self.best = Some(candidate.clone());
                }
            }
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let (a, b) = (a.to_string(), b.to_string());
        match &self.sorter {
            Some(sorter) => sorter.compare(&a, &b),
            None => natural_cmp(&a, &b),
        }
    }

    fn value(&self) -> AggregateValue {
        match &self.best {
            None | Some(Value::Null) => AggregateValue::Null,
            Some(Value::Number(n)) => AggregateValue::number(*n),
            Some(other) => AggregateValue::Text(other.to_string()),
        }
    }
}

/// Buffers numeric inputs; the quantile is taken at read time.
#[derive(Debug, Clone)]
pub struct QuantileState {
    attr: String,
    q: f64,
    vals: Vec<f64>,
}

impl QuantileState {
    fn new(attr: String, q: f64) -> Self {
        QuantileState { attr, q, vals: Vec::new() }
    }

    fn value(&self) -> AggregateValue {
        if self.vals.is_empty() {
            return AggregateValue::Null;
        }
        let mut sorted = self.vals.clone();
        sorted.sort_by(f64::total_cmp);
        let i = (sorted.len() - 1) as f64 * self.q;
        let lo = sorted[i.floor() as usize];
        let hi = sorted[i.ceil() as usize];
        AggregateValue::number((lo + hi) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueMode {
    Count,
    List,
}

#[derive(Debug, Clone)]
pub struct UniqueState {
    attr: String,
    mode: UniqueMode,
    seen: Vec<Value>,
}

impl UniqueState {
    fn new(attr: String, mode: UniqueMode) -> Self {
        UniqueState { attr, mode, seen: Vec::new() }
    }

    fn push(&mut self, record: &Record) {
        let value = record.get(&self.attr).cloned().unwrap_or_default();
        if !self.seen.contains(&value) {
            self.seen.push(value);
        }
    }

    fn value(&self) -> AggregateValue {
        match self.mode {
            UniqueMode::Count => AggregateValue::Number(self.seen.len() as f64),
            UniqueMode::List => {
                let parts: Vec<String> = self
                    .seen
                    .iter()
                    .map(|v| if v.is_null() { String::new() } else { v.to_string() })
                    .collect();
                AggregateValue::Text(parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RatioState {
    num_attr: String,
    den_attr: String,
    num: f64,
    den: f64,
}

#[derive(Debug, Clone)]
pub struct FractionState {
    scope: FractionScope,
    inner: Box<Accumulator>,
}

impl FractionState {
    pub fn scope(&self) -> FractionScope {
        self.scope
    }

    pub fn numerator(&self) -> AggregateValue {
        self.inner.value()
    }
}

/// Per-coordinate aggregation state.
#[derive(Debug, Clone)]
pub enum Accumulator {
    Null,
    Count(u64),
    Sum(SumState),
    Stat(RunningStat),
    Extreme(ExtremeState),
    Quantile(QuantileState),
    Uniques(UniqueState),
    Ratio(RatioState),
    Fraction(FractionState),
}

fn number_at(record: &Record, attr: &str) -> Option<f64> {
    record.get(attr).and_then(Value::as_number)
}

impl Accumulator {
    /// Absorbs one record. Non-numeric inputs are skipped where a number
    /// is expected.
    pub fn push(&mut self, record: &Record) {
        match self {
            Accumulator::Null => {}
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(s) => {
                if let Some(x) = number_at(record, &s.attr) {
                    s.sum += if s.integer { x.trunc() } else { x };
                }
            }
            Accumulator::Stat(s) => {
                if let Some(x) = number_at(record, &s.attr) {
                    s.add_number(x);
                }
            }
            Accumulator::Extreme(e) => e.push(record),
            Accumulator::Quantile(q) => {
                if let Some(x) = number_at(record, &q.attr) {
                    q.vals.push(x);
                }
            }
            Accumulator::Uniques(u) => u.push(record),
            Accumulator::Ratio(r) => {
                if let Some(x) = number_at(record, &r.num_attr) {
                    r.num += x;
                }
                if let Some(x) = number_at(record, &r.den_attr) {
                    r.den += x;
                }
            }
            Accumulator::Fraction(f) => f.inner.push(record),
        }
    }

    /// The context-free value. For a fraction this is its numerator; the
    /// engine resolves the denominator from the tree.
    pub fn value(&self) -> AggregateValue {
        match self {
            Accumulator::Null => AggregateValue::Null,
            Accumulator::Count(n) => AggregateValue::Number(*n as f64),
            Accumulator::Sum(s) => AggregateValue::number(s.sum),
            Accumulator::Stat(s) => s.value(),
            Accumulator::Extreme(e) => e.value(),
            Accumulator::Quantile(q) => q.value(),
            Accumulator::Uniques(u) => u.value(),
            Accumulator::Ratio(r) => {
                if r.den == 0.0 {
                    AggregateValue::Number(0.0)
                } else {
                    AggregateValue::number(r.num / r.den)
                }
            }
            Accumulator::Fraction(f) => f.numerator(),
        }
    }

    pub fn as_fraction(&self) -> Option<&FractionState> {
        match self {
            Accumulator::Fraction(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    fn bind(name: &str, vals: &[&str]) -> Accumulator {
        let vals: Vec<String> = vals.iter().map(|s| s.to_string()).collect();
        let sorters = BTreeMap::new();
        AggregatorKind::from_name(name)
            .template(&vals)
            .bind(&BindContext { sorters: &sorters })
    }

    fn feed(acc: &mut Accumulator, attr: &str, values: &[Value]) {
        for v in values {
            acc.push(&record! { attr => v.clone() });
        }
    }

    #[test]
    fn test_name_table_round_trips() {
        for name in AggregatorKind::names() {
            assert_ne!(AggregatorKind::from_name(name), AggregatorKind::Null, "{}", name);
        }
        assert_eq!(AggregatorKind::names().count(), 20);
        assert_eq!(AggregatorKind::from_name("Bogus"), AggregatorKind::Null);
    }

    #[test]
    fn test_num_inputs() {
        assert_eq!(AggregatorKind::Count.num_inputs(), 0);
        assert_eq!(AggregatorKind::Sum.num_inputs(), 0);
        assert_eq!(AggregatorKind::SumOverSum.num_inputs(), 2);
        assert_eq!(AggregatorKind::from_name("Sum as Fraction of Rows").num_inputs(), 0);
    }

    #[test]
    fn test_missing_binding_is_null() {
        let mut acc = bind("Sum", &[]);
        acc.push(&record! { "n" => 1 });
        assert_eq!(acc.value(), AggregateValue::Null);

        let acc = bind("Sum over Sum", &["a"]);
        assert!(matches!(acc, Accumulator::Null));
    }

    #[test]
    fn test_count_and_sum_skip_non_numeric() {
        let mut count = bind("Count", &[]);
        let mut sum = bind("Sum", &["n"]);
        for r in [record! { "n" => 2 }, record! { "n" => "x" }, record! {}, record! { "n" => " 3.5" }] {
            count.push(&r);
            sum.push(&r);
        }
        assert_eq!(count.value(), AggregateValue::Number(4.0));
        assert_eq!(sum.value(), AggregateValue::Number(5.5));
    }

    #[test]
    fn test_integer_sum_truncates() {
        let mut acc = bind("Integer Sum", &["n"]);
        feed(&mut acc, "n", &[Value::from(1.9), Value::from(2.2)]);
        assert_eq!(acc.value(), AggregateValue::Number(3.0));
    }

    #[test]
    fn test_average_variance_stdev() {
        let values: Vec<Value> = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].iter().map(|&x| Value::from(x)).collect();
        let mut avg = bind("Average", &["n"]);
        let mut var = bind("Sample Variance", &["n"]);
        let mut sd = bind("Sample Standard Deviation", &["n"]);
        feed(&mut avg, "n", &values);
        feed(&mut var, "n", &values);
        feed(&mut sd, "n", &values);

        assert_eq!(avg.value(), AggregateValue::Number(5.0));
        let v = var.value().as_number().unwrap();
        assert!((v - 32.0 / 7.0).abs() < 1e-12);
        let s = sd.value().as_number().unwrap();
        assert!((s - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_stats() {
        let avg = bind("Average", &["n"]);
        assert_eq!(avg.value(), AggregateValue::Null);

        let mut var = bind("Sample Variance", &["n"]);
        feed(&mut var, "n", &[Value::from(3.0)]);
        assert_eq!(var.value(), AggregateValue::Number(0.0));
    }

    #[test]
    fn test_median() {
        let mut odd = bind("Median", &["n"]);
        feed(&mut odd, "n", &[Value::from(5), Value::from(1), Value::from(3)]);
        assert_eq!(odd.value(), AggregateValue::Number(3.0));

        let mut even = bind("Median", &["n"]);
        feed(&mut even, "n", &[Value::from(4), Value::from(1), Value::from(3), Value::from(2)]);
        assert_eq!(even.value(), AggregateValue::Number(2.5));

        assert_eq!(bind("Median", &["n"]).value(), AggregateValue::Null);
    }

    #[test]
    fn test_min_max() {
        let mut min = bind("Minimum", &["n"]);
        let mut max = bind("Maximum", &["n"]);
        let values = [Value::from(3), Value::from("-2"), Value::from("abc"), Value::from(8)];
        feed(&mut min, "n", &values);
        feed(&mut max, "n", &values);
        assert_eq!(min.value(), AggregateValue::Number(-2.0));
        assert_eq!(max.value(), AggregateValue::Number(8.0));
    }

    #[test]
    fn test_first_last_use_key_order() {
        let mut first = bind("First", &["s"]);
        let mut last = bind("Last", &["s"]);
        let values = [Value::from("item10"), Value::from("item2"), Value::from("item9")];
        feed(&mut first, "s", &values);
        feed(&mut last, "s", &values);
        assert_eq!(first.value(), AggregateValue::Text("item2".into()));
        assert_eq!(last.value(), AggregateValue::Text("item10".into()));
    }

    #[test]
    fn test_first_uses_bound_sorter() {
        let mut sorters = BTreeMap::new();
        sorters.insert("s".to_string(), Sorter::explicit(["z", "a"]));
        let mut acc = AggregatorKind::First
            .template(&["s".to_string()])
            .bind(&BindContext { sorters: &sorters });
        feed(&mut acc, "s", &[Value::from("a"), Value::from("z")]);
        assert_eq!(acc.value(), AggregateValue::Text("z".into()));
    }

    #[test]
    fn test_unique_values_nan_dedup() {
        let mut count = bind("Count Unique Values", &["v"]);
        let mut list = bind("List Unique Values", &["v"]);
        let values = [
            Value::from(f64::NAN),
            Value::from(f64::NAN),
            Value::from(1),
            Value::from("1"),
            Value::from(1),
        ];
        feed(&mut count, "v", &values);
        feed(&mut list, "v", &values);
        assert_eq!(count.value(), AggregateValue::Number(3.0));
        assert_eq!(list.value(), AggregateValue::Text("NaN, 1, 1".into()));
    }

    #[test]
    fn test_sum_over_sum() {
        let mut acc = bind("Sum over Sum", &["a", "b"]);
        acc.push(&record! { "a" => 3, "b" => 4 });
        acc.push(&record! { "a" => 1, "b" => 4 });
        assert_eq!(acc.value(), AggregateValue::Number(0.5));

        let mut zero = bind("Sum over Sum", &["a", "b"]);
        zero.push(&record! { "a" => 3, "b" => 0 });
        assert_eq!(zero.value(), AggregateValue::Number(0.0));
    }

    #[test]
    fn test_fraction_holds_numerator() {
        let mut acc = bind("Sum as Fraction of Total", &["n"]);
        feed(&mut acc, "n", &[Value::from(2), Value::from(3)]);
        assert_eq!(acc.value(), AggregateValue::Number(5.0));
        assert_eq!(acc.as_fraction().map(FractionState::scope), Some(FractionScope::Total));
    }

    #[test]
    fn test_formatters() {
        assert_eq!(AggregatorKind::Count.formatter().format(1234.0), "1,234");
        assert_eq!(AggregatorKind::Sum.formatter().format(1234.5), "1,234.50");
        assert_eq!(
            AggregatorKind::from_name("Count as Fraction of Columns").formatter().format(0.25),
            "25.0%"
        );
        assert_eq!(AggregateValue::Null.render(&NumberFormat::us()), "");
    }
}
