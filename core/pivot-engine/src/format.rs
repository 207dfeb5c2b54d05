//! FILENAME: core/pivot-engine/src/format.rs
//! Display formatting for aggregate values.
//!
//! A `NumberFormat` scales, rounds, groups thousands, and wraps the result in
//! a prefix/suffix. Non-finite input renders as an empty string.

/// Number display configuration used by aggregator formatters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberFormat {
    pub digits_after_decimal: u8,
    pub scaler: f64,
    pub thousands_sep: char,
    pub decimal_sep: char,
    pub prefix: &'static str,
    pub suffix: &'static str,
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::us()
    }
}

impl NumberFormat {
    /// Two decimals with comma grouping: `1,234.57`.
    pub const fn us() -> Self {
        NumberFormat {
            digits_after_decimal: 2,
            scaler: 1.0,
            thousands_sep: ',',
            decimal_sep: '.',
            prefix: "",
            suffix: "",
        }
    }

    /// Whole numbers with comma grouping: `1,235`.
    pub const fn us_int() -> Self {
        NumberFormat {
            digits_after_decimal: 0,
            ..NumberFormat::us()
        }
    }

    /// Fractions as percentages with one decimal: `12.3%`.
    pub const fn us_pct() -> Self {
        NumberFormat {
            digits_after_decimal: 1,
            scaler: 100.0,
            suffix: "%",
            ..NumberFormat::us()
        }
    }

    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return String::new();
        }
        let scaled = value * self.scaler;
        if !scaled.is_finite() {
            return String::new();
        }
        let rounded = format!("{:.prec$}", scaled, prec = self.digits_after_decimal as usize);
        let grouped = group_thousands(&rounded, self.thousands_sep, self.decimal_sep);
        format!("{}{}{}", self.prefix, grouped, self.suffix)
    }
}

/// Inserts `thousands_sep` into the integer part of a plain decimal string
/// and swaps in `decimal_sep` for the decimal point.
fn group_thousands(s: &str, thousands_sep: char, decimal_sep: char) -> String {
    let (integer_part, fraction) = match s.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (s, None),
    };

    let negative = integer_part.starts_with('-');
    let digits = integer_part.trim_start_matches('-');
    let len = digits.len();

    // "-0.00" after rounding is printed without the sign.
    let all_zero = s.chars().all(|c| matches!(c, '-' | '0' | '.'));

    let mut result = String::with_capacity(s.len() + len / 3 + 1);
    if negative && !all_zero {
        result.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(thousands_sep);
        }
        result.push(c);
    }

    if let Some(frac) = fraction {
        result.push(decimal_sep);
        result.push_str(frac);
    }
    result
}
