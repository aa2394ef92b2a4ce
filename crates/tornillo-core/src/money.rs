//! Coercion of untyped input into prices and quantities.
//!
//! Every value that enters the cart from the network, from persisted JSON or
//! from user input passes through these helpers. They never fail: anything
//! that cannot be read as a number falls back to a default, so a cart line
//! always has `price >= 0` and `quantity >= 1`.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

/// Reads `value` as a decimal number, returning `default` when it is not one.
///
/// JSON numbers and numeric strings (surrounding whitespace ignored) are
/// accepted. Strings in scientific notation such as `"1e3"` are accepted too.
/// Everything else, including `null`, booleans, the empty string and
/// non-finite text like `"NaN"`, yields `default`.
#[must_use]
pub fn to_number(value: &Value, default: Decimal) -> Decimal {
    match value {
        Value::Number(n) => number_to_decimal(n).unwrap_or(default),
        Value::String(s) => parse_decimal(s).unwrap_or(default),
        _ => default,
    }
}

/// Reads `value` as a non-negative price. Unreadable input is `0`, negative
/// input is clamped to `0`.
#[must_use]
pub fn to_price(value: &Value) -> Decimal {
    to_number(value, Decimal::ZERO).max(Decimal::ZERO)
}

/// Reads `value` as a line quantity: floored, at least `1`, saturating at
/// `u32::MAX`.
#[must_use]
pub fn to_quantity(value: &Value) -> u32 {
    clamp_quantity(to_number(value, Decimal::ONE))
}

/// Same as [`to_quantity`] for raw text (a keystroke or a CLI argument).
#[must_use]
pub fn parse_quantity(text: &str) -> u32 {
    clamp_quantity(parse_decimal(text).unwrap_or(Decimal::ONE))
}

fn clamp_quantity(n: Decimal) -> u32 {
    let floored = n.floor();
    if floored < Decimal::ONE {
        return 1;
    }
    floored.to_u32().unwrap_or(u32::MAX)
}

fn number_to_decimal(n: &serde_json::Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Decimal::from(u));
    }
    n.as_f64().and_then(|f| Decimal::try_from(f).ok())
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}
