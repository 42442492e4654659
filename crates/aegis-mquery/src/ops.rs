//! Aegis MQuery Operators
//!
//! Deep equality and the comparison operators used by query matchers.
//! Every operator takes the query operand first and the document value
//! second; an absent document value is passed as `None`.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::types::Value;
use aegis_common::{AegisError, Result};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

static ABSENT: Value = Value::Absent;

/// Borrow an optional value, mapping `None` to a hole.
pub(crate) fn or_absent(value: Option<&Value>) -> &Value {
    value.unwrap_or(&ABSENT)
}

// =============================================================================
// Equality
// =============================================================================

/// Structural equality. Numbers compare by value; `Null`, holes and missing
/// map keys are interchangeable.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null | Value::Absent, Value::Null | Value::Absent) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            compare_numbers(a, b) == Some(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.iter()
                .all(|(key, value)| deep_equal(value, or_absent(b.get(key))))
                && b.iter()
                    .filter(|(key, _)| !a.contains_key(*key))
                    .all(|(_, value)| deep_equal(&ABSENT, value))
        }
        _ => false,
    }
}

/// Numeric ordering of two numbers; `None` if either is not numeric.
pub fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        _ => None,
    }
}

// =============================================================================
// Comparison Operators
// =============================================================================

fn ordering(operand: &Value, value: Option<&Value>) -> Option<Ordering> {
    if !operand.is_number() {
        return None;
    }
    compare_numbers(value?, operand)
}

/// `$gt`: value greater than operand.
pub fn gt(operand: &Value, value: Option<&Value>) -> bool {
    ordering(operand, value) == Some(Ordering::Greater)
}

/// `$gte`: value greater than or equal to operand.
pub fn gte(operand: &Value, value: Option<&Value>) -> bool {
    matches!(
        ordering(operand, value),
        Some(Ordering::Greater | Ordering::Equal)
    )
}

/// `$lt`: value less than operand.
pub fn lt(operand: &Value, value: Option<&Value>) -> bool {
    ordering(operand, value) == Some(Ordering::Less)
}

/// `$lte`: value less than or equal to operand.
pub fn lte(operand: &Value, value: Option<&Value>) -> bool {
    matches!(
        ordering(operand, value),
        Some(Ordering::Less | Ordering::Equal)
    )
}

/// `$eq`: deep equality.
pub fn eq(operand: &Value, value: Option<&Value>) -> bool {
    deep_equal(operand, or_absent(value))
}

/// `$ne`: negated deep equality.
pub fn ne(operand: &Value, value: Option<&Value>) -> bool {
    !eq(operand, value)
}

/// `$exists`: a truthy operand requires a defined value, a falsy one an
/// undefined value. `null` counts as defined.
pub fn exists(operand: &Value, value: Option<&Value>) -> bool {
    let defined = value.is_some_and(Value::is_defined);
    operand.is_truthy() == defined
}

/// `$in`: value deep-equals one of the operand elements.
pub fn in_list(operand: &Value, value: Option<&Value>) -> bool {
    match operand {
        Value::Array(candidates) => candidates.iter().any(|c| eq(c, value)),
        _ => false,
    }
}

/// `$nin`: negation of `$in`.
pub fn not_in_list(operand: &Value, value: Option<&Value>) -> bool {
    !in_list(operand, value)
}

/// `$size`: value is an array of exactly `operand` elements.
pub fn size(operand: &Value, value: Option<&Value>) -> bool {
    match (value, operand.as_f64()) {
        (Some(Value::Array(items)), Some(expected)) => items.len() as f64 == expected,
        _ => false,
    }
}

/// `$regex`: pattern matches the value's string form.
pub fn regex(pattern: &Regex, value: Option<&Value>) -> bool {
    value
        .and_then(Value::to_match_string)
        .is_some_and(|text| pattern.is_match(&text))
}

/// Compile a `$regex` pattern with `$options` flags (`i`, `m`, `s`, `x`).
pub fn compile_regex(
    pattern: &str,
    options: &str,
    size_limit: usize,
) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .size_limit(size_limit)
        .build()
}

/// `$mod`: operand is `[divisor, remainder]`; value % divisor == remainder.
///
/// A zero divisor is an error; a malformed operand or a non-numeric value
/// simply does not match.
pub fn modulo(operand: &Value, value: Option<&Value>) -> Result<bool> {
    let (divisor, remainder) = match operand.as_array().map(Vec::as_slice) {
        Some([divisor, remainder]) if divisor.is_number() && remainder.is_number() => {
            (divisor, remainder)
        }
        _ => return Ok(false),
    };

    if divisor.as_f64() == Some(0.0) {
        return Err(AegisError::Arithmetic("$mod by zero".to_string()));
    }

    let result = match (value, divisor) {
        (Some(Value::Int(n)), Value::Int(d)) => Value::Int(n.wrapping_rem(*d)),
        (Some(v @ (Value::Int(_) | Value::Float(_))), d) => match (v.as_f64(), d.as_f64()) {
            (Some(n), Some(d)) => Value::Float(n % d),
            _ => return Ok(false),
        },
        _ => return Ok(false),
    };

    Ok(compare_numbers(&result, remainder) == Some(Ordering::Equal))
}

/// `$all`: value is an array containing every operand element.
pub fn all(operand: &Value, value: Option<&Value>) -> bool {
    match (operand, value) {
        (Value::Array(required), Some(Value::Array(items))) => required
            .iter()
            .all(|r| items.iter().any(|item| deep_equal(r, item))),
        _ => false,
    }
}

// =============================================================================
// Tests
// =============================================================================
