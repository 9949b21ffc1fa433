//! Evaluating conditions against a record

use super::condition::{Comparator, Condition};
use crate::error::{Error, Result};
use crate::types::{JsonValue, Record};
use std::cmp::Ordering;

/// Maximum nesting depth of boolean nodes. A chain of the same operator
/// (`a AND b AND c ...`) counts as one level.
const MAX_EXPRESSION_DEPTH: usize = 16;

impl Condition {
    /// Evaluate against a record.
    ///
    /// Missing attributes never compare equal to anything; values of
    /// different types never match an ordering test.
    pub fn matches(&self, record: &Record) -> Result<bool> {
        self.matches_inner(record, 0)
    }

    fn matches_inner(&self, record: &Record, depth: usize) -> Result<bool> {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(Error::expression(format!(
                "expression depth exceeds maximum of {MAX_EXPRESSION_DEPTH}"
            )));
        }

        let matched = match self {
            Condition::Compare { attr, op, value } => match resolve_attr(record, attr) {
                Some(actual) => compare_with(actual, *op, value),
                // Only `<>` holds for an absent attribute
                None => *op == Comparator::Ne,
            },
            Condition::Between { attr, low, high } => resolve_attr(record, attr).is_some_and(|v| {
                matches!(
                    compare_values(v, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare_values(v, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }),
            Condition::BeginsWith { attr, prefix } => {
                matches!(resolve_attr(record, attr), Some(JsonValue::String(s)) if s.starts_with(prefix.as_str()))
            }
            Condition::Contains { attr, value } => match (resolve_attr(record, attr), value) {
                (Some(JsonValue::String(s)), JsonValue::String(needle)) => {
                    s.contains(needle.as_str())
                }
                (Some(JsonValue::Array(items)), item) => items.contains(item),
                _ => false,
            },
            Condition::In { attr, values } => resolve_attr(record, attr).is_some_and(|actual| {
                values
                    .iter()
                    .any(|v| compare_values(actual, v) == Some(Ordering::Equal))
            }),
            Condition::Exists(attr) => resolve_attr(record, attr).is_some(),
            Condition::NotExists(attr) => resolve_attr(record, attr).is_none(),
            Condition::And(left, right) => {
                left.matches_inner(record, self.child_depth(left, depth))?
                    && right.matches_inner(record, self.child_depth(right, depth))?
            }
            Condition::Or(left, right) => {
                left.matches_inner(record, self.child_depth(left, depth))?
                    || right.matches_inner(record, self.child_depth(right, depth))?
            }
            Condition::Not(inner) => !inner.matches_inner(record, depth + 1)?,
        };
        Ok(matched)
    }

    fn child_depth(&self, child: &Condition, depth: usize) -> usize {
        match (self, child) {
            (Condition::And(..), Condition::And(..)) | (Condition::Or(..), Condition::Or(..)) => {
                depth
            }
            _ => depth + 1,
        }
    }
}

fn compare_with(actual: &JsonValue, op: Comparator, expected: &JsonValue) -> bool {
    let ordering = compare_values(actual, expected);
    match op {
        Comparator::Eq => ordering == Some(Ordering::Equal),
        Comparator::Ne => ordering != Some(Ordering::Equal),
        Comparator::Lt => ordering == Some(Ordering::Less),
        Comparator::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        Comparator::Gt => ordering == Some(Ordering::Greater),
        Comparator::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}

/// Resolve a dot-separated attribute path on a record
pub fn resolve_attr<'a>(record: &'a Record, path: &str) -> Option<&'a JsonValue> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Compare two JSON values, returning an ordering if the types are comparable.
///
/// - Numbers: compared as f64
/// - Strings: compared lexicographically
/// - Booleans: false < true
/// - Null == Null
/// - Arrays and objects: equal or incomparable
/// - Mismatched types: returns `None`
pub fn compare_values(left: &JsonValue, right: &JsonValue) -> Option<Ordering> {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Some(a.cmp(b)),
        (JsonValue::Null, JsonValue::Null) => Some(Ordering::Equal),
        (JsonValue::Array(_), JsonValue::Array(_)) | (JsonValue::Object(_), JsonValue::Object(_)) => {
            (left == right).then_some(Ordering::Equal)
        }
        _ => None,
    }
}
