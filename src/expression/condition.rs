//! Condition trees and their builders

use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    /// Operator as it appears in expression text
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// A boolean condition over one record.
///
/// Attribute names may be dot-separated paths into nested maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Compare {
        attr: String,
        op: Comparator,
        value: JsonValue,
    },
    Between {
        attr: String,
        low: JsonValue,
        high: JsonValue,
    },
    BeginsWith {
        attr: String,
        prefix: String,
    },
    Contains {
        attr: String,
        value: JsonValue,
    },
    In {
        attr: String,
        values: Vec<JsonValue>,
    },
    Exists(String),
    NotExists(String),

    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Both conditions hold
    #[must_use]
    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    /// Either condition holds
    #[must_use]
    pub fn or(self, other: Condition) -> Condition {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Negation
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }

    /// Leaf conditions of a tree of `And` nodes, left to right.
    ///
    /// An `Or` or `Not` node is returned as a single leaf.
    pub fn conjuncts(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        collect_conjuncts(self, &mut out);
        out
    }

    /// The attribute a leaf condition tests, `None` for boolean nodes
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::Compare { attr, .. }
            | Self::Between { attr, .. }
            | Self::BeginsWith { attr, .. }
            | Self::Contains { attr, .. }
            | Self::In { attr, .. } => Some(attr),
            Self::Exists(attr) | Self::NotExists(attr) => Some(attr),
            Self::And(..) | Self::Or(..) | Self::Not(..) => None,
        }
    }
}

fn collect_conjuncts<'a>(condition: &'a Condition, out: &mut Vec<&'a Condition>) {
    match condition {
        Condition::And(left, right) => {
            collect_conjuncts(left, out);
            collect_conjuncts(right, out);
        }
        other => out.push(other),
    }
}

/// Fold a list of conditions with AND. `None` for an empty list.
pub fn combine_all<I>(conditions: I) -> Option<Condition>
where
    I: IntoIterator<Item = Condition>,
{
    conditions.into_iter().reduce(Condition::and)
}

/// Fold a list of conditions with OR. `None` for an empty list.
pub fn combine_any<I>(conditions: I) -> Option<Condition>
where
    I: IntoIterator<Item = Condition>,
{
    conditions.into_iter().reduce(Condition::or)
}

// ============================================================================
// Attribute (filter) builder
// ============================================================================

/// Builder for filter and update conditions on a non-key attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    name: String,
}

impl Attr {
    /// Refer to an attribute by name or dotted path
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn compare(self, op: Comparator, value: impl Into<JsonValue>) -> Condition {
        Condition::Compare {
            attr: self.name,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<JsonValue>) -> Condition {
        self.compare(Comparator::Eq, value)
    }

    pub fn ne(self, value: impl Into<JsonValue>) -> Condition {
        self.compare(Comparator::Ne, value)
    }

    pub fn lt(self, value: impl Into<JsonValue>) -> Condition {
        self.compare(Comparator::Lt, value)
    }

    pub fn le(self, value: impl Into<JsonValue>) -> Condition {
        self.compare(Comparator::Le, value)
    }

    pub fn gt(self, value: impl Into<JsonValue>) -> Condition {
        self.compare(Comparator::Gt, value)
    }

    pub fn ge(self, value: impl Into<JsonValue>) -> Condition {
        self.compare(Comparator::Ge, value)
    }

    pub fn between(self, low: impl Into<JsonValue>, high: impl Into<JsonValue>) -> Condition {
        Condition::Between {
            attr: self.name,
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn begins_with(self, prefix: impl Into<String>) -> Condition {
        Condition::BeginsWith {
            attr: self.name,
            prefix: prefix.into(),
        }
    }

    pub fn contains(self, value: impl Into<JsonValue>) -> Condition {
        Condition::Contains {
            attr: self.name,
            value: value.into(),
        }
    }

    /// Matches if the attribute equals any of the values
    pub fn is_in<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        Condition::In {
            attr: self.name,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exists(self) -> Condition {
        Condition::Exists(self.name)
    }

    pub fn not_exists(self) -> Condition {
        Condition::NotExists(self.name)
    }
}

// ============================================================================
// Key condition builder
// ============================================================================

/// Builder for key conditions. Only the operators a store accepts on key
/// attributes are offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    name: String,
}

impl Key {
    /// Refer to a key attribute
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn attr(self) -> Attr {
        Attr { name: self.name }
    }

    pub fn eq(self, value: impl Into<JsonValue>) -> KeyCondition {
        KeyCondition(self.attr().eq(value))
    }

    pub fn lt(self, value: impl Into<JsonValue>) -> KeyCondition {
        KeyCondition(self.attr().lt(value))
    }

    pub fn le(self, value: impl Into<JsonValue>) -> KeyCondition {
        KeyCondition(self.attr().le(value))
    }

    pub fn gt(self, value: impl Into<JsonValue>) -> KeyCondition {
        KeyCondition(self.attr().gt(value))
    }

    pub fn ge(self, value: impl Into<JsonValue>) -> KeyCondition {
        KeyCondition(self.attr().ge(value))
    }

    pub fn between(self, low: impl Into<JsonValue>, high: impl Into<JsonValue>) -> KeyCondition {
        KeyCondition(self.attr().between(low, high))
    }

    pub fn begins_with(self, prefix: impl Into<String>) -> KeyCondition {
        KeyCondition(self.attr().begins_with(prefix))
    }
}

/// A key condition: partition equality, optionally AND one sort-key test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCondition(Condition);

impl KeyCondition {
    /// Combine with another key condition
    #[must_use]
    pub fn and(self, other: KeyCondition) -> KeyCondition {
        KeyCondition(self.0.and(other.0))
    }

    /// The underlying condition tree
    pub fn condition(&self) -> &Condition {
        &self.0
    }

    /// Split into the partition value and the optional sort-key condition.
    ///
    /// Fails unless there is exactly one equality on `partition_key` and at
    /// most one other test, on `sort_key`.
    pub fn split<'a>(
        &'a self,
        partition_key: &str,
        sort_key: Option<&str>,
    ) -> Result<(&'a JsonValue, Option<&'a Condition>)> {
        let mut partition = None;
        let mut sort = None;

        for leaf in self.0.conjuncts() {
            match leaf {
                Condition::Compare {
                    attr,
                    op: Comparator::Eq,
                    value,
                } if attr == partition_key && partition.is_none() => partition = Some(value),
                leaf if leaf.attribute().is_some() && leaf.attribute() == sort_key => {
                    if sort.is_some() {
                        return Err(Error::validation(format!(
                            "key condition tests sort key '{}' more than once",
                            leaf.attribute().unwrap_or_default()
                        )));
                    }
                    sort = Some(leaf);
                }
                leaf => {
                    return Err(Error::validation(format!(
                        "unsupported key condition on '{}'",
                        leaf.attribute().unwrap_or("<compound>")
                    )));
                }
            }
        }

        let partition = partition.ok_or_else(|| {
            Error::validation(format!(
                "key condition must test '{partition_key}' for equality"
            ))
        })?;
        Ok((partition, sort))
    }
}

impl From<KeyCondition> for Condition {
    fn from(key: KeyCondition) -> Self {
        key.0
    }
}
