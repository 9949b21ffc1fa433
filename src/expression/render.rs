//! Rendering conditions to store expression text
//!
//! Attribute names become `#n<i>` placeholders and values become `:v<i>`
//! placeholders, so reserved words and arbitrary values never appear inline.

use super::condition::{Condition, KeyCondition};
use crate::types::JsonValue;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Expression text plus its placeholder maps
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedExpression {
    /// Expression text
    pub expression: String,
    /// `#n<i>` placeholder to attribute name
    pub names: BTreeMap<String, String>,
    /// `:v<i>` placeholder to value
    pub values: BTreeMap<String, JsonValue>,
}

/// Renders several expressions that share one set of placeholders
#[derive(Debug, Default)]
pub struct ExpressionRenderer {
    names: BTreeMap<String, String>,
    name_lookup: HashMap<String, String>,
    values: BTreeMap<String, JsonValue>,
}

impl ExpressionRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder path for an attribute name or dotted path
    pub fn name(&mut self, path: &str) -> String {
        path.split('.')
            .map(|segment| self.name_segment(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn name_segment(&mut self, segment: &str) -> String {
        if let Some(placeholder) = self.name_lookup.get(segment) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), segment.to_string());
        self.name_lookup
            .insert(segment.to_string(), placeholder.clone());
        placeholder
    }

    /// Fresh placeholder for a value
    pub fn value(&mut self, value: &JsonValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    /// Render a condition tree
    pub fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare { attr, op, value } => {
                let name = self.name(attr);
                let value = self.value(value);
                format!("{name} {} {value}", op.symbol())
            }
            Condition::Between { attr, low, high } => {
                let name = self.name(attr);
                let low = self.value(low);
                let high = self.value(high);
                format!("{name} BETWEEN {low} AND {high}")
            }
            Condition::BeginsWith { attr, prefix } => {
                let name = self.name(attr);
                let prefix = self.value(&JsonValue::String(prefix.clone()));
                format!("begins_with({name}, {prefix})")
            }
            Condition::Contains { attr, value } => {
                let name = self.name(attr);
                let value = self.value(value);
                format!("contains({name}, {value})")
            }
            Condition::In { attr, values } => {
                let name = self.name(attr);
                let placeholders: Vec<String> = values.iter().map(|v| self.value(v)).collect();
                format!("{name} IN ({})", placeholders.join(", "))
            }
            Condition::Exists(attr) => format!("attribute_exists({})", self.name(attr)),
            Condition::NotExists(attr) => format!("attribute_not_exists({})", self.name(attr)),
            Condition::And(left, right) => {
                let left = self.condition(left);
                let right = self.condition(right);
                format!("({left} AND {right})")
            }
            Condition::Or(left, right) => {
                let left = self.condition(left);
                let right = self.condition(right);
                format!("({left} OR {right})")
            }
            Condition::Not(inner) => format!("(NOT {})", self.condition(inner)),
        }
    }

    /// Package text with the placeholders collected so far
    pub fn finish(self, expression: String) -> RenderedExpression {
        RenderedExpression {
            expression,
            names: self.names,
            values: self.values,
        }
    }
}

impl Condition {
    /// Render on its own
    pub fn render(&self) -> RenderedExpression {
        let mut renderer = ExpressionRenderer::new();
        let text = renderer.condition(self);
        renderer.finish(text)
    }
}

impl KeyCondition {
    /// Render on its own
    pub fn render(&self) -> RenderedExpression {
        self.condition().render()
    }
}
