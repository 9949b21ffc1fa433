//! Store client types and traits
//!
//! The boundary to the managed table service. Everything hard (network,
//! retries, partitioning) lives behind [`TableClient`].

use crate::error::Result;
use crate::expression::{Condition, ExpressionRenderer, KeyCondition, RenderedExpression};
use crate::types::{ContinuationToken, JsonValue, Page, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Maximum number of requests in one batch write call
pub const MAX_BATCH_WRITE: usize = 25;

// ============================================================================
// Query Parameters
// ============================================================================

/// Fixed parameters of a query. Unset fields use store defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    /// Secondary index to query instead of the table
    pub index_name: Option<String>,
    /// Partition equality plus optional sort-key test
    pub key_condition: Option<KeyCondition>,
    /// Applied after items are read; does not reduce what `limit` counts
    pub filter: Option<Condition>,
    /// Top-level attributes to return
    pub projection: Option<Vec<String>>,
    /// Maximum items evaluated per page
    pub limit: Option<usize>,
    /// Ascending sort-key order when `None` or `Some(true)`
    pub scan_forward: Option<bool>,
}

impl QueryParams {
    /// Create empty query parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Query a secondary index
    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Set the key condition
    #[must_use]
    pub fn key_condition(mut self, condition: KeyCondition) -> Self {
        self.key_condition = Some(condition);
        self
    }

    /// Set the filter
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    /// Set the filter if one is given
    #[must_use]
    pub fn maybe_filter(mut self, condition: Option<Condition>) -> Self {
        if condition.is_some() {
            self.filter = condition;
        }
        self
    }

    /// Return only these attributes
    #[must_use]
    pub fn project<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Set the page size
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Read in descending sort-key order
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.scan_forward = Some(false);
        self
    }

    /// Overlay `other` on `self`; fields set in `other` win
    #[must_use]
    pub fn merge(self, other: QueryParams) -> Self {
        Self {
            index_name: other.index_name.or(self.index_name),
            key_condition: other.key_condition.or(self.key_condition),
            filter: other.filter.or(self.filter),
            projection: other.projection.or(self.projection),
            limit: other.limit.or(self.limit),
            scan_forward: other.scan_forward.or(self.scan_forward),
        }
    }

    /// Is the query read in ascending order?
    pub fn is_forward(&self) -> bool {
        self.scan_forward.unwrap_or(true)
    }

    /// Render key condition and filter with shared placeholders.
    ///
    /// Returns `(key_condition_text, filter_text, placeholders)`.
    pub fn render(&self) -> (Option<String>, Option<String>, RenderedExpression) {
        let mut renderer = ExpressionRenderer::new();
        let key = self
            .key_condition
            .as_ref()
            .map(|k| renderer.condition(k.condition()));
        let filter = self.filter.as_ref().map(|f| renderer.condition(f));
        (key, filter, renderer.finish(String::new()))
    }
}

// ============================================================================
// Writes
// ============================================================================

/// One request inside a batch write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteRequest {
    /// Insert or replace a full item
    Put(Record),
    /// Delete by primary key
    Delete(Record),
}

/// Result of a batch write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteOutput {
    /// Requests the store did not apply
    pub unprocessed: Vec<WriteRequest>,
}

/// Which attributes an update returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnValues {
    #[default]
    None,
    AllOld,
    UpdatedOld,
    AllNew,
    UpdatedNew,
}

/// One action of an update expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    /// Set an attribute to a value
    Set(String, JsonValue),
    /// Remove an attribute
    Remove(String),
    /// Add a number to a numeric attribute, creating it if absent
    Add(String, JsonValue),
}

impl UpdateAction {
    /// Attribute the action changes
    pub fn attribute(&self) -> &str {
        match self {
            Self::Set(attr, _) | Self::Remove(attr) | Self::Add(attr, _) => attr,
        }
    }
}

/// A list of update actions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateExpression {
    pub actions: Vec<UpdateAction>,
}

impl UpdateExpression {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, attr: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.actions.push(UpdateAction::Set(attr.into(), value.into()));
        self
    }

    #[must_use]
    pub fn remove(mut self, attr: impl Into<String>) -> Self {
        self.actions.push(UpdateAction::Remove(attr.into()));
        self
    }

    #[must_use]
    pub fn add(mut self, attr: impl Into<String>, amount: impl Into<JsonValue>) -> Self {
        self.actions.push(UpdateAction::Add(attr.into(), amount.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Render as `SET ... REMOVE ... ADD ...` text with placeholders
    pub fn render(&self) -> RenderedExpression {
        let mut renderer = ExpressionRenderer::new();
        let mut sets = Vec::new();
        let mut removes = Vec::new();
        let mut adds = Vec::new();

        for action in &self.actions {
            match action {
                UpdateAction::Set(attr, value) => {
                    let name = renderer.name(attr);
                    sets.push(format!("{name} = {}", renderer.value(value)));
                }
                UpdateAction::Remove(attr) => removes.push(renderer.name(attr)),
                UpdateAction::Add(attr, amount) => {
                    let name = renderer.name(attr);
                    adds.push(format!("{name} {}", renderer.value(amount)));
                }
            }
        }

        let clauses: Vec<String> = [("SET", sets), ("REMOVE", removes), ("ADD", adds)]
            .into_iter()
            .filter(|(_, parts)| !parts.is_empty())
            .map(|(keyword, parts)| format!("{keyword} {}", parts.join(", ")))
            .collect();
        renderer.finish(clauses.join(" "))
    }
}

/// A conditional single-item update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemRequest {
    /// Primary key of the item
    pub key: Record,
    /// Changes to apply
    pub update: UpdateExpression,
    /// Must hold on the current item for the update to apply
    pub condition: Option<Condition>,
    pub return_values: ReturnValues,
}

// ============================================================================
// Client Trait
// ============================================================================

/// The managed table's client
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Read one page of a query, resuming after `start` when given
    async fn query(&self, params: &QueryParams, start: Option<&ContinuationToken>)
        -> Result<Page>;

    /// Apply up to [`MAX_BATCH_WRITE`] puts and deletes
    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<BatchWriteOutput>;

    /// Apply a conditional update, returning attributes per `return_values`
    async fn update_item(&self, request: UpdateItemRequest) -> Result<Option<Record>>;
}
