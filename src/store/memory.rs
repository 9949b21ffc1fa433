//! In-memory table
//!
//! Behaves like the managed table for the operations [`TableClient`] covers:
//! items ordered by partition then sort key, secondary indexes, page limits
//! counted before filtering, and last-evaluated-key continuation tokens.

use super::types::{
    BatchWriteOutput, QueryParams, ReturnValues, TableClient, UpdateAction, UpdateItemRequest,
    WriteRequest, MAX_BATCH_WRITE,
};
use crate::error::{Error, Result};
use crate::types::{ContinuationToken, JsonValue, Page, Record, PARTITION_KEY, SORT_KEY};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

// ============================================================================
// Keys
// ============================================================================

/// Key attribute names of a table or index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub partition_key: String,
    pub sort_key: Option<String>,
}

impl KeySchema {
    pub fn new(partition_key: impl Into<String>, sort_key: Option<&str>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.map(ToString::to_string),
        }
    }

    /// Key attribute names, partition first
    pub fn attributes(&self) -> Vec<&str> {
        let mut attrs = vec![self.partition_key.as_str()];
        attrs.extend(self.sort_key.as_deref());
        attrs
    }

    fn item_key(&self, record: &Record) -> Result<ItemKey> {
        let partition = required_part(record, &self.partition_key)?;
        let sort = match &self.sort_key {
            Some(sk) => Some(required_part(record, sk)?),
            None => None,
        };
        Ok(ItemKey { partition, sort })
    }

    /// Index position of a record, `None` if it lacks the index keys
    fn index_entry(&self, record: &Record) -> Option<(KeyPart, Option<KeyPart>)> {
        let partition = KeyPart::from_value(&self.partition_key, record.get(&self.partition_key)?)
            .ok()?;
        let sort = match &self.sort_key {
            Some(sk) => Some(KeyPart::from_value(sk, record.get(sk)?).ok()?),
            None => None,
        };
        Some((partition, sort))
    }
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::new(PARTITION_KEY, Some(SORT_KEY))
    }
}

fn required_part(record: &Record, attr: &str) -> Result<KeyPart> {
    let value = record.get(attr).ok_or_else(|| Error::missing_key(attr))?;
    KeyPart::from_value(attr, value)
}

/// A string or number key value with a total order (numbers sort first)
#[derive(Debug, Clone)]
enum KeyPart {
    Number(f64),
    String(String),
}

impl KeyPart {
    fn from_value(attr: &str, value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::String(s) => Ok(Self::String(s.clone())),
            JsonValue::Number(n) => n
                .as_f64()
                .map(Self::Number)
                .ok_or_else(|| Error::validation(format!("key attribute '{attr}' is not finite"))),
            other => Err(Error::validation(format!(
                "key attribute '{attr}' must be a string or number, got {other}"
            ))),
        }
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Number(_), Self::String(_)) => Ordering::Less,
            (Self::String(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ItemKey {
    partition: KeyPart,
    sort: Option<KeyPart>,
}

/// Position of an item in query order: index sort key, then table key
type OrderKey = (Option<KeyPart>, ItemKey);

// ============================================================================
// Table
// ============================================================================

/// In-memory implementation of [`TableClient`]
#[derive(Debug, Default)]
pub struct MemoryTable {
    schema: KeySchema,
    indexes: HashMap<String, KeySchema>,
    items: RwLock<BTreeMap<ItemKey, Record>>,
}

impl MemoryTable {
    /// Table keyed on `PK` / `SK`
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with custom key attributes
    pub fn with_schema(schema: KeySchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Register a secondary index
    #[must_use]
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        partition_key: impl Into<String>,
        sort_key: Option<&str>,
    ) -> Self {
        self.indexes
            .insert(name.into(), KeySchema::new(partition_key, sort_key));
        self
    }

    /// Seed items before the table is shared
    pub fn with_items<I>(mut self, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = Record>,
    {
        let items = self.items.get_mut();
        for record in records {
            let key = self.schema.item_key(&record)?;
            items.insert(key, record);
        }
        Ok(self)
    }

    /// Table key schema
    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    /// Insert or replace one item
    pub async fn put(&self, record: Record) -> Result<()> {
        let key = self.schema.item_key(&record)?;
        self.items.write().await.insert(key, record);
        Ok(())
    }

    /// Look up one item by primary key
    pub async fn get(&self, key: &Record) -> Result<Option<Record>> {
        let key = self.schema.item_key(key)?;
        Ok(self.items.read().await.get(&key).cloned())
    }

    /// Number of items
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    fn index_schema(&self, params: &QueryParams) -> Result<Option<&KeySchema>> {
        match &params.index_name {
            Some(name) => self
                .indexes
                .get(name)
                .map(Some)
                .ok_or_else(|| Error::validation(format!("unknown index '{name}'"))),
            None => Ok(None),
        }
    }

    /// Query position encoded in a continuation token
    fn start_position(
        &self,
        index: Option<&KeySchema>,
        token: &ContinuationToken,
    ) -> Result<OrderKey> {
        let key = token.key();
        let item_key = self
            .schema
            .item_key(key)
            .map_err(|e| Error::invalid_token(e.to_string()))?;
        let index_sort = match index.and_then(|i| i.sort_key.as_deref()) {
            Some(sk) => Some(
                required_part(key, sk).map_err(|e| Error::invalid_token(e.to_string()))?,
            ),
            None => None,
        };
        Ok((index_sort, item_key))
    }

    /// Continuation token for the item last evaluated
    fn token_for(&self, index: Option<&KeySchema>, record: &Record) -> ContinuationToken {
        let mut attrs = self.schema.attributes();
        if let Some(index) = index {
            attrs.extend(index.attributes());
        }
        let mut key = Record::new();
        for attr in attrs {
            if let Some(value) = record.get(attr) {
                key.insert(attr.to_string(), value.clone());
            }
        }
        ContinuationToken::new(key)
    }
}

#[async_trait]
impl TableClient for MemoryTable {
    async fn query(
        &self,
        params: &QueryParams,
        start: Option<&ContinuationToken>,
    ) -> Result<Page> {
        let key_condition = params
            .key_condition
            .as_ref()
            .ok_or_else(|| Error::validation("query requires a key condition"))?;
        let index = self.index_schema(params)?;
        let schema = index.unwrap_or(&self.schema);
        let (partition_value, sort_condition) =
            key_condition.split(&schema.partition_key, schema.sort_key.as_deref())?;
        let partition = KeyPart::from_value(&schema.partition_key, partition_value)?;

        let limit = params.limit.unwrap_or(usize::MAX);
        if limit == 0 {
            return Err(Error::validation("limit must be at least 1"));
        }

        let items = self.items.read().await;

        let mut candidates: Vec<(OrderKey, &Record)> = Vec::new();
        for (item_key, record) in items.iter() {
            let Some((item_partition, item_sort)) = schema.index_entry(record) else {
                continue;
            };
            if item_partition != partition {
                continue;
            }
            if let Some(condition) = sort_condition {
                if !condition.matches(record)? {
                    continue;
                }
            }
            let index_sort = if index.is_some() { item_sort } else { None };
            candidates.push(((index_sort, item_key.clone()), record));
        }

        candidates.sort_by(|a, b| a.0.cmp(&b.0));
        if !params.is_forward() {
            candidates.reverse();
        }

        if let Some(token) = start {
            let position = self.start_position(index, token)?;
            let forward = params.is_forward();
            candidates.retain(|(order, _)| {
                if forward {
                    *order > position
                } else {
                    *order < position
                }
            });
        }

        let has_more = candidates.len() > limit;
        candidates.truncate(limit);

        let next_token = if has_more {
            candidates
                .last()
                .map(|(_, record)| self.token_for(index, record))
        } else {
            None
        };

        let mut records = Vec::with_capacity(candidates.len());
        for (_, record) in &candidates {
            if let Some(filter) = &params.filter {
                if !filter.matches(record)? {
                    continue;
                }
            }
            records.push(project(record, params.projection.as_deref()));
        }

        debug!(
            "Query on {} returned {} of {} evaluated items (more: {})",
            params.index_name.as_deref().unwrap_or("table"),
            records.len(),
            candidates.len(),
            has_more
        );

        Ok(Page::new(records, next_token))
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<BatchWriteOutput> {
        if requests.len() > MAX_BATCH_WRITE {
            return Err(Error::BatchTooLarge {
                size: requests.len(),
                limit: MAX_BATCH_WRITE,
            });
        }

        // Validate every key before touching the table
        let keyed = requests
            .into_iter()
            .map(|request| {
                let key = match &request {
                    WriteRequest::Put(record) | WriteRequest::Delete(record) => {
                        self.schema.item_key(record)?
                    }
                };
                Ok((key, request))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut items = self.items.write().await;
        for (key, request) in keyed {
            match request {
                WriteRequest::Put(record) => {
                    items.insert(key, record);
                }
                WriteRequest::Delete(_) => {
                    items.remove(&key);
                }
            }
        }

        Ok(BatchWriteOutput::default())
    }

    async fn update_item(&self, request: UpdateItemRequest) -> Result<Option<Record>> {
        let item_key = self.schema.item_key(&request.key)?;
        let key_attrs = self.schema.attributes();
        for action in &request.update.actions {
            let attr = action.attribute();
            if key_attrs.contains(&attr) {
                return Err(Error::validation(format!(
                    "cannot update key attribute '{attr}'"
                )));
            }
            if attr.contains('.') {
                return Err(Error::validation(format!(
                    "nested update path '{attr}' is not supported"
                )));
            }
        }

        let mut items = self.items.write().await;
        let old = items.get(&item_key).cloned();

        if let Some(condition) = &request.condition {
            let empty = Record::new();
            if !condition.matches(old.as_ref().unwrap_or(&empty))? {
                return Err(Error::ConditionalCheckFailed {
                    key: JsonValue::Object(request.key.clone()).to_string(),
                });
            }
        }

        let mut new = old.clone().unwrap_or_else(|| request.key.clone());
        for action in &request.update.actions {
            apply_action(&mut new, action)?;
        }
        items.insert(item_key, new.clone());

        let changed: Vec<&str> = request
            .update
            .actions
            .iter()
            .map(UpdateAction::attribute)
            .collect();
        Ok(match request.return_values {
            ReturnValues::None => None,
            ReturnValues::AllOld => old,
            ReturnValues::AllNew => Some(new),
            ReturnValues::UpdatedOld => old.map(|o| pick(&o, &changed)),
            ReturnValues::UpdatedNew => Some(pick(&new, &changed)),
        })
    }
}

fn apply_action(record: &mut Record, action: &UpdateAction) -> Result<()> {
    match action {
        UpdateAction::Set(attr, value) => {
            record.insert(attr.clone(), value.clone());
        }
        UpdateAction::Remove(attr) => {
            record.remove(attr);
        }
        UpdateAction::Add(attr, amount) => {
            let sum = match record.get(attr) {
                None => amount.clone(),
                Some(current) => add_numbers(attr, current, amount)?,
            };
            if !sum.is_number() {
                return Err(Error::validation(format!(
                    "ADD on '{attr}' requires a number"
                )));
            }
            record.insert(attr.clone(), sum);
        }
    }
    Ok(())
}

fn add_numbers(attr: &str, current: &JsonValue, amount: &JsonValue) -> Result<JsonValue> {
    let not_numeric = || Error::validation(format!("ADD on '{attr}' requires numeric values"));
    if let (Some(a), Some(b)) = (current.as_i64(), amount.as_i64()) {
        return a
            .checked_add(b)
            .map(JsonValue::from)
            .ok_or_else(|| Error::validation(format!("ADD on '{attr}' overflowed")));
    }
    let a = current.as_f64().ok_or_else(not_numeric)?;
    let b = amount.as_f64().ok_or_else(not_numeric)?;
    serde_json::Number::from_f64(a + b)
        .map(JsonValue::Number)
        .ok_or_else(not_numeric)
}

fn pick(record: &Record, attrs: &[&str]) -> Record {
    attrs
        .iter()
        .filter_map(|attr| {
            record
                .get(*attr)
                .map(|value| ((*attr).to_string(), value.clone()))
        })
        .collect()
}

fn project(record: &Record, projection: Option<&[String]>) -> Record {
    match projection {
        None => record.clone(),
        Some(attrs) => record
            .iter()
            .filter(|(name, _)| attrs.iter().any(|a| a == *name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
    }
}
