//! Table service
//!
//! The caller-facing helper over a [`TableClient`]: paginated queries, batch
//! writes and deletes, conditional updates, and filter composition. The
//! client is injected at construction; there is no process-wide instance.

use crate::error::{Error, Result};
use crate::expression::{combine_all, Attr, Condition};
use crate::pagination::{BoundQuery, FetchBuilder, PaginatingIterator};
use crate::store::{
    QueryParams, ReturnValues, TableClient, UpdateExpression, UpdateItemRequest, WriteRequest,
    MAX_BATCH_WRITE,
};
use crate::types::{extract_key, record_from_value, JsonValue, Record, PARTITION_KEY, SORT_KEY};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Record conversion
// ============================================================================

/// Anything that can be written as one item
pub trait IntoRecord {
    fn into_record(self) -> Result<Record>;
}

impl IntoRecord for Record {
    fn into_record(self) -> Result<Record> {
        Ok(self)
    }
}

impl IntoRecord for JsonValue {
    fn into_record(self) -> Result<Record> {
        record_from_value(self)
    }
}

/// A serializable model written as an item, minus excluded fields.
///
/// Field names follow the model's serde attributes, so `#[serde(rename)]`
/// controls the stored attribute names.
#[derive(Debug, Clone)]
pub struct SerializedModel<T> {
    model: T,
    exclude: Vec<String>,
}

impl<T: Serialize> SerializedModel<T> {
    pub fn new(model: T) -> Self {
        Self {
            model,
            exclude: Vec::new(),
        }
    }

    /// Drop these fields before writing
    #[must_use]
    pub fn excluding<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }
}

impl<T: Serialize> IntoRecord for SerializedModel<T> {
    fn into_record(self) -> Result<Record> {
        let mut record = record_from_value(serde_json::to_value(&self.model)?)?;
        for field in &self.exclude {
            record.remove(field);
        }
        Ok(record)
    }
}

// ============================================================================
// Service
// ============================================================================

/// Convenience operations over one table
#[derive(Clone)]
pub struct TableService {
    client: Arc<dyn TableClient>,
}

impl std::fmt::Debug for TableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableService").finish_non_exhaustive()
    }
}

impl TableService {
    /// Create a service over an already constructed client
    pub fn new(client: Arc<dyn TableClient>) -> Self {
        Self { client }
    }

    /// The underlying client
    pub fn client(&self) -> &Arc<dyn TableClient> {
        &self.client
    }

    /// Lazily iterate every item matching `params`
    ///
    /// ```ignore
    /// let params = QueryParams::new()
    ///     .index("GSI1")
    ///     .key_condition(Key::new("GSI1PK").eq(pk).and(Key::new("GSI1SK").begins_with(prefix)));
    /// let first = service.db_iterator(params).first_or_default().await?;
    /// ```
    pub fn db_iterator(&self, params: QueryParams) -> PaginatingIterator<BoundQuery> {
        let query = FetchBuilder::new(Arc::clone(&self.client))
            .having(params)
            .build();
        PaginatingIterator::new(query)
    }

    /// Write items in batches, replacing existing items with the same key.
    ///
    /// Items sharing a `PK`/`SK` pair are collapsed to the last one given.
    /// Returns the number of items written.
    pub async fn add_batch_items<I, T>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
        T: IntoRecord,
    {
        let mut slots: Vec<Option<Record>> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for item in items {
            let record = item.into_record()?;
            let key = JsonValue::Object(extract_key(&record, &[PARTITION_KEY, SORT_KEY])?)
                .to_string();
            if let Some(previous) = positions.insert(key, slots.len()) {
                slots[previous] = None;
            }
            slots.push(Some(record));
        }

        let requests: Vec<WriteRequest> = slots.into_iter().flatten().map(WriteRequest::Put).collect();
        self.write_in_batches(requests).await
    }

    /// Delete items by their `PK`/`SK`. Other attributes are ignored.
    ///
    /// Returns the number of delete requests sent.
    pub async fn delete_batch_items(&self, items: &[Record]) -> Result<usize> {
        let requests = items
            .iter()
            .map(|item| extract_key(item, &[PARTITION_KEY, SORT_KEY]).map(WriteRequest::Delete))
            .collect::<Result<Vec<_>>>()?;
        self.write_in_batches(requests).await
    }

    async fn write_in_batches(&self, requests: Vec<WriteRequest>) -> Result<usize> {
        let total = requests.len();
        let mut unprocessed = 0;

        for (index, chunk) in requests.chunks(MAX_BATCH_WRITE).enumerate() {
            let output = self.client.batch_write(chunk.to_vec()).await?;
            debug!(
                "Batch {} wrote {} of {} requests",
                index + 1,
                chunk.len() - output.unprocessed.len(),
                chunk.len()
            );
            unprocessed += output.unprocessed.len();
        }

        if unprocessed > 0 {
            return Err(Error::UnprocessedItems { count: unprocessed });
        }
        Ok(total)
    }

    /// Update an existing item.
    ///
    /// Fails with `ConditionalCheckFailed` if no item has this `PK`/`SK`.
    /// `return_values` defaults to `ALL_NEW`.
    pub async fn update_item(
        &self,
        pk: &str,
        sk: &str,
        update: UpdateExpression,
        return_values: Option<ReturnValues>,
    ) -> Result<Option<Record>> {
        if update.is_empty() {
            return Err(Error::validation("update expression has no actions"));
        }

        let mut key = Record::new();
        key.insert(PARTITION_KEY.to_string(), JsonValue::from(pk));
        key.insert(SORT_KEY.to_string(), JsonValue::from(sk));

        self.client
            .update_item(UpdateItemRequest {
                key,
                update,
                condition: Some(
                    Attr::new(PARTITION_KEY)
                        .exists()
                        .and(Attr::new(SORT_KEY).exists()),
                ),
                return_values: return_values.unwrap_or(ReturnValues::AllNew),
            })
            .await
    }

    /// Fold a list of filters with AND
    pub fn combine_filters<I>(filters: I) -> Option<Condition>
    where
        I: IntoIterator<Item = Condition>,
    {
        combine_all(filters)
    }

    /// Strip `PK`, `SK` and every attribute whose name contains `GSI`
    pub fn remove_key_attributes(record: &mut Record) {
        record.retain(|name, _| name != PARTITION_KEY && name != SORT_KEY && !name.contains("GSI"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Key;
    use crate::store::{BatchWriteOutput, MemoryTable};
    use crate::types::{ContinuationToken, Page};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn record(value: JsonValue) -> Record {
        record_from_value(value).unwrap()
    }

    fn service_with(table: MemoryTable) -> (TableService, Arc<MemoryTable>) {
        let table = Arc::new(table);
        (TableService::new(table.clone()), table)
    }

    /// Drops every third request and remembers batch sizes
    #[derive(Default)]
    struct LossyClient {
        batch_sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl TableClient for LossyClient {
        async fn query(
            &self,
            _params: &QueryParams,
            _start: Option<&ContinuationToken>,
        ) -> Result<Page> {
            Ok(Page::empty())
        }

        async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<BatchWriteOutput> {
            self.batch_sizes.lock().unwrap().push(requests.len());
            Ok(BatchWriteOutput {
                unprocessed: requests.into_iter().step_by(3).collect(),
            })
        }

        async fn update_item(&self, _request: UpdateItemRequest) -> Result<Option<Record>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_add_batch_items_chunks_and_dedups() {
        let (service, table) = service_with(MemoryTable::new());
        let mut items: Vec<Record> = (0..30)
            .map(|i| record(json!({"PK": "p", "SK": format!("{i:02}"), "v": 1})))
            .collect();
        items.push(record(json!({"PK": "p", "SK": "00", "v": 2})));

        let written = service.add_batch_items(items).await.unwrap();
        assert_eq!(written, 30);
        assert_eq!(table.len().await, 30);

        let stored = table
            .get(&record(json!({"PK": "p", "SK": "00"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["v"], json!(2));
    }

    #[tokio::test]
    async fn test_add_batch_items_reports_unprocessed() {
        let client = Arc::new(LossyClient::default());
        let service = TableService::new(client.clone());
        let items: Vec<Record> = (0..27)
            .map(|i| record(json!({"PK": "p", "SK": i})))
            .collect();

        let err = service.add_batch_items(items).await.unwrap_err();
        // 25 -> 9 dropped, 2 -> 1 dropped
        assert!(matches!(err, Error::UnprocessedItems { count: 10 }));
        assert_eq!(*client.batch_sizes.lock().unwrap(), vec![25, 2]);
    }

    #[tokio::test]
    async fn test_add_batch_items_requires_keys() {
        let (service, table) = service_with(MemoryTable::new());
        let err = service
            .add_batch_items([record(json!({"PK": "p"}))])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingKeyAttribute { attribute } if attribute == "SK"));
        assert!(table.is_empty().await);
    }

    #[derive(Serialize)]
    struct Profile {
        #[serde(rename = "PK")]
        pk: String,
        #[serde(rename = "SK")]
        sk: String,
        display_name: String,
        password_hash: String,
    }

    #[tokio::test]
    async fn test_add_serialized_models_with_exclusions() {
        let (service, table) = service_with(MemoryTable::new());
        let profile = Profile {
            pk: "user#1".into(),
            sk: "profile".into(),
            display_name: "Ada".into(),
            password_hash: "secret".into(),
        };

        service
            .add_batch_items([SerializedModel::new(profile).excluding(["password_hash"])])
            .await
            .unwrap();

        let stored = table
            .get(&record(json!({"PK": "user#1", "SK": "profile"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            JsonValue::Object(stored),
            json!({"PK": "user#1", "SK": "profile", "display_name": "Ada"})
        );
    }

    #[tokio::test]
    async fn test_delete_batch_items_uses_keys_only() {
        let table = MemoryTable::new()
            .with_items([
                record(json!({"PK": "p", "SK": "1"})),
                record(json!({"PK": "p", "SK": "2"})),
            ])
            .unwrap();
        let (service, table) = service_with(table);

        let deleted = service
            .delete_batch_items(&[record(json!({"PK": "p", "SK": "1", "stale": true}))])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(table.len().await, 1);

        let err = service
            .delete_batch_items(&[record(json!({"SK": "2"}))])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingKeyAttribute { .. }));
    }

    #[tokio::test]
    async fn test_update_item_defaults_to_all_new() {
        let table = MemoryTable::new()
            .with_items([record(json!({"PK": "p", "SK": "1", "status": "new"}))])
            .unwrap();
        let (service, _) = service_with(table);

        let updated = service
            .update_item("p", "1", UpdateExpression::new().set("status", "paid"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["status"], json!("paid"));
        assert_eq!(updated["PK"], json!("p"));
    }

    #[tokio::test]
    async fn test_update_item_requires_existing_item() {
        let (service, table) = service_with(MemoryTable::new());
        let err = service
            .update_item("p", "missing", UpdateExpression::new().set("a", 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConditionalCheckFailed { .. }));
        assert!(table.is_empty().await);

        let err = service
            .update_item("p", "1", UpdateExpression::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_db_iterator_pages_through_table() {
        let items = (0..7).map(|i| record(json!({"PK": "p", "SK": i})));
        let (service, _) = service_with(MemoryTable::new().with_items(items).unwrap());

        let mut iter = service.db_iterator(
            QueryParams::new()
                .key_condition(Key::new("PK").eq("p"))
                .limit(3),
        );
        let records = iter.drain_to_list().await.unwrap();
        let order: Vec<i64> = records.iter().map(|r| r["SK"].as_i64().unwrap()).collect();

        // Each page of three is yielded back to front
        assert_eq!(order, vec![2, 1, 0, 5, 4, 3, 6]);
        assert_eq!(iter.pages_fetched(), 3);
    }

    #[test]
    fn test_remove_key_attributes() {
        let mut item = record(json!({
            "PK": "a", "SK": "b", "GSI1PK": "c", "GSI1SK": "d", "myGSIflag": 1, "name": "x"
        }));
        TableService::remove_key_attributes(&mut item);
        assert_eq!(JsonValue::Object(item), json!({"name": "x"}));
    }

    #[test]
    fn test_combine_filters() {
        let filter = TableService::combine_filters([
            Attr::new("a").eq(1),
            Attr::new("b").eq(2),
        ])
        .unwrap();
        assert_eq!(filter.conjuncts().len(), 2);
        assert!(TableService::combine_filters(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn test_many_combined_filters_query() {
        let (service, _) = service_with(
            MemoryTable::new()
                .with_items([
                    record(json!({"PK": "p", "SK": "1", "a": 1})),
                    record(json!({"PK": "p", "SK": "2", "a": 2})),
                ])
                .unwrap(),
        );
        let filter = TableService::combine_filters((0..32).map(|_| Attr::new("a").eq(1)));
        let params = QueryParams::new()
            .key_condition(Key::new("PK").eq("p"))
            .maybe_filter(filter);

        let records = service.db_iterator(params).drain_to_list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["SK"], json!("1"));
    }
}
